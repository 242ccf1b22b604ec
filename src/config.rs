// Part of ethercat-rs. Copyright 2018-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Timeouts and bounds used while bringing up and exchanging with the bus.

use crate::{
    master::Master,
    stack::EtherCatStack,
    types::{Error, Result},
};
use std::time::Duration;

/// Size of the process data image shared by all slaves.
pub const IO_MAP_SIZE: usize = 4096;

/// Standard timeout of a state change.
pub const TIMEOUT_STATE: Duration = Duration::from_secs(2);

/// Standard timeout for a process data frame to return.
pub const TIMEOUT_RET: Duration = Duration::from_micros(2_000);

const MAX_OP_POLL_ATTEMPTS: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterConfig {
    /// Timeout of a regular state change.
    pub state_timeout: Duration,
    /// SAFE-OP is given `state_timeout * safe_op_factor` to settle.
    pub safe_op_factor: u32,
    /// Per-attempt bound of the OP state check.
    pub op_poll_timeout: Duration,
    /// Number of exchange + state check rounds while waiting for OP.
    pub op_poll_attempts: u32,
    /// Bound of every process data receive.
    pub receive_timeout: Duration,
    pub io_map_size: usize,
    pub force_redundancy: bool,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            state_timeout: TIMEOUT_STATE,
            safe_op_factor: 4,
            op_poll_timeout: Duration::from_micros(50_000),
            op_poll_attempts: 40,
            receive_timeout: TIMEOUT_RET,
            io_map_size: IO_MAP_SIZE,
            force_redundancy: false,
        }
    }
}

impl MasterConfig {
    /// Saturates at `Duration::MAX`; a validated config never gets there.
    pub fn safe_op_timeout(&self) -> Duration {
        self.state_timeout
            .checked_mul(self.safe_op_factor)
            .unwrap_or(Duration::MAX)
    }

    /// Worst case time spent polling for OP, excluding the exchanges.
    pub fn op_poll_budget(&self) -> Duration {
        self.op_poll_timeout
            .checked_mul(self.op_poll_attempts)
            .unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        if self.state_timeout == Duration::from_secs(0) {
            return Err(Error::InvalidConfig("state timeout must not be zero"));
        }
        if self.safe_op_factor == 0 {
            return Err(Error::InvalidConfig("SAFE-OP factor must not be zero"));
        }
        if self.op_poll_timeout == Duration::from_secs(0) {
            return Err(Error::InvalidConfig("OP poll timeout must not be zero"));
        }
        if self.op_poll_attempts == 0 || self.op_poll_attempts > MAX_OP_POLL_ATTEMPTS {
            return Err(Error::InvalidConfig("OP poll attempts must be within 1..=1000"));
        }
        if self.state_timeout.checked_mul(self.safe_op_factor).is_none() {
            return Err(Error::InvalidConfig("SAFE-OP timeout overflows"));
        }
        if self.op_poll_timeout.checked_mul(self.op_poll_attempts).is_none() {
            return Err(Error::InvalidConfig("OP poll budget overflows"));
        }
        if self.receive_timeout == Duration::from_secs(0) {
            return Err(Error::InvalidConfig("receive timeout must not be zero"));
        }
        if self.io_map_size == 0 {
            return Err(Error::InvalidConfig("I/O map size must not be zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MasterBuilder {
    config: MasterConfig,
}

impl MasterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_timeout(mut self, timeout: Duration) -> Self {
        self.config.state_timeout = timeout;
        self
    }

    pub fn safe_op_factor(mut self, factor: u32) -> Self {
        self.config.safe_op_factor = factor;
        self
    }

    pub fn op_poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.op_poll_timeout = timeout;
        self
    }

    pub fn op_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.op_poll_attempts = attempts;
        self
    }

    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.config.receive_timeout = timeout;
        self
    }

    pub fn io_map_size(mut self, size: usize) -> Self {
        self.config.io_map_size = size;
        self
    }

    pub fn force_redundancy(mut self, force: bool) -> Self {
        self.config.force_redundancy = force;
        self
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn build<S: EtherCatStack>(self, stack: S) -> Result<Master<S>> {
        self.config.validate()?;
        Ok(Master::with_config(stack, self.config))
    }
}
