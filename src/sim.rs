// Part of ethercat-rs. Copyright 2018-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! An in-memory [`EtherCatStack`] for tests and demos.
//!
//! Slaves enter PRE-OP on discovery and SAFE-OP when mapped. After OP has
//! been requested for the group they switch to OP once a configurable number
//! of process data frames has returned, or never.

use crate::{
    adapter::Adapter,
    stack::EtherCatStack,
    types::*,
};
use std::time::Duration;

/// A device plugged into the simulated bus.
#[derive(Debug, Clone)]
pub struct SimSlave {
    name: String,
    input_bits: u32,
    output_bits: u32,
    al_status_code: u16,
    input_data: Vec<u8>,
}

impl SimSlave {
    pub fn new(name: impl Into<String>, input_bits: u32, output_bits: u32) -> Self {
        Self {
            name: name.into(),
            input_bits,
            output_bits,
            al_status_code: 0,
            input_data: vec![0; byte_len(input_bits)],
        }
    }

    pub fn al_status(mut self, code: u16) -> Self {
        self.al_status_code = code;
        self
    }
}

const fn byte_len(bits: u32) -> usize {
    ((bits + 7) / 8) as usize
}

#[derive(Debug, Default)]
pub struct SimStack {
    adapters: Vec<Adapter>,
    devices: Vec<SimSlave>,
    slaves: Vec<SlaveInfo>,
    group_wkc_override: Option<GroupWkc>,
    group_wkc: GroupWkc,
    // frames needed for OP after the request; `None` never reaches OP
    op_after_cycles: Option<u32>,
    op_requested: bool,
    cycles_since_op_request: u32,
    open_adapter: Option<String>,
    close_count: usize,
    drop_frames: bool,
    frame_pending: bool,
    frames_sent: usize,
    frames_before_op_request: Option<usize>,
    state_checks: Vec<(SlaveState, Duration)>,
    last_receive_timeout: Option<Duration>,
}

impl SimStack {
    pub fn new() -> Self {
        Self {
            op_after_cycles: Some(1),
            ..Self::default()
        }
    }

    pub fn with_adapter(mut self, name: &str, description: &str) -> Self {
        self.adapters
            .push(Adapter::new(name.to_owned(), description.to_owned()));
        self
    }

    pub fn with_slave(mut self, slave: SimSlave) -> Self {
        self.devices.push(slave);
        self
    }

    /// Report these group working counters instead of counting slaves.
    pub fn with_group_wkc(mut self, outputs: u16, inputs: u16) -> Self {
        self.group_wkc_override = Some(GroupWkc::new(outputs, inputs));
        self
    }

    pub fn op_after_cycles(mut self, cycles: u32) -> Self {
        self.op_after_cycles = Some(cycles);
        self
    }

    pub fn never_op(mut self) -> Self {
        self.op_after_cycles = None;
        self
    }

    /// Unplug all devices; the next scan finds nothing.
    pub fn clear_slaves(&mut self) {
        self.devices.clear();
    }

    /// Lose every frame from now on (or stop doing so).
    pub fn drop_frames(&mut self, drop: bool) {
        self.drop_frames = drop;
    }

    /// Set a byte the device will report as input. Out of range writes are
    /// ignored.
    pub fn set_input(&mut self, slave: usize, offset: usize, value: u8) {
        if let Some(b) = self
            .devices
            .get_mut(slave)
            .and_then(|d| d.input_data.get_mut(offset))
        {
            *b = value;
        }
    }

    /// Make a discovered slave report this AL status register and AL status
    /// code, e.g. `0x14` plus `0x001D` for a watchdog error in SAFE-OP.
    pub fn set_al_status(&mut self, slave: usize, status: u16, code: u16) -> Result<()> {
        let state = SlaveState::from_status(status)?;
        let len = self.slaves.len();
        let info = self.slaves.get_mut(slave).ok_or(Error::IndexOutOfRange {
            what: "slave",
            index: slave,
            len,
        })?;
        info.state = state;
        info.al_status_code = code;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open_adapter.is_some()
    }

    pub fn close_count(&self) -> usize {
        self.close_count
    }

    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }

    /// Frames sent when OP was requested for the group.
    pub fn frames_sent_before_op_request(&self) -> Option<usize> {
        self.frames_before_op_request
    }

    /// Target state and timeout of every state check so far.
    pub fn state_checks(&self) -> &[(SlaveState, Duration)] {
        &self.state_checks
    }

    pub fn last_receive_timeout(&self) -> Option<Duration> {
        self.last_receive_timeout
    }

    // an error flag anywhere on the bus outranks every regular state
    fn lowest_state(&self) -> SlaveState {
        if self.slaves.iter().any(|s| s.state == SlaveState::Error) {
            return SlaveState::Error;
        }
        self.slaves
            .iter()
            .map(|s| s.state)
            .min()
            .unwrap_or(SlaveState::None)
    }

    fn state_of(&self, target: StateTarget) -> Result<SlaveState> {
        match target {
            StateTarget::Group => Ok(self.lowest_state()),
            StateTarget::Slave(i) => self
                .slaves
                .get(i)
                .map(|s| s.state)
                .ok_or(Error::IndexOutOfRange {
                    what: "slave",
                    index: i,
                    len: self.slaves.len(),
                }),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open_adapter.is_none() {
            return Err(Error::NotOpen);
        }
        Ok(())
    }

    fn advance_op_request(&mut self) {
        if !self.op_requested {
            return;
        }
        self.cycles_since_op_request += 1;
        if let Some(n) = self.op_after_cycles {
            if self.cycles_since_op_request >= n {
                self.enter_op();
            }
        }
    }

    fn enter_op(&mut self) {
        for slave in &mut self.slaves {
            if slave.state == SlaveState::SafeOp {
                slave.state = SlaveState::Op;
            }
        }
        self.op_requested = false;
    }

    fn working_counter(&self) -> u16 {
        self.slaves
            .iter()
            .map(|s| {
                let inputs = (s.inputs.len > 0) as u16;
                let outputs = (s.outputs.len > 0) as u16;
                match s.state {
                    SlaveState::Op => outputs * 2 + inputs,
                    SlaveState::SafeOp => inputs,
                    _ => 0,
                }
            })
            .sum()
    }
}

impl EtherCatStack for SimStack {
    fn find_adapters(&mut self) -> Vec<Adapter> {
        self.adapters.clone()
    }

    fn init(&mut self, adapter: &str) -> Result<u32> {
        if self.adapters.iter().any(|a| a.name == adapter) {
            self.open_adapter = Some(adapter.to_owned());
            Ok(1)
        } else {
            Ok(0)
        }
    }

    fn close(&mut self) {
        if self.open_adapter.take().is_some() {
            self.close_count += 1;
        }
        self.slaves.clear();
        self.op_requested = false;
        self.frame_pending = false;
    }

    fn config_init(&mut self, _force_redundancy: bool) -> Result<usize> {
        self.ensure_open()?;
        self.op_requested = false;
        self.slaves = self
            .devices
            .iter()
            .map(|d| SlaveInfo {
                name: d.name.clone(),
                state: SlaveState::PreOp,
                al_status_code: d.al_status_code,
                input_bits: d.input_bits,
                output_bits: d.output_bits,
                inputs: PdoRegion::default(),
                outputs: PdoRegion::default(),
            })
            .collect();
        Ok(self.slaves.len())
    }

    fn config_map(&mut self, io_map: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let mut offset = 0;
        for slave in &mut self.slaves {
            let len = byte_len(slave.output_bits);
            slave.outputs = PdoRegion::new(offset, len);
            offset += len;
        }
        for slave in &mut self.slaves {
            let len = byte_len(slave.input_bits);
            slave.inputs = PdoRegion::new(offset, len);
            offset += len;
        }
        if offset > io_map.len() {
            return Err(Error::IoMapOverflow {
                required: offset,
                available: io_map.len(),
            });
        }
        for b in io_map[..offset].iter_mut() {
            *b = 0;
        }
        let counted = GroupWkc::new(
            self.slaves.iter().filter(|s| s.outputs.len > 0).count() as u16,
            self.slaves.iter().filter(|s| s.inputs.len > 0).count() as u16,
        );
        self.group_wkc = self.group_wkc_override.unwrap_or(counted);
        for slave in &mut self.slaves {
            slave.state = SlaveState::SafeOp;
        }
        Ok(offset)
    }

    fn config_dc(&mut self) -> Result<bool> {
        self.ensure_open()?;
        Ok(false)
    }

    fn group_wkc(&self) -> GroupWkc {
        self.group_wkc
    }

    fn state_check(
        &mut self,
        target: StateTarget,
        state: SlaveState,
        timeout: Duration,
    ) -> Result<SlaveState> {
        self.ensure_open()?;
        self.state_checks.push((state, timeout));
        self.state_of(target)
    }

    fn write_state(&mut self, target: StateTarget, state: SlaveState) -> Result<()> {
        self.ensure_open()?;
        log::debug!("Simulated state request {:?} -> {}", target, state);
        match target {
            StateTarget::Group if state == SlaveState::Op => {
                self.op_requested = true;
                self.cycles_since_op_request = 0;
                self.frames_before_op_request = Some(self.frames_sent);
                if self.op_after_cycles == Some(0) {
                    self.enter_op();
                }
            }
            StateTarget::Group => {
                for slave in &mut self.slaves {
                    slave.state = state;
                }
            }
            StateTarget::Slave(i) => {
                let never_op = self.op_after_cycles.is_none();
                let len = self.slaves.len();
                let slave = self.slaves.get_mut(i).ok_or(Error::IndexOutOfRange {
                    what: "slave",
                    index: i,
                    len,
                })?;
                if !(state == SlaveState::Op && never_op) {
                    slave.state = state;
                }
            }
        }
        Ok(())
    }

    fn read_state(&mut self) -> Result<SlaveState> {
        self.ensure_open()?;
        Ok(self.lowest_state())
    }

    fn send_process_data(&mut self, _io_map: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.frames_sent += 1;
        self.frame_pending = true;
        Ok(())
    }

    fn receive_process_data(
        &mut self,
        io_map: &mut [u8],
        timeout: Duration,
    ) -> Result<WorkingCounter> {
        self.ensure_open()?;
        self.last_receive_timeout = Some(timeout);
        if !std::mem::replace(&mut self.frame_pending, false) || self.drop_frames {
            return Err(Error::ExchangeTimeout);
        }
        self.advance_op_request();
        for (slave, device) in self.slaves.iter().zip(&self.devices) {
            if slave.state < SlaveState::SafeOp || slave.state == SlaveState::Error {
                continue;
            }
            let region = slave.inputs.range();
            if let Some(dst) = io_map.get_mut(region) {
                dst.copy_from_slice(&device.input_data);
            }
        }
        Ok(WorkingCounter(self.working_counter()))
    }

    fn slave_count(&self) -> usize {
        self.slaves.len()
    }

    fn slave(&self, position: usize) -> Option<&SlaveInfo> {
        self.slaves.get(position)
    }
}
