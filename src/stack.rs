// Part of ethercat-rs. Copyright 2018-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

use crate::{
    adapter::Adapter,
    al_status,
    types::{GroupWkc, Result, SlaveInfo, SlaveState, StateTarget, WorkingCounter},
};
use std::time::Duration;

/// The EtherCAT stack doing the actual frame and socket work.
///
/// [`Master`](crate::Master) only sequences calls into this trait. Slave
/// positions are zero-based; the stack owns the slave table and refreshes it
/// whenever it scans, checks or reads states.
///
/// Every blocking call receives an explicit timeout and must return once it
/// has elapsed.
///
/// Implementations holding raw AL status register values decode them with
/// [`SlaveState::from_status`]. A set error flag must win over every regular
/// state when reporting the lowest state of the group.
pub trait EtherCatStack {
    /// Enumerate the network adapters the stack can open.
    fn find_adapters(&mut self) -> Vec<Adapter>;

    /// Open the named adapter and return the number of handles the stack
    /// obtained. Zero means the adapter could not be claimed.
    fn init(&mut self, adapter: &str) -> Result<u32>;

    /// Release the adapter. Must be harmless when nothing is open.
    fn close(&mut self);

    /// Enumerate and pre-configure the slaves, returning their count.
    fn config_init(&mut self, force_redundancy: bool) -> Result<usize>;

    /// Lay out the process data of all slaves inside `io_map` and return the
    /// number of bytes used.
    fn config_map(&mut self, io_map: &mut [u8]) -> Result<usize>;

    /// Configure distributed clocks. Returns whether any slave supports them.
    fn config_dc(&mut self) -> Result<bool>;

    /// Working counter contributions of the default group after mapping.
    fn group_wkc(&self) -> GroupWkc;

    /// Wait until `target` reaches `state` or `timeout` elapses; return the
    /// state observed last.
    fn state_check(
        &mut self,
        target: StateTarget,
        state: SlaveState,
        timeout: Duration,
    ) -> Result<SlaveState>;

    /// Request `state` for `target`. Does not wait for the transition.
    fn write_state(&mut self, target: StateTarget, state: SlaveState) -> Result<()>;

    /// Read the states of all slaves and return the lowest one.
    fn read_state(&mut self) -> Result<SlaveState>;

    /// Queue the outputs of `io_map` onto the wire.
    fn send_process_data(&mut self, io_map: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for the process data frame to return, copy the
    /// inputs into `io_map` and report the working counter. A missing frame
    /// is reported as [`Error::ExchangeTimeout`](crate::Error::ExchangeTimeout).
    fn receive_process_data(
        &mut self,
        io_map: &mut [u8],
        timeout: Duration,
    ) -> Result<WorkingCounter>;

    fn slave_count(&self) -> usize;

    fn slave(&self, position: usize) -> Option<&SlaveInfo>;

    /// Text for an AL status code.
    fn al_status_text(&self, code: u16) -> &str {
        al_status::describe(code)
    }
}

impl<S: EtherCatStack + ?Sized> EtherCatStack for Box<S> {
    fn find_adapters(&mut self) -> Vec<Adapter> {
        (**self).find_adapters()
    }
    fn init(&mut self, adapter: &str) -> Result<u32> {
        (**self).init(adapter)
    }
    fn close(&mut self) {
        (**self).close()
    }
    fn config_init(&mut self, force_redundancy: bool) -> Result<usize> {
        (**self).config_init(force_redundancy)
    }
    fn config_map(&mut self, io_map: &mut [u8]) -> Result<usize> {
        (**self).config_map(io_map)
    }
    fn config_dc(&mut self) -> Result<bool> {
        (**self).config_dc()
    }
    fn group_wkc(&self) -> GroupWkc {
        (**self).group_wkc()
    }
    fn state_check(
        &mut self,
        target: StateTarget,
        state: SlaveState,
        timeout: Duration,
    ) -> Result<SlaveState> {
        (**self).state_check(target, state, timeout)
    }
    fn write_state(&mut self, target: StateTarget, state: SlaveState) -> Result<()> {
        (**self).write_state(target, state)
    }
    fn read_state(&mut self) -> Result<SlaveState> {
        (**self).read_state()
    }
    fn send_process_data(&mut self, io_map: &[u8]) -> Result<()> {
        (**self).send_process_data(io_map)
    }
    fn receive_process_data(
        &mut self,
        io_map: &mut [u8],
        timeout: Duration,
    ) -> Result<WorkingCounter> {
        (**self).receive_process_data(io_map, timeout)
    }
    fn slave_count(&self) -> usize {
        (**self).slave_count()
    }
    fn slave(&self, position: usize) -> Option<&SlaveInfo> {
        (**self).slave(position)
    }
    fn al_status_text(&self, code: u16) -> &str {
        (**self).al_status_text(code)
    }
}
