// Part of ethercat-rs. Copyright 2018-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

use crate::{
    adapter::AdapterList,
    config::MasterConfig,
    convert::truncate_label,
    stack::EtherCatStack,
    types::*,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

/// A [`Master`] behind a mutex, for callers driving the bus from more than
/// one thread.
pub type SharedMaster<S> = Arc<Mutex<Master<S>>>;

/// State of an open connection to one adapter.
#[derive(Debug)]
pub struct BusSession {
    pub(crate) adapter: String,
    pub(crate) io_map: Box<[u8]>,
    pub(crate) io_map_used: usize,
    pub(crate) slave_count: usize,
    pub(crate) expected_wkc: Option<ExpectedWkc>,
    pub(crate) phase: BringUpPhase,
    pub(crate) group_state: Option<SlaveState>,
}

impl BusSession {
    fn new(adapter: &str, io_map_size: usize) -> Self {
        Self {
            adapter: adapter.to_owned(),
            io_map: vec![0; io_map_size].into_boxed_slice(),
            io_map_used: 0,
            slave_count: 0,
            expected_wkc: None,
            phase: BringUpPhase::Discovering,
            group_state: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.io_map_used = 0;
        self.slave_count = 0;
        self.expected_wkc = None;
        self.phase = BringUpPhase::Discovering;
        self.group_state = None;
    }

    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    /// The whole process data image, including unused trailing bytes.
    pub fn io_map(&self) -> &[u8] {
        &self.io_map
    }

    /// Number of I/O map bytes laid out by the stack.
    pub const fn io_map_used(&self) -> usize {
        self.io_map_used
    }

    pub const fn slave_count(&self) -> usize {
        self.slave_count
    }

    pub const fn expected_wkc(&self) -> Option<ExpectedWkc> {
        self.expected_wkc
    }

    pub const fn phase(&self) -> BringUpPhase {
        self.phase
    }
}

/// An EtherCAT master driving one bus through an [`EtherCatStack`].
///
/// Slave indices are zero-based and valid in `0..slave_count()`; anything
/// else is rejected with [`Error::IndexOutOfRange`].
pub struct Master<S: EtherCatStack> {
    pub(crate) stack: S,
    pub(crate) config: MasterConfig,
    pub(crate) session: Option<BusSession>,
}

impl<S: EtherCatStack> Master<S> {
    pub fn new(stack: S) -> Self {
        Self::with_config(stack, MasterConfig::default())
    }

    pub(crate) fn with_config(stack: S, config: MasterConfig) -> Self {
        Self {
            stack,
            config,
            session: None,
        }
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    pub fn into_shared(self) -> SharedMaster<S> {
        Arc::new(Mutex::new(self))
    }

    /// Scan for network adapters.
    pub fn list_adapters(&mut self) -> AdapterList {
        let list = AdapterList::from(self.stack.find_adapters());
        log::debug!("Found {} network adapters", list.len());
        list
    }

    /// Connect to the named adapter. An already open session is closed first.
    pub fn open(&mut self, adapter: &str) -> Result<()> {
        if self.session.is_some() {
            self.close();
        }
        let handles = match self.stack.init(adapter) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("Could not open adapter {}: {}", adapter, e);
                0
            }
        };
        if handles == 0 {
            return Err(Error::AdapterNotFound(adapter.to_owned()));
        }
        self.session = Some(BusSession::new(adapter, self.config.io_map_size));
        log::info!("EtherCAT master opened on {}", adapter);
        Ok(())
    }

    /// Release the adapter. Safe to call at any time, any number of times.
    pub fn close(&mut self) {
        self.stack.close();
        if let Some(session) = self.session.take() {
            log::info!("EtherCAT master on {} closed", session.adapter);
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&BusSession> {
        self.session.as_ref()
    }

    fn open_session(&self) -> Result<&BusSession> {
        self.session.as_ref().ok_or(Error::NotOpen)
    }

    fn open_session_mut(&mut self) -> Result<&mut BusSession> {
        self.session.as_mut().ok_or(Error::NotOpen)
    }

    /// Bring-up progress, `None` while closed.
    pub fn phase(&self) -> Option<BringUpPhase> {
        self.session.as_ref().map(|s| s.phase)
    }

    /// Group state observed by the last state check of the bring-up.
    pub fn group_state(&self) -> Option<SlaveState> {
        self.session.as_ref().and_then(|s| s.group_state)
    }

    pub fn expected_wkc(&self) -> Option<ExpectedWkc> {
        self.session.as_ref().and_then(|s| s.expected_wkc)
    }

    /// Expected input working counter, 0 until configured.
    pub fn expected_input_wkc(&self) -> u16 {
        self.expected_wkc().map(|w| w.input).unwrap_or(0)
    }

    /// Expected output working counter, 0 until configured.
    pub fn expected_output_wkc(&self) -> u16 {
        self.expected_wkc().map(|w| w.output).unwrap_or(0)
    }

    /// Number of slaves found by the last bring-up.
    pub fn slave_count(&self) -> usize {
        self.session.as_ref().map(|s| s.slave_count).unwrap_or(0)
    }

    pub fn slave(&self, index: usize) -> Result<&SlaveInfo> {
        check_index("slave", index, self.slave_count())?;
        self.stack.slave(index).ok_or(Error::IndexOutOfRange {
            what: "slave",
            index,
            len: self.stack.slave_count(),
        })
    }

    pub fn state(&self, index: usize) -> Result<SlaveState> {
        Ok(self.slave(index)?.state)
    }

    pub fn al_status_code(&self, index: usize) -> Result<u16> {
        Ok(self.slave(index)?.al_status_code)
    }

    /// AL status text of a slave, cut to 30 characters.
    pub fn al_status_description(&self, index: usize) -> Result<&str> {
        let code = self.al_status_code(index)?;
        Ok(truncate_label(self.stack.al_status_text(code)))
    }

    /// Slave name, cut to 30 characters.
    pub fn name(&self, index: usize) -> Result<&str> {
        Ok(truncate_label(&self.slave(index)?.name))
    }

    pub fn input_bits(&self, index: usize) -> Result<u32> {
        Ok(self.slave(index)?.input_bits)
    }

    pub fn output_bits(&self, index: usize) -> Result<u32> {
        Ok(self.slave(index)?.output_bits)
    }

    /// Ask a slave to change its state. Poll [`Master::state`] to see the
    /// transition complete.
    pub fn request_state(&mut self, index: usize, state: SlaveState) -> Result<()> {
        self.slave(index)?;
        log::debug!("Request {} for slave {}", state, index);
        self.stack.write_state(StateTarget::Slave(index), state)
    }

    /// Read the states of all slaves and return the lowest.
    pub fn current_state(&mut self) -> Result<SlaveState> {
        self.open_session()?;
        self.stack.read_state()
    }

    /// Send the outputs and receive the inputs once.
    ///
    /// A frame that does not return within the receive timeout yields a zero
    /// working counter; comparing it against [`Master::expected_wkc`] is up
    /// to the caller.
    pub fn exchange_cycle(&mut self) -> Result<WorkingCounter> {
        let timeout = self.config.receive_timeout;
        let session = self.session.as_mut().ok_or(Error::NotOpen)?;
        exchange(&mut self.stack, &mut session.io_map, timeout)
    }

    fn input_region(&self, index: usize) -> Result<PdoRegion> {
        Ok(self.slave(index)?.inputs)
    }

    fn output_region(&self, index: usize) -> Result<PdoRegion> {
        Ok(self.slave(index)?.outputs)
    }

    pub fn read_input_byte(&self, index: usize, offset: usize) -> Result<u8> {
        let region = self.input_region(index)?;
        check_index("input byte", offset, region.len)?;
        let io_map = &self.open_session()?.io_map;
        let pos = region.offset + offset;
        io_map.get(pos).copied().ok_or(Error::IndexOutOfRange {
            what: "I/O map byte",
            index: pos,
            len: io_map.len(),
        })
    }

    pub fn write_output_byte(&mut self, index: usize, offset: usize, value: u8) -> Result<()> {
        let region = self.output_region(index)?;
        check_index("output byte", offset, region.len)?;
        let io_map = &mut self.open_session_mut()?.io_map;
        let pos = region.offset + offset;
        let len = io_map.len();
        let byte = io_map.get_mut(pos).ok_or(Error::IndexOutOfRange {
            what: "I/O map byte",
            index: pos,
            len,
        })?;
        *byte = value;
        Ok(())
    }

    pub fn inputs(&self, index: usize) -> Result<&[u8]> {
        let region = self.input_region(index)?;
        let io_map = &self.open_session()?.io_map;
        check_region(region, io_map.len())?;
        Ok(&io_map[region.range()])
    }

    pub fn outputs_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        let region = self.output_region(index)?;
        let io_map = &mut self.open_session_mut()?.io_map;
        check_region(region, io_map.len())?;
        Ok(&mut io_map[region.range()])
    }
}

impl<S: EtherCatStack> Drop for Master<S> {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.close();
        }
    }
}

fn check_region(region: PdoRegion, len: usize) -> Result<()> {
    if region.end() > len {
        return Err(Error::IoMapOverflow {
            required: region.end(),
            available: len,
        });
    }
    Ok(())
}

/// One send/receive round trip; a lost frame counts as working counter 0.
pub(crate) fn exchange<S: EtherCatStack + ?Sized>(
    stack: &mut S,
    io_map: &mut [u8],
    timeout: Duration,
) -> Result<WorkingCounter> {
    stack.send_process_data(io_map)?;
    match stack.receive_process_data(io_map, timeout) {
        Err(Error::ExchangeTimeout) => {
            log::debug!("No process data frame within {:?}", timeout);
            Ok(WorkingCounter::ZERO)
        }
        res => res,
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::{
        convert::MAX_LABEL_LEN,
        sim::{SimSlave, SimStack},
    };

    fn stack() -> SimStack {
        SimStack::new()
            .with_adapter("eth0", "Intel I210")
            .with_slave(SimSlave::new("EK1100", 0, 0))
            .with_slave(SimSlave::new("EL1008", 8, 0))
            .with_slave(SimSlave::new("EL2008", 0, 8))
    }

    fn configured() -> Master<SimStack> {
        let mut master = Master::new(stack());
        master.open("eth0").unwrap();
        master.configure().unwrap();
        master
    }

    #[test]
    fn open_unknown_adapter() {
        let mut master = Master::new(stack());
        match master.open("wlan0") {
            Err(Error::AdapterNotFound(name)) => assert_eq!(name, "wlan0"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!master.is_open());
        assert!(master.session().is_none());
    }

    #[test]
    fn close_is_idempotent() {
        let mut master = Master::new(stack());
        master.close();
        master.open("eth0").unwrap();
        assert!(master.is_open());
        assert_eq!(master.session().unwrap().adapter(), "eth0");
        master.close();
        master.close();
        assert!(!master.is_open());
        assert!(!master.stack().is_open());
    }

    #[test]
    fn reopen_closes_previous_session() {
        let mut master = Master::new(stack());
        master.open("eth0").unwrap();
        master.open("eth0").unwrap();
        assert_eq!(master.stack().close_count(), 1);
        assert!(master.stack().is_open());
    }

    #[test]
    fn queries_before_open() {
        let mut master = Master::new(stack());
        assert_eq!(master.slave_count(), 0);
        assert_eq!(master.expected_input_wkc(), 0);
        assert_eq!(master.expected_output_wkc(), 0);
        assert!(master.phase().is_none());
        assert!(matches!(master.exchange_cycle(), Err(Error::NotOpen)));
        assert!(matches!(master.current_state(), Err(Error::NotOpen)));
        assert!(matches!(
            master.state(0),
            Err(Error::IndexOutOfRange { len: 0, .. })
        ));
    }

    #[test]
    fn slave_queries() {
        let master = configured();
        assert_eq!(master.slave_count(), 3);
        assert_eq!(master.name(1).unwrap(), "EL1008");
        assert_eq!(master.input_bits(1).unwrap(), 8);
        assert_eq!(master.output_bits(2).unwrap(), 8);
        assert_eq!(master.state(0).unwrap(), SlaveState::Op);
        assert_eq!(master.al_status_code(0).unwrap(), 0);
        assert_eq!(master.al_status_description(0).unwrap(), "No error");
        for err in &[
            master.state(3).err(),
            master.name(3).err(),
            master.input_bits(7).err(),
        ] {
            assert!(matches!(
                err,
                Some(Error::IndexOutOfRange {
                    what: "slave",
                    len: 3,
                    ..
                })
            ));
        }
    }

    #[test]
    fn names_and_descriptions_are_truncated() {
        let long = "EL7047 Stepper motor terminal 48 V DC, 5 A";
        let mut master = Master::new(
            SimStack::new()
                .with_adapter("eth0", "")
                .with_slave(SimSlave::new(long, 0, 0).al_status(0x0036))
                .with_slave(SimSlave::new("EL3102", 32, 0).al_status(0x0017)),
        );
        master.open("eth0").unwrap();
        master.configure().unwrap();
        assert_eq!(master.name(0).unwrap(), "EL7047 Stepper motor terminal ");
        assert_eq!(master.al_status_code(0).unwrap(), 0x36);
        assert_eq!(
            master.al_status_description(0).unwrap(),
            "DC invalid sync0 cycle time"
        );
        assert_eq!(
            master.stack().al_status_text(0x0017),
            "Invalid sync manager configuration"
        );
        assert_eq!(
            master.al_status_description(1).unwrap(),
            "Invalid sync manager configura"
        );
        assert_eq!(master.al_status_description(1).unwrap().len(), MAX_LABEL_LEN);
    }

    #[test]
    fn faulted_slave_shows_in_current_state() {
        let mut master = configured();
        assert_eq!(master.current_state().unwrap(), SlaveState::Op);
        master.stack_mut().set_al_status(1, 0x14, 0x001B).unwrap();
        assert_eq!(master.state(1).unwrap(), SlaveState::Error);
        assert_eq!(master.current_state().unwrap(), SlaveState::Error);
        assert_eq!(
            master.al_status_description(1).unwrap(),
            "Sync manager watchdog"
        );
    }

    #[test]
    fn request_state_is_forwarded() {
        let mut master = configured();
        master.request_state(2, SlaveState::SafeOp).unwrap();
        assert_eq!(master.state(2).unwrap(), SlaveState::SafeOp);
        assert_eq!(master.current_state().unwrap(), SlaveState::SafeOp);
        assert!(matches!(
            master.request_state(3, SlaveState::Init),
            Err(Error::IndexOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn pdo_access() {
        let mut master = configured();
        master.write_output_byte(2, 0, 0xA5).unwrap();
        assert_eq!(master.outputs_mut(2).unwrap(), &[0xA5]);
        master.stack_mut().set_input(1, 0, 0x3C);
        let wkc = master.exchange_cycle().unwrap();
        assert_eq!(master.expected_wkc().unwrap().classify(wkc), WcState::Complete);
        assert_eq!(master.read_input_byte(1, 0).unwrap(), 0x3C);
        assert_eq!(master.inputs(1).unwrap(), &[0x3C]);
        assert_eq!(master.inputs(0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn pdo_bounds() {
        let mut master = configured();
        assert!(matches!(
            master.read_input_byte(1, 1),
            Err(Error::IndexOutOfRange {
                what: "input byte",
                index: 1,
                len: 1
            })
        ));
        assert!(matches!(
            master.write_output_byte(1, 0, 1),
            Err(Error::IndexOutOfRange {
                what: "output byte",
                len: 0,
                ..
            })
        ));
        assert!(matches!(
            master.read_input_byte(3, 0),
            Err(Error::IndexOutOfRange { what: "slave", .. })
        ));
        assert!(matches!(
            master.write_output_byte(3, 0, 0),
            Err(Error::IndexOutOfRange { what: "slave", .. })
        ));
    }

    #[test]
    fn lost_frame_reads_as_zero() {
        let mut master = configured();
        master.stack_mut().drop_frames(true);
        assert_eq!(master.exchange_cycle().unwrap(), WorkingCounter::ZERO);
        master.stack_mut().drop_frames(false);
        assert_eq!(master.exchange_cycle().unwrap(), WorkingCounter(3));
    }

    #[test]
    fn shared_master_across_threads() {
        let shared = {
            let master = configured();
            master.into_shared()
        };
        {
            let mut guard = shared.lock().unwrap();
            guard.write_output_byte(2, 0, 1).unwrap();
        }
        let handle = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || shared.lock().unwrap().exchange_cycle().unwrap())
        };
        assert_eq!(handle.join().unwrap(), WorkingCounter(3));
        let mut guard = shared.lock().unwrap();
        guard.close();
        assert!(!guard.stack().is_open());
    }
}
