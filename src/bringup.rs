// Part of ethercat-rs. Copyright 2018-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Bring-up of the bus from discovery to OP.

use crate::{
    master::{exchange, Master},
    stack::EtherCatStack,
    types::*,
};

impl<S: EtherCatStack> Master<S> {
    /// Discover the slaves, map their process data and drive them to OP.
    ///
    /// The sequence is: scan, map I/O, configure clocks, wait for SAFE-OP,
    /// record the expected working counters, send one priming cycle, request
    /// OP and poll for it with a bounded number of exchange rounds.
    ///
    /// Missing devices or slaves stuck below OP are reported through the
    /// returned [`BringUpOutcome`], not as errors; errors come from the stack
    /// itself or from calling this on a closed master.
    pub fn configure(&mut self) -> Result<BringUpOutcome> {
        let Master {
            stack,
            config,
            session,
        } = self;
        let session = session.as_mut().ok_or(Error::NotOpen)?;
        session.reset();

        let count = stack.config_init(config.force_redundancy)?;
        if count == 0 {
            log::warn!("No devices found on {}", session.adapter);
            return Ok(BringUpOutcome::NoDevices);
        }
        log::info!("{} devices found and configured", count);
        session.slave_count = count;

        let used = stack.config_map(&mut session.io_map)?;
        if used > session.io_map.len() {
            return Err(Error::IoMapOverflow {
                required: used,
                available: session.io_map.len(),
            });
        }
        session.io_map_used = used;
        let dc = stack.config_dc()?;
        session.phase = BringUpPhase::Configured;
        log::debug!(
            "Devices mapped ({} bytes, distributed clocks: {}), state to SAFE_OP",
            used,
            dc
        );

        let state = stack.state_check(
            StateTarget::Group,
            SlaveState::SafeOp,
            config.safe_op_timeout(),
        )?;
        session.group_state = Some(state);
        session.phase = BringUpPhase::SafeOpRequested;
        if state != SlaveState::SafeOp {
            log::warn!("Not all devices reached SAFE_OP, lowest state is {}", state);
        }

        let expected = ExpectedWkc::from_group(stack.group_wkc());
        session.expected_wkc = Some(expected);
        log::debug!(
            "Expected working counters: input {}, output {}",
            expected.input,
            expected.output
        );

        // slaves refuse OP until they have seen valid outputs
        exchange(stack, &mut session.io_map, config.receive_timeout)?;
        stack.write_state(StateTarget::Group, SlaveState::Op)?;
        session.phase = BringUpPhase::OpRequested;

        let mut state = state;
        for attempt in 1..=config.op_poll_attempts {
            exchange(stack, &mut session.io_map, config.receive_timeout)?;
            state = stack.state_check(StateTarget::Group, SlaveState::Op, config.op_poll_timeout)?;
            session.group_state = Some(state);
            if state == SlaveState::Op {
                log::debug!("Devices reached OP after {} attempts", attempt);
                break;
            }
        }

        if state == SlaveState::Op {
            session.phase = BringUpPhase::Operational;
            log::info!("All devices are in OP state");
            Ok(BringUpOutcome::AllOperational)
        } else {
            session.phase = BringUpPhase::Degraded;
            log::warn!(
                "Not all devices reached OP within {} attempts, lowest state is {}",
                config.op_poll_attempts,
                state
            );
            Ok(BringUpOutcome::PartialOperational)
        }
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::{
        config::MasterBuilder,
        sim::{SimSlave, SimStack},
    };
    use std::time::Duration;

    fn open(stack: SimStack) -> Master<SimStack> {
        let mut master = Master::new(stack.with_adapter("eth0", "Intel I210"));
        master.open("eth0").unwrap();
        master
    }

    #[test]
    fn configure_requires_open() {
        let mut master = Master::new(SimStack::new());
        assert!(matches!(master.configure(), Err(Error::NotOpen)));
    }

    #[test]
    fn sequence_and_timeouts() {
        let mut master = open(
            SimStack::new()
                .with_slave(SimSlave::new("EL1008", 8, 0))
                .op_after_cycles(2),
        );
        assert_eq!(master.configure().unwrap(), BringUpOutcome::AllOperational);
        assert_eq!(master.phase(), Some(BringUpPhase::Operational));
        assert_eq!(master.group_state(), Some(SlaveState::Op));

        let stack = master.stack();
        let checks = stack.state_checks();
        assert_eq!(
            checks[0],
            (SlaveState::SafeOp, Duration::from_secs(8)),
            "SAFE_OP gets four standard state timeouts"
        );
        assert!(checks[1..]
            .iter()
            .all(|c| *c == (SlaveState::Op, Duration::from_micros(50_000))));
        // priming cycle plus two polling rounds
        assert_eq!(stack.frames_sent(), 3);
        assert_eq!(stack.frames_sent_before_op_request(), Some(1));
    }

    #[test]
    fn stuck_slave_exhausts_attempts() {
        let mut master = open(
            SimStack::new()
                .with_slave(SimSlave::new("EL2008", 0, 8))
                .never_op(),
        );
        assert_eq!(
            master.configure().unwrap(),
            BringUpOutcome::PartialOperational
        );
        assert_eq!(master.phase(), Some(BringUpPhase::Degraded));
        assert!(master.phase().unwrap().is_terminal());
        assert_eq!(master.group_state(), Some(SlaveState::SafeOp));
        assert_eq!(master.stack().frames_sent(), 41);
        assert_eq!(master.stack().state_checks().len(), 41);
    }

    #[test]
    fn custom_attempt_bound() {
        let stack = SimStack::new()
            .with_adapter("eth0", "")
            .with_slave(SimSlave::new("EL2008", 0, 8))
            .never_op();
        let mut master = MasterBuilder::new()
            .op_poll_attempts(5)
            .op_poll_timeout(Duration::from_millis(1))
            .build(stack)
            .unwrap();
        master.open("eth0").unwrap();
        assert_eq!(
            master.configure().unwrap(),
            BringUpOutcome::PartialOperational
        );
        assert_eq!(master.stack().frames_sent(), 6);
    }

    #[test]
    fn io_map_too_small() {
        let stack = SimStack::new()
            .with_adapter("eth0", "")
            .with_slave(SimSlave::new("EL3104", 64, 0))
            .with_slave(SimSlave::new("EL4132", 0, 32));
        let mut master = MasterBuilder::new().io_map_size(8).build(stack).unwrap();
        master.open("eth0").unwrap();
        assert!(matches!(
            master.configure(),
            Err(Error::IoMapOverflow {
                required: 12,
                available: 8
            })
        ));
    }

    #[test]
    fn reconfigure_resets_expectations() {
        let mut master = open(SimStack::new().with_slave(SimSlave::new("EL1008", 8, 0)));
        assert_eq!(master.configure().unwrap(), BringUpOutcome::AllOperational);
        assert_eq!(master.expected_input_wkc(), 1);
        master.stack_mut().clear_slaves();
        assert_eq!(master.configure().unwrap(), BringUpOutcome::NoDevices);
        assert_eq!(master.expected_wkc(), None);
        assert_eq!(master.slave_count(), 0);
        assert_eq!(master.phase(), Some(BringUpPhase::Discovering));
        assert!(!master.phase().unwrap().is_terminal());
    }
}
