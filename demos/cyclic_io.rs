//! Bring the bus up and run a running-light on the digital outputs while
//! watching the working counter.
use ethercat_bus::{
    sim::{SimSlave, SimStack},
    BringUpOutcome, MasterBuilder, WcState,
};
use std::{env, io, thread, time::Duration};

const OUTPUT_SLAVE: usize = 2;
const INPUT_SLAVE: usize = 1;

pub fn main() -> Result<(), io::Error> {
    env_logger::init();
    let cycles: u32 = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);

    let stack = SimStack::new()
        .with_adapter("eth0", "Intel I210 Gigabit Network Connection")
        .with_slave(SimSlave::new("EK1100", 0, 0))
        .with_slave(SimSlave::new("EL1008", 8, 0))
        .with_slave(SimSlave::new("EL2008", 0, 8))
        .op_after_cycles(3);
    let mut master = MasterBuilder::new()
        .receive_timeout(Duration::from_micros(1_000))
        .build(stack)?;

    master.open("eth0")?;
    match master.configure()? {
        BringUpOutcome::AllOperational => log::info!("All slaves operational"),
        BringUpOutcome::NoDevices => {
            println!("No devices found");
            master.close();
            return Ok(());
        }
        BringUpOutcome::PartialOperational => {
            log::warn!("Running with degraded bus, state {:?}", master.group_state())
        }
    }
    let expected = match master.expected_wkc() {
        Some(expected) => expected,
        None => return Ok(()),
    };

    let cycle_time = Duration::from_millis(10);
    let mut light = 1u8;
    for cycle in 0..cycles {
        master.write_output_byte(OUTPUT_SLAVE, 0, light)?;
        master.stack_mut().set_input(INPUT_SLAVE, 0, light);
        let wkc = master.exchange_cycle()?;
        match expected.classify(wkc) {
            WcState::Complete => {}
            state => log::warn!("Cycle {}: working counter {} ({:?})", cycle, wkc, state),
        }
        log::debug!(
            "Cycle {}: out {:08b} in {:08b}",
            cycle,
            light,
            master.read_input_byte(INPUT_SLAVE, 0)?
        );
        light = light.rotate_left(1);
        thread::sleep(cycle_time);
    }

    master.close();
    Ok(())
}
