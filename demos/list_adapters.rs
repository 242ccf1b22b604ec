//! List the network adapters and the slaves found behind the first one.
use ethercat_bus::{
    sim::{SimSlave, SimStack},
    Master,
};
use std::io;

pub fn main() -> Result<(), io::Error> {
    env_logger::init();

    let stack = SimStack::new()
        .with_adapter("eth0", "Intel I210 Gigabit Network Connection")
        .with_adapter("enp3s0", "Realtek RTL8111")
        .with_slave(SimSlave::new("EK1100", 0, 0))
        .with_slave(SimSlave::new("EL1008", 8, 0))
        .with_slave(SimSlave::new("EL2008", 0, 8).al_status(0x001B));
    let mut master = Master::new(stack);

    let adapters = master.list_adapters();
    for (i, adapter) in adapters.iter().enumerate() {
        println!("Adapter {}: {} ({})", i, adapter.name, adapter.description);
    }
    if adapters.is_empty() {
        println!("No adapters found");
        return Ok(());
    }

    master.open(adapters.name(0))?;
    let outcome = master.configure()?;
    println!("Bring-up finished: {:?}", outcome);
    for i in 0..master.slave_count() {
        println!(
            "Slave {}: {:<12} {:<8} in {:>3} bits, out {:>3} bits, AL 0x{:04X} {}",
            i,
            master.name(i)?,
            master.state(i)?.to_string(),
            master.input_bits(i)?,
            master.output_bits(i)?,
            master.al_status_code(i)?,
            master.al_status_description(i)?,
        );
    }
    master.close();
    Ok(())
}
