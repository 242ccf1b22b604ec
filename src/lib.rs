// Part of ethercat-rs. Copyright 2018-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Bring-up and cyclic process data exchange for an EtherCAT bus.
//!
//! The frame level work (sockets, datagrams, slave tables) is left to an
//! EtherCAT stack implementing [`EtherCatStack`]. [`Master`] sequences that
//! stack: it lists adapters, opens one, drives all slaves from discovery to
//! OP with bounded retries, exchanges process data one cycle at a time and
//! gives bounds-checked access to every slave's inputs and outputs.
//!
//! ```no_run
//! # use ethercat_bus::{EtherCatStack, Master, BringUpOutcome};
//! # fn run<S: EtherCatStack>(stack: S) -> ethercat_bus::Result<()> {
//! let mut master = Master::new(stack);
//! let adapters = master.list_adapters();
//! master.open(adapters.name(0))?;
//! if master.configure()? == BringUpOutcome::AllOperational {
//!     let expected = master.expected_wkc();
//!     master.write_output_byte(0, 0, 0xFF)?;
//!     let wkc = master.exchange_cycle()?;
//!     println!("wkc {} ({:?})", wkc, expected.map(|e| e.classify(wkc)));
//! }
//! master.close();
//! # Ok(())
//! # }
//! ```
//!
//! A [`Master`] is meant to be driven from a single thread; wrap it in a
//! [`SharedMaster`] to hand it between threads.

mod adapter;
pub mod al_status;
mod bringup;
mod config;
mod convert;
mod master;
#[cfg(feature = "sim")]
pub mod sim;
mod stack;
mod types;

pub use self::{
    adapter::{Adapter, AdapterList},
    config::{MasterBuilder, MasterConfig, IO_MAP_SIZE, TIMEOUT_RET, TIMEOUT_STATE},
    convert::MAX_LABEL_LEN,
    master::{BusSession, Master, SharedMaster},
    stack::EtherCatStack,
    types::*,
};
