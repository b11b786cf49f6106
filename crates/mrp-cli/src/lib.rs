//! MRP command line support
//!
//! - [`simulate`]: end-to-end protocol simulation
//! - [`inspect`]: offline verification, statistics and trails over a journal
//! - [`logging`]: tracing subscriber setup

#![allow(missing_docs)]

pub mod inspect;
pub mod logging;
pub mod simulate;

pub use simulate::{run_simulation, SimulationConfig, SimulationReport};
