//! Backend adapters
//!
//! Each adapter serves the responder side of a `ChannelTransport`.

pub mod simulator;

pub use simulator::{BackendHandle, SimulatedBackend, spawn_simulated};
