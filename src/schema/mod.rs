//! Schema module - Configuration, run-state and checkpoint types.

mod config;
mod evolution;
mod snapshot;

pub use config::*;
pub use evolution::*;
pub use snapshot::*;
