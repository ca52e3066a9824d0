//! Compute module - Grid automaton, agents, epochs and evolution.

mod agent;
mod epoch;
mod grid;
mod pathfind;

pub mod evolution;

pub use agent::*;
pub use epoch::*;
pub use evolution::*;
pub use grid::*;
pub use pathfind::*;
