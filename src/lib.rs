//! Automaton Pathfinder - evolving agents across a living grid.
//!
//! This crate evolves a population of agents that try to walk from the
//! top-left corner of a grid to the bottom-right corner while the grid itself
//! changes underneath them, driven by a growth/decay cellular automaton.
//! Each agent carries a genome of preferred moves and a small table of
//! learned preferences keyed by its local surroundings.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, run state, statistics and checkpoint records
//! - `compute`: Grid automaton, agent movement, epoch simulation, evolution
//!
//! # Example
//!
//! ```rust,no_run
//! use automaton_pathfinder::{
//!     schema::EvolutionConfig,
//!     compute::{EvolutionEngine, Grid},
//! };
//!
//! // Load terrain
//! let terrain = Grid::parse("0 0 1 0\n0 1 0 0\n0 0 0 1\n1 0 0 0").unwrap();
//!
//! // Create engine and run a few generations
//! let mut engine = EvolutionEngine::new(EvolutionConfig::default(), terrain).unwrap();
//! for _ in 0..10 {
//!     let report = engine.run_generation();
//!     println!("Generation {}: {} arrivals", report.generation, report.arrivals);
//! }
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{Agent, Direction, EvolutionEngine, Grid};
pub use schema::{EvolutionConfig, RunState};
