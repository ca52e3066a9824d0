//! Evolutionary search for agents that cross an evolving grid.
//!
//! # Overview
//!
//! The evolutionary search system consists of:
//!
//! - **Genome Operations** (`genome`): random generation, crossover, mutation
//! - **Fitness** (`fitness`): post-epoch scoring and genetic diversity
//! - **Search** (`search`): selection, generation assembly and the run loop
//! - **Checkpoints** (`checkpoint`): JSON persistence of populations
//!
//! # Example
//!
//! ```rust,no_run
//! use automaton_pathfinder::compute::{EvolutionEngine, Grid};
//! use automaton_pathfinder::schema::EvolutionConfig;
//!
//! let terrain = Grid::load("terrain.txt").unwrap();
//! let mut engine = EvolutionEngine::new(EvolutionConfig::default(), terrain).unwrap();
//!
//! let result = engine.run_with_callback(Some(100), |_, report| {
//!     println!("Generation {}: best = {:.1}", report.generation, report.generation_best);
//! });
//! println!("Best fitness ever: {:.1}", result.state.best_fitness_ever);
//! ```
//!
//! # Generation assembly
//!
//! After every epoch the population is sorted by fitness. The top agents are
//! copied with their learned preferences, a share of fresh immigrants is
//! injected (larger when the run has stagnated), and the remaining slots are
//! bred by tournament selection, two-point crossover and mutation at an
//! adaptive rate.

mod checkpoint;
mod fitness;
mod genome;
mod search;

pub use checkpoint::{
    CheckpointError, agent_record, checkpoint_filename, latest_checkpoint, list_checkpoints,
    load_checkpoint, restore_agent, restore_population, save_checkpoint, snapshot,
};
pub use fitness::{
    ARRIVAL_BONUS, FITNESS_FLOOR, FitnessEvaluator, arrival_fitness, diversity,
};
pub use genome::{
    GenomeRng, Mutation, TowardGoal, apply_mutation, crossover_genomes, genome_distance,
    mutate_genome, random_genome,
};
pub use search::{
    Assembly, EvolutionEngine, MAX_MUTATION_RATE, adaptive_mutation_rate, crossover,
    next_generation, select_parent,
};
