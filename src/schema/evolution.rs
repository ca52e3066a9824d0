//! Run-state, progress and history types for evolutionary path search.
//!
//! These records are what the engine exposes to the outside world: the
//! state threaded from one generation to the next, the per-tick statistics
//! handed to renderers, and the rolling history used for plotting.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default capacity of the rolling history windows.
pub const HISTORY_CAPACITY: usize = 500;

/// Scalars carried across generations within one run.
///
/// This is also the `state` block of a checkpoint file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RunState {
    /// Index of the generation about to be simulated.
    #[serde(default)]
    pub generation: usize,
    /// Highest fitness observed since the run started.
    #[serde(default)]
    pub best_fitness_ever: f32,
    /// Reference best used for stagnation detection.
    #[serde(default)]
    pub last_best_fitness: f32,
    /// Consecutive generations without improving on `last_best_fitness`.
    #[serde(default)]
    pub stagnation_count: usize,
}

impl RunState {
    /// Record a generation's best fitness.
    ///
    /// Stagnation grows when the best did not exceed the previous reference,
    /// otherwise it resets and the reference advances.
    pub fn record_generation_best(&mut self, generation_best: f32) {
        if generation_best <= self.last_best_fitness {
            self.stagnation_count += 1;
        } else {
            self.stagnation_count = 0;
            self.last_best_fitness = generation_best;
        }
        if generation_best > self.best_fitness_ever {
            self.best_fitness_ever = generation_best;
        }
    }
}

/// Per-tick statistics for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TickStats {
    /// Generation index.
    pub generation: usize,
    /// Tick index within the epoch.
    pub tick: usize,
    /// Agents still moving.
    pub alive: usize,
    /// Best fitness since the run started.
    pub best_fitness_ever: f32,
    /// Mean fitness over agents already scored.
    pub avg_fitness: f32,
    /// Most recent diversity estimate.
    pub diversity: f32,
    /// Mutation rate that would apply if the generation ended now.
    pub mutation_rate: f32,
    /// Current stagnation counter.
    pub stagnation_count: usize,
    /// Mean `max_progress` normalized by `width + height`.
    pub avg_progress: f32,
}

/// Summary of one completed generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Generation that was simulated.
    pub generation: usize,
    /// Ticks the epoch ran for.
    pub ticks: usize,
    /// Agents that reached the goal.
    pub arrivals: usize,
    /// Best fitness this generation.
    pub generation_best: f32,
    /// Mean fitness this generation.
    pub avg_fitness: f32,
    /// Diversity measured after the epoch.
    pub diversity: f32,
    /// Adaptive mutation rate used to build the next generation.
    pub mutation_rate: f32,
    /// Stagnation counter after the update.
    pub stagnation_count: usize,
    /// Whether the stagnation threshold triggered an immigration surge.
    pub immigration_surge: bool,
    /// Mean normalized progress.
    pub avg_progress: f32,
}

/// Rolling statistics history for plotting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionHistory {
    capacity: usize,
    /// Generation indices.
    pub generation: VecDeque<usize>,
    /// Best fitness since the run started, per generation.
    pub best_fitness: VecDeque<f32>,
    /// Average fitness per generation.
    pub avg_fitness: VecDeque<f32>,
    /// Diversity per generation.
    pub diversity: VecDeque<f32>,
    /// Mutation rate per generation.
    pub mutation_rate: VecDeque<f32>,
    /// Average normalized progress per generation.
    pub progress: VecDeque<f32>,
}

impl Default for EvolutionHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl EvolutionHistory {
    /// Create a history keeping at most `capacity` entries per series.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            generation: VecDeque::new(),
            best_fitness: VecDeque::new(),
            avg_fitness: VecDeque::new(),
            diversity: VecDeque::new(),
            mutation_rate: VecDeque::new(),
            progress: VecDeque::new(),
        }
    }

    /// Append a completed generation, evicting the oldest entry when full.
    pub fn push(&mut self, report: &GenerationReport, best_fitness_ever: f32) {
        if self.generation.len() == self.capacity {
            self.generation.pop_front();
            self.best_fitness.pop_front();
            self.avg_fitness.pop_front();
            self.diversity.pop_front();
            self.mutation_rate.pop_front();
            self.progress.pop_front();
        }
        self.generation.push_back(report.generation);
        self.best_fitness.push_back(best_fitness_ever);
        self.avg_fitness.push_back(report.avg_fitness);
        self.diversity.push_back(report.diversity);
        self.mutation_rate.push_back(report.mutation_rate);
        self.progress.push_back(report.avg_progress);
    }

    /// Number of generations recorded.
    pub fn len(&self) -> usize {
        self.generation.len()
    }

    /// Check if nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.generation.is_empty()
    }
}

/// Reason a run stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached maximum generations.
    MaxGenerations,
    /// User cancelled.
    Cancelled,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Run state at the end of the run.
    pub state: RunState,
    /// Generations simulated by this call.
    pub generations_run: usize,
    /// Reason for stopping.
    pub stop_reason: StopReason,
    /// History for analysis.
    pub history: EvolutionHistory,
}
