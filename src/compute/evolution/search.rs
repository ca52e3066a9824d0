//! Evolution controller: selection, reproduction and the generation loop.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use rand::seq::SliceRandom;

use crate::compute::{Agent, Epoch, Grid, TickFrame, create_batch, random_color};
use crate::schema::{
    Checkpoint, ConfigError, EvolutionConfig, EvolutionHistory, EvolutionResult,
    GenerationReport, RunState, StopReason, TickStats,
};

use super::checkpoint::{CheckpointError, load_checkpoint, restore_population, snapshot};
use super::fitness::{FitnessEvaluator, diversity};
use super::genome::{GenomeRng, crossover_genomes, mutate_genome};

/// Upper bound of the adaptive mutation rate.
pub const MAX_MUTATION_RATE: f32 = 0.5;

/// Mutation rate scaled up by low diversity and by stagnation.
///
/// `base * (1 + 2(1 - diversity)) * (1 + 2 * stagnation / threshold)`,
/// capped at [`MAX_MUTATION_RATE`].
pub fn adaptive_mutation_rate(
    base: f32,
    diversity: f32,
    stagnation: usize,
    threshold: usize,
) -> f32 {
    let diversity_factor = 1.0 + 2.0 * (1.0 - diversity);
    let stagnation_factor = 1.0 + 2.0 * stagnation as f32 / threshold.max(1) as f32;
    (base * diversity_factor * stagnation_factor).min(MAX_MUTATION_RATE)
}

/// Tournament selection. Returns an index into `population`.
///
/// Candidates are agents other than `exclude` with positive fitness. If fewer
/// than `tournament_size` qualify, the fitness filter is dropped; if none
/// remain at all, any agent is picked uniformly. `None` only for an empty
/// population.
pub fn select_parent<R: Rng + ?Sized>(
    population: &[Agent],
    exclude: Option<usize>,
    tournament_size: usize,
    rng: &mut R,
) -> Option<usize> {
    if population.is_empty() {
        return None;
    }

    let eligible = |i: &usize| Some(*i) != exclude;
    let mut candidates: Vec<usize> = (0..population.len())
        .filter(eligible)
        .filter(|&i| population[i].fitness > 0.0)
        .collect();
    if candidates.len() < tournament_size {
        candidates = (0..population.len()).filter(eligible).collect();
    }
    if candidates.is_empty() {
        return Some(rng.gen_range(0..population.len()));
    }

    candidates
        .choose_multiple(rng, tournament_size.min(candidates.len()))
        .copied()
        .max_by(|&a, &b| population[a].fitness.total_cmp(&population[b].fitness))
}

/// Two-point crossover of two agents.
///
/// Each child also inherits its own parent's preferences at half strength.
pub fn crossover<R: Rng + ?Sized>(rng: &mut R, first: &Agent, second: &Agent) -> (Agent, Agent) {
    let (genome1, genome2) = crossover_genomes(rng, &first.genome, &second.genome);
    let child1 = Agent::new(genome1, random_color(rng)).with_preferences(first.preferences.halved());
    let child2 =
        Agent::new(genome2, random_color(rng)).with_preferences(second.preferences.halved());
    (child1, child2)
}

/// What went into building a generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assembly {
    /// Best fitness of the generation that was replaced.
    pub generation_best: f32,
    /// Rate used for mutating offspring.
    pub mutation_rate: f32,
    /// Agents copied unchanged.
    pub elites: usize,
    /// Fresh agents injected.
    pub immigrants: usize,
    /// Agents bred from parents.
    pub offspring: usize,
    /// Whether stagnation triggered the larger immigration.
    pub immigration_surge: bool,
}

/// Build the next generation from a scored population.
///
/// Order: stagnation update, sort by fitness, elites, immigrants, then
/// offspring until the configured size is reached. Returns the new
/// population and the updated run state; nothing else is touched.
pub fn next_generation<R: Rng + ?Sized>(
    mut population: Vec<Agent>,
    width: usize,
    height: usize,
    config: &EvolutionConfig,
    mut state: RunState,
    diversity: f32,
    rng: &mut R,
) -> (Vec<Agent>, RunState, Assembly) {
    let genetic = &config.genetic;
    let size = config.population.size;

    let generation_best = population
        .iter()
        .map(|a| a.fitness)
        .fold(0.0f32, f32::max);
    state.record_generation_best(generation_best);

    let mutation_rate = adaptive_mutation_rate(
        genetic.base_mutation_rate,
        diversity,
        state.stagnation_count,
        genetic.stagnation_threshold,
    );

    population.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

    let mut next = Vec::with_capacity(size);

    let elites = genetic.elite_count(size).min(population.len());
    next.extend(population[..elites].iter().map(|a| a.elite_copy(rng)));

    let immigration_surge = state.stagnation_count > genetic.stagnation_threshold;
    if immigration_surge {
        log::warn!(
            "Stagnated for {} generations, injecting extra immigrants",
            state.stagnation_count
        );
        state.stagnation_count = 0;
    }
    let immigrants = genetic
        .immigrant_count(size, immigration_surge)
        .min(size - next.len());
    for _ in 0..immigrants {
        let biased = rng.gen_bool(genetic.immigrant_bias_probability as f64);
        next.push(Agent::create(rng, width, height, biased));
    }

    let bred_from = next.len();
    while next.len() < size {
        let Some(first) = select_parent(&population, None, genetic.tournament_size, rng) else {
            next.push(Agent::create(rng, width, height, false));
            continue;
        };
        let second = select_parent(&population, Some(first), genetic.tournament_size, rng)
            .unwrap_or(first);
        let (parent1, parent2) = (&population[first], &population[second]);

        let (mut child1, mut child2) = if rng.r#gen::<f32>() < genetic.crossover_rate {
            crossover(rng, parent1, parent2)
        } else {
            (
                Agent::new(parent1.genome.clone(), random_color(rng)),
                Agent::new(parent2.genome.clone(), random_color(rng)),
            )
        };

        if rng.r#gen::<f32>() < mutation_rate {
            mutate_genome(rng, &mut child1.genome);
        }
        if rng.r#gen::<f32>() < mutation_rate {
            mutate_genome(rng, &mut child2.genome);
        }

        next.push(child1);
        if next.len() < size {
            next.push(child2);
        }
    }

    state.generation += 1;

    let assembly = Assembly {
        generation_best,
        mutation_rate,
        elites,
        immigrants,
        offspring: next.len() - bred_from,
        immigration_surge,
    };
    (next, state, assembly)
}

/// Runs generations of simulate-then-evolve on a fixed terrain.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    terrain: Grid,
    rng: GenomeRng,
    population: Vec<Agent>,
    state: RunState,
    history: EvolutionHistory,
    diversity: f32,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create a new evolution engine for `terrain`.
    pub fn new(config: EvolutionConfig, terrain: Grid) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = config
            .random_seed
            .map_or_else(GenomeRng::random, GenomeRng::new);

        Ok(Self {
            config,
            terrain,
            rng,
            population: Vec::new(),
            state: RunState::default(),
            history: EvolutionHistory::default(),
            diversity: 1.0,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Replace the population with fresh agents and reset the run state.
    pub fn initialize(&mut self) {
        self.population = create_batch(
            &mut self.rng,
            self.terrain.width(),
            self.terrain.height(),
            self.config.population.size,
            self.config.genetic.biased_fraction,
        );
        self.state = RunState::default();
        self.history = EvolutionHistory::default();
        self.diversity = 1.0;
    }

    /// Continue from a checkpoint.
    ///
    /// The saved population is used as is, even if its size differs from the
    /// configured one; the next generation restores the configured size.
    /// History and diversity start over.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.population = restore_population(
            &checkpoint.population,
            self.terrain.width(),
            self.terrain.height(),
        )?;
        self.state = checkpoint.state;
        self.history = EvolutionHistory::default();
        self.diversity = 1.0;
        log::info!(
            "Restored {} agents at generation {}",
            self.population.len(),
            self.state.generation
        );
        Ok(())
    }

    /// Restore from a checkpoint file, falling back to a fresh population.
    ///
    /// Returns whether the checkpoint was used.
    pub fn restore_or_initialize<P: AsRef<Path>>(&mut self, path: P) -> bool {
        let path = path.as_ref();
        match load_checkpoint(path).and_then(|c| self.restore(&c)) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "Could not restore {}: {e}; starting a fresh population",
                    path.display()
                );
                self.initialize();
                false
            }
        }
    }

    /// Current population.
    pub fn population(&self) -> &[Agent] {
        &self.population
    }

    /// Run-wide state.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    pub fn terrain(&self) -> &Grid {
        &self.terrain
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Checkpoint of the current population and state.
    pub fn checkpoint(&self) -> Checkpoint {
        snapshot(&self.population, &self.state)
    }

    fn tick_stats(&self, epoch: &Epoch, tick: usize) -> TickStats {
        let scored: Vec<f32> = self
            .population
            .iter()
            .map(|a| a.fitness)
            .filter(|&f| f > 0.0)
            .collect();
        let current_best = scored.iter().copied().fold(0.0f32, f32::max);
        let avg_fitness = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f32>() / scored.len() as f32
        };

        TickStats {
            generation: self.state.generation,
            tick,
            alive: epoch.alive(),
            best_fitness_ever: self.state.best_fitness_ever.max(current_best),
            avg_fitness,
            diversity: self.diversity,
            mutation_rate: adaptive_mutation_rate(
                self.config.genetic.base_mutation_rate,
                self.diversity,
                self.state.stagnation_count,
                self.config.genetic.stagnation_threshold,
            ),
            stagnation_count: self.state.stagnation_count,
            avg_progress: epoch.evaluator().average_progress(&self.population),
        }
    }

    /// Simulate one generation, reporting every tick, then breed the next.
    pub fn run_generation_with_callback<F>(&mut self, mut on_tick: F) -> GenerationReport
    where
        F: FnMut(&TickFrame),
    {
        if self.population.is_empty() {
            self.initialize();
        }

        let sample_size = self.config.evaluation.diversity_sample_size;
        let interval = self.config.evaluation.display_diversity_interval.max(1);

        let mut epoch = Epoch::begin(&self.terrain, &mut self.population);
        while !epoch.is_finished() {
            let tick = epoch.tick();
            epoch.advance(&mut self.population, &self.config.learning, &mut self.rng);
            if tick % interval == 0 {
                self.diversity = diversity(&self.population, sample_size, &mut self.rng);
            }
            let stats = self.tick_stats(&epoch, tick);
            on_tick(&TickFrame {
                grid: epoch.grid(),
                population: &self.population,
                stats,
            });
        }
        let summary = epoch.finish(&mut self.population);

        let evaluator = FitnessEvaluator::new(self.terrain.width(), self.terrain.height());
        let avg_progress = evaluator.average_progress(&self.population);
        let avg_fitness = self.population.iter().map(|a| a.fitness).sum::<f32>()
            / self.population.len().max(1) as f32;
        self.diversity = diversity(&self.population, sample_size, &mut self.rng);

        let generation = self.state.generation;
        let (next, state, assembly) = next_generation(
            std::mem::take(&mut self.population),
            self.terrain.width(),
            self.terrain.height(),
            &self.config,
            self.state,
            self.diversity,
            &mut self.rng,
        );
        self.population = next;
        self.state = state;

        let report = GenerationReport {
            generation,
            ticks: summary.ticks,
            arrivals: summary.arrivals,
            generation_best: assembly.generation_best,
            avg_fitness,
            diversity: self.diversity,
            mutation_rate: assembly.mutation_rate,
            stagnation_count: self.state.stagnation_count,
            immigration_surge: assembly.immigration_surge,
            avg_progress,
        };
        self.history.push(&report, self.state.best_fitness_ever);

        log::info!(
            "Generation {}: best={:.1} avg={:.1} div={:.2} mut={:.3} arrivals={}",
            generation,
            self.state.best_fitness_ever,
            avg_fitness,
            self.diversity,
            assembly.mutation_rate,
            summary.arrivals
        );
        log::debug!(
            "Generation {} assembled from {} elites, {} immigrants, {} offspring",
            generation,
            assembly.elites,
            assembly.immigrants,
            assembly.offspring
        );

        report
    }

    /// Simulate and breed one generation.
    pub fn run_generation(&mut self) -> GenerationReport {
        self.run_generation_with_callback(|_| {})
    }

    /// Check if evolution should stop.
    fn should_stop(&self, generations_run: usize, limit: usize) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }
        if generations_run >= limit {
            return Some(StopReason::MaxGenerations);
        }
        None
    }

    /// Run up to `generations` generations (the configured maximum when
    /// `None`), calling `on_generation` after each one.
    pub fn run_with_callback<F>(
        &mut self,
        generations: Option<usize>,
        mut on_generation: F,
    ) -> EvolutionResult
    where
        F: FnMut(&Self, &GenerationReport),
    {
        let limit = generations.unwrap_or(self.config.population.max_generations);
        let mut generations_run = 0;

        let stop_reason = loop {
            if let Some(reason) = self.should_stop(generations_run, limit) {
                break reason;
            }
            let report = self.run_generation();
            generations_run += 1;
            on_generation(self, &report);
        };

        EvolutionResult {
            state: self.state,
            generations_run,
            stop_reason,
            history: self.history.clone(),
        }
    }

    /// Run evolution (blocking).
    pub fn run(&mut self, generations: Option<usize>) -> EvolutionResult {
        self.run_with_callback(generations, |_, _| {})
    }
}
