//! Epoch simulation: one generation's walk from START across an evolving grid.
//!
//! Every tick the grid advances one automaton step (except on the first
//! tick) and each live agent moves once against that frozen snapshot. Agents
//! that die are scored immediately; survivors are scored when the tick
//! budget runs out.

use rand::rngs::StdRng;
use rayon::prelude::*;

use super::agent::{Agent, Direction, MoveOutcome, move_agent};
use super::evolution::{FitnessEvaluator, GenomeRng};
use super::grid::{Cell, Grid, Position};
use crate::schema::{LearningConfig, TickStats};

/// Maximum ticks for an epoch on a `width` x `height` grid.
pub fn tick_budget(width: usize, height: usize) -> usize {
    3 * (width + height)
}

/// Read-only view handed to per-tick observers.
#[derive(Debug, Clone, Copy)]
pub struct TickFrame<'a> {
    /// Grid the agents just moved against.
    pub grid: &'a Grid,
    /// Whole population, dead agents included.
    pub population: &'a [Agent],
    /// Statistics at this tick.
    pub stats: TickStats,
}

/// Outcome of a completed epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EpochSummary {
    /// Ticks simulated.
    pub ticks: usize,
    /// Agents that reached GOAL.
    pub arrivals: usize,
    /// Agents still alive when the budget ran out.
    pub survivors: usize,
}

/// In-progress epoch.
pub struct Epoch {
    grid: Grid,
    evaluator: FitnessEvaluator,
    tick: usize,
    budget: usize,
    alive: usize,
    arrivals: usize,
}

impl Epoch {
    /// Start an epoch on a fresh copy of `terrain`, resetting every agent to START.
    pub fn begin(terrain: &Grid, population: &mut [Agent]) -> Self {
        let start = terrain.start();
        for agent in population.iter_mut() {
            agent.reset(start);
        }

        Self {
            grid: terrain.clone(),
            evaluator: FitnessEvaluator::new(terrain.width(), terrain.height()),
            tick: 0,
            budget: tick_budget(terrain.width(), terrain.height()),
            alive: population.len(),
            arrivals: 0,
        }
    }

    /// Current grid snapshot.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Ticks completed so far.
    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Agents still moving.
    pub fn alive(&self) -> usize {
        self.alive
    }

    pub fn arrivals(&self) -> usize {
        self.arrivals
    }

    pub fn evaluator(&self) -> &FitnessEvaluator {
        &self.evaluator
    }

    /// True once every agent is resolved or the tick budget is spent.
    pub fn is_finished(&self) -> bool {
        self.alive == 0 || self.tick >= self.budget
    }

    /// Run one tick: step the grid (after the first tick), then move every
    /// live agent once.
    ///
    /// Agents move in parallel. Each draws from its own generator, seeded in
    /// population order from `rng`, so a seeded run is reproducible
    /// regardless of scheduling. Returns the number of agents that died.
    pub fn advance(
        &mut self,
        population: &mut [Agent],
        learning: &LearningConfig,
        rng: &mut GenomeRng,
    ) -> usize {
        if self.tick > 0 {
            self.grid = self.grid.step();
        }

        let generators: Vec<StdRng> = population.iter().map(|_| rng.child()).collect();
        let grid = &self.grid;
        let evaluator = &self.evaluator;
        let goal = grid.goal();

        let outcomes: Vec<MoveOutcome> = population
            .par_iter_mut()
            .zip(generators)
            .filter(|(agent, _)| agent.alive)
            .map(|(agent, mut agent_rng)| {
                let outcome = move_agent(agent, grid, goal, learning, &mut agent_rng);
                if outcome.is_terminal() {
                    evaluator.finalize(agent);
                }
                outcome
            })
            .collect();

        let deaths = outcomes.iter().filter(|o| o.is_terminal()).count();
        self.arrivals += outcomes
            .iter()
            .filter(|&&o| o == MoveOutcome::ReachedGoal)
            .count();
        self.alive -= deaths;
        self.tick += 1;
        deaths
    }

    /// Score the survivors at their current positions and close the epoch.
    pub fn finish(self, population: &mut [Agent]) -> EpochSummary {
        let mut survivors = 0;
        for agent in population.iter_mut().filter(|a| a.alive) {
            self.evaluator.finalize(agent);
            survivors += 1;
        }

        log::debug!(
            "Epoch finished after {} ticks: {} arrivals, {} survivors",
            self.tick,
            self.arrivals,
            survivors
        );

        EpochSummary {
            ticks: self.tick,
            arrivals: self.arrivals,
            survivors,
        }
    }
}

/// Simulate a whole epoch without observers.
pub fn simulate_epoch(
    terrain: &Grid,
    population: &mut [Agent],
    learning: &LearningConfig,
    rng: &mut GenomeRng,
) -> EpochSummary {
    let mut epoch = Epoch::begin(terrain, population);
    while !epoch.is_finished() {
        epoch.advance(population, learning, rng);
    }
    epoch.finish(population)
}

/// Result of replaying a fixed direction sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Arrived on GOAL after `steps` moves.
    ReachedGoal { steps: usize },
    /// Move number `step` (0-based) hit an occupied cell at `position`.
    Blocked { step: usize, position: Position },
    /// Move number `step` (0-based) left the grid.
    OutOfBounds { step: usize },
    /// Directions ran out at `position`.
    Exhausted { position: Position },
}

/// Walk `directions` from START, stepping the grid between moves exactly as
/// an epoch does.
pub fn replay_path(terrain: &Grid, directions: &[Direction]) -> ReplayOutcome {
    let mut grid = terrain.clone();
    let goal = grid.goal();
    let mut position = grid.start();

    for (step, direction) in directions.iter().enumerate() {
        if step > 0 {
            grid = grid.step();
        }
        match grid.offset(position, direction.delta()) {
            None => return ReplayOutcome::OutOfBounds { step },
            Some(target) if grid.get(target) == Cell::Occupied => {
                return ReplayOutcome::Blocked {
                    step,
                    position: target,
                };
            }
            Some(target) => position = target,
        }
        if position == goal {
            return ReplayOutcome::ReachedGoal { steps: step + 1 };
        }
    }

    ReplayOutcome::Exhausted { position }
}

/// Unknown symbol in a direction listing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown direction symbol '{symbol}' at position {index}")]
pub struct DirectionParseError {
    pub index: usize,
    pub symbol: char,
}

/// Parse `U`/`D`/`L`/`R` symbols, ignoring whitespace and commas.
pub fn parse_directions(text: &str) -> Result<Vec<Direction>, DirectionParseError> {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .enumerate()
        .map(|(index, symbol)| {
            Direction::from_symbol(symbol.to_ascii_uppercase())
                .ok_or(DirectionParseError { index, symbol })
        })
        .collect()
}
