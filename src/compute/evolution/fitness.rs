//! Fitness and diversity measures for path-finding agents.

use rand::Rng;
use rand::seq::SliceRandom;

use super::genome::genome_distance;
use crate::compute::{Agent, Position};

/// Base of the arrival bonus.
pub const ARRIVAL_BONUS: f32 = 1000.0;
/// Lowest score the standard formula can produce.
pub const FITNESS_FLOOR: f32 = 0.1;

const PROXIMITY_WEIGHT: f32 = 50.0;
const PROGRESS_WEIGHT: f32 = 30.0;
const SURVIVAL_WEIGHT: f32 = 20.0;
const PENALTY_WEIGHT: f32 = 20.0;
const COLLISION_PENALTY: f32 = 0.3;
const EARLY_DEATH_PENALTY: f32 = 0.2;
/// Agents that die with fewer steps than this are penalized.
const EARLY_DEATH_STEPS: usize = 5;
/// Step count at which the survival term saturates.
const SURVIVAL_HORIZON: f32 = 100.0;

/// Fitness awarded on reaching GOAL after `steps` moves.
pub fn arrival_fitness(steps: usize) -> f32 {
    ARRIVAL_BONUS + ARRIVAL_BONUS / steps.max(1) as f32
}

/// Scores agents on a grid of fixed dimensions.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    goal: Position,
    max_distance: f32,
    progress_scale: f32,
}

impl FitnessEvaluator {
    /// Create an evaluator for a `width` x `height` grid with GOAL at the
    /// bottom-right corner.
    pub fn new(width: usize, height: usize) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            goal: Position::new(width.saturating_sub(1), height.saturating_sub(1)),
            max_distance: (w * w + h * h).sqrt(),
            progress_scale: (width + height).max(1) as f32,
        }
    }

    pub fn goal(&self) -> Position {
        self.goal
    }

    /// Standard fitness formula.
    ///
    /// Proximity to GOAL, best progress and survival are rewarded; leaving
    /// the grid and dying early are penalized. The result never drops
    /// below [`FITNESS_FLOOR`].
    pub fn evaluate(&self, agent: &Agent) -> f32 {
        let proximity = 1.0 - agent.position.euclidean(self.goal) / self.max_distance;
        let progress = self.normalized_progress(agent);
        let survival = (agent.steps as f32 / SURVIVAL_HORIZON).min(1.0);

        let mut penalty = 0.0;
        if agent.collided {
            penalty += COLLISION_PENALTY;
        }
        if agent.steps < EARLY_DEATH_STEPS {
            penalty += EARLY_DEATH_PENALTY;
        }

        let score = proximity * PROXIMITY_WEIGHT + progress * PROGRESS_WEIGHT
            + survival * SURVIVAL_WEIGHT
            - penalty * PENALTY_WEIGHT;
        score.max(FITNESS_FLOOR)
    }

    /// Assign final fitness. Agents that reached GOAL keep their arrival bonus.
    pub fn finalize(&self, agent: &mut Agent) {
        if !agent.reached_goal {
            agent.fitness = self.evaluate(agent);
        }
    }

    /// `max_progress` scaled by `width + height`.
    pub fn normalized_progress(&self, agent: &Agent) -> f32 {
        agent.max_progress as f32 / self.progress_scale
    }

    /// Mean normalized progress over a population.
    pub fn average_progress(&self, population: &[Agent]) -> f32 {
        if population.is_empty() {
            return 0.0;
        }
        population
            .iter()
            .map(|a| self.normalized_progress(a))
            .sum::<f32>()
            / population.len() as f32
    }
}

/// Estimate genetic diversity from a random sample of `sample_size` agents.
///
/// Averages the pairwise fraction of differing genome positions. Returns 1.0
/// for populations smaller than two.
pub fn diversity<R: Rng + ?Sized>(population: &[Agent], sample_size: usize, rng: &mut R) -> f32 {
    if population.len() < 2 {
        return 1.0;
    }

    let sample: Vec<&Agent> = population
        .choose_multiple(rng, sample_size.min(population.len()))
        .collect();

    let mut total = 0.0f32;
    let mut pairs = 0usize;
    for (i, a) in sample.iter().enumerate() {
        for b in &sample[i + 1..] {
            total += genome_distance(&a.genome, &b.genome);
            pairs += 1;
        }
    }

    if pairs > 0 { total / pairs as f32 } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Direction, GenomeRng};

    fn agent_at(x: usize, y: usize, steps: usize) -> Agent {
        let mut agent = Agent::new(vec![Direction::Right; 8], [0; 3]);
        agent.position = Position::new(x, y);
        agent.steps = steps;
        agent
    }

    #[test]
    fn test_arrival_fitness() {
        assert_eq!(arrival_fitness(8), 1125.0);
        assert_eq!(arrival_fitness(1), 2000.0);
        assert!(arrival_fitness(10_000) > 1000.0);
    }

    #[test]
    fn test_collision_at_start() {
        let evaluator = FitnessEvaluator::new(3, 3);
        let mut agent = agent_at(0, 0, 0);
        agent.collided = true;

        // proximity = 1 - sqrt(8)/sqrt(18) = 1/3, penalties 0.3 + 0.2.
        let expected = 50.0 / 3.0 - 10.0;
        assert!((evaluator.evaluate(&agent) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_floor_applies() {
        let evaluator = FitnessEvaluator::new(200, 2);
        let mut agent = agent_at(0, 1, 0);
        agent.collided = true;
        assert_eq!(evaluator.evaluate(&agent), FITNESS_FLOOR);
    }

    #[test]
    fn test_survival_saturates() {
        let evaluator = FitnessEvaluator::new(10, 10);
        let a = evaluator.evaluate(&agent_at(5, 5, 100));
        let b = evaluator.evaluate(&agent_at(5, 5, 250));
        assert_eq!(a, b);
    }

    #[test]
    fn test_progress_term() {
        let evaluator = FitnessEvaluator::new(5, 5);
        let mut agent = agent_at(2, 2, 10);
        let base = evaluator.evaluate(&agent);
        agent.max_progress = 4;
        assert!((evaluator.evaluate(&agent) - base - 12.0).abs() < 1e-4);
        assert!((evaluator.normalized_progress(&agent) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_finalize_keeps_arrival_bonus() {
        let evaluator = FitnessEvaluator::new(5, 5);
        let mut agent = agent_at(4, 4, 8);
        agent.reached_goal = true;
        agent.fitness = arrival_fitness(8);
        evaluator.finalize(&mut agent);
        assert_eq!(agent.fitness, 1125.0);
    }

    #[test]
    fn test_diversity_small_population() {
        let mut rng = GenomeRng::new(0);
        assert_eq!(diversity(&[], 20, &mut rng), 1.0);
        assert_eq!(diversity(&[agent_at(0, 0, 0)], 20, &mut rng), 1.0);
    }

    #[test]
    fn test_diversity_identical_is_zero() {
        let mut rng = GenomeRng::new(0);
        let population: Vec<Agent> = (0..30).map(|_| agent_at(0, 0, 0)).collect();
        assert_eq!(diversity(&population, 20, &mut rng), 0.0);
    }

    #[test]
    fn test_diversity_opposites_is_one() {
        let mut rng = GenomeRng::new(0);
        let population = vec![
            Agent::new(vec![Direction::Up; 6], [0; 3]),
            Agent::new(vec![Direction::Down; 6], [0; 3]),
        ];
        assert_eq!(diversity(&population, 20, &mut rng), 1.0);
    }
}
