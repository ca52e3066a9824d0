//! Configuration types for evolutionary path search.

use serde::{Deserialize, Serialize};

/// Top-level configuration for an evolution run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Population and generation settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Selection, crossover, mutation and immigration parameters.
    #[serde(default)]
    pub genetic: GeneticConfig,
    /// Per-agent reinforcement of local-neighborhood preferences.
    #[serde(default)]
    pub learning: LearningConfig,
    /// Diversity measurement settings.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Checkpoint cadence and location.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of agents in every generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Maximum number of generations for a run.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_generations: default_max_generations(),
        }
    }
}

fn default_population_size() -> usize {
    500
}
fn default_max_generations() -> usize {
    10_000
}

/// Genetic operator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticConfig {
    /// Base mutation probability before adaptive scaling.
    #[serde(default = "default_base_mutation_rate")]
    pub base_mutation_rate: f32,
    /// Fraction of the population copied verbatim (at least 2 agents).
    #[serde(default = "default_elitism_rate")]
    pub elitism_rate: f32,
    /// Probability that a parent pair is recombined instead of cloned.
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f32,
    /// Fraction of brand-new agents injected every generation.
    #[serde(default = "default_immigration_rate")]
    pub immigration_rate: f32,
    /// Generations without improvement before an immigration surge.
    #[serde(default = "default_stagnation_threshold")]
    pub stagnation_threshold: usize,
    /// Factor applied to the immigration rate during a surge.
    #[serde(default = "default_stagnation_immigration_multiplier")]
    pub stagnation_immigration_multiplier: f32,
    /// Tournament size for parent selection.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Fraction of a freshly created population seeded with goal-biased genomes.
    #[serde(default = "default_biased_fraction")]
    pub biased_fraction: f32,
    /// Probability that an immigrant carries a goal-biased genome.
    #[serde(default = "default_immigrant_bias_probability")]
    pub immigrant_bias_probability: f32,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            base_mutation_rate: default_base_mutation_rate(),
            elitism_rate: default_elitism_rate(),
            crossover_rate: default_crossover_rate(),
            immigration_rate: default_immigration_rate(),
            stagnation_threshold: default_stagnation_threshold(),
            stagnation_immigration_multiplier: default_stagnation_immigration_multiplier(),
            tournament_size: default_tournament_size(),
            biased_fraction: default_biased_fraction(),
            immigrant_bias_probability: default_immigrant_bias_probability(),
        }
    }
}

fn default_base_mutation_rate() -> f32 {
    0.01
}
fn default_elitism_rate() -> f32 {
    0.1
}
fn default_crossover_rate() -> f32 {
    0.7
}
fn default_immigration_rate() -> f32 {
    0.1
}
fn default_stagnation_threshold() -> usize {
    15
}
fn default_stagnation_immigration_multiplier() -> f32 {
    3.0
}
fn default_tournament_size() -> usize {
    5
}
fn default_biased_fraction() -> f32 {
    0.3
}
fn default_immigrant_bias_probability() -> f32 {
    0.5
}

/// Reinforcement of learned direction preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Increment/decrement applied to a preference after each move.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    /// Radius of the square window read as the local fingerprint.
    #[serde(default = "default_fingerprint_radius")]
    pub fingerprint_radius: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            fingerprint_radius: default_fingerprint_radius(),
        }
    }
}

fn default_learning_rate() -> f32 {
    0.1
}
fn default_fingerprint_radius() -> usize {
    2
}

/// Diversity measurement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Number of agents sampled when estimating genetic diversity.
    #[serde(default = "default_diversity_sample_size")]
    pub diversity_sample_size: usize,
    /// Ticks between diversity refreshes in per-tick statistics.
    #[serde(default = "default_display_diversity_interval")]
    pub display_diversity_interval: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            diversity_sample_size: default_diversity_sample_size(),
            display_diversity_interval: default_display_diversity_interval(),
        }
    }
}

fn default_diversity_sample_size() -> usize {
    20
}
fn default_display_diversity_interval() -> usize {
    10
}

/// Checkpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Save a checkpoint every N generations (0 disables autosave).
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval: usize,
    /// Directory checkpoints are written to and listed from.
    #[serde(default = "default_checkpoint_directory")]
    pub directory: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            autosave_interval: default_autosave_interval(),
            directory: default_checkpoint_directory(),
        }
    }
}

fn default_autosave_interval() -> usize {
    50
}
fn default_checkpoint_directory() -> String {
    ".".to_string()
}

impl GeneticConfig {
    /// Number of elite agents carried over for a population of `size`.
    pub fn elite_count(&self, size: usize) -> usize {
        ((size as f32 * self.elitism_rate) as usize).max(2).min(size)
    }

    /// Number of immigrants injected, surging when stagnation is exceeded.
    pub fn immigrant_count(&self, size: usize, surge: bool) -> usize {
        let rate = if surge {
            self.immigration_rate * self.stagnation_immigration_multiplier
        } else {
            self.immigration_rate
        };
        (size as f32 * rate) as usize
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2, got {0}")]
    PopulationTooSmall(usize),
    #[error("{name} must be within [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f32 },
    #[error("Stagnation threshold must be non-zero")]
    ZeroStagnationThreshold,
    #[error("Tournament size must be non-zero")]
    ZeroTournamentSize,
    #[error("Diversity sample size must be at least 2")]
    DiversitySampleTooSmall,
    #[error("Immigration multiplier must be non-negative, got {0}")]
    NegativeMultiplier(f32),
    #[error("Learning rate must be finite and non-negative, got {0}")]
    InvalidLearningRate(f32),
}

impl EvolutionConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population.size < 2 {
            return Err(ConfigError::PopulationTooSmall(self.population.size));
        }

        let check_rate = |name: &'static str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::RateOutOfRange { name, value })
            }
        };

        let g = &self.genetic;
        check_rate("base_mutation_rate", g.base_mutation_rate)?;
        check_rate("elitism_rate", g.elitism_rate)?;
        check_rate("crossover_rate", g.crossover_rate)?;
        check_rate("immigration_rate", g.immigration_rate)?;
        check_rate("biased_fraction", g.biased_fraction)?;
        check_rate("immigrant_bias_probability", g.immigrant_bias_probability)?;

        if g.stagnation_threshold == 0 {
            return Err(ConfigError::ZeroStagnationThreshold);
        }
        if g.tournament_size == 0 {
            return Err(ConfigError::ZeroTournamentSize);
        }
        if g.stagnation_immigration_multiplier < 0.0 {
            return Err(ConfigError::NegativeMultiplier(
                g.stagnation_immigration_multiplier,
            ));
        }
        if self.evaluation.diversity_sample_size < 2 {
            return Err(ConfigError::DiversitySampleTooSmall);
        }
        let lr = self.learning.learning_rate;
        if !lr.is_finite() || lr < 0.0 {
            return Err(ConfigError::InvalidLearningRate(lr));
        }

        Ok(())
    }
}
