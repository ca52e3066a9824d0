//! Checkpoint records: the minimal per-agent data needed to rebuild a population.

use serde::{Deserialize, Serialize};

use super::RunState;

/// A saved run: state scalars plus one record per agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Seconds since the Unix epoch at save time.
    #[serde(default)]
    pub timestamp: u64,
    /// Run-wide scalars.
    pub state: RunState,
    /// Population in saved order.
    pub population: Vec<AgentRecord>,
}

/// Minimal agent record.
///
/// Position and other per-epoch fields are regenerated on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Genome as a string of `U`, `D`, `L`, `R` symbols.
    pub genome: String,
    /// Display color.
    #[serde(default)]
    pub color: [u8; 3],
    /// Learned preference table; absent means empty.
    #[serde(default)]
    pub preferences: Vec<PreferenceRecord>,
}

/// One learned-preference entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    /// Local neighborhood cells in row-major order (-1 outside the grid).
    pub fingerprint: Vec<i8>,
    /// Per-direction preference.
    pub weights: WeightsRecord,
}

/// Per-direction preference values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct WeightsRecord {
    #[serde(default)]
    pub up: f32,
    #[serde(default)]
    pub down: f32,
    #[serde(default)]
    pub left: f32,
    #[serde(default)]
    pub right: f32,
}

/// Summary of a checkpoint file on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    /// File name within the checkpoint directory.
    pub filename: String,
    /// Save time (seconds since the Unix epoch).
    pub timestamp: u64,
    /// Generation stored in the checkpoint.
    pub generation: usize,
    /// Best fitness stored in the checkpoint.
    pub best_fitness: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_preferences_default_to_empty() {
        let json = r#"{ "genome": "UDLR", "color": [10, 20, 30] }"#;
        let record: AgentRecord = serde_json::from_str(json).unwrap();
        assert!(record.preferences.is_empty());
        assert_eq!(record.color, [10, 20, 30]);
    }

    #[test]
    fn test_missing_state_fields_default() {
        let json = r#"{ "state": { "generation": 4 }, "population": [] }"#;
        let checkpoint: Checkpoint = serde_json::from_str(json).unwrap();
        assert_eq!(checkpoint.state.generation, 4);
        assert_eq!(checkpoint.state.stagnation_count, 0);
        assert_eq!(checkpoint.timestamp, 0);
    }

    #[test]
    fn test_genome_is_required() {
        let json = r#"{ "color": [1, 2, 3] }"#;
        assert!(serde_json::from_str::<AgentRecord>(json).is_err());
    }
}
