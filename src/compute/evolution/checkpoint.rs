//! Checkpoint persistence: save, list and restore populations as JSON.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::compute::{
    Agent, Direction, DirectionWeights, Fingerprint, Preferences, genome_len, genome_to_string,
};
use crate::schema::{
    AgentRecord, Checkpoint, CheckpointSummary, PreferenceRecord, RunState, WeightsRecord,
};

/// Errors raised while reading or validating checkpoints.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Checkpoint I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("Checkpoint is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Checkpoint contains no agents")]
    EmptyPopulation,
    #[error("Agent {index}: unknown direction symbol '{symbol}'")]
    UnknownSymbol { index: usize, symbol: char },
    #[error("Agent {index}: genome has {found} symbols, expected {expected}")]
    GenomeLength {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// File name used for the checkpoint of `generation`.
pub fn checkpoint_filename(generation: usize) -> String {
    format!("checkpoint_gen{generation}.json")
}

/// Minimal record for one agent.
pub fn agent_record(agent: &Agent) -> AgentRecord {
    let mut preferences: Vec<PreferenceRecord> = agent
        .preferences
        .iter()
        .map(|(fingerprint, weights)| PreferenceRecord {
            fingerprint: fingerprint.cells().to_vec(),
            weights: WeightsRecord {
                up: weights.get(Direction::Up),
                down: weights.get(Direction::Down),
                left: weights.get(Direction::Left),
                right: weights.get(Direction::Right),
            },
        })
        .collect();
    preferences.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));

    AgentRecord {
        genome: genome_to_string(&agent.genome),
        color: agent.color,
        preferences,
    }
}

/// Rebuild an agent from its record, validating the genome against the grid size.
pub fn restore_agent(
    record: &AgentRecord,
    index: usize,
    width: usize,
    height: usize,
) -> Result<Agent, CheckpointError> {
    let genome = record
        .genome
        .chars()
        .map(|symbol| {
            Direction::from_symbol(symbol).ok_or(CheckpointError::UnknownSymbol { index, symbol })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let expected = genome_len(width, height);
    if genome.len() != expected {
        return Err(CheckpointError::GenomeLength {
            index,
            expected,
            found: genome.len(),
        });
    }

    let preferences: Preferences = record
        .preferences
        .iter()
        .map(|p| {
            let w = p.weights;
            (
                Fingerprint::from_cells(p.fingerprint.clone()),
                DirectionWeights::new(w.up, w.down, w.left, w.right),
            )
        })
        .collect();

    Ok(Agent::new(genome, record.color).with_preferences(preferences))
}

/// Rebuild a population for a `width` x `height` grid.
pub fn restore_population(
    records: &[AgentRecord],
    width: usize,
    height: usize,
) -> Result<Vec<Agent>, CheckpointError> {
    if records.is_empty() {
        return Err(CheckpointError::EmptyPopulation);
    }
    records
        .iter()
        .enumerate()
        .map(|(index, record)| restore_agent(record, index, width, height))
        .collect()
}

/// Capture a population and run state, stamped with the current time.
pub fn snapshot(population: &[Agent], state: &RunState) -> Checkpoint {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Checkpoint {
        timestamp,
        state: *state,
        population: population.iter().map(agent_record).collect(),
    }
}

/// Write a checkpoint for `state.generation` into `dir`.
pub fn save_checkpoint<P: AsRef<Path>>(
    dir: P,
    population: &[Agent],
    state: &RunState,
) -> Result<PathBuf, CheckpointError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let path = dir.join(checkpoint_filename(state.generation));
    let json = serde_json::to_string_pretty(&snapshot(population, state))?;
    fs::write(&path, json)?;

    log::info!(
        "Saved checkpoint for generation {} to {}",
        state.generation,
        path.display()
    );
    Ok(path)
}

/// Read a checkpoint file.
pub fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Checkpoint, CheckpointError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Summaries of the checkpoints in `dir`, newest generation first.
///
/// Files that cannot be read or parsed are skipped.
pub fn list_checkpoints<P: AsRef<Path>>(dir: P) -> Result<Vec<CheckpointSummary>, CheckpointError> {
    let mut summaries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
            continue;
        };
        if !(filename.starts_with("checkpoint_") && filename.ends_with(".json")) {
            continue;
        }

        match load_checkpoint(&path) {
            Ok(checkpoint) => summaries.push(CheckpointSummary {
                filename,
                timestamp: checkpoint.timestamp,
                generation: checkpoint.state.generation,
                best_fitness: checkpoint.state.best_fitness_ever,
            }),
            Err(e) => log::debug!("Skipping {}: {e}", path.display()),
        }
    }

    summaries.sort_by(|a, b| {
        b.generation
            .cmp(&a.generation)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    Ok(summaries)
}

/// Path of the most advanced checkpoint in `dir`, if any.
pub fn latest_checkpoint<P: AsRef<Path>>(dir: P) -> Result<Option<PathBuf>, CheckpointError> {
    let dir = dir.as_ref();
    Ok(list_checkpoints(dir)?
        .into_iter()
        .next()
        .map(|summary| dir.join(summary.filename)))
}
