//! Batch enrichment across (ward, language) units.
//!
//! Walks the configured unit enumeration, attaching one embedding per voter
//! and writing each unit's `{unit}_embedded.json`. Units are bulkheaded: a
//! missing input, a provider failure, or a blown deadline fails that unit
//! only, and the run ends with a report of succeeded and failed units.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use rollcall_shared::{Result, RollcallError, RunId, UnitId, WardRecord, artifact};

use crate::provider::EmbeddingProvider;

/// Configuration for one batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory holding the extracted `{unit}.json` inputs.
    pub data_dir: PathBuf,
    /// Directory the `{unit}_embedded.json` outputs are written into.
    pub output_dir: PathBuf,
    /// Units to process, in order.
    pub units: Vec<UnitId>,
    /// Wall-clock budget per unit.
    pub unit_timeout: Duration,
}

/// One successfully embedded unit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UnitSuccess {
    pub unit: UnitId,
    /// Voters embedded (always equal to the unit's input voter count).
    pub voters: usize,
    /// Embeddings reused for repeated identical text keys.
    pub reused: usize,
    pub output: PathBuf,
}

/// One failed unit with its error rendered for the report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UnitFailure {
    pub unit: UnitId,
    pub error: String,
}

/// Aggregated outcome of a batch run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: Vec<UnitSuccess>,
    pub failed: Vec<UnitFailure>,
}

impl BatchReport {
    /// Total voters embedded across all succeeded units.
    pub fn total_voters(&self) -> usize {
        self.succeeded.iter().map(|u| u.voters).sum()
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for batch runs.
pub trait BatchProgress: Send + Sync {
    /// Called when a unit's processing begins.
    fn unit_started(&self, unit: &UnitId, current: usize, total: usize);
    /// Called when a unit's output has been written.
    fn unit_finished(&self, unit: &UnitId, voters: usize);
}

/// No-op progress for headless/test usage.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn unit_started(&self, _unit: &UnitId, _current: usize, _total: usize) {}
    fn unit_finished(&self, _unit: &UnitId, _voters: usize) {}
}

// ---------------------------------------------------------------------------
// Batch runner
// ---------------------------------------------------------------------------

/// Run the batch: each unit is read, embedded in full, and written before
/// the next begins. Failed units are reported, never retried here.
#[instrument(skip_all, fields(units = config.units.len()))]
pub fn run_batch(
    config: &BatchConfig,
    provider: &mut dyn EmbeddingProvider,
    progress: &dyn BatchProgress,
) -> BatchReport {
    let run_id = RunId::new();
    let started_at = Utc::now();
    let total = config.units.len();

    info!(%run_id, units = total, "starting embedding batch");

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    for (i, unit) in config.units.iter().enumerate() {
        progress.unit_started(unit, i + 1, total);

        match embed_unit(config, unit, provider) {
            Ok(success) => {
                info!(
                    unit = %unit,
                    voters = success.voters,
                    reused = success.reused,
                    output = %success.output.display(),
                    "unit embedded"
                );
                progress.unit_finished(unit, success.voters);
                succeeded.push(success);
            }
            Err(e) => {
                warn!(unit = %unit, error = %e, "unit failed, continuing batch");
                failed.push(UnitFailure {
                    unit: unit.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let report = BatchReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        succeeded,
        failed,
    };

    info!(
        run_id = %report.run_id,
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        voters = report.total_voters(),
        "embedding batch complete"
    );

    report
}

/// Process one unit end to end. The output file is written only after every
/// voter has an embedding; a failure part-way leaves no output behind.
fn embed_unit(
    config: &BatchConfig,
    unit: &UnitId,
    provider: &mut dyn EmbeddingProvider,
) -> Result<UnitSuccess> {
    let input = artifact::raw_unit_path(&config.data_dir, unit);
    let mut ward = artifact::read_ward(&input)?;

    let deadline = Instant::now() + config.unit_timeout;
    let (voters, reused) = attach_embeddings(&mut ward, provider, Some(deadline))?;

    let output = artifact::embedded_unit_path(&config.output_dir, unit);
    artifact::write_ward(&output, &ward)?;

    Ok(UnitSuccess {
        unit: unit.clone(),
        voters,
        reused,
        output,
    })
}

/// Attach one embedding per voter, in document order, leaving every other
/// field untouched. Returns (voters embedded, embeddings reused).
///
/// Identical text keys share one provider call; the provider is
/// deterministic for a fixed model version.
pub fn attach_embeddings(
    ward: &mut WardRecord,
    provider: &mut dyn EmbeddingProvider,
    deadline: Option<Instant>,
) -> Result<(usize, usize)> {
    let mut seen: HashMap<String, Vec<f32>> = HashMap::new();
    let mut reused = 0usize;

    for voter in &mut ward.voters {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(RollcallError::Embedding("unit deadline exceeded".into()));
            }
        }

        let text = voter.text_key();
        let key = text_hash(&text);

        let vector = match seen.get(&key) {
            Some(v) => {
                reused += 1;
                v.clone()
            }
            None => {
                let v = provider.embed(&text)?;
                seen.insert(key, v.clone());
                v
            }
        };

        voter.embedding = Some(vector);
    }

    Ok((ward.voters.len(), reused))
}

/// Cache key for a voter's text key.
fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
