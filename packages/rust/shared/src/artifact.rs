//! Unit file naming convention and WardRecord JSON read/write.
//!
//! Extraction output is `{unit}.json`; enrichment output is
//! `{unit}_embedded.json` under the configured output directory. Both names
//! are an external contract relied on by downstream consumers.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, RollcallError};
use crate::types::{UnitId, WardRecord};

/// Path of the extracted (raw) record for a unit.
pub fn raw_unit_path(data_dir: &Path, unit: &UnitId) -> PathBuf {
    data_dir.join(format!("{unit}.json"))
}

/// Path of the embedded record for a unit.
pub fn embedded_unit_path(output_dir: &Path, unit: &UnitId) -> PathBuf {
    output_dir.join(format!("{unit}_embedded.json"))
}

/// Read and parse a `WardRecord` JSON file.
pub fn read_ward(path: &Path) -> Result<WardRecord> {
    let content = std::fs::read_to_string(path).map_err(|e| RollcallError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        RollcallError::validation(format!("invalid ward record {}: {e}", path.display()))
    })
}

/// Write a `WardRecord` as pretty-printed JSON, creating parent directories.
pub fn write_ward(path: &Path, ward: &WardRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RollcallError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(ward)
        .map_err(|e| RollcallError::validation(format!("JSON serialization failed: {e}")))?;
    std::fs::write(path, json).map_err(|e| RollcallError::io(path, e))?;

    debug!(path = %path.display(), voters = ward.voters.len(), "wrote ward record");
    Ok(())
}
