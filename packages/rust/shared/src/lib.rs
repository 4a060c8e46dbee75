//! Shared types, error model, and configuration for rollcall.
//!
//! This crate is the foundation depended on by the extract and embed crates.
//! It provides:
//! - [`RollcallError`], the unified error type
//! - Domain types ([`WardRecord`], [`VoterRecord`], [`Age`], [`UnitId`], [`RunId`])
//! - Configuration ([`AppConfig`], config loading)
//! - The unit file naming convention and JSON read/write

pub mod artifact;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use artifact::{embedded_unit_path, raw_unit_path, read_ward, write_ward};
pub use config::{
    AppConfig, EmbeddingConfig, PathsConfig, UnitsConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{Result, RollcallError};
pub use types::{Age, RunId, UnitId, VoterRecord, WardRecord};
