//! Application configuration for rollcall.
//!
//! User config lives at `~/.rollcall/rollcall.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RollcallError};
use crate::types::UnitId;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "rollcall.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".rollcall";

// ---------------------------------------------------------------------------
// Config structs (matching rollcall.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input/output directories.
    #[serde(default)]
    pub paths: PathsConfig,

    /// The (ward, language) unit enumeration the batch runner walks.
    #[serde(default)]
    pub units: UnitsConfig,

    /// Embedding bridge settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding extracted `{unit}.json` files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Directory the enricher writes `{unit}_embedded.json` files into.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "data".into()
}
fn default_output_dir() -> String {
    "data".into()
}

/// `[units]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitsConfig {
    /// Ward numbers to process.
    #[serde(default = "default_wards")]
    pub wards: Vec<u32>,

    /// Roll languages, each with its own file per ward.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            wards: default_wards(),
            languages: default_languages(),
        }
    }
}

impl UnitsConfig {
    /// Enumerate all configured units, language-major
    /// (every ward of one language, then the next language).
    pub fn units(&self) -> Vec<UnitId> {
        let mut units = Vec::with_capacity(self.wards.len() * self.languages.len());
        for language in &self.languages {
            for &ward in &self.wards {
                units.push(UnitId::new(ward, language.clone()));
            }
        }
        units
    }
}

fn default_wards() -> Vec<u32> {
    (1..=6).collect()
}
fn default_languages() -> Vec<String> {
    vec!["english".into(), "malayalam".into()]
}

/// `[embedding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Bridge command (e.g., "python3").
    #[serde(default = "default_bridge_cmd")]
    pub bridge_cmd: String,

    /// Bridge script path, resolved relative to the working directory.
    #[serde(default = "default_bridge_script")]
    pub bridge_script: String,

    /// Sentence-embedding model identifier passed to the bridge.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Expected vector length; when set, every returned vector is checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,

    /// Wall-clock budget for one unit's embedding pass.
    #[serde(default = "default_unit_timeout_secs")]
    pub unit_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            bridge_cmd: default_bridge_cmd(),
            bridge_script: default_bridge_script(),
            model_id: default_model_id(),
            dimensions: None,
            unit_timeout_secs: default_unit_timeout_secs(),
        }
    }
}

fn default_bridge_cmd() -> String {
    "python3".into()
}
fn default_bridge_script() -> String {
    "bridge/embed_bridge.py".into()
}
fn default_model_id() -> String {
    "all-MiniLM-L6-v2".into()
}
fn default_unit_timeout_secs() -> u64 {
    300
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.rollcall/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RollcallError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.rollcall/rollcall.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RollcallError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RollcallError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RollcallError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RollcallError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RollcallError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("all-MiniLM-L6-v2"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.units.wards, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(parsed.embedding.bridge_cmd, "python3");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[units]
wards = [2, 4]

[embedding]
model_id = "paraphrase-multilingual-MiniLM-L12-v2"
dimensions = 384
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.units.wards, vec![2, 4]);
        assert_eq!(config.units.languages.len(), 2);
        assert_eq!(config.embedding.dimensions, Some(384));
        assert_eq!(config.paths.data_dir, "data");
    }

    #[test]
    fn unit_enumeration_is_language_major() {
        let units = UnitsConfig {
            wards: vec![1, 2],
            languages: vec!["english".into(), "malayalam".into()],
        }
        .units();

        let rendered: Vec<String> = units.iter().map(|u| u.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["1_english", "2_english", "1_malayalam", "2_malayalam"]
        );
    }
}
