//! Core domain types for voter-roll units.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Age
// ---------------------------------------------------------------------------

/// Best-effort numeric age with graceful fallback.
///
/// The roll's combined "gender/age" cell does not guarantee a numeric age
/// half; anything that is not all decimal digits is carried through as the
/// original text. Serializes as `int|string` so downstream consumers of the
/// unit files must branch explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Age {
    Years(u32),
    Raw(String),
}

impl Age {
    /// Parse an age token: `Years` when non-empty and all ASCII digits,
    /// otherwise the token is preserved as `Raw`.
    pub fn parse(token: &str) -> Self {
        if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(years) = token.parse::<u32>() {
                return Self::Years(years);
            }
        }
        Self::Raw(token.to_string())
    }
}

// ---------------------------------------------------------------------------
// VoterRecord
// ---------------------------------------------------------------------------

/// One voter row extracted from a roll document.
///
/// `embedding` is absent until the enrichment stage attaches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterRecord {
    /// Serial number within the unit (document order, not re-verified).
    pub serial: u32,
    pub name: String,
    /// Guardian name; may be empty.
    pub guardian: String,
    pub house_no: String,
    pub house_name: String,
    /// Single-letter gender marker; empty when the cell is empty.
    pub gender: String,
    pub age: Age,
    /// Voter identifier string.
    pub id: String,
    /// Dense vector over the name/guardian text, attached by the enricher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl VoterRecord {
    /// The text the embedding is computed over: name and guardian joined by
    /// a space, trimmed. A voter without a guardian keys on the name alone.
    pub fn text_key(&self) -> String {
        format!("{} {}", self.name, self.guardian).trim().to_string()
    }
}

// ---------------------------------------------------------------------------
// WardRecord
// ---------------------------------------------------------------------------

/// One polling unit: header metadata plus its voters in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardRecord {
    pub district: String,
    pub local_body: String,
    pub ward: String,
    pub polling_station: String,
    pub voters: Vec<VoterRecord>,
}

// ---------------------------------------------------------------------------
// UnitId
// ---------------------------------------------------------------------------

static UNIT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)_([a-z]+)$").expect("valid regex"));

/// Identifier for one (ward, language) unit, rendered as `{ward}_{language}`.
///
/// The string form is an external contract: unit input files are named
/// `{unit}.json` and embedded outputs `{unit}_embedded.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId {
    ward: u32,
    language: String,
}

impl UnitId {
    pub fn new(ward: u32, language: impl Into<String>) -> Self {
        Self {
            ward,
            language: language.into(),
        }
    }

    pub fn ward(&self) -> u32 {
        self.ward
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.ward, self.language)
    }
}

impl std::str::FromStr for UnitId {
    type Err = crate::RollcallError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let caps = UNIT_ID_RE.captures(s).ok_or_else(|| {
            crate::RollcallError::validation(format!(
                "invalid unit id '{s}': expected {{ward}}_{{language}}"
            ))
        })?;
        let ward = caps[1].parse::<u32>().map_err(|e| {
            crate::RollcallError::validation(format!("invalid ward number in '{s}': {e}"))
        })?;
        Ok(Self {
            ward,
            language: caps[2].to_string(),
        })
    }
}

impl TryFrom<String> for UnitId {
    type Error = crate::RollcallError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<UnitId> for String {
    fn from(unit: UnitId) -> Self {
        unit.to_string()
    }
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for batch run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
