//! Resolution results
//!
//! One type for every outcome of resolving a source record. Callers pick
//! the shape they need (key, code, or full record) through projections
//! instead of asking the engine for differently shaped results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::key::RecordKey;
use crate::record::Record;

/// Which tier produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum MatchStrategy {
    /// All four attributes equal
    Exact,
    /// Token-sort similarity at or above the cutoff
    Fuzzy { score: u8 },
    /// Biosphere flow matched on name and categories
    BiosphereExact,
    /// Biosphere flow matched by similarity
    BiosphereFuzzy { score: u8 },
    /// Synthesized in the target store
    Created,
    /// No equivalent found; the source record stands in
    NotFound,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy { .. } => "fuzzy",
            Self::BiosphereExact => "biosphere-exact",
            Self::BiosphereFuzzy { .. } => "biosphere-fuzzy",
            Self::Created => "created",
            Self::NotFound => "not-found",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fuzzy { score } | Self::BiosphereFuzzy { score } => {
                write!(f, "{} ({})", self.as_str(), score)
            }
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

/// Requested result shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Global key of the resolved record
    #[default]
    Key,
    /// Code of the resolved record
    Code,
    /// The full record
    Record,
}

impl Shape {
    /// Key wins over code when both flags are set
    pub fn from_flags(return_key_only: bool, return_code_only: bool) -> Self {
        if return_key_only {
            Shape::Key
        } else if return_code_only {
            Shape::Code
        } else {
            Shape::Record
        }
    }
}

/// A shaped reference to a resolved record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MigratedRef {
    Key(RecordKey),
    Code(String),
    Record(Record),
}

impl fmt::Display for MigratedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigratedRef::Key(key) => write!(f, "{key}"),
            MigratedRef::Code(code) => write!(f, "{code}"),
            MigratedRef::Record(record) => {
                write!(f, "{} ({})", record.short_description(), record.key)
            }
        }
    }
}

/// Outcome of resolving one source record.
///
/// When `found` is false the record is the *source* record, standing in
/// as a not-found sentinel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    record: Record,
    found: bool,
    #[serde(flatten)]
    strategy: MatchStrategy,
}

impl Resolution {
    pub fn found(record: Record, strategy: MatchStrategy) -> Self {
        Self { record, found: true, strategy }
    }

    pub fn not_found(source: Record) -> Self {
        Self {
            record: source,
            found: false,
            strategy: MatchStrategy::NotFound,
        }
    }

    pub fn is_found(&self) -> bool {
        self.found
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn key(&self) -> &RecordKey {
        &self.record.key
    }

    pub fn code(&self) -> &str {
        &self.record.key.code
    }

    /// Project to the requested shape
    pub fn shaped(&self, shape: Shape) -> MigratedRef {
        match shape {
            Shape::Key => MigratedRef::Key(self.key().clone()),
            Shape::Code => MigratedRef::Code(self.code().to_string()),
            Shape::Record => MigratedRef::Record(self.record.clone()),
        }
    }

    /// `(reference, found)` pair in the requested shape
    pub fn to_pair(&self, shape: Shape) -> (MigratedRef, bool) {
        (self.shaped(shape), self.found)
    }
}
