//! # lcamigrate - Activity migration across database versions
//!
//! Moves LCA activities and the exchanges that link them from an old
//! project/database into a new one.
//!
//! lcamigrate provides:
//! - Global record keys (`lca://<project>/<store>#<code>`) and the record/exchange model
//! - SQLite-backed record stores addressed through explicit store handles
//! - Token-sort fuzzy matching for records that no longer match exactly
//! - A memoizing migration engine that resolves activities and recreates
//!   missing ones together with their whole upstream supply chain

pub mod key;
pub mod record;
pub mod exchange;
pub mod storage;
pub mod fuzzy;
pub mod migrate;
pub mod config;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use key::RecordKey;
pub use record::{MatchKey, Record};
pub use exchange::{Exchange, ExchangeKind, Uncertainty};
pub use storage::{RecordStore, SqliteStore, StoreHandle};
pub use fuzzy::{FuzzyMatcher, Scorer, TokenSortRatio};
pub use migrate::{Migrator, MigratorSettings, Resolution, ResolveOptions, Shape};

/// Result type alias for lcamigrate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for lcamigrate operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid exchange kind: {0}")]
    InvalidKind(String),

    #[error("Record '{code}' doesn't exist in database '{store}'")]
    NotFound { store: String, code: String },

    #[error("Biosphere flow '{name}' {categories:?} not found in database '{store}'")]
    BiosphereNotFound {
        store: String,
        name: String,
        categories: Option<Vec<String>>,
    },

    #[error("Cyclic exchange graph: {cycle}")]
    CyclicGraph { cycle: String },

    #[error("Record {key} does not belong to database '{project}/{store}'")]
    StoreMismatch {
        key: String,
        project: String,
        store: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a `NotFound` error for a key
    pub fn not_found(key: &RecordKey) -> Self {
        Error::NotFound {
            store: key.store.clone(),
            code: key.code.clone(),
        }
    }
}
