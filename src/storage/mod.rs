//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - records(project, store, code, name, location, unit, reference_product, categories, auto_generated)
//! - exchanges(output_key, input_key, amount, unit, kind, uncertainty...)
//!
//! One database file may hold several projects; `StoreHandle` selects one
//! project/store pair.

pub mod schema;
pub mod sqlite;
pub mod handle;
pub mod import;

pub use sqlite::{SqliteStore, DbStats, StoreStats};
pub use handle::{RecordStore, StoreHandle};
pub use import::{StoreDump, ImportStats, import_dump};
