//! JSON store dumps
//!
//! Seeds a store from a JSON document:
//!
//! ```json
//! {
//!   "project": "ecoinvent-3.8",
//!   "store": "cutoff",
//!   "records": [{ "code": "a1", "name": "steel production", "location": "GLO", "unit": "kg" }],
//!   "exchanges": [{ "output": "a1", "input": "lca://ecoinvent-3.8/biosphere3#co2",
//!                   "amount": 1.2, "unit": "kg", "type": "biosphere" }]
//! }
//! ```
//!
//! `output` is always a code of the dumped store. `input` is either a code of
//! the same store or a full `lca://` key.

use serde::Deserialize;
use std::path::Path;

use crate::exchange::{Exchange, ExchangeKind, Uncertainty};
use crate::key::RecordKey;
use crate::record::Record;
use crate::Result;
use super::handle::{RecordStore, StoreHandle};
use super::sqlite::SqliteStore;

#[derive(Debug, Deserialize)]
pub struct StoreDump {
    pub project: String,
    pub store: String,
    #[serde(default)]
    pub records: Vec<RecordEntry>,
    #[serde(default)]
    pub exchanges: Vec<ExchangeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RecordEntry {
    pub code: String,
    pub name: String,
    pub location: Option<String>,
    pub unit: Option<String>,
    #[serde(alias = "reference product")]
    pub reference_product: Option<String>,
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeEntry {
    pub output: String,
    pub input: String,
    pub amount: f64,
    pub unit: Option<String>,
    #[serde(rename = "type")]
    pub kind: ExchangeKind,
    #[serde(flatten)]
    pub uncertainty: Uncertainty,
}

/// Counts of what an import wrote
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ImportStats {
    pub records: usize,
    pub exchanges: usize,
}

impl StoreDump {
    /// Read a dump from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

fn input_key(handle: &StoreHandle<'_>, input: &str) -> Result<RecordKey> {
    if input.starts_with("lca://") {
        RecordKey::parse(input)
    } else {
        Ok(handle.key_for(input))
    }
}

/// Write a dump into the backend inside one transaction
pub fn import_dump(backend: &SqliteStore, dump: &StoreDump) -> Result<ImportStats> {
    let handle = StoreHandle::new(backend, dump.project.as_str(), dump.store.as_str());

    backend.begin_transaction()?;
    match write_dump(&handle, dump) {
        Ok(stats) => {
            backend.commit()?;
            tracing::info!(
                "Imported {} records and {} exchanges into {}/{}",
                stats.records,
                stats.exchanges,
                dump.project,
                dump.store
            );
            Ok(stats)
        }
        Err(e) => {
            backend.rollback()?;
            Err(e)
        }
    }
}

fn write_dump(handle: &StoreHandle<'_>, dump: &StoreDump) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    for entry in &dump.records {
        let record = Record {
            key: handle.key_for(&entry.code),
            name: entry.name.clone(),
            location: entry.location.clone(),
            unit: entry.unit.clone(),
            reference_product: entry.reference_product.clone(),
            categories: entry.categories.clone(),
            auto_generated: false,
        };
        handle.create_record(&record)?;
        stats.records += 1;
    }

    for entry in &dump.exchanges {
        let exchange = Exchange {
            output: handle.key_for(&entry.output),
            input: input_key(handle, &entry.input)?,
            amount: entry.amount,
            unit: entry.unit.clone(),
            kind: entry.kind,
            uncertainty: entry.uncertainty.clone(),
        };
        handle.create_exchange(&exchange)?;
        stats.exchanges += 1;
    }

    Ok(stats)
}
