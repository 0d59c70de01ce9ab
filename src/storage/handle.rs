//! Store handles - explicit project/store selection
//!
//! A `StoreHandle` pins one project and one store on a backend. The
//! migrator holds three of them (source, target, biosphere) instead of
//! switching a shared "current database" back and forth.

use crate::exchange::Exchange;
use crate::key::RecordKey;
use crate::record::Record;
use crate::{Error, Result};
use super::sqlite::SqliteStore;

/// Record store contract consumed by the migration engine.
///
/// `get_by_key` is global within the backend: exchanges point into other
/// stores of the same project (biosphere flows), and the collector must be
/// able to read those targets through the source handle.
pub trait RecordStore {
    /// Project this store belongs to
    fn project(&self) -> &str;

    /// Store (database) name
    fn name(&self) -> &str;

    /// Point lookup by code inside this store
    fn get_by_code(&self, code: &str) -> Result<Option<Record>>;

    /// Point lookup by global key
    fn get_by_key(&self, key: &RecordKey) -> Result<Option<Record>>;

    /// Every record of this store, in a stable order
    fn iter_all(&self) -> Result<Vec<Record>>;

    /// Exchanges owned by a record, in store order
    fn exchanges_of(&self, key: &RecordKey) -> Result<Vec<Exchange>>;

    /// Persist a new record. The key must belong to this store.
    fn create_record(&self, record: &Record) -> Result<()>;

    /// Persist a new exchange owned by a record of this store
    fn create_exchange(&self, exchange: &Exchange) -> Result<()>;

    /// Key of `code` inside this store
    fn key_for(&self, code: &str) -> RecordKey {
        RecordKey::new(self.project(), self.name(), code)
    }
}

/// A project/store view on a SQLite backend
pub struct StoreHandle<'a> {
    backend: &'a SqliteStore,
    project: String,
    store: String,
}

impl<'a> StoreHandle<'a> {
    /// Create a new handle
    pub fn new(backend: &'a SqliteStore, project: impl Into<String>, store: impl Into<String>) -> Self {
        Self {
            backend,
            project: project.into(),
            store: store.into(),
        }
    }

    /// The backend this handle reads from and writes to
    pub fn backend(&self) -> &'a SqliteStore {
        self.backend
    }

    fn ensure_owned(&self, key: &RecordKey) -> Result<()> {
        if key.is_in(&self.project, &self.store) {
            Ok(())
        } else {
            Err(Error::StoreMismatch {
                key: key.to_key_string(),
                project: self.project.clone(),
                store: self.store.clone(),
            })
        }
    }
}

impl RecordStore for StoreHandle<'_> {
    fn project(&self) -> &str {
        &self.project
    }

    fn name(&self) -> &str {
        &self.store
    }

    fn get_by_code(&self, code: &str) -> Result<Option<Record>> {
        self.backend.get_record(&self.key_for(code))
    }

    fn get_by_key(&self, key: &RecordKey) -> Result<Option<Record>> {
        self.backend.get_record(key)
    }

    fn iter_all(&self) -> Result<Vec<Record>> {
        self.backend.records_in_store(&self.project, &self.store)
    }

    fn exchanges_of(&self, key: &RecordKey) -> Result<Vec<Exchange>> {
        self.backend.exchanges_from(key)
    }

    fn create_record(&self, record: &Record) -> Result<()> {
        self.ensure_owned(&record.key)?;
        self.backend.insert_record(record)
    }

    fn create_exchange(&self, exchange: &Exchange) -> Result<()> {
        self.ensure_owned(&exchange.output)?;
        self.backend.insert_exchange(exchange)
    }
}
