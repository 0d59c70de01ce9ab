//! Migration cache
//!
//! Memoizes resolutions for the lifetime of one `Migrator`. Entries are
//! write-once: inserting under a key that is already present keeps the
//! original entry, so repeated resolution of a source id always yields the
//! same result.

use std::collections::HashMap;

use crate::key::RecordKey;
use super::biosphere::BiosphereQuery;
use super::resolution::Resolution;

#[derive(Debug, Default)]
pub struct MigrationCache {
    /// source key → resolution
    resolved: HashMap<RecordKey, Resolution>,
    /// source key → record created for it
    created: HashMap<RecordKey, Resolution>,
    /// biosphere query → matched flow
    biosphere: HashMap<BiosphereQuery, Resolution>,
}

impl MigrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached resolution of a source key
    pub fn get(&self, key: &RecordKey) -> Option<&Resolution> {
        self.resolved.get(key)
    }

    /// Store a resolution; returns the entry that is now cached, which is
    /// the earlier one if the key was already populated.
    pub fn insert(&mut self, key: RecordKey, resolution: Resolution) -> &Resolution {
        self.resolved.entry(key).or_insert(resolution)
    }

    /// Record created for a source key, if any
    pub fn created(&self, key: &RecordKey) -> Option<&Resolution> {
        self.created.get(key)
    }

    /// Ledger of creations. A source key is materialised at most once, even
    /// when its plain resolution was cached as not-found earlier.
    pub fn record_created(&mut self, key: RecordKey, resolution: Resolution) -> &Resolution {
        self.created.entry(key).or_insert(resolution)
    }

    pub fn biosphere(&self, query: &BiosphereQuery) -> Option<&Resolution> {
        self.biosphere.get(query)
    }

    pub fn insert_biosphere(&mut self, query: BiosphereQuery, resolution: Resolution) -> &Resolution {
        self.biosphere.entry(query).or_insert(resolution)
    }

    /// Number of cached source resolutions
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Number of records created through this cache's engine
    pub fn created_count(&self) -> usize {
        self.created.len()
    }
}
