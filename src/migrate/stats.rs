use serde::Serialize;

/// Counters collected by one `Migrator` over its lifetime
#[derive(Debug, Default, Clone, Serialize)]
pub struct MigrationStats {
    pub cache_hits: usize,
    /// Full scans of the target or biosphere store
    pub scans: usize,
    pub exact: usize,
    pub fuzzy: usize,
    pub biosphere_exact: usize,
    pub biosphere_fuzzy: usize,
    pub not_found: usize,
    pub created_records: usize,
    pub created_exchanges: usize,
    /// Collections cut short by a duplicate exchange
    pub truncated: usize,
    /// Duplicate exchanges dropped under the skip policy
    pub skipped_duplicates: usize,
    /// Several equally good candidates, settled by the tie-break
    pub ties: usize,
}

impl MigrationStats {
    /// Resolutions that produced a target record
    pub fn resolved(&self) -> usize {
        self.exact + self.fuzzy + self.created_records
    }
}

impl std::fmt::Display for MigrationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Migration Statistics:")?;
        writeln!(f, "  ✅ Exact matches: {}", self.exact)?;
        writeln!(f, "  🔎 Fuzzy matches: {}", self.fuzzy)?;
        writeln!(f, "  ✨ Created records: {} ({} exchanges)", self.created_records, self.created_exchanges)?;
        writeln!(f, "  ❌ Not found: {}", self.not_found)?;
        writeln!(f, "  Biosphere flows:")?;
        writeln!(f, "    Exact: {}", self.biosphere_exact)?;
        writeln!(f, "    Fuzzy: {}", self.biosphere_fuzzy)?;
        writeln!(f, "  Cache hits: {}", self.cache_hits)?;
        writeln!(f, "  Store scans: {}", self.scans)?;
        writeln!(f, "  Ties broken: {}", self.ties)?;
        if self.truncated > 0 || self.skipped_duplicates > 0 {
            writeln!(f, "  ⚠️  Truncated collections: {}", self.truncated)?;
            writeln!(f, "  ⚠️  Skipped duplicates: {}", self.skipped_duplicates)?;
        }
        Ok(())
    }
}
