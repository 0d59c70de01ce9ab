//! Migration engine
//!
//! Resolution order for a source activity:
//! 1. Cache (per engine instance)
//! 2. Exact match on name, location, unit and reference product
//! 3. Fuzzy match on `name location reference_product` (opt-in)
//! 4. Creation in the target store, recursively resolving every input
//!
//! Biosphere inputs follow their own order: exact match on name and
//! categories, then fuzzy match, then `BiosphereNotFound`.

pub mod biosphere;
pub mod cache;
pub mod collector;
pub mod engine;
pub mod resolution;
pub mod stats;

use serde::{Deserialize, Serialize};

use crate::record::Record;

pub use biosphere::BiosphereQuery;
pub use cache::MigrationCache;
pub use collector::{Collected, DuplicatePolicy, ExchangeCollector, ExchangeDetails};
pub use engine::Migrator;
pub use resolution::{MatchStrategy, MigratedRef, Resolution, Shape};
pub use stats::MigrationStats;

/// Default technosphere fuzzy cutoff. Activity names are long and collide
/// often, so the bar is high.
pub const DEFAULT_FUZZY_CUTOFF: u8 = 85;

/// Default biosphere fuzzy cutoff. Flow names are short and the categories
/// add disambiguating signal.
pub const DEFAULT_BIOSPHERE_CUTOFF: u8 = 70;

pub const DEFAULT_FUZZY_LIMIT: usize = 5;

pub const DEFAULT_BIOSPHERE_STORE: &str = "biosphere3";

/// How to choose among equally good candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Lexicographically smallest key
    #[default]
    SmallestKey,
    /// First in store iteration order
    StoreOrder,
}

impl TieBreak {
    /// Pick one record from a set of equally ranked candidates
    pub fn pick<'a, I>(self, candidates: I) -> Option<&'a Record>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut iter = candidates.into_iter();
        match self {
            TieBreak::StoreOrder => iter.next(),
            TieBreak::SmallestKey => iter.min_by(|a, b| a.key.cmp(&b.key)),
        }
    }

    /// Order candidates so that a stable ranking keeps the preferred one
    /// first among equal scores
    pub fn arrange(self, candidates: &mut [&Record]) {
        if self == TieBreak::SmallestKey {
            candidates.sort_by(|a, b| a.key.cmp(&b.key));
        }
    }
}

/// Engine-wide matching settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigratorSettings {
    pub biosphere_cutoff: u8,
    pub biosphere_limit: usize,
    pub fuzzy_limit: usize,
    pub tie_break: TieBreak,
    pub duplicates: DuplicatePolicy,
}

impl Default for MigratorSettings {
    fn default() -> Self {
        Self {
            biosphere_cutoff: DEFAULT_BIOSPHERE_CUTOFF,
            biosphere_limit: DEFAULT_FUZZY_LIMIT,
            fuzzy_limit: DEFAULT_FUZZY_LIMIT,
            tie_break: TieBreak::default(),
            duplicates: DuplicatePolicy::default(),
        }
    }
}

/// Per-call options of `Migrator::resolve`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub shape: Shape,
    pub create_if_not_found: bool,
    /// The id is a full `lca://` key rather than a code of the source store
    pub by_key: bool,
    pub fuzzy_match: bool,
    pub fuzzy_cutoff: u8,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            shape: Shape::Key,
            create_if_not_found: false,
            by_key: false,
            fuzzy_match: false,
            fuzzy_cutoff: DEFAULT_FUZZY_CUTOFF,
        }
    }
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_key(mut self) -> Self {
        self.by_key = true;
        self
    }

    pub fn create_if_not_found(mut self) -> Self {
        self.create_if_not_found = true;
        self
    }

    /// Enable fuzzy fallback with the given cutoff
    pub fn fuzzy(mut self, cutoff: u8) -> Self {
        self.fuzzy_match = true;
        self.fuzzy_cutoff = cutoff;
        self
    }

    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }
}
