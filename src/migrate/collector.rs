//! Exchange collector
//!
//! Reads the exchanges of a source activity into owned descriptors, with
//! the target's name (and categories for biosphere flows) looked up from
//! the store.
//!
//! Repeated `(input, amount, unit)` triples are treated as a store anomaly.
//! Under the default `StopAtDuplicate` policy collection ends at the first
//! repeat: a repeat at position k yields exactly k descriptors. This can
//! under-collect activities that legitimately list the same input twice
//! with the same amount; `SkipDuplicate` drops only the repeat and keeps
//! going.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::exchange::{ExchangeKind, Uncertainty};
use crate::key::RecordKey;
use crate::record::Record;
use crate::storage::RecordStore;
use crate::{Error, Result};

/// What to do when an exchange triple repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Stop collecting at the first repeat
    #[default]
    #[value(name = "stop")]
    #[serde(alias = "stop")]
    StopAtDuplicate,
    /// Drop the repeat, continue with the next exchange
    #[value(name = "skip")]
    #[serde(alias = "skip")]
    SkipDuplicate,
}

/// An exchange of a source activity, ready to be recreated
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeDetails {
    pub input: RecordKey,
    pub amount: f64,
    pub unit: Option<String>,
    pub kind: ExchangeKind,
    pub uncertainty: Uncertainty,
    /// Name of the input record
    pub name: String,
    /// Categories of the input flow, biosphere exchanges only
    pub categories: Option<Vec<String>>,
}

/// Collected exchanges of one activity
#[derive(Debug, Default)]
pub struct Collected {
    pub exchanges: Vec<ExchangeDetails>,
    /// Collection stopped early on a repeat
    pub truncated: bool,
    /// Repeats dropped under `SkipDuplicate`
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExchangeCollector {
    policy: DuplicatePolicy,
}

impl ExchangeCollector {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Collect the exchanges of `activity` from `store`
    pub fn collect(&self, store: &dyn RecordStore, activity: &Record) -> Result<Collected> {
        let mut collected = Collected::default();
        let mut seen: HashSet<(RecordKey, u64, Option<String>)> = HashSet::new();

        for exc in store.exchanges_of(&activity.key)? {
            let triple = (exc.input.clone(), exc.amount.to_bits(), exc.unit.clone());
            if !seen.insert(triple) {
                match self.policy {
                    DuplicatePolicy::StopAtDuplicate => {
                        tracing::warn!(
                            "Duplicate exchange {} -> {} ({} {:?}); stopping collection after {} exchanges",
                            activity.key,
                            exc.input,
                            exc.amount,
                            exc.unit,
                            collected.exchanges.len()
                        );
                        collected.truncated = true;
                        break;
                    }
                    DuplicatePolicy::SkipDuplicate => {
                        tracing::debug!("Skipping duplicate exchange {} -> {}", activity.key, exc.input);
                        collected.skipped += 1;
                        continue;
                    }
                }
            }

            let target = store
                .get_by_key(&exc.input)?
                .ok_or_else(|| Error::not_found(&exc.input))?;

            let categories = if exc.kind == ExchangeKind::Biosphere {
                target.categories
            } else {
                None
            };

            collected.exchanges.push(ExchangeDetails {
                input: exc.input,
                amount: exc.amount,
                unit: exc.unit,
                kind: exc.kind,
                uncertainty: exc.uncertainty,
                name: target.name,
                categories,
            });
        }

        Ok(collected)
    }
}
