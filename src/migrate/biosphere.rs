//! Biosphere flow matching
//!
//! Flows are identified by name and categories, never by the exchange that
//! points at them. A `BiosphereQuery` is built from exchange details and
//! deliberately has no field for `input`, `amount` or `type`.

use crate::record::{self, Record};
use super::collector::ExchangeDetails;

/// Attributes a biosphere flow is matched on.
///
/// Absent fields are wildcards: only non-null fields take part in exact
/// matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BiosphereQuery {
    pub name: String,
    pub categories: Option<Vec<String>>,
    pub unit: Option<String>,
}

impl BiosphereQuery {
    pub fn from_details(details: &ExchangeDetails) -> Self {
        Self {
            name: details.name.clone(),
            categories: details.categories.clone(),
            unit: details.unit.clone(),
        }
    }

    /// Every non-null field equals the flow's
    pub fn matches(&self, flow: &Record) -> bool {
        if self.name != flow.name {
            return false;
        }
        if let Some(categories) = &self.categories {
            if flow.categories.as_ref() != Some(categories) {
                return false;
            }
        }
        if let Some(unit) = &self.unit {
            if flow.unit.as_ref() != Some(unit) {
                return false;
            }
        }
        true
    }

    /// `name categories` text for fuzzy fallback
    pub fn fuzzy_text(&self) -> String {
        record::biosphere_text(&self.name, self.categories.as_deref())
    }
}
