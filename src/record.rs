//! Record types - activities and biosphere flows
//!
//! Every node of the exchange graph is a `Record`:
//! - Technosphere activities carry `location` and `reference_product`
//! - Biosphere flows carry `categories` instead

use crate::key::RecordKey;
use serde::{Deserialize, Serialize};

/// A record in an LCA database.
///
/// Identity is the key. Two records with identical attributes in different
/// stores are different records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Global key
    pub key: RecordKey,
    /// Activity or flow name
    pub name: String,
    /// Geography (`GLO`, `RoW`, `CH`, ...)
    pub location: Option<String>,
    /// Unit of the reference product or flow
    pub unit: Option<String>,
    /// Reference product of an activity
    pub reference_product: Option<String>,
    /// Compartment/subcompartment of a biosphere flow
    pub categories: Option<Vec<String>>,
    /// Set on records synthesized by the migrator
    #[serde(default)]
    pub auto_generated: bool,
}

impl Record {
    /// Create a new record with only its key and name
    pub fn new(key: RecordKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            location: None,
            unit: None,
            reference_product: None,
            categories: None,
            auto_generated: false,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_reference_product(mut self, product: impl Into<String>) -> Self {
        self.reference_product = Some(product.into());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    /// Code within the owning store
    pub fn code(&self) -> &str {
        &self.key.code
    }

    /// The four attributes used for exact matching
    pub fn match_key(&self) -> MatchKey {
        MatchKey {
            name: self.name.clone(),
            location: self.location.clone(),
            unit: self.unit.clone(),
            reference_product: self.reference_product.clone(),
        }
    }

    /// Text projection used for technosphere fuzzy matching:
    /// `name location reference_product`, absent fields skipped
    pub fn fuzzy_text(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(location) = &self.location {
            parts.push(location);
        }
        if let Some(product) = &self.reference_product {
            parts.push(product);
        }
        parts.join(" ")
    }

    /// Text projection used for biosphere fuzzy matching: `name categories`
    pub fn biosphere_text(&self) -> String {
        biosphere_text(&self.name, self.categories.as_deref())
    }

    /// Short description for display
    pub fn short_description(&self) -> String {
        match (&self.reference_product, &self.location) {
            (Some(product), Some(location)) => format!("{} | {} | {}", self.name, product, location),
            (None, Some(location)) => format!("{} | {}", self.name, location),
            _ => match &self.categories {
                Some(categories) => format!("{} {:?}", self.name, categories),
                None => self.name.clone(),
            },
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Record {}

impl std::hash::Hash for Record {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

pub(crate) fn biosphere_text(name: &str, categories: Option<&[String]>) -> String {
    match categories {
        Some(categories) if !categories.is_empty() => format!("{} {}", name, categories.join(", ")),
        _ => name.to_string(),
    }
}

/// Four-attribute comparison key for technosphere activities.
///
/// All four fields must be equal; an absent field only equals another
/// absent field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub name: String,
    pub location: Option<String>,
    pub unit: Option<String>,
    pub reference_product: Option<String>,
}

impl MatchKey {
    /// Check whether a record carries exactly these attributes
    pub fn matches(&self, record: &Record) -> bool {
        self.name == record.name
            && self.location == record.location
            && self.unit == record.unit
            && self.reference_product == record.reference_product
    }
}
