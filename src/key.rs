//! Record keys - Global, stable identity for every activity and flow
//!
//! Format: `lca://<project>/<store>#<code>`
//!
//! Examples:
//! - `lca://ecoinvent-3.8/ecoinvent 3.8 cutoff#0a1b2c3d`
//! - `lca://ecoinvent-3.10/biosphere3#349b29d1-3e58-4c66-98b9-9d1a076efd2e`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SCHEME: &str = "lca://";

/// Globally unique key of a record.
///
/// A `code` is only unique inside one store of one project; the key adds
/// both scopes so that exchanges can point across databases (an activity in
/// `ecoinvent` consuming a flow from `biosphere3`).
///
/// Keys order lexicographically by project, then store, then code. The
/// `smallest-key` tie-break relies on this ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Project the store lives in
    pub project: String,
    /// Store (database) name
    pub store: String,
    /// Code, unique within the store
    pub code: String,
}

impl RecordKey {
    /// Create a new RecordKey
    pub fn new(project: impl Into<String>, store: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            store: store.into(),
            code: code.into(),
        }
    }

    /// Parse a key string into a RecordKey
    ///
    /// Expected format: `lca://<project>/<store>#<code>`. The project may
    /// contain `/`, the store may not.
    pub fn parse(key: &str) -> Result<Self> {
        let rest = key
            .strip_prefix(SCHEME)
            .ok_or_else(|| Error::InvalidKey(format!("key must start with {SCHEME}: {key}")))?;

        let (scope, code) = rest
            .split_once('#')
            .ok_or_else(|| Error::InvalidKey(format!("key must contain #code: {key}")))?;

        let (project, store) = scope
            .rsplit_once('/')
            .ok_or_else(|| Error::InvalidKey(format!("key must contain project/store: {key}")))?;

        if project.is_empty() || store.is_empty() || code.is_empty() {
            return Err(Error::InvalidKey(format!("empty key component: {key}")));
        }

        Ok(Self::new(project, store, code))
    }

    /// Convert to key string
    pub fn to_key_string(&self) -> String {
        format!("{}{}/{}#{}", SCHEME, self.project, self.store, self.code)
    }

    /// Whether this key lives in the given project store
    pub fn is_in(&self, project: &str, store: &str) -> bool {
        self.project == project && self.store == store
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key_string())
    }
}

impl FromStr for RecordKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for RecordKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_key_string())
    }
}

impl<'de> Deserialize<'de> for RecordKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RecordKey::parse(&s).map_err(serde::de::Error::custom)
    }
}
