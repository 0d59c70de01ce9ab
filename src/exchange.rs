//! Exchange types - quantified edges between records
//!
//! Three exchange types exist:
//! - `Technosphere`: activity → activity (economic input)
//! - `Biosphere`: activity → flow (emission or resource)
//! - `Production`: activity → itself (reference output)

use crate::key::RecordKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    /// Input from another activity
    Technosphere,
    /// Exchange with the environment
    Biosphere,
    /// Reference product output of the owning activity
    Production,
}

impl ExchangeKind {
    /// Get the string representation of the exchange kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Technosphere => "technosphere",
            ExchangeKind::Biosphere => "biosphere",
            ExchangeKind::Production => "production",
        }
    }

    /// Get all exchange kinds
    pub fn all() -> &'static [ExchangeKind] {
        &[
            ExchangeKind::Technosphere,
            ExchangeKind::Biosphere,
            ExchangeKind::Production,
        ]
    }
}

impl FromStr for ExchangeKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "technosphere" | "tech" => Ok(ExchangeKind::Technosphere),
            "biosphere" | "bio" => Ok(ExchangeKind::Biosphere),
            "production" | "prod" => Ok(ExchangeKind::Production),
            _ => Err(crate::Error::InvalidKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Uncertainty parameters of an exchange amount.
///
/// Copied verbatim when an exchange is recreated; the migrator never
/// interprets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Uncertainty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

/// An exchange: `output` consumes (or emits, or produces) `amount` of `input`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Owning activity
    pub output: RecordKey,
    /// Target record
    pub input: RecordKey,
    pub amount: f64,
    pub unit: Option<String>,
    #[serde(rename = "type")]
    pub kind: ExchangeKind,
    #[serde(flatten)]
    pub uncertainty: Uncertainty,
}

impl Exchange {
    /// Create a new exchange without unit or uncertainty
    pub fn new(output: RecordKey, input: RecordKey, amount: f64, kind: ExchangeKind) -> Self {
        Self {
            output,
            input,
            amount,
            unit: None,
            kind,
            uncertainty: Uncertainty::default(),
        }
    }

    /// One unit of `key` produced by itself
    pub fn production(key: RecordKey, unit: Option<String>) -> Self {
        Self {
            output: key.clone(),
            input: key,
            amount: 1.0,
            unit,
            kind: ExchangeKind::Production,
            uncertainty: Uncertainty::default(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_uncertainty(mut self, uncertainty: Uncertainty) -> Self {
        self.uncertainty = uncertainty;
        self
    }

    pub fn is_production(&self) -> bool {
        self.kind == ExchangeKind::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: &str) -> RecordKey {
        RecordKey::new("p", "db", code)
    }

    #[test]
    fn test_exchange_kind_roundtrip() {
        for kind in ExchangeKind::all() {
            let parsed: ExchangeKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
        assert!("substitution".parse::<ExchangeKind>().is_err());
    }

    #[test]
    fn test_production_is_self_referential() {
        let exc = Exchange::production(key("a"), Some("kg".to_string()));
        assert!(exc.is_production());
        assert_eq!(exc.input, exc.output);
        assert_eq!(exc.amount, 1.0);
        assert_eq!(exc.unit.as_deref(), Some("kg"));
    }

    #[test]
    fn test_exchange_json_shape() {
        let exc = Exchange::new(key("a"), key("b"), 0.5, ExchangeKind::Technosphere)
            .with_unit("kg")
            .with_uncertainty(Uncertainty {
                uncertainty_type: Some(2),
                loc: Some(-0.69),
                scale: Some(0.1),
                ..Default::default()
            });

        let json = serde_json::to_value(&exc).unwrap();
        assert_eq!(json["type"], "technosphere");
        assert_eq!(json["uncertainty_type"], 2);
        assert!(json.get("minimum").is_none());
    }
}
