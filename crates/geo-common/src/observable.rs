//! What is being observed, as far as resampling and typing care.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of observable a contextualized value represents.
///
/// Only the distinction between continuous and categorical quantities
/// matters here: it drives the default interpolation kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservableKind {
    /// Continuous, quantified values.
    Quantity,
    /// Classified values.
    Category,
    /// Presence/absence of something.
    Detection,
    /// Boolean verification.
    Verification,
    /// Anything else (objects, events, processes).
    Other(String),
}

impl ObservableKind {
    /// Parse from string (case-insensitive). Unknown names become `Other`.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "quantity" | "quantification" | "quality" => Self::Quantity,
            "category" | "categorization" | "class" => Self::Category,
            "detection" | "presence" => Self::Detection,
            "verification" | "boolean" => Self::Verification,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Quantity => "quantity",
            Self::Category => "category",
            Self::Detection => "detection",
            Self::Verification => "verification",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ObservableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type of the values a resource produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Number,
    Geometry,
    Object,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observable_from_str() {
        assert_eq!(ObservableKind::from_str("Quantity"), ObservableKind::Quantity);
        assert_eq!(
            ObservableKind::from_str("categorization"),
            ObservableKind::Category
        );
        assert_eq!(
            ObservableKind::from_str("event"),
            ObservableKind::Other("event".into())
        );
        assert_eq!(ObservableKind::Detection.to_string(), "detection");
    }
}
