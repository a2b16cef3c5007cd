//! Concept nodes in the knowledge store

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical concept key: trimmed, lowercase, whitespace runs joined by `_`
pub fn normalize_concept(raw: &str) -> String {
    raw.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Split a concept or domain into comparable tokens
pub fn tokenize(raw: &str) -> BTreeSet<String> {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_string)
        .collect()
}

/// A unit of knowledge the fleet can be asked about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Canonical key, immutable once created
    pub name: String,
    pub definition: String,
    /// Research confidence in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub related_concepts: BTreeSet<String>,
    #[serde(default)]
    pub applications: BTreeSet<String>,
    /// Agents whose research contributed to the definition
    #[serde(default)]
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Concept {
    pub fn new(name: &str, definition: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: normalize_concept(name),
            definition: definition.into(),
            confidence: confidence.clamp(0.0, 1.0),
            related_concepts: BTreeSet::new(),
            applications: BTreeSet::new(),
            sources: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_concept() {
        assert_eq!(normalize_concept("  Light   Bulb "), "light_bulb");
        assert_eq!(normalize_concept("Graphene"), "graphene");
    }

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("supply_chain-logistics");
        assert!(tokens.contains("supply"));
        assert!(tokens.contains("chain"));
        assert!(tokens.contains("logistics"));
    }

    #[test]
    fn test_concept_confidence_clamped() {
        let concept = Concept::new("Graphene", "a carbon allotrope", 1.4);
        assert_eq!(concept.name, "graphene");
        assert_eq!(concept.confidence, 1.0);
    }
}
