//! Query context and relevance scores
//!
//! ## Relevance Formula
//!
//! ```text
//! relevance = 0.28·expertise + 0.22·capability + 0.18·domain
//!           + 0.14·performance + 0.08·availability + 0.10·hebbian
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::concept::normalize_concept;

/// Weight of the expertise component
pub const EXPERTISE_WEIGHT: f64 = 0.28;
/// Weight of the capability component
pub const CAPABILITY_WEIGHT: f64 = 0.22;
/// Weight of the domain overlap component
pub const DOMAIN_WEIGHT: f64 = 0.18;
/// Weight of the performance component
pub const PERFORMANCE_WEIGHT: f64 = 0.14;
/// Weight of the availability component
pub const AVAILABILITY_WEIGHT: f64 = 0.08;
/// Weight of the learned affinity component
pub const HEBBIAN_WEIGHT: f64 = 0.10;

/// Capabilities an intent requires
///
/// Unknown intents require a capability named after themselves.
pub fn capabilities_for_intent(intent: &str) -> BTreeSet<String> {
    let intent = normalize_concept(intent);
    let required: &[&str] = match intent.as_str() {
        "define" | "definition" => &["concept_definition"],
        "explain" => &["explanation", "concept_definition"],
        "compare" => &["comparison"],
        "summarize" => &["summarization"],
        "research" => &["research"],
        "schedule" | "schedule_shift" => &["scheduling"],
        "calculate" => &["calculation"],
        "troubleshoot" => &["diagnostics"],
        "translate" => &["translation"],
        "" => &[],
        other => return BTreeSet::from([other.to_string()]),
    };
    required.iter().map(|c| c.to_string()).collect()
}

/// Request urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Normal
    }
}

/// Everything known about a request at discovery time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub concept: String,
    pub intent: String,
    /// Estimated difficulty in [0, 1]
    #[serde(default)]
    pub complexity_score: f64,
    #[serde(default)]
    pub domain_indicators: BTreeSet<String>,
    #[serde(default)]
    pub required_capabilities: BTreeSet<String>,
    #[serde(default)]
    pub urgency: Urgency,
}

impl QueryContext {
    /// Context with capabilities derived from the intent
    pub fn new(concept: &str, intent: &str) -> Self {
        Self {
            concept: normalize_concept(concept),
            intent: normalize_concept(intent),
            complexity_score: 0.0,
            domain_indicators: BTreeSet::new(),
            required_capabilities: capabilities_for_intent(intent),
            urgency: Urgency::Normal,
        }
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain_indicators
            .extend(domains.into_iter().map(|d| d.into().to_lowercase()));
        self
    }

    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.complexity_score = complexity.clamp(0.0, 1.0);
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    /// Canonical string form used for cache keys
    pub fn cache_fingerprint(&self) -> String {
        let domains: Vec<&str> = self.domain_indicators.iter().map(String::as_str).collect();
        let caps: Vec<&str> = self
            .required_capabilities
            .iter()
            .map(String::as_str)
            .collect();
        format!(
            "{}|{}|{:.2}|{}|{}|{:?}",
            normalize_concept(&self.concept),
            normalize_concept(&self.intent),
            self.complexity_score,
            domains.join(","),
            caps.join(","),
            self.urgency
        )
    }
}

/// Per-candidate relevance breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceScore {
    pub agent_id: String,
    pub endpoint: String,
    pub expertise_match: f64,
    pub capability_match: f64,
    pub domain_overlap: f64,
    pub performance_factor: f64,
    pub availability_factor: f64,
    pub hebbian_weight: f64,
    /// Weighted combination of the six components
    pub relevance_score: f64,
    pub confidence: f64,
    pub reasoning: Vec<String>,
}

/// Fixed weighted sum of the six components
pub fn combine_components(
    expertise: f64,
    capability: f64,
    domain: f64,
    performance: f64,
    availability: f64,
    hebbian: f64,
) -> f64 {
    let total = EXPERTISE_WEIGHT * expertise
        + CAPABILITY_WEIGHT * capability
        + DOMAIN_WEIGHT * domain
        + PERFORMANCE_WEIGHT * performance
        + AVAILABILITY_WEIGHT * availability
        + HEBBIAN_WEIGHT * hebbian;
    total.clamp(0.0, 1.0)
}
