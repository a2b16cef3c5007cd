//! Affinity edges - learned agent→concept association strength
//!
//! An edge is reinforced additively on every reported outcome and weakened
//! multiplicatively by decay. The weight is the `hebbian_weight` component of
//! relevance scoring.
//!
//! ```text
//! strengthen:  w ← clamp(w ± δ, 0, 1)
//! decay:       w ← max(0, w × (1 − r))
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConsistencyError;

/// Starting weight for an edge created by its first outcome
pub const DEFAULT_WEIGHT: f64 = 0.5;

/// Starting weight for an edge seeded by neurogenesis
pub const NEUROGENESIS_SEED_WEIGHT: f64 = 0.8;

/// Default per-edge decay rate
pub const DEFAULT_DECAY_RATE: f64 = 0.01;

const RATE_TOLERANCE: f64 = 1e-9;

/// Reinforcement step sizes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HebbianDeltas {
    /// Added to the weight on success
    pub success: f64,
    /// Subtracted from the weight on failure
    pub failure: f64,
}

impl Default for HebbianDeltas {
    fn default() -> Self {
        Self {
            success: 0.05,
            failure: 0.02,
        }
    }
}

impl HebbianDeltas {
    /// Signed delta for an outcome
    pub fn for_outcome(&self, success: bool) -> f64 {
        if success {
            self.success
        } else {
            -self.failure
        }
    }

    /// Both deltas must lie in [0, 1]
    pub fn validate(&self) -> Result<(), ConsistencyError> {
        for value in [self.success, self.failure] {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(ConsistencyError::InvalidRate(value));
            }
        }
        Ok(())
    }
}

/// Which edges a decay pass touches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum DecayScope {
    Agent { agent_id: String },
    Concept { concept: String },
    AgentConcept { agent_id: String, concept: String },
    All,
}

impl DecayScope {
    /// Check whether an edge falls inside this scope
    pub fn matches(&self, agent_id: &str, concept: &str) -> bool {
        match self {
            DecayScope::Agent { agent_id: a } => a == agent_id,
            DecayScope::Concept { concept: c } => c == concept,
            DecayScope::AgentConcept {
                agent_id: a,
                concept: c,
            } => a == agent_id && c == concept,
            DecayScope::All => true,
        }
    }
}

/// Agent→Concept reinforcement edge (HANDLES_CONCEPT)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityEdge {
    pub agent_id: String,
    pub concept: String,
    /// Association strength in [0, 1]
    pub weight: f64,
    pub usage_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// success_count / usage_count, 0 while unused
    pub success_rate: f64,
    pub decay_rate: f64,
    /// Last reinforcement (strengthen or seed)
    pub last_updated: DateTime<Utc>,
    /// Last decay pass that touched this edge
    #[serde(default)]
    pub last_decayed: Option<DateTime<Utc>>,
    /// Intents this edge was seeded for; empty means unscoped
    #[serde(default)]
    pub intents: BTreeSet<String>,
}

impl AffinityEdge {
    /// Fresh edge at the default weight with zeroed counters
    pub fn new(agent_id: impl Into<String>, concept: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            concept: concept.into(),
            weight: DEFAULT_WEIGHT,
            usage_count: 0,
            success_count: 0,
            failure_count: 0,
            success_rate: 0.0,
            decay_rate: DEFAULT_DECAY_RATE,
            last_updated: Utc::now(),
            last_decayed: None,
            intents: BTreeSet::new(),
        }
    }

    /// Edge created by neurogenesis for a freshly provisioned agent
    pub fn seeded(
        agent_id: impl Into<String>,
        concept: impl Into<String>,
        weight: f64,
        intents: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut edge = Self::new(agent_id, concept);
        edge.weight = weight.clamp(0.0, 1.0);
        edge.intents = intents.into_iter().collect();
        edge
    }

    /// Apply one outcome with the given signed delta
    pub fn apply_outcome(&mut self, success: bool, delta: f64) {
        self.weight = (self.weight + delta).clamp(0.0, 1.0);
        self.usage_count += 1;
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.success_rate = self.success_count as f64 / self.usage_count as f64;
        self.last_updated = Utc::now();
    }

    /// Multiplicative decay
    pub fn apply_decay(&mut self, rate: f64) {
        self.weight = (self.weight * (1.0 - rate)).max(0.0);
        self.last_decayed = Some(Utc::now());
    }

    /// Whether this edge was seeded for the given intent
    pub fn covers_intent(&self, intent: &str) -> bool {
        self.intents.contains(intent)
    }

    /// Check all edge invariants
    pub fn validate(&self) -> Result<(), ConsistencyError> {
        if self.success_count + self.failure_count != self.usage_count {
            return Err(ConsistencyError::CounterMismatch {
                usage: self.usage_count,
                success: self.success_count,
                failure: self.failure_count,
            });
        }
        if !(0.0..=1.0).contains(&self.weight) || self.weight.is_nan() {
            return Err(ConsistencyError::WeightOutOfRange(self.weight));
        }
        let expected = if self.usage_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.usage_count as f64
        };
        if (expected - self.success_rate).abs() > RATE_TOLERANCE {
            return Err(ConsistencyError::SuccessRateDrift {
                expected,
                actual: self.success_rate,
            });
        }
        Ok(())
    }
}

/// Reject decay rates outside [0, 1]
pub fn validate_decay_rate(rate: f64) -> Result<(), ConsistencyError> {
    if !(0.0..=1.0).contains(&rate) || rate.is_nan() {
        return Err(ConsistencyError::InvalidRate(rate));
    }
    Ok(())
}
