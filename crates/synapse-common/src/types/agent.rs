//! Agent profiles - the directory entry for one worker in the fleet

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default cap on the rolling performance history
pub const DEFAULT_PERFORMANCE_HISTORY_CAP: usize = 100;

/// Cap on the collaboration log kept per agent
pub const MAX_COLLABORATION_HISTORY: usize = 50;

/// Boot value of every performance metric before the first report
pub const NEUTRAL_METRIC: f64 = 0.5;

/// How an agent entered the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationMethod {
    Static,
    Neurogenesis,
}

impl Default for CreationMethod {
    fn default() -> Self {
        CreationMethod::Static
    }
}

/// Rolling quality metrics, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub response_quality: f64,
    pub accuracy: f64,
    pub helpfulness: f64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            response_quality: NEUTRAL_METRIC,
            accuracy: NEUTRAL_METRIC,
            helpfulness: NEUTRAL_METRIC,
        }
    }
}

impl PerformanceMetrics {
    /// Mean of the three metrics
    pub fn overall(&self) -> f64 {
        ((self.response_quality + self.accuracy + self.helpfulness) / 3.0).clamp(0.0, 1.0)
    }
}

/// One performance report; absent fields leave that metric untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceUpdate {
    pub response_quality: Option<f64>,
    pub accuracy: Option<f64>,
    pub helpfulness: Option<f64>,
}

impl PerformanceUpdate {
    /// Report derived from a dispatched task's outcome
    pub fn from_outcome(success: bool, confidence: Option<f64>) -> Self {
        let binary = if success { 1.0 } else { 0.0 };
        Self {
            response_quality: Some(confidence.unwrap_or(binary).clamp(0.0, 1.0)),
            accuracy: Some(binary),
            helpfulness: Some(binary),
        }
    }
}

/// Timestamped entry in the bounded history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub update: PerformanceUpdate,
    pub recorded_at: DateTime<Utc>,
}

/// Record of a collaboration call involving this agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationRecord {
    pub partner: String,
    pub collaboration_type: String,
    pub concept: String,
    pub succeeded: bool,
    pub at: DateTime<Utc>,
}

/// Directory entry for a worker agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Unique agent name
    pub name: String,
    pub endpoint: String,
    #[serde(rename = "type", default = "default_agent_type")]
    pub agent_type: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub expertise_domains: BTreeSet<String>,
    #[serde(default = "neutral")]
    pub specialization_score: f64,
    #[serde(default = "fully_available")]
    pub availability_score: f64,
    #[serde(default)]
    pub performance: PerformanceMetrics,
    #[serde(default)]
    pub creation_method: CreationMethod,
    #[serde(default)]
    pub collaboration_history: Vec<CollaborationRecord>,
    #[serde(default)]
    pub performance_history: VecDeque<PerformanceSample>,
    #[serde(default = "default_history_cap")]
    pub max_history: usize,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

fn default_agent_type() -> String {
    "specialist".to_string()
}

fn neutral() -> f64 {
    NEUTRAL_METRIC
}

fn fully_available() -> f64 {
    1.0
}

fn default_history_cap() -> usize {
    DEFAULT_PERFORMANCE_HISTORY_CAP
}

impl AgentProfile {
    /// Create a static agent profile
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            agent_type: default_agent_type(),
            capabilities: BTreeSet::new(),
            expertise_domains: BTreeSet::new(),
            specialization_score: NEUTRAL_METRIC,
            availability_score: 1.0,
            performance: PerformanceMetrics::default(),
            creation_method: CreationMethod::Static,
            collaboration_history: Vec::new(),
            performance_history: VecDeque::new(),
            max_history: DEFAULT_PERFORMANCE_HISTORY_CAP,
            created_at: Utc::now(),
            last_seen: None,
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(|c| c.into().to_lowercase()));
        self
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expertise_domains
            .extend(domains.into_iter().map(|d| d.into().to_lowercase()));
        self
    }

    pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.agent_type = agent_type.into();
        self
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.max_history = cap.max(1);
        self
    }

    /// Append a report to the bounded history and recompute rolling metrics
    pub fn record_performance(&mut self, update: PerformanceUpdate) {
        self.performance_history.push_back(PerformanceSample {
            update,
            recorded_at: Utc::now(),
        });
        while self.performance_history.len() > self.max_history {
            self.performance_history.pop_front();
        }
        self.recompute_metrics();
        self.last_seen = Some(Utc::now());
    }

    fn recompute_metrics(&mut self) {
        let history = &self.performance_history;
        let mean = |pick: fn(&PerformanceUpdate) -> Option<f64>| -> Option<f64> {
            let values: Vec<f64> = history
                .iter()
                .filter_map(|s| pick(&s.update))
                .map(|v| v.clamp(0.0, 1.0))
                .collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        if let Some(v) = mean(|u| u.response_quality) {
            self.performance.response_quality = v;
        }
        if let Some(v) = mean(|u| u.accuracy) {
            self.performance.accuracy = v;
        }
        if let Some(v) = mean(|u| u.helpfulness) {
            self.performance.helpfulness = v;
        }
    }

    /// Append to the collaboration log, dropping the oldest entries past the cap
    pub fn record_collaboration(&mut self, record: CollaborationRecord) {
        self.collaboration_history.push(record);
        if self.collaboration_history.len() > MAX_COLLABORATION_HISTORY {
            let excess = self.collaboration_history.len() - MAX_COLLABORATION_HISTORY;
            self.collaboration_history.drain(..excess);
        }
    }

    /// Merge directory fields from a fresher copy, keeping local observations
    pub fn merge_from_store(&mut self, fresh: &AgentProfile) {
        self.endpoint = fresh.endpoint.clone();
        self.agent_type = fresh.agent_type.clone();
        self.capabilities = fresh.capabilities.clone();
        self.expertise_domains = fresh.expertise_domains.clone();
        self.specialization_score = fresh.specialization_score.clamp(0.0, 1.0);
        self.creation_method = fresh.creation_method;
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_metrics_average_history() {
        let mut profile = AgentProfile::new("definer", "http://localhost:9001");
        profile.record_performance(PerformanceUpdate::from_outcome(true, None));
        profile.record_performance(PerformanceUpdate::from_outcome(false, None));

        assert!((profile.performance.accuracy - 0.5).abs() < 1e-9);
        assert_eq!(profile.performance_history.len(), 2);
        assert!(profile.last_seen.is_some());
    }

    #[test]
    fn test_partial_update_keeps_other_metrics() {
        let mut profile = AgentProfile::new("definer", "http://localhost:9001");
        profile.record_performance(PerformanceUpdate {
            accuracy: Some(0.9),
            ..Default::default()
        });

        assert!((profile.performance.accuracy - 0.9).abs() < 1e-9);
        assert_eq!(profile.performance.helpfulness, NEUTRAL_METRIC);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut profile = AgentProfile::new("definer", "http://localhost:9001").with_history_cap(3);
        for i in 0..10 {
            profile.record_performance(PerformanceUpdate {
                accuracy: Some(i as f64 / 10.0),
                ..Default::default()
            });
        }

        assert_eq!(profile.performance_history.len(), 3);
        // Only 0.7, 0.8, 0.9 remain
        assert!((profile.performance.accuracy - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_profile_deserializes_with_defaults() {
        let json = r#"{"name": "scheduler", "endpoint": "http://s:1", "capabilities": ["scheduling"]}"#;
        let profile: AgentProfile = serde_json::from_str(json).unwrap();

        assert_eq!(profile.agent_type, "specialist");
        assert_eq!(profile.availability_score, 1.0);
        assert_eq!(profile.creation_method, CreationMethod::Static);
        assert!(profile.has_capability("scheduling"));
    }
}
