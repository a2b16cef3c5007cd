//! Agent profile directory
//!
//! The directory is the index's local view of the fleet. It is refreshed from
//! the store periodically, so reads are eventually consistent with the store,
//! lagging by at most one refresh interval.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::json;
use synapse_common::types::agent::CollaborationRecord;
use synapse_common::{AgentProfile, GraphNode, NodeLabel, PerformanceUpdate};

/// Availability lost on each failed dispatch
pub const AVAILABILITY_PENALTY: f64 = 0.25;

/// Availability regained on each answered dispatch
pub const AVAILABILITY_RECOVERY: f64 = 0.1;

/// Capabilities that qualify an agent as a research source
pub const KNOWLEDGE_CAPABILITIES: [&str; 3] = ["concept_definition", "research", "knowledge_sharing"];

/// Thread-safe map of agent name to profile
#[derive(Default)]
pub struct ProfileDirectory {
    profiles: RwLock<HashMap<String, AgentProfile>>,
}

impl ProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a profile, keeping local observations if the agent is known
    pub fn upsert(&self, profile: AgentProfile) {
        let mut profiles = self.profiles.write();
        match profiles.get_mut(&profile.name) {
            Some(existing) => existing.merge_from_store(&profile),
            None => {
                profiles.insert(profile.name.clone(), profile);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<AgentProfile> {
        self.profiles.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.read().contains_key(name)
    }

    /// Snapshot of every profile, sorted by name
    pub fn snapshot(&self) -> Vec<AgentProfile> {
        let mut profiles: Vec<AgentProfile> = self.profiles.read().values().cloned().collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }

    /// Apply a performance report; false if the agent is unknown
    pub fn record_performance(&self, name: &str, update: PerformanceUpdate) -> bool {
        match self.profiles.write().get_mut(name) {
            Some(profile) => {
                profile.record_performance(update);
                true
            }
            None => false,
        }
    }

    /// Append to an agent's collaboration log; false if the agent is unknown
    pub fn record_collaboration(&self, name: &str, record: CollaborationRecord) -> bool {
        match self.profiles.write().get_mut(name) {
            Some(profile) => {
                profile.record_collaboration(record);
                true
            }
            None => false,
        }
    }

    /// Adjust availability by `delta`, clamped to [0, 1]
    pub fn nudge_availability(&self, name: &str, delta: f64) -> Option<f64> {
        self.profiles.write().get_mut(name).map(|profile| {
            profile.availability_score = (profile.availability_score + delta).clamp(0.0, 1.0);
            profile.availability_score
        })
    }

    /// Agents able to answer knowledge requests
    pub fn knowledge_sources(&self) -> Vec<AgentProfile> {
        self.snapshot()
            .into_iter()
            .filter(|p| KNOWLEDGE_CAPABILITIES.iter().any(|c| p.has_capability(c)))
            .collect()
    }
}

/// Graph node carrying a profile's directory fields
pub fn profile_to_node(profile: &AgentProfile) -> GraphNode {
    GraphNode::new(
        NodeLabel::Agent,
        profile.name.clone(),
        json!({
            "name": profile.name,
            "endpoint": profile.endpoint,
            "type": profile.agent_type,
            "capabilities": profile.capabilities,
            "expertise_domains": profile.expertise_domains,
            "specialization_score": profile.specialization_score,
            "creation_method": profile.creation_method,
            "created_at": profile.created_at,
        }),
    )
}

/// Profile from an Agent node; None when the node lacks directory fields
pub fn profile_from_node(node: &GraphNode) -> Option<AgentProfile> {
    if node.label != NodeLabel::Agent {
        return None;
    }
    let mut properties = node.properties.clone();
    let map = properties.as_object_mut()?;
    map.entry("name").or_insert_with(|| json!(node.name));
    serde_json::from_value(properties).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_common::CreationMethod;

    #[test]
    fn test_upsert_keeps_history() {
        let directory = ProfileDirectory::new();
        directory.upsert(AgentProfile::new("definer", "http://d:1").with_capabilities(["concept_definition"]));
        assert!(directory.record_performance("definer", PerformanceUpdate::from_outcome(true, None)));

        let refreshed = AgentProfile::new("definer", "http://d:2").with_capabilities(["concept_definition", "explanation"]);
        directory.upsert(refreshed);

        let profile = directory.get("definer").unwrap();
        assert_eq!(profile.endpoint, "http://d:2");
        assert!(profile.has_capability("explanation"));
        assert_eq!(profile.performance_history.len(), 1);
    }

    #[test]
    fn test_unknown_agent_performance() {
        let directory = ProfileDirectory::new();
        assert!(!directory.record_performance("ghost", PerformanceUpdate::default()));
    }

    #[test]
    fn test_availability_is_clamped() {
        let directory = ProfileDirectory::new();
        directory.upsert(AgentProfile::new("definer", "http://d:1"));

        for _ in 0..10 {
            directory.nudge_availability("definer", -AVAILABILITY_PENALTY);
        }
        assert_eq!(directory.get("definer").unwrap().availability_score, 0.0);
        assert_eq!(directory.nudge_availability("definer", AVAILABILITY_RECOVERY), Some(0.1));
        assert_eq!(directory.nudge_availability("ghost", 0.1), None);
    }

    #[test]
    fn test_node_conversion() {
        let mut profile = AgentProfile::new("graphene-agent", "http://g:1")
            .with_capabilities(["concept_definition"])
            .with_domains(["graphene"]);
        profile.creation_method = CreationMethod::Neurogenesis;

        let node = profile_to_node(&profile);
        let parsed = profile_from_node(&node).unwrap();
        assert_eq!(parsed.endpoint, "http://g:1");
        assert_eq!(parsed.creation_method, CreationMethod::Neurogenesis);
        assert!(parsed.expertise_domains.contains("graphene"));

        let stub = GraphNode::new(NodeLabel::Agent, "stub", serde_json::Value::Null);
        assert!(profile_from_node(&stub).is_none());
    }

    #[test]
    fn test_knowledge_sources() {
        let directory = ProfileDirectory::new();
        directory.upsert(AgentProfile::new("definer", "http://d:1").with_capabilities(["concept_definition"]));
        directory.upsert(AgentProfile::new("scheduler", "http://s:1").with_capabilities(["scheduling"]));

        let sources = directory.knowledge_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "definer");
    }
}
