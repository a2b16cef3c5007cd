//! Wire types exchanged with worker agents and the lifecycle provisioner

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A unit of work submitted to the router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub concept: String,
    pub intent: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub domain_indicators: BTreeSet<String>,
}

impl Task {
    pub fn new(task_id: impl Into<String>, concept: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            concept: concept.into(),
            intent: intent.into(),
            args: serde_json::Value::Null,
            domain_indicators: BTreeSet::new(),
        }
    }
}

/// Router → agent dispatch request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: String,
    pub intent: String,
    pub concept: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Agent-reported task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTaskStatus {
    Success,
    Error,
    NoExpertise,
}

/// Response body shapes agents may return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentPayload {
    Basic {
        #[serde(default)]
        response: serde_json::Value,
    },
    Enhanced {
        #[serde(default)]
        response: serde_json::Value,
        confidence: f64,
        #[serde(default)]
        sources: Vec<String>,
        #[serde(default)]
        related_concepts: Vec<String>,
    },
}

impl AgentPayload {
    /// Self-reported confidence, only carried by enhanced payloads
    pub fn confidence(&self) -> Option<f64> {
        match self {
            AgentPayload::Basic { .. } => None,
            AgentPayload::Enhanced { confidence, .. } => Some(confidence.clamp(0.0, 1.0)),
        }
    }

    pub fn response(&self) -> &serde_json::Value {
        match self {
            AgentPayload::Basic { response } | AgentPayload::Enhanced { response, .. } => response,
        }
    }
}

impl Default for AgentPayload {
    fn default() -> Self {
        AgentPayload::Basic {
            response: serde_json::Value::Null,
        }
    }
}

/// Agent → router dispatch response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub agent_name: String,
    pub status: AgentTaskStatus,
    #[serde(default)]
    pub data: AgentPayload,
}

/// Kinds of inter-agent collaboration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationType {
    KnowledgeRequest,
    ContextSharing,
    FunctionExecution,
}

/// Identity of the caller in a collaboration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAgent {
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: String,
}

/// Synthesizer → agent collaboration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationRequest {
    pub source_agent: SourceAgent,
    pub collaboration_type: CollaborationType,
    pub target_concept: String,
    pub specific_request: serde_json::Value,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl CollaborationRequest {
    /// Knowledge request issued during neurogenesis research
    pub fn knowledge_request(concept: &str, intent: &str) -> Self {
        Self {
            source_agent: SourceAgent {
                name: "synapse-neurogenesis".to_string(),
                agent_type: "coordinator".to_string(),
            },
            collaboration_type: CollaborationType::KnowledgeRequest,
            target_concept: concept.to_string(),
            specific_request: serde_json::json!({
                "knowledge_type": "definition",
                "include_applications": true,
                "include_related_concepts": true,
            }),
            context: serde_json::json!({ "intent": intent }),
        }
    }
}

/// Knowledge carried in a collaboration response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeData {
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub applications: Vec<String>,
    #[serde(default)]
    pub related_concepts: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Agent → synthesizer collaboration response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationResponse {
    pub agent_name: String,
    pub status: AgentTaskStatus,
    #[serde(default)]
    pub data: KnowledgeData,
    #[serde(default)]
    pub collaboration_metadata: serde_json::Value,
}

/// Request to the lifecycle provisioner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub concept: String,
    pub intent: String,
    pub research_data: serde_json::Value,
    pub region: String,
}

/// Agent created by the lifecycle provisioner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionedAgent {
    pub agent_id: String,
    pub agent_name: String,
    pub endpoint: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub status: String,
}
