//! Knowledge store access
//!
//! The knowledge store is the single logical graph holding agents, concepts,
//! regions and the affinity edges between agents and concepts. Everything
//! above this module talks to it through [`KnowledgeStore`].

pub mod http;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::affinity::{AffinityEdge, DecayScope};

pub use http::HttpKnowledgeStore;
pub use memory::InMemoryKnowledgeStore;

/// Node labels in the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Agent,
    Concept,
    Region,
}

/// Relationship kinds in the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    HandlesConcept,
    BelongsTo,
    RelatedTo,
}

/// Reference to a node by label and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub name: String,
}

impl NodeRef {
    pub fn agent(name: impl Into<String>) -> Self {
        Self {
            label: NodeLabel::Agent,
            name: name.into(),
        }
    }

    pub fn concept(name: impl Into<String>) -> Self {
        Self {
            label: NodeLabel::Concept,
            name: name.into(),
        }
    }

    pub fn region(name: impl Into<String>) -> Self {
        Self {
            label: NodeLabel::Region,
            name: name.into(),
        }
    }
}

/// A node with free-form properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub label: NodeLabel,
    pub name: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl GraphNode {
    pub fn new(label: NodeLabel, name: impl Into<String>, properties: serde_json::Value) -> Self {
        Self {
            label,
            name: name.into(),
            properties,
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef {
            label: self.label,
            name: self.name.clone(),
        }
    }
}

/// Directed relationship between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: NodeRef,
    pub to: NodeRef,
    pub kind: RelationshipKind,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl Relationship {
    pub fn new(from: NodeRef, to: NodeRef, kind: RelationshipKind) -> Self {
        Self {
            from,
            to,
            kind,
            properties: serde_json::Value::Null,
        }
    }
}

/// Filter for node queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeQuery {
    pub label: NodeLabel,
    #[serde(default)]
    pub name: Option<String>,
}

impl NodeQuery {
    pub fn all(label: NodeLabel) -> Self {
        Self { label, name: None }
    }

    pub fn named(label: NodeLabel, name: impl Into<String>) -> Self {
        Self {
            label,
            name: Some(name.into()),
        }
    }
}

/// Trait for knowledge store backends
///
/// Node and relationship creation is idempotent. `strengthen`, `decay` and
/// `seed_edge` mutate affinity edges and must be atomic per edge: the
/// read-modify-write happens inside the store, never in the caller.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Nodes connected to `node` by `relationship`, in either direction
    async fn find_connected_nodes(
        &self,
        node: &NodeRef,
        relationship: RelationshipKind,
    ) -> Result<Vec<GraphNode>>;

    /// Nodes matching a label and optional name
    async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<GraphNode>>;

    /// Create or replace a node
    async fn create_node(&self, node: GraphNode) -> Result<()>;

    /// Create a relationship if it does not exist yet
    async fn create_relationship(&self, relationship: Relationship) -> Result<()>;

    /// All affinity edges pointing at a concept
    async fn agents_for_concept(&self, concept: &str) -> Result<Vec<AffinityEdge>>;

    /// A single affinity edge
    async fn get_edge(&self, agent_id: &str, concept: &str) -> Result<Option<AffinityEdge>>;

    /// Get-or-create the edge and apply one outcome atomically
    async fn strengthen(
        &self,
        agent_id: &str,
        concept: &str,
        success: bool,
        delta: f64,
    ) -> Result<AffinityEdge>;

    /// Multiplicative decay over matching edges; returns edges touched
    ///
    /// With `updated_before`, edges reinforced at or after that instant are skipped.
    async fn decay(
        &self,
        scope: &DecayScope,
        rate: f64,
        updated_before: Option<DateTime<Utc>>,
    ) -> Result<u64>;

    /// Create or overwrite an edge at a chosen starting weight
    async fn seed_edge(&self, edge: AffinityEdge) -> Result<AffinityEdge>;
}
