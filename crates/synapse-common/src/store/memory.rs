//! In-process knowledge store
//!
//! Uses DashMap for concurrent access. Affinity updates run under the map's
//! per-entry lock, which makes each edge mutation a single atomic step.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use super::{GraphNode, KnowledgeStore, NodeLabel, NodeQuery, NodeRef, Relationship, RelationshipKind};
use crate::error::Result;
use crate::types::affinity::{validate_decay_rate, AffinityEdge, DecayScope};

/// In-memory storage implementation
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    /// Nodes by (label, name)
    nodes: DashMap<(NodeLabel, String), GraphNode>,

    /// Affinity edges by (agent, concept)
    edges: DashMap<(String, String), AffinityEdge>,

    /// Non-affinity relationships
    relationships: RwLock<Vec<Relationship>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of affinity edges held
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of nodes held
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_or_stub(&self, node_ref: &NodeRef) -> GraphNode {
        self.nodes
            .get(&(node_ref.label, node_ref.name.clone()))
            .map(|n| n.clone())
            .unwrap_or_else(|| GraphNode::new(node_ref.label, node_ref.name.clone(), serde_json::Value::Null))
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn find_connected_nodes(
        &self,
        node: &NodeRef,
        relationship: RelationshipKind,
    ) -> Result<Vec<GraphNode>> {
        if relationship == RelationshipKind::HandlesConcept {
            let connected = self
                .edges
                .iter()
                .filter_map(|entry| {
                    let edge = entry.value();
                    match node.label {
                        NodeLabel::Concept if edge.concept == node.name => {
                            Some(NodeRef::agent(edge.agent_id.clone()))
                        }
                        NodeLabel::Agent if edge.agent_id == node.name => {
                            Some(NodeRef::concept(edge.concept.clone()))
                        }
                        _ => None,
                    }
                })
                .collect::<Vec<_>>();
            return Ok(connected.iter().map(|r| self.node_or_stub(r)).collect());
        }

        let refs: Vec<NodeRef> = self
            .relationships
            .read()
            .iter()
            .filter(|r| r.kind == relationship)
            .filter_map(|r| {
                if &r.from == node {
                    Some(r.to.clone())
                } else if &r.to == node {
                    Some(r.from.clone())
                } else {
                    None
                }
            })
            .collect();

        Ok(refs.iter().map(|r| self.node_or_stub(r)).collect())
    }

    async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<GraphNode>> {
        if let Some(name) = &query.name {
            return Ok(self
                .nodes
                .get(&(query.label, name.clone()))
                .map(|n| vec![n.clone()])
                .unwrap_or_default());
        }

        let mut nodes: Vec<GraphNode> = self
            .nodes
            .iter()
            .filter(|entry| entry.key().0 == query.label)
            .map(|entry| entry.value().clone())
            .collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }

    async fn create_node(&self, node: GraphNode) -> Result<()> {
        self.nodes.insert((node.label, node.name.clone()), node);
        Ok(())
    }

    async fn create_relationship(&self, relationship: Relationship) -> Result<()> {
        let mut relationships = self.relationships.write();

        let exists = relationships.iter().any(|r| {
            r.from == relationship.from && r.to == relationship.to && r.kind == relationship.kind
        });
        if !exists {
            relationships.push(relationship);
        }
        Ok(())
    }

    async fn agents_for_concept(&self, concept: &str) -> Result<Vec<AffinityEdge>> {
        Ok(self
            .edges
            .iter()
            .filter(|entry| entry.key().1 == concept)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get_edge(&self, agent_id: &str, concept: &str) -> Result<Option<AffinityEdge>> {
        Ok(self
            .edges
            .get(&(agent_id.to_string(), concept.to_string()))
            .map(|e| e.clone()))
    }

    async fn strengthen(
        &self,
        agent_id: &str,
        concept: &str,
        success: bool,
        delta: f64,
    ) -> Result<AffinityEdge> {
        let mut entry = self
            .edges
            .entry((agent_id.to_string(), concept.to_string()))
            .or_insert_with(|| AffinityEdge::new(agent_id, concept));

        let mut next = entry.clone();
        next.apply_outcome(success, delta);
        next.validate()?;
        *entry = next.clone();
        Ok(next)
    }

    async fn decay(
        &self,
        scope: &DecayScope,
        rate: f64,
        updated_before: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        validate_decay_rate(rate)?;

        let mut touched = 0u64;
        for mut entry in self.edges.iter_mut() {
            let edge = entry.value_mut();
            if !scope.matches(&edge.agent_id, &edge.concept) {
                continue;
            }
            if let Some(cutoff) = updated_before {
                if edge.last_updated >= cutoff {
                    continue;
                }
            }

            let mut next = edge.clone();
            next.apply_decay(rate);
            next.validate()?;
            *edge = next;
            touched += 1;
        }
        Ok(touched)
    }

    async fn seed_edge(&self, edge: AffinityEdge) -> Result<AffinityEdge> {
        edge.validate()?;
        self.edges
            .insert((edge.agent_id.clone(), edge.concept.clone()), edge.clone());
        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynapseError;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_strengthen_get_or_create() {
        let store = InMemoryKnowledgeStore::new();

        let edge = store.strengthen("definer", "lightbulb", true, 0.05).await.unwrap();
        assert!((edge.weight - 0.55).abs() < 1e-9);
        assert_eq!(edge.usage_count, 1);
        assert_eq!(store.edge_count(), 1);

        let edge = store.strengthen("definer", "lightbulb", false, -0.02).await.unwrap();
        assert!((edge.weight - 0.53).abs() < 1e-9);
        assert_eq!(edge.failure_count, 1);
        assert_eq!(edge.success_rate, 0.5);
    }

    #[tokio::test]
    async fn test_concurrent_strengthen_loses_no_updates() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let mut handles = Vec::new();

        for i in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.strengthen("definer", "lightbulb", i % 2 == 0, 0.0).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let edge = store.get_edge("definer", "lightbulb").await.unwrap().unwrap();
        assert_eq!(edge.usage_count, 64);
        assert_eq!(edge.success_count, 32);
        assert_eq!(edge.failure_count, 32);
    }

    #[tokio::test]
    async fn test_decay_respects_scope_and_cutoff() {
        let store = InMemoryKnowledgeStore::new();
        store.strengthen("a", "x", true, 0.0).await.unwrap();
        store.strengthen("b", "x", true, 0.0).await.unwrap();
        store.strengthen("a", "y", true, 0.0).await.unwrap();

        let touched = store
            .decay(&DecayScope::Agent { agent_id: "a".into() }, 0.1, None)
            .await
            .unwrap();
        assert_eq!(touched, 2);

        let b = store.get_edge("b", "x").await.unwrap().unwrap();
        assert_eq!(b.weight, 0.5);

        // Every edge was reinforced after this cutoff
        let cutoff = Utc::now() - chrono::Duration::hours(1);
        let touched = store.decay(&DecayScope::All, 0.1, Some(cutoff)).await.unwrap();
        assert_eq!(touched, 0);
    }

    #[tokio::test]
    async fn test_decay_rejects_invalid_rate() {
        let store = InMemoryKnowledgeStore::new();
        let result = store.decay(&DecayScope::All, 1.5, None).await;
        assert!(matches!(result, Err(SynapseError::Consistency(_))));
    }

    #[tokio::test]
    async fn test_seed_rejects_inconsistent_edge() {
        let store = InMemoryKnowledgeStore::new();
        let mut edge = AffinityEdge::new("a", "x");
        edge.usage_count = 3;

        assert!(store.seed_edge(edge).await.is_err());
        assert_eq!(store.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_connected_nodes_follow_relationships() {
        let store = InMemoryKnowledgeStore::new();
        store
            .create_relationship(Relationship::new(
                NodeRef::agent("definer"),
                NodeRef::region("global"),
                RelationshipKind::BelongsTo,
            ))
            .await
            .unwrap();
        store
            .create_relationship(Relationship::new(
                NodeRef::agent("definer"),
                NodeRef::region("global"),
                RelationshipKind::BelongsTo,
            ))
            .await
            .unwrap();
        store.strengthen("definer", "lightbulb", true, 0.05).await.unwrap();

        let regions = store
            .find_connected_nodes(&NodeRef::agent("definer"), RelationshipKind::BelongsTo)
            .await
            .unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].name, "global");

        let handlers = store
            .find_connected_nodes(&NodeRef::concept("lightbulb"), RelationshipKind::HandlesConcept)
            .await
            .unwrap();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].label, NodeLabel::Agent);
    }
}
