//! HTTP client for a remote knowledge store service
//!
//! Every operation is a JSON POST that returns a `{success, data, error}`
//! envelope. Affinity edges coming back from the service are validated before
//! they are handed to callers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{GraphNode, KnowledgeStore, NodeQuery, NodeRef, Relationship, RelationshipKind};
use crate::error::{Result, SynapseError};
use crate::types::affinity::{validate_decay_rate, AffinityEdge, DecayScope};

/// Response envelope returned by the store service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Serialize)]
struct ConnectedNodesRequest<'a> {
    node: &'a NodeRef,
    relationship: RelationshipKind,
}

#[derive(Serialize)]
struct ConceptRequest<'a> {
    concept: &'a str,
}

#[derive(Serialize)]
struct EdgeRequest<'a> {
    agent_id: &'a str,
    concept: &'a str,
}

#[derive(Serialize)]
struct StrengthenRequest<'a> {
    agent_id: &'a str,
    concept: &'a str,
    success: bool,
    delta: f64,
}

#[derive(Serialize)]
struct DecayRequest<'a> {
    #[serde(flatten)]
    scope: &'a DecayScope,
    rate: f64,
    updated_before: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct DecayResult {
    touched: u64,
}

/// Knowledge store reached over HTTP
pub struct HttpKnowledgeStore {
    base_url: String,
    client: Client,
}

impl HttpKnowledgeStore {
    /// Create a client; every request is bounded by `timeout`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynapseError::Config(format!("Failed to build store client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Knowledge store request");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SynapseError::Storage(format!(
                "Knowledge store returned {} for {}",
                status, path
            )));
        }

        let envelope: StoreResponse<T> = response.json().await?;
        if !envelope.success {
            return Err(SynapseError::Storage(
                envelope
                    .error
                    .unwrap_or_else(|| format!("Knowledge store call {} failed", path)),
            ));
        }
        Ok(envelope.data)
    }

    async fn call_required<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.call(path, body)
            .await?
            .ok_or_else(|| SynapseError::Storage(format!("Knowledge store call {} returned no data", path)))
    }
}

fn validated(edge: AffinityEdge) -> Result<AffinityEdge> {
    edge.validate()?;
    Ok(edge)
}

#[async_trait]
impl KnowledgeStore for HttpKnowledgeStore {
    #[instrument(skip(self))]
    async fn find_connected_nodes(
        &self,
        node: &NodeRef,
        relationship: RelationshipKind,
    ) -> Result<Vec<GraphNode>> {
        let nodes: Option<Vec<GraphNode>> = self
            .call("/find_connected_nodes", &ConnectedNodesRequest { node, relationship })
            .await?;
        Ok(nodes.unwrap_or_default())
    }

    async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<GraphNode>> {
        let nodes: Option<Vec<GraphNode>> = self.call("/query_nodes", query).await?;
        Ok(nodes.unwrap_or_default())
    }

    async fn create_node(&self, node: GraphNode) -> Result<()> {
        self.call::<_, serde_json::Value>("/create_node", &node).await?;
        Ok(())
    }

    async fn create_relationship(&self, relationship: Relationship) -> Result<()> {
        self.call::<_, serde_json::Value>("/create_relationship", &relationship)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn agents_for_concept(&self, concept: &str) -> Result<Vec<AffinityEdge>> {
        let edges: Option<Vec<AffinityEdge>> = self
            .call("/get_agents_for_concept", &ConceptRequest { concept })
            .await?;
        edges.unwrap_or_default().into_iter().map(validated).collect()
    }

    async fn get_edge(&self, agent_id: &str, concept: &str) -> Result<Option<AffinityEdge>> {
        let edge: Option<AffinityEdge> = self
            .call("/hebbian/edge", &EdgeRequest { agent_id, concept })
            .await?;
        edge.map(validated).transpose()
    }

    #[instrument(skip(self))]
    async fn strengthen(
        &self,
        agent_id: &str,
        concept: &str,
        success: bool,
        delta: f64,
    ) -> Result<AffinityEdge> {
        let edge: AffinityEdge = self
            .call_required(
                "/hebbian/strengthen",
                &StrengthenRequest {
                    agent_id,
                    concept,
                    success,
                    delta,
                },
            )
            .await?;
        validated(edge)
    }

    #[instrument(skip(self))]
    async fn decay(
        &self,
        scope: &DecayScope,
        rate: f64,
        updated_before: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        validate_decay_rate(rate)?;
        let result: DecayResult = self
            .call_required(
                "/hebbian/decay",
                &DecayRequest {
                    scope,
                    rate,
                    updated_before,
                },
            )
            .await?;
        Ok(result.touched)
    }

    async fn seed_edge(&self, edge: AffinityEdge) -> Result<AffinityEdge> {
        edge.validate()?;
        let stored: AffinityEdge = self.call_required("/hebbian/seed", &edge).await?;
        validated(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parsing() {
        let ok: StoreResponse<Vec<GraphNode>> = serde_json::from_str(
            r#"{"success": true, "data": [{"label": "Agent", "name": "definer"}]}"#,
        )
        .unwrap();
        assert!(ok.success);
        assert_eq!(ok.data.unwrap()[0].name, "definer");

        let failed: StoreResponse<Vec<GraphNode>> =
            serde_json::from_str(r#"{"success": false, "error": "graph offline"}"#).unwrap();
        assert!(!failed.success);
        assert!(failed.data.is_none());
        assert_eq!(failed.error.as_deref(), Some("graph offline"));
    }

    fn decode<T: DeserializeOwned>(raw: &str) -> StoreResponse<T> {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_envelope_without_data_for_non_default_payload() {
        let empty: StoreResponse<AffinityEdge> = decode(r#"{"success": true}"#);
        assert!(empty.success);
        assert!(empty.data.is_none());
        assert!(empty.error.is_none());

        let edge: StoreResponse<AffinityEdge> = decode(
            r#"{"success": true, "data": {"agent_id": "definer", "concept": "lightbulb",
                "weight": 0.6, "usage_count": 2, "success_count": 2, "failure_count": 0,
                "success_rate": 1.0, "decay_rate": 0.01,
                "last_updated": "2026-01-01T00:00:00Z"}}"#,
        );
        let edge = edge.data.unwrap();
        assert_eq!(edge.agent_id, "definer");
        assert!(edge.last_decayed.is_none());
    }

    #[test]
    fn test_decay_request_flattens_scope() {
        let scope = DecayScope::Concept {
            concept: "lightbulb".into(),
        };
        let body = serde_json::to_value(DecayRequest {
            scope: &scope,
            rate: 0.01,
            updated_before: None,
        })
        .unwrap();
        assert_eq!(body["scope"], "concept");
        assert_eq!(body["concept"], "lightbulb");
        assert_eq!(body["rate"], 0.01);
    }

    #[test]
    fn test_base_url_is_normalized() {
        let store = HttpKnowledgeStore::new("http://graph:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(store.base_url(), "http://graph:8080");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_transient() {
        let store = HttpKnowledgeStore::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let err = store.agents_for_concept("lightbulb").await.unwrap_err();
        assert!(err.is_transient());
    }
}
