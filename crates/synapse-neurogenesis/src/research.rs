//! Research broadcast
//!
//! A knowledge request goes to every research source at once. Each call is
//! bounded by the research timeout; silent or failing sources are tolerated
//! and simply do not contribute.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use synapse_common::types::wire::{AgentTaskStatus, CollaborationRequest, CollaborationResponse};
use synapse_common::{Result, SynapseError};
use tracing::{debug, instrument, warn};

/// Transport for collaboration calls
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CollaborationClient: Send + Sync {
    /// Send a collaboration request to an agent endpoint
    async fn collaborate(&self, endpoint: &str, request: &CollaborationRequest) -> Result<CollaborationResponse>;
}

/// Collaboration over HTTP: POST `{endpoint}/collaborate`
pub struct HttpCollaborationClient {
    client: Client,
}

impl HttpCollaborationClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynapseError::Config(format!("Failed to build collaboration client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CollaborationClient for HttpCollaborationClient {
    async fn collaborate(&self, endpoint: &str, request: &CollaborationRequest) -> Result<CollaborationResponse> {
        let url = format!("{}/collaborate", endpoint.trim_end_matches('/'));
        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynapseError::Network(format!("{} returned {}", url, status)));
        }
        Ok(response.json().await?)
    }
}

/// An agent asked to contribute research
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSource {
    pub name: String,
    pub endpoint: String,
}

/// Result of one source's call
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub source: String,
    pub responded: bool,
}

/// Aggregated knowledge from every responding source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchFindings {
    pub concept: String,
    /// Definitions of every responding source, in source order
    pub definition: String,
    pub applications: BTreeSet<String>,
    pub related_concepts: BTreeSet<String>,
    /// Mean confidence over responding sources
    pub confidence: f64,
    /// Sources that answered with knowledge
    pub sources: Vec<String>,
    /// Number of sources contacted
    pub contacted: usize,
}

impl ResearchFindings {
    pub fn responded(&self) -> usize {
        self.sources.len()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Broadcast a knowledge request and aggregate the answers
#[instrument(skip(client, sources), fields(sources = sources.len()))]
pub async fn research(
    client: &dyn CollaborationClient,
    sources: &[ResearchSource],
    concept: &str,
    intent: &str,
    timeout: Duration,
) -> (ResearchFindings, Vec<SourceOutcome>) {
    let request = CollaborationRequest::knowledge_request(concept, intent);

    let calls = sources.iter().map(|source| {
        let request = &request;
        async move {
            let reply = tokio::time::timeout(timeout, client.collaborate(&source.endpoint, request)).await;
            let reply = match reply {
                Ok(Ok(response)) => Some(response),
                Ok(Err(e)) => {
                    warn!(source = %source.name, error = %e, "Research source failed");
                    None
                }
                Err(_) => {
                    warn!(source = %source.name, "Research source timed out");
                    None
                }
            };
            (source, reply)
        }
    });
    let replies = join_all(calls).await;

    let mut findings = ResearchFindings {
        concept: concept.to_string(),
        contacted: sources.len(),
        ..Default::default()
    };
    let mut definitions = Vec::new();
    let mut confidence_sum = 0.0;
    let mut outcomes = Vec::with_capacity(replies.len());

    for (source, reply) in replies {
        let answered = match reply {
            Some(response) if response.status == AgentTaskStatus::Success => {
                let data = response.data;
                if !data.definition.trim().is_empty() {
                    definitions.push(data.definition.trim().to_string());
                }
                findings.applications.extend(data.applications);
                findings.related_concepts.extend(data.related_concepts);
                confidence_sum += data.confidence.clamp(0.0, 1.0);
                findings.sources.push(source.name.clone());
                true
            }
            Some(response) => {
                debug!(source = %source.name, status = ?response.status, "Research source declined");
                false
            }
            None => false,
        };
        outcomes.push(SourceOutcome {
            source: source.name.clone(),
            responded: answered,
        });
    }

    findings.definition = definitions.join("\n\n");
    if findings.responded() > 0 {
        findings.confidence = confidence_sum / findings.responded() as f64;
    }
    (findings, outcomes)
}
