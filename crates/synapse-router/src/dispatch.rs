//! Task dispatch to worker agents

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use synapse_common::types::wire::{TaskRequest, TaskResponse};
use synapse_common::{Result, SynapseError};
use tracing::instrument;

/// Sends a task to an agent endpoint
#[async_trait]
pub trait AgentDispatcher: Send + Sync {
    async fn dispatch(&self, endpoint: &str, request: &TaskRequest) -> Result<TaskResponse>;
}

/// Dispatch over HTTP: POST the task to the agent's endpoint
pub struct HttpDispatcher {
    client: Client,
}

impl HttpDispatcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynapseError::Config(format!("Failed to build dispatch client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AgentDispatcher for HttpDispatcher {
    #[instrument(skip(self, request), fields(task_id = %request.task_id))]
    async fn dispatch(&self, endpoint: &str, request: &TaskRequest) -> Result<TaskResponse> {
        let response = self.client.post(endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynapseError::Network(format!("{} returned {}", endpoint, status)));
        }
        Ok(response.json().await?)
    }
}
