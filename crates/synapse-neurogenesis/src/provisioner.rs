//! Lifecycle provisioner client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use synapse_common::types::wire::{ProvisionRequest, ProvisionedAgent};
use synapse_common::{ProvisioningError, Result, SynapseError};
use tracing::{info, instrument};

/// Statuses that mean the provisioner gave up on the agent
const FAILED_STATUSES: [&str; 2] = ["failed", "error"];

/// Creates and starts new worker agents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LifecycleProvisioner: Send + Sync {
    async fn create_agent(&self, request: &ProvisionRequest) -> Result<ProvisionedAgent>;
}

/// Provisioner reached over HTTP: POST `{base}/agents`
pub struct HttpProvisioner {
    client: Client,
    base_url: String,
}

impl HttpProvisioner {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynapseError::Config(format!("Failed to build provisioner client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LifecycleProvisioner for HttpProvisioner {
    #[instrument(skip(self, request), fields(concept = %request.concept))]
    async fn create_agent(&self, request: &ProvisionRequest) -> Result<ProvisionedAgent> {
        let url = format!("{}/agents", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| match SynapseError::from(e) {
                SynapseError::Timeout(msg) => SynapseError::Timeout(msg),
                other => ProvisioningError::Unavailable(other.to_string()).into(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisioningError::Rejected(format!("{}: {}", status, body)).into());
        }

        let agent: ProvisionedAgent = response.json().await?;
        check_ready(&agent)?;

        info!(agent = %agent.agent_name, endpoint = %agent.endpoint, "Agent provisioned");
        Ok(agent)
    }
}

/// Reject agents the provisioner reports as failed
pub fn check_ready(agent: &ProvisionedAgent) -> Result<()> {
    let status = agent.status.to_lowercase();
    if FAILED_STATUSES.contains(&status.as_str()) || agent.endpoint.trim().is_empty() {
        return Err(ProvisioningError::NotReady { status: agent.status.clone() }.into());
    }
    Ok(())
}
