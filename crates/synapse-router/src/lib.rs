//! # Synapse Router
//!
//! Entry point of the capability router. Tasks are matched to agents by the
//! capability index, dispatched, and their outcomes fed back into the affinity
//! ledger. Requests nobody can serve go to neurogenesis.
//!
//! [`SynapseRuntime`] builds every component once and shares it by `Arc`.

pub mod dispatch;
pub mod metrics;
pub mod router;

use std::sync::Arc;

use prometheus::Registry;
use synapse_common::{
    AgentProfile, HttpKnowledgeStore, InMemoryKnowledgeStore, KnowledgeStore, Result, SynapseConfig,
    SynapseError,
};
use synapse_index::{CapabilityIndex, RedisDiscoveryCache};
use synapse_ledger::AffinityLedger;
use synapse_neurogenesis::{
    CapabilitySynthesizer, CollaborationClient, HttpCollaborationClient, HttpProvisioner,
    LifecycleProvisioner,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use dispatch::{AgentDispatcher, HttpDispatcher};
pub use metrics::RouterMetrics;
pub use router::{RequestRouter, RouteStatus, TaskResult};

/// External collaborators the runtime is assembled from
pub struct RuntimeParts {
    pub store: Arc<dyn KnowledgeStore>,
    pub dispatcher: Arc<dyn AgentDispatcher>,
    pub collaboration: Arc<dyn CollaborationClient>,
    pub provisioner: Option<Arc<dyn LifecycleProvisioner>>,
    pub shared_cache: Option<RedisDiscoveryCache>,
}

/// Every component of a running router
pub struct SynapseRuntime {
    pub config: SynapseConfig,
    pub store: Arc<dyn KnowledgeStore>,
    pub ledger: Arc<AffinityLedger>,
    pub index: Arc<CapabilityIndex>,
    pub synthesizer: Arc<CapabilitySynthesizer>,
    pub router: Arc<RequestRouter>,
    pub metrics: Arc<RouterMetrics>,
    pub registry: Registry,
}

impl SynapseRuntime {
    /// Build the runtime with HTTP collaborators selected by configuration
    pub async fn build(config: SynapseConfig) -> Result<Self> {
        let store: Arc<dyn KnowledgeStore> = match &config.store.url {
            Some(url) => {
                info!(url = %url, "Using remote knowledge store");
                Arc::new(HttpKnowledgeStore::new(url.clone(), config.store.timeout())?)
            }
            None => {
                info!("Using in-memory knowledge store");
                Arc::new(InMemoryKnowledgeStore::new())
            }
        };

        let shared_cache = match &config.index.redis_url {
            Some(url) => match RedisDiscoveryCache::connect(
                url,
                config.index.cache_ttl(),
                config.store.timeout(),
            )
            .await
            {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!(error = %e, "Shared discovery cache unavailable, continuing without it");
                    None
                }
            },
            None => None,
        };

        let provisioner = match &config.neurogenesis.provisioner_url {
            Some(url) => {
                info!(url = %url, "Neurogenesis provisioner configured");
                let provisioner: Arc<dyn LifecycleProvisioner> =
                    Arc::new(HttpProvisioner::new(url, config.neurogenesis.provision_timeout())?);
                Some(provisioner)
            }
            None => None,
        };

        let parts = RuntimeParts {
            store,
            dispatcher: Arc::new(HttpDispatcher::new(config.router.dispatch_timeout())?),
            collaboration: Arc::new(HttpCollaborationClient::new(config.neurogenesis.research_timeout())?),
            provisioner,
            shared_cache,
        };
        Self::assemble(config, parts)
    }

    /// Wire the components together from explicit collaborators
    pub fn assemble(config: SynapseConfig, parts: RuntimeParts) -> Result<Self> {
        let ledger = Arc::new(AffinityLedger::new(
            parts.store.clone(),
            &config.hebbian,
            config.store.timeout(),
        )?);

        let mut index = CapabilityIndex::new(parts.store.clone(), ledger.clone(), config.index.clone());
        if let Some(cache) = parts.shared_cache {
            index = index.with_shared_cache(cache);
        }
        let index = Arc::new(index);

        let mut synthesizer = CapabilitySynthesizer::new(
            parts.store.clone(),
            ledger.clone(),
            index.clone(),
            parts.collaboration,
            config.neurogenesis.clone(),
        )
        .with_dynamic_agents(config.enable_dynamic_agents);
        if let Some(provisioner) = parts.provisioner {
            synthesizer = synthesizer.with_provisioner(provisioner);
        }
        let synthesizer = Arc::new(synthesizer);

        let registry = Registry::new();
        let metrics = Arc::new(RouterMetrics::new().map_err(metrics_error)?);
        metrics.register(&registry).map_err(metrics_error)?;

        let router = Arc::new(
            RequestRouter::new(
                index.clone(),
                ledger.clone(),
                synthesizer.clone(),
                parts.dispatcher,
                config.router.dispatch_timeout(),
            )
            .with_metrics(metrics.clone()),
        );

        Ok(Self {
            config,
            store: parts.store,
            ledger,
            index,
            synthesizer,
            router,
            metrics,
            registry,
        })
    }

    /// Publish the static fleet; agents that fail to publish are skipped
    pub async fn bootstrap_fleet(&self, profiles: Vec<AgentProfile>) -> usize {
        let mut published = 0;
        for profile in profiles {
            let name = profile.name.clone();
            match self.index.publish_profile(profile).await {
                Ok(()) => published += 1,
                Err(e) => warn!(agent = %name, error = %e, "Failed to publish agent"),
            }
        }
        info!(published, "Static fleet registered");
        published
    }

    /// Start the decay loop and the index maintenance loops
    pub fn start_background(&self) -> Vec<JoinHandle<()>> {
        let mut handles = vec![self.ledger.clone().spawn_decay_loop()];
        handles.extend(self.index.clone().spawn_maintenance());
        handles
    }
}

/// Read a JSON array of agent profiles
pub fn load_fleet(path: &str) -> Result<Vec<AgentProfile>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn metrics_error(err: prometheus::Error) -> SynapseError {
    SynapseError::Internal(format!("Metrics setup failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_defaults_to_memory_store() {
        let runtime = SynapseRuntime::build(SynapseConfig::default()).await.unwrap();
        assert!(!runtime.synthesizer.can_provision());
        assert!(runtime.index.profiles().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_and_background_loops() {
        let runtime = SynapseRuntime::build(SynapseConfig::default()).await.unwrap();
        let published = runtime
            .bootstrap_fleet(vec![
                AgentProfile::new("definer", "http://d:1").with_capabilities(["concept_definition"]),
                AgentProfile::new("researcher", "http://r:1").with_capabilities(["research"]),
            ])
            .await;
        assert_eq!(published, 2);
        assert_eq!(runtime.index.knowledge_sources().len(), 2);

        let handles = runtime.start_background();
        assert_eq!(handles.len(), 4);
        for handle in handles {
            handle.abort();
        }
    }

    #[test]
    fn test_load_fleet_missing_file() {
        assert!(load_fleet("/nonexistent/agents.json").is_err());
    }
}
