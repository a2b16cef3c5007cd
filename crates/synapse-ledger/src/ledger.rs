//! Affinity ledger
//!
//! Reinforcement goes through the store's atomic `strengthen`; the ledger only
//! validates parameters, normalizes concept keys and bounds read latency.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ordered_float::OrderedFloat;
use synapse_common::config::HebbianSettings;
use synapse_common::types::affinity::{validate_decay_rate, DEFAULT_DECAY_RATE, DEFAULT_WEIGHT};
use synapse_common::{
    normalize_concept, AffinityEdge, DecayScope, HebbianDeltas, KnowledgeStore, Result,
    SynapseError,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Learned agent→concept weights backed by the knowledge store
pub struct AffinityLedger {
    store: Arc<dyn KnowledgeStore>,
    deltas: HebbianDeltas,
    decay_rate: f64,
    decay_interval: Duration,
    lookup_timeout: Duration,
}

impl AffinityLedger {
    /// Create a ledger from validated settings
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        settings: &HebbianSettings,
        lookup_timeout: Duration,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            store,
            deltas: settings.deltas(),
            decay_rate: settings.decay_rate,
            decay_interval: settings.decay_interval(),
            lookup_timeout,
        })
    }

    /// Ledger with default deltas, decay rate and timeouts
    pub fn with_defaults(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            deltas: HebbianDeltas::default(),
            decay_rate: DEFAULT_DECAY_RATE,
            decay_interval: Duration::from_secs(synapse_common::DEFAULT_DECAY_INTERVAL_SECS),
            lookup_timeout: Duration::from_millis(synapse_common::DEFAULT_STORE_TIMEOUT_MS),
        }
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    pub fn deltas(&self) -> HebbianDeltas {
        self.deltas
    }

    /// Record one outcome with the configured deltas
    pub async fn strengthen(&self, agent_id: &str, concept: &str, success: bool) -> Result<AffinityEdge> {
        self.strengthen_with(agent_id, concept, success, self.deltas).await
    }

    /// Record one outcome with explicit deltas
    #[instrument(skip(self, deltas))]
    pub async fn strengthen_with(
        &self,
        agent_id: &str,
        concept: &str,
        success: bool,
        deltas: HebbianDeltas,
    ) -> Result<AffinityEdge> {
        deltas.validate()?;
        let concept = normalize_concept(concept);

        let edge = self
            .store
            .strengthen(agent_id, &concept, success, deltas.for_outcome(success))
            .await?;

        debug!(
            agent = %agent_id,
            concept = %concept,
            weight = edge.weight,
            usage = edge.usage_count,
            "Affinity updated"
        );
        Ok(edge)
    }

    /// Decay every edge in scope; returns edges touched
    #[instrument(skip(self))]
    pub async fn decay(&self, scope: DecayScope, rate: f64) -> Result<u64> {
        validate_decay_rate(rate)?;
        let scope = normalize_scope(scope);
        self.store.decay(&scope, rate, None).await
    }

    /// Scheduled pass: decay edges not reinforced during the last interval
    pub async fn decay_stale(&self) -> Result<u64> {
        let interval = chrono::Duration::from_std(self.decay_interval)
            .map_err(|e| SynapseError::Config(format!("Decay interval out of range: {}", e)))?;
        let cutoff = Utc::now() - interval;
        self.store
            .decay(&DecayScope::All, self.decay_rate, Some(cutoff))
            .await
    }

    /// Edges for a concept, strongest first
    #[instrument(skip(self))]
    pub async fn get_agents_for_concept(&self, concept: &str) -> Result<Vec<AffinityEdge>> {
        let concept = normalize_concept(concept);
        let mut edges = self.store.agents_for_concept(&concept).await?;
        edges.sort_by(|a, b| {
            OrderedFloat(b.weight)
                .cmp(&OrderedFloat(a.weight))
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });
        Ok(edges)
    }

    /// Single edge lookup bounded by the store timeout
    pub async fn lookup_edge(&self, agent_id: &str, concept: &str) -> Result<Option<AffinityEdge>> {
        let concept = normalize_concept(concept);
        tokio::time::timeout(self.lookup_timeout, self.store.get_edge(agent_id, &concept)).await?
    }

    /// Edge weight, or the neutral default when unavailable
    pub async fn weight_or_default(&self, agent_id: &str, concept: &str) -> f64 {
        match self.lookup_edge(agent_id, concept).await {
            Ok(Some(edge)) => edge.weight,
            Ok(None) => DEFAULT_WEIGHT,
            Err(e) => {
                warn!(agent = %agent_id, concept = %concept, error = %e, "Affinity lookup failed, using neutral weight");
                DEFAULT_WEIGHT
            }
        }
    }

    /// Create or overwrite an edge at a starting weight
    #[instrument(skip(self, intents))]
    pub async fn seed(
        &self,
        agent_id: &str,
        concept: &str,
        weight: f64,
        intents: Vec<String>,
    ) -> Result<AffinityEdge> {
        let concept = normalize_concept(concept);
        let intents = intents.iter().map(|i| normalize_concept(i));
        let mut edge = AffinityEdge::seeded(agent_id, concept, weight, intents);
        edge.decay_rate = self.decay_rate;

        let edge = self.store.seed_edge(edge).await?;
        info!(agent = %agent_id, concept = %edge.concept, weight = edge.weight, "Affinity seeded");
        Ok(edge)
    }

    /// Start the scheduled decay loop
    pub fn spawn_decay_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.decay_interval.max(Duration::from_secs(1));
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);

            loop {
                interval.tick().await;
                match self.decay_stale().await {
                    Ok(touched) => {
                        if touched > 0 {
                            info!(touched, rate = self.decay_rate, "Scheduled affinity decay");
                        }
                    }
                    Err(e) => error!(error = %e, "Scheduled affinity decay failed"),
                }
            }
        })
    }
}

fn normalize_scope(scope: DecayScope) -> DecayScope {
    match scope {
        DecayScope::Concept { concept } => DecayScope::Concept {
            concept: normalize_concept(&concept),
        },
        DecayScope::AgentConcept { agent_id, concept } => DecayScope::AgentConcept {
            agent_id,
            concept: normalize_concept(&concept),
        },
        other => other,
    }
}
