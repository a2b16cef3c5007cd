//! Capability index
//!
//! Discovery pipeline:
//!
//! ```text
//! cache ─hit─▶ results
//!   │ miss
//!   ▼
//! strategies (a–d) ─▶ merge ─▶ intent gate ─▶ score ─▶ threshold ─▶ sort ─▶ cap ─▶ cache
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use synapse_common::config::IndexSettings;
use synapse_common::types::agent::CollaborationRecord;
use synapse_common::{
    AffinityEdge, AgentProfile, KnowledgeStore, NodeLabel, NodeQuery, PerformanceUpdate,
    QueryContext, RelevanceScore, Result, SynapseError,
};
use synapse_ledger::AffinityLedger;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{CacheKey, CacheStats, DiscoveryCache, RedisDiscoveryCache};
use crate::cluster::{build_clusters, AgentCluster};
use crate::profiles::{
    profile_from_node, profile_to_node, ProfileDirectory, AVAILABILITY_PENALTY,
    AVAILABILITY_RECOVERY,
};
use crate::scorer;
use crate::strategy::{self, DiscoveryStrategy};

/// Upper bound on in-process cache entries
const MAX_CACHE_ENTRIES: usize = 10_000;

/// Multi-strategy agent discovery over the profile directory
pub struct CapabilityIndex {
    store: Arc<dyn KnowledgeStore>,
    ledger: Arc<AffinityLedger>,
    settings: IndexSettings,
    profiles: ProfileDirectory,
    clusters: RwLock<Vec<AgentCluster>>,
    cache: DiscoveryCache,
    shared_cache: Option<RedisDiscoveryCache>,
}

impl CapabilityIndex {
    pub fn new(store: Arc<dyn KnowledgeStore>, ledger: Arc<AffinityLedger>, settings: IndexSettings) -> Self {
        let cache = DiscoveryCache::new(settings.cache_ttl(), MAX_CACHE_ENTRIES);
        Self {
            store,
            ledger,
            settings,
            profiles: ProfileDirectory::new(),
            clusters: RwLock::new(Vec::new()),
            cache,
            shared_cache: None,
        }
    }

    /// Attach the shared Redis tier
    pub fn with_shared_cache(mut self, cache: RedisDiscoveryCache) -> Self {
        self.shared_cache = Some(cache);
        self
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Query context for a request, merging caller-supplied hints
    pub fn build_query(concept: &str, intent: &str, context: Option<&QueryContext>) -> QueryContext {
        let mut query = QueryContext::new(concept, intent);
        if let Some(hints) = context {
            query
                .domain_indicators
                .extend(hints.domain_indicators.iter().map(|d| d.to_lowercase()));
            query
                .required_capabilities
                .extend(hints.required_capabilities.iter().map(|c| c.to_lowercase()));
            query.complexity_score = hints.complexity_score.clamp(0.0, 1.0);
            query.urgency = hints.urgency;
        }
        query
    }

    /// Ranked candidates for a request; never fails
    #[instrument(skip(self, context))]
    pub async fn discover(
        &self,
        concept: &str,
        intent: &str,
        context: Option<&QueryContext>,
    ) -> Vec<RelevanceScore> {
        let query = Self::build_query(concept, intent, context);
        let key = CacheKey::for_query(&query);

        if let Some(results) = self.cache.get(&key) {
            debug!(concept = %query.concept, "Discovery cache hit");
            return results;
        }

        if let Some(shared) = &self.shared_cache {
            match shared.get(&key).await {
                Ok(Some(results)) => {
                    self.cache.insert(key, results.clone());
                    return results;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Shared discovery cache unavailable"),
            }
        }

        let candidates = self.gather_candidates(&query).await;
        let results = self.rank_candidates(&query, candidates).await;

        if let Some(shared) = &self.shared_cache {
            if let Err(e) = shared.set(&key, &results).await {
                warn!(error = %e, "Failed to write shared discovery cache");
            }
        }
        self.cache.insert(key, results.clone());

        info!(
            concept = %query.concept,
            intent = %query.intent,
            found = results.len(),
            "Discovery complete"
        );
        results
    }

    /// Merge every strategy's proposals, remembering who proposed whom
    async fn gather_candidates(&self, query: &QueryContext) -> BTreeMap<String, BTreeSet<DiscoveryStrategy>> {
        let profiles = self.profiles.snapshot();
        let clusters = self.clusters.read().clone();

        let direct = strategy::direct_lookup(self.store.as_ref(), query).await;
        let proposals = [
            (DiscoveryStrategy::DirectLookup, direct),
            (DiscoveryStrategy::DomainKeyword, strategy::domain_keyword(&profiles, query)),
            (DiscoveryStrategy::CapabilityMatch, strategy::capability_match(&profiles, query)),
            (DiscoveryStrategy::ClusterMembership, strategy::cluster_membership(&clusters, query)),
        ];

        let mut candidates: BTreeMap<String, BTreeSet<DiscoveryStrategy>> = BTreeMap::new();
        for (strategy, proposal) in proposals {
            match proposal {
                Ok(names) => {
                    for name in names {
                        candidates.entry(name).or_default().insert(strategy);
                    }
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "Discovery strategy failed");
                }
            }
        }
        candidates
    }

    async fn rank_candidates(
        &self,
        query: &QueryContext,
        candidates: BTreeMap<String, BTreeSet<DiscoveryStrategy>>,
    ) -> Vec<RelevanceScore> {
        let mut resolved = Vec::with_capacity(candidates.len());
        for (name, strategies) in candidates {
            match self.resolve_profile(&name).await {
                Some(profile) => resolved.push((profile, strategies)),
                None => debug!(agent = %name, "Candidate has no profile, skipping"),
            }
        }

        let edges = join_all(
            resolved
                .iter()
                .map(|(profile, _)| self.ledger.lookup_edge(&profile.name, &query.concept)),
        )
        .await;

        let mut results: Vec<RelevanceScore> = resolved
            .iter()
            .zip(edges)
            .filter_map(|((profile, strategies), edge)| {
                let edge = edge.unwrap_or_else(|e| {
                    warn!(agent = %profile.name, error = %e, "Affinity unavailable, scoring neutral");
                    None
                });
                if !passes_intent_gate(profile, query, edge.as_ref()) {
                    debug!(agent = %profile.name, intent = %query.intent, "Candidate does not serve intent");
                    return None;
                }

                let mut scored = scorer::score(profile, query, edge.as_ref());
                let via: Vec<&str> = strategies.iter().map(|s| s.name()).collect();
                scored.reasoning.push(format!("found via {}", via.join(", ")));
                Some(scored)
            })
            .filter(|s| s.relevance_score >= self.settings.min_relevance_threshold)
            .collect();

        results.sort_by(|a, b| {
            OrderedFloat(b.relevance_score)
                .cmp(&OrderedFloat(a.relevance_score))
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });
        results.truncate(self.settings.max_agents_per_query);
        results
    }

    /// Local profile, falling back to the store for agents not yet refreshed
    async fn resolve_profile(&self, name: &str) -> Option<AgentProfile> {
        if let Some(profile) = self.profiles.get(name) {
            return Some(profile);
        }

        let nodes = match self.store.query_nodes(&NodeQuery::named(NodeLabel::Agent, name)).await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(agent = %name, error = %e, "Profile lookup failed");
                return None;
            }
        };
        let profile = nodes.iter().find_map(profile_from_node)?;
        self.register_profile(profile);
        self.profiles.get(name)
    }

    /// Add or merge a profile into the local directory
    pub fn register_profile(&self, mut profile: AgentProfile) {
        profile.max_history = self.settings.performance_history_cap.max(1);
        debug!(agent = %profile.name, "Registering profile");
        self.profiles.upsert(profile);
        self.rebuild_clusters();
    }

    /// Write the profile's Agent node to the store, then register it locally
    #[instrument(skip(self, profile), fields(agent = %profile.name))]
    pub async fn publish_profile(&self, profile: AgentProfile) -> Result<()> {
        self.store.create_node(profile_to_node(&profile)).await?;
        self.register_profile(profile);
        Ok(())
    }

    pub fn profile(&self, name: &str) -> Option<AgentProfile> {
        self.profiles.get(name)
    }

    pub fn profiles(&self) -> Vec<AgentProfile> {
        self.profiles.snapshot()
    }

    /// Registered agents able to answer knowledge requests
    pub fn knowledge_sources(&self) -> Vec<AgentProfile> {
        self.profiles.knowledge_sources()
    }

    pub fn clusters(&self) -> Vec<AgentCluster> {
        self.clusters.read().clone()
    }

    /// Append a performance sample and recompute rolling metrics
    pub fn update_performance(&self, agent_id: &str, update: PerformanceUpdate) -> Result<()> {
        if self.profiles.record_performance(agent_id, update) {
            Ok(())
        } else {
            Err(SynapseError::NotFound(format!("Agent profile {}", agent_id)))
        }
    }

    /// Log a collaboration call the agent took part in
    pub fn record_collaboration(&self, agent_id: &str, record: CollaborationRecord) {
        if !self.profiles.record_collaboration(agent_id, record) {
            debug!(agent = %agent_id, "Collaboration for unknown agent");
        }
    }

    /// Lower availability after a failed dispatch
    pub fn mark_unavailable(&self, agent_id: &str) {
        if let Some(score) = self.profiles.nudge_availability(agent_id, -AVAILABILITY_PENALTY) {
            warn!(agent = %agent_id, availability = score, "Agent marked unavailable");
        }
    }

    /// Raise availability after an answered dispatch
    pub fn mark_available(&self, agent_id: &str) {
        self.profiles.nudge_availability(agent_id, AVAILABILITY_RECOVERY);
    }

    /// Pull Agent nodes from the store into the directory
    #[instrument(skip(self))]
    pub async fn refresh_profiles(&self) -> Result<usize> {
        let nodes = self.store.query_nodes(&NodeQuery::all(NodeLabel::Agent)).await?;

        let mut refreshed = 0;
        for node in &nodes {
            match profile_from_node(node) {
                Some(mut profile) => {
                    profile.max_history = self.settings.performance_history_cap.max(1);
                    self.profiles.upsert(profile);
                    refreshed += 1;
                }
                None => debug!(agent = %node.name, "Agent node without directory fields"),
            }
        }

        if refreshed > 0 {
            self.rebuild_clusters();
        }
        Ok(refreshed)
    }

    /// Recompute clusters from the current directory
    pub fn rebuild_clusters(&self) -> usize {
        let clusters = build_clusters(&self.profiles.snapshot());
        let count = clusters.len();
        *self.clusters.write() = clusters;
        count
    }

    /// Drop expired in-process cache entries
    pub fn sweep_cache(&self) -> usize {
        self.cache.sweep()
    }

    /// Drop cached discoveries for a concept in both tiers
    pub async fn invalidate_concept(&self, concept: &str) -> usize {
        let mut dropped = self.cache.invalidate_concept(concept);
        if let Some(shared) = &self.shared_cache {
            match shared.invalidate_concept(concept).await {
                Ok(n) => dropped += n as usize,
                Err(e) => warn!(concept = %concept, error = %e, "Shared cache invalidation failed"),
            }
        }
        dropped
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Start profile refresh, cluster rebuild and cache sweep loops
    pub fn spawn_maintenance(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        let refresh = {
            let index = self.clone();
            spawn_every(self.settings.profile_refresh_interval(), move || {
                let index = index.clone();
                async move {
                    match index.refresh_profiles().await {
                        Ok(n) => debug!(refreshed = n, "Profile refresh"),
                        Err(e) => error!(error = %e, "Profile refresh failed"),
                    }
                }
            })
        };

        let clustering = {
            let index = self.clone();
            spawn_every(self.settings.cluster_update_interval(), move || {
                let index = index.clone();
                async move {
                    let count = index.rebuild_clusters();
                    debug!(clusters = count, "Clusters rebuilt");
                }
            })
        };

        let sweep = {
            let index = self.clone();
            spawn_every(self.settings.cache_ttl(), move || {
                let index = index.clone();
                async move {
                    let swept = index.sweep_cache();
                    if swept > 0 {
                        debug!(swept, "Discovery cache swept");
                    }
                }
            })
        };

        vec![refresh, clustering, sweep]
    }
}

/// Keep candidates able to serve the intent
///
/// Passes when nothing is required, when a required capability is covered, or
/// when the agent's edge was seeded for this intent.
pub fn passes_intent_gate(profile: &AgentProfile, query: &QueryContext, edge: Option<&AffinityEdge>) -> bool {
    query.required_capabilities.is_empty()
        || query
            .required_capabilities
            .iter()
            .any(|c| profile.has_capability(c))
        || edge.map(|e| e.covers_intent(&query.intent)).unwrap_or(false)
}

fn spawn_every<F, Fut>(period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let period = period.max(Duration::from_secs(1));
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            tick().await;
        }
    })
}
