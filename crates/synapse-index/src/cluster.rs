//! Agent clustering
//!
//! Clusters only widen discovery: an agent reached through a cluster still has
//! to pass the intent gate and the relevance threshold.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use synapse_common::types::concept::tokenize;
use synapse_common::AgentProfile;

/// Minimum members for a shared-domain or shared-capability cluster
pub const MIN_CLUSTER_SIZE: usize = 2;

const HIGH_TIER: f64 = 0.8;
const MEDIUM_TIER: f64 = 0.6;

/// What the members of a cluster have in common
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterKind {
    Domain,
    Capability,
    PerformanceTier,
}

/// Group of related agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCluster {
    pub id: String,
    pub kind: ClusterKind,
    /// Tokens matched against concepts and domain indicators
    pub keywords: BTreeSet<String>,
    pub members: BTreeSet<String>,
}

impl AgentCluster {
    /// Whether any keyword appears among the query tokens
    pub fn matches(&self, query_tokens: &BTreeSet<String>) -> bool {
        !self.keywords.is_disjoint(query_tokens)
    }
}

/// Performance tier label
pub fn performance_tier(overall: f64) -> &'static str {
    if overall >= HIGH_TIER {
        "high"
    } else if overall >= MEDIUM_TIER {
        "medium"
    } else {
        "emerging"
    }
}

/// Build every cluster from a fleet snapshot
pub fn build_clusters(profiles: &[AgentProfile]) -> Vec<AgentCluster> {
    let mut by_domain: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    let mut by_capability: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    let mut by_tier: BTreeMap<&'static str, BTreeSet<String>> = BTreeMap::new();

    for profile in profiles {
        for domain in &profile.expertise_domains {
            by_domain.entry(domain).or_default().insert(profile.name.clone());
        }
        for capability in &profile.capabilities {
            by_capability
                .entry(capability)
                .or_default()
                .insert(profile.name.clone());
        }
        by_tier
            .entry(performance_tier(profile.performance.overall()))
            .or_default()
            .insert(profile.name.clone());
    }

    let mut clusters = Vec::new();

    for (domain, members) in by_domain {
        if members.len() >= MIN_CLUSTER_SIZE {
            clusters.push(AgentCluster {
                id: format!("domain:{}", domain),
                kind: ClusterKind::Domain,
                keywords: keywords_for(domain),
                members,
            });
        }
    }

    for (capability, members) in by_capability {
        if members.len() >= MIN_CLUSTER_SIZE {
            clusters.push(AgentCluster {
                id: format!("capability:{}", capability),
                kind: ClusterKind::Capability,
                keywords: keywords_for(capability),
                members,
            });
        }
    }

    for (tier, members) in by_tier {
        clusters.push(AgentCluster {
            id: format!("tier:{}", tier),
            kind: ClusterKind::PerformanceTier,
            keywords: BTreeSet::from([tier.to_string()]),
            members,
        });
    }

    clusters
}

fn keywords_for(label: &str) -> BTreeSet<String> {
    let mut keywords = tokenize(label);
    keywords.insert(label.to_string());
    keywords
}
