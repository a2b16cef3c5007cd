//! Candidate discovery strategies
//!
//! Each strategy proposes agent names independently. The index merges them,
//! treating a failed strategy as an empty proposal.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use synapse_common::types::concept::tokenize;
use synapse_common::{AgentProfile, KnowledgeStore, NodeLabel, NodeRef, QueryContext, RelationshipKind, Result};

use crate::cluster::AgentCluster;

/// The four ways a candidate can be found
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStrategy {
    /// Agents already linked to the concept in the store
    DirectLookup,
    /// Domain indicators and concept tokens against expertise domains
    DomainKeyword,
    /// Required capabilities against advertised capabilities
    CapabilityMatch,
    /// Members of clusters whose keywords overlap the query
    ClusterMembership,
}

impl DiscoveryStrategy {
    pub const ALL: [DiscoveryStrategy; 4] = [
        DiscoveryStrategy::DirectLookup,
        DiscoveryStrategy::DomainKeyword,
        DiscoveryStrategy::CapabilityMatch,
        DiscoveryStrategy::ClusterMembership,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DiscoveryStrategy::DirectLookup => "direct_lookup",
            DiscoveryStrategy::DomainKeyword => "domain_keyword",
            DiscoveryStrategy::CapabilityMatch => "capability_match",
            DiscoveryStrategy::ClusterMembership => "cluster_membership",
        }
    }
}

/// Tokens a query is matched on: indicators, the concept and its parts
pub fn query_keywords(query: &QueryContext) -> BTreeSet<String> {
    let mut keywords = tokenize(&query.concept);
    keywords.insert(query.concept.clone());
    for indicator in &query.domain_indicators {
        keywords.insert(indicator.clone());
        keywords.extend(tokenize(indicator));
    }
    keywords
}

/// (a) agents with a HANDLES_CONCEPT edge to the concept
pub async fn direct_lookup(store: &dyn KnowledgeStore, query: &QueryContext) -> Result<BTreeSet<String>> {
    let nodes = store
        .find_connected_nodes(&NodeRef::concept(query.concept.clone()), RelationshipKind::HandlesConcept)
        .await?;
    Ok(nodes
        .into_iter()
        .filter(|n| n.label == NodeLabel::Agent)
        .map(|n| n.name)
        .collect())
}

/// (b) agents whose expertise domains share a keyword with the query
pub fn domain_keyword(profiles: &[AgentProfile], query: &QueryContext) -> Result<BTreeSet<String>> {
    let keywords = query_keywords(query);
    Ok(profiles
        .iter()
        .filter(|p| {
            p.expertise_domains
                .iter()
                .any(|d| keywords.contains(d) || !tokenize(d).is_disjoint(&keywords))
        })
        .map(|p| p.name.clone())
        .collect())
}

/// (c) agents advertising at least one required capability
pub fn capability_match(profiles: &[AgentProfile], query: &QueryContext) -> Result<BTreeSet<String>> {
    if query.required_capabilities.is_empty() {
        return Ok(BTreeSet::new());
    }
    Ok(profiles
        .iter()
        .filter(|p| query.required_capabilities.iter().any(|c| p.has_capability(c)))
        .map(|p| p.name.clone())
        .collect())
}

/// (d) members of clusters matching the query keywords
pub fn cluster_membership(clusters: &[AgentCluster], query: &QueryContext) -> Result<BTreeSet<String>> {
    let keywords = query_keywords(query);
    Ok(clusters
        .iter()
        .filter(|c| c.matches(&keywords))
        .flat_map(|c| c.members.iter().cloned())
        .collect())
}
