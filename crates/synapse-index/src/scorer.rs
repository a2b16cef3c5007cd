//! Relevance scoring
//!
//! Six components in [0, 1], combined with fixed weights:
//!
//! ```text
//! expertise     exact domain → 1.0, else 0.6 × token coverage, × (0.8 + 0.2·specialization)
//! capability    |required ∩ capabilities| / |required|      (0.5 if nothing required)
//! domain        |indicators ∩ domains| / |indicators|        (0.5 if no indicators)
//! performance   mean of the rolling metrics
//! availability  availability score
//! hebbian       learned affinity weight                     (0.5 if unknown)
//! ```

use std::collections::BTreeSet;

use synapse_common::types::affinity::DEFAULT_WEIGHT;
use synapse_common::types::concept::tokenize;
use synapse_common::types::query::combine_components;
use synapse_common::{AffinityEdge, AgentProfile, QueryContext, RelevanceScore};

/// Usage count at which learned evidence saturates confidence
const USAGE_SATURATION: f64 = 20.0;

/// Expertise of an agent for a concept
pub fn expertise_match(profile: &AgentProfile, concept: &str) -> f64 {
    let base = if profile.expertise_domains.contains(concept) {
        1.0
    } else {
        let tokens = tokenize(concept);
        if tokens.is_empty() {
            0.0
        } else {
            let domain_tokens: BTreeSet<String> = profile
                .expertise_domains
                .iter()
                .flat_map(|d| tokenize(d))
                .collect();
            let covered = tokens.iter().filter(|t| domain_tokens.contains(*t)).count();
            0.6 * covered as f64 / tokens.len() as f64
        }
    };
    let specialization = profile.specialization_score.clamp(0.0, 1.0);
    (base * (0.8 + 0.2 * specialization)).clamp(0.0, 1.0)
}

/// Share of required capabilities the agent covers
pub fn capability_match(profile: &AgentProfile, required: &BTreeSet<String>) -> f64 {
    if required.is_empty() {
        return 0.5;
    }
    let covered = required.iter().filter(|c| profile.has_capability(c)).count();
    covered as f64 / required.len() as f64
}

/// Share of domain indicators among the agent's expertise domains
pub fn domain_overlap(profile: &AgentProfile, indicators: &BTreeSet<String>) -> f64 {
    if indicators.is_empty() {
        return 0.5;
    }
    let shared = indicators.intersection(&profile.expertise_domains).count();
    shared as f64 / indicators.len() as f64
}

/// Score one candidate
///
/// `edge` is None when no affinity exists or the lookup failed.
pub fn score(profile: &AgentProfile, query: &QueryContext, edge: Option<&AffinityEdge>) -> RelevanceScore {
    let expertise = expertise_match(profile, &query.concept);
    let capability = capability_match(profile, &query.required_capabilities);
    let domain = domain_overlap(profile, &query.domain_indicators);
    let performance = profile.performance.overall();
    let availability = profile.availability_score.clamp(0.0, 1.0);
    let hebbian = edge.map(|e| e.weight).unwrap_or(DEFAULT_WEIGHT).clamp(0.0, 1.0);
    let usage = edge.map(|e| e.usage_count).unwrap_or(0);

    let relevance = combine_components(expertise, capability, domain, performance, availability, hebbian);
    let confidence = (0.5 * capability
        + 0.3 * expertise
        + 0.2 * (usage as f64 / USAGE_SATURATION).min(1.0))
    .clamp(0.0, 1.0);

    RelevanceScore {
        agent_id: profile.name.clone(),
        endpoint: profile.endpoint.clone(),
        expertise_match: expertise,
        capability_match: capability,
        domain_overlap: domain,
        performance_factor: performance,
        availability_factor: availability,
        hebbian_weight: hebbian,
        relevance_score: relevance,
        confidence,
        reasoning: reasoning(expertise, capability, domain, performance, availability, hebbian, query),
    }
}

fn reasoning(
    expertise: f64,
    capability: f64,
    domain: f64,
    performance: f64,
    availability: f64,
    hebbian: f64,
    query: &QueryContext,
) -> Vec<String> {
    let mut trail = Vec::new();

    if expertise >= 0.8 {
        trail.push("strong expertise match".to_string());
    } else if expertise > 0.0 {
        trail.push("partial expertise match".to_string());
    }

    if query.required_capabilities.is_empty() {
        trail.push("no capability requirement".to_string());
    } else if capability >= 1.0 {
        trail.push(format!("covers all capabilities for '{}'", query.intent));
    } else if capability > 0.0 {
        trail.push(format!("covers some capabilities for '{}'", query.intent));
    }

    if !query.domain_indicators.is_empty() && domain > 0.0 {
        trail.push(format!("domain overlap {:.2}", domain));
    }

    if performance >= 0.8 {
        trail.push("high recent performance".to_string());
    } else if performance < 0.4 {
        trail.push("poor recent performance".to_string());
    }

    if availability < 0.5 {
        trail.push("reduced availability".to_string());
    }

    if hebbian >= 0.7 {
        trail.push("strong learned association".to_string());
    } else if hebbian <= 0.3 {
        trail.push("weak learned association".to_string());
    }

    trail
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definer() -> AgentProfile {
        AgentProfile::new("definer", "http://d:1").with_capabilities(["concept_definition"])
    }

    #[test]
    fn test_default_edge_is_neutral() {
        let query = QueryContext::new("lightbulb", "define");
        let scored = score(&definer(), &query, None);

        assert_eq!(scored.hebbian_weight, 0.5);
        assert_eq!(scored.capability_match, 1.0);
        assert_eq!(scored.domain_overlap, 0.5);
        assert_eq!(scored.expertise_match, 0.0);
        // 0.22 + 0.18·0.5 + 0.14·0.5 + 0.08 + 0.10·0.5
        assert!((scored.relevance_score - 0.51).abs() < 1e-9);
        assert!((scored.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_expertise_levels() {
        let exact = definer().with_domains(["lightbulb"]);
        assert!((expertise_match(&exact, "lightbulb") - 0.9).abs() < 1e-9);

        let partial = definer().with_domains(["electric lighting"]);
        assert_eq!(expertise_match(&partial, "light_bulb"), 0.0);
        // one of two tokens covered: 0.6 × 0.5 × 0.9
        assert!((expertise_match(&partial, "electric_motor") - 0.27).abs() < 1e-9);
    }

    #[test]
    fn test_strong_affinity_raises_score() {
        let query = QueryContext::new("lightbulb", "define");
        let mut edge = AffinityEdge::new("definer", "lightbulb");
        edge.weight = 0.9;
        edge.usage_count = 40;
        edge.success_count = 40;
        edge.success_rate = 1.0;

        let neutral = score(&definer(), &query, None);
        let learned = score(&definer(), &query, Some(&edge));

        assert!(learned.relevance_score > neutral.relevance_score);
        assert!(learned.confidence > neutral.confidence);
        assert!(learned.reasoning.iter().any(|r| r == "strong learned association"));
    }

    #[test]
    fn test_domain_overlap() {
        let profile = definer().with_domains(["physics", "electricity"]);
        let indicators: BTreeSet<String> = ["physics", "chemistry"].iter().map(|s| s.to_string()).collect();
        assert_eq!(domain_overlap(&profile, &indicators), 0.5);
    }
}
