//! Capability synthesizer
//!
//! Expands the fleet when discovery comes back empty:
//!
//! ```text
//! CheckExistence ─handlers exist─▶ NoAgentAvailable
//!      │ none
//!      ▼
//! Research ─no responders─▶ Failed
//!      ▼
//! PersistConceptNode ─▶ DecideProvision ─no─▶ Done (research only)
//!                            │ yes
//!                            ▼
//!      CreateAgent ─▶ RegisterInGraph ─▶ SeedAffinity ─▶ Done (agent created)
//! ```
//!
//! Failures after research end in a partial outcome. Nothing is retried here;
//! the caller decides whether to ask again.

use std::sync::Arc;

use chrono::Utc;
use synapse_common::config::NeurogenesisSettings;
use synapse_common::types::agent::CollaborationRecord;
use synapse_common::types::affinity::NEUROGENESIS_SEED_WEIGHT;
use synapse_common::types::query::capabilities_for_intent;
use synapse_common::types::wire::{ProvisionRequest, ProvisionedAgent};
use synapse_common::{
    normalize_concept, AgentProfile, Concept, CreationMethod, GraphNode, KnowledgeStore, NodeLabel,
    NodeQuery, NodeRef, Relationship, RelationshipKind, Result, SynapseError,
};
use synapse_index::CapabilityIndex;
use synapse_ledger::AffinityLedger;
use tracing::{debug, info, instrument, warn};

use crate::provisioner::LifecycleProvisioner;
use crate::research::{research, CollaborationClient, ResearchFindings, ResearchSource};
use crate::state::{ExpansionOutcome, ExpansionTerminal, SynthesisState, Trace};

/// Name the synthesizer uses as collaboration partner
const SYNTHESIZER_NAME: &str = "synapse-neurogenesis";

/// Researches unknown concepts and provisions agents for them
pub struct CapabilitySynthesizer {
    store: Arc<dyn KnowledgeStore>,
    ledger: Arc<AffinityLedger>,
    index: Arc<CapabilityIndex>,
    collaboration: Arc<dyn CollaborationClient>,
    provisioner: Option<Arc<dyn LifecycleProvisioner>>,
    settings: NeurogenesisSettings,
    enable_dynamic_agents: bool,
}

impl CapabilitySynthesizer {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        ledger: Arc<AffinityLedger>,
        index: Arc<CapabilityIndex>,
        collaboration: Arc<dyn CollaborationClient>,
        settings: NeurogenesisSettings,
    ) -> Self {
        Self {
            store,
            ledger,
            index,
            collaboration,
            provisioner: None,
            settings,
            enable_dynamic_agents: true,
        }
    }

    /// Attach the lifecycle provisioner; without one every expansion is research-only
    pub fn with_provisioner(mut self, provisioner: Arc<dyn LifecycleProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    pub fn with_dynamic_agents(mut self, enabled: bool) -> Self {
        self.enable_dynamic_agents = enabled;
        self
    }

    pub fn can_provision(&self) -> bool {
        self.enable_dynamic_agents && self.provisioner.is_some()
    }

    /// Run one expansion attempt for (concept, intent)
    #[instrument(skip(self))]
    pub async fn expand(&self, concept: &str, intent: &str) -> ExpansionOutcome {
        let concept = normalize_concept(concept);
        let intent = normalize_concept(intent);
        let mut trace = Trace::start();

        trace.enter(SynthesisState::CheckExistence);
        match self.ledger.get_agents_for_concept(&concept).await {
            Ok(handlers) if !handlers.is_empty() => {
                info!(concept = %concept, intent = %intent, handlers = handlers.len(), "Concept known, no handler for intent");
                return trace.finish(
                    ExpansionTerminal::NoAgentAvailable,
                    serde_json::Value::Null,
                    None,
                    format!(
                        "{} agent(s) handle '{}' but none serve intent '{}'",
                        handlers.len(),
                        concept,
                        intent
                    ),
                );
            }
            Ok(_) => {}
            Err(e) => warn!(concept = %concept, error = %e, "Existence check failed, researching"),
        }

        trace.enter(SynthesisState::Research);
        let sources = self.research_sources();
        let (findings, outcomes) = research(
            self.collaboration.as_ref(),
            &sources,
            &concept,
            &intent,
            self.settings.research_timeout(),
        )
        .await;

        for outcome in &outcomes {
            self.index.record_collaboration(
                &outcome.source,
                CollaborationRecord {
                    partner: SYNTHESIZER_NAME.to_string(),
                    collaboration_type: "knowledge_request".to_string(),
                    concept: concept.clone(),
                    succeeded: outcome.responded,
                    at: Utc::now(),
                },
            );
        }

        if findings.responded() == 0 {
            warn!(concept = %concept, contacted = findings.contacted, "No research source responded");
            return trace.finish(
                ExpansionTerminal::Failed,
                findings.to_json(),
                None,
                format!(
                    "No research source responded for '{}' ({} contacted)",
                    concept, findings.contacted
                ),
            );
        }
        let research_data = findings.to_json();

        trace.enter(SynthesisState::PersistConceptNode);
        if let Err(e) = self.persist_concept(&findings).await {
            warn!(concept = %concept, error = %e, "Failed to persist concept");
            return trace.finish(
                ExpansionTerminal::Partial,
                research_data,
                None,
                format!("Researched '{}' but could not persist it: {}", concept, e),
            );
        }

        trace.enter(SynthesisState::DecideProvision);
        let provisioner = match self.provision_decision(&findings) {
            Ok(provisioner) => provisioner,
            Err(reason) => {
                info!(concept = %concept, confidence = findings.confidence, reason = %reason, "Research only");
                return trace.finish(
                    ExpansionTerminal::ResearchOnly,
                    research_data,
                    None,
                    format!("Learned '{}' without creating an agent: {}", concept, reason),
                );
            }
        };

        trace.enter(SynthesisState::CreateAgent);
        let request = ProvisionRequest {
            concept: concept.clone(),
            intent: intent.clone(),
            research_data: research_data.clone(),
            region: self.settings.region.clone(),
        };
        let agent = match tokio::time::timeout(self.settings.provision_timeout(), provisioner.create_agent(&request))
            .await
            .map_err(SynapseError::from)
            .and_then(|r| r)
        {
            Ok(agent) => agent,
            Err(e) => {
                warn!(concept = %concept, error = %e, "Agent creation failed");
                return trace.finish(
                    ExpansionTerminal::Partial,
                    research_data,
                    None,
                    format!("Researched '{}' but agent creation failed: {}", concept, e),
                );
            }
        };

        trace.enter(SynthesisState::RegisterInGraph);
        if let Err(e) = self.register_agent(&agent, &concept, &intent).await {
            warn!(agent = %agent.agent_name, error = %e, "Failed to register provisioned agent");
            return trace.finish(
                ExpansionTerminal::Partial,
                research_data,
                Some(agent),
                format!("Agent created for '{}' but graph registration failed: {}", concept, e),
            );
        }

        trace.enter(SynthesisState::SeedAffinity);
        if let Err(e) = self
            .ledger
            .seed(&agent.agent_name, &concept, NEUROGENESIS_SEED_WEIGHT, vec![intent.clone()])
            .await
        {
            warn!(agent = %agent.agent_name, error = %e, "Failed to seed affinity");
            return trace.finish(
                ExpansionTerminal::Partial,
                research_data,
                Some(agent),
                format!("Agent created for '{}' but affinity seeding failed: {}", concept, e),
            );
        }

        let dropped = self.index.invalidate_concept(&concept).await;
        debug!(concept = %concept, dropped, "Discovery cache invalidated");

        info!(concept = %concept, agent = %agent.agent_name, "Neurogenesis created agent");
        let message = format!("Created agent '{}' for '{}'", agent.agent_name, concept);
        trace.finish(ExpansionTerminal::AgentCreated, research_data, Some(agent), message)
    }

    /// Configured research agents, or every registered knowledge source
    fn research_sources(&self) -> Vec<ResearchSource> {
        if self.settings.research_agents.is_empty() {
            return self
                .index
                .knowledge_sources()
                .into_iter()
                .map(|p| ResearchSource {
                    name: p.name,
                    endpoint: p.endpoint,
                })
                .collect();
        }

        self.settings
            .research_agents
            .iter()
            .filter_map(|name| match self.index.profile(name) {
                Some(profile) => Some(ResearchSource {
                    name: profile.name,
                    endpoint: profile.endpoint,
                }),
                None => {
                    warn!(agent = %name, "Configured research agent is not registered");
                    None
                }
            })
            .collect()
    }

    async fn persist_concept(&self, findings: &ResearchFindings) -> Result<()> {
        let mut concept = Concept::new(&findings.concept, findings.definition.clone(), findings.confidence);
        concept.applications = findings.applications.clone();
        concept.related_concepts = findings
            .related_concepts
            .iter()
            .map(|c| normalize_concept(c))
            .filter(|c| !c.is_empty() && *c != concept.name)
            .collect();
        concept.sources = findings.sources.clone();

        let node = GraphNode::new(NodeLabel::Concept, concept.name.clone(), serde_json::to_value(&concept)?);
        self.store.create_node(node).await?;

        for related in &concept.related_concepts {
            let relationship = Relationship::new(
                NodeRef::concept(concept.name.clone()),
                NodeRef::concept(related.clone()),
                RelationshipKind::RelatedTo,
            );
            if let Err(e) = self.store.create_relationship(relationship).await {
                debug!(concept = %concept.name, related = %related, error = %e, "Related concept link skipped");
            }
        }
        Ok(())
    }

    fn provision_decision(&self, findings: &ResearchFindings) -> std::result::Result<Arc<dyn LifecycleProvisioner>, String> {
        if !self.enable_dynamic_agents {
            return Err("dynamic agents disabled".to_string());
        }
        if findings.responded() == 0 || findings.confidence <= self.settings.min_provision_confidence {
            return Err(format!(
                "confidence {:.2} does not exceed {:.2}",
                findings.confidence, self.settings.min_provision_confidence
            ));
        }
        self.provisioner
            .clone()
            .ok_or_else(|| "no provisioner configured".to_string())
    }

    async fn register_agent(&self, agent: &ProvisionedAgent, concept: &str, intent: &str) -> Result<()> {
        let mut profile = AgentProfile::new(agent.agent_name.clone(), agent.endpoint.clone())
            .with_capabilities(agent.capabilities.iter().cloned())
            .with_capabilities(capabilities_for_intent(intent))
            .with_domains([concept]);
        profile.creation_method = CreationMethod::Neurogenesis;

        self.index.publish_profile(profile).await?;

        let region = NodeRef::region(self.settings.region.clone());
        let existing = self
            .store
            .query_nodes(&NodeQuery::named(NodeLabel::Region, region.name.clone()))
            .await?;
        if existing.is_empty() {
            self.store
                .create_node(GraphNode::new(
                    NodeLabel::Region,
                    region.name.clone(),
                    serde_json::json!({ "name": region.name }),
                ))
                .await?;
        }

        self.store
            .create_relationship(Relationship::new(
                NodeRef::agent(agent.agent_name.clone()),
                region,
                RelationshipKind::BelongsTo,
            ))
            .await
    }
}
