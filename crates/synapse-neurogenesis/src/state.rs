//! Expansion state machine types

use serde::{Deserialize, Serialize};
use synapse_common::types::wire::ProvisionedAgent;

/// States visited while expanding a concept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisState {
    RequestReceived,
    CheckExistence,
    NoAgentAvailable,
    Research,
    PersistConceptNode,
    DecideProvision,
    CreateAgent,
    RegisterInGraph,
    SeedAffinity,
    Done,
    Failed,
}

/// How an expansion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionTerminal {
    /// The concept has handlers, just none for this intent
    NoAgentAvailable,
    /// Researched, provisioned and wired into the graph
    AgentCreated,
    /// Researched and persisted; no agent was provisioned
    ResearchOnly,
    /// Researched, but a later step failed
    Partial,
    /// Nobody could tell us anything
    Failed,
}

/// Result of one expansion attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionOutcome {
    pub terminal: ExpansionTerminal,
    pub expansion_successful: bool,
    pub research_data: serde_json::Value,
    pub dynamic_agent: Option<ProvisionedAgent>,
    pub can_retry: bool,
    pub message: String,
    pub trace: Vec<SynthesisState>,
}

impl ExpansionOutcome {
    /// Whether a new agent came out of this attempt
    pub fn created_agent(&self) -> bool {
        self.dynamic_agent.is_some()
    }
}

/// Records states as the expansion walks through them
#[derive(Debug, Clone)]
pub(crate) struct Trace {
    states: Vec<SynthesisState>,
}

impl Trace {
    pub(crate) fn start() -> Self {
        Self {
            states: vec![SynthesisState::RequestReceived],
        }
    }

    pub(crate) fn enter(&mut self, state: SynthesisState) {
        self.states.push(state);
    }

    pub(crate) fn finish(
        mut self,
        terminal: ExpansionTerminal,
        research_data: serde_json::Value,
        dynamic_agent: Option<ProvisionedAgent>,
        message: impl Into<String>,
    ) -> ExpansionOutcome {
        let last = match terminal {
            ExpansionTerminal::NoAgentAvailable => SynthesisState::NoAgentAvailable,
            ExpansionTerminal::Failed => SynthesisState::Failed,
            _ => SynthesisState::Done,
        };
        self.states.push(last);

        ExpansionOutcome {
            terminal,
            expansion_successful: matches!(
                terminal,
                ExpansionTerminal::AgentCreated | ExpansionTerminal::ResearchOnly
            ),
            research_data,
            dynamic_agent,
            can_retry: true,
            message: message.into(),
            trace: self.states,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_ends_in_terminal_state() {
        let mut trace = Trace::start();
        trace.enter(SynthesisState::CheckExistence);
        let outcome = trace.finish(
            ExpansionTerminal::NoAgentAvailable,
            serde_json::Value::Null,
            None,
            "no handler",
        );

        assert_eq!(
            outcome.trace,
            vec![
                SynthesisState::RequestReceived,
                SynthesisState::CheckExistence,
                SynthesisState::NoAgentAvailable,
            ]
        );
        assert!(!outcome.expansion_successful);
        assert!(outcome.can_retry);
    }

    #[test]
    fn test_partial_is_not_successful() {
        let outcome = Trace::start().finish(ExpansionTerminal::Partial, serde_json::Value::Null, None, "x");
        assert!(!outcome.expansion_successful);
        assert_eq!(outcome.trace.last(), Some(&SynthesisState::Done));
    }
}
