//! Request router
//!
//! Per task: discover → dispatch to the top candidate → learn from the
//! response. When discovery finds nobody the synthesizer takes over and its
//! outcome is translated into a task status.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use synapse_common::types::wire::{AgentPayload, AgentTaskStatus, Task, TaskRequest, TaskResponse};
use synapse_common::{PerformanceUpdate, QueryContext, RelevanceScore};
use synapse_index::CapabilityIndex;
use synapse_ledger::AffinityLedger;
use synapse_neurogenesis::{CapabilitySynthesizer, ExpansionOutcome, ExpansionTerminal};
use tracing::{error, info, info_span, instrument, warn, Instrument};

use crate::dispatch::AgentDispatcher;
use crate::metrics::RouterMetrics;

/// Final status of a routed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Success,
    AgentError,
    NoExpertise,
    DispatchFailed,
    NoAgentAvailable,
    NeurogenesisWithAgentCreation,
    NeurogenesisSuccess,
    NeurogenesisPartial,
    NeurogenesisFailed,
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Success => "success",
            RouteStatus::AgentError => "agent_error",
            RouteStatus::NoExpertise => "no_expertise",
            RouteStatus::DispatchFailed => "dispatch_failed",
            RouteStatus::NoAgentAvailable => "no_agent_available",
            RouteStatus::NeurogenesisWithAgentCreation => "neurogenesis_with_agent_creation",
            RouteStatus::NeurogenesisSuccess => "neurogenesis_success",
            RouteStatus::NeurogenesisPartial => "neurogenesis_partial",
            RouteStatus::NeurogenesisFailed => "neurogenesis_failed",
        }
    }

    fn from_agent(status: AgentTaskStatus) -> Self {
        match status {
            AgentTaskStatus::Success => RouteStatus::Success,
            AgentTaskStatus::Error => RouteStatus::AgentError,
            AgentTaskStatus::NoExpertise => RouteStatus::NoExpertise,
        }
    }

    fn from_expansion(terminal: ExpansionTerminal) -> Self {
        match terminal {
            ExpansionTerminal::NoAgentAvailable => RouteStatus::NoAgentAvailable,
            ExpansionTerminal::AgentCreated => RouteStatus::NeurogenesisWithAgentCreation,
            ExpansionTerminal::ResearchOnly => RouteStatus::NeurogenesisSuccess,
            ExpansionTerminal::Partial => RouteStatus::NeurogenesisPartial,
            ExpansionTerminal::Failed => RouteStatus::NeurogenesisFailed,
        }
    }
}

/// Result reported for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: RouteStatus,
    /// Agent the task was dispatched to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AgentPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neurogenesis: Option<ExpansionOutcome>,
    pub message: String,
}

impl TaskResult {
    fn dispatched(task: &Task, candidate: &RelevanceScore, response: TaskResponse) -> Self {
        let status = RouteStatus::from_agent(response.status);
        Self {
            task_id: task.task_id.clone(),
            status,
            agent: Some(candidate.agent_id.clone()),
            relevance_score: Some(candidate.relevance_score),
            data: Some(response.data),
            neurogenesis: None,
            message: format!("{} answered with {}", response.agent_name, status.as_str()),
        }
    }

    fn dispatch_failed(task: &Task, candidate: &RelevanceScore, reason: String) -> Self {
        Self {
            task_id: task.task_id.clone(),
            status: RouteStatus::DispatchFailed,
            agent: Some(candidate.agent_id.clone()),
            relevance_score: Some(candidate.relevance_score),
            data: None,
            neurogenesis: None,
            message: reason,
        }
    }

    fn expanded(task: &Task, outcome: ExpansionOutcome) -> Self {
        Self {
            task_id: task.task_id.clone(),
            status: RouteStatus::from_expansion(outcome.terminal),
            agent: outcome.dynamic_agent.as_ref().map(|a| a.agent_name.clone()),
            relevance_score: None,
            data: None,
            message: outcome.message.clone(),
            neurogenesis: Some(outcome),
        }
    }
}

/// Routes tasks to agents and learns from the outcome
pub struct RequestRouter {
    index: Arc<CapabilityIndex>,
    ledger: Arc<AffinityLedger>,
    synthesizer: Arc<CapabilitySynthesizer>,
    dispatcher: Arc<dyn AgentDispatcher>,
    metrics: Option<Arc<RouterMetrics>>,
    dispatch_timeout: Duration,
}

impl RequestRouter {
    pub fn new(
        index: Arc<CapabilityIndex>,
        ledger: Arc<AffinityLedger>,
        synthesizer: Arc<CapabilitySynthesizer>,
        dispatcher: Arc<dyn AgentDispatcher>,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            index,
            ledger,
            synthesizer,
            dispatcher,
            metrics: None,
            dispatch_timeout,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RouterMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Route a batch; each task is handled on its own and always gets a result
    ///
    /// Results are keyed by task id. A repeated id is skipped with a warning and
    /// the first task's result is kept.
    pub async fn process(&self, tasks: Vec<Task>) -> HashMap<String, TaskResult> {
        let batch_id = uuid::Uuid::new_v4();
        let mut results = HashMap::with_capacity(tasks.len());

        for task in tasks {
            if results.contains_key(&task.task_id) {
                warn!(batch = %batch_id, task_id = %task.task_id, "Duplicate task id in batch, skipping");
                continue;
            }
            let span = info_span!("task", batch = %batch_id, task_id = %task.task_id);
            let result = self.process_task(&task).instrument(span).await;
            results.insert(task.task_id.clone(), result);
        }
        results
    }

    /// Route a single task
    pub async fn process_task(&self, task: &Task) -> TaskResult {
        if let Some(metrics) = &self.metrics {
            metrics.tasks_total.inc();
        }

        let context = if task.domain_indicators.is_empty() {
            None
        } else {
            Some(QueryContext::new(&task.concept, &task.intent).with_domains(task.domain_indicators.iter().cloned()))
        };
        let candidates = self
            .index
            .discover(&task.concept, &task.intent, context.as_ref())
            .await;

        let result = match candidates.into_iter().next() {
            Some(top) => self.dispatch_to(task, &top).await,
            None => {
                info!(concept = %task.concept, intent = %task.intent, "No candidates, starting neurogenesis");
                if let Some(metrics) = &self.metrics {
                    metrics.neurogenesis_attempts.inc();
                }
                let outcome = self.synthesizer.expand(&task.concept, &task.intent).await;
                TaskResult::expanded(task, outcome)
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_outcome(result.status);
        }
        result
    }

    #[instrument(skip(self, task, candidate), fields(agent = %candidate.agent_id))]
    async fn dispatch_to(&self, task: &Task, candidate: &RelevanceScore) -> TaskResult {
        let request = TaskRequest {
            task_id: task.task_id.clone(),
            intent: task.intent.clone(),
            concept: task.concept.clone(),
            args: task.args.clone(),
        };

        let started = Instant::now();
        let reply = tokio::time::timeout(
            self.dispatch_timeout,
            self.dispatcher.dispatch(&candidate.endpoint, &request),
        )
        .await;
        if let Some(metrics) = &self.metrics {
            metrics.dispatch_duration_seconds.observe(started.elapsed().as_secs_f64());
        }

        let response = match reply {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(error = %e, "Dispatch failed");
                self.index.mark_unavailable(&candidate.agent_id);
                return TaskResult::dispatch_failed(task, candidate, format!("Dispatch failed: {}", e));
            }
            Err(_) => {
                warn!(timeout_ms = self.dispatch_timeout.as_millis() as u64, "Dispatch timed out");
                self.index.mark_unavailable(&candidate.agent_id);
                return TaskResult::dispatch_failed(task, candidate, "Dispatch timed out".to_string());
            }
        };

        let success = response.status == AgentTaskStatus::Success;
        if let Err(e) = self
            .ledger
            .strengthen(&candidate.agent_id, &task.concept, success)
            .await
        {
            error!(error = %e, "Failed to record affinity");
        }
        let update = PerformanceUpdate::from_outcome(success, response.data.confidence());
        if let Err(e) = self.index.update_performance(&candidate.agent_id, update) {
            warn!(error = %e, "Failed to record performance");
        }
        self.index.mark_available(&candidate.agent_id);

        info!(status = ?response.status, "Task dispatched");
        TaskResult::dispatched(task, candidate, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses_serialize_snake_case() {
        let json = serde_json::to_value(RouteStatus::NeurogenesisWithAgentCreation).unwrap();
        assert_eq!(json, "neurogenesis_with_agent_creation");
        for status in [
            RouteStatus::Success,
            RouteStatus::AgentError,
            RouteStatus::NoExpertise,
            RouteStatus::DispatchFailed,
            RouteStatus::NoAgentAvailable,
            RouteStatus::NeurogenesisSuccess,
            RouteStatus::NeurogenesisPartial,
            RouteStatus::NeurogenesisFailed,
        ] {
            assert_eq!(serde_json::to_value(status).unwrap(), status.as_str());
        }
    }

    #[test]
    fn test_expansion_translation() {
        assert_eq!(
            RouteStatus::from_expansion(ExpansionTerminal::NoAgentAvailable),
            RouteStatus::NoAgentAvailable
        );
        assert_eq!(
            RouteStatus::from_expansion(ExpansionTerminal::ResearchOnly),
            RouteStatus::NeurogenesisSuccess
        );
        assert_eq!(
            RouteStatus::from_expansion(ExpansionTerminal::Partial),
            RouteStatus::NeurogenesisPartial
        );
    }

    #[test]
    fn test_agent_status_translation() {
        assert_eq!(RouteStatus::from_agent(AgentTaskStatus::Error), RouteStatus::AgentError);
        assert_eq!(RouteStatus::from_agent(AgentTaskStatus::NoExpertise), RouteStatus::NoExpertise);
    }
}
