//! End-to-end routing over the in-memory store with fake agents

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use synapse_common::types::wire::{
    AgentPayload, AgentTaskStatus, CollaborationRequest, CollaborationResponse, KnowledgeData,
    ProvisionRequest, ProvisionedAgent, Task, TaskRequest, TaskResponse,
};
use synapse_common::{
    AffinityEdge, AgentProfile, CreationMethod, DecayScope, InMemoryKnowledgeStore, KnowledgeStore,
    NodeLabel, NodeQuery, Result, SynapseConfig, SynapseError,
};
use synapse_neurogenesis::{CollaborationClient, LifecycleProvisioner};
use synapse_router::{AgentDispatcher, RouteStatus, RuntimeParts, SynapseRuntime};

#[derive(Clone, Copy)]
enum Reply {
    Answer(AgentTaskStatus, Option<f64>),
    Down,
}

/// Agents keyed by endpoint
#[derive(Default)]
struct FakeFleet {
    replies: Mutex<HashMap<String, Reply>>,
    calls: AtomicUsize,
}

impl FakeFleet {
    fn agent(&self, endpoint: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(endpoint.to_string(), reply);
    }
}

#[async_trait]
impl AgentDispatcher for FakeFleet {
    async fn dispatch(&self, endpoint: &str, request: &TaskRequest) -> Result<TaskResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().get(endpoint).copied();
        match reply {
            Some(Reply::Answer(status, confidence)) => Ok(TaskResponse {
                agent_name: endpoint.to_string(),
                status,
                data: match confidence {
                    Some(confidence) => AgentPayload::Enhanced {
                        response: serde_json::json!(format!("about {}", request.concept)),
                        confidence,
                        sources: vec![],
                        related_concepts: vec![],
                    },
                    None => AgentPayload::Basic {
                        response: serde_json::json!(format!("about {}", request.concept)),
                    },
                },
            }),
            Some(Reply::Down) | None => Err(SynapseError::Network(format!("{} refused connection", endpoint))),
        }
    }
}

/// Research sources keyed by endpoint
#[derive(Default)]
struct FakeResearch {
    confidences: HashMap<String, f64>,
    calls: AtomicUsize,
}

#[async_trait]
impl CollaborationClient for FakeResearch {
    async fn collaborate(&self, endpoint: &str, request: &CollaborationRequest) -> Result<CollaborationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let confidence = self
            .confidences
            .get(endpoint)
            .copied()
            .ok_or_else(|| SynapseError::Network("no such source".into()))?;
        Ok(CollaborationResponse {
            agent_name: endpoint.to_string(),
            status: AgentTaskStatus::Success,
            data: KnowledgeData {
                definition: format!("{} is a material", request.target_concept),
                applications: vec!["electronics".to_string()],
                related_concepts: vec!["graphite".to_string()],
                confidence,
            },
            collaboration_metadata: serde_json::Value::Null,
        })
    }
}

struct FakeProvisioner {
    endpoint: String,
    requests: Mutex<Vec<ProvisionRequest>>,
}

#[async_trait]
impl LifecycleProvisioner for FakeProvisioner {
    async fn create_agent(&self, request: &ProvisionRequest) -> Result<ProvisionedAgent> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(ProvisionedAgent {
            agent_id: "agt-1".to_string(),
            agent_name: format!("{}-specialist", request.concept),
            endpoint: self.endpoint.clone(),
            port: Some(9100),
            capabilities: vec![],
            status: "running".to_string(),
        })
    }
}

struct Harness {
    runtime: SynapseRuntime,
    store: Arc<InMemoryKnowledgeStore>,
    fleet: Arc<FakeFleet>,
    research: Arc<FakeResearch>,
    provisioner: Arc<FakeProvisioner>,
}

fn harness(research: FakeResearch) -> Harness {
    let store = Arc::new(InMemoryKnowledgeStore::new());
    let fleet = Arc::new(FakeFleet::default());
    let research = Arc::new(research);
    let provisioner = Arc::new(FakeProvisioner {
        endpoint: "http://specialist:9100".to_string(),
        requests: Mutex::new(Vec::new()),
    });

    let runtime = SynapseRuntime::assemble(
        SynapseConfig::default(),
        RuntimeParts {
            store: store.clone(),
            dispatcher: fleet.clone(),
            collaboration: research.clone(),
            provisioner: Some(provisioner.clone() as Arc<dyn LifecycleProvisioner>),
            shared_cache: None,
        },
    )
    .unwrap();

    Harness {
        runtime,
        store,
        fleet,
        research,
        provisioner,
    }
}

fn task(id: &str, concept: &str, intent: &str) -> Task {
    Task::new(id, concept, intent)
}

async fn weight(h: &Harness, agent: &str, concept: &str) -> Option<f64> {
    h.runtime
        .ledger
        .lookup_edge(agent, concept)
        .await
        .unwrap()
        .map(|e| e.weight)
}

#[tokio::test]
async fn test_known_concept_is_dispatched_and_learned() {
    let h = harness(FakeResearch::default());
    h.runtime
        .index
        .register_profile(AgentProfile::new("definer", "http://definer:1").with_capabilities(["concept_definition"]));
    h.store
        .seed_edge(AffinityEdge::new("definer", "lightbulb"))
        .await
        .unwrap();
    h.fleet.agent("http://definer:1", Reply::Answer(AgentTaskStatus::Success, Some(0.9)));

    let discovered = h.runtime.index.discover("lightbulb", "define", None).await;
    assert_eq!(discovered[0].agent_id, "definer");
    assert_eq!(discovered[0].hebbian_weight, 0.5);

    let results = h.runtime.router.process(vec![task("t-1", "lightbulb", "define")]).await;
    let result = &results["t-1"];
    assert_eq!(result.status, RouteStatus::Success);
    assert_eq!(result.agent.as_deref(), Some("definer"));

    let w = weight(&h, "definer", "lightbulb").await.unwrap();
    assert!((w - 0.55).abs() < 1e-9);

    let profile = h.runtime.index.profile("definer").unwrap();
    assert!((profile.performance.response_quality - 0.9).abs() < 1e-9);
    assert_eq!(profile.performance.accuracy, 1.0);
}

#[tokio::test]
async fn test_repeated_success_then_decay() {
    let h = harness(FakeResearch::default());
    h.runtime
        .index
        .register_profile(AgentProfile::new("definer", "http://definer:1").with_capabilities(["concept_definition"]));
    h.fleet.agent("http://definer:1", Reply::Answer(AgentTaskStatus::Success, None));

    let tasks = (0..5).map(|i| task(&format!("t-{}", i), "lightbulb", "define")).collect();
    let results = h.runtime.router.process(tasks).await;
    assert_eq!(results.len(), 5);
    assert!(results.values().all(|r| r.status == RouteStatus::Success));

    // First outcome creates the edge at 0.5, so five successes land on 0.75
    let w = weight(&h, "definer", "lightbulb").await.unwrap();
    assert!((w - 0.75).abs() < 1e-9);

    let edge = h.runtime.ledger.lookup_edge("definer", "lightbulb").await.unwrap().unwrap();
    assert_eq!(edge.usage_count, 5);
    assert_eq!(edge.success_count, 5);

    h.runtime.ledger.decay(DecayScope::All, 0.01).await.unwrap();
    let w = weight(&h, "definer", "lightbulb").await.unwrap();
    assert!((w - 0.7425).abs() < 1e-9);
}

#[tokio::test]
async fn test_agent_error_weakens_affinity() {
    let h = harness(FakeResearch::default());
    h.runtime
        .index
        .register_profile(AgentProfile::new("definer", "http://definer:1").with_capabilities(["concept_definition"]));
    h.fleet.agent("http://definer:1", Reply::Answer(AgentTaskStatus::Error, None));

    let results = h.runtime.router.process(vec![task("t-1", "lightbulb", "define")]).await;
    assert_eq!(results["t-1"].status, RouteStatus::AgentError);

    let w = weight(&h, "definer", "lightbulb").await.unwrap();
    assert!((w - 0.48).abs() < 1e-9);
}

#[tokio::test]
async fn test_dispatch_failure_leaves_affinity_untouched() {
    let h = harness(FakeResearch::default());
    h.runtime
        .index
        .register_profile(AgentProfile::new("definer", "http://definer:1").with_capabilities(["concept_definition"]));
    h.fleet.agent("http://definer:1", Reply::Down);

    let results = h.runtime.router.process(vec![task("t-1", "lightbulb", "define")]).await;
    assert_eq!(results["t-1"].status, RouteStatus::DispatchFailed);

    assert_eq!(weight(&h, "definer", "lightbulb").await, None);
    assert!(h.runtime.index.profile("definer").unwrap().availability_score < 1.0);
}

#[tokio::test]
async fn test_unknown_concept_grows_an_agent() {
    let research = FakeResearch {
        confidences: HashMap::from([
            ("http://alpha:1".to_string(), 0.4),
            ("http://beta:1".to_string(), 0.6),
        ]),
        ..FakeResearch::default()
    };
    let h = harness(research);
    h.runtime
        .index
        .register_profile(AgentProfile::new("alpha", "http://alpha:1").with_capabilities(["research"]));
    h.runtime
        .index
        .register_profile(AgentProfile::new("beta", "http://beta:1").with_capabilities(["knowledge_sharing"]));
    h.fleet.agent("http://specialist:9100", Reply::Answer(AgentTaskStatus::Success, None));

    let results = h.runtime.router.process(vec![task("t-1", "graphene", "define")]).await;
    let result = &results["t-1"];
    assert_eq!(result.status, RouteStatus::NeurogenesisWithAgentCreation);
    assert_eq!(result.agent.as_deref(), Some("graphene-specialist"));
    assert_eq!(h.research.calls.load(Ordering::SeqCst), 2);

    let requests = h.provisioner.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].region, "global");

    let concept = h
        .store
        .query_nodes(&NodeQuery::named(NodeLabel::Concept, "graphene"))
        .await
        .unwrap();
    assert!((concept[0].properties["confidence"].as_f64().unwrap() - 0.5).abs() < 1e-9);

    let profile = h.runtime.index.profile("graphene-specialist").unwrap();
    assert_eq!(profile.creation_method, CreationMethod::Neurogenesis);

    // The next request goes straight to the new agent
    let results = h.runtime.router.process(vec![task("t-2", "graphene", "define")]).await;
    assert_eq!(results["t-2"].status, RouteStatus::Success);
    assert_eq!(results["t-2"].agent.as_deref(), Some("graphene-specialist"));
    let w = weight(&h, "graphene-specialist", "graphene").await.unwrap();
    assert!((w - 0.85).abs() < 1e-9);
}

#[tokio::test]
async fn test_known_concept_other_intent_has_no_agent() {
    let h = harness(FakeResearch::default());
    h.runtime.index.register_profile(
        AgentProfile::new("factory-definer", "http://factory:1")
            .with_capabilities(["concept_definition"])
            .with_domains(["factories"]),
    );
    h.runtime
        .ledger
        .seed("factory-definer", "factories", 0.8, vec!["define".to_string()])
        .await
        .unwrap();

    assert!(h
        .runtime
        .index
        .discover("factories", "schedule_shift", None)
        .await
        .is_empty());

    let results = h
        .runtime
        .router
        .process(vec![task("t-1", "factories", "schedule_shift")])
        .await;
    assert_eq!(results["t-1"].status, RouteStatus::NoAgentAvailable);
    assert_eq!(h.research.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.fleet.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_batch_tasks_are_isolated() {
    let h = harness(FakeResearch::default());
    h.runtime.index.register_profile(
        AgentProfile::new("definer", "http://definer:1")
            .with_capabilities(["concept_definition"])
            .with_domains(["lighting"]),
    );
    h.runtime.index.register_profile(
        AgentProfile::new("scheduler", "http://scheduler:1")
            .with_capabilities(["scheduling"])
            .with_domains(["factories"]),
    );
    h.fleet.agent("http://definer:1", Reply::Answer(AgentTaskStatus::Success, None));
    h.fleet.agent("http://scheduler:1", Reply::Down);

    let results = h
        .runtime
        .router
        .process(vec![
            task("down", "factories", "schedule_shift"),
            task("ok", "lightbulb", "define"),
            task("unknown", "quasicrystal", "summarize"),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results["down"].status, RouteStatus::DispatchFailed);
    assert_eq!(results["ok"].status, RouteStatus::Success);
    // Nobody to research with
    assert_eq!(results["unknown"].status, RouteStatus::NeurogenesisFailed);
    assert!(results["unknown"].neurogenesis.as_ref().unwrap().can_retry);

    let outcomes = h
        .runtime
        .metrics
        .task_outcomes
        .with_label_values(&["dispatch_failed"])
        .get();
    assert_eq!(outcomes, 1);
    assert_eq!(h.runtime.metrics.tasks_total.get(), 3);
}

#[tokio::test]
async fn test_duplicate_task_id_keeps_first_result() {
    let h = harness(FakeResearch::default());
    h.runtime
        .index
        .register_profile(AgentProfile::new("definer", "http://definer:1").with_capabilities(["concept_definition"]));
    h.fleet.agent("http://definer:1", Reply::Answer(AgentTaskStatus::Success, None));

    let results = h
        .runtime
        .router
        .process(vec![
            task("t-1", "lightbulb", "define"),
            task("t-1", "quasicrystal", "summarize"),
        ])
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results["t-1"].status, RouteStatus::Success);
    assert_eq!(results["t-1"].agent.as_deref(), Some("definer"));
    assert_eq!(h.fleet.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.research.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.runtime.metrics.tasks_total.get(), 1);
}
