//! # Synapse Common
//!
//! Shared kernel for the Synapse capability router: the error taxonomy, the
//! data model, wire types exchanged with agents and the provisioner,
//! configuration, and access to the knowledge store.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      RequestRouter                        │
//! │        discover → dispatch → strengthen / update          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐   │
//! │  │ Capability   │  │  Affinity    │  │  Capability    │   │
//! │  │ Index        │──│  Ledger      │──│  Synthesizer   │   │
//! │  └──────┬───────┘  └──────┬───────┘  └───────┬────────┘   │
//! │         │                 │                  │            │
//! │  ┌──────┴─────────────────┴──────────────────┴────────┐   │
//! │  │                  KnowledgeStore                     │   │
//! │  │        (in-memory DashMap or remote HTTP)           │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::SynapseConfig;
pub use error::{ConsistencyError, ProvisioningError, Result, SynapseError};
pub use store::{
    GraphNode, HttpKnowledgeStore, InMemoryKnowledgeStore, KnowledgeStore, NodeLabel, NodeQuery,
    NodeRef, Relationship, RelationshipKind,
};
#[cfg(any(test, feature = "mock"))]
pub use store::MockKnowledgeStore;
pub use types::affinity::{AffinityEdge, DecayScope, HebbianDeltas};
pub use types::agent::{AgentProfile, CreationMethod, PerformanceMetrics, PerformanceUpdate};
pub use types::concept::{normalize_concept, Concept};
pub use types::query::{QueryContext, RelevanceScore, Urgency};

/// Synapse version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default service port
pub const DEFAULT_PORT: u16 = 8090;

/// Default seconds between scheduled decay passes
pub const DEFAULT_DECAY_INTERVAL_SECS: u64 = 900;

/// Default discovery cache lifetime
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default minimum relevance for a discovery result
pub const DEFAULT_MIN_RELEVANCE: f64 = 0.3;

/// Default discovery result cap
pub const DEFAULT_MAX_AGENTS_PER_QUERY: usize = 5;

/// Store lookup timeout tier
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Research call timeout tier
pub const DEFAULT_RESEARCH_TIMEOUT_MS: u64 = 10_000;

/// Dispatch timeout tier
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 15_000;

/// Provisioning timeout tier
pub const DEFAULT_PROVISION_TIMEOUT_MS: u64 = 30_000;
