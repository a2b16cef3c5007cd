//! # Synapse Neurogenesis
//!
//! Grows the fleet when no agent can handle a request. The synthesizer asks
//! knowledge-capable agents about the unknown concept, persists what it
//! learns, and when the research is confident enough asks the lifecycle
//! provisioner for a new agent, which is then wired into the graph with a
//! seeded affinity of 0.8 for the requested intent.

pub mod provisioner;
pub mod research;
pub mod state;
pub mod synthesizer;

pub use provisioner::{HttpProvisioner, LifecycleProvisioner};
pub use research::{CollaborationClient, HttpCollaborationClient, ResearchFindings, ResearchSource};
pub use state::{ExpansionOutcome, ExpansionTerminal, SynthesisState};
pub use synthesizer::CapabilitySynthesizer;
