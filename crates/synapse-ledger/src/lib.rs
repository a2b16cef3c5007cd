//! # Synapse Affinity Ledger
//!
//! Hebbian-style association weights between agents and concepts.
//!
//! ```text
//! success:  w ← min(1, w + 0.05)
//! failure:  w ← max(0, w − 0.02)
//! decay:    w ← max(0, w × (1 − r))      every 15 min, r = 0.01
//! ```
//!
//! Weights feed the `hebbian_weight` component of relevance scoring. Edges are
//! created on first outcome at 0.5, or seeded at 0.8 when neurogenesis
//! provisions a new agent.

pub mod ledger;

pub use ledger::AffinityLedger;
