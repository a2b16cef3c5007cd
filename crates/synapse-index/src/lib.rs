//! # Synapse Capability Index
//!
//! Finds the agents best suited to a (concept, intent) request.
//!
//! ## Discovery
//!
//! Four strategies propose candidates independently:
//!
//! - **Direct lookup**: agents already linked to the concept in the store
//! - **Domain keyword**: query keywords against expertise domains
//! - **Capability match**: intent-derived capabilities against advertised ones
//! - **Cluster membership**: clusters whose keywords overlap the query
//!
//! Merged candidates pass an intent gate, are scored on six weighted
//! components (see [`scorer`]), filtered by the relevance threshold, capped,
//! and cached for the cache TTL.
//!
//! ## Consistency
//!
//! Profiles and clusters live behind `parking_lot::RwLock`, the cache in a
//! `DashMap`. The directory is eventually consistent with the knowledge store,
//! bounded by the profile refresh interval.

pub mod cache;
pub mod cluster;
pub mod index;
pub mod profiles;
pub mod scorer;
pub mod strategy;

pub use cache::{CacheKey, CacheStats, DiscoveryCache, RedisDiscoveryCache};
pub use cluster::{AgentCluster, ClusterKind};
pub use index::{passes_intent_gate, CapabilityIndex};
pub use profiles::{profile_from_node, profile_to_node, ProfileDirectory, KNOWLEDGE_CAPABILITIES};
pub use strategy::DiscoveryStrategy;
