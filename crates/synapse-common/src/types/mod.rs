//! Core data types for Synapse

pub mod affinity;
pub mod agent;
pub mod concept;
pub mod query;
pub mod wire;
