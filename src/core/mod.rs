// src/core/mod.rs — Workflow core: state, policy, prioritization, engine

pub mod orchestrator;
pub mod policy;
pub mod priority;
pub mod revision;
pub mod state;
pub mod types;
