// src/lib.rs — Library root for redraft

pub mod api;
pub mod cli;
pub mod core;
pub mod evaluator;
pub mod generator;
pub mod infra;
pub mod memory;
pub mod provider;
pub mod util;
