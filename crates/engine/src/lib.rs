//! Synthpop job orchestration engine.
//!
//! [`Orchestrator`] is the write path of the system: it deduplicates
//! submissions by fingerprint, reserves job records atomically in the
//! store, and drives background fulfillment tasks through to a terminal
//! state, publishing a lifecycle event for each one.

pub mod config;
pub mod orchestrator;

pub use config::EngineConfig;
pub use orchestrator::Orchestrator;
