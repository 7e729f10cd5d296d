//! # Collection pipeline
//!
//! The working cache, the per-player fetch-validate-merge task, and the
//! orchestrator that runs login, enumeration, bounded-concurrency
//! processing and finalizing in order.

pub mod cache;
pub mod entity_task;
pub mod orchestrator;

pub use cache::PlayerCache;
pub use entity_task::{EntityOutcome, EntityTask};
pub use orchestrator::{Orchestrator, PipelineError, PipelineState, RunOutcome};
