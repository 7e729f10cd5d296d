//! player-census - game server player profile collector
//!
//! Logs in to the server, enumerates the player list, refreshes every
//! profile under a concurrency cap with retry and backoff, reconciles the
//! result against the previous JSON snapshot and renders an HTML report of
//! new and changed players.

// Module declarations
pub mod cli;
pub mod crawling;
pub mod domain;
pub mod infrastructure;

pub use crawling::{Orchestrator, PipelineState, RunOutcome};
pub use domain::{PlayerRecord, RunStats, Snapshot, Statistics};
