//! # Run Statistics
//!
//! Counters shared by every component of a collection run. One `Statistics`
//! value is created per run and passed (behind `Arc`) to the session, the
//! orchestrator and every entity task; it is read once when the run ends.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Physical network attempts
    pub requests_made: u64,

    /// Successful logical calls
    pub successes: u64,

    /// Retry decisions taken
    pub retries: u64,

    /// Failed logical calls and rejected records, by kind
    pub failures: BTreeMap<String, u64>,

    /// Players taken through the fetch-validate-merge task
    pub players_processed: u64,

    /// Wall-clock time elapsed since the run started
    pub elapsed: Duration,

    pub started_at: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn total_failures(&self) -> u64 {
        self.failures.values().sum()
    }

    pub fn failures_of(&self, kind: &str) -> u64 {
        self.failures.get(kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run statistics:")?;
        writeln!(f, "- Duration: {:.1?}", self.elapsed)?;
        writeln!(f, "- Players processed: {}", self.players_processed)?;
        writeln!(f, "- Successful requests: {}", self.successes)?;
        writeln!(f, "- Total requests: {}", self.requests_made)?;
        writeln!(f, "- Retries: {}", self.retries)?;
        write!(f, "- Failures: {}", self.total_failures())?;
        if !self.failures.is_empty() {
            let by_kind: Vec<String> = self
                .failures
                .iter()
                .map(|(kind, count)| format!("{kind}: {count}"))
                .collect();
            write!(f, "\n  - {}", by_kind.join(", "))?;
        }
        Ok(())
    }
}

/// Thread-safe run counters
#[derive(Debug)]
pub struct Statistics {
    counters: RwLock<RunStats>,
    started: Instant,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(RunStats {
                started_at: Some(Utc::now()),
                ..RunStats::default()
            }),
            started: Instant::now(),
        }
    }

    pub async fn record_request(&self) {
        self.counters.write().await.requests_made += 1;
    }

    pub async fn record_success(&self) {
        self.counters.write().await.successes += 1;
    }

    pub async fn record_retry(&self) {
        self.counters.write().await.retries += 1;
    }

    pub async fn record_failure(&self, kind: &str) {
        let mut stats = self.counters.write().await;
        *stats.failures.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub async fn record_player_processed(&self) {
        self.counters.write().await.players_processed += 1;
    }

    /// Copy of the counters with the elapsed time filled in
    pub async fn snapshot(&self) -> RunStats {
        let mut stats = self.counters.read().await.clone();
        stats.elapsed = self.started.elapsed();
        stats
    }
}
