//! # Collection Pipeline Orchestrator
//!
//! Drives one run through its phases:
//!
//! ```text
//! Idle → LoggingIn → Enumerating → Processing → Finalizing → Done
//!            └──────→ Aborted
//! ```
//!
//! Login failure is the only abort. Everything after it degrades instead of
//! failing: a broken list page truncates enumeration, a broken profile skips
//! one player, and persistence errors are logged.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::crawling::cache::PlayerCache;
use crate::crawling::entity_task::{EntityOutcome, EntityTask};
use crate::domain::{PlayerId, RunStats, Snapshot, Statistics};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::parsing::ProfileParser;
use crate::infrastructure::report::{ReportRenderer, ReportSummary};
use crate::infrastructure::session::{Credentials, Session, SessionError};
use crate::infrastructure::snapshot_store::SnapshotStore;

/// Failure kind recorded when a player task panics
pub const TASK_PANIC: &str = "task_panic";

/// Phase of a collection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    LoggingIn,
    Enumerating,
    Processing,
    Finalizing,
    Done,
    Aborted,
}

impl PipelineState {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::LoggingIn)
                | (Self::LoggingIn, Self::Enumerating | Self::Aborted)
                | (Self::Enumerating, Self::Processing)
                | (Self::Processing, Self::Finalizing)
                | (Self::Finalizing, Self::Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::LoggingIn => "logging in",
            Self::Enumerating => "enumerating",
            Self::Processing => "processing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Login failed: {0}")]
    FatalAuth(#[source] SessionError),

    #[error("Illegal pipeline transition: {from} -> {to}")]
    IllegalTransition { from: PipelineState, to: PipelineState },
}

/// Result of [`Orchestrator::run`]
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: PipelineState,
    pub players_scheduled: usize,
    /// `None` when the run aborted before finalizing
    pub report: Option<ReportSummary>,
    pub stats: RunStats,
    pub abort_reason: Option<PipelineError>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Done
    }
}

/// Per-run orchestration of login, enumeration, processing and finalizing
pub struct Orchestrator {
    session: Arc<Session>,
    stats: Arc<Statistics>,
    parser: Arc<ProfileParser>,
    store: SnapshotStore,
    renderer: ReportRenderer,
    report_file: PathBuf,
    credentials: Credentials,
    page_size: u32,
    max_offset: u32,
    max_concurrent: usize,
    state: PipelineState,
}

impl Orchestrator {
    pub fn new(config: &AppConfig, session: Arc<Session>, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            stats: Arc::clone(session.stats()),
            session,
            parser: Arc::new(ProfileParser::new()?),
            store: SnapshotStore::new(&config.storage.cache_file),
            renderer: ReportRenderer::from_config(&config.server),
            report_file: config.storage.report_file.clone(),
            credentials,
            page_size: config.crawling.page_size.max(1),
            max_offset: config.crawling.max_offset,
            max_concurrent: config.crawling.max_concurrent_requests.max(1),
            state: PipelineState::Idle,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        debug!("Pipeline state: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Execute one complete run. Never fails: the outcome records how far it got.
    pub async fn run(&mut self) -> RunOutcome {
        let mut outcome = RunOutcome {
            state: self.state,
            players_scheduled: 0,
            report: None,
            stats: RunStats::default(),
            abort_reason: None,
        };

        // An orchestrator drives a single run; a finished one is not restarted
        if self.state != PipelineState::Idle {
            warn!("Orchestrator already used (state: {}), refusing to run again", self.state);
            outcome.state = PipelineState::Aborted;
            outcome.abort_reason = Some(PipelineError::IllegalTransition {
                from: self.state,
                to: PipelineState::LoggingIn,
            });
            outcome.stats = self.stats.snapshot().await;
            return outcome;
        }

        if let Err(e) = self.run_phases(&mut outcome).await {
            error!("❌ Collection run aborted: {}", e);
            if self.state.can_transition_to(PipelineState::Aborted) {
                self.state = PipelineState::Aborted;
            }
            outcome.abort_reason = Some(e);
        }

        outcome.state = self.state;
        outcome.stats = self.stats.snapshot().await;
        info!("{}", outcome.stats);
        outcome
    }

    async fn run_phases(&mut self, outcome: &mut RunOutcome) -> Result<(), PipelineError> {
        let previous = self.store.load().await;

        self.transition(PipelineState::LoggingIn)?;
        info!("🔐 Logging in as {}", self.credentials.username);
        self.session
            .login(&self.credentials)
            .await
            .map_err(PipelineError::FatalAuth)?;
        info!("✅ Logged in");

        self.transition(PipelineState::Enumerating)?;
        let players = self.enumerate().await;
        outcome.players_scheduled = players.len();
        info!("Found players: {}", players.len());

        self.transition(PipelineState::Processing)?;
        let cache = Arc::new(PlayerCache::new(previous.clone()));
        self.process_all(players, &cache).await;

        self.transition(PipelineState::Finalizing)?;
        outcome.report = Some(self.finalize(&cache, &previous).await);

        self.transition(PipelineState::Done)?;
        Ok(())
    }

    /// Walk the search pages sequentially until an empty page or `max_offset`
    async fn enumerate(&self) -> Vec<PlayerId> {
        let mut players = Vec::new();
        let mut offset = 0_u32;

        while offset <= self.max_offset {
            let page = match self.session.list_page(offset).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        "⚠️  Enumeration truncated at offset {} with {} players gathered: {}",
                        offset,
                        players.len(),
                        e
                    );
                    break;
                }
            };
            if page.is_empty() {
                debug!("Empty player page at offset {}, enumeration complete", offset);
                break;
            }

            let before = players.len();
            players.extend(page.iter().filter_map(|p| p.nickname().map(str::to_string)));
            if players.len() - before < page.len() {
                debug!("Skipped {} entries without a nickname", page.len() - (players.len() - before));
            }

            match offset.checked_add(self.page_size) {
                Some(next) => offset = next,
                None => break,
            }
        }

        players
    }

    async fn process_all(&self, players: Vec<PlayerId>, cache: &Arc<PlayerCache>) {
        let total = players.len();
        if total == 0 {
            return;
        }

        let limiter = Arc::new(Semaphore::new(self.max_concurrent));
        let task = Arc::new(EntityTask::new(
            Arc::clone(&self.session),
            Arc::clone(cache),
            Arc::clone(&self.parser),
            Arc::clone(&self.stats),
        ));

        let mut running: FuturesUnordered<_> = players
            .into_iter()
            .map(|nickname| {
                let limiter = Arc::clone(&limiter);
                let task = Arc::clone(&task);
                tokio::spawn(async move {
                    let Ok(_permit) = limiter.acquire_owned().await else {
                        return EntityOutcome::Skipped;
                    };
                    task.process(&nickname).await
                })
            })
            .collect();

        let progress_step = (total / 10).max(1);
        let mut completed = 0;
        let mut outcomes: HashMap<EntityOutcome, usize> = HashMap::new();

        while let Some(joined) = running.next().await {
            completed += 1;
            match joined {
                Ok(outcome) => *outcomes.entry(outcome).or_insert(0) += 1,
                Err(e) => {
                    error!("❌ Player task failed: {}", e);
                    self.stats.record_failure(TASK_PANIC).await;
                }
            }
            if completed % progress_step == 0 || completed == total {
                info!("Collecting player data: {}/{} ({}%)", completed, total, completed * 100 / total);
            }
        }

        let count = |kind: EntityOutcome| outcomes.get(&kind).copied().unwrap_or(0);
        info!(
            "Processed {} players: {} cached, {} refreshed, {} skipped, {} invalid",
            total,
            count(EntityOutcome::CacheHit),
            count(EntityOutcome::Refreshed),
            count(EntityOutcome::Skipped),
            count(EntityOutcome::Invalid)
        );
    }

    async fn finalize(&self, cache: &PlayerCache, previous: &Snapshot) -> ReportSummary {
        let current = cache.snapshot().await;

        if let Err(e) = self.store.save(&current).await {
            error!("❌ Failed to save cache: {}", e);
        }

        let report = self.renderer.render(&current, previous);
        if let Err(e) = report.write_to(&self.report_file).await {
            error!("❌ Failed to write report: {:#}", e);
        }
        info!(
            "Report: {} players, {} new, {} changed",
            report.summary.total, report.summary.new, report.summary.changed
        );

        report.summary
    }
}
