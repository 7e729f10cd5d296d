//! Per-player fetch, validate and merge step

use std::sync::Arc;

use tracing::{debug, warn};

use crate::crawling::cache::PlayerCache;
use crate::domain::Statistics;
use crate::infrastructure::parsing::ProfileParser;
use crate::infrastructure::session::Session;

/// Failure kind recorded for fetched pages without any required field
pub const INVALID_RECORD: &str = "invalid_record";

/// What happened to one player during processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityOutcome {
    /// Valid cached record reused, no request made
    CacheHit,
    /// Fresh record fetched and stored
    Refreshed,
    /// Profile fetch failed after retries; cache untouched
    Skipped,
    /// Fetched page had none of the required fields; cache untouched
    Invalid,
}

/// Shared context of the per-player task
pub struct EntityTask {
    session: Arc<Session>,
    cache: Arc<PlayerCache>,
    parser: Arc<ProfileParser>,
    stats: Arc<Statistics>,
}

impl EntityTask {
    pub fn new(
        session: Arc<Session>,
        cache: Arc<PlayerCache>,
        parser: Arc<ProfileParser>,
        stats: Arc<Statistics>,
    ) -> Self {
        Self {
            session,
            cache,
            parser,
            stats,
        }
    }

    /// Process one player. Must be called while holding a limiter permit.
    pub async fn process(&self, nickname: &str) -> EntityOutcome {
        self.stats.record_player_processed().await;
        debug!("Processing player: {}", nickname);

        if let Some(cached) = self.cache.get(nickname).await {
            if cached.is_valid() {
                debug!("Using cached record for {}", nickname);
                return EntityOutcome::CacheHit;
            }
            warn!("Cached record for {} is invalid, refetching", nickname);
        }

        let html = match self.session.fetch_profile(nickname).await {
            Ok(html) => html,
            Err(e) => {
                warn!("❌ Failed to fetch profile {}: {}", nickname, e);
                return EntityOutcome::Skipped;
            }
        };

        let mut record = self.parser.parse(&html);
        record.telegram = self.parser.extract_contact_link(&html);

        if !record.is_valid() {
            warn!(
                "Invalid profile data for {}: none of {:?} present",
                nickname,
                crate::domain::PlayerRecord::REQUIRED_FIELDS
            );
            self.stats.record_failure(INVALID_RECORD).await;
            return EntityOutcome::Invalid;
        }

        self.cache.upsert(nickname, record).await;
        EntityOutcome::Refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PlayerRecord, PlayerSummary, Snapshot};
    use crate::infrastructure::config::AppConfig;
    use crate::infrastructure::http_client::PlayerTransport;
    use crate::infrastructure::session::{Credentials, SessionError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    const VALID_PAGE: &str = r#"<p class="status-main">Mayor</p>
        <a class="social telegram" href="https://t.me/steve">tg</a>"#;

    #[derive(Default)]
    struct ProfileTransport {
        pages: HashMap<String, Result<String, SessionError>>,
        fetches: AtomicU32,
    }

    #[async_trait]
    impl PlayerTransport for ProfileTransport {
        async fn login(&self, _credentials: &Credentials) -> Result<(), SessionError> {
            Ok(())
        }

        async fn list_page(&self, _offset: u32) -> Result<Vec<PlayerSummary>, SessionError> {
            Ok(Vec::new())
        }

        async fn fetch_profile(&self, nickname: &str) -> Result<String, SessionError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(nickname)
                .cloned()
                .unwrap_or_else(|| Err(SessionError::Status { status: 404, url: nickname.into() }))
        }
    }

    fn task(transport: Arc<ProfileTransport>, seed: Snapshot) -> (EntityTask, Arc<PlayerCache>, Arc<Statistics>) {
        let stats = Arc::new(Statistics::new());
        let session = Arc::new(Session::new(transport, Arc::clone(&stats), &AppConfig::default()));
        let cache = Arc::new(PlayerCache::new(seed));
        let parser = Arc::new(ProfileParser::new().unwrap());
        let task = EntityTask::new(session, Arc::clone(&cache), parser, Arc::clone(&stats));
        (task, cache, stats)
    }

    fn cached(status_main: Option<&str>) -> Snapshot {
        let mut seed = Snapshot::new();
        seed.insert(
            "Steve".into(),
            PlayerRecord {
                status_main: status_main.map(str::to_string),
                ..PlayerRecord::default()
            },
        );
        seed
    }

    #[tokio::test]
    async fn valid_cache_entry_skips_the_network() {
        let transport = Arc::new(ProfileTransport::default());
        let (task, _, stats) = task(Arc::clone(&transport), cached(Some("Farmer")));

        assert_eq!(task.process("Steve").await, EntityOutcome::CacheHit);
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(stats.snapshot().await.players_processed, 1);
    }

    #[tokio::test]
    async fn invalid_cache_entry_is_refetched_with_contact_link() {
        let mut transport = ProfileTransport::default();
        transport.pages.insert("Steve".into(), Ok(VALID_PAGE.into()));
        let transport = Arc::new(transport);
        let (task, cache, _) = task(Arc::clone(&transport), cached(None));

        assert_eq!(task.process("Steve").await, EntityOutcome::Refreshed);

        let record = cache.get("Steve").await.unwrap();
        assert_eq!(record.status_main.as_deref(), Some("Mayor"));
        assert_eq!(record.telegram.as_deref(), Some("https://t.me/steve"));
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_page_is_never_cached() {
        let mut transport = ProfileTransport::default();
        transport.pages.insert("Alex".into(), Ok("<html><body>maintenance</body></html>".into()));
        let (task, cache, stats) = task(Arc::new(transport), Snapshot::new());

        assert_eq!(task.process("Alex").await, EntityOutcome::Invalid);
        assert!(cache.get("Alex").await.is_none());
        assert_eq!(stats.snapshot().await.failures_of(INVALID_RECORD), 1);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_untouched() {
        let (task, cache, stats) = task(Arc::new(ProfileTransport::default()), cached(None));

        assert_eq!(task.process("Steve").await, EntityOutcome::Skipped);
        assert_eq!(cache.snapshot().await, cached(None));
        assert_eq!(stats.snapshot().await.failures_of("http_status"), 1);
    }
}
