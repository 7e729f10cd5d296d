//! Authenticated session with the game server
//!
//! Wraps a [`PlayerTransport`] so that every operation is bounded by a
//! per-call timeout and retried independently according to its
//! [`RetryPolicy`]. All request/retry/success/failure counters are updated here.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;

use crate::domain::{PlayerSummary, Statistics};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http_client::PlayerTransport;
use crate::infrastructure::retry_policy::{ErrorClass, RetryPolicy, RetryableError};

/// Network failure of a single attempt or of a whole call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error {status}: {url}")]
    Status { status: u16, url: String },

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl RetryableError for SessionError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(_) | Self::Timeout(_) => ErrorClass::Transient,
            Self::Status { status, .. } if *status >= 500 || *status == 429 => ErrorClass::Transient,
            Self::Status { .. } | Self::Decode(_) | Self::InvalidUrl(_) => ErrorClass::Fatal,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::Status { .. } => "http_status",
            Self::Decode(_) => "decode",
            Self::InvalidUrl(_) => "invalid_url",
        }
    }
}

/// Login credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Retried, time-bounded access to the game server, shared by all tasks
pub struct Session {
    transport: Arc<dyn PlayerTransport>,
    stats: Arc<Statistics>,
    login_policy: RetryPolicy,
    fetch_policy: RetryPolicy,
    request_timeout: Duration,
}

impl Session {
    pub fn new(transport: Arc<dyn PlayerTransport>, stats: Arc<Statistics>, config: &AppConfig) -> Self {
        Self::with_policies(
            transport,
            stats,
            RetryPolicy::from_config(&config.retry.login),
            RetryPolicy::from_config(&config.retry.fetch),
            Duration::from_secs(config.crawling.request_timeout_seconds),
        )
    }

    pub fn with_policies(
        transport: Arc<dyn PlayerTransport>,
        stats: Arc<Statistics>,
        login_policy: RetryPolicy,
        fetch_policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            stats,
            login_policy,
            fetch_policy,
            request_timeout,
        }
    }

    pub fn stats(&self) -> &Arc<Statistics> {
        &self.stats
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<(), SessionError> {
        self.login_policy
            .execute(&self.stats, "login", |_| self.bounded(self.transport.login(credentials)))
            .await
    }

    pub async fn list_page(&self, offset: u32) -> Result<Vec<PlayerSummary>, SessionError> {
        let label = format!("player list (offset {offset})");
        self.fetch_policy
            .execute(&self.stats, &label, |_| self.bounded(self.transport.list_page(offset)))
            .await
    }

    pub async fn fetch_profile(&self, nickname: &str) -> Result<String, SessionError> {
        let label = format!("profile {nickname}");
        self.fetch_policy
            .execute(&self.stats, &label, |_| self.bounded(self.transport.fetch_profile(nickname)))
            .await
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, SessionError>>,
    {
        timeout(self.request_timeout, call)
            .await
            .unwrap_or(Err(SessionError::Timeout(self.request_timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport whose login fails a fixed number of times, and whose
    /// profile fetch never answers
    struct ScriptedTransport {
        login_failures: u32,
        login_calls: AtomicU32,
        login_error: SessionError,
    }

    #[async_trait]
    impl PlayerTransport for ScriptedTransport {
        async fn login(&self, _credentials: &Credentials) -> Result<(), SessionError> {
            let call = self.login_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.login_failures {
                Err(self.login_error.clone())
            } else {
                Ok(())
            }
        }

        async fn list_page(&self, _offset: u32) -> Result<Vec<PlayerSummary>, SessionError> {
            Ok(Vec::new())
        }

        async fn fetch_profile(&self, _nickname: &str) -> Result<String, SessionError> {
            std::future::pending().await
        }
    }

    fn session(login_failures: u32, login_error: SessionError) -> (Session, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport {
            login_failures,
            login_calls: AtomicU32::new(0),
            login_error,
        });
        let session = Session::new(
            Arc::clone(&transport) as Arc<dyn PlayerTransport>,
            Arc::new(Statistics::new()),
            &AppConfig::default(),
        );
        (session, transport)
    }

    #[rstest]
    #[case(SessionError::Transport("reset".into()), ErrorClass::Transient, "transport")]
    #[case(SessionError::Timeout(Duration::from_secs(1)), ErrorClass::Transient, "timeout")]
    #[case(SessionError::Status { status: 503, url: "u".into() }, ErrorClass::Transient, "http_status")]
    #[case(SessionError::Status { status: 429, url: "u".into() }, ErrorClass::Transient, "http_status")]
    #[case(SessionError::Status { status: 403, url: "u".into() }, ErrorClass::Fatal, "http_status")]
    #[case(SessionError::Decode("eof".into()), ErrorClass::Fatal, "decode")]
    fn error_classification(
        #[case] error: SessionError,
        #[case] class: ErrorClass,
        #[case] kind: &str,
    ) {
        assert_eq!(error.class(), class);
        assert_eq!(error.kind(), kind);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let text = format!("{:?}", Credentials::new("steve", "hunter2"));
        assert!(text.contains("steve"));
        assert!(!text.contains("hunter2"));
    }

    #[tokio::test(start_paused = true)]
    async fn login_recovers_after_transient_failures() {
        let (session, transport) = session(2, SessionError::Transport("reset".into()));

        session.login(&Credentials::new("u", "p")).await.unwrap();

        assert_eq!(transport.login_calls.load(Ordering::SeqCst), 3);
        let stats = session.stats().snapshot().await;
        assert_eq!(stats.requests_made, 3);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn login_gives_up_after_three_attempts() {
        let (session, transport) = session(u32::MAX, SessionError::Status { status: 502, url: "u".into() });

        let result = session.login(&Credentials::new("u", "p")).await;

        assert!(matches!(result, Err(SessionError::Status { status: 502, .. })));
        assert_eq!(transport.login_calls.load(Ordering::SeqCst), 3);
        assert_eq!(session.stats().snapshot().await.failures_of("http_status"), 1);
    }

    #[tokio::test]
    async fn rejected_credentials_are_not_retried() {
        let (session, transport) = session(u32::MAX, SessionError::Status { status: 401, url: "u".into() });

        assert!(session.login(&Credentials::new("u", "bad")).await.is_err());
        assert_eq!(transport.login_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fetch_times_out_on_every_attempt() {
        let (session, _) = session(0, SessionError::Transport(String::new()));

        let result = session.fetch_profile("Steve").await;

        assert!(matches!(result, Err(SessionError::Timeout(_))));
        let stats = session.stats().snapshot().await;
        assert_eq!(stats.requests_made, 3);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.failures_of("timeout"), 1);
    }
}
