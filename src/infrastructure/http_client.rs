//! HTTP transport for the game server
//!
//! Provides single-attempt network calls (login, player search page, profile
//! page) over one shared `reqwest` client. Retries and per-call timeouts are
//! layered on top by [`Session`](crate::infrastructure::session::Session).

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed};
use reqwest::{Client, ClientBuilder, Response};
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

use crate::domain::PlayerSummary;
use crate::infrastructure::config::{CrawlingConfig, ServerConfig};
use crate::infrastructure::session::{Credentials, SessionError};

/// Single-attempt access to the game server.
///
/// Implementations must not retry: every call is one physical attempt.
#[async_trait]
pub trait PlayerTransport: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<(), SessionError>;

    /// One page of the player search; an empty vec marks the end of the list
    async fn list_page(&self, offset: u32) -> Result<Vec<PlayerSummary>, SessionError>;

    /// Raw HTML of one profile page
    async fn fetch_profile(&self, nickname: &str) -> Result<String, SessionError>;
}

/// Resolved server endpoints
#[derive(Debug, Clone)]
pub struct Endpoints {
    login: Url,
    search: Url,
    profile_base: Url,
}

impl Endpoints {
    pub fn from_config(server: &ServerConfig) -> Result<Self> {
        let base = Url::parse(&server.base_url)
            .with_context(|| format!("Invalid base URL: {}", server.base_url))?;
        let join = |path: &str| {
            base.join(path)
                .with_context(|| format!("Invalid endpoint path: {path}"))
        };

        Ok(Self {
            login: join(&server.login_path)?,
            search: join(&server.search_path)?,
            profile_base: join(&server.profile_path)?,
        })
    }

    /// Profile URL with the nickname percent-encoded as the last path segment
    pub fn profile_url(&self, nickname: &str) -> Result<Url, SessionError> {
        let mut url = self.profile_base.clone();
        url.path_segments_mut()
            .map_err(|()| SessionError::InvalidUrl(self.profile_base.to_string()))?
            .pop_if_empty()
            .push(nickname);
        Ok(url)
    }
}

/// reqwest-backed transport with connection cap and request pacing
pub struct HttpTransport {
    client: Client,
    endpoints: Endpoints,
    connection_limiter: Arc<Semaphore>,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a new transport from the server and crawling configuration
    pub fn new(server: &ServerConfig, crawling: &CrawlingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(crawling.request_timeout_seconds);
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(&crawling.user_agent)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .pool_max_idle_per_host(crawling.max_concurrent_requests)
            .redirect(if crawling.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        let rate_limiter = NonZeroU32::new(crawling.max_requests_per_second)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            client,
            endpoints: Endpoints::from_config(server)?,
            connection_limiter: Arc::new(Semaphore::new(crawling.max_concurrent_requests.max(1))),
            rate_limiter,
            timeout,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn pace(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }

    fn map_error(&self, error: reqwest::Error) -> SessionError {
        if error.is_timeout() {
            SessionError::Timeout(self.timeout)
        } else {
            SessionError::Transport(error.to_string())
        }
    }

    fn check_status(response: Response) -> Result<Response, SessionError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(SessionError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            })
        }
    }

    async fn read_text(&self, response: Response) -> Result<String, SessionError> {
        response.text().await.map_err(|e| self.map_error(e))
    }
}

#[async_trait]
impl PlayerTransport for HttpTransport {
    async fn login(&self, credentials: &Credentials) -> Result<(), SessionError> {
        let _permit = self
            .connection_limiter
            .acquire()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        self.pace().await;

        debug!("POST {}", self.endpoints.login);
        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let response = self
            .client
            .post(self.endpoints.login.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        Self::check_status(response)?;
        Ok(())
    }

    async fn list_page(&self, offset: u32) -> Result<Vec<PlayerSummary>, SessionError> {
        let _permit = self
            .connection_limiter
            .acquire()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        self.pace().await;

        debug!("POST {} (offset {})", self.endpoints.search, offset);
        let offset = offset.to_string();
        let form = [("nickname", ""), ("sort", ""), ("offset", offset.as_str())];
        let response = self
            .client
            .post(self.endpoints.search.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let body = self.read_text(Self::check_status(response)?).await?;

        parse_search_page(&body)
    }

    async fn fetch_profile(&self, nickname: &str) -> Result<String, SessionError> {
        let url = self.endpoints.profile_url(nickname)?;
        let _permit = self
            .connection_limiter
            .acquire()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        self.pace().await;

        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        self.read_text(Self::check_status(response)?).await
    }
}

/// Decode a search page body; empty body, `null` and `[]` all mean "no more players"
pub fn parse_search_page(body: &str) -> Result<Vec<PlayerSummary>, SessionError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Option<Vec<PlayerSummary>>>(body)
        .map(Option::unwrap_or_default)
        .map_err(|e| SessionError::Decode(e.to_string()))
}
