//! Command line interface
//!
//! Flags override the loaded configuration file; credentials fall back to
//! the `CENSUS_USERNAME` / `CENSUS_PASSWORD` environment variables.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use crate::crawling::Orchestrator;
use crate::domain::Statistics;
use crate::infrastructure::config::{AppConfig, ConfigManager};
use crate::infrastructure::http_client::HttpTransport;
use crate::infrastructure::logging::init_logging_with_config;
use crate::infrastructure::session::{Credentials, Session};

#[derive(Debug, Parser)]
#[command(
    name = "player-census",
    version,
    about = "Collect player profiles and report what changed since the last run",
    long_about = "Log in to the game server, enumerate every listed player, refresh their profiles with bounded concurrency, then write the JSON cache and an HTML change report.",
    after_help = "Credentials are resolved from the flags first, then CENSUS_USERNAME / CENSUS_PASSWORD."
)]
pub struct Cli {
    #[arg(long, env = "CENSUS_USERNAME", help = "Account used to log in")]
    pub username: Option<String>,

    #[arg(
        long,
        env = "CENSUS_PASSWORD",
        hide_env_values = true,
        help = "Password of the account"
    )]
    pub password: Option<String>,

    #[arg(
        long = "max-offset",
        alias = "max_offset",
        value_name = "OFFSET",
        help = "Largest search offset requested during enumeration [default: 500]"
    )]
    pub max_offset: Option<u32>,

    #[arg(long, value_name = "PATH", help = "Configuration file (defaults to the user config directory)")]
    pub config: Option<PathBuf>,

    #[arg(long = "cache-file", value_name = "PATH", help = "JSON snapshot read and written by the run")]
    pub cache_file: Option<PathBuf>,

    #[arg(long = "report-file", value_name = "PATH", help = "HTML report output")]
    pub report_file: Option<PathBuf>,

    #[arg(long = "log-level", value_name = "LEVEL", help = "trace, debug, info, warn or error")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Both credentials, if present and non-blank
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username.as_deref().filter(|u| !u.trim().is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some(Credentials::new(username, password))
    }

    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(max_offset) = self.max_offset {
            config.crawling.max_offset = max_offset;
        }
        if let Some(cache_file) = &self.cache_file {
            config.storage.cache_file.clone_from(cache_file);
        }
        if let Some(report_file) = &self.report_file {
            config.storage.report_file.clone_from(report_file);
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
    }

    fn config_manager(&self) -> Result<ConfigManager> {
        match &self.config {
            Some(path) => Ok(ConfigManager::with_path(path)),
            None => ConfigManager::new(),
        }
    }
}

/// Run the collector. Only missing credentials and setup errors are failures;
/// an aborted collection run still exits successfully.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = cli.config_manager()?.load_config().await?;
    cli.apply_overrides(&mut config);

    let _log_guard = init_logging_with_config(&config.logging)?;
    info!("Starting player-census v{}", env!("CARGO_PKG_VERSION"));

    let Some(credentials) = cli.credentials() else {
        error!("Username or password not provided (use --username/--password or CENSUS_USERNAME/CENSUS_PASSWORD)");
        return Ok(ExitCode::FAILURE);
    };

    let transport = Arc::new(HttpTransport::new(&config.server, &config.crawling)?);
    let session = Arc::new(Session::new(transport, Arc::new(Statistics::new()), &config));
    let mut orchestrator = Orchestrator::new(&config, session, credentials)?;

    let outcome = orchestrator.run().await;
    if outcome.is_success() {
        info!("✅ Run finished: {} players scheduled", outcome.players_scheduled);
    } else {
        warn!("Run ended in state: {}", outcome.state);
    }

    Ok(ExitCode::SUCCESS)
}
