//! Infrastructure layer for network access, parsing, persistence and reporting
//!
//! This module provides the HTTP transport and retried session, HTML profile
//! extraction, the snapshot file store, the HTML report renderer, and the
//! configuration and logging setup shared by the binary.

pub mod config;  // Configuration file and defaults
pub mod http_client;  // Single-attempt HTTP transport
pub mod logging;  // Logging infrastructure
pub mod parsing;  // Profile page extraction
pub mod report;  // HTML report renderer
pub mod retry_policy;
pub mod session;  // Retried, time-bounded server access
pub mod snapshot_store;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager};
pub use http_client::{HttpTransport, PlayerTransport};
pub use logging::{get_log_directory, init_logging_with_config};
pub use parsing::ProfileParser;
pub use report::{Report, ReportRenderer, ReportSummary};
pub use retry_policy::{ErrorClass, RetryDecision, RetryPolicy, RetryableError};
pub use session::{Credentials, Session, SessionError};
pub use snapshot_store::{SnapshotError, SnapshotStore};
