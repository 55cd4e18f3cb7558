//! DocManage client core
//!
//! Session handling, document listing, photo upload and PDF export for the
//! DocManage truck-document service. Front ends (desktop, CLI) sit on top of
//! `SessionClient`, `PageCursor` and `ReportAssembler`.

pub mod config;
pub mod documents;
pub mod http_client;
pub mod models;
pub mod report;
pub mod session;

use tracing_subscriber::EnvFilter;

pub use config::{ClientConfig, ConfigError};
pub use documents::{DocumentFilters, FinancialYear, PageCursor, PageLink, UploadRequest};
pub use models::{AuthenticatedUser, DocumentRecord, ImageRef, ListingPage, SessionTokens, UserRole};
pub use report::{Report, ReportArtifact, ReportAssembler, ReportError};
pub use session::{ApiError, SessionClient, SessionInvalidator, TokenStore};

/// Install the global tracing subscriber for binaries embedding this crate.
///
/// Honours `RUST_LOG`; defaults to warn for dependencies and info for this
/// crate. Safe to call more than once.
pub fn init_tracing() {
    // Default: warn for most crates, info for ours (request summaries visible)
    // Use RUST_LOG=debug for per-request logs
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,docmanage_client=info")),
        )
        .try_init();
}
