//! crates/solaudit_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the audit pipeline.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{AnalysisRequest, AnalysisResult, HistoryEntry, Report};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network),
/// while keeping enough shape for the analysis client's retry policy to classify failures.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Rate limited by the service: {0}")]
    RateLimited(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Call timed out: {0}")]
    Timeout(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// Whether a retry of the same call could plausibly succeed.
    /// Configuration and not-found failures never clear on their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::RateLimited(_) | PortError::ServiceUnavailable(_) | PortError::Timeout(_)
        )
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The external completion service, seen from the pipeline's side.
/// Implementations own retry and timeout policy: transient failures are
/// absorbed into `AnalysisResult::Failed` after exhaustion, and only
/// configuration errors (bad credentials, bad endpoint) surface as `Err`.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> PortResult<AnalysisResult>;
}

/// The durable, append-only log of past reports.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends a report. The entry must be durable before this returns.
    async fn append(&self, report: &Report) -> PortResult<HistoryEntry>;

    /// All entries, most recent first.
    async fn list(&self) -> PortResult<Vec<HistoryEntry>>;

    /// Point lookup by report id.
    async fn get(&self, id: Uuid) -> PortResult<Report>;
}

/// Outbound email. One attempt per call; the caller decides whether a
/// failure is fatal.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> PortResult<()>;
}
