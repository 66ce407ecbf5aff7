//! crates/solaudit_core/src/session.rs
//!
//! The audit session workflow: one user-initiated run of
//! load -> prompt -> analyze -> format -> store -> (email).
//!
//! Sessions are independent of each other; the history store is the only
//! shared collaborator. A report is appended only once fully formatted,
//! so an aborted or failed session never leaves a partial entry behind.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::{
    AnalysisRequest, AnalysisResult, AuditMode, DeliveryOutcome, EmailJob, HistoryEntry, Report,
};
use crate::formatter::{self, FormatError};
use crate::loader::{self, LoadError};
use crate::ports::{AnalysisService, HistoryStore, MailTransport, PortError};
use crate::prompt::{self, PromptError};

/// The pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Upload,
    Analysis,
    Formatting,
    Storage,
    Notification,
}

impl std::fmt::Display for SessionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionStage::Upload => "upload",
            SessionStage::Analysis => "analysis",
            SessionStage::Formatting => "formatting",
            SessionStage::Storage => "storage",
            SessionStage::Notification => "notification",
        };
        write!(f, "{}", name)
    }
}

/// Terminal failure of an audit session. Email failures are not session
/// failures: a stored report with a failed delivery is reported through
/// `SessionOutcome` instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid contract upload: {0}")]
    Input(#[from] LoadError),
    #[error("could not build analysis request: {0}")]
    Prompt(#[from] PromptError),
    #[error("analysis configuration error: {0}")]
    Configuration(String),
    #[error("analysis failed: {0}")]
    AnalysisFailed(String),
    #[error("could not store report: {0}")]
    Store(PortError),
    #[error("session cancelled during {0}")]
    Cancelled(SessionStage),
}

impl SessionError {
    pub fn stage(&self) -> SessionStage {
        match self {
            SessionError::Input(_) | SessionError::Prompt(_) => SessionStage::Upload,
            SessionError::Configuration(_) | SessionError::AnalysisFailed(_) => {
                SessionStage::Analysis
            }
            SessionError::Store(_) => SessionStage::Storage,
            SessionError::Cancelled(stage) => *stage,
        }
    }
}

/// Raw upload as it arrives from the UI layer.
#[derive(Debug, Clone)]
pub struct ContractUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// What a completed session produced: the stored entry, and the email
/// attempt when one was requested.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub entry: HistoryEntry,
    pub email: Option<EmailJob>,
}

/// Drives the pipeline stages for one audit request at a time. Cheap to
/// construct per request; all collaborators are shared handles.
pub struct SessionOrchestrator {
    analysis: Arc<dyn AnalysisService>,
    history: Arc<dyn HistoryStore>,
    mailer: Arc<dyn MailTransport>,
    max_contract_bytes: usize,
}

impl SessionOrchestrator {
    pub fn new(
        analysis: Arc<dyn AnalysisService>,
        history: Arc<dyn HistoryStore>,
        mailer: Arc<dyn MailTransport>,
        max_contract_bytes: usize,
    ) -> Self {
        Self {
            analysis,
            history,
            mailer,
            max_contract_bytes,
        }
    }

    /// Runs a full audit session. Re-running the same contract and mode
    /// appends a new, independent history entry each time.
    pub async fn run(
        &self,
        upload: &ContractUpload,
        mode: AuditMode,
        notify: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome, SessionError> {
        let source = loader::load(&upload.bytes, &upload.filename, self.max_contract_bytes)?;
        let request = prompt::build(&source, mode, self.max_contract_bytes)?;

        ensure_live(cancel, SessionStage::Analysis)?;
        let result = self.analyze(&request, cancel).await?;

        let digest = formatter::source_digest(&source.text);
        let report = format_result(&result, &source.name, &digest, mode)?;

        self.store_and_notify(report, notify, cancel).await
    }

    /// Re-runs a stored report through the simplify prompt and appends
    /// the rewritten version as a new beginner-mode entry.
    pub async fn simplify(
        &self,
        original: &Report,
        notify: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome, SessionError> {
        let request = prompt::build_simplify(original);

        ensure_live(cancel, SessionStage::Analysis)?;
        let result = self.analyze(&request, cancel).await?;

        let report = format_result(
            &result,
            &original.contract_name,
            &original.source_digest,
            AuditMode::Beginner,
        )?;

        self.store_and_notify(report, notify, cancel).await
    }

    async fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, SessionError> {
        self.analysis
            .analyze(request, cancel)
            .await
            .map_err(|e| match e {
                PortError::Configuration(reason) => SessionError::Configuration(reason),
                other => SessionError::AnalysisFailed(other.to_string()),
            })
    }

    async fn store_and_notify(
        &self,
        report: Report,
        notify: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome, SessionError> {
        ensure_live(cancel, SessionStage::Storage)?;
        let entry = self
            .history
            .append(&report)
            .await
            .map_err(SessionError::Store)?;

        let email = match notify {
            Some(recipient) => Some(self.send_report(&entry.report, recipient, cancel).await),
            None => None,
        };

        Ok(SessionOutcome { entry, email })
    }

    async fn send_report(
        &self,
        report: &Report,
        recipient: &str,
        cancel: &CancellationToken,
    ) -> EmailJob {
        let subject = report.email_subject();

        let outcome = if cancel.is_cancelled() {
            DeliveryOutcome::Failed("session cancelled".to_string())
        } else {
            match self
                .mailer
                .deliver(recipient, &subject, &report.rendered())
                .await
            {
                Ok(()) => DeliveryOutcome::Sent,
                Err(e) => DeliveryOutcome::Failed(e.to_string()),
            }
        };

        EmailJob {
            recipient: recipient.to_string(),
            subject,
            outcome,
        }
    }
}

/// A failed analysis result surfaces as an analysis-stage failure even
/// though the formatter is what rejects it.
fn format_result(
    result: &AnalysisResult,
    contract_name: &str,
    digest: &str,
    mode: AuditMode,
) -> Result<Report, SessionError> {
    formatter::format(result, contract_name, digest, mode).map_err(|e| match e {
        FormatError::AnalysisFailed(reason) => SessionError::AnalysisFailed(reason),
    })
}

fn ensure_live(cancel: &CancellationToken, stage: SessionStage) -> Result<(), SessionError> {
    if cancel.is_cancelled() {
        Err(SessionError::Cancelled(stage))
    } else {
        Ok(())
    }
}
