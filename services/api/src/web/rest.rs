//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use solaudit_core::domain::{AuditMode, DeliveryOutcome, EmailJob, HistoryEntry, Report};
use solaudit_core::loader::LoadError;
use solaudit_core::ports::PortError;
use solaudit_core::session::{ContractUpload, SessionError, SessionOutcome};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_audit_handler,
        list_audits_handler,
        get_audit_handler,
        email_audit_handler,
        explain_audit_handler,
    ),
    components(
        schemas(AuditResponse, ReportDto, ReportSectionDto, HistoryEntryDto, EmailRequest, EmailOutcomeDto)
    ),
    tags(
        (name = "Smart Contract Audit API", description = "API endpoints for AI-assisted Solidity contract audits.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One labeled block of a formatted report.
#[derive(Serialize, ToSchema)]
pub struct ReportSectionDto {
    pub heading: String,
    pub body: String,
}

/// A stored audit report.
#[derive(Serialize, ToSchema)]
pub struct ReportDto {
    pub id: Uuid,
    pub contract_name: String,
    pub mode: String,
    pub title: String,
    pub source_digest: String,
    pub sections: Vec<ReportSectionDto>,
    pub created_at: DateTime<Utc>,
}

impl From<Report> for ReportDto {
    fn from(report: Report) -> Self {
        Self {
            id: report.id,
            contract_name: report.contract_name,
            mode: report.mode.to_string(),
            title: report.title,
            source_digest: report.source_digest,
            sections: report
                .sections
                .into_iter()
                .map(|s| ReportSectionDto {
                    heading: s.heading,
                    body: s.body,
                })
                .collect(),
            created_at: report.created_at,
        }
    }
}

/// A history listing row: report metadata without the body.
#[derive(Serialize, ToSchema)]
pub struct HistoryEntryDto {
    pub position: i64,
    pub id: Uuid,
    pub contract_name: String,
    pub mode: String,
    pub title: String,
    pub source_digest: String,
    pub created_at: DateTime<Utc>,
}

impl From<HistoryEntry> for HistoryEntryDto {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            position: entry.position,
            id: entry.report.id,
            contract_name: entry.report.contract_name,
            mode: entry.report.mode.to_string(),
            title: entry.report.title,
            source_digest: entry.report.source_digest,
            created_at: entry.report.created_at,
        }
    }
}

/// Outcome of one email delivery attempt.
#[derive(Serialize, ToSchema)]
pub struct EmailOutcomeDto {
    pub recipient: String,
    pub subject: String,
    pub delivered: bool,
    pub error: Option<String>,
}

impl From<EmailJob> for EmailOutcomeDto {
    fn from(job: EmailJob) -> Self {
        let (delivered, error) = match job.outcome {
            DeliveryOutcome::Sent => (true, None),
            DeliveryOutcome::Failed(reason) => (false, Some(reason)),
        };
        Self {
            recipient: job.recipient,
            subject: job.subject,
            delivered,
            error,
        }
    }
}

/// The response payload sent after a completed audit session.
#[derive(Serialize, ToSchema)]
pub struct AuditResponse {
    pub report: ReportDto,
    pub position: i64,
    /// Present only when an email export was requested; a failed
    /// delivery does not fail the audit.
    pub email: Option<EmailOutcomeDto>,
}

impl From<SessionOutcome> for AuditResponse {
    fn from(outcome: SessionOutcome) -> Self {
        Self {
            position: outcome.entry.position,
            report: ReportDto::from(outcome.entry.report),
            email: outcome.email.map(EmailOutcomeDto::from),
        }
    }
}

/// Request payload for emailing a stored report.
#[derive(Deserialize, ToSchema)]
pub struct EmailRequest {
    pub recipient: String,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn session_error_response(err: SessionError) -> (StatusCode, String) {
    let status = match &err {
        SessionError::Input(LoadError::EmptyInput)
        | SessionError::Input(LoadError::InvalidEncoding(_)) => StatusCode::BAD_REQUEST,
        SessionError::Input(LoadError::UnsupportedFile(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::Input(LoadError::PayloadTooLarge { .. }) | SessionError::Prompt(_) => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        SessionError::AnalysisFailed(_) => StatusCode::BAD_GATEWAY,
        SessionError::Configuration(_)
        | SessionError::Store(_)
        | SessionError::Cancelled(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn port_error_response(err: PortError) -> (StatusCode, String) {
    match err {
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        other => {
            error!("History store error: {:?}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Run a full audit session over an uploaded contract.
///
/// Accepts a multipart/form-data request with a `contract` file part, an
/// optional `mode` text part (`detailed` or `beginner`, defaulting to
/// detailed), and an optional `email` text part naming a recipient for
/// the finished report.
#[utoipa::path(
    post,
    path = "/audits",
    request_body(content_type = "multipart/form-data", description = "The contract to audit, plus mode/email options."),
    responses(
        (status = 201, description = "Audit completed and stored", body = AuditResponse),
        (status = 400, description = "Bad request (e.g., missing or empty contract)"),
        (status = 413, description = "Contract exceeds the configured size limit"),
        (status = 422, description = "Unsupported file type"),
        (status = 502, description = "Analysis service failed after retries"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_audit_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut upload: Option<ContractUpload> = None;
    let mut mode = AuditMode::Detailed;
    let mut recipient: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("contract") => {
                let filename = field.file_name().unwrap_or("contract.sol").to_string();
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read file bytes: {}", e),
                    )
                })?;
                upload = Some(ContractUpload {
                    filename,
                    bytes: data.to_vec(),
                });
            }
            Some("mode") => {
                let raw = field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read mode field: {}", e),
                    )
                })?;
                mode = raw
                    .parse()
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("{}", e)))?;
            }
            Some("email") => {
                let raw = field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read email field: {}", e),
                    )
                })?;
                let trimmed = raw.trim().to_string();
                if !trimmed.is_empty() {
                    recipient = Some(trimmed);
                }
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Multipart form must include a 'contract' file".to_string(),
        )
    })?;

    let cancel = CancellationToken::new();
    let outcome = app_state
        .orchestrator()
        .run(&upload, mode, recipient.as_deref(), &cancel)
        .await
        .map_err(|e| {
            error!("Audit session failed during {}: {}", e.stage(), e);
            session_error_response(e)
        })?;

    Ok((StatusCode::CREATED, Json(AuditResponse::from(outcome))))
}

/// List past audits, most recent first.
#[utoipa::path(
    get,
    path = "/audits",
    responses(
        (status = 200, description = "History entries, most recent first", body = [HistoryEntryDto]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_audits_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entries = app_state
        .history
        .list()
        .await
        .map_err(port_error_response)?;

    let listing: Vec<HistoryEntryDto> = entries.into_iter().map(HistoryEntryDto::from).collect();
    Ok(Json(listing))
}

/// Fetch one stored report by id.
#[utoipa::path(
    get,
    path = "/audits/{id}",
    responses(
        (status = 200, description = "The stored report", body = ReportDto),
        (status = 404, description = "No report with that id"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The report id.")
    )
)]
pub async fn get_audit_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report = app_state.history.get(id).await.map_err(port_error_response)?;
    Ok(Json(ReportDto::from(report)))
}

/// Email a stored report to a recipient.
///
/// One delivery attempt per call; the outcome (including a failure) is
/// reported in the response body rather than as an error status.
#[utoipa::path(
    post,
    path = "/audits/{id}/email",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Delivery attempted; see `delivered`", body = EmailOutcomeDto),
        (status = 400, description = "Missing recipient"),
        (status = 404, description = "No report with that id")
    ),
    params(
        ("id" = Uuid, Path, description = "The report id.")
    )
)]
pub async fn email_audit_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EmailRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let recipient = payload.recipient.trim().to_string();
    if recipient.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Recipient email is required".to_string(),
        ));
    }

    let report = app_state.history.get(id).await.map_err(port_error_response)?;
    let subject = report.email_subject();

    let outcome = match app_state
        .mailer
        .deliver(&recipient, &subject, &report.rendered())
        .await
    {
        Ok(()) => DeliveryOutcome::Sent,
        Err(e) => {
            error!("Email delivery failed for report {}: {}", id, e);
            DeliveryOutcome::Failed(e.to_string())
        }
    };

    let job = EmailJob {
        recipient,
        subject,
        outcome,
    };
    Ok(Json(EmailOutcomeDto::from(job)))
}

/// Rewrite a stored report in plain language and store the result.
///
/// Runs the stored report back through the analysis service with the
/// simplify prompt and appends the rewritten version as a new
/// beginner-mode history entry.
#[utoipa::path(
    post,
    path = "/audits/{id}/explain",
    responses(
        (status = 201, description = "Simplified report stored", body = AuditResponse),
        (status = 404, description = "No report with that id"),
        (status = 502, description = "Analysis service failed after retries"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The report id.")
    )
)]
pub async fn explain_audit_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report = app_state.history.get(id).await.map_err(port_error_response)?;

    let cancel = CancellationToken::new();
    let outcome = app_state
        .orchestrator()
        .simplify(&report, None, &cancel)
        .await
        .map_err(|e| {
            error!("Simplify session failed during {}: {}", e.stage(), e);
            session_error_response(e)
        })?;

    Ok((StatusCode::CREATED, Json(AuditResponse::from(outcome))))
}
