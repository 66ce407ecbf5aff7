//! crates/solaudit_core/src/domain.rs
//!
//! Defines the pure, core data structures for the audit pipeline.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An uploaded Solidity contract, decoded and validated by the loader.
///
/// Lives only for the duration of one audit session; only the report
/// derived from it is persisted.
#[derive(Debug, Clone)]
pub struct ContractSource {
    pub name: String,
    pub text: String,
    pub size_bytes: usize,
}

/// The two supported output styles for an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditMode {
    /// Structured findings: security, gas, code quality.
    Detailed,
    /// A jargon-free explanation for non-experts.
    Beginner,
}

impl std::fmt::Display for AuditMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditMode::Detailed => write!(f, "detailed"),
            AuditMode::Beginner => write!(f, "beginner"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown audit mode: {0}")]
pub struct ParseAuditModeError(String);

impl std::str::FromStr for AuditMode {
    type Err = ParseAuditModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detailed" => Ok(AuditMode::Detailed),
            "beginner" => Ok(AuditMode::Beginner),
            other => Err(ParseAuditModeError(other.to_string())),
        }
    }
}

/// A fully composed completion request, ready to be sent to the
/// external model. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub mode: AuditMode,
}

/// The outcome of one analysis call, after the client's retry policy
/// has run its course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisResult {
    Succeeded(String),
    Failed(String),
}

impl AnalysisResult {
    pub fn succeeded(text: impl Into<String>) -> Self {
        AnalysisResult::Succeeded(text.into())
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        AnalysisResult::Failed(reason.into())
    }
}

/// One labeled block of a formatted report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub heading: String,
    pub body: String,
}

/// A formatted audit report. Immutable after creation; owned by the
/// history store once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub id: Uuid,
    pub contract_name: String,
    pub mode: AuditMode,
    /// Short display title inferred from the first heading of the
    /// model output.
    pub title: String,
    /// First 12 hex chars of the SHA-256 of the contract text.
    pub source_digest: String,
    pub sections: Vec<ReportSection>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// Subject line used when this report is exported by email.
    pub fn email_subject(&self) -> String {
        format!("Smart Contract Audit Report: {}", self.contract_name)
    }

    /// Renders the report as a single markdown document, used as the
    /// email body and for plain-text display.
    pub fn rendered(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str(&format!("## {}\n\n{}\n\n", section.heading, section.body));
        }
        out.trim_end().to_string()
    }
}

/// A report together with its position in the append-only history log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub position: i64,
    pub report: Report,
}

/// Outcome of a single email delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed(String),
}

/// One attempted email export of a report. Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailJob {
    pub recipient: String,
    pub subject: String,
    pub outcome: DeliveryOutcome,
}

impl EmailJob {
    pub fn delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_mode_round_trips_through_strings() {
        for mode in [AuditMode::Detailed, AuditMode::Beginner] {
            let parsed: AuditMode = mode.to_string().parse().unwrap();
            assert_eq!(parsed, mode);
        }
        assert!("comprehensive".parse::<AuditMode>().is_err());
    }

    #[test]
    fn rendered_report_joins_sections_with_headings() {
        let report = Report {
            id: Uuid::new_v4(),
            contract_name: "token.sol".to_string(),
            mode: AuditMode::Detailed,
            title: "Audit".to_string(),
            source_digest: "abc123def456".to_string(),
            sections: vec![
                ReportSection {
                    heading: "Security Vulnerabilities".to_string(),
                    body: "None found.".to_string(),
                },
                ReportSection {
                    heading: "Gas Optimization Opportunities".to_string(),
                    body: "Use calldata.".to_string(),
                },
            ],
            created_at: Utc::now(),
        };

        let text = report.rendered();
        assert!(text.starts_with("## Security Vulnerabilities\n\nNone found."));
        assert!(text.contains("## Gas Optimization Opportunities"));
        assert!(!text.ends_with('\n'));
    }
}
