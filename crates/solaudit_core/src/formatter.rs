//! crates/solaudit_core/src/formatter.rs
//!
//! Turns raw completion text into a `Report`. The model output format is
//! not guaranteed to be stable, so section detection is permissive and
//! anything unrecognized falls back to a single general section rather
//! than being dropped.

use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{AnalysisResult, AuditMode, Report, ReportSection};

const GENERAL_HEADING: &str = "General Findings";
const BEGINNER_HEADING: &str = "Plain-Language Explanation";
const OVERVIEW_HEADING: &str = "Overview";
const FALLBACK_TITLE: &str = "Audit";
const TITLE_MAX_CHARS: usize = 60;

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("analysis failed: {0}")]
    AnalysisFailed(String),
}

/// Formats an analysis result into a report, assigning a fresh id and
/// timestamp. A failed result propagates its reason instead of producing
/// a partial report.
pub fn format(
    result: &AnalysisResult,
    contract_name: &str,
    source_digest: &str,
    mode: AuditMode,
) -> Result<Report, FormatError> {
    let text = match result {
        AnalysisResult::Succeeded(text) => text,
        AnalysisResult::Failed(reason) => {
            return Err(FormatError::AnalysisFailed(reason.clone()))
        }
    };

    let sections = match mode {
        AuditMode::Detailed => split_sections(text),
        AuditMode::Beginner => vec![ReportSection {
            heading: BEGINNER_HEADING.to_string(),
            body: text.trim().to_string(),
        }],
    };

    Ok(Report {
        id: Uuid::new_v4(),
        contract_name: contract_name.to_string(),
        mode,
        title: infer_title(text),
        source_digest: source_digest.to_string(),
        sections,
        created_at: Utc::now(),
    })
}

/// First 12 hex chars of the SHA-256 of the contract text, used to spot
/// repeat audits of the same source in the history view.
pub fn source_digest(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().take(6).map(|b| format!("{:02x}", b)).collect()
}

/// Splits detailed-mode completion text on its section markers. A marker
/// is a markdown heading or a numbered bold label on a line of its own
/// ("## Security Vulnerabilities", "1. **Gas Optimization Opportunities**").
/// Text with no markers at all becomes a single general section.
fn split_sections(raw: &str) -> Vec<ReportSection> {
    let marker = Regex::new(r"^\s*(?:#{1,6}\s+(.+?)|\d+[.)]\s+\*\*(.+?)\*\*:?)\s*$").unwrap();

    let mut sections: Vec<ReportSection> = Vec::new();
    let mut preamble: Vec<&str> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in raw.lines() {
        if let Some(caps) = marker.captures(line) {
            let label = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or("");
            if let Some((heading, body)) = current.take() {
                push_section(&mut sections, heading, &body);
            }
            current = Some((heading_for(label), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        } else {
            preamble.push(line);
        }
    }
    if let Some((heading, body)) = current.take() {
        push_section(&mut sections, heading, &body);
    }

    if sections.is_empty() {
        let body = raw.trim();
        if body.is_empty() {
            return Vec::new();
        }
        return vec![ReportSection {
            heading: GENERAL_HEADING.to_string(),
            body: body.to_string(),
        }];
    }

    // Prose before the first marker is kept as its own section.
    let preamble_text = preamble.join("\n").trim().to_string();
    if !preamble_text.is_empty() {
        sections.insert(
            0,
            ReportSection {
                heading: OVERVIEW_HEADING.to_string(),
                body: preamble_text,
            },
        );
    }

    sections
}

fn push_section(sections: &mut Vec<ReportSection>, heading: String, body_lines: &[&str]) {
    let body = body_lines.join("\n").trim().to_string();
    if body.is_empty() {
        return;
    }
    sections.push(ReportSection { heading, body });
}

/// Maps a marker label onto one of the three canonical categories the
/// detailed prompt asks for; unrecognized labels are kept verbatim.
fn heading_for(label: &str) -> String {
    let cleaned = label.trim_matches(|c: char| c == '*' || c == ':' || c.is_whitespace());
    let lower = cleaned.to_lowercase();
    if lower.contains("security") {
        "Security Vulnerabilities".to_string()
    } else if lower.contains("gas") {
        "Gas Optimization Opportunities".to_string()
    } else if lower.contains("quality") {
        "Code Quality Improvements".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Display title for the history view: the first non-empty line of the
/// completion, stripped of markdown markers and capped at 60 chars.
fn infer_title(raw: &str) -> String {
    for line in raw.lines() {
        let line = line
            .trim_matches(|c: char| c == '#' || c == '*' || c.is_whitespace())
            .trim();
        if !line.is_empty() {
            return line.chars().take(TITLE_MAX_CHARS).collect();
        }
    }
    FALLBACK_TITLE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_SECTIONS: &str = "\
# Vault Audit Report

## Security Vulnerabilities
- Reentrancy in withdraw() (SWC-107).

## Gas Optimization Opportunities
- Cache `balances[msg.sender]` in memory.

## Code Quality Improvements
- Missing NatSpec on public functions.
";

    #[test]
    fn detailed_output_with_markers_yields_three_categories() {
        let result = AnalysisResult::succeeded(THREE_SECTIONS);
        let report = format(&result, "Vault.sol", "0011223344ff", AuditMode::Detailed).unwrap();

        let headings: Vec<&str> = report.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(
            headings,
            vec![
                "Security Vulnerabilities",
                "Gas Optimization Opportunities",
                "Code Quality Improvements"
            ]
        );
        assert!(report.sections[0].body.contains("SWC-107"));
        assert_eq!(report.title, "Vault Audit Report");
        assert_eq!(report.contract_name, "Vault.sol");
    }

    #[test]
    fn numbered_bold_markers_are_recognized() {
        let raw = "1. **Security Vulnerabilities**\nNone found.\n2. **Gas Optimization Opportunities**\nUse `calldata`.\n";
        let report = format(
            &AnalysisResult::succeeded(raw),
            "a.sol",
            "digest",
            AuditMode::Detailed,
        )
        .unwrap();
        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.sections[0].heading, "Security Vulnerabilities");
        // Numbered findings inside a section must not open new sections.
        let raw = "## Security Vulnerabilities\n1. **Reentrancy**: withdraw() calls out before updating state.\n";
        let report = format(
            &AnalysisResult::succeeded(raw),
            "a.sol",
            "digest",
            AuditMode::Detailed,
        )
        .unwrap();
        assert_eq!(report.sections.len(), 1);
    }

    #[test]
    fn marker_free_text_becomes_a_single_general_section() {
        let prose = "This contract looks fine overall, though the owner can drain funds.";
        let report = format(
            &AnalysisResult::succeeded(prose),
            "a.sol",
            "digest",
            AuditMode::Detailed,
        )
        .unwrap();
        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.sections[0].heading, "General Findings");
        assert_eq!(report.sections[0].body, prose);
    }

    #[test]
    fn beginner_mode_keeps_one_narrative_section() {
        let prose = "This contract is a piggy bank. Anyone can put money in, only the owner takes it out.";
        let report = format(
            &AnalysisResult::succeeded(prose),
            "a.sol",
            "digest",
            AuditMode::Beginner,
        )
        .unwrap();
        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.sections[0].heading, "Plain-Language Explanation");
        assert_eq!(report.sections[0].body, prose);
    }

    #[test]
    fn prose_before_the_first_marker_is_not_dropped() {
        let raw = "Overall the contract is simple.\n\n## Security Vulnerabilities\nNone.\n";
        let report = format(
            &AnalysisResult::succeeded(raw),
            "a.sol",
            "digest",
            AuditMode::Detailed,
        )
        .unwrap();
        assert_eq!(report.sections[0].heading, "Overview");
        assert_eq!(report.sections[0].body, "Overall the contract is simple.");
        assert_eq!(report.sections[1].heading, "Security Vulnerabilities");
    }

    #[test]
    fn failed_analysis_propagates_the_reason() {
        let result = AnalysisResult::failed("rate limited after 3 attempts");
        match format(&result, "a.sol", "digest", AuditMode::Detailed) {
            Err(FormatError::AnalysisFailed(reason)) => {
                assert!(reason.contains("rate limited"))
            }
            Ok(_) => panic!("expected AnalysisFailed"),
        }
    }

    #[test]
    fn title_skips_blank_lines_and_markers() {
        let report = format(
            &AnalysisResult::succeeded("\n\n  \n...actual text"),
            "a.sol",
            "digest",
            AuditMode::Beginner,
        )
        .unwrap();
        assert_eq!(report.title, "...actual text");
    }

    #[test]
    fn source_digest_is_stable_and_twelve_chars() {
        let a = source_digest("contract A {}");
        let b = source_digest("contract A {}");
        let c = source_digest("contract B {}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
