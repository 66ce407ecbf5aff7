//! crates/solaudit_core/src/prompt.rs
//!
//! Composes completion requests from contract text and the selected
//! audit mode. Building is deterministic: the same text and mode always
//! produce the same request.

use crate::domain::{AnalysisRequest, AuditMode, ContractSource, Report};

const DETAILED_TEMPLATE: &str = r#"You are a professional smart contract auditor with strong expertise in Solidity and blockchain security.

Analyze the following Solidity smart contract and produce a concise, structured markdown report with three sections:
1. **Security Vulnerabilities** (enumerate issues, include SWC IDs if relevant)
2. **Gas Optimization Opportunities**
3. **Code Quality Improvements**

For every issue, include:
- A short description
- Why it matters
- A concrete fix or code snippet (when helpful)

Prefer modern best practices for Solidity ^0.8.x:
- Checks-Effects-Interactions
- `call{value: ...}("")` with boolean check (do not recommend `.transfer` as a blanket fix)
- Consider `ReentrancyGuard` from OpenZeppelin where applicable
- Emit events for critical state changes

Smart Contract:
```solidity
{contract}
```"#;

const BEGINNER_TEMPLATE: &str = r#"You are a helpful teacher explaining smart contract security to a beginner.

Read the following Solidity smart contract and explain, in clear and simple language, what it does and what could go wrong:

Guidelines:
- Avoid heavy jargon; define unavoidable terms briefly
- Point out anything risky about how the contract handles funds or permissions
- Keep the structure light (short paragraphs or bullets)
- Be concise and friendly

Smart Contract:
```solidity
{contract}
```"#;

const SIMPLIFY_TEMPLATE: &str = r#"You are a helpful teacher explaining smart contract security to a beginner.
Rewrite the following audit in clear, simple language:

Guidelines:
- Keep structure (headings / bullets) where it helps readability
- Avoid heavy jargon; define unavoidable terms briefly
- Be concise and friendly

Audit to simplify:
{report}"#;

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("contract is {size} bytes, which exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },
}

/// Builds the outbound analysis request for a contract. Never truncates:
/// a contract over the limit is rejected instead.
pub fn build(
    source: &ContractSource,
    mode: AuditMode,
    max_bytes: usize,
) -> Result<AnalysisRequest, PromptError> {
    if source.size_bytes > max_bytes {
        return Err(PromptError::PayloadTooLarge {
            size: source.size_bytes,
            limit: max_bytes,
        });
    }

    let template = match mode {
        AuditMode::Detailed => DETAILED_TEMPLATE,
        AuditMode::Beginner => BEGINNER_TEMPLATE,
    };

    Ok(AnalysisRequest {
        prompt: template.replace("{contract}", &source.text),
        mode,
    })
}

/// Builds a request that rewrites an existing report in plain language.
/// The result is always a beginner-mode request.
pub fn build_simplify(report: &Report) -> AnalysisRequest {
    AnalysisRequest {
        prompt: SIMPLIFY_TEMPLATE.replace("{report}", &report.rendered()),
        mode: AuditMode::Beginner,
    }
}
