//! services/api/src/adapters/audit_llm.rs
//!
//! This module contains the adapter for the audit LLM. It implements the
//! single-attempt `CompletionApi` used by the retrying analysis client;
//! retry policy lives in `crate::analysis`, not here.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;

use crate::analysis::CompletionApi;
use solaudit_core::domain::{AnalysisRequest, AuditMode};
use solaudit_core::ports::{PortError, PortResult};

const TEMPERATURE: f32 = 0.3;
const DETAILED_MAX_TOKENS: u32 = 1800;
const BEGINNER_MAX_TOKENS: u32 = 1200;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CompletionApi` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiCompletionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCompletionAdapter {
    /// Creates a new `OpenAiCompletionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn max_tokens_for(mode: AuditMode) -> u32 {
    match mode {
        AuditMode::Detailed => DETAILED_MAX_TOKENS,
        AuditMode::Beginner => BEGINNER_MAX_TOKENS,
    }
}

/// Maps an `OpenAIError` onto the port error taxonomy so the retry loop
/// can tell retryable failures from configuration problems.
fn classify_error(err: OpenAIError) -> PortError {
    match err {
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.clone().unwrap_or_default();
            let haystack = format!("{} {}", kind, api.message).to_lowercase();
            if haystack.contains("api key")
                || haystack.contains("api_key")
                || haystack.contains("authentication")
                || haystack.contains("insufficient_quota")
            {
                PortError::Configuration(api.message)
            } else if haystack.contains("rate limit") || haystack.contains("rate_limit") {
                PortError::RateLimited(api.message)
            } else if haystack.contains("timeout") {
                PortError::Timeout(api.message)
            } else {
                // Server-side errors and anything unrecognized: worth a retry.
                PortError::ServiceUnavailable(api.message)
            }
        }
        other => {
            // Transport-level failures (connection, TLS, body decoding).
            // The display text is the stable surface to classify on.
            let text = other.to_string();
            let lower = text.to_lowercase();
            if lower.contains("timeout") || lower.contains("timed out") {
                PortError::Timeout(text)
            } else if lower.contains("http error") || lower.contains("connect") {
                PortError::ServiceUnavailable(text)
            } else {
                PortError::Unexpected(text)
            }
        }
    }
}

//=========================================================================================
// `CompletionApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionApi for OpenAiCompletionAdapter {
    /// Sends one composed audit prompt to the model and returns the raw
    /// completion text.
    async fn complete(&self, request: &AnalysisRequest) -> PortResult<String> {
        let messages = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(request.prompt.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into()];

        let completion_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(TEMPERATURE)
            .max_tokens(max_tokens_for(request.mode))
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(completion_request)
            .await
            .map_err(classify_error)?;

        // Extract the text content from the first choice in the response.
        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content.trim().to_string())
            } else {
                Err(PortError::Unexpected(
                    "Audit LLM response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Unexpected(
                "Audit LLM returned no choices in its response.".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(kind: &str, message: &str) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: message.to_string(),
            r#type: Some(kind.to_string()),
            param: None,
            code: None,
        })
    }

    #[test]
    fn auth_failures_classify_as_configuration() {
        let err = classify_error(api_error(
            "invalid_request_error",
            "Incorrect API key provided",
        ));
        assert!(matches!(err, PortError::Configuration(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn rate_limits_classify_as_transient() {
        let err = classify_error(api_error("rate_limit_exceeded", "Rate limit reached"));
        assert!(matches!(err, PortError::RateLimited(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn server_errors_classify_as_transient() {
        let err = classify_error(api_error("server_error", "The server is overloaded"));
        assert!(matches!(err, PortError::ServiceUnavailable(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn quota_exhaustion_is_not_retried() {
        let err = classify_error(api_error(
            "insufficient_quota",
            "You exceeded your current quota",
        ));
        assert!(matches!(err, PortError::Configuration(_)));
    }

    #[test]
    fn beginner_mode_uses_the_smaller_token_budget() {
        assert_eq!(max_tokens_for(AuditMode::Detailed), 1800);
        assert_eq!(max_tokens_for(AuditMode::Beginner), 1200);
    }
}
