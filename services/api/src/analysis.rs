//! services/api/src/analysis.rs
//!
//! The retrying analysis client. It owns the retry, backoff, and timeout
//! policy for the external completion service and implements the core
//! `AnalysisService` port on top of a single-attempt `CompletionApi`.

use std::cmp;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use solaudit_core::domain::{AnalysisRequest, AnalysisResult};
use solaudit_core::ports::{AnalysisService, PortError, PortResult};

/// One attempt against the completion service: prompt in, raw text out.
/// Implementations map their transport errors onto `PortError` so the
/// retry loop can classify them.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn complete(&self, request: &AnalysisRequest) -> PortResult<String>;
}

/// Bounds for the retry loop.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub request_timeout: Duration,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    const BACKOFF_CAP: Duration = Duration::from_secs(30);

    /// Exponential backoff after the given (1-based) attempt, capped.
    fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        cmp::min(
            self.backoff_base.saturating_mul(factor),
            Self::BACKOFF_CAP,
        )
    }
}

/// Wraps a `CompletionApi` with the session-facing retry contract:
/// transient failures are retried and, once the attempt budget is spent,
/// absorbed into `AnalysisResult::Failed`; configuration failures abort
/// immediately.
pub struct RetryingAnalysisClient {
    api: Arc<dyn CompletionApi>,
    policy: RetryPolicy,
}

impl RetryingAnalysisClient {
    pub fn new(api: Arc<dyn CompletionApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    async fn attempt(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> PortResult<String> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PortError::Unexpected("analysis cancelled".to_string())),
            outcome = tokio::time::timeout(self.policy.request_timeout, self.api.complete(request)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(PortError::Timeout(format!(
                        "no completion within {:?}",
                        self.policy.request_timeout
                    ))),
                }
            }
        }
    }
}

#[async_trait]
impl AnalysisService for RetryingAnalysisClient {
    async fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> PortResult<AnalysisResult> {
        let max_attempts = cmp::max(self.policy.max_attempts, 1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Ok(AnalysisResult::failed("analysis cancelled"));
            }

            match self.attempt(request, cancel).await {
                Ok(text) => return Ok(AnalysisResult::succeeded(text)),
                Err(PortError::Configuration(reason)) => {
                    return Err(PortError::Configuration(reason));
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "completion attempt failed"
                    );
                    last_error = e.to_string();
                    if attempt < max_attempts && !cancel.is_cancelled() {
                        tokio::time::sleep(self.policy.backoff_after(attempt)).await;
                    }
                }
            }
        }

        Ok(AnalysisResult::failed(format!(
            "{} (after {} attempts)",
            last_error, max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solaudit_core::domain::AuditMode;
    use std::sync::Mutex;

    /// Pops one scripted outcome per call; panics if called too often.
    struct ScriptedApi {
        script: Mutex<Vec<PortResult<String>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedApi {
        fn new(script: Vec<PortResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            })
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl CompletionApi for ScriptedApi {
        async fn complete(&self, _request: &AnalysisRequest) -> PortResult<String> {
            *self.calls.lock().unwrap() += 1;
            self.script.lock().unwrap().remove(0)
        }
    }

    /// Never resolves; used to exercise the per-attempt timeout.
    struct HangingApi;

    #[async_trait]
    impl CompletionApi for HangingApi {
        async fn complete(&self, _request: &AnalysisRequest) -> PortResult<String> {
            std::future::pending().await
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            prompt: "audit this".to_string(),
            mode: AuditMode::Detailed,
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            request_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_below_the_cap_are_invisible() {
        let api = ScriptedApi::new(vec![
            Err(PortError::RateLimited("429".to_string())),
            Err(PortError::ServiceUnavailable("502".to_string())),
            Ok("## Security Vulnerabilities\nNone.".to_string()),
        ]);
        let client = RetryingAnalysisClient::new(api.clone(), policy(3));

        let result = client
            .analyze(&request(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(result, AnalysisResult::Succeeded(_)));
        assert_eq!(api.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_a_failed_result_not_an_error() {
        let api = ScriptedApi::new(vec![
            Err(PortError::RateLimited("429".to_string())),
            Err(PortError::RateLimited("429".to_string())),
            Err(PortError::RateLimited("429".to_string())),
        ]);
        let client = RetryingAnalysisClient::new(api.clone(), policy(3));

        let result = client
            .analyze(&request(), &CancellationToken::new())
            .await
            .unwrap();

        match result {
            AnalysisResult::Failed(reason) => {
                assert!(reason.contains("after 3 attempts"), "got: {}", reason)
            }
            AnalysisResult::Succeeded(_) => panic!("expected failure after exhaustion"),
        }
        assert_eq!(api.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn configuration_errors_are_not_retried() {
        let api = ScriptedApi::new(vec![Err(PortError::Configuration(
            "invalid api key".to_string(),
        ))]);
        let client = RetryingAnalysisClient::new(api.clone(), policy(3));

        let err = client
            .analyze(&request(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PortError::Configuration(_)));
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_calls_time_out_and_count_as_transient() {
        let client = RetryingAnalysisClient::new(Arc::new(HangingApi), policy(2));

        let result = client
            .analyze(&request(), &CancellationToken::new())
            .await
            .unwrap();

        match result {
            AnalysisResult::Failed(reason) => assert!(reason.contains("no completion within")),
            AnalysisResult::Succeeded(_) => panic!("expected timeout failure"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_the_in_flight_call() {
        let client = RetryingAnalysisClient::new(Arc::new(HangingApi), policy(3));
        let cancel = CancellationToken::new();
        let request = request();

        let pending = client.analyze(&request, &cancel);
        cancel.cancel();
        let result = pending.await.unwrap();

        assert!(matches!(result, AnalysisResult::Failed(_)));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            request_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff_after(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_after(2), Duration::from_secs(1));
        assert_eq!(policy.backoff_after(3), Duration::from_secs(2));
        assert_eq!(policy.backoff_after(30), RetryPolicy::BACKOFF_CAP);
    }
}
