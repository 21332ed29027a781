//! Retry with exponential backoff around model calls

use crate::llm::{ChatRequest, ChatResponse, LanguageModelClient, LlmError};
use std::time::Duration;
use tracing::warn;

/// How many times to call the model and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; treated as 1 when 0
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay after the failed attempt `k` (0-based): `base_delay * 2^k`.
    pub fn delay_for(&self, k: u32) -> Duration {
        let factor = 1u32.checked_shl(k).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Call the model until it answers, a client fault occurs, or attempts
    /// run out. Returns the last error in the failure cases.
    pub async fn call(
        &self,
        client: &dyn LanguageModelClient,
        request: &ChatRequest,
    ) -> Result<ChatResponse, LlmError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match client.complete(request).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() => {
                    warn!(model = client.model_name(), error = %e, "model call failed with client fault; not retrying");
                    return Err(e);
                }
                Err(e) => {
                    if attempt + 1 >= attempts {
                        warn!(model = client.model_name(), attempts, error = %e, "model call failed; attempts exhausted");
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt);
                    warn!(
                        model = client.model_name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "model call failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, MockClient};
    use tokio::time::Instant;

    fn request() -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user("enrich")])
    }

    #[test]
    fn delays_double_from_base() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn huge_exponent_saturates() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        assert_eq!(policy.delay_for(40), Duration::from_secs(u32::MAX as u64));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_exhausts_attempts_with_backoff() {
        let client = MockClient::failing(LlmError::Unavailable("overloaded".to_string()));
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));

        let start = Instant::now();
        let result = policy.call(&client, &request()).await;

        assert!(matches!(result, Err(LlmError::Unavailable(_))));
        assert_eq!(client.calls(), 3);
        // 1000ms + 2000ms; no sleep after the final attempt
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn client_fault_is_not_retried() {
        let client = MockClient::failing(LlmError::Api {
            status: 401,
            message: "bad key".to_string(),
        });
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));

        let start = Instant::now();
        let result = policy.call(&client, &request()).await;

        assert!(matches!(result, Err(LlmError::Api { status: 401, .. })));
        assert_eq!(client.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let client = MockClient::new()
            .with_failure(LlmError::RateLimited { retry_after_secs: None })
            .with_reply("{\"ratings\": []}");
        let policy = RetryPolicy::new(3, Duration::from_millis(500));

        let response = policy.call(&client, &request()).await.unwrap();

        assert_eq!(response.content, "{\"ratings\": []}");
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_calls_once() {
        let client = MockClient::failing(LlmError::Transport("reset".to_string()));
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert!(policy.call(&client, &request()).await.is_err());
        assert_eq!(client.calls(), 1);
    }
}
