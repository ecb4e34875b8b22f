//! Retrying oracle client
//!
//! One oracle call per agent turn. Transient failures (network, 5xx, 429)
//! are retried with jittered exponential backoff; anything else, or
//! exhaustion of the retry budget, surfaces to the engine which then fails
//! the investigation.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

use oats_core::config;

use crate::anthropic::AnthropicClient;
use crate::openai::OpenAiClient;
use crate::provider::{
    ChatMessage, CompletionRequest, LlmError, LlmProvider, ProviderType,
};

/// The oracle as the reasoning engine sees it: system prompt in, raw reply
/// text out.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, system_prompt: &str) -> Result<String, LlmError>;
}

/// Retry policy for oracle calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_jitter: Duration::from_millis(250),
        }
    }
}

/// Client-side timeout for one completion request.
pub const ORACLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Concrete oracle backed by a provider.
pub struct OracleClient {
    provider: Box<dyn LlmProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryConfig,
}

impl OracleClient {
    pub fn new(provider: Box<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: config::DEFAULT_TEMPERATURE,
            max_tokens: config::DEFAULT_MAX_TOKENS,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Build the oracle from the worker environment.
    ///
    /// Provider selection: `UFFLOW_LLM_PROVIDER` if set, otherwise whichever
    /// API key is present (Anthropic wins when both are).
    pub fn from_env() -> Result<Self, LlmError> {
        let provider_type = match config::get_config_opt(config::ENV_LLM_PROVIDER) {
            Some(name) => name
                .parse::<ProviderType>()
                .map_err(LlmError::MissingKey)?,
            None => {
                if std::env::var("ANTHROPIC_API_KEY").is_ok() {
                    ProviderType::Anthropic
                } else if std::env::var("OPENAI_API_KEY").is_ok() {
                    ProviderType::OpenAi
                } else {
                    return Err(LlmError::MissingKey(
                        "neither ANTHROPIC_API_KEY nor OPENAI_API_KEY is set".to_string(),
                    ));
                }
            }
        };

        let (provider, default_model): (Box<dyn LlmProvider>, &str) = match provider_type {
            ProviderType::Anthropic => (
                Box::new(AnthropicClient::from_env(ORACLE_TIMEOUT)?),
                crate::anthropic::DEFAULT_MODEL,
            ),
            ProviderType::OpenAi => (
                Box::new(OpenAiClient::from_env(ORACLE_TIMEOUT)?),
                crate::openai::DEFAULT_MODEL,
            ),
        };

        let model = config::get_config(config::ENV_LLM_MODEL, default_model);
        let temperature =
            config::get_config_float(config::ENV_TEMPERATURE, config::DEFAULT_TEMPERATURE as f64) as f32;
        let max_tokens =
            config::get_config_int(config::ENV_MAX_TOKENS, config::DEFAULT_MAX_TOKENS as i64) as u32;

        Ok(Self::new(provider, model)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens))
    }
}

#[async_trait]
impl Oracle for OracleClient {
    async fn complete(&self, system_prompt: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user("Execute the current turn. Reply with the single JSON object only."),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut attempt = 0u32;
        loop {
            match self.provider.complete(&request).await {
                Ok(response) => {
                    debug!(
                        "Oracle reply: {} chars from {}",
                        response.content.len(),
                        response.model
                    );
                    return Ok(response.content);
                }
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    let backoff = self.retry.base_delay * 2u32.pow(attempt);
                    let jitter = Duration::from_millis(
                        rand::thread_rng().gen_range(0..=self.retry.max_jitter.as_millis() as u64),
                    );
                    warn!(
                        "Oracle call failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt + 1,
                        self.retry.max_attempts,
                        e,
                        backoff + jitter
                    );
                    tokio::time::sleep(backoff + jitter).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CompletionResponse, ProviderType};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Provider that fails transiently N times before succeeding.
    struct FlakyProvider {
        failures: u32,
        calls: Arc<AtomicU32>,
        transient: bool,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn provider_type(&self) -> ProviderType {
            ProviderType::Anthropic
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.transient {
                    Err(LlmError::Api { status: 503, body: "overloaded".to_string() })
                } else {
                    Err(LlmError::Api { status: 401, body: "bad key".to_string() })
                }
            } else {
                Ok(CompletionResponse {
                    content: "{\"ok\":true}".to_string(),
                    model: "test".to_string(),
                    usage: None,
                })
            }
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_jitter: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let oracle = OracleClient::new(
            Box::new(FlakyProvider { failures: 2, calls: calls.clone(), transient: true }),
            "test-model",
        )
        .with_retry(fast_retry());

        let reply = oracle.complete("prompt").await.unwrap();
        assert_eq!(reply, "{\"ok\":true}");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let oracle = OracleClient::new(
            Box::new(FlakyProvider { failures: 10, calls: calls.clone(), transient: true }),
            "test-model",
        )
        .with_retry(fast_retry());

        let err = oracle.complete("prompt").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_failures_do_not_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let oracle = OracleClient::new(
            Box::new(FlakyProvider { failures: 10, calls: calls.clone(), transient: false }),
            "test-model",
        )
        .with_retry(fast_retry());

        let err = oracle.complete("prompt").await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
