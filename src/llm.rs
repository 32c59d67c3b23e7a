//! LLM provider abstraction
//!
//! Provides a common interface over the hosted model used for replies.

mod error;
mod gemini;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::GeminiService;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Model used when `ECOBOT_MODEL` is not set
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Configuration for the upstream provider
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    /// Gateway base URL; the gateway supplies credentials itself
    pub gateway: Option<String>,
    pub model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("GOOGLE_API_KEY"))
                .ok()
                .filter(|k| !k.is_empty()),
            gateway: std::env::var("LLM_GATEWAY").ok().filter(|g| !g.is_empty()),
            model: std::env::var("ECOBOT_MODEL").ok().filter(|m| !m.is_empty()),
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Whether requests can be authenticated at all
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() || self.gateway.is_some()
    }

    /// Build the provider, wrapped with request logging
    pub fn build(&self) -> Result<Arc<dyn LlmService>, LlmError> {
        let api_key = if self.gateway.is_some() {
            None
        } else {
            self.api_key.clone()
        };
        let service = GeminiService::new(api_key, self.model(), self.gateway.as_deref())?;
        Ok(Arc::new(LoggingService::new(Arc::new(service))))
    }
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    history_len = request.messages.len(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    truncated = response.truncated(),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
