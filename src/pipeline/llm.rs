//! AI collaborator: the completion seam plus timeout/retry handling.
//!
//! Every AI call in the pipeline goes through [`call_with_retry`]: each
//! attempt gets its own `tokio::time::timeout`, failures back off
//! exponentially (`retry_backoff_ms * 2^(attempt-1)`), and the final error is
//! returned as a value so the caller can pick its fallback. Nothing here
//! aborts the run.
//!
//! [`ProviderBackend`] adapts any `edgequake_llm::LLMProvider`; tests and
//! custom middleware implement [`CompletionBackend`] directly.

use crate::config::SplitConfig;
use crate::pipeline::acquire::retry_delay;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// One text-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// A successful completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Anything that can answer a text prompt (and optionally read a page image).
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short label for logs, e.g. `openai/gpt-4.1-nano`.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, String>;

    /// Transcribe a rendered page. Backends without vision support keep the default.
    async fn transcribe_page(
        &self,
        image: ImageData,
        prompt: &str,
        max_tokens: usize,
    ) -> Result<Completion, String> {
        let _ = (image, prompt, max_tokens);
        Err(format!("backend '{}' does not support page images", self.name()))
    }
}

/// [`CompletionBackend`] over an `edgequake_llm` provider.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderBackend {
    /// `label` is only used in logs, e.g. `openai/gpt-4.1-nano`.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl CompletionBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, String> {
        let messages = vec![
            ChatMessage::system(request.system.as_str()),
            ChatMessage::user(request.user.as_str()),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| e.to_string())?;
        Ok(Completion {
            content: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }

    async fn transcribe_page(
        &self,
        image: ImageData,
        prompt: &str,
        max_tokens: usize,
    ) -> Result<Completion, String> {
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image])];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(max_tokens),
            ..Default::default()
        };
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| e.to_string())?;
        Ok(Completion {
            content: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}

/// Why a retried call gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Every attempt hit the per-call timeout.
    TimedOut { attempts: u32, secs: u64 },
    /// At least one attempt failed with an error; `detail` is the last one.
    Failed { attempts: u32, detail: String },
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::TimedOut { attempts, secs } => {
                write!(f, "timed out after {secs}s on all {attempts} attempts")
            }
            CallError::Failed { attempts, detail } => {
                write!(f, "failed after {attempts} attempts: {detail}")
            }
        }
    }
}

/// Wait before retry `attempt` (1-based); saturates instead of overflowing.
fn retry_backoff(config: &SplitConfig, attempt: u32) -> Duration {
    retry_delay(config.retry_backoff_ms, attempt)
}

/// Run one AI request with the configured timeout and bounded retry.
///
/// `label` identifies the call in logs (e.g. `section 3`).
pub async fn call_with_retry(
    backend: &dyn CompletionBackend,
    request: &CompletionRequest,
    config: &SplitConfig,
    label: &str,
) -> Result<Completion, CallError> {
    let start = Instant::now();
    let per_call = Duration::from_secs(config.api_timeout_secs);
    let attempts = config.max_retries + 1;
    let mut last_err: Option<String> = None;
    let mut all_timeouts = true;

    for attempt in 0..attempts {
        if attempt > 0 {
            let backoff = retry_backoff(config, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label,
                attempt,
                config.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        match timeout(per_call, backend.complete(request)).await {
            Ok(Ok(completion)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    label,
                    completion.input_tokens,
                    completion.output_tokens,
                    start.elapsed()
                );
                return Ok(completion);
            }
            Ok(Err(e)) => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                all_timeouts = false;
                last_err = Some(e);
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {}s",
                    label,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(format!("timed out after {}s", config.api_timeout_secs));
            }
        }
    }

    if all_timeouts {
        Err(CallError::TimedOut {
            attempts,
            secs: config.api_timeout_secs,
        })
    } else {
        Err(CallError::Failed {
            attempts,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// Slice the first balanced JSON object out of free-form model output.
///
/// Handles markdown fences and chatter before/after the object; braces
/// inside string literals are skipped.
pub fn extract_json_object(text: &str) -> Option<&str> {
    extract_balanced(text, '{', '}')
}

/// Slice the first balanced JSON array out of free-form model output.
pub fn extract_json_array(text: &str) -> Option<&str> {
    extract_balanced(text, '[', ']')
}

fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
