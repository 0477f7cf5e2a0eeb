//! Configuration types for PDF splitting and metadata synthesis.
//!
//! All pipeline behaviour is controlled through [`SplitConfig`], built via its
//! [`SplitConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share configs, log them, and diff two runs to understand why their
//! section plans differ.

use crate::error::SplitError;
use crate::pipeline::llm::CompletionBackend;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Upper bound for `max_pages` (raised from 20 to 30 in the original tool).
pub const MAX_PAGES_LIMIT: usize = 30;

/// Browser-like User-Agent; several government portals refuse bare clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Configuration for one analyze/materialize run.
///
/// Built via [`SplitConfig::builder()`] or using [`SplitConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdfsplit::{FixedRangeParams, PlanStrategy, SplitConfig};
///
/// let config = SplitConfig::builder()
///     .strategy(PlanStrategy::Fixed)
///     .fixed_range(FixedRangeParams::new(3, 8))
///     .build()
///     .unwrap();
/// assert_eq!(config.fixed.max_pages, 8);
/// ```
#[derive(Clone)]
pub struct SplitConfig {
    /// Which boundary planner to run. Default: [`PlanStrategy::AiSuggested`].
    pub strategy: PlanStrategy,

    /// Bounds for the Fixed-Range planner; also the fallback plan's bounds.
    pub fixed: FixedRangeParams,

    /// Documents with this many pages or fewer get a "splitting is likely
    /// unnecessary" advisory. Default: 5.
    pub small_document_threshold: usize,

    /// Plan small documents anyway instead of short-circuiting to a single
    /// whole-document section. Default: false.
    pub split_small_documents: bool,

    /// Character budget of section text sent for metadata synthesis. Default: 8000.
    ///
    /// Truncation always keeps the start of the section.
    pub section_char_budget: usize,

    /// Sections with less trimmed text than this get placeholder metadata
    /// without an AI call. Default: 10.
    pub min_section_chars: usize,

    /// Sampling rule for the whole-document planning request.
    pub planning_sample: PlanningSample,

    /// An AI plan with more sections than this is rejected. Default: 15.
    pub max_ai_sections: usize,

    /// Pages read for the quick structure report. Default: 3.
    pub structure_sample_pages: usize,

    /// Ask the AI for a top-level document name. Default: true.
    pub suggest_document_name: bool,

    /// Use the AI collaborator at all. When false the run is fully offline:
    /// fixed-range boundaries and placeholder metadata. Default: true.
    pub ai_enabled: bool,

    /// LLM model identifier. If None, uses `gpt-4.1-nano` for named providers.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed completion backend. Takes precedence over everything;
    /// mostly useful for tests and custom middleware.
    pub backend: Option<Arc<dyn CompletionBackend>>,

    /// Sampling temperature for metadata calls. Default: 0.1.
    pub temperature: f32,

    /// Sampling temperature for the boundary planning call. Default: 0.3.
    pub planning_temperature: f32,

    /// Maximum tokens per metadata response. Default: 1000.
    pub max_tokens: usize,

    /// Maximum tokens for the planning response. Default: 2000.
    pub planning_max_tokens: usize,

    /// Retries per AI call after the first attempt. Default: 2.
    pub max_retries: u32,

    /// Initial AI retry delay in milliseconds, doubled per retry. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-AI-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom system prompt for metadata synthesis.
    pub system_prompt: Option<String>,

    /// Total timeout for one download attempt in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Download retries after the first attempt. Default: 3.
    pub download_max_retries: u32,

    /// Initial download retry delay in milliseconds, doubled per retry. Default: 1000.
    pub download_backoff_ms: u64,

    /// Payloads smaller than this are rejected as corrupt. Default: 1024.
    pub min_document_bytes: usize,

    /// User-Agent sent with downloads.
    pub user_agent: String,

    /// Directory for acquisition scratch files. Default: the system temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// Transcribe image-only pages through the AI collaborator. Default: false.
    pub ocr_fallback: bool,

    /// Pages with fewer extracted characters than this count as image-only. Default: 20.
    pub ocr_min_chars: usize,

    /// Longest edge in pixels when rasterising a page for OCR. Default: 2000.
    pub max_rendered_pixels: u32,

    /// File name of the manifest written next to the section PDFs.
    pub manifest_name: String,

    /// Section-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            strategy: PlanStrategy::default(),
            fixed: FixedRangeParams::default(),
            small_document_threshold: 5,
            split_small_documents: false,
            section_char_budget: 8000,
            min_section_chars: 10,
            planning_sample: PlanningSample::default(),
            max_ai_sections: 15,
            structure_sample_pages: 3,
            suggest_document_name: true,
            ai_enabled: true,
            model: None,
            provider_name: None,
            provider: None,
            backend: None,
            temperature: 0.1,
            planning_temperature: 0.3,
            max_tokens: 1000,
            planning_max_tokens: 2000,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            system_prompt: None,
            download_timeout_secs: 120,
            download_max_retries: 3,
            download_backoff_ms: 1000,
            min_document_bytes: 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            scratch_dir: None,
            ocr_fallback: false,
            ocr_min_chars: 20,
            max_rendered_pixels: 2000,
            manifest_name: "pdf_sections_metadata.json".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SplitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitConfig")
            .field("strategy", &self.strategy)
            .field("fixed", &self.fixed)
            .field("small_document_threshold", &self.small_document_threshold)
            .field("split_small_documents", &self.split_small_documents)
            .field("section_char_budget", &self.section_char_budget)
            .field("planning_sample", &self.planning_sample)
            .field("ai_enabled", &self.ai_enabled)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_max_retries", &self.download_max_retries)
            .field("ocr_fallback", &self.ocr_fallback)
            .finish()
    }
}

impl SplitConfig {
    /// Create a new builder for `SplitConfig`.
    pub fn builder() -> SplitConfigBuilder {
        SplitConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SplitConfig`].
#[derive(Debug)]
pub struct SplitConfigBuilder {
    config: SplitConfig,
}

impl SplitConfigBuilder {
    pub fn strategy(mut self, strategy: PlanStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn fixed_range(mut self, params: FixedRangeParams) -> Self {
        self.config.fixed = params;
        self
    }

    pub fn small_document_threshold(mut self, pages: usize) -> Self {
        self.config.small_document_threshold = pages;
        self
    }

    pub fn split_small_documents(mut self, v: bool) -> Self {
        self.config.split_small_documents = v;
        self
    }

    pub fn section_char_budget(mut self, chars: usize) -> Self {
        self.config.section_char_budget = chars.max(100);
        self
    }

    pub fn min_section_chars(mut self, chars: usize) -> Self {
        self.config.min_section_chars = chars;
        self
    }

    pub fn planning_sample(mut self, sample: PlanningSample) -> Self {
        self.config.planning_sample = sample;
        self
    }

    pub fn max_ai_sections(mut self, n: usize) -> Self {
        self.config.max_ai_sections = n.max(1);
        self
    }

    pub fn structure_sample_pages(mut self, n: usize) -> Self {
        self.config.structure_sample_pages = n.max(1);
        self
    }

    pub fn suggest_document_name(mut self, v: bool) -> Self {
        self.config.suggest_document_name = v;
        self
    }

    pub fn ai_enabled(mut self, v: bool) -> Self {
        self.config.ai_enabled = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn planning_temperature(mut self, t: f32) -> Self {
        self.config.planning_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn planning_max_tokens(mut self, n: usize) -> Self {
        self.config.planning_max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn download_max_retries(mut self, n: u32) -> Self {
        self.config.download_max_retries = n;
        self
    }

    pub fn download_backoff_ms(mut self, ms: u64) -> Self {
        self.config.download_backoff_ms = ms;
        self
    }

    pub fn min_document_bytes(mut self, bytes: usize) -> Self {
        self.config.min_document_bytes = bytes;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn ocr_fallback(mut self, v: bool) -> Self {
        self.config.ocr_fallback = v;
        self
    }

    pub fn ocr_min_chars(mut self, chars: usize) -> Self {
        self.config.ocr_min_chars = chars;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn manifest_name(mut self, name: impl Into<String>) -> Self {
        self.config.manifest_name = name.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SplitConfig, SplitError> {
        let c = &self.config;
        c.fixed.validate()?;
        if c.planning_sample.per_page_chars == 0 || c.planning_sample.char_budget == 0 {
            return Err(SplitError::InvalidConfig(
                "Planning sample budgets must be ≥ 1".into(),
            ));
        }
        let name = c.manifest_name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(SplitError::InvalidConfig(format!(
                "Manifest name must be a plain file name, got '{}'",
                c.manifest_name
            )));
        }
        Ok(self.config)
    }
}

// ── Enums & parameter structs ────────────────────────────────────────────

/// Boundary planning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStrategy {
    /// Deterministic ranges from page-count bounds only.
    Fixed,
    /// One AI planning call over sampled whole-document text. (default)
    #[default]
    AiSuggested,
}

impl fmt::Display for PlanStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStrategy::Fixed => f.write_str("fixed"),
            PlanStrategy::AiSuggested => f.write_str("ai_suggested"),
        }
    }
}

/// Page-count bounds for the Fixed-Range planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedRangeParams {
    pub min_pages: usize,
    pub max_pages: usize,
}

impl FixedRangeParams {
    pub fn new(min_pages: usize, max_pages: usize) -> Self {
        Self {
            min_pages,
            max_pages,
        }
    }

    /// Check `1 ≤ min_pages ≤ max_pages ≤ MAX_PAGES_LIMIT`.
    pub fn validate(&self) -> Result<(), SplitError> {
        if self.min_pages == 0 {
            return Err(SplitError::InvalidConfig("min_pages must be ≥ 1".into()));
        }
        if self.min_pages > self.max_pages {
            return Err(SplitError::InvalidConfig(format!(
                "min_pages ({}) must not exceed max_pages ({})",
                self.min_pages, self.max_pages
            )));
        }
        if self.max_pages > MAX_PAGES_LIMIT {
            return Err(SplitError::InvalidConfig(format!(
                "max_pages must be ≤ {MAX_PAGES_LIMIT}, got {}",
                self.max_pages
            )));
        }
        Ok(())
    }
}

impl Default for FixedRangeParams {
    fn default() -> Self {
        Self::new(3, 10)
    }
}

/// How whole-document text is sampled for the planning request.
///
/// Every selected page contributes at most `per_page_chars` characters. When
/// the document has more pages than fit in `char_budget`, pages are picked by
/// an even stride that always keeps the first and last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningSample {
    pub per_page_chars: usize,
    pub char_budget: usize,
}

impl Default for PlanningSample {
    fn default() -> Self {
        Self {
            per_page_chars: 500,
            char_budget: 12_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = SplitConfig::default();
        assert_eq!(c.fixed, FixedRangeParams::new(3, 10));
        assert_eq!(c.section_char_budget, 8000);
        assert_eq!(c.download_max_retries, 3);
        assert_eq!(c.download_timeout_secs, 120);
        assert_eq!(c.api_timeout_secs, 120);
        assert_eq!(c.manifest_name, "pdf_sections_metadata.json");
        assert_eq!(c.strategy, PlanStrategy::AiSuggested);
    }

    #[test]
    fn builder_rejects_min_above_max() {
        let err = SplitConfig::builder()
            .fixed_range(FixedRangeParams::new(6, 4))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("min_pages"));
    }

    #[test]
    fn builder_rejects_max_above_limit() {
        assert!(SplitConfig::builder()
            .fixed_range(FixedRangeParams::new(3, 31))
            .build()
            .is_err());
        assert!(SplitConfig::builder()
            .fixed_range(FixedRangeParams::new(3, 30))
            .build()
            .is_ok());
    }

    #[test]
    fn builder_rejects_manifest_path() {
        assert!(SplitConfig::builder()
            .manifest_name("../escape.json")
            .build()
            .is_err());
    }

    #[test]
    fn strategy_serialises_snake_case() {
        let json = serde_json::to_string(&PlanStrategy::AiSuggested).unwrap();
        assert_eq!(json, "\"ai_suggested\"");
    }
}
