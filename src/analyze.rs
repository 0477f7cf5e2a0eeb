//! Phase-1 entry points: acquire, read, plan and annotate a document.
//!
//! [`analyze`] and friends never write outside the scratch directory. Their
//! product, [`AnalysisResult`], is a plain value that a person can review
//! or edit before [`materialize`] (phase 2) writes any files.

use crate::config::SplitConfig;
use crate::error::{SplitError, SynthesisFailure};
use crate::output::{
    AnalysisResult, AnalysisStats, AnalyzedSection, SourceInfo, SplitOutput,
    ANALYSIS_SCHEMA_VERSION,
};
use crate::pipeline::acquire::{acquire, AcquiredDocument, DocumentSource};
use crate::pipeline::llm::{CompletionBackend, ProviderBackend};
use crate::pipeline::materialize::materialize_document;
use crate::pipeline::ocr::{image_only_pages, ocr_pages};
use crate::pipeline::plan::plan_sections;
use crate::pipeline::structure::{structure_report, SourceDocument, StructureReport};
use crate::pipeline::synthesize::{suggest_document_title, synthesize_section};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub use crate::pipeline::materialize::materialize;

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Pages whose opening text feeds the document name suggestion.
const TITLE_SAMPLE_PAGES: usize = 3;

/// Phase-1 output together with the live document it was computed from.
///
/// Keeps the parsed document and scratch file alive so phase 2 can run
/// without re-acquiring; [`AnalyzedDocument::result`] is the serialisable part.
#[derive(Debug)]
pub struct AnalyzedDocument {
    pub result: AnalysisResult,
    pub acquired: AcquiredDocument,
    pub(crate) document: Arc<SourceDocument>,
}

impl AnalyzedDocument {
    /// Write the section files for `self.result`.
    pub async fn materialize(
        &self,
        out_dir: impl AsRef<Path>,
        config: &SplitConfig,
    ) -> Result<SplitOutput, SplitError> {
        materialize_document(
            Arc::clone(&self.document),
            &self.result,
            out_dir.as_ref(),
            config,
        )
        .await
    }
}

/// Analyze a PDF given as a local path or HTTP/HTTPS URL.
///
/// # Errors
/// Only document-level failures are returned: acquisition, unreadable PDF,
/// or an explicitly named provider that cannot be created. AI problems
/// (planning, per-section metadata) are absorbed and listed as warnings.
pub async fn analyze(
    input: impl AsRef<str>,
    config: &SplitConfig,
) -> Result<AnalysisResult, SplitError> {
    let analyzed = analyze_source(DocumentSource::from_input(input.as_ref()), config).await?;
    Ok(analyzed.result)
}

/// Analyze in-memory PDF bytes; `name` is the original file name.
pub async fn analyze_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    config: &SplitConfig,
) -> Result<AnalyzedDocument, SplitError> {
    analyze_source(DocumentSource::bytes(name, bytes), config).await
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input: impl AsRef<str>,
    config: &SplitConfig,
) -> Result<AnalysisResult, SplitError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SplitError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(analyze(input, config))
}

/// Analyze any [`DocumentSource`], keeping the document for phase 2.
pub async fn analyze_source(
    source: DocumentSource,
    config: &SplitConfig,
) -> Result<AnalyzedDocument, SplitError> {
    let start = Instant::now();
    let backend = resolve_backend(config)?;
    let acquired = acquire(source, config).await?;
    info!("Analyzing '{}' ({} bytes)", acquired.name, acquired.bytes.len());

    let mut warnings: Vec<String> = Vec::new();
    if backend.is_none() {
        let w = format!(
            "{}: boundaries use fixed ranges and metadata uses placeholders",
            if config.ai_enabled {
                "no AI provider available"
            } else {
                "AI disabled"
            }
        );
        warn!("{w}");
        warnings.push(w);
    }

    // ── Step 1: Parse and extract text ───────────────────────────────────
    let (document, mut texts) = load_with_text(&acquired).await?;
    let page_count = document.page_count();

    // ── Step 2: OCR image-only pages (opt-in) ────────────────────────────
    let mut ocr_pages_used = 0;
    let mut ocr_tokens = (0u64, 0u64);
    if config.ocr_fallback {
        let candidates = image_only_pages(&texts, config.ocr_min_chars);
        match (&backend, candidates.is_empty()) {
            (_, true) => {}
            (Some(b), false) => {
                let report =
                    ocr_pages(Arc::new(acquired.bytes.clone()), &candidates, b.as_ref(), config)
                        .await;
                ocr_pages_used = report.pages.len();
                ocr_tokens = (report.input_tokens, report.output_tokens);
                for (index, text) in report.pages {
                    texts[index] = text;
                }
                warnings.extend(report.warnings);
            }
            (None, false) => warnings.push(format!(
                "OCR fallback requested for {} page(s) but no AI provider is available",
                candidates.len()
            )),
        }
    }
    for (index, text) in texts.into_iter().enumerate() {
        document.prime_page_text(index, text);
    }

    // ── Step 3: Plan boundaries ──────────────────────────────────────────
    let page_texts = document.all_page_texts();
    let outcome = plan_sections(&page_texts, backend.as_deref(), config).await;
    warnings.extend(outcome.warnings.iter().cloned());
    let total = outcome.plans.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_start(page_count, total);
    }

    // ── Step 4: Synthesize metadata, one section at a time ───────────────
    let mut input_tokens = outcome.input_tokens + ocr_tokens.0;
    let mut output_tokens = outcome.output_tokens + ocr_tokens.1;
    let mut sections = Vec::with_capacity(total);
    for (i, plan) in outcome.plans.into_iter().enumerate() {
        let index = i + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_section_start(index, total);
        }
        let text = document.range_text(plan.start_page, plan.end_page);
        let (synth, usage) = synthesize_section(&plan, &text, backend.as_deref(), config).await;
        input_tokens += usage.input;
        output_tokens += usage.output;

        let (metadata, warning) = synth.into_metadata(&plan);
        match (&warning, &config.progress_callback) {
            (Some(reason), Some(cb)) => cb.on_section_fallback(index, total, reason),
            (None, Some(cb)) => cb.on_section_complete(index, total, &metadata.title),
            _ => {}
        }
        if let Some(ref reason) = warning {
            warn!("Section {} (pages {}): {}", index, plan.label(), reason);
        }
        sections.push(AnalyzedSection {
            index,
            plan,
            metadata,
            warnings: warning.into_iter().collect(),
        });
    }

    // ── Step 5: Whole-document name ──────────────────────────────────────
    let mut document_title = None;
    if config.suggest_document_name {
        let opening = document.sample_text(TITLE_SAMPLE_PAGES, usize::MAX);
        let (title, usage) =
            suggest_document_title(page_count, &opening, backend.as_deref(), config).await;
        input_tokens += usage.input;
        output_tokens += usage.output;
        match title {
            Ok(t) => document_title = Some(t),
            Err(SynthesisFailure::Unavailable) => {}
            Err(e) => warnings.push(format!("document title: {e}")),
        }
    }

    let generated = sections.iter().filter(|s| !s.metadata.fallback).count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_complete(total, generated);
    }

    let stats = AnalysisStats {
        page_count,
        section_count: total,
        strategy: config.strategy,
        strategy_used: outcome.strategy_used,
        fixed_params: outcome.fixed_params,
        generated_sections: generated,
        fallback_sections: total - generated,
        ocr_pages: ocr_pages_used,
        total_input_tokens: input_tokens,
        total_output_tokens: output_tokens,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Analysis complete: {} pages → {} sections ({} with AI metadata), {}ms",
        page_count, total, generated, stats.duration_ms
    );

    let result = AnalysisResult {
        schema_version: ANALYSIS_SCHEMA_VERSION,
        source: SourceInfo {
            name: acquired.name.clone(),
            byte_size: acquired.bytes.len() as u64,
        },
        document_title,
        advisory: outcome.advisory,
        stats,
        sections,
        warnings,
    };

    Ok(AnalyzedDocument {
        result,
        acquired,
        document,
    })
}

/// Quick structure report: page count, sample text, Info metadata.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    input: impl AsRef<str>,
    config: &SplitConfig,
) -> Result<StructureReport, SplitError> {
    let acquired = acquire(DocumentSource::from_input(input.as_ref()), config).await?;
    let sample_pages = config.structure_sample_pages;
    let threshold = config.small_document_threshold;
    let name = acquired.name.clone();
    let bytes = acquired.bytes.clone();
    tokio::task::spawn_blocking(move || {
        let doc = SourceDocument::load(&name, &bytes)?;
        Ok(structure_report(&doc, sample_pages, threshold))
    })
    .await
    .map_err(|e| SplitError::Internal(format!("Inspect task panicked: {e}")))?
}

/// Analyze and materialize in one go, without a confirmation step.
pub async fn split_to_dir(
    input: impl AsRef<str>,
    out_dir: impl AsRef<Path>,
    config: &SplitConfig,
) -> Result<SplitOutput, SplitError> {
    let analyzed = analyze_source(DocumentSource::from_input(input.as_ref()), config).await?;
    analyzed.materialize(out_dir, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn load_with_text(
    acquired: &AcquiredDocument,
) -> Result<(Arc<SourceDocument>, Vec<String>), SplitError> {
    let name = acquired.name.clone();
    let bytes = acquired.bytes.clone();
    tokio::task::spawn_blocking(move || {
        let doc = SourceDocument::load(&name, &bytes)?;
        let texts = (0..doc.page_count()).map(|i| doc.extract_page(i)).collect();
        Ok((Arc::new(doc), texts))
    })
    .await
    .map_err(|e| SplitError::Internal(format!("Load task panicked: {e}")))?
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, SplitError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SplitError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the AI collaborator, from most-specific to least-specific:
///
/// 1. `config.backend`: a ready [`CompletionBackend`] (tests, middleware)
/// 2. `config.provider`: a pre-built `LLMProvider`
/// 3. `config.provider_name` + `config.model`: an explicit choice; failing
///    to create it is an error
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, both set
/// 5. `OPENAI_API_KEY` present → OpenAI
/// 6. `ProviderFactory::from_env()` auto-detection
///
/// Returns `Ok(None)` when `ai_enabled` is off or nothing in steps 4–6
/// resolves: the pipeline then runs without AI and records that as a warning.
pub fn resolve_backend(
    config: &SplitConfig,
) -> Result<Option<Arc<dyn CompletionBackend>>, SplitError> {
    if !config.ai_enabled {
        return Ok(None);
    }
    if let Some(ref backend) = config.backend {
        return Ok(Some(Arc::clone(backend)));
    }

    let wrap = |provider: Arc<dyn LLMProvider>, label: String| -> Arc<dyn CompletionBackend> {
        Arc::new(ProviderBackend::new(provider, label))
    };

    if let Some(ref provider) = config.provider {
        return Ok(Some(wrap(Arc::clone(provider), "custom".to_string())));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let provider = create_provider(name, model)?;
        return Ok(Some(wrap(provider, format!("{name}/{model}"))));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return match create_provider(&prov, &model) {
                Ok(p) => Ok(Some(wrap(p, format!("{prov}/{model}")))),
                Err(e) => {
                    warn!("{e}");
                    Ok(None)
                }
            };
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return match create_provider("openai", model) {
                Ok(p) => Ok(Some(wrap(p, format!("openai/{model}")))),
                Err(e) => {
                    warn!("{e}");
                    Ok(None)
                }
            };
        }
    }

    match ProviderFactory::from_env() {
        Ok((llm, _embedding)) => Ok(Some(wrap(llm, "auto".to_string()))),
        Err(e) => {
            info!("No LLM provider auto-detected: {e}");
            Ok(None)
        }
    }
}
