//! # edgequake-pdfsplit
//!
//! Split PDF documents into page-range sections and annotate each section
//! with AI-generated title, description and keywords for a retrieval index.
//!
//! ## Two phases
//!
//! Splitting is deliberately two-step. Phase 1 ([`analyze`]) reads the
//! document, decides section boundaries and synthesises metadata, producing
//! an [`AnalysisResult`] that is plain JSON. Nothing is written yet. Phase 2
//! ([`materialize`]) writes one PDF per section plus a manifest, only after
//! the caller has looked at (and possibly edited) the analysis.
//! [`SplitSession`] wraps this as an explicit state machine.
//!
//! ```text
//! PDF (path / URL / bytes)
//!  │
//!  ├─ 1. Acquire    validate, retry downloads, scratch copy
//!  ├─ 2. Structure  page count + per-page text (lopdf)
//!  ├─ 3. OCR        optional: image-only pages via a vision model
//!  ├─ 4. Plan       Fixed-Range or AI-Suggested boundaries
//!  ├─ 5. Synthesize per-section metadata, placeholder on failure
//!  │     ── review ──
//!  └─ 6. Materialize sliced PDFs + pdf_sections_metadata.json
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfsplit::{SplitConfig, SplitSession, DocumentSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = SplitConfig::default();
//!     let mut session =
//!         SplitSession::plan(DocumentSource::from_input("report.pdf"), config).await?;
//!     for s in &session.preview()?.sections {
//!         println!("{:>3}  {:<8} {}", s.index, s.plan.label(), s.metadata.title);
//!     }
//!     let out = session.commit("sections/").await?;
//!     println!("manifest: {}", out.manifest_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Without AI
//!
//! With no provider configured (or `ai_enabled(false)`) the pipeline still
//! completes: boundaries come from the fixed-range planner, every section
//! gets a placeholder title, and the analysis carries a warning saying so.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfsplit` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{
    analyze, analyze_bytes, analyze_source, analyze_sync, inspect, materialize, resolve_backend,
    split_to_dir, AnalyzedDocument,
};
pub use config::{FixedRangeParams, PlanStrategy, PlanningSample, SplitConfig, SplitConfigBuilder};
pub use error::{PlanningValidationError, SplitError, SynthesisFailure};
pub use output::{
    AnalysisResult, AnalysisStats, AnalyzedSection, CatalogEntry, Manifest, PlanSource,
    SectionMetadata, SectionPlan, SourceInfo, SplitFile, SplitOutput,
};
pub use pipeline::acquire::DocumentSource;
pub use pipeline::filename::{derive_filenames, transliterate};
pub use pipeline::llm::{Completion, CompletionBackend, CompletionRequest, ProviderBackend};
pub use pipeline::plan::fixed_range_plan;
pub use pipeline::structure::StructureReport;
pub use progress::{NoopProgressCallback, ProgressCallback, SplitProgressCallback};
pub use session::{SessionState, SplitSession};
