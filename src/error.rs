//! Error types for the edgequake-pdfsplit library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`SplitError`]: **Fatal**: the run cannot proceed (bad input, network
//!   exhausted, an output file could not be written). Returned as
//!   `Err(SplitError)` from the top-level entry points.
//!
//! * [`PlanningValidationError`]: **Absorbed**: the AI boundary plan broke the
//!   page-coverage invariant. The planner falls back to Fixed-Range and records
//!   the error text as a run warning; callers never see it as an `Err`.
//!
//! * [`SynthesisFailure`]: **Absorbed, per section**: metadata for one section
//!   could not be produced. The section receives placeholder metadata and the
//!   error text is attached to that section's warnings.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfsplit library.
#[derive(Debug, Error)]
pub enum SplitError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// Transient network failures persisted through every retry.
    #[error("Failed to download '{url}' after {attempts} attempts: {reason}\nCheck your internet connection.")]
    TransientNetwork {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// The server answered with a non-retryable HTTP status (4xx).
    #[error("Download of '{url}' rejected with HTTP {status}")]
    DownloadRejected { url: String, status: u16 },

    /// The bytes are not a usable PDF (signature, size, content type, parse).
    #[error("Invalid PDF document '{name}': {reason}")]
    InvalidDocument { name: String, reason: String },

    /// PDF is encrypted and its content cannot be read.
    #[error("PDF '{name}' is encrypted; decrypt it first (e.g. qpdf --decrypt in.pdf out.pdf)")]
    EncryptedDocument { name: String },

    // ── Plan / workflow errors ────────────────────────────────────────────
    /// A (possibly hand-edited) analysis no longer satisfies the coverage
    /// invariant for the source document.
    #[error("Invalid section plan: {0}")]
    InvalidPlan(String),

    /// A session method was called in a state that does not allow it.
    #[error("Cannot {action} a session in state '{state}'")]
    InvalidTransition { state: String, action: String },

    // ── Materialization errors ────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write '{path}': {source}")]
    Materialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The section PDF could not be assembled from the source pages.
    #[error("Failed to assemble section {section} (pages {start_page}-{end_page}): {detail}")]
    SectionAssembly {
        section: usize,
        start_page: usize,
        end_page: usize,
        detail: String,
    },

    // ── LLM / OCR errors ──────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Could not bind to a pdfium library (OCR fallback only).
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is only needed for --ocr. Either:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium, or\n\
  • Install libpdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The analysis JSON could not be read or written.
    #[error("Analysis JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why an AI-suggested boundary plan was rejected.
///
/// Never returned to callers; the planner substitutes the Fixed-Range default
/// plan and keeps `to_string()` of this value as a warning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningValidationError {
    #[error("AI planning call failed: {0}")]
    CallFailed(String),

    #[error("AI plan is not a JSON array of sections: {0}")]
    Unparseable(String),

    #[error("AI plan is empty")]
    Empty,

    #[error("AI plan has {count} sections (limit {limit})")]
    TooManySections { count: usize, limit: usize },

    #[error("AI plan section {index} is reversed ({start_page} > {end_page})")]
    Reversed {
        index: usize,
        start_page: usize,
        end_page: usize,
    },

    #[error("AI plan section {index} starts at page {found}, expected {expected}")]
    NotContiguous {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("AI plan section {index} reaches past the last page ({page} > {last_page})")]
    OutOfRange {
        index: usize,
        page: usize,
        last_page: usize,
    },
}

/// Why metadata for one section fell back to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisFailure {
    /// Section text is empty or shorter than the minimum length.
    #[error("insufficient content: {chars} characters of text (minimum {minimum})")]
    InsufficientContent { chars: usize, minimum: usize },

    /// The AI call failed after its own bounded retry.
    #[error("metadata synthesis failed after {attempts} attempts: {detail}")]
    CallFailed { attempts: u32, detail: String },

    /// The AI call timed out on every attempt.
    #[error("metadata synthesis failed: AI call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response held no JSON object or did not match the schema.
    #[error("metadata synthesis failed: malformed response ({0})")]
    Schema(String),

    /// No AI collaborator is configured.
    #[error("metadata synthesis failed: no AI provider available")]
    Unavailable,
}
