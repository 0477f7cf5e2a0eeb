//! Metadata synthesis: one AI call per section, with placeholder fallback.
//!
//! The AI reply is loosely structured text. It is parsed once, here, into a
//! [`SynthesisOutcome`]: either `Parsed(SectionMetadata)` or
//! `Fallback(SynthesisFailure)`. Nothing downstream looks at raw JSON.
//!
//! Metadata keeps the section's own language and letters; folding Turkish or
//! accented letters to ASCII happens only when filenames are derived.

use crate::config::SplitConfig;
use crate::error::SynthesisFailure;
use crate::output::{SectionMetadata, SectionPlan};
use crate::pipeline::llm::{
    call_with_retry, extract_json_object, CallError, CompletionBackend, CompletionRequest,
};
use crate::pipeline::structure::truncate_chars;
use crate::prompts::{
    document_title_prompt, section_metadata_prompt, DEFAULT_SYSTEM_PROMPT,
    DOCUMENT_TITLE_SYSTEM_PROMPT,
};
use serde_json::Value;
use tracing::{debug, warn};

pub const MAX_TITLE_CHARS: usize = 150;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;
pub const MAX_KEYWORDS: usize = 15;

/// Characters of opening text used for the document name suggestion.
const DOCUMENT_TITLE_SAMPLE_CHARS: usize = 3000;

/// Result of synthesizing one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Parsed(SectionMetadata),
    Fallback(SynthesisFailure),
}

impl SynthesisOutcome {
    /// Final metadata for `plan`, plus the warning to record when it fell back.
    pub fn into_metadata(self, plan: &SectionPlan) -> (SectionMetadata, Option<String>) {
        match self {
            SynthesisOutcome::Parsed(meta) => (meta, None),
            SynthesisOutcome::Fallback(failure) => {
                let reason = failure.to_string();
                (SectionMetadata::placeholder(plan, reason.clone()), Some(reason))
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SynthesisOutcome::Fallback(_))
    }
}

/// Token usage of one synthesis call (zero when no call was made).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

/// Produce metadata for one section's text.
///
/// Never fails: short text, a missing backend, call errors, timeouts and
/// malformed replies all come back as `SynthesisOutcome::Fallback`.
pub async fn synthesize_section(
    plan: &SectionPlan,
    text: &str,
    backend: Option<&dyn CompletionBackend>,
    config: &SplitConfig,
) -> (SynthesisOutcome, TokenUsage) {
    let trimmed = text.trim();
    let chars = trimmed.chars().count();
    if chars < config.min_section_chars {
        return (
            SynthesisOutcome::Fallback(SynthesisFailure::InsufficientContent {
                chars,
                minimum: config.min_section_chars,
            }),
            TokenUsage::default(),
        );
    }
    let Some(backend) = backend else {
        return (
            SynthesisOutcome::Fallback(SynthesisFailure::Unavailable),
            TokenUsage::default(),
        );
    };

    let body = truncate_chars(trimmed, config.section_char_budget);
    if body.len() < trimmed.len() {
        debug!(
            "Section {}: text truncated to {} chars",
            plan.label(),
            config.section_char_budget
        );
    }

    let request = CompletionRequest {
        system: config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        user: section_metadata_prompt(&plan.label(), body),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let label = format!("pages {}", plan.label());
    match call_with_retry(backend, &request, config, &label).await {
        Ok(completion) => {
            let usage = TokenUsage {
                input: completion.input_tokens as u64,
                output: completion.output_tokens as u64,
            };
            match parse_metadata_reply(&completion.content) {
                Ok(meta) => (SynthesisOutcome::Parsed(meta), usage),
                Err(failure) => {
                    warn!("{}: {}", label, failure);
                    (SynthesisOutcome::Fallback(failure), usage)
                }
            }
        }
        Err(e) => (
            SynthesisOutcome::Fallback(call_failure(e)),
            TokenUsage::default(),
        ),
    }
}

/// Ask for a name for the whole document from its opening text.
pub async fn suggest_document_title(
    page_count: usize,
    opening_text: &str,
    backend: Option<&dyn CompletionBackend>,
    config: &SplitConfig,
) -> (Result<String, SynthesisFailure>, TokenUsage) {
    let trimmed = opening_text.trim();
    let chars = trimmed.chars().count();
    if chars < config.min_section_chars {
        return (
            Err(SynthesisFailure::InsufficientContent {
                chars,
                minimum: config.min_section_chars,
            }),
            TokenUsage::default(),
        );
    }
    let Some(backend) = backend else {
        return (Err(SynthesisFailure::Unavailable), TokenUsage::default());
    };

    let request = CompletionRequest {
        system: DOCUMENT_TITLE_SYSTEM_PROMPT.to_string(),
        user: document_title_prompt(
            page_count,
            truncate_chars(trimmed, DOCUMENT_TITLE_SAMPLE_CHARS),
        ),
        temperature: config.temperature,
        max_tokens: 200,
    };

    match call_with_retry(backend, &request, config, "document title").await {
        Ok(completion) => {
            let usage = TokenUsage {
                input: completion.input_tokens as u64,
                output: completion.output_tokens as u64,
            };
            let title = parse_json_reply(&completion.content).and_then(|obj| {
                obj.get("title")
                    .and_then(Value::as_str)
                    .map(|t| cap_chars(t.trim(), MAX_TITLE_CHARS))
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| SynthesisFailure::Schema("missing \"title\"".into()))
            });
            (title, usage)
        }
        Err(e) => (Err(call_failure(e)), TokenUsage::default()),
    }
}

fn call_failure(e: CallError) -> SynthesisFailure {
    match e {
        CallError::TimedOut { secs, .. } => SynthesisFailure::Timeout { secs },
        CallError::Failed { attempts, detail } => SynthesisFailure::CallFailed { attempts, detail },
    }
}

fn parse_json_reply(reply: &str) -> Result<serde_json::Map<String, Value>, SynthesisFailure> {
    let json = extract_json_object(reply)
        .ok_or_else(|| SynthesisFailure::Schema("no JSON object in reply".into()))?;
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(SynthesisFailure::Schema("reply is not a JSON object".into())),
        Err(e) => Err(SynthesisFailure::Schema(e.to_string())),
    }
}

/// Parse and clean a metadata reply.
///
/// `keywords` may be a JSON array or a comma-separated string. A missing or
/// empty title is a schema violation; everything else degrades gracefully.
pub fn parse_metadata_reply(reply: &str) -> Result<SectionMetadata, SynthesisFailure> {
    let obj = parse_json_reply(reply)?;
    let text_field = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let title = text_field("title");
    if title.is_empty() {
        return Err(SynthesisFailure::Schema("missing or empty \"title\"".into()));
    }

    let raw_keywords: Vec<String> = match obj.get("keywords") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s.split([',', ';', '\n']).map(str::to_string).collect(),
        _ => Vec::new(),
    };

    Ok(SectionMetadata {
        title: cap_chars(&title, MAX_TITLE_CHARS),
        description: cap_chars(&text_field("description"), MAX_DESCRIPTION_CHARS),
        keywords: clean_keywords(raw_keywords),
        reasoning: text_field("reasoning"),
        fallback: false,
    })
}

/// Trim, turn underscores back into spaces, drop one-letter noise, dedupe
/// case-insensitively in first-seen order, keep at most [`MAX_KEYWORDS`].
pub fn clean_keywords(raw: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .map(|k| k.replace('_', " ").split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|k| k.chars().count() > 1)
        .filter(|k| seen.insert(k.to_lowercase()))
        .take(MAX_KEYWORDS)
        .collect()
}

/// Cap at `max` characters, ending with `...` when cut.
fn cap_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept = truncate_chars(s, max.saturating_sub(3)).trim_end();
        format!("{kept}...")
    }
}
