//! Prompts sent to the AI collaborator.
//!
//! Every instruction the pipeline sends lives here so tests can inspect the
//! exact wording without a live provider. The metadata system prompt can be
//! overridden via [`crate::config::SplitConfig::system_prompt`].

/// System prompt for per-section metadata synthesis.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a document analysis expert preparing PDF sections for a retrieval (RAG) index.

Given the text of one section, respond with ONLY a JSON object:

{
  "title": "short descriptive title of the main topic (at most 100 characters)",
  "description": "what the section covers, which topics and references it contains (150-300 words)",
  "keywords": ["keyword one", "keyword two"],
  "reasoning": "one or two sentences explaining why this title and these keywords fit"
}

Rules:
- Write in the language of the section text and keep its letters exactly (e.g. Turkish ç, ğ, ı, İ, ö, ş, ü).
- Keywords are natural phrases: keep spaces between words, do not join them with underscores.
- At most 15 keywords; prefer technical terms and legal or regulatory references.
- Base everything only on the given text.
- Do NOT wrap the JSON in markdown fences or add commentary."#;

/// System prompt for the whole-document boundary planning call.
pub const PLANNING_SYSTEM_PROMPT: &str = "You are a document analysis expert. You split PDF documents \
into sections that are optimal retrieval units for a RAG system. Respond with ONLY a JSON array.";

/// System prompt for the whole-document name suggestion.
pub const DOCUMENT_TITLE_SYSTEM_PROMPT: &str = "You name documents for a document catalog. \
Respond with ONLY a JSON object of the form {\"title\": \"...\"}. Keep the document's language and letters.";

/// Instruction for transcribing an image-only page (OCR fallback).
pub const OCR_PROMPT: &str = "Transcribe all text visible on this page image as plain text in reading order. \
Output only the text, no commentary.";

/// Build the user message for a section's metadata call.
pub fn section_metadata_prompt(page_label: &str, text: &str) -> String {
    format!(
        "Analyse the following PDF section (pages {page_label}) and produce retrieval metadata.\n\n\
CONTENT:\n\"\"\"\n{text}\n\"\"\""
    )
}

/// Build the user message for the boundary planning call.
///
/// `samples` is the pre-assembled, budget-capped page sample.
pub fn planning_prompt(page_count: usize, max_sections: usize, samples: &str) -> String {
    format!(
        "These are content samples from a {page_count}-page PDF document. Split it into sections that \
are coherent retrieval units.\n\n\
CONTENT SAMPLES:\n{samples}\n\n\
Each section must:\n\
- cover one main topic or closely related topics\n\
- be neither very small (1-2 pages) nor very large (30+ pages)\n\
- start and end at sensible points\n\n\
OUTPUT FORMAT (JSON array only, page numbers are 1-based and inclusive):\n\
[\n  {{\"start_page\": 1, \"end_page\": 5, \"reason\": \"Introduction and general concepts\"}},\n  \
{{\"start_page\": 6, \"end_page\": {page_count}, \"reason\": \"Main topic\"}}\n]\n\n\
IMPORTANT:\n\
- Every page from 1 to {page_count} must be covered\n\
- Sections must not overlap and must be consecutive\n\
- Create at most {max_sections} sections"
    )
}

/// Build the user message for the document name suggestion.
pub fn document_title_prompt(page_count: usize, text: &str) -> String {
    format!(
        "Suggest a concise, descriptive name for this {page_count}-page document based on its opening text.\n\n\
CONTENT:\n\"\"\"\n{text}\n\"\"\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planning_prompt_states_page_count_and_limit() {
        let p = planning_prompt(42, 15, "--- PAGE 1 ---\nabc");
        assert!(p.contains("42-page"));
        assert!(p.contains("from 1 to 42"));
        assert!(p.contains("at most 15 sections"));
        assert!(p.contains("--- PAGE 1 ---"));
    }

    #[test]
    fn metadata_prompt_keeps_text_verbatim() {
        let p = section_metadata_prompt("3-7", "Sosyal güvenlik primleri");
        assert!(p.contains("pages 3-7"));
        assert!(p.contains("Sosyal güvenlik primleri"));
    }

    #[test]
    fn system_prompt_asks_for_spaced_keywords() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("keep spaces"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("\"reasoning\""));
    }
}
