//! Structure analysis: open the PDF, count pages, extract per-page text.
//!
//! Text is extracted with lopdf and cached per page in a [`OnceLock`], so
//! each page is parsed at most once and the cache is immutable after it is
//! filled. Pages without a text layer yield empty strings; downstream stages
//! treat those as insufficient content, never as an error.
//!
//! All functions here are synchronous and CPU-bound. Async callers run them
//! through `tokio::task::spawn_blocking`.

use crate::error::SplitError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Zero-width characters, BOMs and soft hyphens that extraction leaves behind.
static INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{200B}-\u{200D}\u{2060}\u{FEFF}\u{00AD}]").unwrap());
static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());
static EXTRA_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n(\s*\n)+").unwrap());

/// The parsed source document and its lazily filled page-text cache.
pub struct SourceDocument {
    name: String,
    byte_size: u64,
    document: lopdf::Document,
    /// lopdf page numbers (1-based) in page order.
    page_numbers: Vec<u32>,
    texts: Vec<OnceLock<String>>,
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("byte_size", &self.byte_size)
            .field("page_count", &self.page_count())
            .finish()
    }
}

impl SourceDocument {
    /// Parse PDF bytes. Fails on unparseable, encrypted or page-less files.
    pub fn load(name: &str, bytes: &[u8]) -> Result<Self, SplitError> {
        let document = lopdf::Document::load_mem(bytes).map_err(|e| SplitError::InvalidDocument {
            name: name.to_string(),
            reason: format!("cannot parse PDF: {e}"),
        })?;

        if document.is_encrypted() {
            return Err(SplitError::EncryptedDocument {
                name: name.to_string(),
            });
        }

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(SplitError::InvalidDocument {
                name: name.to_string(),
                reason: "document has no pages".into(),
            });
        }

        debug!("Loaded '{}': {} pages", name, page_numbers.len());
        let texts = (0..page_numbers.len()).map(|_| OnceLock::new()).collect();
        Ok(Self {
            name: name.to_string(),
            byte_size: bytes.len() as u64,
            document,
            page_numbers,
            texts,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    /// The underlying lopdf document (read-only).
    pub fn document(&self) -> &lopdf::Document {
        &self.document
    }

    /// Extract and clean a page's text without touching the cache.
    /// Out-of-range indices and extraction errors yield an empty string.
    pub fn extract_page(&self, index: usize) -> String {
        let Some(&page_no) = self.page_numbers.get(index) else {
            return String::new();
        };
        match self.document.extract_text(&[page_no]) {
            Ok(text) => clean_text(&text),
            Err(e) => {
                warn!("Page {}: text extraction failed ({}), treating as empty", index + 1, e);
                String::new()
            }
        }
    }

    /// Cached, cleaned text of page `index` (0-based).
    pub fn page_text(&self, index: usize) -> &str {
        match self.texts.get(index) {
            Some(cell) => cell.get_or_init(|| self.extract_page(index)).as_str(),
            None => "",
        }
    }

    /// Fill the cache for `index` with externally obtained text (OCR).
    /// Returns false when the page was already cached.
    pub fn prime_page_text(&self, index: usize, text: String) -> bool {
        self.texts
            .get(index)
            .map(|cell| cell.set(text).is_ok())
            .unwrap_or(false)
    }

    /// Full mode: text of every page, in order.
    pub fn all_page_texts(&self) -> Vec<&str> {
        (0..self.page_count()).map(|i| self.page_text(i)).collect()
    }

    /// Sampled mode: text of the first `pages` pages joined by newlines,
    /// capped at `max_chars` characters.
    pub fn sample_text(&self, pages: usize, max_chars: usize) -> String {
        let joined = (0..pages.min(self.page_count()))
            .map(|i| self.page_text(i))
            .collect::<Vec<_>>()
            .join("\n");
        truncate_chars(&joined, max_chars).to_string()
    }

    /// Text of an inclusive 0-based page range, pages separated by blank lines.
    pub fn range_text(&self, start_page: usize, end_page: usize) -> String {
        (start_page..=end_page)
            .map(|i| self.page_text(i))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Document Info dictionary entries.
    pub fn info(&self) -> DocumentInfo {
        let dict = match self.document.trailer.get(b"Info") {
            Ok(lopdf::Object::Reference(id)) => self
                .document
                .get_object(*id)
                .and_then(|o| o.as_dict())
                .ok(),
            Ok(lopdf::Object::Dictionary(d)) => Some(d),
            _ => None,
        };
        let field = |key: &[u8]| -> Option<String> {
            match dict?.get(key).ok()? {
                lopdf::Object::String(bytes, _) => {
                    let s = decode_pdf_string(bytes);
                    let s = s.trim();
                    (!s.is_empty()).then(|| s.to_string())
                }
                _ => None,
            }
        };
        DocumentInfo {
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            creator: field(b"Creator"),
            producer: field(b"Producer"),
        }
    }
}

/// PDF Info dictionary fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

/// Quick look at a document without any AI call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureReport {
    pub name: String,
    pub byte_size: u64,
    pub page_count: usize,
    /// First sampled pages' text, capped.
    pub sample_text: String,
    pub has_text: bool,
    pub sampled_pages: usize,
    /// Sampled pages that carry any text.
    pub text_pages: usize,
    /// `text_pages / sampled_pages`.
    pub text_coverage: f32,
    pub info: DocumentInfo,
    /// Set when the document is at or below the small-document threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
}

/// Build a structure report from the first `sample_pages` pages.
pub fn structure_report(
    doc: &SourceDocument,
    sample_pages: usize,
    small_document_threshold: usize,
) -> StructureReport {
    let sampled = sample_pages.min(doc.page_count());
    let text_pages = (0..sampled)
        .filter(|&i| !doc.page_text(i).is_empty())
        .count();
    let sample_text = doc.sample_text(sampled, 1000);
    StructureReport {
        name: doc.name().to_string(),
        byte_size: doc.byte_size(),
        page_count: doc.page_count(),
        has_text: !sample_text.trim().is_empty(),
        sample_text,
        sampled_pages: sampled,
        text_pages,
        text_coverage: if sampled == 0 {
            0.0
        } else {
            text_pages as f32 / sampled as f32
        },
        info: doc.info(),
        advisory: small_document_advisory(doc.page_count(), small_document_threshold),
    }
}

/// Advisory text for documents too small to be worth splitting.
pub fn small_document_advisory(page_count: usize, threshold: usize) -> Option<String> {
    (page_count <= threshold).then(|| {
        format!(
            "document has only {page_count} page(s); splitting is likely unnecessary"
        )
    })
}

/// Normalise extracted text: drop invisible characters, collapse horizontal
/// whitespace, trim line ends, and keep at most one blank line in a row.
pub fn clean_text(raw: &str) -> String {
    let text = INVISIBLE.replace_all(raw, "");
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    EXTRA_NEWLINES
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

/// Longest prefix of `s` with at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, else UTF-8, else Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_whitespace() {
        let raw = "Madde  1\t–\u{200B} Amaç\r\n\r\n\r\n\r\nBu   yönetmeliğin  ";
        assert_eq!(clean_text(raw), "Madde 1 – Amaç\n\nBu yönetmeliğin");
    }

    #[test]
    fn clean_text_keeps_turkish_letters() {
        assert_eq!(clean_text("İşçi ağırlığı ÇÖĞÜŞ"), "İşçi ağırlığı ÇÖĞÜŞ");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("çğışöü", 3), "çğı");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn decode_utf16_info_string() {
        let bytes = [0xFE, 0xFF, 0x00, 0x53, 0x00, 0x47, 0x00, 0x4B];
        assert_eq!(decode_pdf_string(&bytes), "SGK");
        assert_eq!(decode_pdf_string(b"Plain"), "Plain");
    }

    #[test]
    fn advisory_only_for_small_documents() {
        assert!(small_document_advisory(3, 5).is_some());
        assert!(small_document_advisory(5, 5).is_some());
        assert!(small_document_advisory(6, 5).is_none());
    }

    #[test]
    fn garbage_bytes_are_invalid_document() {
        let err = SourceDocument::load("junk", b"%PDF-1.4 not really a pdf").unwrap_err();
        assert!(matches!(err, SplitError::InvalidDocument { .. }));
    }
}
