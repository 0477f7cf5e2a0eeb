//! Shared fixtures: in-memory PDFs built with lopdf and a scripted AI backend.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_pdfsplit::prompts::{DOCUMENT_TITLE_SYSTEM_PROMPT, PLANNING_SYSTEM_PROMPT};
use edgequake_pdfsplit::{Completion, CompletionBackend, CompletionRequest, SplitConfig};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Build a PDF with one page per entry; each page shows its string in Courier.
/// An unreferenced padding stream keeps the file above the 1 KB minimum.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for text in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![50.into(), 700.into()]),
        ];
        if !text.is_empty() {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content stream"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.add_object(Stream::new(dictionary! {}, vec![b'%'; 1200]));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save test pdf");
    buf
}

/// `n` pages of distinct, extractable text.
pub fn numbered_pdf(n: usize) -> Vec<u8> {
    let texts: Vec<String> = (1..=n)
        .map(|i| format!("Article {i}. Employers shall register insured persons within {i} days."))
        .collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    pdf_with_pages(&refs)
}

/// Page count of a PDF on disk or in memory.
pub fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes)
        .expect("valid pdf")
        .get_pages()
        .len()
}

/// Test config: no retries, tiny backoffs, no document-name call.
pub fn quiet_config() -> edgequake_pdfsplit::SplitConfigBuilder {
    SplitConfig::builder()
        .max_retries(0)
        .retry_backoff_ms(1)
        .suggest_document_name(false)
}

/// Backend that answers by prompt kind and records every request.
pub struct ScriptedBackend {
    pub plan_reply: Result<String, String>,
    /// Replies for metadata calls, used in order; the last one repeats.
    pub metadata_replies: Vec<Result<String, String>>,
    pub title_reply: Result<String, String>,
    metadata_calls: AtomicUsize,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(plan_reply: &str, metadata_replies: Vec<Result<String, String>>) -> Self {
        Self {
            plan_reply: Ok(plan_reply.to_string()),
            metadata_replies,
            title_reply: Ok(r#"{"title": "Insurance Regulation"}"#.to_string()),
            metadata_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_plan_error(mut self, err: &str) -> Self {
        self.plan_reply = Err(err.to_string());
        self
    }

    pub fn planning_calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.system == PLANNING_SYSTEM_PROMPT)
            .count()
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, String> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = if request.system == PLANNING_SYSTEM_PROMPT {
            self.plan_reply.clone()
        } else if request.system == DOCUMENT_TITLE_SYSTEM_PROMPT {
            self.title_reply.clone()
        } else {
            let n = self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            let idx = n.min(self.metadata_replies.len().saturating_sub(1));
            self.metadata_replies
                .get(idx)
                .cloned()
                .unwrap_or_else(|| Err("no scripted reply".to_string()))
        };
        reply.map(|content| Completion {
            content,
            input_tokens: 50,
            output_tokens: 10,
        })
    }
}

/// A metadata reply in the expected JSON shape.
pub fn metadata_json(title: &str, keywords: &[&str]) -> Result<String, String> {
    Ok(serde_json::json!({
        "title": title,
        "description": format!("{title} section of the regulation."),
        "keywords": keywords,
        "reasoning": "Headings on the first page.",
    })
    .to_string())
}
