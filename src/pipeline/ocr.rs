//! OCR fallback for image-only pages: rasterise with pdfium, send the PNG to
//! the AI collaborator's vision endpoint, use the transcript as page text.
//!
//! Opt-in via [`SplitConfig::ocr_fallback`]. pdfium is bound at call time
//! (`PDFIUM_LIB_PATH`, then the system loader), so documents with a text
//! layer never need the shared library. Rendering runs in `spawn_blocking`
//! because pdfium is not async-safe; the longest edge is capped at
//! `max_rendered_pixels` to keep memory bounded on large-format pages.

use crate::config::SplitConfig;
use crate::error::SplitError;
use crate::pipeline::llm::CompletionBackend;
use crate::pipeline::structure::clean_text;
use crate::prompts::OCR_PROMPT;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Maximum tokens requested for one page transcript.
const OCR_MAX_TOKENS: usize = 4096;

/// Text recovered for image-only pages.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OcrReport {
    /// `(page_index, text)` for pages that produced any text.
    pub pages: Vec<(usize, String)>,
    pub warnings: Vec<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Indices of pages whose extracted text is shorter than `min_chars`.
pub fn image_only_pages(page_texts: &[String], min_chars: usize) -> Vec<usize> {
    page_texts
        .iter()
        .enumerate()
        .filter(|(_, t)| t.trim().chars().count() < min_chars)
        .map(|(i, _)| i)
        .collect()
}

/// Transcribe `page_indices` of the PDF in `bytes`.
///
/// Never fails as a whole: a missing pdfium library or a failed page is
/// recorded as a warning and the affected pages keep their (empty) text.
pub async fn ocr_pages(
    bytes: Arc<Vec<u8>>,
    page_indices: &[usize],
    backend: &dyn CompletionBackend,
    config: &SplitConfig,
) -> OcrReport {
    let mut report = OcrReport::default();
    if page_indices.is_empty() {
        return report;
    }
    info!("OCR fallback for {} image-only page(s)", page_indices.len());

    let images = match render_pages(bytes, page_indices, config.max_rendered_pixels).await {
        Ok(images) => images,
        Err(e) => {
            let warning = format!("OCR fallback skipped: {e}");
            warn!("{warning}");
            report.warnings.push(warning);
            return report;
        }
    };

    let per_call = Duration::from_secs(config.api_timeout_secs);
    for (index, image) in images {
        let data = match encode_page(&image) {
            Ok(d) => d,
            Err(e) => {
                report
                    .warnings
                    .push(format!("page {}: could not encode rendered image: {e}", index + 1));
                continue;
            }
        };
        match timeout(per_call, backend.transcribe_page(data, OCR_PROMPT, OCR_MAX_TOKENS)).await {
            Ok(Ok(completion)) => {
                report.input_tokens += completion.input_tokens as u64;
                report.output_tokens += completion.output_tokens as u64;
                let text = clean_text(&completion.content);
                debug!("Page {}: OCR produced {} chars", index + 1, text.chars().count());
                if !text.is_empty() {
                    report.pages.push((index, text));
                }
            }
            Ok(Err(e)) => {
                let warning = format!("page {}: OCR failed: {e}", index + 1);
                warn!("{warning}");
                report.warnings.push(warning);
            }
            Err(_) => {
                let warning = format!(
                    "page {}: OCR timed out after {}s",
                    index + 1,
                    config.api_timeout_secs
                );
                warn!("{warning}");
                report.warnings.push(warning);
            }
        }
    }
    report
}

/// Rasterise selected pages (0-based) off the async runtime.
pub async fn render_pages(
    bytes: Arc<Vec<u8>>,
    page_indices: &[usize],
    max_pixels: u32,
) -> Result<Vec<(usize, DynamicImage)>, SplitError> {
    let indices = page_indices.to_vec();
    tokio::task::spawn_blocking(move || render_pages_blocking(&bytes, &indices, max_pixels))
        .await
        .map_err(|e| SplitError::Internal(format!("Render task panicked: {e}")))?
}

fn bind_pdfium() -> Result<Pdfium, SplitError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => {
            let p = std::path::Path::new(&path);
            let lib = if p.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(p)
            } else {
                p.to_path_buf()
            };
            Pdfium::bind_to_library(lib)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| SplitError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn render_pages_blocking(
    bytes: &[u8],
    page_indices: &[usize],
    max_pixels: u32,
) -> Result<Vec<(usize, DynamicImage)>, SplitError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| SplitError::InvalidDocument {
            name: "ocr".into(),
            reason: format!("pdfium could not open document: {e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(page_indices.len());
    for &idx in page_indices {
        if idx >= total_pages {
            warn!("Skipping page {} (out of range, total={})", idx + 1, total_pages);
            continue;
        }
        let page = match pages.get(idx as u16) {
            Ok(page) => page,
            Err(e) => {
                warn!("Page {}: cannot load for rendering: {:?}", idx + 1, e);
                continue;
            }
        };
        let rendered = page.render_with_config(&render_config);
        match rendered {
            Ok(bitmap) => {
                let image = bitmap.as_image();
                debug!("Rendered page {} → {}x{} px", idx + 1, image.width(), image.height());
                results.push((idx, image));
            }
            Err(e) => warn!("Page {}: rasterisation failed: {:?}", idx + 1, e),
        };
    }
    Ok(results)
}

/// PNG-encode a rendered page as base64 `ImageData` with `detail: "high"`.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    let b64 = STANDARD.encode(&buf);
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{Completion, CompletionRequest};
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn image_only_detection_uses_threshold() {
        let texts = vec![
            "Madde 1 - Bu yönetmeliğin amacı".to_string(),
            "  ".to_string(),
            "12".to_string(),
        ];
        assert_eq!(image_only_pages(&texts, 20), vec![1, 2]);
    }

    struct Blind;

    #[async_trait]
    impl CompletionBackend for Blind {
        fn name(&self) -> &str {
            "blind"
        }
        async fn complete(&self, _r: &CompletionRequest) -> Result<Completion, String> {
            Err("unused".into())
        }
    }

    #[tokio::test]
    async fn no_pages_means_no_work() {
        let report = ocr_pages(Arc::new(Vec::new()), &[], &Blind, &SplitConfig::default()).await;
        assert_eq!(report, OcrReport::default());
    }

    #[tokio::test]
    async fn unreadable_bytes_fail_rendering_without_panicking() {
        // Errors either at pdfium binding or at document load.
        let result = render_pages(Arc::new(b"not a pdf".to_vec()), &[0], 256).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn render_failure_becomes_a_warning() {
        let report = ocr_pages(
            Arc::new(b"not a pdf".to_vec()),
            &[0],
            &Blind,
            &SplitConfig::default(),
        )
        .await;
        assert!(report.pages.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("OCR fallback skipped"));
    }
}
