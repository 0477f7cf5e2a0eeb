//! Acquisition: turn raw bytes, a local path, or a URL into validated PDF bytes.
//!
//! Whatever the source, the bytes go through the same validation (signature,
//! minimum size) and land in a uniquely named scratch file so later stages
//! have a stable path. The scratch file is a [`NamedTempFile`]: it is removed
//! when the [`AcquiredDocument`] is dropped unless the caller persists it.
//!
//! ## Retry policy
//!
//! Connect/timeout/body errors, HTTP 5xx, 408 and 429 are transient and are
//! retried `download_max_retries` times with delays `base · 2^(k-1)`. Any
//! other non-success status fails immediately with
//! [`SplitError::DownloadRejected`].

use crate::config::SplitConfig;
use crate::error::SplitError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Where the document comes from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Uploaded bytes; `name` is the original file name (used for fallback filenames).
    Bytes { name: String, bytes: Vec<u8> },
    /// HTTP or HTTPS URL.
    Url(String),
    /// Local file path.
    Path(PathBuf),
}

impl DocumentSource {
    /// Classify a CLI-style input string as URL or local path.
    pub fn from_input(input: &str) -> Self {
        if is_url(input) {
            DocumentSource::Url(input.to_string())
        } else {
            DocumentSource::Path(PathBuf::from(input))
        }
    }

    pub fn bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        DocumentSource::Bytes {
            name: name.into(),
            bytes,
        }
    }
}

/// Validated PDF bytes plus the scratch file holding a copy of them.
#[derive(Debug)]
pub struct AcquiredDocument {
    pub bytes: Vec<u8>,
    /// File stem of the source, e.g. `mevzuat` for `.../mevzuat.pdf`.
    pub name: String,
    scratch: NamedTempFile,
}

impl AcquiredDocument {
    /// Path of the scratch copy. Valid while `self` is alive.
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Keep the scratch file beyond the lifetime of this value.
    pub fn persist_scratch(self, target: impl AsRef<Path>) -> Result<PathBuf, SplitError> {
        let target = target.as_ref().to_path_buf();
        self.scratch
            .persist(&target)
            .map_err(|e| SplitError::Materialization {
                path: target.clone(),
                source: e.error,
            })?;
        Ok(target)
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a source to validated bytes and a scratch file.
pub async fn acquire(
    source: DocumentSource,
    config: &SplitConfig,
) -> Result<AcquiredDocument, SplitError> {
    let (name, bytes, content_type) = match source {
        DocumentSource::Bytes { name, bytes } => (stem_of(&name), bytes, None),
        DocumentSource::Path(path) => {
            let bytes = read_local(&path).await?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string());
            (name, bytes, None)
        }
        DocumentSource::Url(url) => {
            let (bytes, content_type) = download(&url, config).await?;
            (name_from_url(&url), bytes, content_type)
        }
    };

    validate_pdf_bytes(&bytes, content_type.as_deref(), &name, config.min_document_bytes)?;
    let scratch = write_scratch(&bytes, config.scratch_dir.as_deref())?;
    debug!(
        "Acquired '{}' ({} bytes) → {}",
        name,
        bytes.len(),
        scratch.path().display()
    );

    Ok(AcquiredDocument {
        bytes,
        name,
        scratch,
    })
}

/// Check signature and size. The `%PDF` signature is authoritative: a
/// mislabelled `Content-Type` is tolerated when the body sniffs as PDF.
pub fn validate_pdf_bytes(
    bytes: &[u8],
    content_type: Option<&str>,
    name: &str,
    min_bytes: usize,
) -> Result<(), SplitError> {
    let invalid = |reason: String| SplitError::InvalidDocument {
        name: name.to_string(),
        reason,
    };

    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        let head: Vec<u8> = bytes.iter().take(8).copied().collect();
        let mut reason = format!(
            "missing %PDF signature (starts with {:?})",
            String::from_utf8_lossy(&head)
        );
        if let Some(ct) = content_type {
            if !ct.to_ascii_lowercase().contains("pdf") {
                reason.push_str(&format!("; server sent Content-Type '{ct}'"));
            }
        }
        return Err(invalid(reason));
    }

    if let Some(ct) = content_type {
        if !ct.to_ascii_lowercase().contains("pdf") {
            debug!("Content-Type '{}' overridden by %PDF signature", ct);
        }
    }

    if bytes.len() < min_bytes {
        return Err(invalid(format!(
            "only {} bytes (minimum {}); likely a placeholder or truncated file",
            bytes.len(),
            min_bytes
        )));
    }

    Ok(())
}

/// Delay before retry number `retry` (1-based): `base · 2^(retry-1)`.
pub fn retry_delay(base_ms: u64, retry: u32) -> Duration {
    let factor = 2u64.saturating_pow(retry.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// HTTP statuses worth retrying.
pub fn is_transient_status(status: u16) -> bool {
    (500..600).contains(&status) || status == 408 || status == 429
}

// ── Local files ──────────────────────────────────────────────────────────

async fn read_local(path: &Path) -> Result<Vec<u8>, SplitError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(SplitError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SplitError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(SplitError::InvalidDocument {
            name: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

// ── Download ─────────────────────────────────────────────────────────────

enum FetchError {
    Transient(String),
    Fatal(SplitError),
}

async fn download(
    url: &str,
    config: &SplitConfig,
) -> Result<(Vec<u8>, Option<String>), SplitError> {
    if reqwest::Url::parse(url).is_err() {
        return Err(SplitError::InvalidInput {
            input: url.to_string(),
        });
    }
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.download_timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| SplitError::Internal(format!("HTTP client: {e}")))?;

    let attempts = config.download_max_retries + 1;
    let mut last_reason = String::from("no attempt made");

    for attempt in 1..=attempts {
        if attempt > 1 {
            let delay = retry_delay(config.download_backoff_ms, attempt - 1);
            warn!(
                "Download retry {}/{} after {}ms: {}",
                attempt - 1,
                config.download_max_retries,
                delay.as_millis(),
                last_reason
            );
            sleep(delay).await;
        }

        match fetch_once(&client, url).await {
            Ok(result) => {
                info!("Downloaded {} bytes from {}", result.0.len(), url);
                return Ok(result);
            }
            Err(FetchError::Fatal(e)) => return Err(e),
            Err(FetchError::Transient(reason)) => last_reason = reason,
        }
    }

    Err(SplitError::TransientNetwork {
        url: url.to_string(),
        attempts,
        reason: last_reason,
    })
}

async fn fetch_once(
    client: &reqwest::Client,
    url: &str,
) -> Result<(Vec<u8>, Option<String>), FetchError> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/pdf,*/*")
        .send()
        .await
        .map_err(|e| FetchError::Transient(describe_reqwest_error(&e)))?;

    let status = response.status();
    if !status.is_success() {
        let code = status.as_u16();
        return if is_transient_status(code) {
            Err(FetchError::Transient(format!("HTTP {status}")))
        } else {
            Err(FetchError::Fatal(SplitError::DownloadRejected {
                url: url.to_string(),
                status: code,
            }))
        };
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FetchError::Transient(describe_reqwest_error(&e)))?;

    Ok((bytes.to_vec(), content_type))
}

fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}

// ── Naming & scratch ─────────────────────────────────────────────────────

/// File stem from the last URL path segment, or `downloaded`.
fn name_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty())
        .map(|last| stem_of(&last))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "downloaded".to_string())
}

fn stem_of(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(i) if i > 0 => base[..i].to_string(),
        _ => base.to_string(),
    }
}

fn write_scratch(bytes: &[u8], dir: Option<&Path>) -> Result<NamedTempFile, SplitError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("pdfsplit_").suffix(".pdf");
    let target = dir
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);

    let mut file = builder
        .tempfile_in(&target)
        .map_err(|e| SplitError::Materialization {
            path: target.clone(),
            source: e,
        })?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| SplitError::Materialization {
            path: file.path().to_path_buf(),
            source: e,
        })?;
    Ok(file)
}
