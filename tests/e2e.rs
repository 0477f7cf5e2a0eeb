//! End-to-end tests against a live LLM provider.
//!
//! Gated behind `E2E_ENABLED` and a real PDF at `./test_cases/sample.pdf`,
//! so they never run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 OPENAI_API_KEY=sk-... cargo test --test e2e -- --nocapture

use edgequake_pdfsplit::{analyze, split_to_dir, SplitConfig};
use std::path::PathBuf;

fn sample_pdf() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/sample.pdf")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

#[tokio::test]
async fn e2e_analyze_with_live_provider() {
    let path = e2e_skip_unless_ready!(sample_pdf());
    let config = SplitConfig::default();

    let result = analyze(path.to_string_lossy(), &config)
        .await
        .expect("analysis should succeed");

    assert!(!result.sections.is_empty());
    result
        .validate(result.stats.page_count)
        .expect("plan covers the document");
    for s in &result.sections {
        assert!(!s.metadata.title.trim().is_empty());
        println!("{:>3} {:<8} {}", s.index, s.plan.label(), s.metadata.title);
    }
    println!(
        "tokens: {} in / {} out",
        result.stats.total_input_tokens, result.stats.total_output_tokens
    );
}

#[tokio::test]
async fn e2e_split_to_dir() {
    let path = e2e_skip_unless_ready!(sample_pdf());
    let dir = tempfile::tempdir().unwrap();

    let output = split_to_dir(path.to_string_lossy(), dir.path(), &SplitConfig::default())
        .await
        .expect("split should succeed");

    assert!(output.manifest.complete);
    for f in &output.manifest.files {
        assert!(dir.path().join(&f.filename).exists(), "{} missing", f.filename);
    }
}
