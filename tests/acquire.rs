//! Download behaviour against a throwaway local HTTP server.

mod common;

use common::numbered_pdf;
use edgequake_pdfsplit::pipeline::acquire::acquire;
use edgequake_pdfsplit::{DocumentSource, SplitConfig, SplitError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve every request with the same response; count requests.
async fn serve(
    status_line: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let body = Arc::new(body);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let body = Arc::clone(&body);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut seen = Vec::new();
                while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => seen.extend_from_slice(&buf[..n]),
                    }
                }
                let head = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}/docs/yonetmelik.pdf"), hits)
}

fn fast_config(retries: u32) -> SplitConfig {
    SplitConfig::builder()
        .download_max_retries(retries)
        .download_backoff_ms(5)
        .download_timeout_secs(10)
        .build()
        .unwrap()
}

#[tokio::test]
async fn downloads_pdf_and_names_it_from_url() {
    let pdf = numbered_pdf(4);
    let (url, hits) = serve("200 OK", "application/pdf", pdf.clone()).await;

    let acquired = acquire(DocumentSource::Url(url), &fast_config(3))
        .await
        .unwrap();

    assert_eq!(acquired.bytes, pdf);
    assert_eq!(acquired.name, "yonetmelik");
    assert_eq!(std::fs::read(acquired.scratch_path()).unwrap(), pdf);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pdf_signature_wins_over_content_type() {
    let pdf = numbered_pdf(4);
    let (url, _) = serve("200 OK", "text/html; charset=utf-8", pdf.clone()).await;

    let acquired = acquire(DocumentSource::Url(url), &fast_config(0))
        .await
        .unwrap();
    assert_eq!(acquired.bytes, pdf);
}

#[tokio::test]
async fn html_body_is_rejected_with_content_type_in_reason() {
    let mut page = b"<!DOCTYPE html><html>login required</html>".to_vec();
    page.resize(2048, b' ');
    let (url, _) = serve("200 OK", "text/html", page).await;

    let err = acquire(DocumentSource::Url(url), &fast_config(0))
        .await
        .unwrap_err();
    match err {
        SplitError::InvalidDocument { reason, .. } => assert!(reason.contains("text/html")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    let (url, hits) = serve("500 Internal Server Error", "text/plain", b"boom".to_vec()).await;

    let err = acquire(DocumentSource::Url(url), &fast_config(2))
        .await
        .unwrap_err();

    assert!(
        matches!(err, SplitError::TransientNetwork { attempts: 3, .. }),
        "{err}"
    );
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let (url, hits) = serve("404 Not Found", "text/plain", b"missing".to_vec()).await;

    let err = acquire(DocumentSource::Url(url), &fast_config(3))
        .await
        .unwrap_err();

    assert!(
        matches!(err, SplitError::DownloadRejected { status: 404, .. }),
        "{err}"
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refused_connection_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = acquire(
        DocumentSource::Url(format!("http://{addr}/x.pdf")),
        &fast_config(1),
    )
    .await
    .unwrap_err();
    assert!(
        matches!(err, SplitError::TransientNetwork { attempts: 2, .. }),
        "{err}"
    );
}
