//! Materialization: write one PDF per planned section plus a manifest.
//!
//! This is the only stage that touches the output directory. The plan is
//! re-checked against the source page count first, since the analysis may
//! have been edited by hand. Each section is sliced with lopdf (clone the
//! document, delete the other pages, prune orphans) and written atomically
//! (temp file + rename). lopdf serialises objects in id order and adds no
//! timestamps, so the same analysis always yields byte-identical files.
//!
//! If a section fails, the files already written stay in place and the
//! manifest is written with `complete: false` before the error is returned.

use crate::config::SplitConfig;
use crate::error::SplitError;
use crate::output::{AnalysisResult, CatalogEntry, Manifest, SplitFile, SplitOutput};
use crate::pipeline::filename::derive_filenames;
use crate::pipeline::structure::SourceDocument;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Copy pages `start_page..=end_page` (0-based) into a standalone PDF.
pub fn slice_pages(
    source: &lopdf::Document,
    start_page: usize,
    end_page: usize,
) -> Result<Vec<u8>, String> {
    let page_numbers: Vec<u32> = source.get_pages().keys().copied().collect();
    if end_page >= page_numbers.len() || start_page > end_page {
        return Err(format!(
            "range {}-{} outside document of {} pages",
            start_page + 1,
            end_page + 1,
            page_numbers.len()
        ));
    }

    let mut doc = source.clone();
    let drop: Vec<u32> = page_numbers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i < start_page || *i > end_page)
        .map(|(_, n)| *n)
        .collect();
    if !drop.is_empty() {
        doc.delete_pages(&drop);
        doc.prune_objects();
    }

    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(|e| e.to_string())?;
    Ok(buf)
}

/// Materialize `analysis` from raw source bytes.
pub async fn materialize(
    source_bytes: &[u8],
    analysis: &AnalysisResult,
    out_dir: &Path,
    config: &SplitConfig,
) -> Result<SplitOutput, SplitError> {
    let bytes = source_bytes.to_vec();
    let name = analysis.source.name.clone();
    let doc = tokio::task::spawn_blocking(move || SourceDocument::load(&name, &bytes))
        .await
        .map_err(|e| SplitError::Internal(format!("Load task panicked: {e}")))??;
    materialize_document(Arc::new(doc), analysis, out_dir, config).await
}

/// Materialize `analysis` from an already parsed document.
pub async fn materialize_document(
    doc: Arc<SourceDocument>,
    analysis: &AnalysisResult,
    out_dir: &Path,
    config: &SplitConfig,
) -> Result<SplitOutput, SplitError> {
    analysis.validate(doc.page_count())?;

    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| SplitError::Materialization {
            path: out_dir.to_path_buf(),
            source: e,
        })?;

    let filenames = derive_filenames(analysis);
    let total = analysis.sections.len();
    let manifest_path = out_dir.join(&config.manifest_name);
    let mut files: Vec<SplitFile> = Vec::with_capacity(total);
    info!("Writing {} section(s) to {}", total, out_dir.display());

    for (section, filename) in analysis.sections.iter().zip(&filenames) {
        let path = out_dir.join(filename);
        let written = write_section(
            &doc,
            section.index,
            section.plan.start_page,
            section.plan.end_page,
            &path,
        )
        .await;
        match written {
            Ok(byte_size) => {
                debug!("Wrote {} ({} bytes)", filename, byte_size);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_written(section.index, total, filename);
                }
                files.push(SplitFile {
                    index: section.index,
                    filename: filename.clone(),
                    start_page: section.plan.start_page,
                    end_page: section.plan.end_page,
                    byte_size,
                });
            }
            Err(e) => {
                warn!("Section {} failed: {}", section.index, e);
                let manifest = build_manifest(analysis, files, &filenames, Some(e.to_string()));
                if let Err(me) = write_manifest(&manifest, &manifest_path).await {
                    warn!("Could not write incomplete manifest: {}", me);
                }
                return Err(e);
            }
        }
    }

    let manifest = build_manifest(analysis, files, &filenames, None);
    write_manifest(&manifest, &manifest_path).await?;
    info!("Manifest written to {}", manifest_path.display());

    Ok(SplitOutput {
        output_dir: out_dir.to_path_buf(),
        manifest_path,
        manifest,
    })
}

async fn write_section(
    doc: &Arc<SourceDocument>,
    index: usize,
    start_page: usize,
    end_page: usize,
    path: &Path,
) -> Result<u64, SplitError> {
    let doc = Arc::clone(doc);
    let pdf = tokio::task::spawn_blocking(move || slice_pages(doc.document(), start_page, end_page))
        .await
        .map_err(|e| SplitError::Internal(format!("Slice task panicked: {e}")))?
        .map_err(|detail| SplitError::SectionAssembly {
            section: index,
            start_page: start_page + 1,
            end_page: end_page + 1,
            detail,
        })?;
    write_atomic(path, &pdf).await?;
    Ok(pdf.len() as u64)
}

/// Write to `<path>.tmp`, then rename over `path`.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), SplitError> {
    let tmp_path = tmp_path_for(path);
    let result = match tokio::fs::write(&tmp_path, contents).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        // Only section files and the manifest may remain in the output dir.
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(SplitError::Materialization {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn build_manifest(
    analysis: &AnalysisResult,
    files: Vec<SplitFile>,
    filenames: &[String],
    error: Option<String>,
) -> Manifest {
    let written: HashSet<usize> = files.iter().map(|f| f.index).collect();
    let pdf_sections = analysis
        .sections
        .iter()
        .zip(filenames)
        .filter(|(s, _)| written.contains(&s.index))
        .map(|(s, filename)| CatalogEntry {
            output_filename: filename.clone(),
            title: s.metadata.title.clone(),
            description: s.metadata.description.clone(),
            keywords: s.metadata.keywords.join(","),
        })
        .collect();
    Manifest {
        complete: error.is_none(),
        error,
        files,
        pdf_sections,
        analysis: analysis.clone(),
    }
}

async fn write_manifest(manifest: &Manifest, path: &Path) -> Result<(), SplitError> {
    let json = serde_json::to_string_pretty(manifest)?;
    write_atomic(path, json.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_path_keeps_directory() {
        let p = tmp_path_for(Path::new("/out/Genel_01_1-4.pdf"));
        assert_eq!(p, PathBuf::from("/out/Genel_01_1-4.pdf.tmp"));
    }
}
