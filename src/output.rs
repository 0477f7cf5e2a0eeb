//! Output types: the section plan, its metadata, and the files written for it.
//!
//! [`AnalysisResult`] is the only artifact passed from phase 1 (analyze) to
//! phase 2 (materialize). It is a plain value: no file handles, no reference
//! to the source bytes, and it survives a JSON round trip unchanged so a
//! person can review or edit it between the two phases.

use crate::config::{FixedRangeParams, PlanStrategy};
use crate::error::SplitError;
use serde::{Deserialize, Serialize};

/// Version of the AnalysisResult JSON layout.
pub const ANALYSIS_SCHEMA_VERSION: u32 = 1;

/// Where a section boundary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Fixed,
    Ai,
}

/// One planned section: an inclusive, 0-indexed page range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPlan {
    pub start_page: usize,
    pub end_page: usize,
    pub source: PlanSource,
    /// Rationale given by the AI planner; `None` for fixed ranges.
    #[serde(rename = "plan_reasoning", default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl SectionPlan {
    pub fn fixed(start_page: usize, end_page: usize) -> Self {
        Self {
            start_page,
            end_page,
            source: PlanSource::Fixed,
            reasoning: None,
        }
    }

    pub fn ai(start_page: usize, end_page: usize, reasoning: impl Into<String>) -> Self {
        Self {
            start_page,
            end_page,
            source: PlanSource::Ai,
            reasoning: Some(reasoning.into()),
        }
    }

    /// Number of pages in the range.
    pub fn page_count(&self) -> usize {
        self.end_page + 1 - self.start_page
    }

    /// 1-indexed `a-b` label used in titles and filenames.
    pub fn label(&self) -> String {
        format!("{}-{}", self.start_page + 1, self.end_page + 1)
    }
}

/// Check that `plans` are ordered, contiguous, non-overlapping and cover
/// `[0, page_count - 1]` exactly once.
pub fn check_coverage(plans: &[SectionPlan], page_count: usize) -> Result<(), String> {
    if page_count == 0 {
        return Err("document has no pages".into());
    }
    if plans.is_empty() {
        return Err("plan has no sections".into());
    }
    let mut expected = 0usize;
    for (i, p) in plans.iter().enumerate() {
        if p.start_page > p.end_page {
            return Err(format!(
                "section {} is reversed ({} > {})",
                i + 1,
                p.start_page,
                p.end_page
            ));
        }
        if p.start_page != expected {
            return Err(format!(
                "section {} starts at page index {}, expected {}",
                i + 1,
                p.start_page,
                expected
            ));
        }
        expected = p.end_page + 1;
    }
    if expected != page_count {
        return Err(format!(
            "plan ends at page index {}, document has {} pages",
            expected - 1,
            page_count
        ));
    }
    Ok(())
}

/// Retrieval metadata for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMetadata {
    pub title: String,
    pub description: String,
    /// Ordered, de-duplicated keywords in their natural language and casing.
    pub keywords: Vec<String>,
    pub reasoning: String,
    /// True when this is placeholder metadata rather than an AI result.
    #[serde(default)]
    pub fallback: bool,
}

impl SectionMetadata {
    /// Placeholder used when synthesis is skipped or fails.
    pub fn placeholder(plan: &SectionPlan, reason: impl Into<String>) -> Self {
        Self {
            title: format!("Pages {}", plan.label()),
            description: String::new(),
            keywords: Vec::new(),
            reasoning: reason.into(),
            fallback: true,
        }
    }
}

/// A planned section paired with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedSection {
    /// 1-indexed position in the plan.
    pub index: usize,
    #[serde(flatten)]
    pub plan: SectionPlan,
    #[serde(flatten)]
    pub metadata: SectionMetadata,
    /// Fallback decisions that affected this section.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Identity of the analysed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// File stem used for fallback filenames.
    pub name: String,
    pub byte_size: u64,
}

/// Run statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub page_count: usize,
    pub section_count: usize,
    /// Strategy the caller asked for.
    pub strategy: PlanStrategy,
    /// Strategy whose plan was accepted.
    pub strategy_used: PlanStrategy,
    /// Bounds of the fixed plan, when one was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_params: Option<FixedRangeParams>,
    pub generated_sections: usize,
    pub fallback_sections: usize,
    #[serde(default)]
    pub ocr_pages: usize,
    #[serde(default)]
    pub total_input_tokens: u64,
    #[serde(default)]
    pub total_output_tokens: u64,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Everything phase 1 produces; the input of phase 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub schema_version: u32,
    pub source: SourceInfo,
    /// AI-suggested name for the whole document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    /// Advisory shown to the caller (e.g. small document).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
    pub stats: AnalysisStats,
    pub sections: Vec<AnalyzedSection>,
    /// Run-level fallback decisions.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    /// The bare section plans in order.
    pub fn plans(&self) -> Vec<SectionPlan> {
        self.sections.iter().map(|s| s.plan.clone()).collect()
    }

    /// Verify the plan still covers a document of `page_count` pages and that
    /// section indices are 1..=n. Called before materializing an analysis that
    /// may have been edited by hand.
    pub fn validate(&self, page_count: usize) -> Result<(), SplitError> {
        if self.stats.page_count != page_count {
            return Err(SplitError::InvalidPlan(format!(
                "analysis was made for {} pages, document has {}",
                self.stats.page_count, page_count
            )));
        }
        check_coverage(&self.plans(), page_count).map_err(SplitError::InvalidPlan)?;
        for (i, s) in self.sections.iter().enumerate() {
            if s.index != i + 1 {
                return Err(SplitError::InvalidPlan(format!(
                    "section at position {} has index {}",
                    i + 1,
                    s.index
                )));
            }
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String, SplitError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SplitError> {
        let result: AnalysisResult = serde_json::from_str(json)?;
        if result.schema_version != ANALYSIS_SCHEMA_VERSION {
            return Err(SplitError::InvalidPlan(format!(
                "unsupported analysis schema version {}",
                result.schema_version
            )));
        }
        Ok(result)
    }
}

/// One section file written by the materializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitFile {
    pub index: usize,
    pub filename: String,
    pub start_page: usize,
    pub end_page: usize,
    pub byte_size: u64,
}

/// Catalog-upload view of one section (the bulk-upload `metadata` field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub output_filename: String,
    pub title: String,
    pub description: String,
    /// Comma-joined keywords.
    pub keywords: String,
}

/// The manifest JSON written next to the section PDFs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// False when a section failed to write; earlier files remain valid.
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub files: Vec<SplitFile>,
    pub pdf_sections: Vec<CatalogEntry>,
    pub analysis: AnalysisResult,
}

/// Result of a successful materialization.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutput {
    pub output_dir: std::path::PathBuf,
    pub manifest_path: std::path::PathBuf,
    pub manifest: Manifest,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> AnalysisResult {
        let p1 = SectionPlan::ai(0, 3, "Giriş ve genel kavramlar");
        let p2 = SectionPlan::fixed(4, 6);
        AnalysisResult {
            schema_version: ANALYSIS_SCHEMA_VERSION,
            source: SourceInfo {
                name: "mevzuat".into(),
                byte_size: 4096,
            },
            document_title: Some("Sosyal Güvenlik Mevzuatı".into()),
            advisory: None,
            stats: AnalysisStats {
                page_count: 7,
                section_count: 2,
                strategy: PlanStrategy::AiSuggested,
                strategy_used: PlanStrategy::AiSuggested,
                fixed_params: None,
                generated_sections: 1,
                fallback_sections: 1,
                ocr_pages: 0,
                total_input_tokens: 10,
                total_output_tokens: 5,
                duration_ms: 12,
            },
            sections: vec![
                AnalyzedSection {
                    index: 1,
                    metadata: SectionMetadata {
                        title: "Prim Borcu Yapılandırması".into(),
                        description: "Prim borçlarının taksitlendirilmesi.".into(),
                        keywords: vec!["prim borcu".into(), "taksit".into()],
                        reasoning: "Bölüm prim borçlarını anlatıyor.".into(),
                        fallback: false,
                    },
                    plan: p1,
                    warnings: vec![],
                },
                AnalyzedSection {
                    index: 2,
                    metadata: SectionMetadata::placeholder(&p2, "insufficient content"),
                    plan: p2,
                    warnings: vec!["insufficient content".into()],
                },
            ],
            warnings: vec!["metadata fell back for 1 section".into()],
        }
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let result = sample_result();
        let json = result.to_json_pretty().unwrap();
        let back = AnalysisResult::from_json(&json).unwrap();
        assert_eq!(back, result);
        // Turkish letters survive untouched.
        assert!(json.contains("Yapılandırması"));
        assert!(json.contains("\"plan_reasoning\""));
    }

    #[test]
    fn flattened_section_layout() {
        let json = serde_json::to_value(sample_result()).unwrap();
        let s = &json["sections"][0];
        assert_eq!(s["start_page"], 0);
        assert_eq!(s["end_page"], 3);
        assert_eq!(s["source"], "ai");
        assert_eq!(s["keywords"][0], "prim borcu");
        assert!(s.get("warnings").is_none());
    }

    #[test]
    fn coverage_accepts_exact_cover() {
        let plans = vec![SectionPlan::fixed(0, 3), SectionPlan::fixed(4, 9)];
        assert!(check_coverage(&plans, 10).is_ok());
    }

    #[test]
    fn coverage_rejects_gap_overlap_and_short() {
        let gap = vec![SectionPlan::fixed(0, 3), SectionPlan::fixed(5, 9)];
        assert!(check_coverage(&gap, 10).is_err());
        let overlap = vec![SectionPlan::fixed(0, 4), SectionPlan::fixed(4, 9)];
        assert!(check_coverage(&overlap, 10).is_err());
        let short = vec![SectionPlan::fixed(0, 8)];
        assert!(check_coverage(&short, 10).is_err());
        assert!(check_coverage(&[], 10).is_err());
    }

    #[test]
    fn validate_rejects_page_count_mismatch() {
        let result = sample_result();
        assert!(result.validate(7).is_ok());
        assert!(matches!(result.validate(8), Err(SplitError::InvalidPlan(_))));
    }

    #[test]
    fn placeholder_mentions_page_range() {
        let plan = SectionPlan::fixed(4, 6);
        let meta = SectionMetadata::placeholder(&plan, "x");
        assert_eq!(meta.title, "Pages 5-7");
        assert!(meta.fallback);
        assert!(meta.keywords.is_empty());
    }
}
