//! Boundary planning: turn a page count (and page text) into section ranges.
//!
//! Two strategies share one output type, an ordered `Vec<SectionPlan>` that
//! covers `[0, page_count - 1]` exactly once:
//!
//! * **Fixed-Range**: consecutive ranges of `max_pages`; the last range takes
//!   whatever is left, even below `min_pages`.
//! * **AI-Suggested**: one planning call over a budgeted page sample. The
//!   reply is checked against the coverage rule; anything beyond two small
//!   repairs at the document end rejects it, and the Fixed-Range plan with
//!   default bounds is used instead.

use crate::config::{FixedRangeParams, PlanStrategy, PlanningSample, SplitConfig};
use crate::error::PlanningValidationError;
use crate::output::SectionPlan;
use crate::pipeline::llm::{call_with_retry, extract_json_array, CompletionBackend, CompletionRequest};
use crate::pipeline::structure::{small_document_advisory, truncate_chars};
use crate::prompts::{planning_prompt, PLANNING_SYSTEM_PROMPT};
use serde_json::Value;
use tracing::{info, warn};

/// Characters reserved per sampled page for its `--- PAGE n ---` header.
const PAGE_HEADER_ALLOWANCE: usize = 24;

/// A settled plan plus the bookkeeping that goes into the AnalysisResult.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub plans: Vec<SectionPlan>,
    pub strategy_used: PlanStrategy,
    /// Bounds used when the plan is fixed-range.
    pub fixed_params: Option<FixedRangeParams>,
    pub advisory: Option<String>,
    pub warnings: Vec<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl PlanOutcome {
    fn fixed(page_count: usize, params: FixedRangeParams) -> Self {
        Self {
            plans: fixed_range_plan(page_count, params),
            strategy_used: PlanStrategy::Fixed,
            fixed_params: Some(params),
            advisory: None,
            warnings: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

// ── Fixed-Range ──────────────────────────────────────────────────────────

/// Deterministic ranges of `max_pages`, the last one absorbing the remainder.
///
/// ```rust
/// use edgequake_pdfsplit::{fixed_range_plan, FixedRangeParams};
///
/// let plan = fixed_range_plan(10, FixedRangeParams::new(3, 4));
/// let ranges: Vec<_> = plan.iter().map(|p| (p.start_page, p.end_page)).collect();
/// assert_eq!(ranges, vec![(0, 3), (4, 7), (8, 9)]);
/// ```
pub fn fixed_range_plan(page_count: usize, params: FixedRangeParams) -> Vec<SectionPlan> {
    let step = params.max_pages.max(1);
    let mut plans = Vec::with_capacity(page_count.div_ceil(step));
    let mut start = 0;
    while start < page_count {
        let end = (start + step).min(page_count) - 1;
        plans.push(SectionPlan::fixed(start, end));
        start = end + 1;
    }
    plans
}

// ── AI-Suggested ─────────────────────────────────────────────────────────

/// Page indices included in the planning sample.
///
/// All pages when they fit in the budget; otherwise an even stride over the
/// document that always contains the first and last page.
pub fn select_sample_pages(page_count: usize, sample: PlanningSample) -> Vec<usize> {
    if page_count == 0 {
        return Vec::new();
    }
    let per_page = sample.per_page_chars + PAGE_HEADER_ALLOWANCE;
    let fit = (sample.char_budget / per_page).max(1);
    if page_count <= fit {
        return (0..page_count).collect();
    }
    if fit == 1 {
        return vec![0];
    }
    let last = page_count - 1;
    let mut picked: Vec<usize> = (0..fit)
        .map(|i| (i * last + (fit - 1) / 2) / (fit - 1))
        .collect();
    picked.dedup();
    picked
}

/// Assemble the planning sample: `--- PAGE n ---` plus at most
/// `per_page_chars` characters per selected page, hard-capped at `char_budget`.
pub fn sample_for_planning(page_texts: &[&str], sample: PlanningSample) -> String {
    let mut out = String::new();
    for index in select_sample_pages(page_texts.len(), sample) {
        let text = truncate_chars(page_texts[index], sample.per_page_chars);
        out.push_str(&format!("--- PAGE {} ---\n", index + 1));
        if text.is_empty() {
            out.push_str("(no extractable text)");
        } else {
            out.push_str(text);
        }
        out.push_str("\n\n");
    }
    truncate_chars(out.trim_end(), sample.char_budget).to_string()
}

/// Parse and check an AI planning reply for a `page_count`-page document.
///
/// The reply must contain a JSON array of `{start_page, end_page, reason}`
/// with 1-indexed inclusive pages. Returns the 0-indexed plan and the list
/// of repairs applied (final section trimmed or extended to the last page).
pub fn parse_ai_plan(
    reply: &str,
    page_count: usize,
    max_sections: usize,
) -> Result<(Vec<SectionPlan>, Vec<String>), PlanningValidationError> {
    let json = extract_json_array(reply)
        .ok_or_else(|| PlanningValidationError::Unparseable("no JSON array in reply".into()))?;
    let raw: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| PlanningValidationError::Unparseable(e.to_string()))?;

    if raw.is_empty() {
        return Err(PlanningValidationError::Empty);
    }
    if raw.len() > max_sections {
        return Err(PlanningValidationError::TooManySections {
            count: raw.len(),
            limit: max_sections,
        });
    }

    let mut plans = Vec::with_capacity(raw.len());
    let mut repairs = Vec::new();
    let mut expected = 1usize;

    for (i, entry) in raw.iter().enumerate() {
        let index = i + 1;
        let (Some(start), Some(mut end)) = (
            page_number(entry.get("start_page")),
            page_number(entry.get("end_page")),
        ) else {
            return Err(PlanningValidationError::Unparseable(format!(
                "section {index} lacks numeric start_page/end_page"
            )));
        };

        if start != expected {
            return Err(PlanningValidationError::NotContiguous {
                index,
                expected,
                found: start,
            });
        }
        if start > page_count {
            return Err(PlanningValidationError::OutOfRange {
                index,
                page: start,
                last_page: page_count,
            });
        }
        if end < start {
            return Err(PlanningValidationError::Reversed {
                index,
                start_page: start,
                end_page: end,
            });
        }

        if index < raw.len() && end > page_count {
            return Err(PlanningValidationError::OutOfRange {
                index,
                page: end,
                last_page: page_count,
            });
        }
        if index == raw.len() {
            if end > page_count {
                repairs.push(format!(
                    "AI plan ended at page {end}, trimmed to last page {page_count}"
                ));
                end = page_count;
            } else if end < page_count {
                repairs.push(format!(
                    "AI plan stopped at page {end}, final section extended to page {page_count}"
                ));
                end = page_count;
            }
        }

        let reason = entry
            .get("reason")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("AI-suggested section");
        plans.push(SectionPlan::ai(start - 1, end - 1, reason));
        expected = end + 1;
    }

    Ok((plans, repairs))
}

/// Integers and numeric strings both occur in model output.
fn page_number(value: Option<&Value>) -> Option<usize> {
    match value? {
        Value::Number(n) => n.as_u64().map(|v| v as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Run the configured strategy, falling back to Fixed-Range defaults when
/// the AI plan is unusable.
///
/// `page_texts` holds every page's text (full extraction); it is only read
/// by the AI strategy. `backend` is `None` when no AI provider resolved.
pub async fn plan_sections(
    page_texts: &[&str],
    backend: Option<&dyn CompletionBackend>,
    config: &SplitConfig,
) -> PlanOutcome {
    let page_count = page_texts.len();
    let advisory = small_document_advisory(page_count, config.small_document_threshold);

    if advisory.is_some() && !config.split_small_documents {
        info!("{page_count}-page document: planning a single section");
        return PlanOutcome {
            plans: vec![SectionPlan::fixed(0, page_count.saturating_sub(1))],
            strategy_used: PlanStrategy::Fixed,
            fixed_params: None,
            advisory,
            warnings: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
        };
    }

    let mut outcome = match config.strategy {
        PlanStrategy::Fixed => PlanOutcome::fixed(page_count, config.fixed),
        PlanStrategy::AiSuggested => match backend {
            Some(backend) => plan_with_ai(page_texts, backend, config).await,
            None => {
                let reason = "no AI provider available for boundary planning";
                warn!("{reason}; using fixed ranges");
                fallback_outcome(page_count, reason.to_string())
            }
        },
    };
    outcome.advisory = advisory;
    info!(
        "Planned {} sections ({})",
        outcome.plans.len(),
        outcome.strategy_used
    );
    outcome
}

async fn plan_with_ai(
    page_texts: &[&str],
    backend: &dyn CompletionBackend,
    config: &SplitConfig,
) -> PlanOutcome {
    let page_count = page_texts.len();
    let samples = sample_for_planning(page_texts, config.planning_sample);
    let request = CompletionRequest {
        system: PLANNING_SYSTEM_PROMPT.to_string(),
        user: planning_prompt(page_count, config.max_ai_sections, &samples),
        temperature: config.planning_temperature,
        max_tokens: config.planning_max_tokens,
    };

    let completion = match call_with_retry(backend, &request, config, "boundary planning").await {
        Ok(c) => c,
        Err(e) => {
            let err = PlanningValidationError::CallFailed(e.to_string());
            return fallback_outcome(page_count, err.to_string());
        }
    };

    let mut outcome = match parse_ai_plan(&completion.content, page_count, config.max_ai_sections) {
        Ok((plans, repairs)) => {
            for r in &repairs {
                warn!("{r}");
            }
            PlanOutcome {
                plans,
                strategy_used: PlanStrategy::AiSuggested,
                fixed_params: None,
                advisory: None,
                warnings: repairs,
                input_tokens: 0,
                output_tokens: 0,
            }
        }
        Err(err) => fallback_outcome(page_count, err.to_string()),
    };
    outcome.input_tokens = completion.input_tokens as u64;
    outcome.output_tokens = completion.output_tokens as u64;
    outcome
}

fn fallback_outcome(page_count: usize, reason: String) -> PlanOutcome {
    let params = FixedRangeParams::default();
    let warning = format!(
        "{reason}; using fixed ranges of {}-{} pages",
        params.min_pages, params.max_pages
    );
    warn!("{warning}");
    let mut outcome = PlanOutcome::fixed(page_count, params);
    outcome.warnings.push(warning);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{check_coverage, PlanSource};

    fn ranges(plans: &[SectionPlan]) -> Vec<(usize, usize)> {
        plans.iter().map(|p| (p.start_page, p.end_page)).collect()
    }

    #[test]
    fn fixed_ten_pages_three_four() {
        let plan = fixed_range_plan(10, FixedRangeParams::new(3, 4));
        assert_eq!(ranges(&plan), vec![(0, 3), (4, 7), (8, 9)]);
        assert!(plan.iter().all(|p| p.source == PlanSource::Fixed));
    }

    #[test]
    fn fixed_plan_always_covers_document() {
        for n in 1..=80 {
            for min in 1..=6 {
                for max in min..=12 {
                    let plan = fixed_range_plan(n, FixedRangeParams::new(min, max));
                    check_coverage(&plan, n).unwrap_or_else(|e| {
                        panic!("n={n} min={min} max={max}: {e}")
                    });
                    assert!(plan.iter().all(|p| p.page_count() <= max));
                    // Only the final range may fall below min_pages.
                    let head = &plan[..plan.len() - 1];
                    assert!(head.iter().all(|p| p.page_count() >= min));
                }
            }
        }
    }

    #[test]
    fn sample_includes_all_pages_when_they_fit() {
        let s = PlanningSample::default();
        assert_eq!(select_sample_pages(5, s), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn sample_stride_keeps_first_and_last() {
        let s = PlanningSample {
            per_page_chars: 500,
            char_budget: 12_000,
        };
        let picked = select_sample_pages(200, s);
        assert_eq!(picked.first(), Some(&0));
        assert_eq!(picked.last(), Some(&199));
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(picked.len(), 12_000 / (500 + PAGE_HEADER_ALLOWANCE));
    }

    #[test]
    fn sample_text_is_capped_and_headed() {
        let long = "ş".repeat(2000);
        let pages: Vec<&str> = vec![long.as_str(); 100];
        let s = PlanningSample {
            per_page_chars: 500,
            char_budget: 3000,
        };
        let text = sample_for_planning(&pages, s);
        assert!(text.starts_with("--- PAGE 1 ---\n"));
        assert!(text.contains("--- PAGE 100 ---"));
        assert!(text.chars().count() <= 3000);
    }

    #[test]
    fn parses_valid_plan_as_zero_indexed() {
        let reply = r#"```json
[{"start_page": 1, "end_page": 4, "reason": "Giriş"},
 {"start_page": 5, "end_page": 12, "reason": "Prim borçları"}]
```"#;
        let (plans, repairs) = parse_ai_plan(reply, 12, 15).unwrap();
        assert_eq!(ranges(&plans), vec![(0, 3), (4, 11)]);
        assert_eq!(plans[1].reasoning.as_deref(), Some("Prim borçları"));
        assert!(repairs.is_empty());
    }

    #[test]
    fn repairs_final_section_end() {
        let short = r#"[{"start_page": 1, "end_page": 6}, {"start_page": 7, "end_page": 9}]"#;
        let (plans, repairs) = parse_ai_plan(short, 12, 15).unwrap();
        assert_eq!(ranges(&plans), vec![(0, 5), (6, 11)]);
        assert_eq!(repairs.len(), 1);

        let long = r#"[{"start_page": "1", "end_page": "20"}]"#;
        let (plans, repairs) = parse_ai_plan(long, 12, 15).unwrap();
        assert_eq!(ranges(&plans), vec![(0, 11)]);
        assert!(repairs[0].contains("trimmed"));
    }

    #[test]
    fn rejects_gap_overlap_and_bad_shapes() {
        let gap = r#"[{"start_page": 1, "end_page": 4}, {"start_page": 6, "end_page": 12}]"#;
        assert!(matches!(
            parse_ai_plan(gap, 12, 15),
            Err(PlanningValidationError::NotContiguous { index: 2, expected: 5, found: 6 })
        ));
        let overlap = r#"[{"start_page": 1, "end_page": 5}, {"start_page": 5, "end_page": 12}]"#;
        assert!(parse_ai_plan(overlap, 12, 15).is_err());
        let zero_based = r#"[{"start_page": 0, "end_page": 11}]"#;
        assert!(parse_ai_plan(zero_based, 12, 15).is_err());
        let reversed = r#"[{"start_page": 1, "end_page": 0}]"#;
        assert!(matches!(
            parse_ai_plan(reversed, 12, 15),
            Err(PlanningValidationError::Reversed { .. })
        ));
        let beyond = r#"[{"start_page": 1, "end_page": 12}, {"start_page": 13, "end_page": 14}]"#;
        assert!(matches!(
            parse_ai_plan(beyond, 12, 15),
            Err(PlanningValidationError::OutOfRange { .. })
        ));
        assert_eq!(parse_ai_plan("[]", 12, 15), Err(PlanningValidationError::Empty));
        let runaway = r#"[{"start_page": 1, "end_page": 18446744073709551615},
                          {"start_page": 2, "end_page": 12}]"#;
        assert!(matches!(
            parse_ai_plan(runaway, 12, 15),
            Err(PlanningValidationError::OutOfRange { index: 1, last_page: 12, .. })
        ));
        let past_end = r#"[{"start_page": 1, "end_page": 13}, {"start_page": 14, "end_page": 14}]"#;
        assert!(matches!(
            parse_ai_plan(past_end, 12, 15),
            Err(PlanningValidationError::OutOfRange { index: 1, .. })
        ));
        assert!(matches!(
            parse_ai_plan("I cannot help", 12, 15),
            Err(PlanningValidationError::Unparseable(_))
        ));
        let many: Vec<String> = (1..=16)
            .map(|p| format!(r#"{{"start_page": {p}, "end_page": {p}}}"#))
            .collect();
        let many = format!("[{}]", many.join(","));
        assert!(matches!(
            parse_ai_plan(&many, 16, 15),
            Err(PlanningValidationError::TooManySections { count: 16, limit: 15 })
        ));
    }

    #[tokio::test]
    async fn small_document_short_circuits_to_one_section() {
        let pages = vec!["a"; 3];
        let config = SplitConfig::default();
        let out = plan_sections(&pages, None, &config).await;
        assert_eq!(ranges(&out.plans), vec![(0, 2)]);
        assert!(out.advisory.is_some());
        assert!(out.warnings.is_empty());
    }

    #[tokio::test]
    async fn small_document_can_still_be_split() {
        let pages = vec!["a"; 3];
        let config = SplitConfig::builder()
            .split_small_documents(true)
            .strategy(PlanStrategy::Fixed)
            .fixed_range(FixedRangeParams::new(1, 2))
            .build()
            .unwrap();
        let out = plan_sections(&pages, None, &config).await;
        assert_eq!(ranges(&out.plans), vec![(0, 1), (2, 2)]);
        assert!(out.advisory.is_some());
    }

    #[tokio::test]
    async fn missing_backend_falls_back_to_default_fixed_plan() {
        let pages = vec!["text"; 25];
        let out = plan_sections(&pages, None, &SplitConfig::default()).await;
        assert_eq!(out.plans, fixed_range_plan(25, FixedRangeParams::default()));
        assert_eq!(out.strategy_used, PlanStrategy::Fixed);
        assert_eq!(out.warnings.len(), 1);
    }
}
