//! Pipeline stages for splitting a PDF into annotated sections.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! acquire ──▶ structure ──▶ [ocr] ──▶ plan ──▶ synthesize ══▶ materialize
//! (bytes/URL)  (lopdf text)  (vision)  (ranges)  (metadata)     (files)
//!                                                    ▲
//!                                      phase 1 ends here; phase 2 runs
//!                                      only after the caller confirms
//! ```
//!
//! 1. [`acquire`]   : validated PDF bytes plus a scratch file, retrying downloads
//! 2. [`structure`] : page count and cached per-page text
//! 3. [`ocr`]       : optional transcript for image-only pages
//! 4. [`plan`]      : Fixed-Range or AI-Suggested section boundaries
//! 5. [`synthesize`]: per-section title/description/keywords with fallback
//! 6. [`filename`]  : transliterated, collision-free section file names
//! 7. [`materialize`]: slice, write atomically, emit the manifest
//!
//! [`llm`] is shared by the AI-calling stages: the completion seam, the
//! timeout/retry loop and JSON extraction from model output.

pub mod acquire;
pub mod filename;
pub mod llm;
pub mod materialize;
pub mod ocr;
pub mod plan;
pub mod structure;
pub mod synthesize;
