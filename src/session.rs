//! The two-phase workflow as an explicit state machine.
//!
//! ```text
//!   plan() ──▶ Planned ──preview()──▶ Previewed ──commit()──▶ Committed
//!                 │                      │  ▲
//!                 │                      │  └─ replace_analysis()
//!                 └──────abort()─────────┴──────abort()──────▶ Aborted
//! ```
//!
//! Files are only written by [`SplitSession::commit`], and only from
//! `Previewed`. A failed commit leaves the session in `Previewed` so the
//! caller can retry into another directory or abort.

use crate::analyze::{analyze_source, AnalyzedDocument};
use crate::config::SplitConfig;
use crate::error::SplitError;
use crate::output::{AnalysisResult, SplitOutput};
use crate::pipeline::acquire::DocumentSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Where a [`SplitSession`] is in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Planned,
    Previewed,
    Committed,
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Planned => "planned",
            SessionState::Previewed => "previewed",
            SessionState::Committed => "committed",
            SessionState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// One document moving through analyze → preview → commit.
pub struct SplitSession {
    state: SessionState,
    config: SplitConfig,
    /// Released on commit or abort so the scratch file goes away.
    document: Option<AnalyzedDocument>,
    analysis: AnalysisResult,
}

impl fmt::Debug for SplitSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitSession")
            .field("state", &self.state)
            .field("source", &self.analysis.source.name)
            .field("sections", &self.analysis.sections.len())
            .finish()
    }
}

impl SplitSession {
    /// Run phase 1 and enter `Planned`.
    pub async fn plan(source: DocumentSource, config: SplitConfig) -> Result<Self, SplitError> {
        let analyzed = analyze_source(source, &config).await?;
        Ok(Self::from_analyzed(analyzed, config))
    }

    /// Wrap an existing phase-1 result.
    pub fn from_analyzed(analyzed: AnalyzedDocument, config: SplitConfig) -> Self {
        let analysis = analyzed.result.clone();
        Self {
            state: SessionState::Planned,
            config,
            document: Some(analyzed),
            analysis,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The current analysis (possibly edited).
    pub fn analysis(&self) -> &AnalysisResult {
        &self.analysis
    }

    /// Show the analysis to the caller; enters `Previewed`.
    pub fn preview(&mut self) -> Result<&AnalysisResult, SplitError> {
        match self.state {
            SessionState::Planned | SessionState::Previewed => {
                self.state = SessionState::Previewed;
                Ok(&self.analysis)
            }
            other => Err(transition_error(other, "preview")),
        }
    }

    /// Swap in a reviewed/edited analysis. Only allowed in `Previewed`; the
    /// edit must still cover the same document exactly once.
    pub fn replace_analysis(&mut self, edited: AnalysisResult) -> Result<(), SplitError> {
        if self.state != SessionState::Previewed {
            return Err(transition_error(self.state, "edit"));
        }
        edited.validate(self.analysis.stats.page_count)?;
        self.analysis = edited;
        Ok(())
    }

    /// Phase 2: write section files and manifest into `out_dir`.
    pub async fn commit(&mut self, out_dir: impl AsRef<Path>) -> Result<SplitOutput, SplitError> {
        if self.state != SessionState::Previewed {
            return Err(transition_error(self.state, "commit"));
        }
        let Some(ref mut document) = self.document else {
            return Err(SplitError::Internal("session has no source document".into()));
        };
        document.result = self.analysis.clone();
        let output = document.materialize(out_dir, &self.config).await?;
        self.state = SessionState::Committed;
        self.document = None;
        info!("Session committed: {}", output.manifest_path.display());
        Ok(output)
    }

    /// Drop the plan without writing anything.
    pub fn abort(&mut self) -> Result<(), SplitError> {
        match self.state {
            SessionState::Planned | SessionState::Previewed => {
                self.state = SessionState::Aborted;
                self.document = None;
                info!("Session aborted");
                Ok(())
            }
            other => Err(transition_error(other, "abort")),
        }
    }

    /// Consume the session, keeping only the analysis.
    pub fn into_analysis(self) -> AnalysisResult {
        self.analysis
    }
}

fn transition_error(state: SessionState, action: &str) -> SplitError {
    SplitError::InvalidTransition {
        state: state.to_string(),
        action: action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display_and_serde() {
        assert_eq!(SessionState::Previewed.to_string(), "previewed");
        assert_eq!(
            serde_json::to_string(&SessionState::Committed).unwrap(),
            "\"committed\""
        );
    }

    #[test]
    fn transition_error_names_state_and_action() {
        let e = transition_error(SessionState::Planned, "commit");
        assert_eq!(e.to_string(), "Cannot commit a session in state 'planned'");
    }
}
