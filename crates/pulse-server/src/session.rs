//! Analysis sessions and their lifecycle
//!
//! A session moves `PENDING → RUNNING → COMPLETE | ERROR`, or straight from
//! `PENDING` to `ERROR` when its run cannot start. Every mutation goes through
//! a transition method here so the lifecycle rules hold no matter who calls.

use crate::error::{Result, ServiceError};
use crate::pipeline::Stage;
use chrono::{DateTime, Utc};
use pulse_analysis::{DateRange, ReportArtifact, Signal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// What a session analyses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectParameters {
    /// Upper-cased ticker
    pub symbol: String,
    #[serde(flatten)]
    pub range: DateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Running,
    Complete,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Complete => "COMPLETE",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Headline numbers of a finished report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub overall: Option<Signal>,
    pub confidence: f64,
    pub bullish: usize,
    pub bearish: usize,
    pub last_close: f64,
    pub has_insights: bool,
}

impl From<&ReportArtifact> for ReportSummary {
    fn from(artifact: &ReportArtifact) -> Self {
        Self {
            overall: artifact.signals.overall,
            confidence: artifact.signals.confidence,
            bullish: artifact.signals.bullish.len(),
            bearish: artifact.signals.bearish.len(),
            last_close: artifact.last_close,
            has_insights: artifact.has_insights,
        }
    }
}

/// Where a finished report lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportHandle {
    pub session_id: SessionId,
    /// File the HTML was written to
    pub path: PathBuf,
    /// Path of the HTTP endpoint serving it
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReportSummary>,
}

impl ReportHandle {
    pub fn new(session_id: SessionId, path: PathBuf) -> Self {
        Self {
            session_id,
            path,
            url: format!("/api/report/{session_id}"),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: ReportSummary) -> Self {
        self.summary = Some(summary);
        self
    }
}

/// Snapshot of one analysis session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub subject: SubjectParameters,
    pub status: SessionStatus,
    /// Percent complete, never decreasing
    pub progress: u8,
    pub current_step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Stage that was running when the session failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_handle: Option<ReportHandle>,
}

impl Session {
    pub fn new(subject: SubjectParameters) -> Self {
        Self {
            id: SessionId::new(),
            subject,
            status: SessionStatus::Pending,
            progress: 0,
            current_step: "Queued".to_string(),
            error_detail: None,
            failed_stage: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            report_handle: None,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> ServiceError {
        ServiceError::InvalidTransition {
            id: self.id,
            reason: reason.into(),
        }
    }

    /// `PENDING → RUNNING`
    pub fn start(&mut self) -> Result<()> {
        if self.status != SessionStatus::Pending {
            return Err(self.invalid(format!("cannot start a {} session", self.status)));
        }
        self.status = SessionStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Raise progress to at least `progress` and record the active step
    ///
    /// A lower value than the current progress leaves progress unchanged.
    pub fn advance(&mut self, progress: u8, step: impl Into<String>) -> Result<()> {
        if self.status != SessionStatus::Running {
            return Err(self.invalid(format!("cannot advance a {} session", self.status)));
        }
        if progress > 100 {
            return Err(self.invalid(format!("progress {progress} is out of range")));
        }
        self.progress = self.progress.max(progress);
        self.current_step = step.into();
        Ok(())
    }

    /// `RUNNING → COMPLETE`, recording where the report went
    pub fn complete(&mut self, handle: ReportHandle) -> Result<()> {
        if self.status != SessionStatus::Running {
            return Err(self.invalid(format!("cannot complete a {} session", self.status)));
        }
        if handle.session_id != self.id {
            return Err(self.invalid(format!("report belongs to session {}", handle.session_id)));
        }
        self.status = SessionStatus::Complete;
        self.progress = 100;
        self.current_step = "Ready to view".to_string();
        self.completed_at = Some(Utc::now());
        self.report_handle = Some(handle);
        Ok(())
    }

    /// `PENDING | RUNNING → ERROR`
    pub fn fail(&mut self, stage: Stage, detail: impl Into<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.invalid(format!("cannot fail a {} session", self.status)));
        }
        self.status = SessionStatus::Error;
        self.error_detail = Some(detail.into());
        self.failed_stage = Some(stage);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Whether the session reached a terminal status before `cutoff`
    pub fn finished_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.status.is_terminal() && self.completed_at.is_some_and(|at| at < cutoff)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::subject;
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut session = Session::new(subject("AAPL"));
        assert_eq!(session.status, SessionStatus::Pending);

        session.start().unwrap();
        session.advance(15, "Calculating indicators").unwrap();
        session.advance(40, "Analyzing patterns").unwrap();

        let handle = ReportHandle::new(session.id, PathBuf::from("reports/x.html"));
        session.complete(handle.clone()).unwrap();

        assert_eq!(session.status, SessionStatus::Complete);
        assert_eq!(session.progress, 100);
        assert_eq!(session.report_handle, Some(handle));
        assert!(session.completed_at.is_some());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut session = Session::new(subject("AAPL"));
        session.start().unwrap();
        session.advance(70, "Generating trading signals").unwrap();
        session.advance(40, "late").unwrap();
        assert_eq!(session.progress, 70);
        assert_eq!(session.current_step, "late");
        assert!(session.advance(101, "overflow").is_err());
    }

    #[test]
    fn test_status_is_one_way() {
        let mut session = Session::new(subject("AAPL"));
        session.start().unwrap();
        assert!(session.start().is_err());

        session.fail(Stage::Fetch, "no data found for symbol").unwrap();
        assert_eq!(session.status, SessionStatus::Error);
        assert_eq!(session.failed_stage, Some(Stage::Fetch));
        assert!(session.report_handle.is_none());

        let handle = ReportHandle::new(session.id, PathBuf::from("r.html"));
        assert!(session.complete(handle).is_err());
        assert!(session.fail(Stage::Report, "again").is_err());
        assert!(session.advance(90, "x").is_err());
    }

    #[test]
    fn test_pending_can_fail_but_not_complete() {
        let mut session = Session::new(subject("AAPL"));
        let handle = ReportHandle::new(session.id, PathBuf::from("r.html"));
        assert!(session.complete(handle).is_err());

        session.fail(Stage::Init, "could not start").unwrap();
        assert_eq!(session.status, SessionStatus::Error);
        assert_eq!(session.error_detail.as_deref(), Some("could not start"));
    }

    #[test]
    fn test_foreign_report_handle_rejected() {
        let mut session = Session::new(subject("AAPL"));
        session.start().unwrap();
        let handle = ReportHandle::new(SessionId::new(), PathBuf::from("r.html"));
        assert!(matches!(
            session.complete(handle),
            Err(ServiceError::InvalidTransition { .. })
        ));
        assert_eq!(session.status, SessionStatus::Running);
    }

    #[test]
    fn test_session_id_round_trip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let session = Session::new(subject("AAPL"));
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["subject"]["symbol"], "AAPL");
        assert_eq!(json["subject"]["start"], "2024-01-01");
        assert!(json.get("report_handle").is_none());
        assert!(json.get("error_detail").is_none());
    }
}
