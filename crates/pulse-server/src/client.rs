//! Client-side view state for one analysis
//!
//! [`ViewController`] is a pure state machine fed by progress events and
//! polled snapshots. [`watch_session`] drives it against a service, mixing
//! the live event feed with periodic status polls so a missed event is
//! recovered on the next poll.

use crate::broadcaster::{ProgressEnvelope, ProgressEvent};
use crate::error::Result;
use crate::service::AnalysisService;
use crate::session::{ReportHandle, Session, SessionId, SessionStatus};
use serde::Serialize;
use std::time::Duration;

/// What the user is looking at
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    /// The submission form, optionally showing why the last attempt was rejected
    Submission { error: Option<String> },
    /// Progress of a running session
    ///
    /// A terminal failure keeps this view with `error` set until acknowledged.
    Progress {
        session_id: SessionId,
        progress: u8,
        step: String,
        error: Option<String>,
        last_seq: u64,
    },
    /// The finished report
    Report {
        session_id: SessionId,
        handle: ReportHandle,
    },
}

#[derive(Debug, Clone)]
pub struct ViewController {
    view: View,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self {
            view: View::Submission { error: None },
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// Session currently shown, if any
    pub fn session_id(&self) -> Option<SessionId> {
        match &self.view {
            View::Submission { .. } => None,
            View::Progress { session_id, .. } | View::Report { session_id, .. } => Some(*session_id),
        }
    }

    /// Still waiting on a session that has not finished
    pub fn is_watching(&self) -> bool {
        matches!(self.view, View::Progress { error: None, .. })
    }

    /// The service accepted a submission
    pub fn submission_accepted(&mut self, session_id: SessionId) -> bool {
        if !matches!(self.view, View::Submission { .. }) {
            return false;
        }
        self.view = View::Progress {
            session_id,
            progress: 0,
            step: "Queued".to_string(),
            error: None,
            last_seq: 0,
        };
        true
    }

    /// The service rejected a submission
    pub fn submission_rejected(&mut self, message: impl Into<String>) -> bool {
        if !matches!(self.view, View::Submission { .. }) {
            return false;
        }
        self.view = View::Submission {
            error: Some(message.into()),
        };
        true
    }

    /// Apply a live event; returns whether the view changed
    ///
    /// Events for another session, replayed sequence numbers and progress
    /// going backwards are ignored.
    pub fn on_event(&mut self, envelope: &ProgressEnvelope) -> bool {
        let View::Progress {
            session_id,
            progress,
            step,
            error,
            last_seq,
        } = &mut self.view
        else {
            return false;
        };
        if envelope.session_id != *session_id || error.is_some() {
            return false;
        }

        match &envelope.event {
            ProgressEvent::Progress {
                progress: value,
                step: label,
            } => {
                if envelope.seq <= *last_seq || *value < *progress {
                    return false;
                }
                *last_seq = envelope.seq;
                *progress = *value;
                label.clone_into(step);
                true
            },
            ProgressEvent::Error { stage, detail } => {
                *last_seq = (*last_seq).max(envelope.seq);
                *error = Some(failure_message(stage, detail));
                true
            },
            ProgressEvent::Complete { report_handle } => {
                if report_handle.session_id != *session_id {
                    return false;
                }
                self.view = View::Report {
                    session_id: report_handle.session_id,
                    handle: report_handle.clone(),
                };
                true
            },
        }
    }

    /// Apply a polled snapshot; returns whether the view changed
    pub fn on_status(&mut self, session: &Session) -> bool {
        let View::Progress {
            session_id,
            progress,
            step,
            error,
            ..
        } = &mut self.view
        else {
            return false;
        };
        if session.id != *session_id || error.is_some() {
            return false;
        }

        match session.status {
            SessionStatus::Complete => {
                let Some(handle) = session.report_handle.clone() else {
                    return false;
                };
                self.view = View::Report {
                    session_id: session.id,
                    handle,
                };
                true
            },
            SessionStatus::Error => {
                let stage = session
                    .failed_stage
                    .map_or_else(|| "analysis".to_string(), |s| s.to_string());
                let detail = session.error_detail.as_deref().unwrap_or("unknown error");
                *error = Some(failure_message(&stage, detail));
                true
            },
            SessionStatus::Pending | SessionStatus::Running => {
                let unchanged = session.progress == *progress && session.current_step == *step;
                if session.progress < *progress || unchanged {
                    return false;
                }
                *progress = session.progress;
                session.current_step.clone_into(step);
                true
            },
        }
    }

    /// Dismiss a failed session and return to the form
    pub fn acknowledge_error(&mut self) -> bool {
        if !matches!(self.view, View::Progress { error: Some(_), .. }) {
            return false;
        }
        self.view = View::Submission { error: None };
        true
    }

    /// Leave a finished report for a new submission
    pub fn start_over(&mut self) -> bool {
        if !matches!(self.view, View::Report { .. }) {
            return false;
        }
        self.view = View::Submission { error: None };
        true
    }
}

fn failure_message(stage: &str, detail: &str) -> String {
    format!("Analysis failed at {stage}: {detail}")
}

/// Timing of [`watch_session`]
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub poll_interval: Duration,
    /// Pause before showing a finished report
    pub completion_delay: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            completion_delay: Duration::from_millis(500),
        }
    }
}

/// Follow the controller's session until it completes or fails
///
/// `on_change` sees every view the controller moves through. Returns the
/// final view.
pub async fn watch_session<F>(
    service: &AnalysisService,
    controller: &mut ViewController,
    options: &WatchOptions,
    mut on_change: F,
) -> Result<View>
where
    F: FnMut(&View),
{
    let Some(id) = controller.session_id() else {
        return Ok(controller.view().clone());
    };

    let mut subscription = service.subscribe(id)?;
    let mut ticker = tokio::time::interval(options.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut live = true;

    while controller.is_watching() {
        let changed = tokio::select! {
            envelope = subscription.recv(), if live => match envelope {
                Some(envelope) => {
                    if matches!(envelope.event, ProgressEvent::Complete { .. }) {
                        tokio::time::sleep(options.completion_delay).await;
                    }
                    controller.on_event(&envelope)
                },
                None => {
                    tracing::debug!(session_id = %id, "Event feed closed, polling only");
                    live = false;
                    false
                },
            },
            _ = ticker.tick() => {
                let session = service.status(id)?;
                if session.status == SessionStatus::Complete {
                    tokio::time::sleep(options.completion_delay).await;
                }
                controller.on_status(&session)
            },
        };

        if changed {
            on_change(controller.view());
        }
    }

    Ok(controller.view().clone())
}
