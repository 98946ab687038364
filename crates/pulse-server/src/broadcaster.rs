//! Per-session progress events
//!
//! Each session gets its own broadcast channel, created on first subscribe.
//! Publishing to a session nobody watches is a no-op. A terminal event
//! closes the channel, so subscribers see it and then end.

use crate::pipeline::Stage;
use crate::session::{ReportHandle, Session, SessionId, SessionStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// What happened in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress { progress: u8, step: String },
    Complete { report_handle: ReportHandle },
    Error { stage: String, detail: String },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// The terminal event matching a finished session's snapshot
    ///
    /// Lets a late subscriber resynchronize after the live event has gone by.
    pub fn terminal_for(session: &Session) -> Option<Self> {
        match session.status {
            SessionStatus::Complete => session
                .report_handle
                .clone()
                .map(|report_handle| Self::Complete { report_handle }),
            SessionStatus::Error => Some(Self::Error {
                stage: session.failed_stage.unwrap_or(Stage::Init).to_string(),
                detail: session.error_detail.clone().unwrap_or_default(),
            }),
            SessionStatus::Pending | SessionStatus::Running => None,
        }
    }
}

/// An event tagged with its session and per-session sequence number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEnvelope {
    pub session_id: SessionId,
    pub seq: u64,
    pub event: ProgressEvent,
}

type Channels = Arc<Mutex<HashMap<SessionId, broadcast::Sender<ProgressEnvelope>>>>;

/// Routes progress events to the subscribers of one session
#[derive(Debug, Clone)]
pub struct ProgressBroadcaster {
    channels: Channels,
    capacity: usize,
}

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::default(),
            capacity: capacity.max(1),
        }
    }

    /// Send an event to the session's current subscribers
    ///
    /// Never blocks. Returns the number of subscribers reached.
    pub fn publish(&self, envelope: ProgressEnvelope) -> usize {
        let Ok(mut channels) = self.channels.lock() else {
            tracing::error!(session_id = %envelope.session_id, "Progress channel map poisoned, event dropped");
            return 0;
        };

        let session_id = envelope.session_id;
        let terminal = envelope.event.is_terminal();
        let delivered = channels
            .get(&session_id)
            .and_then(|sender| sender.send(envelope).ok())
            .unwrap_or(0);

        if terminal {
            // Dropping the sender closes every receiver once it drains.
            channels.remove(&session_id);
        }

        tracing::trace!(%session_id, delivered, terminal, "Progress event published");
        delivered
    }

    /// Receive the session's subsequent events
    ///
    /// Works before the session exists. Nothing is replayed.
    pub fn subscribe(&self, session_id: SessionId) -> EventSubscription {
        let rx = match self.channels.lock() {
            Ok(mut channels) => channels
                .entry(session_id)
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe(),
            Err(_) => {
                tracing::error!(%session_id, "Progress channel map poisoned, subscription closed");
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                rx
            },
        };

        EventSubscription {
            session_id,
            rx: Some(rx),
            channels: Arc::clone(&self.channels),
        }
    }

    /// Sessions with an open channel
    pub fn channel_count(&self) -> usize {
        self.channels.lock().map(|c| c.len()).unwrap_or(0)
    }
}

/// A live feed of one session's events
#[derive(Debug)]
pub struct EventSubscription {
    pub session_id: SessionId,
    rx: Option<broadcast::Receiver<ProgressEnvelope>>,
    channels: Channels,
}

impl EventSubscription {
    /// Next event, or `None` once the channel closed
    pub async fn recv(&mut self) -> Option<ProgressEnvelope> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        lagged = n,
                        "Progress subscriber lagged, some events were dropped"
                    );
                },
            }
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        drop(self.rx.take());

        let Ok(mut channels) = self.channels.lock() else {
            return;
        };
        if channels
            .get(&self.session_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&self.session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn progress(session_id: SessionId, seq: u64, value: u8) -> ProgressEnvelope {
        ProgressEnvelope {
            session_id,
            seq,
            event: ProgressEvent::Progress {
                progress: value,
                step: format!("step {seq}"),
            },
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let broadcaster = ProgressBroadcaster::new(8);
        let id = SessionId::new();
        assert_eq!(broadcaster.publish(progress(id, 1, 15)), 0);
        assert_eq!(broadcaster.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let broadcaster = ProgressBroadcaster::new(8);
        let id = SessionId::new();
        let mut sub = broadcaster.subscribe(id);

        for (seq, value) in [(1, 0), (2, 15), (3, 40)] {
            broadcaster.publish(progress(id, seq, value));
        }

        for expected in 1..=3 {
            assert_eq!(sub.recv().await.unwrap().seq, expected);
        }
    }

    #[tokio::test]
    async fn test_sessions_do_not_cross() {
        let broadcaster = ProgressBroadcaster::new(8);
        let a = SessionId::new();
        let b = SessionId::new();
        let mut sub_a = broadcaster.subscribe(a);
        let mut sub_b = broadcaster.subscribe(b);

        broadcaster.publish(progress(a, 1, 15));
        broadcaster.publish(progress(b, 1, 40));

        assert_eq!(sub_a.recv().await.unwrap().session_id, a);
        assert_eq!(sub_b.recv().await.unwrap().session_id, b);
    }

    #[tokio::test]
    async fn test_terminal_event_ends_stream() {
        let broadcaster = ProgressBroadcaster::new(8);
        let id = SessionId::new();
        let mut sub = broadcaster.subscribe(id);

        broadcaster.publish(progress(id, 1, 90));
        broadcaster.publish(ProgressEnvelope {
            session_id: id,
            seq: 2,
            event: ProgressEvent::Complete {
                report_handle: ReportHandle::new(id, PathBuf::from("reports/r.html")),
            },
        });

        assert_eq!(sub.recv().await.unwrap().seq, 1);
        assert!(sub.recv().await.unwrap().event.is_terminal());
        assert!(sub.recv().await.is_none());
        assert_eq!(broadcaster.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_released_when_last_subscriber_drops() {
        let broadcaster = ProgressBroadcaster::new(8);
        let id = SessionId::new();

        let first = broadcaster.subscribe(id);
        let second = broadcaster.subscribe(id);
        assert_eq!(broadcaster.channel_count(), 1);

        drop(first);
        assert_eq!(broadcaster.channel_count(), 1);
        drop(second);
        assert_eq!(broadcaster.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let broadcaster = ProgressBroadcaster::new(2);
        let id = SessionId::new();
        let mut sub = broadcaster.subscribe(id);

        for seq in 1..=5 {
            broadcaster.publish(progress(id, seq, 10));
        }

        assert_eq!(sub.recv().await.unwrap().seq, 4);
        assert_eq!(sub.recv().await.unwrap().seq, 5);
    }

    #[test]
    fn test_wire_shape() {
        let id = SessionId::new();
        let json = serde_json::to_value(progress(id, 3, 40)).unwrap();
        assert_eq!(json["seq"], 3);
        assert_eq!(json["event"]["type"], "progress");
        assert_eq!(json["event"]["progress"], 40);

        let error = ProgressEvent::Error {
            stage: "FETCH".to_string(),
            detail: "no data".to_string(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["stage"], "FETCH");
    }

    #[test]
    fn test_terminal_for_snapshot() {
        let mut session = Session::new(crate::session::test_support::subject("AAPL"));
        assert!(ProgressEvent::terminal_for(&session).is_none());

        session.start().unwrap();
        session.fail(Stage::Fetch, "no data found for symbol").unwrap();
        let event = ProgressEvent::terminal_for(&session).unwrap();
        assert_eq!(
            event,
            ProgressEvent::Error {
                stage: "FETCH".to_string(),
                detail: "no data found for symbol".to_string(),
            }
        );
    }
}
