//! Typed UI events.
//!
//! Controllers publish state changes through an [`EventSink`]; whatever renders
//! the page subscribes on the other side. Emission is fire-and-forget: a sink
//! that cannot deliver drops the event.

use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::{
    auth::SessionSnapshot,
    breathing::{BreathPhase, BreathPhaseState},
    hold::HoldDisplay,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum UiEvent {
    BreathUpdate {
        pose: String,
        state: BreathPhaseState,
        instruction: &'static str,
    },
    BreathPhaseChanged {
        pose: String,
        phase: BreathPhase,
    },
    HoldUpdate {
        pose: String,
        display: HoldDisplay,
    },
    PoseCompleted {
        pose: String,
    },
    SessionChanged(SessionSnapshot),
    SignInRequested,
    PracticeTimer {
        remaining_secs: u64,
        running: bool,
    },
    FeedbackConnection {
        pose: String,
        connected: bool,
    },
    Toast {
        title: String,
        description: String,
    },
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UiEvent::BreathUpdate { .. } => "breath-update",
            UiEvent::BreathPhaseChanged { .. } => "breath-phase-changed",
            UiEvent::HoldUpdate { .. } => "hold-update",
            UiEvent::PoseCompleted { .. } => "pose-completed",
            UiEvent::SessionChanged(_) => "session-changed",
            UiEvent::SignInRequested => "sign-in-requested",
            UiEvent::PracticeTimer { .. } => "practice-timer",
            UiEvent::FeedbackConnection { .. } => "feedback-connection",
            UiEvent::Toast { .. } => "toast",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: UiEvent);
}

pub type SharedSink = Arc<dyn EventSink>;

/// Forwards events into an unbounded channel.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }
}

/// Writes every event to the log as JSON. High-frequency ticks go to `debug`.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: UiEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        match &event {
            UiEvent::BreathUpdate { .. } | UiEvent::HoldUpdate { .. } => {
                debug!("{} {}", event.name(), payload)
            }
            _ => info!("{} {}", event.name(), payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_kebab_case_tags() {
        let event = UiEvent::PracticeTimer {
            remaining_secs: 12,
            running: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "practice-timer");
        assert_eq!(json["payload"]["remaining_secs"], 12);
        assert_eq!(event.name(), "practice-timer");
    }

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(UiEvent::SignInRequested);
        sink.emit(UiEvent::PoseCompleted {
            pose: "vrksana".into(),
        });
        assert!(matches!(rx.recv().await, Some(UiEvent::SignInRequested)));
        assert!(matches!(rx.recv().await, Some(UiEvent::PoseCompleted { .. })));
    }
}
