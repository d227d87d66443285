use log::warn;
use serde::{Deserialize, Serialize};

const FEEDBACK_PATH: &str = "/ws/pose_feedback";

/// One detector verdict. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedbackMessage {
    #[serde(default)]
    pub is_correct_pose: Option<bool>,
    #[serde(default)]
    pub pose_completed: Option<bool>,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl FeedbackMessage {
    pub fn completed(&self) -> bool {
        self.pose_completed.unwrap_or(false)
    }
}

/// First frame on a fresh channel: tells the detector which pose to judge.
#[derive(Debug, Serialize)]
pub struct PoseSelection<'a> {
    pub pose: &'a str,
}

/// Parses one text frame. Malformed frames are logged and dropped.
pub fn parse_message(raw: &str) -> Option<FeedbackMessage> {
    match serde_json::from_str::<FeedbackMessage>(raw) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!("ignoring malformed feedback message {raw:?}: {err}");
            None
        }
    }
}

pub fn feedback_url(host: &str, secure: bool) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    format!("{scheme}://{}{FEEDBACK_PATH}", host.trim_end_matches('/'))
}
