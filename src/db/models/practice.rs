//! Practice bookkeeping rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running counters for one pose. A pose that was never practiced reads as
/// all zeroes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoseProgressRecord {
    pub pose_id: String,
    pub attempts: u64,
    pub completions: u64,
    pub total_practice_secs: u64,
    pub best_accuracy: f64,
    pub last_practiced: Option<DateTime<Utc>>,
}

impl PoseProgressRecord {
    pub fn empty(pose_id: &str) -> Self {
        Self {
            pose_id: pose_id.to_string(),
            attempts: 0,
            completions: 0,
            total_practice_secs: 0,
            best_accuracy: 0.0,
            last_practiced: None,
        }
    }
}

/// One opened feedback channel for a pose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PracticeRun {
    pub id: String,
    pub pose_id: String,
    pub user_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub practice_secs: Option<u64>,
    pub completed: bool,
}
