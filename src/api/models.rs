use serde::{Deserialize, Serialize};

/// Pose page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseDetails {
    pub title: String,
    pub sanskrit: String,
    pub english_name: String,
    pub difficulty: String,
    pub duration: String,
    pub target: String,
    pub instructions: Vec<String>,
}

/// Practice counters as served to the analytics page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseProgress {
    pub attempts: u64,
    pub completions: u64,
    /// Seconds.
    pub total_practice_time: u64,
    pub last_practiced: Option<String>,
    pub practice_time_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracySeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSeries {
    /// `[attempts, completions]`.
    pub values: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub accuracy: AccuracySeries,
    pub progress: ProgressSeries,
    /// Fraction in `[0, 1]`.
    pub best_accuracy: f64,
}

impl ChartData {
    pub fn attempts(&self) -> u64 {
        self.progress.values.first().copied().unwrap_or(0)
    }

    pub fn completions(&self) -> u64 {
        self.progress.values.get(1).copied().unwrap_or(0)
    }
}
