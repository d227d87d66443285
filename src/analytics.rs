//! Dashboard figures derived from progress and chart data.

use serde::Serialize;

use crate::api::{load_chart_data, load_pose_progress, ChartData, Fetched, PoseApi, PoseProgress};

const WEEKDAY_WEIGHTS: [f64; 7] = [7.0, 9.0, 8.0, 10.0, 15.0, 25.0, 25.0];
const STARTER_WEEK: [u32; 7] = [1, 2, 1, 2, 3, 5, 5];
const STARTER_WEEK_MINUTES: u32 = 10;
const ALIGNED_THRESHOLD: f64 = 70.0;

const LIMB_ADVICE: [&str; 4] = [
    "Focus on improving your right arm positioning",
    "Work on better left arm alignment",
    "Practice balancing your right leg position",
    "Pay attention to your left leg alignment",
];
const ALL_ALIGNED: &str = "Great job! All your positions are well aligned";
const GENERAL_ADVICE: [&str; 2] = [
    "Continue practicing regularly for better results",
    "Consider trying more challenging poses as you improve",
];

/// Rounded mean, 0 without samples.
pub fn overall_accuracy(values: &[f64]) -> u32 {
    if values.is_empty() {
        return 0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    mean.round().max(0.0) as u32
}

pub fn completion_rate(attempts: u64, completions: u64) -> u32 {
    if attempts == 0 {
        return 0;
    }
    (completions as f64 / attempts as f64 * 100.0).round() as u32
}

/// Spreads total practice over Monday..Sunday, weighted towards the weekend.
pub fn weekly_distribution(total_practice_secs: u64) -> [u32; 7] {
    let total_minutes = ((total_practice_secs as f64 / 60.0).round() as u32).max(1);
    if total_minutes < STARTER_WEEK_MINUTES {
        return STARTER_WEEK;
    }

    let scale = f64::from(total_minutes) / 60.0;
    WEEKDAY_WEIGHTS.map(|weight| ((weight * scale).round() as u32).max(1))
}

pub fn practice_time_display(total_practice_secs: u64) -> String {
    format!("{} min", (total_practice_secs as f64 / 60.0).round() as u64)
}

pub fn best_accuracy_percent(best_accuracy: f64) -> u32 {
    (best_accuracy * 100.0).round().max(0.0) as u32
}

/// Per-limb advice for values below the alignment threshold, followed by the
/// general tips. Without measurements only the general tips are given.
pub fn recommendations(values: &[f64]) -> Vec<String> {
    let mut advice: Vec<String> = values
        .iter()
        .zip(LIMB_ADVICE)
        .filter(|(value, _)| **value < ALIGNED_THRESHOLD)
        .map(|(_, text)| text.to_string())
        .collect();

    if !values.is_empty() && values.iter().all(|value| *value >= ALIGNED_THRESHOLD) {
        advice.push(ALL_ALIGNED.to_string());
    }
    advice.extend(GENERAL_ADVICE.iter().map(|text| text.to_string()));
    advice
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimbAccuracy {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub pose_id: String,
    pub attempts: u64,
    pub completions: u64,
    pub practice_time_display: String,
    pub last_practiced: Option<String>,
    pub best_accuracy_percent: u32,
    pub overall_accuracy: u32,
    pub completion_rate: u32,
    pub limbs: Vec<LimbAccuracy>,
    /// False when no limb accuracy was measured; accuracy figures are then
    /// placeholders.
    pub accuracy_measured: bool,
    pub weekly_minutes: [u32; 7],
    pub recommendations: Vec<String>,
    /// Some figure came from sample content or is missing.
    pub sample_data: bool,
}

impl Dashboard {
    pub fn build(pose_id: &str, progress: &Fetched<PoseProgress>, chart: &Fetched<ChartData>) -> Self {
        let sample_data = !(progress.is_live() && chart.is_live());
        let progress = progress.data();
        let chart = chart.data();

        let accuracy_values: &[f64] = chart.map(|c| c.accuracy.values.as_slice()).unwrap_or(&[]);
        let limbs = match chart {
            Some(chart) => chart
                .accuracy
                .labels
                .iter()
                .zip(&chart.accuracy.values)
                .map(|(label, value)| LimbAccuracy {
                    label: label.clone(),
                    value: *value,
                })
                .collect(),
            None => Vec::new(),
        };
        let total_secs = progress.map(|p| p.total_practice_time).unwrap_or(0);

        Self {
            pose_id: pose_id.to_string(),
            attempts: progress.map(|p| p.attempts).unwrap_or(0),
            completions: progress.map(|p| p.completions).unwrap_or(0),
            practice_time_display: progress
                .map(|p| p.practice_time_display.clone())
                .unwrap_or_else(|| practice_time_display(0)),
            last_practiced: progress.and_then(|p| p.last_practiced.clone()),
            best_accuracy_percent: chart.map(|c| best_accuracy_percent(c.best_accuracy)).unwrap_or(0),
            overall_accuracy: overall_accuracy(accuracy_values),
            completion_rate: chart
                .map(|c| completion_rate(c.attempts(), c.completions()))
                .unwrap_or(0),
            accuracy_measured: !accuracy_values.is_empty(),
            limbs,
            weekly_minutes: weekly_distribution(total_secs),
            recommendations: recommendations(accuracy_values),
            sample_data,
        }
    }
}

pub async fn load_dashboard<A: PoseApi>(api: &A, pose_id: &str) -> Dashboard {
    let progress = load_pose_progress(api, pose_id).await;
    let chart = load_chart_data(api, pose_id).await;
    Dashboard::build(pose_id, &progress, &chart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        fallback::{self, LIMB_LABELS},
        AccuracySeries, ProgressSeries,
    };

    #[test]
    fn accuracy_and_completion() {
        assert_eq!(overall_accuracy(&[70.0, 75.0, 65.0, 80.0]), 73);
        assert_eq!(overall_accuracy(&[]), 0);
        assert_eq!(completion_rate(5, 2), 40);
        assert_eq!(completion_rate(0, 3), 0);
        assert_eq!(completion_rate(3, 1), 33);
    }

    #[test]
    fn weekly_distribution_shapes() {
        assert_eq!(weekly_distribution(0), [1, 2, 1, 2, 3, 5, 5]);
        assert_eq!(weekly_distribution(9 * 60), [1, 2, 1, 2, 3, 5, 5]);
        assert_eq!(weekly_distribution(60 * 60), [7, 9, 8, 10, 15, 25, 25]);
        assert_eq!(weekly_distribution(12 * 60), [1, 2, 2, 2, 3, 5, 5]);
    }

    #[test]
    fn display_strings() {
        assert_eq!(practice_time_display(0), "0 min");
        assert_eq!(practice_time_display(150), "3 min");
        assert_eq!(best_accuracy_percent(0.876), 88);
    }

    #[test]
    fn recommendations_follow_weak_limbs() {
        let advice = recommendations(&[70.0, 75.0, 65.0, 80.0]);
        assert_eq!(advice[0], "Practice balancing your right leg position");
        assert_eq!(advice.len(), 3);

        let advice = recommendations(&[90.0, 91.0, 92.0, 93.0]);
        assert_eq!(advice[0], ALL_ALIGNED);

        assert_eq!(recommendations(&[]), GENERAL_ADVICE.map(String::from).to_vec());
    }

    #[test]
    fn live_chart_without_limbs_claims_no_alignment() {
        let progress = Fetched::Live(PoseProgress {
            attempts: 2,
            completions: 1,
            total_practice_time: 120,
            last_practiced: None,
            practice_time_display: practice_time_display(120),
        });
        let chart = Fetched::Live(ChartData {
            accuracy: AccuracySeries {
                labels: Vec::new(),
                values: Vec::new(),
            },
            progress: ProgressSeries { values: vec![2, 1] },
            best_accuracy: 0.8,
        });

        let dashboard = Dashboard::build("vrksana", &progress, &chart);
        assert!(!dashboard.accuracy_measured);
        assert!(dashboard.limbs.is_empty());
        assert!(!dashboard
            .recommendations
            .iter()
            .any(|advice| advice == ALL_ALIGNED));
        assert_eq!(dashboard.completion_rate, 50);
        assert_eq!(dashboard.best_accuracy_percent, 80);
    }

    #[test]
    fn dashboard_flags_sample_data() {
        let progress = Fetched::Failed("offline".to_string());
        let chart = Fetched::Fallback {
            data: fallback::chart_data(),
            reason: "offline".to_string(),
        };
        let dashboard = Dashboard::build("vrksana", &progress, &chart);
        assert!(dashboard.sample_data);
        assert!(dashboard.accuracy_measured);
        assert_eq!(dashboard.overall_accuracy, 73);
        assert_eq!(dashboard.completion_rate, 40);
        assert_eq!(dashboard.practice_time_display, "0 min");
        assert_eq!(dashboard.limbs.len(), 4);
        assert_eq!(dashboard.limbs[0].label, LIMB_LABELS[0]);
    }
}
