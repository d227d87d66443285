//! Static content shown when the data service cannot answer.

use crate::poses::catalog::title_case;

use super::models::{AccuracySeries, ChartData, PoseDetails, ProgressSeries};

pub const LIMB_LABELS: [&str; 4] = ["Right Arm", "Left Arm", "Right Leg", "Left Leg"];

const SAMPLE_LIMB_ACCURACY: [f64; 4] = [70.0, 75.0, 65.0, 80.0];
const SAMPLE_ATTEMPTS: u64 = 5;
const SAMPLE_COMPLETIONS: u64 = 2;

pub fn pose_details(pose_id: &str) -> PoseDetails {
    let name = title_case(pose_id);
    PoseDetails {
        title: format!("{name} Asana"),
        sanskrit: "Yoga Pose".to_string(),
        english_name: format!("{name} Pose"),
        difficulty: "Intermediate".to_string(),
        duration: "30 seconds".to_string(),
        target: "Balance & Focus".to_string(),
        instructions: [
            "Stand tall with feet together and arms by your sides",
            "Follow proper form for this pose",
            "Hold the position while breathing deeply",
            "Release gently and with control",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
    }
}

pub fn chart_data() -> ChartData {
    ChartData {
        accuracy: AccuracySeries {
            labels: LIMB_LABELS.iter().map(|label| label.to_string()).collect(),
            values: SAMPLE_LIMB_ACCURACY.to_vec(),
        },
        progress: ProgressSeries {
            values: vec![SAMPLE_ATTEMPTS, SAMPLE_COMPLETIONS],
        },
        best_accuracy: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_fallback_names_the_pose() {
        let details = pose_details("garudasana");
        assert_eq!(details.title, "Garudasana Asana");
        assert_eq!(details.english_name, "Garudasana Pose");
        assert_eq!(details.instructions.len(), 4);
    }

    #[test]
    fn sample_chart_values() {
        let chart = chart_data();
        assert_eq!(chart.accuracy.values, vec![70.0, 75.0, 65.0, 80.0]);
        assert_eq!((chart.attempts(), chart.completions()), (5, 2));
    }
}
