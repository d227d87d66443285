use anyhow::{bail, Result};

use crate::{
    analytics::practice_time_display,
    db::Database,
    poses::{catalog, hold_profile},
};

use super::{
    models::{AccuracySeries, ChartData, PoseDetails, PoseProgress, ProgressSeries},
    PoseApi,
};

/// Serves the built-in catalog and the counters kept in the local store.
#[derive(Clone)]
pub struct LocalApi {
    db: Database,
}

impl LocalApi {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn hold_duration_label(secs: f64) -> String {
    if secs >= 120.0 && secs % 60.0 == 0.0 {
        format!("{} minutes", secs / 60.0)
    } else {
        format!("{secs} seconds")
    }
}

impl PoseApi for LocalApi {
    async fn fetch_pose(&self, pose_id: &str) -> Result<PoseDetails> {
        let Some(entry) = catalog::find(pose_id) else {
            bail!("pose {pose_id} is not in the catalog");
        };
        let hold_secs = hold_profile(pose_id).required_hold_secs();

        Ok(PoseDetails {
            title: entry.name.to_string(),
            sanskrit: entry.name.to_string(),
            english_name: entry.english_name.to_string(),
            difficulty: "All levels".to_string(),
            duration: hold_duration_label(hold_secs),
            target: entry.focus.to_string(),
            instructions: vec![
                format!("Move into {} with a steady breath", entry.english_name),
                "Keep the alignment shown in the reference image".to_string(),
                format!("Hold for {} while breathing deeply", hold_duration_label(hold_secs)),
                "Release gently and with control".to_string(),
            ],
        })
    }

    async fn fetch_pose_progress(&self, pose_id: &str) -> Result<PoseProgress> {
        let record = self.db.get_pose_progress(pose_id).await?;
        Ok(PoseProgress {
            attempts: record.attempts,
            completions: record.completions,
            total_practice_time: record.total_practice_secs,
            last_practiced: record
                .last_practiced
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string()),
            practice_time_display: practice_time_display(record.total_practice_secs),
        })
    }

    /// Per-limb accuracy is only measured by the detection backend, so the
    /// local series is empty; a pose that was never attempted has no chart.
    async fn fetch_chart_data(&self, pose_id: &str) -> Result<ChartData> {
        let record = self.db.get_pose_progress(pose_id).await?;
        if record.attempts == 0 {
            bail!("no practice recorded for {pose_id}");
        }

        Ok(ChartData {
            accuracy: AccuracySeries {
                labels: Vec::new(),
                values: Vec::new(),
            },
            progress: ProgressSeries {
                values: vec![record.attempts, record.completions],
            },
            best_accuracy: record.best_accuracy / 100.0,
        })
    }
}
