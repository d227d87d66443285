use anyhow::Result;
use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    helpers::{parse_datetime, parse_optional_datetime, to_i64, to_u64, valid_accuracy},
    models::{PoseProgressRecord, PracticeRun},
    Database,
};

fn row_to_progress(row: &Row) -> Result<PoseProgressRecord> {
    let last_practiced: Option<String> = row.get("last_practiced")?;

    Ok(PoseProgressRecord {
        pose_id: row.get("pose_id")?,
        attempts: to_u64(row.get("attempts")?, "attempts")?,
        completions: to_u64(row.get("completions")?, "completions")?,
        total_practice_secs: to_u64(row.get("total_practice_secs")?, "total_practice_secs")?,
        best_accuracy: row.get("best_accuracy")?,
        last_practiced: parse_optional_datetime(last_practiced, "last_practiced")?,
    })
}

fn row_to_run(row: &Row) -> Result<PracticeRun> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let practice_secs: Option<i64> = row.get("practice_secs")?;

    Ok(PracticeRun {
        id: row.get("id")?,
        pose_id: row.get("pose_id")?,
        user_id: row.get("user_id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        practice_secs: practice_secs
            .map(|secs| to_u64(secs, "practice_secs"))
            .transpose()?,
        completed: row.get("completed")?,
    })
}

impl Database {
    /// Counters for `pose_id`; all zero when the pose was never practiced.
    pub async fn get_pose_progress(&self, pose_id: &str) -> Result<PoseProgressRecord> {
        let pose_id = pose_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT pose_id, attempts, completions, total_practice_secs, best_accuracy, last_practiced
                 FROM pose_progress
                 WHERE pose_id = ?1",
            )?;
            let mut rows = stmt.query(params![pose_id])?;
            let progress = match rows.next()? {
                Some(row) => row_to_progress(row)?,
                None => PoseProgressRecord::empty(&pose_id),
            };
            Ok(progress)
        })
        .await
    }

    pub async fn record_attempt(&self, pose_id: &str, at: DateTime<Utc>) -> Result<()> {
        let pose_id = pose_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO pose_progress (pose_id, attempts, last_practiced)
                 VALUES (?1, 1, ?2)
                 ON CONFLICT(pose_id) DO UPDATE SET
                     attempts = attempts + 1,
                     last_practiced = excluded.last_practiced",
                params![pose_id, at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    /// Counts a completion and raises the best accuracy when `accuracy` beats it.
    pub async fn record_completion(&self, pose_id: &str, accuracy: Option<f64>) -> Result<()> {
        let pose_id = pose_id.to_string();
        let accuracy = accuracy.and_then(valid_accuracy).unwrap_or(0.0);
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO pose_progress (pose_id, completions, best_accuracy)
                 VALUES (?1, 1, ?2)
                 ON CONFLICT(pose_id) DO UPDATE SET
                     completions = completions + 1,
                     best_accuracy = MAX(best_accuracy, excluded.best_accuracy)",
                params![pose_id, accuracy],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn record_practice_time(
        &self,
        pose_id: &str,
        secs: u64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let pose_id = pose_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO pose_progress (pose_id, total_practice_secs, last_practiced)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(pose_id) DO UPDATE SET
                     total_practice_secs = total_practice_secs + excluded.total_practice_secs,
                     last_practiced = excluded.last_practiced",
                params![pose_id, to_i64(secs)?, at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    /// Opens a run. A user without a stored profile is recorded as
    /// anonymous rather than losing the run.
    pub async fn start_practice_run(
        &self,
        pose_id: &str,
        user_id: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Result<PracticeRun> {
        let pose_id = pose_id.to_string();
        self.execute(move |conn| {
            let user_id = match user_id {
                Some(user_id) => {
                    let known = conn
                        .query_row(
                            "SELECT 1 FROM profiles WHERE user_id = ?1",
                            params![user_id],
                            |_| Ok(()),
                        )
                        .optional()?
                        .is_some();
                    if !known {
                        warn!("no profile stored for {user_id}; recording run anonymously");
                    }
                    known.then_some(user_id)
                }
                None => None,
            };

            let run = PracticeRun {
                id: Uuid::new_v4().to_string(),
                pose_id,
                user_id,
                started_at,
                ended_at: None,
                practice_secs: None,
                completed: false,
            };
            conn.execute(
                "INSERT INTO practice_runs (id, pose_id, user_id, started_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![run.id, run.pose_id, run.user_id, run.started_at.to_rfc3339()],
            )?;
            Ok(run)
        })
        .await
    }

    pub async fn finish_practice_run(
        &self,
        run_id: &str,
        ended_at: DateTime<Utc>,
        practice_secs: u64,
        completed: bool,
    ) -> Result<()> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE practice_runs
                 SET ended_at = ?1,
                     practice_secs = ?2,
                     completed = ?3
                 WHERE id = ?4",
                params![ended_at.to_rfc3339(), to_i64(practice_secs)?, completed, run_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_practice_run(&self, run_id: &str) -> Result<Option<PracticeRun>> {
        let run_id = run_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, pose_id, user_id, started_at, ended_at, practice_secs, completed
                 FROM practice_runs
                 WHERE id = ?1",
            )?;
            let run = stmt
                .query_row(params![run_id], |row| Ok(row_to_run(row)))
                .optional()?
                .transpose()?;
            Ok(run)
        })
        .await
    }

    /// Most recent runs for a pose, newest first.
    pub async fn list_practice_runs(&self, pose_id: &str, limit: u32) -> Result<Vec<PracticeRun>> {
        let pose_id = pose_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, pose_id, user_id, started_at, ended_at, practice_secs, completed
                 FROM practice_runs
                 WHERE pose_id = ?1
                 ORDER BY started_at DESC
                 LIMIT ?2",
            )?;
            let mut rows = stmt.query(params![pose_id, limit])?;
            let mut runs = Vec::new();
            while let Some(row) = rows.next()? {
                runs.push(row_to_run(row)?);
            }
            Ok(runs)
        })
        .await
    }
}
