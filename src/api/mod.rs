//! Data service access with explicit fallback reporting.

pub mod fallback;
pub mod local;
pub mod models;

use std::future::Future;

use anyhow::Result;
use log::warn;

pub use local::LocalApi;
pub use models::{AccuracySeries, ChartData, PoseDetails, PoseProgress, ProgressSeries};

/// Outcome of a fetch. Substituted data is always labelled as such.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Live(T),
    Fallback { data: T, reason: String },
    Failed(String),
}

impl<T> Fetched<T> {
    /// `Live` on success, otherwise `Fallback` built from `fallback`.
    pub fn or_fallback(result: Result<T>, fallback: impl FnOnce() -> T) -> Self {
        match result {
            Ok(data) => Fetched::Live(data),
            Err(err) => Fetched::Fallback {
                data: fallback(),
                reason: format!("{err:#}"),
            },
        }
    }

    pub fn or_failed(result: Result<T>) -> Self {
        match result {
            Ok(data) => Fetched::Live(data),
            Err(err) => Fetched::Failed(format!("{err:#}")),
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Fetched::Live(data) | Fetched::Fallback { data, .. } => Some(data),
            Fetched::Failed(_) => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Fetched::Live(data) | Fetched::Fallback { data, .. } => Some(data),
            Fetched::Failed(_) => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Fetched::Live(_))
    }
}

/// Remote data service for poses and practice statistics.
pub trait PoseApi: Send + Sync + 'static {
    fn fetch_pose(&self, pose_id: &str) -> impl Future<Output = Result<PoseDetails>> + Send;

    fn fetch_pose_progress(
        &self,
        pose_id: &str,
    ) -> impl Future<Output = Result<PoseProgress>> + Send;

    fn fetch_chart_data(&self, pose_id: &str) -> impl Future<Output = Result<ChartData>> + Send;
}

pub async fn load_pose<A: PoseApi>(api: &A, pose_id: &str) -> Fetched<PoseDetails> {
    let fetched = Fetched::or_fallback(api.fetch_pose(pose_id).await, || {
        fallback::pose_details(pose_id)
    });
    log_substitution("pose details", pose_id, &fetched);
    fetched
}

pub async fn load_pose_progress<A: PoseApi>(api: &A, pose_id: &str) -> Fetched<PoseProgress> {
    let fetched = Fetched::or_failed(api.fetch_pose_progress(pose_id).await);
    log_substitution("pose progress", pose_id, &fetched);
    fetched
}

pub async fn load_chart_data<A: PoseApi>(api: &A, pose_id: &str) -> Fetched<ChartData> {
    let fetched = Fetched::or_fallback(api.fetch_chart_data(pose_id).await, fallback::chart_data);
    log_substitution("chart data", pose_id, &fetched);
    fetched
}

fn log_substitution<T>(what: &str, pose_id: &str, fetched: &Fetched<T>) {
    match fetched {
        Fetched::Live(_) => {}
        Fetched::Fallback { reason, .. } => {
            warn!("using sample {what} for {pose_id}: {reason}")
        }
        Fetched::Failed(reason) => warn!("no {what} for {pose_id}: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn fallback_is_labelled() {
        let fetched = Fetched::or_fallback(Err(anyhow!("offline")), || 7);
        assert_eq!(
            fetched,
            Fetched::Fallback {
                data: 7,
                reason: "offline".to_string()
            }
        );
        assert_eq!(fetched.data(), Some(&7));
        assert!(!fetched.is_live());

        let failed: Fetched<u8> = Fetched::or_failed(Err(anyhow!("offline")));
        assert_eq!(failed.into_data(), None);

        assert!(Fetched::or_failed(Ok(1)).is_live());
    }
}
