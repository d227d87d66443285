use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};

use crate::{
    api::{load_pose, Fetched, PoseApi, PoseDetails},
    breathing::{BreathOverrides, BreathPhaseState, BreathingGuide, PhaseCuePlayer},
    db::Database,
    events::{SharedSink, UiEvent},
    feedback::{FeedbackChannel, FeedbackMessage, FeedbackTransport},
    hold::{CompletionCallback, MeterSnapshot, PoseMeter},
    poses::resolve_pose_id,
    settings::TimingSettings,
};

use super::countdown::{CountdownState, PracticeCountdown};

const COMPLETION_TITLE: &str = "Pose Completed!";
const COMPLETION_DESCRIPTION: &str =
    "Great job! You've held the pose correctly for the required duration.";

#[derive(Clone)]
pub struct PracticeOptions {
    pub timing: TimingSettings,
    pub breath: BreathOverrides,
    /// Replaces the pose's own hold requirement when set.
    pub required_hold_secs: Option<f64>,
    pub cues: Arc<dyn PhaseCuePlayer>,
}

impl PracticeOptions {
    pub fn new(timing: TimingSettings, cues: Arc<dyn PhaseCuePlayer>) -> Self {
        Self {
            timing,
            breath: BreathOverrides::default(),
            required_hold_secs: None,
            cues,
        }
    }
}

/// Outcome of one camera session, as stored in `practice_runs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Option<String>,
    pub pose_id: String,
    pub practice_secs: u64,
    pub completed: bool,
    pub recorded_time: bool,
}

/// Bookkeeping for the run that is open while the camera is on.
struct RunTracker {
    pose: String,
    run_id: Option<String>,
    completed: bool,
    last_accuracy: Option<f64>,
    db: Database,
    events: SharedSink,
}

impl RunTracker {
    /// Both the meter and the detector can report a completion; only the
    /// first one per run counts.
    async fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;

        if let Err(err) = self.db.record_completion(&self.pose, self.last_accuracy).await {
            warn!("failed to record completion for {}: {err:#}", self.pose);
        }
        self.events.emit(UiEvent::Toast {
            title: COMPLETION_TITLE.into(),
            description: COMPLETION_DESCRIPTION.into(),
        });
    }

    async fn apply(&mut self, message: FeedbackMessage, meter: &PoseMeter) {
        if let Some(accuracy) = message.accuracy {
            self.last_accuracy = Some(accuracy);
        }
        if let Some(correct) = message.is_correct_pose {
            meter.set_in_pose(correct).await;
        }
        if message.completed() {
            self.complete().await;
        }
    }
}

struct PumpState {
    tracker: RunTracker,
    completions: mpsc::UnboundedReceiver<String>,
}

struct CameraLink {
    channel: FeedbackChannel,
    pump: JoinHandle<PumpState>,
}

/// One practice page: breathing guide, hold meter, countdown and, while the
/// camera is on, the detector feed driving the meter.
pub struct PracticeView {
    pose: String,
    details: Fetched<PoseDetails>,
    guide: BreathingGuide,
    meter: Arc<PoseMeter>,
    countdown: PracticeCountdown,
    camera: Mutex<Option<CameraLink>>,
    /// Meter completions, parked here while no camera pump is reading them.
    completions: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    db: Database,
    user_id: Option<String>,
    min_recorded_practice: Duration,
    events: SharedSink,
}

impl PracticeView {
    pub async fn open<A: PoseApi>(
        requested_pose: Option<&str>,
        api: &A,
        db: Database,
        user_id: Option<String>,
        options: PracticeOptions,
        events: SharedSink,
    ) -> Result<Self> {
        let pose = resolve_pose_id(requested_pose).to_string();
        let timing = &options.timing;

        let guide = BreathingGuide::new(
            &pose,
            options.breath,
            timing.breath_tick(),
            options.cues.clone(),
            events.clone(),
        )?;

        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let on_complete: CompletionCallback = Arc::new(move |pose: &str| {
            let _ = completion_tx.send(pose.to_string());
        });
        let meter = Arc::new(PoseMeter::new(
            &pose,
            options.required_hold_secs,
            timing.hold_config(),
            timing.hold_tick(),
            events.clone(),
            on_complete,
        )?);

        let countdown = PracticeCountdown::new(timing.practice_countdown_secs, events.clone());
        let details = load_pose(api, &pose).await;

        guide.start().await;
        info!("practice view opened for {pose}");

        Ok(Self {
            pose,
            details,
            guide,
            meter,
            countdown,
            camera: Mutex::new(None),
            completions: Mutex::new(Some(completion_rx)),
            db,
            user_id,
            min_recorded_practice: timing.min_recorded_practice(),
            events,
        })
    }

    pub fn pose(&self) -> &str {
        &self.pose
    }

    pub fn details(&self) -> &Fetched<PoseDetails> {
        &self.details
    }

    pub async fn toggle_timer(&self) -> CountdownState {
        self.countdown.toggle().await
    }

    pub async fn reset_timer(&self) -> CountdownState {
        self.countdown.reset().await
    }

    pub async fn timer(&self) -> CountdownState {
        self.countdown.snapshot().await
    }

    pub async fn breath(&self) -> BreathPhaseState {
        self.guide.snapshot().await
    }

    pub async fn meter(&self) -> MeterSnapshot {
        self.meter.snapshot().await
    }

    pub async fn camera_enabled(&self) -> bool {
        self.camera.lock().await.is_some()
    }

    pub async fn feedback_connected(&self) -> bool {
        self.camera
            .lock()
            .await
            .as_ref()
            .map(|link| link.channel.is_connected())
            .unwrap_or(false)
    }

    /// Opens the detector feed for the current pose. Returns false when a
    /// feed is already open; at most one exists per view.
    pub async fn enable_camera<T: FeedbackTransport>(&self, transport: T) -> Result<bool> {
        let mut camera = self.camera.lock().await;
        if camera.is_some() {
            debug!("camera already enabled for {}", self.pose);
            return Ok(false);
        }

        let mut parked = self.completions.lock().await;
        let completions = parked
            .take()
            .context("completion queue was lost by a previous camera session")?;

        let (channel, messages) =
            match FeedbackChannel::open(&self.pose, transport, self.events.clone()).await {
                Ok(opened) => opened,
                Err(err) => {
                    *parked = Some(completions);
                    return Err(err);
                }
            };
        drop(parked);

        let now = Utc::now();
        if let Err(err) = self.db.record_attempt(&self.pose, now).await {
            warn!("failed to record attempt for {}: {err:#}", self.pose);
        }
        let run_id = match self
            .db
            .start_practice_run(&self.pose, self.user_id.clone(), now)
            .await
        {
            Ok(run) => Some(run.id),
            Err(err) => {
                warn!("failed to start practice run for {}: {err:#}", self.pose);
                None
            }
        };

        let tracker = RunTracker {
            pose: self.pose.clone(),
            run_id,
            completed: false,
            last_accuracy: None,
            db: self.db.clone(),
            events: self.events.clone(),
        };
        let pump = tokio::spawn(pump(messages, completions, self.meter.clone(), tracker));

        *camera = Some(CameraLink { channel, pump });
        Ok(true)
    }

    /// Closes the detector feed and settles the run. Returns `None` when the
    /// camera was not on.
    pub async fn disable_camera(&self) -> Result<Option<RunSummary>> {
        let Some(link) = self.camera.lock().await.take() else {
            return Ok(None);
        };

        let open_for = link.channel.elapsed();
        if let Err(err) = link.channel.close().await {
            warn!("feedback channel for {} closed uncleanly: {err:#}", self.pose);
        }
        let PumpState {
            mut tracker,
            mut completions,
        } = link.pump.await.context("practice pump failed to join")?;

        // Without a detector nobody vouches for the pose any more.
        self.meter.set_in_pose(false).await;
        while let Ok(pose) = completions.try_recv() {
            if pose == tracker.pose {
                tracker.complete().await;
            }
        }
        *self.completions.lock().await = Some(completions);

        let practice_secs = open_for.as_secs();
        let now = Utc::now();
        let recorded_time = open_for >= self.min_recorded_practice;
        if recorded_time {
            if let Err(err) = self
                .db
                .record_practice_time(&tracker.pose, practice_secs, now)
                .await
            {
                warn!("failed to record practice time for {}: {err:#}", tracker.pose);
            }
        }
        if let Some(run_id) = &tracker.run_id {
            if let Err(err) = self
                .db
                .finish_practice_run(run_id, now, practice_secs, tracker.completed)
                .await
            {
                warn!("failed to finish practice run {run_id}: {err:#}");
            }
        }

        info!(
            "camera session for {} ended after {}s (completed: {})",
            tracker.pose, practice_secs, tracker.completed
        );
        Ok(Some(RunSummary {
            run_id: tracker.run_id,
            pose_id: tracker.pose,
            practice_secs,
            completed: tracker.completed,
            recorded_time,
        }))
    }

    /// Switches to another pose. An open camera session is settled first and
    /// must be re-enabled for the new pose.
    pub async fn set_pose<A: PoseApi>(&mut self, requested_pose: &str, api: &A) -> Result<()> {
        let pose = resolve_pose_id(Some(requested_pose)).to_string();
        if pose == self.pose {
            return Ok(());
        }

        self.disable_camera().await?;
        self.guide.set_pose(&pose).await?;
        self.meter.rebind(&pose).await;
        self.details = load_pose(api, &pose).await;
        info!("practice view switched from {} to {pose}", self.pose);
        self.pose = pose;
        Ok(())
    }

    pub async fn teardown(self) -> Result<Option<RunSummary>> {
        let summary = self.disable_camera().await?;
        self.guide.stop().await;
        self.meter.stop().await;
        self.countdown.stop().await;
        info!("practice view for {} torn down", self.pose);
        Ok(summary)
    }
}

async fn pump(
    mut messages: mpsc::UnboundedReceiver<FeedbackMessage>,
    mut completions: mpsc::UnboundedReceiver<String>,
    meter: Arc<PoseMeter>,
    mut tracker: RunTracker,
) -> PumpState {
    loop {
        tokio::select! {
            message = messages.recv() => {
                let Some(message) = message else {
                    break;
                };
                tracker.apply(message, &meter).await;
            }
            Some(pose) = completions.recv() => {
                if pose == tracker.pose {
                    tracker.complete().await;
                }
            }
        }
    }

    PumpState {
        tracker,
        completions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::LocalApi,
        breathing::MutedCues,
        events::ChannelSink,
        feedback::ChannelTransport,
    };
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::time;

    struct Harness {
        _dir: TempDir,
        db: Database,
        api: LocalApi,
        events: mpsc::UnboundedReceiver<UiEvent>,
        sink: SharedSink,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in(dir.path()).unwrap();
        let (sink, events) = ChannelSink::new();
        Harness {
            _dir: dir,
            api: LocalApi::new(db.clone()),
            db,
            events,
            sink: Arc::new(sink),
        }
    }

    fn options(required_hold_secs: f64) -> PracticeOptions {
        let timing = TimingSettings {
            hold_tick_ms: 20,
            min_recorded_practice_secs: 0,
            ..TimingSettings::default()
        };
        PracticeOptions {
            required_hold_secs: Some(required_hold_secs),
            ..PracticeOptions::new(timing, Arc::new(MutedCues))
        }
    }

    fn toasts(events: &mut mpsc::UnboundedReceiver<UiEvent>) -> usize {
        let mut count = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, UiEvent::Toast { .. }) {
                count += 1;
            }
        }
        count
    }

    #[tokio::test]
    async fn undefined_route_opens_default_pose() {
        let h = harness();
        let view = PracticeView::open(
            Some("undefined"),
            &h.api,
            h.db.clone(),
            None,
            options(30.0),
            h.sink.clone(),
        )
        .await
        .unwrap();

        assert_eq!(view.pose(), "vrksana");
        assert!(view.details().is_live());
        assert!(!view.camera_enabled().await);
        view.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_hold_override_fails_to_open() {
        let h = harness();
        for required in [f64::NAN, 0.0, -5.0] {
            let result = PracticeView::open(
                Some("vrksana"),
                &h.api,
                h.db.clone(),
                None,
                options(required),
                h.sink.clone(),
            )
            .await;
            assert!(result.is_err(), "{required} should be rejected");
        }
    }

    #[tokio::test]
    async fn held_pose_records_one_completion() {
        let mut h = harness();
        let view = PracticeView::open(
            Some("vrksana"),
            &h.api,
            h.db.clone(),
            None,
            options(0.2),
            h.sink.clone(),
        )
        .await
        .unwrap();

        let (transport, mut detector) = ChannelTransport::pair();
        assert!(view.enable_camera(transport).await.unwrap());
        let (second, _detector) = ChannelTransport::pair();
        assert!(!view.enable_camera(second).await.unwrap());

        assert_eq!(detector.received.recv().await.unwrap(), r#"{"pose":"vrksana"}"#);
        detector.send_json(json!({"is_correct_pose": true, "accuracy": 88.0}));
        time::sleep(Duration::from_millis(400)).await;
        assert!(view.meter().await.completed);

        detector.send_json(json!({"pose_completed": true}));
        time::sleep(Duration::from_millis(50)).await;

        let summary = view.disable_camera().await.unwrap().unwrap();
        assert!(summary.completed);
        assert!(summary.run_id.is_some());
        assert_eq!(toasts(&mut h.events), 1);

        let progress = h.db.get_pose_progress("vrksana").await.unwrap();
        assert_eq!(progress.attempts, 1);
        assert_eq!(progress.completions, 1);
        assert_eq!(progress.best_accuracy, 88.0);

        let run = h
            .db
            .get_practice_run(summary.run_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(run.completed);
        assert!(run.ended_at.is_some());
        view.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn short_session_skips_practice_time() {
        let h = harness();
        let mut opts = options(30.0);
        opts.timing.min_recorded_practice_secs = 5;
        let view = PracticeView::open(Some("tadasan"), &h.api, h.db.clone(), None, opts, h.sink.clone())
            .await
            .unwrap();

        let (transport, _detector) = ChannelTransport::pair();
        view.enable_camera(transport).await.unwrap();
        let summary = view.disable_camera().await.unwrap().unwrap();
        assert!(!summary.recorded_time);
        assert!(!summary.completed);
        assert!(view.disable_camera().await.unwrap().is_none());

        let progress = h.db.get_pose_progress("tadasan").await.unwrap();
        assert_eq!(progress.attempts, 1);
        assert_eq!(progress.total_practice_secs, 0);

        // the view can reopen the camera after a session ends
        let (transport, _detector) = ChannelTransport::pair();
        assert!(view.enable_camera(transport).await.unwrap());
        view.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn switching_pose_settles_the_open_session() {
        let h = harness();
        let mut view = PracticeView::open(
            Some("vrksana"),
            &h.api,
            h.db.clone(),
            None,
            options(30.0),
            h.sink.clone(),
        )
        .await
        .unwrap();

        let (transport, _detector) = ChannelTransport::pair();
        view.enable_camera(transport).await.unwrap();
        view.set_pose("balasana", &h.api).await.unwrap();

        assert_eq!(view.pose(), "balasana");
        assert!(!view.camera_enabled().await);
        assert_eq!(view.meter().await.pose, "balasana");
        let runs = h.db.list_practice_runs("vrksana", 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].ended_at.is_some());
        view.teardown().await.unwrap();
    }
}
