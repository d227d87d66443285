use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use log::info;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    events::{SharedSink, UiEvent},
    poses::{hold_profile, HoldProfile},
};

use super::{HoldDisplay, HoldEvent, HoldMeter, HoldMeterConfig};

/// Invoked once per pose binding when the required hold is reached.
pub type CompletionCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct MeterSnapshot {
    pub pose: String,
    pub display: HoldDisplay,
    pub progress_fraction: f64,
    pub accumulated_secs: f64,
    pub completed: bool,
    pub holding: bool,
}

struct MeterState {
    pose: String,
    meter: HoldMeter,
    /// Set while a ticker task is alive; cleared by the task itself when the
    /// meter settles, always under this lock.
    ticking: bool,
}

/// Timer-driven wrapper around [`HoldMeter`]. Ticks only while a hold, grace
/// countdown, decay or completion banner is in progress.
pub struct PoseMeter {
    state: Arc<Mutex<MeterState>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    required_override: Option<HoldProfile>,
    tick_interval: Duration,
    events: SharedSink,
    on_complete: CompletionCallback,
}

impl PoseMeter {
    pub fn new(
        pose: &str,
        required_override: Option<f64>,
        config: HoldMeterConfig,
        tick_interval: Duration,
        events: SharedSink,
        on_complete: CompletionCallback,
    ) -> Result<Self> {
        let required_override = required_override.map(HoldProfile::new).transpose()?;
        if tick_interval.is_zero() {
            bail!("hold meter tick interval must be positive");
        }
        let required = required_override
            .unwrap_or_else(|| hold_profile(pose))
            .required_hold_secs();
        Ok(Self {
            state: Arc::new(Mutex::new(MeterState {
                pose: pose.to_string(),
                meter: HoldMeter::new(required, config),
                ticking: false,
            })),
            ticker: Arc::new(Mutex::new(None)),
            required_override,
            tick_interval,
            events,
            on_complete,
        })
    }

    /// Records the detector's latest verdict.
    pub async fn set_in_pose(&self, in_pose: bool) {
        let mut guard = self.state.lock().await;
        let now = time::Instant::now().into_std();
        let event = guard.meter.update(in_pose, now);
        let display = guard.meter.display(now);
        let pose = guard.pose.clone();

        if guard.meter.needs_tick(now) && !guard.ticking {
            guard.ticking = true;
            self.spawn_ticker().await;
        }
        drop(guard);

        if let Some(event) = event {
            handle_event(&pose, event, &self.events, &self.on_complete);
        }
        self.events.emit(UiEvent::HoldUpdate { pose, display });
    }

    /// Binds the meter to another pose, discarding all progress.
    pub async fn rebind(&self, pose: &str) {
        self.cancel_ticker().await;
        let required = self
            .required_override
            .unwrap_or_else(|| hold_profile(pose))
            .required_hold_secs();

        let mut guard = self.state.lock().await;
        guard.pose = pose.to_string();
        guard.meter.reset(required);
        guard.ticking = false;
        info!("pose meter bound to {pose} ({required}s hold)");
        self.events.emit(UiEvent::HoldUpdate {
            pose: pose.to_string(),
            display: HoldDisplay::Hidden,
        });
    }

    pub async fn stop(&self) {
        self.cancel_ticker().await;
        self.state.lock().await.ticking = false;
    }

    pub async fn is_ticking(&self) -> bool {
        self.state.lock().await.ticking
    }

    pub async fn snapshot(&self) -> MeterSnapshot {
        let guard = self.state.lock().await;
        let now = time::Instant::now().into_std();
        MeterSnapshot {
            pose: guard.pose.clone(),
            display: guard.meter.display(now),
            progress_fraction: guard.meter.progress_fraction(),
            accumulated_secs: guard.meter.accumulated_secs(),
            completed: guard.meter.is_completed(),
            holding: guard.meter.hold_start().is_some(),
        }
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let events = self.events.clone();
        let on_complete = self.on_complete.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the caller already applied the input for this instant
            interval.tick().await;

            loop {
                interval.tick().await;

                let (pose, event, display, settled) = {
                    let mut guard = state.lock().await;
                    let now = time::Instant::now().into_std();
                    let input = guard.meter.in_pose();
                    let event = guard.meter.update(input, now);
                    let display = guard.meter.display(now);
                    let settled = !guard.meter.needs_tick(now);
                    if settled {
                        guard.ticking = false;
                    }
                    (guard.pose.clone(), event, display, settled)
                };

                if let Some(event) = event {
                    handle_event(&pose, event, &events, &on_complete);
                }
                events.emit(UiEvent::HoldUpdate { pose, display });

                if settled {
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }
}

impl Drop for PoseMeter {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.ticker.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

fn handle_event(
    pose: &str,
    event: HoldEvent,
    events: &SharedSink,
    on_complete: &CompletionCallback,
) {
    match event {
        HoldEvent::Completed => {
            info!("pose {pose} held for the required duration");
            events.emit(UiEvent::PoseCompleted {
                pose: pose.to_string(),
            });
            on_complete(pose);
        }
        HoldEvent::Abandoned => info!("hold on {pose} abandoned after grace window"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn meter(pose: &str) -> (PoseMeter, Arc<AtomicUsize>) {
        let (sink, _rx) = ChannelSink::new();
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = completions.clone();
        let meter = PoseMeter::new(
            pose,
            None,
            HoldMeterConfig::default(),
            Duration::from_millis(100),
            Arc::new(sink),
            Arc::new(move |_pose: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        (meter, completions)
    }

    fn meter_with(required: Option<f64>, tick_interval: Duration) -> Result<PoseMeter> {
        let (sink, _rx) = ChannelSink::new();
        PoseMeter::new(
            "vrksana",
            required,
            HoldMeterConfig::default(),
            tick_interval,
            Arc::new(sink),
            Arc::new(|_pose: &str| {}),
        )
    }

    #[test]
    fn invalid_hold_overrides_are_rejected() {
        for required in [f64::NAN, f64::INFINITY, 0.0, -5.0] {
            assert!(
                meter_with(Some(required), Duration::from_millis(100)).is_err(),
                "{required} should be rejected"
            );
        }
        assert!(meter_with(None, Duration::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn valid_override_replaces_pose_requirement() {
        let meter = meter_with(Some(5.0), Duration::from_millis(100)).unwrap();
        meter.set_in_pose(true).await;
        time::sleep(Duration::from_millis(5_500)).await;
        let snapshot = meter.snapshot().await;
        assert!(snapshot.completed);
        assert_eq!(snapshot.progress_fraction, 1.0);

        // the override survives a pose change
        meter.rebind("balasana").await;
        meter.set_in_pose(true).await;
        time::sleep(Duration::from_millis(5_500)).await;
        assert!(meter.snapshot().await.completed);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_completes_hold_without_new_input() {
        let (meter, completions) = meter("tadasan");
        meter.set_in_pose(true).await;

        time::sleep(Duration::from_millis(20_500)).await;
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        let snapshot = meter.snapshot().await;
        assert!(snapshot.completed);
        assert_eq!(snapshot.progress_fraction, 1.0);
        assert_eq!(snapshot.display, HoldDisplay::CompletedBanner);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert!(!meter.is_ticking().await);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_stops_once_decay_drains() {
        let (meter, completions) = meter("vrksana");
        assert_eq!(meter.snapshot().await.display, HoldDisplay::Hidden);

        meter.set_in_pose(true).await;
        time::sleep(Duration::from_secs(3)).await;
        meter.set_in_pose(false).await;
        assert!(meter.is_ticking().await);

        time::sleep(Duration::from_secs(10)).await;
        let snapshot = meter.snapshot().await;
        assert!(!snapshot.holding);
        assert_eq!(snapshot.progress_fraction, 0.0);
        assert!(!meter.is_ticking().await);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rebind_resets_and_cancels() {
        let (meter, completions) = meter("tadasan");
        meter.set_in_pose(true).await;
        time::sleep(Duration::from_secs(21)).await;
        assert!(meter.snapshot().await.completed);

        meter.rebind("balasana").await;
        let snapshot = meter.snapshot().await;
        assert!(!snapshot.completed);
        assert_eq!(snapshot.pose, "balasana");
        assert_eq!(snapshot.display, HoldDisplay::Hidden);
        assert!(!meter.is_ticking().await);

        meter.set_in_pose(true).await;
        time::sleep(Duration::from_secs(61)).await;
        assert_eq!(completions.load(Ordering::SeqCst), 2);
    }
}
