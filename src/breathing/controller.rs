use std::{sync::Arc, time::Duration};

use anyhow::Result;
use log::{info, warn};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    events::{SharedSink, UiEvent},
    poses::{timing_profile, PoseTimingProfile},
};

use super::{BreathOscillator, BreathPhaseState, BreathTick, PhaseCuePlayer};

/// Caller overrides for the pose's breathing rhythm.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreathOverrides {
    pub cycle_secs: Option<f64>,
    pub inhale_ratio: Option<f64>,
}

impl BreathOverrides {
    fn profile_for(&self, pose: &str) -> Result<PoseTimingProfile> {
        timing_profile(pose).with_overrides(self.cycle_secs, self.inhale_ratio)
    }
}

struct GuideState {
    pose: String,
    oscillator: BreathOscillator,
}

/// Drives a [`BreathOscillator`] on a fixed tick and publishes its state.
pub struct BreathingGuide {
    state: Arc<Mutex<GuideState>>,
    overrides: BreathOverrides,
    ticker: Mutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
    cues: Arc<dyn PhaseCuePlayer>,
    events: SharedSink,
}

impl BreathingGuide {
    pub fn new(
        pose: &str,
        overrides: BreathOverrides,
        tick_interval: Duration,
        cues: Arc<dyn PhaseCuePlayer>,
        events: SharedSink,
    ) -> Result<Self> {
        let profile = overrides.profile_for(pose)?;
        let now = time::Instant::now().into_std();

        Ok(Self {
            state: Arc::new(Mutex::new(GuideState {
                pose: pose.to_string(),
                oscillator: BreathOscillator::new(profile, now),
            })),
            overrides,
            ticker: Mutex::new(None),
            tick_interval,
            cues,
            events,
        })
    }

    pub async fn start(&self) {
        {
            let mut guard = self.state.lock().await;
            let profile = *guard.oscillator.profile();
            guard
                .oscillator
                .reseed(profile, time::Instant::now().into_std());
        }
        self.spawn_ticker().await;
    }

    /// Switches the displayed pose and restarts the cycle at inhale.
    pub async fn set_pose(&self, pose: &str) -> Result<()> {
        let profile = self.overrides.profile_for(pose)?;
        let mut guard = self.state.lock().await;
        guard.pose = pose.to_string();
        guard
            .oscillator
            .reseed(profile, time::Instant::now().into_std());
        info!(
            "breathing guide reseeded for {} ({}s cycle, {:.2} inhale)",
            pose,
            profile.cycle_secs(),
            profile.inhale_ratio()
        );
        emit_breath_state(&self.events, &guard.pose, guard.oscillator.state().clone());
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
        if let Err(err) = self.cues.stop() {
            warn!("failed to silence breath cue: {err:#}");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub async fn snapshot(&self) -> BreathPhaseState {
        self.state.lock().await.oscillator.state().clone()
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let cues = self.cues.clone();
        let events = self.events.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;

                let (pose, tick, snapshot) = {
                    let mut guard = state.lock().await;
                    let tick = guard.oscillator.tick(time::Instant::now().into_std());
                    (guard.pose.clone(), tick, guard.oscillator.state().clone())
                };

                match tick {
                    BreathTick::CycleRestarted => continue,
                    BreathTick::PhaseChanged { to, .. } => {
                        // A cue that fails to play must not disturb the clock.
                        if let Err(err) = cues.play(to) {
                            warn!("breath cue playback failed: {err:#}");
                        }
                        events.emit(UiEvent::BreathPhaseChanged {
                            pose: pose.clone(),
                            phase: to,
                        });
                    }
                    BreathTick::Steady => {}
                }

                emit_breath_state(&events, &pose, snapshot);
            }
        });

        *ticker_guard = Some(handle);
    }
}

impl Drop for BreathingGuide {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.ticker.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

fn emit_breath_state(events: &SharedSink, pose: &str, state: BreathPhaseState) {
    events.emit(UiEvent::BreathUpdate {
        pose: pose.to_string(),
        instruction: state.phase.instruction(),
        state,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        breathing::{BreathPhase, MutedCues},
        events::ChannelSink,
    };
    use std::sync::Mutex as StdMutex;

    struct RecordingCues(StdMutex<Vec<BreathPhase>>);

    impl PhaseCuePlayer for RecordingCues {
        fn play(&self, phase: BreathPhase) -> Result<()> {
            self.0.lock().unwrap().push(phase);
            Ok(())
        }
    }

    struct BrokenCues;

    impl PhaseCuePlayer for BrokenCues {
        fn play(&self, _phase: BreathPhase) -> Result<()> {
            anyhow::bail!("no audio device")
        }
    }

    fn make_guide(
        pose: &str,
        cues: Arc<dyn PhaseCuePlayer>,
    ) -> (BreathingGuide, tokio::sync::mpsc::UnboundedReceiver<UiEvent>) {
        let (sink, rx) = ChannelSink::new();
        let guide = BreathingGuide::new(
            pose,
            BreathOverrides::default(),
            Duration::from_millis(50),
            cues,
            Arc::new(sink),
        )
        .unwrap();
        (guide, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn cues_fire_once_per_phase_change() {
        let cues = Arc::new(RecordingCues(StdMutex::new(Vec::new())));
        let (guide, _rx) = make_guide("tadasan", cues.clone());
        guide.start().await;

        time::sleep(Duration::from_millis(5_200)).await;
        guide.stop().await;

        let played = cues.0.lock().unwrap().clone();
        assert_eq!(played, vec![BreathPhase::Exhale, BreathPhase::Inhale]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_cues_do_not_stop_the_clock() {
        let (guide, _rx) = make_guide("tadasan", Arc::new(BrokenCues));
        guide.start().await;

        time::sleep(Duration::from_millis(3_000)).await;
        let state = guide.snapshot().await;
        assert_eq!(state.phase, BreathPhase::Exhale);
        assert!(guide.is_running().await);
        guide.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn pose_change_reseeds_to_inhale() {
        let (guide, mut rx) = make_guide("vrksana", Arc::new(MutedCues));
        guide.start().await;
        time::sleep(Duration::from_millis(4_000)).await;
        assert_eq!(guide.snapshot().await.phase, BreathPhase::Exhale);

        guide.set_pose("balasana").await.unwrap();
        let state = guide.snapshot().await;
        assert_eq!(state.phase, BreathPhase::Inhale);
        assert_eq!(state.phase_progress, 0.0);
        guide.stop().await;

        let mut saw_balasana = false;
        while let Ok(event) = rx.try_recv() {
            if let UiEvent::BreathUpdate { pose, .. } = event {
                saw_balasana |= pose == "balasana";
            }
        }
        assert!(saw_balasana);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_the_ticker() {
        let (guide, mut rx) = make_guide("tadasan", Arc::new(MutedCues));
        guide.start().await;
        time::sleep(Duration::from_millis(200)).await;
        guide.stop().await;
        assert!(!guide.is_running().await);

        while rx.try_recv().is_ok() {}
        time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_override_is_rejected() {
        let (sink, _rx) = ChannelSink::new();
        let result = BreathingGuide::new(
            "vrksana",
            BreathOverrides {
                cycle_secs: None,
                inhale_ratio: Some(1.5),
            },
            Duration::from_millis(50),
            Arc::new(MutedCues),
            Arc::new(sink),
        );
        assert!(result.is_err());
    }
}
