use std::{sync::Arc, time::Duration};

use log::info;
use serde::Serialize;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::events::{SharedSink, UiEvent};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CountdownStatus {
    #[default]
    Ready,
    Running,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountdownState {
    pub status: CountdownStatus,
    pub total_secs: u64,
    pub remaining_secs: u64,
}

impl CountdownState {
    pub fn new(total_secs: u64) -> Self {
        Self {
            status: CountdownStatus::Ready,
            total_secs,
            remaining_secs: total_secs,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == CountdownStatus::Running
    }

    /// Starts or pauses. Starting from zero begins a fresh countdown.
    pub fn toggle(&mut self) {
        self.status = match self.status {
            CountdownStatus::Running => CountdownStatus::Paused,
            CountdownStatus::Finished => {
                self.remaining_secs = self.total_secs;
                CountdownStatus::Running
            }
            CountdownStatus::Ready | CountdownStatus::Paused => {
                if self.remaining_secs == 0 {
                    self.remaining_secs = self.total_secs;
                }
                CountdownStatus::Running
            }
        };
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.total_secs);
    }

    /// One second elapsed. Returns true when this tick reached zero.
    pub fn tick(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.status = CountdownStatus::Finished;
            return true;
        }
        false
    }
}

/// The practice page's countdown, ticking once per `tick_interval` while
/// running.
pub struct PracticeCountdown {
    state: Arc<Mutex<CountdownState>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    events: SharedSink,
}

impl PracticeCountdown {
    pub fn new(total_secs: u64, events: SharedSink) -> Self {
        Self::with_tick_interval(total_secs, Duration::from_secs(1), events)
    }

    pub fn with_tick_interval(total_secs: u64, tick_interval: Duration, events: SharedSink) -> Self {
        Self {
            state: Arc::new(Mutex::new(CountdownState::new(total_secs))),
            ticker: Arc::new(Mutex::new(None)),
            tick_interval,
            events,
        }
    }

    pub async fn toggle(&self) -> CountdownState {
        let snapshot = {
            let mut guard = self.state.lock().await;
            guard.toggle();
            guard.clone()
        };

        if snapshot.is_running() {
            self.spawn_ticker().await;
        } else {
            self.cancel_ticker().await;
        }
        emit_timer(&self.events, &snapshot);
        snapshot
    }

    pub async fn reset(&self) -> CountdownState {
        self.cancel_ticker().await;
        let snapshot = {
            let mut guard = self.state.lock().await;
            guard.reset();
            guard.clone()
        };
        emit_timer(&self.events, &snapshot);
        snapshot
    }

    pub async fn stop(&self) {
        self.cancel_ticker().await;
        let mut guard = self.state.lock().await;
        if guard.is_running() {
            guard.status = CountdownStatus::Paused;
        }
    }

    pub async fn snapshot(&self) -> CountdownState {
        self.state.lock().await.clone()
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
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                interval.tick().await;

                let (finished, snapshot) = {
                    let mut guard = state.lock().await;
                    let finished = guard.tick();
                    (finished, guard.clone())
                };

                emit_timer(&events, &snapshot);
                if finished {
                    info!("practice countdown finished");
                    break;
                }
                if !snapshot.is_running() {
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }
}

impl Drop for PracticeCountdown {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.ticker.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

fn emit_timer(events: &SharedSink, state: &CountdownState) {
    events.emit(UiEvent::PracticeTimer {
        remaining_secs: state.remaining_secs,
        running: state.is_running(),
    });
}
