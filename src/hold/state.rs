use serde::Serialize;
use std::time::{Duration, Instant};

/// Tuning for the hold meter. The defaults reproduce the reference feel; none
/// of them is contractual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldMeterConfig {
    /// Continuous "not in pose" time tolerated before a hold is abandoned.
    pub grace: Duration,
    /// Progress removed per decay interval once a hold is abandoned, as a
    /// fraction of the full bar.
    pub decay_step: f64,
    pub decay_interval: Duration,
    /// How long the "Pose Completed!" banner stays up.
    pub completion_banner: Duration,
}

impl Default for HoldMeterConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(3),
            decay_step: 0.02,
            decay_interval: Duration::from_millis(100),
            completion_banner: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldPhase {
    Idle,
    Holding {
        since: Instant,
    },
    /// Input dropped while holding; the hold survives if it returns within
    /// the grace window.
    Abandoning {
        since: Instant,
        false_since: Instant,
    },
    /// Hold abandoned; the bar drains from `start_secs` instead of snapping
    /// to zero.
    Decaying {
        from: Instant,
        start_secs: f64,
    },
    Completed {
        at: Instant,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldEvent {
    Started,
    GraceStarted,
    Resumed,
    Abandoned,
    Drained,
    Completed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HoldDisplay {
    /// Nothing attempted yet; no bar is drawn.
    Hidden,
    CompletedBanner,
    #[serde(rename_all = "camelCase")]
    Progress {
        percent: f64,
        held_secs: f64,
        required_secs: f64,
        in_pose: bool,
        hint: String,
    },
}

/// Continuous-hold tracker for one pose binding.
#[derive(Debug, Clone)]
pub struct HoldMeter {
    required_secs: f64,
    config: HoldMeterConfig,
    phase: HoldPhase,
    accumulated_secs: f64,
    completed: bool,
    in_pose: bool,
    /// Set by the first `true` input of this binding; a drained bar stays
    /// visible once the pose was attempted.
    attempted: bool,
}

impl HoldMeter {
    pub fn new(required_secs: f64, config: HoldMeterConfig) -> Self {
        Self {
            required_secs,
            config,
            phase: HoldPhase::Idle,
            accumulated_secs: 0.0,
            completed: false,
            in_pose: false,
            attempted: false,
        }
    }

    /// Rebinds to a new pose (or detector). Clears everything, `completed`
    /// included.
    pub fn reset(&mut self, required_secs: f64) {
        *self = Self::new(required_secs, self.config);
    }

    /// Feeds the detector input observed at `now`.
    pub fn update(&mut self, in_pose: bool, now: Instant) -> Option<HoldEvent> {
        self.in_pose = in_pose;
        self.attempted |= in_pose;
        let (phase, accumulated, event) = advance(
            self.phase,
            self.accumulated_secs,
            in_pose,
            now,
            self.required_secs,
            &self.config,
        );
        self.phase = phase;
        self.accumulated_secs = accumulated;
        if event == Some(HoldEvent::Completed) {
            self.completed = true;
        }
        event
    }

    pub fn phase(&self) -> HoldPhase {
        self.phase
    }

    pub fn hold_start(&self) -> Option<Instant> {
        match self.phase {
            HoldPhase::Holding { since } | HoldPhase::Abandoning { since, .. } => Some(since),
            _ => None,
        }
    }

    pub fn accumulated_secs(&self) -> f64 {
        self.accumulated_secs
    }

    pub fn required_secs(&self) -> f64 {
        self.required_secs
    }

    pub fn progress_fraction(&self) -> f64 {
        (self.accumulated_secs / self.required_secs).clamp(0.0, 1.0)
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Last detector input fed to the meter.
    pub fn in_pose(&self) -> bool {
        self.in_pose
    }

    /// Whether a periodic tick still changes anything.
    pub fn needs_tick(&self, now: Instant) -> bool {
        match self.phase {
            HoldPhase::Idle => false,
            HoldPhase::Completed { at } => {
                now.saturating_duration_since(at) < self.config.completion_banner
            }
            _ => true,
        }
    }

    pub fn display(&self, now: Instant) -> HoldDisplay {
        if let HoldPhase::Completed { at } = self.phase {
            if now.saturating_duration_since(at) < self.config.completion_banner {
                return HoldDisplay::CompletedBanner;
            }
        }

        if !self.attempted && !self.completed {
            return HoldDisplay::Hidden;
        }

        let hint = if self.in_pose {
            let remaining = (self.required_secs - self.accumulated_secs).ceil().max(0.0);
            format!("Hold for {remaining}s more")
        } else {
            "Adjust your pose to match the target position".to_string()
        };

        HoldDisplay::Progress {
            percent: self.progress_fraction() * 100.0,
            held_secs: self.accumulated_secs,
            required_secs: self.required_secs,
            in_pose: self.in_pose,
            hint,
        }
    }
}

/// Pure transition: `(phase, accumulated)` plus the input at `now` gives the
/// next `(phase, accumulated)` and the event it produced, if any.
pub fn advance(
    phase: HoldPhase,
    accumulated_secs: f64,
    in_pose: bool,
    now: Instant,
    required_secs: f64,
    config: &HoldMeterConfig,
) -> (HoldPhase, f64, Option<HoldEvent>) {
    let held_since = |since: Instant| now.saturating_duration_since(since).as_secs_f64();

    match (phase, in_pose) {
        (HoldPhase::Completed { .. }, _) => (phase, accumulated_secs, None),
        (HoldPhase::Idle, false) => (phase, accumulated_secs, None),
        (HoldPhase::Idle, true) | (HoldPhase::Decaying { .. }, true) => (
            HoldPhase::Holding { since: now },
            0.0,
            Some(HoldEvent::Started),
        ),
        (HoldPhase::Holding { since }, true) => {
            let held = held_since(since);
            if held >= required_secs {
                (HoldPhase::Completed { at: now }, held, Some(HoldEvent::Completed))
            } else {
                (phase, held, None)
            }
        }
        (HoldPhase::Holding { since }, false) => (
            HoldPhase::Abandoning {
                since,
                false_since: now,
            },
            accumulated_secs,
            Some(HoldEvent::GraceStarted),
        ),
        (HoldPhase::Abandoning { since, .. }, true) => {
            // The flicker is forgiven: the hold runs on from its original start.
            let held = held_since(since);
            if held >= required_secs {
                (HoldPhase::Completed { at: now }, held, Some(HoldEvent::Completed))
            } else {
                (HoldPhase::Holding { since }, held, Some(HoldEvent::Resumed))
            }
        }
        (HoldPhase::Abandoning { false_since, .. }, false) => {
            if now.saturating_duration_since(false_since) > config.grace {
                (
                    HoldPhase::Decaying {
                        from: now,
                        start_secs: accumulated_secs,
                    },
                    accumulated_secs,
                    Some(HoldEvent::Abandoned),
                )
            } else {
                (phase, accumulated_secs, None)
            }
        }
        (HoldPhase::Decaying { from, start_secs }, false) => {
            let interval = config.decay_interval.as_nanos();
            let steps = if interval > 0 {
                (now.saturating_duration_since(from).as_nanos() / interval) as f64
            } else {
                f64::INFINITY
            };
            let remaining = start_secs - steps * config.decay_step * required_secs;
            if remaining <= 0.0 {
                (HoldPhase::Idle, 0.0, Some(HoldEvent::Drained))
            } else {
                (phase, remaining, None)
            }
        }
    }
}
