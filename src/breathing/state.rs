use serde::Serialize;
use std::time::Instant;

use crate::poses::PoseTimingProfile;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BreathPhase {
    Inhale,
    Exhale,
}

impl BreathPhase {
    pub fn label(&self) -> &'static str {
        match self {
            BreathPhase::Inhale => "INHALE",
            BreathPhase::Exhale => "EXHALE",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            BreathPhase::Inhale => "Breathe in deeply through your nose",
            BreathPhase::Exhale => "Breathe out slowly through your mouth",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreathPhaseState {
    pub phase: BreathPhase,
    /// Fraction of the current phase already elapsed, clamped to `[0, 1]`.
    pub phase_progress: f64,
    #[serde(skip)]
    pub cycle_start: Instant,
}

impl BreathPhaseState {
    fn fresh(now: Instant) -> Self {
        Self {
            phase: BreathPhase::Inhale,
            phase_progress: 0.0,
            cycle_start: now,
        }
    }
}

/// Outcome of a single oscillator tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreathTick {
    /// The cycle wrapped. Only the anchor moved; the next tick starts from zero.
    CycleRestarted,
    Steady,
    PhaseChanged { from: BreathPhase, to: BreathPhase },
}

/// Phase and in-phase progress `elapsed_secs` into a cycle. Callers must keep
/// `elapsed_secs` below the cycle length.
pub fn phase_at(profile: &PoseTimingProfile, elapsed_secs: f64) -> (BreathPhase, f64) {
    let inhale_secs = profile.inhale_secs();
    if elapsed_secs < inhale_secs {
        (BreathPhase::Inhale, (elapsed_secs / inhale_secs).clamp(0.0, 1.0))
    } else {
        let progress = (elapsed_secs - inhale_secs) / profile.exhale_secs();
        (BreathPhase::Exhale, progress.clamp(0.0, 1.0))
    }
}

/// Free-running inhale/exhale clock for one displayed pose.
#[derive(Debug, Clone)]
pub struct BreathOscillator {
    profile: PoseTimingProfile,
    state: BreathPhaseState,
}

impl BreathOscillator {
    pub fn new(profile: PoseTimingProfile, now: Instant) -> Self {
        Self {
            profile,
            state: BreathPhaseState::fresh(now),
        }
    }

    /// Re-anchors on a new pose. Unconditional: wherever the previous cycle
    /// was, the guide restarts at the top of an inhale.
    pub fn reseed(&mut self, profile: PoseTimingProfile, now: Instant) {
        self.profile = profile;
        self.state = BreathPhaseState::fresh(now);
    }

    pub fn tick(&mut self, now: Instant) -> BreathTick {
        let elapsed = now
            .saturating_duration_since(self.state.cycle_start)
            .as_secs_f64();

        if elapsed >= self.profile.cycle_secs() {
            self.state.cycle_start = now;
            return BreathTick::CycleRestarted;
        }

        let (phase, progress) = phase_at(&self.profile, elapsed);
        let previous = self.state.phase;
        self.state.phase = phase;
        self.state.phase_progress = progress;

        if previous != phase {
            BreathTick::PhaseChanged {
                from: previous,
                to: phase,
            }
        } else {
            BreathTick::Steady
        }
    }

    pub fn state(&self) -> &BreathPhaseState {
        &self.state
    }

    pub fn profile(&self) -> &PoseTimingProfile {
        &self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poses::{timing_profile, CATALOG};
    use std::time::Duration;

    fn at(start: Instant, secs: f64) -> Instant {
        start + Duration::from_secs_f64(secs)
    }

    #[test]
    fn tadasan_reference_points() {
        let start = Instant::now();
        let mut osc = BreathOscillator::new(timing_profile("tadasan"), start);

        osc.tick(at(start, 2.4));
        assert_eq!(osc.state().phase, BreathPhase::Inhale);
        assert!((osc.state().phase_progress - 0.96).abs() < 1e-6);

        let tick = osc.tick(at(start, 2.6));
        assert_eq!(
            tick,
            BreathTick::PhaseChanged {
                from: BreathPhase::Inhale,
                to: BreathPhase::Exhale
            }
        );
        assert!((osc.state().phase_progress - 0.04).abs() < 1e-6);
    }

    #[test]
    fn flips_exactly_at_inhale_boundary_and_wraps_at_cycle() {
        let start = Instant::now();
        let mut osc = BreathOscillator::new(timing_profile("adhomukha"), start);

        osc.tick(at(start, 3.999));
        assert_eq!(osc.state().phase, BreathPhase::Inhale);
        osc.tick(at(start, 4.0));
        assert_eq!(osc.state().phase, BreathPhase::Exhale);
        assert_eq!(osc.state().phase_progress, 0.0);

        let wrap = at(start, 8.0);
        assert_eq!(osc.tick(wrap), BreathTick::CycleRestarted);
        assert_eq!(osc.state().cycle_start, wrap);
        // the wrap tick leaves phase untouched; the next one flips back
        assert_eq!(osc.state().phase, BreathPhase::Exhale);
        assert_eq!(
            osc.tick(at(start, 8.05)),
            BreathTick::PhaseChanged {
                from: BreathPhase::Exhale,
                to: BreathPhase::Inhale
            }
        );
    }

    #[test]
    fn progress_stays_in_unit_interval_for_every_pose() {
        for entry in CATALOG {
            let start = Instant::now();
            let mut osc = BreathOscillator::new(timing_profile(entry.id), start);
            for step in 0..600 {
                osc.tick(at(start, step as f64 * 0.05));
                let progress = osc.state().phase_progress;
                assert!((0.0..=1.0).contains(&progress), "{} {progress}", entry.id);
            }
        }
    }

    #[test]
    fn reseed_restarts_at_inhale_regardless_of_prior_phase() {
        let start = Instant::now();
        let mut osc = BreathOscillator::new(timing_profile("vrksana"), start);
        osc.tick(at(start, 5.0));
        assert_eq!(osc.state().phase, BreathPhase::Exhale);

        let switch = at(start, 5.1);
        osc.reseed(timing_profile("balasana"), switch);
        assert_eq!(osc.state().phase, BreathPhase::Inhale);
        assert_eq!(osc.state().phase_progress, 0.0);
        assert_eq!(osc.state().cycle_start, switch);
        assert_eq!(osc.profile().cycle_secs(), 10.0);
    }

    #[test]
    fn exactly_one_transition_per_phase_change() {
        let start = Instant::now();
        let mut osc = BreathOscillator::new(timing_profile("tadasan"), start);
        let changes = (1..=200)
            .map(|step| osc.tick(at(start, step as f64 * 0.05)))
            .filter(|tick| matches!(tick, BreathTick::PhaseChanged { .. }))
            .count();
        // 10 s of a 5 s cycle: two exhale entries and one inhale re-entry
        assert_eq!(changes, 3);
    }
}
