use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Breathing rhythm for a pose: one full inhale+exhale cycle and the share of
/// it spent inhaling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoseTimingProfile {
    cycle_secs: f64,
    inhale_ratio: f64,
}

impl PoseTimingProfile {
    pub fn new(cycle_secs: f64, inhale_ratio: f64) -> Result<Self> {
        if !(cycle_secs.is_finite() && cycle_secs > 0.0) {
            bail!("cycle length must be positive, got {cycle_secs}");
        }
        if !(inhale_ratio > 0.0 && inhale_ratio < 1.0) {
            bail!("inhale ratio must lie strictly between 0 and 1, got {inhale_ratio}");
        }
        Ok(Self {
            cycle_secs,
            inhale_ratio,
        })
    }

    /// Applies caller overrides on top of this profile. Each override is
    /// independent, so a custom cycle keeps the pose's own ratio.
    pub fn with_overrides(self, cycle_secs: Option<f64>, inhale_ratio: Option<f64>) -> Result<Self> {
        Self::new(
            cycle_secs.unwrap_or(self.cycle_secs),
            inhale_ratio.unwrap_or(self.inhale_ratio),
        )
    }

    pub fn cycle_secs(&self) -> f64 {
        self.cycle_secs
    }

    pub fn inhale_ratio(&self) -> f64 {
        self.inhale_ratio
    }

    pub fn inhale_secs(&self) -> f64 {
        self.cycle_secs * self.inhale_ratio
    }

    pub fn exhale_secs(&self) -> f64 {
        self.cycle_secs * (1.0 - self.inhale_ratio)
    }
}

impl Default for PoseTimingProfile {
    fn default() -> Self {
        Self {
            cycle_secs: DEFAULT_CYCLE_SECS,
            inhale_ratio: DEFAULT_INHALE_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HoldProfile {
    required_hold_secs: f64,
}

impl HoldProfile {
    pub fn new(required_hold_secs: f64) -> Result<Self> {
        if !(required_hold_secs.is_finite() && required_hold_secs > 0.0) {
            bail!("required hold must be positive, got {required_hold_secs}");
        }
        Ok(Self { required_hold_secs })
    }

    pub fn required_hold_secs(&self) -> f64 {
        self.required_hold_secs
    }
}

impl Default for HoldProfile {
    fn default() -> Self {
        Self {
            required_hold_secs: DEFAULT_HOLD_SECS,
        }
    }
}

const DEFAULT_CYCLE_SECS: f64 = 6.0;
const DEFAULT_INHALE_RATIO: f64 = 0.4;
const DEFAULT_HOLD_SECS: f64 = 30.0;

// (pose, cycle seconds, inhale ratio, required hold seconds)
const POSE_TIMINGS: &[(&str, f64, f64, f64)] = &[
    ("vrksana", 6.0, 0.4, 30.0),
    ("adhomukha", 8.0, 0.5, 45.0),
    ("balasana", 10.0, 0.3, 60.0),
    ("tadasan", 5.0, 0.5, 20.0),
    ("trikonasana", 7.0, 0.4, 40.0),
    ("virabhadrasana", 6.0, 0.45, 35.0),
    ("bhujangasana", 7.0, 0.4, 40.0),
    ("setubandhasana", 8.0, 0.4, 50.0),
    ("uttanasana", 6.0, 0.3, 35.0),
    ("shavasana", 12.0, 0.3, 120.0),
    ("ardhamatsyendrasana", 7.0, 0.4, 45.0),
];

fn lookup(pose: &str) -> Option<&'static (&'static str, f64, f64, f64)> {
    POSE_TIMINGS.iter().find(|(id, ..)| *id == pose)
}

/// Breathing profile for `pose`, or the default rhythm for unknown poses.
pub fn timing_profile(pose: &str) -> PoseTimingProfile {
    lookup(pose)
        .map(|&(_, cycle_secs, inhale_ratio, _)| PoseTimingProfile {
            cycle_secs,
            inhale_ratio,
        })
        .unwrap_or_default()
}

/// Hold requirement for `pose`, or the default 30 s for unknown poses.
pub fn hold_profile(pose: &str) -> HoldProfile {
    lookup(pose)
        .map(|&(.., required_hold_secs)| HoldProfile { required_hold_secs })
        .unwrap_or_default()
}

pub fn has_timing(pose: &str) -> bool {
    lookup(pose).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_pose_uses_its_own_rhythm() {
        let profile = timing_profile("balasana");
        assert_eq!(profile.cycle_secs(), 10.0);
        assert_eq!(profile.inhale_ratio(), 0.3);
        assert!((profile.inhale_secs() - 3.0).abs() < 1e-9);
        assert!((profile.exhale_secs() - 7.0).abs() < 1e-9);
        assert_eq!(hold_profile("shavasana").required_hold_secs(), 120.0);
    }

    #[test]
    fn unknown_pose_falls_back_to_defaults() {
        assert_eq!(timing_profile("handstand"), PoseTimingProfile::default());
        assert_eq!(hold_profile("handstand").required_hold_secs(), 30.0);
        assert!(!has_timing("handstand"));
    }

    #[test]
    fn every_table_entry_is_a_valid_profile() {
        for &(pose, cycle, ratio, hold) in POSE_TIMINGS {
            assert!(PoseTimingProfile::new(cycle, ratio).is_ok(), "{pose}");
            assert!(HoldProfile::new(hold).is_ok(), "{pose}");
        }
    }

    #[test]
    fn overrides_are_independent_and_validated() {
        let base = timing_profile("tadasan");
        let custom = base.with_overrides(Some(9.0), None).unwrap();
        assert_eq!(custom.cycle_secs(), 9.0);
        assert_eq!(custom.inhale_ratio(), 0.5);

        assert!(base.with_overrides(None, Some(1.0)).is_err());
        assert!(base.with_overrides(Some(0.0), None).is_err());
        assert!(HoldProfile::new(-1.0).is_err());
    }
}
