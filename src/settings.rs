use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::{feedback::feedback_url, hold::HoldMeterConfig};

pub const DATA_DIR_ENV: &str = "NYRA_DATA_DIR";
pub const SETTINGS_FILE: &str = "settings.json";
const DEFAULT_DATA_DIR: &str = ".nyra";

/// Directory holding the settings file and the local store.
pub fn data_dir() -> PathBuf {
    env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueSettings {
    pub enabled: bool,
    pub volume: f32,
    /// Folder with the recorded cues; a synthesized chime is used without it.
    pub cue_dir: Option<PathBuf>,
    pub inhale_file: String,
    pub exhale_file: String,
}

impl Default for CueSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.8,
            cue_dir: None,
            inhale_file: "inhale.mp3".into(),
            exhale_file: "exhale.mp3".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub breath_tick_ms: u64,
    pub hold_tick_ms: u64,
    pub grace_ms: u64,
    pub decay_step_percent: f64,
    pub decay_interval_ms: u64,
    pub completion_banner_ms: u64,
    pub practice_countdown_secs: u64,
    pub min_recorded_practice_secs: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            breath_tick_ms: 50,
            hold_tick_ms: 100,
            grace_ms: 3_000,
            decay_step_percent: 2.0,
            decay_interval_ms: 100,
            completion_banner_ms: 5_000,
            practice_countdown_secs: 30,
            min_recorded_practice_secs: 5,
        }
    }
}

impl TimingSettings {
    pub fn validate(&self) -> Result<()> {
        if self.breath_tick_ms == 0 || self.hold_tick_ms == 0 || self.decay_interval_ms == 0 {
            bail!("tick intervals must be positive");
        }
        if !(self.decay_step_percent > 0.0 && self.decay_step_percent <= 100.0) {
            bail!(
                "decay step must lie in (0, 100] percent, got {}",
                self.decay_step_percent
            );
        }
        if self.practice_countdown_secs == 0 {
            bail!("practice countdown must be at least one second");
        }
        Ok(())
    }

    pub fn breath_tick(&self) -> Duration {
        Duration::from_millis(self.breath_tick_ms)
    }

    pub fn hold_tick(&self) -> Duration {
        Duration::from_millis(self.hold_tick_ms)
    }

    pub fn min_recorded_practice(&self) -> Duration {
        Duration::from_secs(self.min_recorded_practice_secs)
    }

    pub fn hold_config(&self) -> HoldMeterConfig {
        HoldMeterConfig {
            grace: Duration::from_millis(self.grace_ms),
            decay_step: self.decay_step_percent / 100.0,
            decay_interval: Duration::from_millis(self.decay_interval_ms),
            completion_banner: Duration::from_millis(self.completion_banner_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    pub host: String,
    pub secure: bool,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            host: "localhost:5000".into(),
            secure: false,
        }
    }
}

impl FeedbackSettings {
    pub fn url(&self) -> String {
        feedback_url(&self.host, self.secure)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    cues: CueSettings,
    timing: TimingSettings,
    feedback: FeedbackSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            parse_or_default(&contents, &path)
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn open_in(data_dir: &Path) -> Result<Self> {
        Self::new(data_dir.join(SETTINGS_FILE))
    }

    pub fn cues(&self) -> CueSettings {
        self.read().cues.clone()
    }

    pub fn timing(&self) -> TimingSettings {
        self.read().timing.clone()
    }

    pub fn feedback(&self) -> FeedbackSettings {
        self.read().feedback.clone()
    }

    pub fn update_cues(&self, settings: CueSettings) -> Result<()> {
        if !(0.0..=1.0).contains(&settings.volume) {
            bail!("cue volume must lie in [0, 1], got {}", settings.volume);
        }
        self.update(|data| data.cues = settings)
    }

    pub fn update_timing(&self, settings: TimingSettings) -> Result<()> {
        settings.validate()?;
        self.update(|data| data.timing = settings)
    }

    pub fn update_feedback(&self, settings: FeedbackSettings) -> Result<()> {
        if settings.host.trim().is_empty() {
            bail!("feedback host must not be empty");
        }
        self.update(|data| data.feedback = settings)
    }

    /// Re-reads the file. Invalid timing is refused and the current
    /// settings stay in place.
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        data.timing
            .validate()
            .with_context(|| format!("Refusing timing from {}", self.path.display()))?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut UserSettings)) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

fn parse_or_default(contents: &str, path: &Path) -> UserSettings {
    match serde_json::from_str::<UserSettings>(contents) {
        Ok(data) if data.timing.validate().is_ok() => data,
        Ok(_) => {
            warn!("Ignoring invalid timing in {}; using defaults", path.display());
            UserSettings::default()
        }
        Err(err) => {
            warn!("Malformed settings in {}: {err}; using defaults", path.display());
            UserSettings::default()
        }
    }
}
