use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::settings::CueSettings;

use super::BreathPhase;

/// Plays the audible cue that marks a breath phase change.
///
/// `play` must return quickly; implementations hand the work to their own
/// thread. Starting a cue cancels whichever cue is still sounding.
pub trait PhaseCuePlayer: Send + Sync {
    fn play(&self, phase: BreathPhase) -> Result<()>;

    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Cue player used when audio output is disabled.
pub struct LoggedCues;

impl PhaseCuePlayer for LoggedCues {
    fn play(&self, phase: BreathPhase) -> Result<()> {
        info!("breath cue: {}", phase.label());
        Ok(())
    }
}

/// Swallows cues entirely.
pub struct MutedCues;

impl PhaseCuePlayer for MutedCues {
    fn play(&self, _phase: BreathPhase) -> Result<()> {
        Ok(())
    }
}

/// Cue player for the configured output: muted, logged, or played through
/// the audio device when built with the `audio` feature.
pub fn cue_player(settings: &CueSettings) -> Arc<dyn PhaseCuePlayer> {
    if !settings.enabled {
        return Arc::new(MutedCues);
    }

    #[cfg(feature = "audio")]
    {
        Arc::new(crate::audio::CueEngineHandle::new(settings.clone()))
    }

    #[cfg(not(feature = "audio"))]
    {
        Arc::new(LoggedCues)
    }
}
