pub mod controller;
pub mod cues;
pub mod state;

pub use controller::{BreathOverrides, BreathingGuide};
pub use cues::{cue_player, LoggedCues, MutedCues, PhaseCuePlayer};
pub use state::{phase_at, BreathOscillator, BreathPhase, BreathPhaseState, BreathTick};
