pub mod chime;

use anyhow::{anyhow, Context, Result};
use chime::Chime;
use log::{error, warn};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::{
    fs::File,
    io::BufReader,
    path::PathBuf,
    sync::{
        mpsc::{self, Sender},
        Mutex,
    },
    thread,
    time::Duration,
};

use crate::{
    breathing::{BreathPhase, PhaseCuePlayer},
    settings::CueSettings,
};

const CHIME_LENGTH: Duration = Duration::from_millis(600);

enum CueCommand {
    Play(BreathPhase),
    Stop,
}

/// Plays breath cues on a dedicated thread that owns the output stream.
pub struct CueEngineHandle {
    settings: CueSettings,
    tx: Mutex<Option<Sender<CueCommand>>>,
}

impl CueEngineHandle {
    pub fn new(settings: CueSettings) -> Self {
        Self {
            settings,
            tx: Mutex::new(None),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<CueCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("cue engine lock poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<CueCommand>();
        let settings = self.settings.clone();

        thread::Builder::new()
            .name("cue-engine".to_string())
            .spawn(move || {
                let mut output: Option<(OutputStream, OutputStreamHandle)> = None;
                let mut sink: Option<Sink> = None;

                while let Ok(cmd) = rx.recv() {
                    // a new cue always cuts the previous one short
                    if let Some(previous) = sink.take() {
                        previous.stop();
                    }

                    let CueCommand::Play(phase) = cmd else {
                        continue;
                    };

                    if output.is_none() {
                        match OutputStream::try_default() {
                            Ok(stream) => output = Some(stream),
                            Err(err) => {
                                error!("Failed to open audio output for cues: {err}");
                                continue;
                            }
                        }
                    }
                    let Some((_, handle)) = output.as_ref() else {
                        continue;
                    };

                    match start_cue(handle, &settings, phase) {
                        Ok(new_sink) => sink = Some(new_sink),
                        Err(err) => warn!("Breath cue {} failed: {err:#}", phase.label()),
                    }
                }
            })
            .context("failed to spawn cue engine thread")?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

fn cue_path(settings: &CueSettings, phase: BreathPhase) -> Option<PathBuf> {
    let file = match phase {
        BreathPhase::Inhale => &settings.inhale_file,
        BreathPhase::Exhale => &settings.exhale_file,
    };
    settings
        .cue_dir
        .as_ref()
        .map(|dir| dir.join(file))
        .filter(|path| path.is_file())
}

fn chime_freq(phase: BreathPhase) -> f32 {
    match phase {
        BreathPhase::Inhale => 880.0,
        BreathPhase::Exhale => 660.0,
    }
}

fn start_cue(handle: &OutputStreamHandle, settings: &CueSettings, phase: BreathPhase) -> Result<Sink> {
    let sink = Sink::try_new(handle).context("failed to create cue sink")?;
    sink.set_volume(settings.volume.clamp(0.0, 1.0));

    match cue_path(settings, phase) {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("failed to open cue {}", path.display()))?;
            let source = Decoder::new(BufReader::new(file))
                .with_context(|| format!("failed to decode cue {}", path.display()))?;
            sink.append(source);
        }
        None => sink.append(Chime::new(chime_freq(phase), CHIME_LENGTH)),
    }
    Ok(sink)
}

impl PhaseCuePlayer for CueEngineHandle {
    fn play(&self, phase: BreathPhase) -> Result<()> {
        self.ensure_thread()?
            .send(CueCommand::Play(phase))
            .map_err(|_| anyhow!("cue engine thread has exited"))
    }

    fn stop(&self) -> Result<()> {
        let guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("cue engine lock poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(CueCommand::Stop);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn recorded_cue_used_only_when_present() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("inhale.mp3"), b"").unwrap();
        let settings = CueSettings {
            cue_dir: Some(dir.path().to_path_buf()),
            ..CueSettings::default()
        };

        assert_eq!(
            cue_path(&settings, BreathPhase::Inhale),
            Some(dir.path().join("inhale.mp3"))
        );
        assert_eq!(cue_path(&settings, BreathPhase::Exhale), None);
        assert_eq!(cue_path(&CueSettings::default(), BreathPhase::Inhale), None);
    }
}
