use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44_100;

/// Short decaying sine used when no recorded cue is available.
pub struct Chime {
    freq: f32,
    num_sample: u32,
    total_samples: u32,
}

impl Chime {
    pub fn new(freq: f32, duration: Duration) -> Self {
        Self {
            freq,
            num_sample: 0,
            total_samples: (duration.as_secs_f32() * SAMPLE_RATE as f32) as u32,
        }
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        self.num_sample += 1;

        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        let envelope = (-4.0 * t).exp();
        Some((2.0 * PI * self.freq * t).sin() * envelope * 0.3)
    }
}

impl Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some((self.total_samples - self.num_sample) as usize)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chime_is_finite_and_quiet() {
        let chime = Chime::new(880.0, Duration::from_millis(500));
        let samples: Vec<f32> = chime.collect();
        assert_eq!(samples.len(), 22_050);
        assert!(samples.iter().all(|s| s.abs() <= 0.3));
    }
}
