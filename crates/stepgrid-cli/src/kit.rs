//! Procedurally synthesized drum kit.
//!
//! One voice per grid column, in the usual column order: hat, kick, snare,
//! tom, crash and three percussion voices. Loading happens on a background
//! thread, so the first steps may play with some columns still silent.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use stepgrid_core::{SampleBuffer, VoiceBank};

/// The eight demo voices, indexed by column.
pub const KIT: [DrumVoice; 8] = [
    DrumVoice::Hat,
    DrumVoice::Kick,
    DrumVoice::Snare,
    DrumVoice::Tom,
    DrumVoice::Crash,
    DrumVoice::Perc1,
    DrumVoice::Perc2,
    DrumVoice::Perc3,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrumVoice {
    Hat,
    Kick,
    Snare,
    Tom,
    Crash,
    Perc1,
    Perc2,
    Perc3,
}

impl DrumVoice {
    pub fn name(self) -> &'static str {
        match self {
            DrumVoice::Hat => "hat",
            DrumVoice::Kick => "kick",
            DrumVoice::Snare => "snare",
            DrumVoice::Tom => "tom",
            DrumVoice::Crash => "crash",
            DrumVoice::Perc1 => "perc1",
            DrumVoice::Perc2 => "perc2",
            DrumVoice::Perc3 => "perc3",
        }
    }

    fn length_seconds(self) -> f32 {
        match self {
            DrumVoice::Hat => 0.08,
            DrumVoice::Kick => 0.5,
            DrumVoice::Snare => 0.25,
            DrumVoice::Tom => 0.4,
            DrumVoice::Crash => 1.5,
            DrumVoice::Perc1 => 0.2,
            DrumVoice::Perc2 => 0.15,
            DrumVoice::Perc3 => 0.1,
        }
    }

    /// Render this voice as a mono buffer at `sample_rate`.
    pub fn synthesize(self, sample_rate: u32, rng: &mut impl Rng) -> SampleBuffer {
        let sr = sample_rate.max(1) as f32;
        let frames = (self.length_seconds() * sr) as usize;
        let mut samples = Vec::with_capacity(frames);
        let mut phase = 0.0f32;
        let mut last_noise = 0.0f32;

        for i in 0..frames {
            let t = i as f32 / sr;
            let noise: f32 = rng.random_range(-1.0..1.0);
            let sample = match self {
                DrumVoice::Hat => {
                    // First difference pushes the noise towards the top end
                    let bright = (noise - last_noise) * 0.5;
                    bright * (-t * 60.0).exp()
                }
                DrumVoice::Kick => {
                    let freq = 50.0 + 100.0 * (-t * 30.0).exp();
                    phase += TAU * freq / sr;
                    phase.sin() * (-t * 8.0).exp()
                }
                DrumVoice::Snare => {
                    phase += TAU * 180.0 / sr;
                    0.6 * noise * (-t * 20.0).exp() + 0.4 * phase.sin() * (-t * 25.0).exp()
                }
                DrumVoice::Tom => {
                    let freq = 120.0 + 100.0 * (-t * 15.0).exp();
                    phase += TAU * freq / sr;
                    phase.sin() * (-t * 10.0).exp()
                }
                DrumVoice::Crash => 0.7 * noise * (-t * 3.0).exp(),
                DrumVoice::Perc1 => {
                    phase += TAU * 800.0 / sr;
                    phase.sin() * (-t * 30.0).exp()
                }
                DrumVoice::Perc2 => {
                    phase += TAU * 1200.0 / sr;
                    (0.5 * phase.sin() + 0.5 * noise) * (-t * 35.0).exp()
                }
                DrumVoice::Perc3 => {
                    phase += TAU * 400.0 / sr;
                    phase.sin() * (-t * 40.0).exp()
                }
            };
            last_noise = noise;
            samples.push(sample.clamp(-1.0, 1.0));
        }

        SampleBuffer::new(samples, sample_rate)
    }
}

/// Synthesize the kit into `voices` on a background thread.
///
/// Only the first `columns` voices are loaded. `stagger` delays each voice,
/// which makes the partially loaded state observable.
pub fn spawn_loader(
    voices: VoiceBank,
    sample_rate: u32,
    columns: usize,
    stagger: Duration,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stepgrid-kit".to_string())
        .spawn(move || {
            let mut rng = StdRng::seed_from_u64(0x5eed);
            for (column, voice) in KIT.iter().enumerate().take(columns) {
                if !stagger.is_zero() {
                    thread::sleep(stagger);
                }
                voices.insert(column, voice.synthesize(sample_rate, &mut rng));
                log::debug!("[KIT] Loaded {} into column {}", voice.name(), column);
            }
            log::info!("[KIT] {} voices loaded", voices.len());
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_voice_renders() {
        let mut rng = StdRng::seed_from_u64(1);
        for voice in KIT {
            let buffer = voice.synthesize(8000, &mut rng);
            assert!(!buffer.is_empty(), "{} is empty", voice.name());
            assert!(buffer.samples().iter().all(|s| s.abs() <= 1.0));
            assert!(buffer.samples().iter().any(|s| s.abs() > 0.01), "{} is silent", voice.name());
            assert_eq!(buffer.sample_rate(), 8000);
        }
    }

    #[test]
    fn test_voice_length_follows_sample_rate() {
        let mut rng = StdRng::seed_from_u64(1);
        let kick = DrumVoice::Kick.synthesize(10_000, &mut rng);
        assert_eq!(kick.len(), 5000);
    }

    #[test]
    fn test_loader_fills_requested_columns() {
        let voices = VoiceBank::new();
        spawn_loader(voices.clone(), 4000, 3, Duration::ZERO)
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(voices.loaded_columns(), vec![0, 1, 2]);
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<&str> = KIT.iter().map(|v| v.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), KIT.len());
    }
}
