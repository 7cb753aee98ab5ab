//! Timing primitives for the look-ahead scheduler.
//!
//! - [`Tempo`] - Validated beats-per-minute value
//! - [`StepCursor`] - The scheduler's "next step" position on the audio clock
//!
//! One grid step is a sixteenth note: a quarter of a beat.

use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

/// Grid steps per beat (sixteenth-note resolution).
pub const STEPS_PER_BEAT: f64 = 4.0;

/// How far ahead of the audio clock the scheduler commits steps.
pub const DEFAULT_LOOKAHEAD_SECONDS: f64 = 0.1;

/// How often the scheduler polls the audio clock.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How often the reconciler looks for elapsed steps (~60 fps).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Tempo used until the first valid update arrives.
pub const DEFAULT_BPM: f64 = 120.0;

/// Tempo in beats per minute.
///
/// Always positive and finite; construction through [`Tempo::new`] or
/// [`str::parse`] rejects anything else.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Create a tempo, rejecting non-positive and non-finite values.
    pub fn new(bpm: f64) -> Result<Self> {
        if bpm.is_finite() && bpm > 0.0 {
            Ok(Self { bpm })
        } else {
            Err(Error::InvalidTempo(format!("{bpm} is not a positive finite BPM")))
        }
    }

    /// Get the BPM value.
    pub fn bpm(self) -> f64 {
        self.bpm
    }

    /// Length of one beat in seconds.
    pub fn seconds_per_beat(self) -> f64 {
        60.0 / self.bpm
    }

    /// Length of one grid step in seconds (`0.25 * 60 / bpm`).
    pub fn step_seconds(self) -> f64 {
        self.seconds_per_beat() / STEPS_PER_BEAT
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self { bpm: DEFAULT_BPM }
    }
}

impl TryFrom<f64> for Tempo {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Tempo::new(value)
    }
}

impl FromStr for Tempo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bpm: f64 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidTempo(format!("'{}' is not a number", s.trim())))?;
        Tempo::new(bpm)
    }
}

/// Position of the next step to be scheduled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepCursor {
    /// Audio-clock time (seconds) at which `step_index` will sound.
    pub next_step_time: f64,
    /// Row of the grid that will sound next, in `0..pattern_length`.
    pub step_index: usize,
}

impl StepCursor {
    /// A cursor at step 0, sounding at `now`.
    pub fn at(now: f64) -> Self {
        Self {
            next_step_time: now,
            step_index: 0,
        }
    }

    /// Move to the following step.
    ///
    /// The step duration is read from `tempo` at the moment of advancing,
    /// so a tempo change only ever affects steps not yet committed.
    pub fn advance(&mut self, tempo: Tempo, pattern_length: usize) {
        self.next_step_time += tempo.step_seconds();
        self.step_index = (self.step_index + 1) % pattern_length.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_rejects_invalid_values() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(Tempo::new(bad).is_err(), "accepted {bad}");
        }
        assert!(Tempo::new(0.5).is_ok());
    }

    #[test]
    fn test_tempo_from_str() {
        let tempo: Tempo = " 96 ".parse().unwrap();
        assert!((tempo.bpm() - 96.0).abs() < 1e-12);
        assert!("fast".parse::<Tempo>().is_err());
        assert!("".parse::<Tempo>().is_err());
        assert!("-80".parse::<Tempo>().is_err());
    }

    #[test]
    fn test_step_is_a_sixteenth_note() {
        let tempo = Tempo::new(120.0).unwrap();
        assert!((tempo.seconds_per_beat() - 0.5).abs() < 1e-12);
        assert!((tempo.step_seconds() - 0.125).abs() < 1e-12);

        let tempo = Tempo::new(90.0).unwrap();
        assert!((tempo.step_seconds() - 0.25 * 60.0 / 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_cursor_wraps_at_pattern_length() {
        let tempo = Tempo::default();
        let mut cursor = StepCursor::at(2.0);
        for _ in 0..15 {
            cursor.advance(tempo, 16);
        }
        assert_eq!(cursor.step_index, 15);
        cursor.advance(tempo, 16);
        assert_eq!(cursor.step_index, 0);
        assert!((cursor.next_step_time - (2.0 + 16.0 * 0.125)).abs() < 1e-9);
    }
}
