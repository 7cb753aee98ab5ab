//! Audio clock sources.
//!
//! The audio clock is the single source of truth for "now" and for when a
//! triggered sound will actually start. It is deliberately independent of
//! wall-clock time: [`FrameClock`] only moves when the audio device consumes
//! frames, and [`ManualClock`] only moves when its owner says so.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonic, high-resolution clock in seconds.
pub trait ClockSource: Send + Sync {
    /// Seconds elapsed on this clock. Never decreases.
    fn now(&self) -> f64;
}

/// Clock driven by the number of frames rendered to the audio device.
///
/// The audio callback calls [`FrameClock::advance`] after every block, so the
/// clock stands still whenever output is not running.
#[derive(Debug)]
pub struct FrameClock {
    frames: AtomicU64,
    sample_rate: u32,
}

impl FrameClock {
    /// Create a clock at frame 0 for the given output rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: AtomicU64::new(0),
            sample_rate: sample_rate.max(1),
        }
    }

    /// Record that `frames` more frames have been handed to the device.
    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::Release);
    }

    /// Total frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl ClockSource for FrameClock {
    fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Clock that advances only when told to.
///
/// Used to drive the engine offline and in tests. Attempts to move it
/// backwards are ignored.
#[derive(Debug, Default)]
pub struct ManualClock {
    // f64 bit pattern
    seconds: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `start` seconds.
    pub fn new(start: f64) -> Self {
        Self {
            seconds: AtomicU64::new(start.max(0.0).to_bits()),
        }
    }

    /// Jump to `seconds`, unless that would move the clock backwards.
    pub fn set(&self, seconds: f64) {
        let _ = self
            .seconds
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (seconds > f64::from_bits(bits)).then(|| seconds.to_bits())
            });
    }

    /// Move forward by `delta` seconds. Negative deltas are ignored.
    pub fn advance(&self, delta: f64) {
        if delta > 0.0 {
            self.set(self.now() + delta);
        }
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::Acquire))
    }
}
