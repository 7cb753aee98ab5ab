//! Queue of scheduled steps awaiting visual reconciliation.
//!
//! The scheduler appends one record per committed step, the reconciler pops
//! records from the front once the audio clock has passed them. Timestamps
//! in the queue never decrease from front to back.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// A step the scheduler has committed to the audio clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledBeat {
    /// Grid row that sounds.
    pub beat_index: usize,
    /// Audio-clock time (seconds) at which the row sounds.
    pub audio_time: f64,
}

/// FIFO of [`ScheduledBeat`]s shared by the scheduler and the reconciler.
///
/// Clones share the same queue.
#[derive(Clone, Debug, Default)]
pub struct BeatQueue {
    inner: Arc<Mutex<VecDeque<ScheduledBeat>>>,
}

impl BeatQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record at the tail.
    ///
    /// A record stamped earlier than the current tail is clamped to the
    /// tail's time so the queue stays ordered.
    pub fn push(&self, mut beat: ScheduledBeat) {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = queue.back() {
            if beat.audio_time < last.audio_time {
                log::warn!(
                    "[BEAT QUEUE] Step {} at {:.6}s precedes tail at {:.6}s, clamping",
                    beat.beat_index,
                    beat.audio_time,
                    last.audio_time
                );
                beat.audio_time = last.audio_time;
            }
        }
        queue.push_back(beat);
    }

    /// Pop every record whose time is `<= now` and return the last one popped.
    pub fn drain_elapsed(&self, now: f64) -> Option<ScheduledBeat> {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut latest = None;
        while queue.front().is_some_and(|beat| beat.audio_time <= now) {
            latest = queue.pop_front();
        }
        latest
    }

    /// Drop records stamped after `time`. Returns how many were removed.
    pub fn discard_after(&self, time: f64) -> usize {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = queue.len();
        queue.retain(|beat| beat.audio_time <= time);
        before - queue.len()
    }

    /// Copy of the queue contents, front first.
    pub fn snapshot(&self) -> Vec<ScheduledBeat> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Remove every record.
    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beat(beat_index: usize, audio_time: f64) -> ScheduledBeat {
        ScheduledBeat {
            beat_index,
            audio_time,
        }
    }

    #[test]
    fn test_drain_returns_latest_elapsed() {
        let queue = BeatQueue::new();
        queue.push(beat(0, 1.0));
        queue.push(beat(1, 1.02));
        queue.push(beat(2, 1.05));
        queue.push(beat(3, 1.2));

        assert_eq!(queue.drain_elapsed(0.5), None);
        assert_eq!(queue.drain_elapsed(1.06), Some(beat(2, 1.05)));
        assert_eq!(queue.snapshot(), vec![beat(3, 1.2)]);
    }

    #[test]
    fn test_drain_is_inclusive() {
        let queue = BeatQueue::new();
        queue.push(beat(7, 2.0));
        assert_eq!(queue.drain_elapsed(2.0), Some(beat(7, 2.0)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_keeps_timestamps_ordered() {
        let queue = BeatQueue::new();
        queue.push(beat(0, 1.0));
        queue.push(beat(1, 0.9));
        let times: Vec<f64> = queue.snapshot().iter().map(|b| b.audio_time).collect();
        assert_eq!(times, vec![1.0, 1.0]);
    }

    #[test]
    fn test_discard_after() {
        let queue = BeatQueue::new();
        queue.push(beat(0, 1.0));
        queue.push(beat(1, 1.1));
        queue.push(beat(2, 1.2));
        assert_eq!(queue.discard_after(1.05), 2);
        assert_eq!(queue.snapshot(), vec![beat(0, 1.0)]);
    }
}
