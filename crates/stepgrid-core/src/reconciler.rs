//! Per-frame reconciliation of scheduled steps with the audio clock.
//!
//! Once per display frame the reconciler pops every step whose start time has
//! passed and announces the most recent one. Steps that elapse between two
//! frames collapse into a single jump to the latest; a row is never announced
//! twice in a row.

use crate::beat_queue::BeatQueue;
use crate::clock::ClockSource;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;

/// Notification that a row has become audible.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowEvent {
    /// Grid row that is sounding.
    pub row: usize,
    /// Audio-clock time at which it started.
    pub audio_time: f64,
}

/// Drains elapsed steps from the [`BeatQueue`] and notifies subscribers.
pub struct VisualReconciler {
    clock: Arc<dyn ClockSource>,
    queue: BeatQueue,
    last_row: Option<usize>,
    subscribers: Vec<Sender<RowEvent>>,
}

impl VisualReconciler {
    pub fn new(clock: Arc<dyn ClockSource>, queue: BeatQueue) -> Self {
        Self {
            clock,
            queue,
            last_row: None,
            subscribers: Vec::new(),
        }
    }

    /// Receive a [`RowEvent`] every time a new row becomes audible.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<RowEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Run one frame. Returns the row announced in this frame, if any.
    pub fn on_frame(&mut self) -> Option<RowEvent> {
        let now = self.clock.now();
        let latest = self.queue.drain_elapsed(now)?;

        if self.last_row == Some(latest.beat_index) {
            return None;
        }
        self.last_row = Some(latest.beat_index);

        let event = RowEvent {
            row: latest.beat_index,
            audio_time: latest.audio_time,
        };
        log::trace!("[RECONCILER] Row {} audible at {:.4}s (now {:.4}s)", event.row, event.audio_time, now);
        self.subscribers.retain(|tx| tx.send(event).is_ok());
        Some(event)
    }

    /// The row most recently announced.
    pub fn last_row(&self) -> Option<usize> {
        self.last_row
    }

    /// Number of live subscribers (as of the last announcement).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beat_queue::ScheduledBeat;
    use crate::clock::ManualClock;

    fn beat(beat_index: usize, audio_time: f64) -> ScheduledBeat {
        ScheduledBeat {
            beat_index,
            audio_time,
        }
    }

    fn setup(now: f64) -> (Arc<ManualClock>, BeatQueue, VisualReconciler) {
        let clock = Arc::new(ManualClock::new(now));
        let queue = BeatQueue::new();
        let reconciler = VisualReconciler::new(clock.clone(), queue.clone());
        (clock, queue, reconciler)
    }

    #[test]
    fn test_elapsed_steps_collapse_to_latest() {
        let (_clock, queue, mut reconciler) = setup(1.06);
        let rx = reconciler.subscribe();
        queue.push(beat(0, 1.0));
        queue.push(beat(1, 1.02));
        queue.push(beat(2, 1.05));

        let event = reconciler.on_frame().unwrap();
        assert_eq!(event.row, 2);
        let received: Vec<RowEvent> = rx.try_iter().collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].row, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_future_steps_wait() {
        let (clock, queue, mut reconciler) = setup(0.0);
        queue.push(beat(0, 0.5));
        assert_eq!(reconciler.on_frame(), None);
        assert_eq!(queue.len(), 1);

        clock.set(0.5);
        assert_eq!(reconciler.on_frame().map(|e| e.row), Some(0));
    }

    #[test]
    fn test_same_row_is_not_announced_twice() {
        let (clock, queue, mut reconciler) = setup(0.0);
        let rx = reconciler.subscribe();

        // Single-row pattern: every step is row 0
        queue.push(beat(0, 0.1));
        queue.push(beat(0, 0.2));
        clock.set(0.1);
        assert!(reconciler.on_frame().is_some());
        clock.set(0.2);
        assert!(reconciler.on_frame().is_none());
        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(reconciler.last_row(), Some(0));
    }

    #[test]
    fn test_idle_frames_are_harmless() {
        let (clock, _queue, mut reconciler) = setup(0.0);
        for _ in 0..10 {
            clock.advance(0.016);
            assert!(reconciler.on_frame().is_none());
        }
        assert_eq!(reconciler.last_row(), None);
    }

    #[test]
    fn test_dropped_subscriber_is_removed() {
        let (clock, queue, mut reconciler) = setup(0.0);
        let kept = reconciler.subscribe();
        drop(reconciler.subscribe());
        assert_eq!(reconciler.subscriber_count(), 2);

        queue.push(beat(3, 0.0));
        clock.set(0.01);
        reconciler.on_frame();
        assert_eq!(reconciler.subscriber_count(), 1);
        assert_eq!(kept.try_recv().map(|e| e.row), Ok(3));
    }
}
