//! Look-ahead step scheduler.
//!
//! The scheduler is polled on a coarse interval. Each poll commits every step
//! that starts within the lookahead window on the audio clock: it triggers the
//! step's active voices at the step's exact start time and records the step in
//! the [`BeatQueue`] for the reconciler. Because sounds are stamped with their
//! audio-clock start time rather than fired "now", jitter in the polling
//! interval never reaches the audible output.

use crate::beat_queue::{BeatQueue, ScheduledBeat};
use crate::clock::ClockSource;
use crate::grid::GridShape;
use crate::state::GridState;
use crate::timing::{StepCursor, Tempo, DEFAULT_LOOKAHEAD_SECONDS};
use crate::trigger::{SoundTrigger, TriggerCommand};
use crate::voices::VoiceBank;
use std::sync::Arc;

/// Upper bound on steps committed by a single poll.
///
/// Only reached if the audio clock jumped far ahead between polls; the
/// remaining steps are picked up by the next poll.
const MAX_STEPS_PER_POLL: usize = 1024;

/// Whether the scheduler is committing steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Running,
}

/// Everything the scheduler reads from or writes to.
#[derive(Clone)]
pub struct SchedulerLinks {
    /// Source of "now".
    pub clock: Arc<dyn ClockSource>,
    /// Active cells, written by the UI.
    pub cells: GridState,
    /// Loaded sample buffers, written by the loader.
    pub voices: VoiceBank,
    /// Where committed sounds go.
    pub output: Arc<dyn SoundTrigger>,
    /// Where committed steps are recorded.
    pub queue: BeatQueue,
}

/// Converts tempo and active cells into timestamped triggers.
pub struct Scheduler {
    links: SchedulerLinks,
    shape: GridShape,
    tempo: Tempo,
    lookahead_seconds: f64,
    state: TransportState,
    cursor: StepCursor,
}

impl Scheduler {
    /// Create a stopped scheduler with the default lookahead.
    pub fn new(links: SchedulerLinks, tempo: Tempo) -> Self {
        let shape = links.cells.shape();
        Self {
            links,
            shape,
            tempo,
            lookahead_seconds: DEFAULT_LOOKAHEAD_SECONDS,
            state: TransportState::Stopped,
            cursor: StepCursor::at(0.0),
        }
    }

    /// Set the lookahead window in seconds. Non-positive values are ignored.
    pub fn with_lookahead(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            self.lookahead_seconds = seconds;
        } else {
            log::warn!("[SCHEDULER] Ignoring lookahead of {}s", seconds);
        }
        self
    }

    /// Start committing steps at `bpm`.
    ///
    /// Does nothing if already running (the cursor is not reset). Otherwise
    /// the cursor is placed at step 0 sounding at the current clock time. An
    /// invalid `bpm` is ignored and the previous tempo kept.
    ///
    /// Returns `true` if the scheduler transitioned to running.
    pub fn start(&mut self, bpm: f64) -> bool {
        if self.state == TransportState::Running {
            log::debug!("[SCHEDULER] start() while running, ignoring");
            return false;
        }
        self.set_tempo(bpm);

        let now = self.links.clock.now();
        let stale = self.links.queue.discard_after(now);
        if stale > 0 {
            log::debug!("[SCHEDULER] Discarded {} queued steps from the previous run", stale);
        }

        self.cursor = StepCursor::at(now);
        self.state = TransportState::Running;
        log::info!(
            "[SCHEDULER] Started at {:.3}s, {} BPM, {} steps",
            now,
            self.tempo.bpm(),
            self.shape.rows()
        );
        true
    }

    /// Stop committing steps.
    ///
    /// The cursor and the queue are left as they are. Sounds already handed
    /// to the output still play. Returns `true` if the scheduler was running.
    pub fn stop(&mut self) -> bool {
        if self.state == TransportState::Stopped {
            log::debug!("[SCHEDULER] stop() while stopped, ignoring");
            return false;
        }
        self.state = TransportState::Stopped;
        log::info!(
            "[SCHEDULER] Stopped at step {} ({:.3}s)",
            self.cursor.step_index,
            self.cursor.next_step_time
        );
        true
    }

    /// Change the tempo for steps not yet committed.
    ///
    /// Non-positive or non-finite values are ignored. Returns `true` if the
    /// tempo was applied.
    pub fn set_tempo(&mut self, bpm: f64) -> bool {
        match Tempo::new(bpm) {
            Ok(tempo) => {
                if tempo != self.tempo {
                    log::debug!("[SCHEDULER] Tempo {} -> {} BPM", self.tempo.bpm(), tempo.bpm());
                }
                self.tempo = tempo;
                true
            }
            Err(e) => {
                log::warn!("[SCHEDULER] {}; keeping {} BPM", e, self.tempo.bpm());
                false
            }
        }
    }

    /// Commit every step that starts before `now + lookahead`.
    ///
    /// Does nothing while stopped. Returns the number of steps committed.
    pub fn poll_once(&mut self) -> usize {
        if self.state != TransportState::Running {
            return 0;
        }

        let horizon = self.links.clock.now() + self.lookahead_seconds;
        let mut committed = 0;

        while self.cursor.next_step_time < horizon {
            if committed == MAX_STEPS_PER_POLL {
                log::warn!(
                    "[SCHEDULER] Clock ran {:.3}s ahead of the cursor, catching up next poll",
                    horizon - self.cursor.next_step_time
                );
                break;
            }
            self.schedule_step(self.cursor.step_index, self.cursor.next_step_time);
            self.cursor.advance(self.tempo, self.shape.rows());
            committed += 1;
        }

        committed
    }

    /// Trigger the active voices of `step` at `time` and record the step.
    fn schedule_step(&self, step: usize, time: f64) {
        let columns = self.links.cells.active_columns(step);
        for column in columns {
            match self.links.voices.get(column) {
                Some(buffer) => {
                    log::trace!("[SCHEDULER] Step {} column {} at {:.4}s", step, column, time);
                    self.links.output.trigger(TriggerCommand {
                        column,
                        buffer,
                        at: time,
                    });
                }
                None => {
                    log::trace!("[SCHEDULER] Column {} has no sample loaded, skipping", column);
                }
            }
        }

        // Recorded even when nothing sounds, so the reconciler still advances
        self.links.queue.push(ScheduledBeat {
            beat_index: step,
            audio_time: time,
        });
    }

    /// Current transport state.
    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TransportState::Running
    }

    /// Tempo used for the next committed step.
    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Next step to commit and its start time.
    pub fn cursor(&self) -> StepCursor {
        self.cursor
    }

    /// Pattern length in steps.
    pub fn pattern_length(&self) -> usize {
        self.shape.rows()
    }

    pub fn lookahead_seconds(&self) -> f64 {
        self.lookahead_seconds
    }
}
