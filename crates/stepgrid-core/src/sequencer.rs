//! The sequencer facade.
//!
//! [`Sequencer`] owns the shared grid, voice bank and beat queue, and wires
//! the [`Scheduler`] and the [`VisualReconciler`] to two independent
//! [`RepeatingTimer`]s:
//! - the frame loop runs from construction until the sequencer is dropped,
//!   idling harmlessly while nothing is queued
//! - the poll loop runs only while playing
//!
//! The two loops never call each other. They meet only at the beat queue and
//! the audio clock.

use crate::beat_queue::BeatQueue;
use crate::clock::ClockSource;
use crate::config::SequencerSettings;
use crate::error::Result;
use crate::grid::GridShape;
use crate::reconciler::{RowEvent, VisualReconciler};
use crate::scheduler::{Scheduler, SchedulerLinks};
use crate::state::GridState;
use crate::timer::RepeatingTimer;
use crate::timing::{StepCursor, Tempo};
use crate::trigger::{SoundTrigger, TriggerCommand};
use crate::voices::VoiceBank;
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A step sequencer driven by an audio clock.
pub struct Sequencer {
    clock: Arc<dyn ClockSource>,
    output: Arc<dyn SoundTrigger>,
    cells: GridState,
    voices: VoiceBank,
    queue: BeatQueue,
    scheduler: Arc<Mutex<Scheduler>>,
    reconciler: Arc<Mutex<VisualReconciler>>,
    poll_interval: Duration,
    // Held for the whole of start/stop so transport changes never interleave
    poll_timer: Mutex<Option<RepeatingTimer>>,
    _frame_timer: RepeatingTimer,
}

impl Sequencer {
    /// Build a stopped sequencer and start its frame loop.
    pub fn new(
        settings: &SequencerSettings,
        clock: Arc<dyn ClockSource>,
        output: Arc<dyn SoundTrigger>,
    ) -> Result<Self> {
        let shape = settings.grid_shape()?;
        let tempo = settings.initial_tempo()?;

        let cells = GridState::new(shape);
        let voices = VoiceBank::new();
        let queue = BeatQueue::new();

        let links = SchedulerLinks {
            clock: clock.clone(),
            cells: cells.clone(),
            voices: voices.clone(),
            output: output.clone(),
            queue: queue.clone(),
        };
        let scheduler = Scheduler::new(links, tempo).with_lookahead(settings.lookahead_seconds());
        let scheduler = Arc::new(Mutex::new(scheduler));

        let reconciler = Arc::new(Mutex::new(VisualReconciler::new(clock.clone(), queue.clone())));
        let frame_reconciler = reconciler.clone();
        let frame_timer = RepeatingTimer::start("stepgrid-frame", settings.frame_interval(), move || {
            lock(&frame_reconciler).on_frame();
        })?;

        log::info!(
            "[SEQUENCER] {} rows x {} columns, {} BPM, {:.0}ms lookahead",
            shape.rows(),
            shape.columns(),
            tempo.bpm(),
            settings.lookahead_seconds() * 1000.0
        );

        Ok(Self {
            clock,
            output,
            cells,
            voices,
            queue,
            scheduler,
            reconciler,
            poll_interval: settings.poll_interval(),
            poll_timer: Mutex::new(None),
            _frame_timer: frame_timer,
        })
    }

    /// Start playback from row 0 at the current tempo.
    ///
    /// Steps falling inside the lookahead window are committed before this
    /// returns. Returns `Ok(false)` if already playing.
    pub fn start(&self) -> Result<bool> {
        let mut poll_timer = lock(&self.poll_timer);
        {
            let mut scheduler = lock(&self.scheduler);
            let bpm = scheduler.tempo().bpm();
            if !scheduler.start(bpm) {
                return Ok(false);
            }
            scheduler.poll_once();
        }

        let scheduler = self.scheduler.clone();
        let timer = RepeatingTimer::start("stepgrid-poll", self.poll_interval, move || {
            lock(&scheduler).poll_once();
        });
        match timer {
            Ok(timer) => {
                *poll_timer = Some(timer);
                Ok(true)
            }
            Err(e) => {
                lock(&self.scheduler).stop();
                Err(e.into())
            }
        }
    }

    /// Stop scheduling new steps. Returns `false` if already stopped.
    ///
    /// Sounds already committed inside the lookahead window still play.
    pub fn stop(&self) -> bool {
        let mut poll_timer = lock(&self.poll_timer);
        let was_running = lock(&self.scheduler).stop();
        if let Some(timer) = poll_timer.take() {
            timer.stop();
        }
        was_running
    }

    /// Start if stopped, stop if playing. Returns whether it is now playing.
    pub fn toggle_play(&self) -> Result<bool> {
        if self.is_playing() {
            self.stop();
            Ok(false)
        } else {
            self.start()?;
            Ok(true)
        }
    }

    /// Change the tempo of steps not yet committed.
    ///
    /// Invalid values are ignored. Returns `true` if applied.
    pub fn set_tempo(&self, bpm: f64) -> bool {
        lock(&self.scheduler).set_tempo(bpm)
    }

    /// Set the tempo from user text such as `"96"` or `" 132.5 "`.
    ///
    /// Text that is not a positive number is ignored.
    pub fn set_tempo_text(&self, text: &str) -> bool {
        match text.parse::<Tempo>() {
            Ok(tempo) => self.set_tempo(tempo.bpm()),
            Err(e) => {
                log::warn!("[SEQUENCER] {}; tempo unchanged", e);
                false
            }
        }
    }

    /// Flip a cell. Returns whether it is now active.
    pub fn toggle_cell(&self, row: usize, column: usize) -> Result<bool> {
        self.cells.toggle(row, column)
    }

    /// Deactivate every cell and stop playback.
    pub fn clear(&self) {
        self.cells.clear();
        self.stop();
        log::debug!("[SEQUENCER] Grid cleared");
    }

    /// Play a column's sample right now, regardless of the grid.
    ///
    /// Returns `false` if the column is out of range or has nothing loaded.
    pub fn preview(&self, column: usize) -> bool {
        if column >= self.shape().columns() {
            log::debug!("[SEQUENCER] Preview of column {} out of range", column);
            return false;
        }
        match self.voices.get(column) {
            Some(buffer) => {
                self.output.trigger(TriggerCommand {
                    column,
                    buffer,
                    at: self.clock.now(),
                });
                true
            }
            None => {
                log::trace!("[SEQUENCER] Column {} has no sample loaded, preview skipped", column);
                false
            }
        }
    }

    /// Receive a [`RowEvent`] whenever a new row becomes audible.
    pub fn subscribe(&self) -> Receiver<RowEvent> {
        lock(&self.reconciler).subscribe()
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.scheduler).is_running()
    }

    pub fn tempo(&self) -> Tempo {
        lock(&self.scheduler).tempo()
    }

    /// Next step to be committed.
    pub fn cursor(&self) -> StepCursor {
        lock(&self.scheduler).cursor()
    }

    /// Row most recently announced to subscribers.
    pub fn last_row(&self) -> Option<usize> {
        lock(&self.reconciler).last_row()
    }

    pub fn shape(&self) -> GridShape {
        self.cells.shape()
    }

    /// Shared grid; writes are picked up by the next committed step.
    pub fn cells(&self) -> &GridState {
        &self.cells
    }

    /// Shared voice bank; may be filled from any thread at any time.
    pub fn voices(&self) -> &VoiceBank {
        &self.voices
    }

    pub fn queue(&self) -> &BeatQueue {
        &self.queue
    }

    pub fn clock(&self) -> Arc<dyn ClockSource> {
        self.clock.clone()
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop();
    }
}
