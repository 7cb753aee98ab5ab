//! Fire-and-forget sound triggers.
//!
//! The scheduler hands every sound it commits to a [`SoundTrigger`]. A trigger
//! never reports back: there is no completion signal and no failure path the
//! scheduler could observe.

use crate::voices::SampleBuffer;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Capacity of the channel between scheduler and audio thread.
pub const TRIGGER_QUEUE_CAPACITY: usize = 1024;

/// Play `buffer` starting exactly at audio-clock time `at`.
#[derive(Clone, Debug)]
pub struct TriggerCommand {
    /// Voice column the buffer belongs to.
    pub column: usize,
    /// The sample to play.
    pub buffer: Arc<SampleBuffer>,
    /// Audio-clock start time in seconds.
    pub at: f64,
}

/// Destination for scheduled sounds.
pub trait SoundTrigger: Send + Sync {
    /// Schedule playback. Must not block.
    fn trigger(&self, command: TriggerCommand);
}

/// Forwards trigger commands to the audio thread over a bounded channel.
#[derive(Clone)]
pub struct ChannelTrigger {
    tx: Sender<TriggerCommand>,
    dropped: Arc<AtomicU64>,
}

impl ChannelTrigger {
    /// Create a trigger and the receiver the audio thread drains.
    pub fn new() -> (Self, Receiver<TriggerCommand>) {
        let (tx, rx) = crossbeam_channel::bounded(TRIGGER_QUEUE_CAPACITY);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Commands discarded because the audio thread was not keeping up or had gone away.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SoundTrigger for ChannelTrigger {
    fn trigger(&self, command: TriggerCommand) {
        match self.tx.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "[TRIGGER] Audio queue full, dropping column {} at {:.3}s",
                    cmd.column,
                    cmd.at
                );
            }
            Err(TrySendError::Disconnected(cmd)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!(
                    "[TRIGGER] Audio thread gone, dropping column {} at {:.3}s",
                    cmd.column,
                    cmd.at
                );
            }
        }
    }
}

/// Keeps every trigger in memory instead of playing it.
#[derive(Clone, Debug, Default)]
pub struct TriggerLog {
    commands: Arc<Mutex<Vec<TriggerCommand>>>,
}

impl TriggerLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All triggers received so far, in arrival order.
    pub fn commands(&self) -> Vec<TriggerCommand> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// (column, start time) pairs, in arrival order.
    pub fn hits(&self) -> Vec<(usize, f64)> {
        self.commands()
            .into_iter()
            .map(|cmd| (cmd.column, cmd.at))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SoundTrigger for TriggerLog {
    fn trigger(&self, command: TriggerCommand) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }
}
