//! stepgrid core - look-ahead scheduling for a grid step sequencer.
//!
//! This crate turns a tempo and a sparse set of active grid cells into
//! sample-accurate sound triggers, and tells a display layer which row is
//! audible at any moment:
//!
//! - **Clock** - The audio clock every timestamp is measured against
//! - **Grid** - Grid shape, cell encoding and the shared set of active cells
//! - **Voices** - Sample buffers keyed by voice column
//! - **Scheduler** - Commits steps inside the lookahead window
//! - **Reconciler** - Announces the row that is currently audible
//! - **Sequencer** - Facade running the poll and frame loops
//! - **Mixer / Audio** - Sample-accurate playback through cpal
//!
//! # Architecture
//!
//! The [`Scheduler`] and the [`VisualReconciler`] never call each other. The
//! scheduler appends one [`ScheduledBeat`] per step to the [`BeatQueue`] and
//! hands every sound to a [`SoundTrigger`] stamped with its start time on the
//! [`ClockSource`]; the reconciler drains the queue as the clock passes those
//! times.
//!
//! # Feature Flags
//!
//! - `native` (default) - cpal audio output and device enumeration

pub mod beat_queue;
pub mod clock;
pub mod config;
pub mod error;
pub mod grid;
pub mod mixer;
pub mod reconciler;
pub mod scheduler;
pub mod sequencer;
pub mod state;
pub mod timer;
pub mod timing;
pub mod trigger;
pub mod voices;

// Native-only modules (require system audio libraries)
#[cfg(feature = "native")]
pub mod audio;
#[cfg(feature = "native")]
pub mod audio_device;

pub use beat_queue::{BeatQueue, ScheduledBeat};
pub use clock::{ClockSource, FrameClock, ManualClock};
pub use config::{AudioSettings, Config, SequencerSettings};
pub use error::{Error, Result};
pub use grid::{ActiveCellSet, CellId, GridShape};
pub use mixer::Mixer;
pub use reconciler::{RowEvent, VisualReconciler};
pub use scheduler::{Scheduler, SchedulerLinks, TransportState};
pub use sequencer::Sequencer;
pub use state::GridState;
pub use timer::RepeatingTimer;
pub use timing::{StepCursor, Tempo};
pub use trigger::{ChannelTrigger, SoundTrigger, TriggerCommand, TriggerLog};
pub use voices::{SampleBuffer, VoiceBank};

#[cfg(feature = "native")]
pub use audio::AudioEngine;
#[cfg(feature = "native")]
pub use audio_device::{find_output_device, list_audio_devices, print_audio_devices, AudioDeviceInfo};
