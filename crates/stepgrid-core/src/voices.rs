//! Sample buffers and the column-indexed voice bank.
//!
//! Buffers arrive from an external loader at any time, in any order. The
//! bank may be partially populated while playing: a column without a buffer
//! is simply silent.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A decoded, mono sample ready for playback.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Wrap decoded mono samples recorded at `sample_rate`.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate: sample_rate.max(1),
        }
    }

    /// A buffer of silence lasting `frames` frames.
    pub fn silent(frames: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; frames], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Column-indexed sample buffers shared between the loader and the scheduler.
///
/// Clones share the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct VoiceBank {
    buffers: Arc<RwLock<HashMap<usize, Arc<SampleBuffer>>>>,
}

impl VoiceBank {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the buffer for a column.
    pub fn insert(&self, column: usize, buffer: SampleBuffer) {
        log::debug!(
            "[VOICES] Column {} loaded ({} frames @ {} Hz)",
            column,
            buffer.len(),
            buffer.sample_rate()
        );
        self.buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(column, Arc::new(buffer));
    }

    /// Remove the buffer for a column, returning it if present.
    pub fn remove(&self, column: usize) -> Option<Arc<SampleBuffer>> {
        self.buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&column)
    }

    /// The buffer for a column, if one has been loaded.
    pub fn get(&self, column: usize) -> Option<Arc<SampleBuffer>> {
        self.buffers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&column)
            .cloned()
    }

    /// Columns that currently have a buffer, sorted.
    pub fn loaded_columns(&self) -> Vec<usize> {
        let mut columns: Vec<usize> = self
            .buffers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        columns.sort_unstable();
        columns
    }

    /// Number of loaded columns.
    pub fn len(&self) -> usize {
        self.buffers
            .read()
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

    #[test]
    fn test_missing_column_is_none() {
        let bank = VoiceBank::new();
        assert!(bank.get(3).is_none());
        assert!(bank.is_empty());
    }

    #[test]
    fn test_bank_is_shared_between_clones() {
        let loader = VoiceBank::new();
        let scheduler_view = loader.clone();

        let handle = std::thread::spawn(move || {
            loader.insert(5, SampleBuffer::new(vec![0.5; 10], 44_100));
            loader.insert(1, SampleBuffer::silent(4, 44_100));
        });
        handle.join().unwrap();

        assert_eq!(scheduler_view.loaded_columns(), vec![1, 5]);
        assert_eq!(scheduler_view.get(5).unwrap().len(), 10);
        assert!(scheduler_view.remove(1).is_some());
        assert_eq!(scheduler_view.len(), 1);
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = SampleBuffer::silent(22_050, 44_100);
        assert!((buffer.duration_seconds() - 0.5).abs() < 1e-12);
    }
}
