//! Sample-accurate voice mixer.
//!
//! Turns [`TriggerCommand`]s into audio. A command stamped `at` seconds starts
//! on output frame `round(at * sample_rate)`, wherever that frame falls inside
//! a block. The voice pool is allocated up front, so rendering and pushing
//! never allocate inside the audio callback.

use crate::trigger::TriggerCommand;
use crate::voices::SampleBuffer;
use std::sync::Arc;

/// Hard cap on simultaneously sounding voices.
pub const MAX_VOICES: usize = 64;

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// One playing (or pending) sample.
#[derive(Clone, Debug)]
struct PlayingVoice {
    buffer: Arc<SampleBuffer>,
    start_frame: u64,
    // fractional read position in source frames
    pos: f64,
    // source frames per output frame
    step: f64,
}

impl PlayingVoice {
    fn finished(&self) -> bool {
        self.pos >= self.buffer.len() as f64
    }

    /// Mix into `out`, an interleaved block starting at `block_start`.
    fn render_into(&mut self, block_start: u64, out: &mut [f32], channels: usize, gain: f32) {
        let data = self.buffer.samples();
        let frames = out.len() / channels;
        let offset = self.start_frame.saturating_sub(block_start) as usize;
        if offset >= frames {
            return;
        }

        for frame in out.chunks_exact_mut(channels).skip(offset) {
            let i = self.pos as usize;
            if i >= data.len() {
                break;
            }
            let frac = (self.pos - i as f64) as f32;
            let s0 = data[i];
            let s1 = data.get(i + 1).copied().unwrap_or(s0);
            let sample = lerp(s0, s1, frac) * gain;
            for out_sample in frame.iter_mut() {
                *out_sample += sample;
            }
            self.pos += self.step;
        }
    }
}

/// Mixes scheduled voices into interleaved output blocks.
pub struct Mixer {
    sample_rate: u32,
    channels: usize,
    gain: f32,
    voices: Vec<PlayingVoice>,
    late: u64,
    stolen: u64,
}

impl Mixer {
    /// Create a mixer for the given output format.
    pub fn new(sample_rate: u32, channels: usize, gain: f32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            gain,
            voices: Vec::with_capacity(MAX_VOICES),
            late: 0,
            stolen: 0,
        }
    }

    /// Output frame on which a sound stamped `at` seconds starts.
    pub fn frame_for(&self, at: f64) -> u64 {
        (at.max(0.0) * self.sample_rate as f64).round() as u64
    }

    /// Queue a triggered sound.
    ///
    /// `next_frame` is the first frame of the next block to be rendered. A
    /// sound whose start frame has already passed starts at `next_frame`.
    /// When the pool is full the oldest voice is replaced.
    pub fn push(&mut self, command: TriggerCommand, next_frame: u64) {
        if command.buffer.is_empty() {
            return;
        }
        let mut start_frame = self.frame_for(command.at);
        if start_frame < next_frame {
            self.late += 1;
            start_frame = next_frame;
        }
        if self.voices.len() == MAX_VOICES {
            self.voices.remove(0);
            self.stolen += 1;
        }
        let step = command.buffer.sample_rate() as f64 / self.sample_rate as f64;
        self.voices.push(PlayingVoice {
            buffer: command.buffer,
            start_frame,
            pos: 0.0,
            step,
        });
    }

    /// Fill `out` (interleaved, `channels` wide) with the block starting at
    /// frame `block_start`. Returns the number of frames rendered.
    pub fn render(&mut self, block_start: u64, out: &mut [f32]) -> usize {
        out.fill(0.0);
        for voice in &mut self.voices {
            voice.render_into(block_start, out, self.channels, self.gain);
        }
        self.voices.retain(|voice| !voice.finished());
        out.len() / self.channels
    }

    /// Voices currently playing or waiting for their start frame.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Sounds that arrived after their start frame had been rendered.
    pub fn late_voices(&self) -> u64 {
        self.late
    }

    /// Voices cut off to make room for new ones.
    pub fn stolen_voices(&self) -> u64 {
        self.stolen
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(sample_rate: u32) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::new(vec![1.0, 0.5], sample_rate))
    }

    fn command(at: f64, buffer: Arc<SampleBuffer>) -> TriggerCommand {
        TriggerCommand {
            column: 0,
            buffer,
            at,
        }
    }

    #[test]
    fn test_voice_starts_on_exact_frame() {
        let mut mixer = Mixer::new(1000, 1, 1.0);
        // Frame 70 lies inside the second 64-frame block
        mixer.push(command(0.070, impulse(1000)), 0);

        let mut block = vec![0.0f32; 64];
        mixer.render(0, &mut block);
        assert!(block.iter().all(|&s| s == 0.0));

        mixer.render(64, &mut block);
        assert_eq!(block[5], 0.0);
        assert_eq!(block[6], 1.0);
        assert_eq!(block[7], 0.5);
        assert_eq!(block[8], 0.0);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_voice_spans_block_boundary() {
        let mut mixer = Mixer::new(1000, 2, 1.0);
        mixer.push(command(0.003, impulse(1000)), 0);

        let mut block = vec![0.0f32; 8]; // 4 stereo frames
        mixer.render(0, &mut block);
        assert_eq!(&block[6..8], &[1.0, 1.0]);
        assert_eq!(mixer.active_voices(), 1);

        mixer.render(4, &mut block);
        assert_eq!(&block[0..2], &[0.5, 0.5]);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_late_voice_starts_at_next_block() {
        let mut mixer = Mixer::new(1000, 1, 1.0);
        mixer.push(command(0.001, impulse(1000)), 100);
        assert_eq!(mixer.late_voices(), 1);

        let mut block = vec![0.0f32; 4];
        mixer.render(100, &mut block);
        assert_eq!(block[0], 1.0);
    }

    #[test]
    fn test_gain_and_summing() {
        let mut mixer = Mixer::new(1000, 1, 0.5);
        mixer.push(command(0.0, impulse(1000)), 0);
        mixer.push(command(0.0, impulse(1000)), 0);
        let mut block = vec![0.0f32; 2];
        mixer.render(0, &mut block);
        assert_eq!(block, vec![1.0, 0.5]);
    }

    #[test]
    fn test_rate_conversion_interpolates() {
        // Source at half the output rate: each source frame spans two output frames
        let mut mixer = Mixer::new(2000, 1, 1.0);
        mixer.push(command(0.0, Arc::new(SampleBuffer::new(vec![0.0, 1.0], 1000))), 0);
        let mut block = vec![0.0f32; 4];
        mixer.render(0, &mut block);
        assert_eq!(&block[..3], &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_pool_steals_oldest_voice() {
        let mut mixer = Mixer::new(1000, 1, 1.0);
        for _ in 0..MAX_VOICES + 3 {
            mixer.push(command(10.0, impulse(1000)), 0);
        }
        assert_eq!(mixer.active_voices(), MAX_VOICES);
        assert_eq!(mixer.stolen_voices(), 3);
    }

    #[test]
    fn test_empty_buffer_is_ignored() {
        let mut mixer = Mixer::new(1000, 1, 1.0);
        mixer.push(command(0.0, Arc::new(SampleBuffer::new(Vec::new(), 1000))), 0);
        assert_eq!(mixer.active_voices(), 0);
    }
}
