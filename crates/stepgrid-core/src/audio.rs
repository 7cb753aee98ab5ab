//! Audio output engine.
//!
//! Opens a cpal output stream whose callback drains the trigger channel into a
//! [`Mixer`], renders the block and then advances the [`FrameClock`]. The
//! clock therefore reads exactly the number of frames handed to the device,
//! and a sound stamped `t` seconds starts on frame `round(t * sample_rate)`.

use crate::audio_device::find_output_device;
use crate::clock::FrameClock;
use crate::config::AudioSettings;
use crate::error::{Error, Result};
use crate::mixer::Mixer;
use crate::trigger::{ChannelTrigger, TriggerCommand};
use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::Receiver;
use std::sync::Arc;

/// A running output stream plus the clock and trigger that feed it.
///
/// Audio stops when the engine is dropped.
pub struct AudioEngine {
    _stream: cpal::Stream,
    clock: Arc<FrameClock>,
    trigger: ChannelTrigger,
    device_name: String,
    channels: usize,
}

impl AudioEngine {
    /// Open the configured output device and start the stream.
    ///
    /// Fails with [`Error::UnsupportedEnvironment`] if there is no usable
    /// device, the device cannot produce 32-bit float output, or the stream
    /// cannot be started.
    pub fn start(settings: &AudioSettings) -> Result<Self> {
        let device = find_output_device(settings.output_device.as_deref())
            .map_err(|e| Error::UnsupportedEnvironment(e.to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| Error::UnsupportedEnvironment(format!("{}: {}", device_name, e)))?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(Error::UnsupportedEnvironment(format!(
                "{}: unsupported sample format {:?} (only f32 is supported)",
                device_name,
                supported.sample_format()
            )));
        }

        let mut stream_config: cpal::StreamConfig = supported.into();
        if let Some(rate) = settings.sample_rate {
            stream_config.sample_rate = rate;
        }
        let sample_rate = stream_config.sample_rate;
        let channels = stream_config.channels as usize;

        let clock = Arc::new(FrameClock::new(sample_rate));
        let (trigger, rx) = ChannelTrigger::new();
        let mixer = Mixer::new(sample_rate, channels, settings.gain);

        let stream = build_output_stream(&device, &stream_config, mixer, rx, clock.clone())
            .map_err(|e| Error::UnsupportedEnvironment(format!("{}: {}", device_name, e)))?;
        stream
            .play()
            .map_err(|e| Error::UnsupportedEnvironment(format!("{}: {}", device_name, e)))?;

        log::info!(
            "[AUDIO] Output on '{}' at {} Hz, {} channels",
            device_name,
            sample_rate,
            channels
        );

        Ok(Self {
            _stream: stream,
            clock,
            trigger,
            device_name,
            channels,
        })
    }

    /// Audio clock advanced by the output callback.
    pub fn clock(&self) -> Arc<FrameClock> {
        self.clock.clone()
    }

    /// Trigger that schedules sounds on this output.
    pub fn trigger(&self) -> ChannelTrigger {
        self.trigger.clone()
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
    rx: Receiver<TriggerCommand>,
    clock: Arc<FrameClock>,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError> {
    let err_fn = |err| log::error!("[AUDIO] Output stream error: {}", err);

    device.build_output_stream(
        config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            let block_start = clock.frames();
            while let Ok(command) = rx.try_recv() {
                mixer.push(command, block_start);
            }
            let frames = mixer.render(block_start, data);
            clock.advance(frames as u64);
        },
        err_fn,
        None,
    )
}
