//! Audio output device enumeration.
//!
//! Cross-platform device discovery using cpal, plus lookup of the device the
//! engine should open.

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait};

/// Sample rates probed against each device's supported ranges.
const COMMON_SAMPLE_RATES: [u32; 7] = [22050, 44100, 48000, 88200, 96000, 176400, 192000];

/// Information about an audio output device.
#[derive(Clone, Debug)]
pub struct AudioDeviceInfo {
    /// Device name (as reported by the system)
    pub name: String,
    /// Maximum supported output channels
    pub max_output_channels: u32,
    /// Supported sample rates (sorted)
    pub sample_rates: Vec<u32>,
    /// Whether the device supports 32-bit float output
    pub supports_f32: bool,
    /// Whether this is the default output device
    pub is_default_output: bool,
}

impl AudioDeviceInfo {
    /// Whether the engine can drive this device.
    pub fn is_usable(&self) -> bool {
        self.max_output_channels > 0 && self.supports_f32
    }
}

fn rates_in_range(min: u32, max: u32, rates: &mut Vec<u32>) {
    for rate in COMMON_SAMPLE_RATES {
        if rate >= min && rate <= max && !rates.contains(&rate) {
            rates.push(rate);
        }
    }
}

/// List all audio devices that can play sound.
///
/// Default device first, then by name.
pub fn list_audio_devices() -> Result<Vec<AudioDeviceInfo>> {
    let host = cpal::default_host();
    let default_output_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for device in host.output_devices()? {
        let name = match device.name() {
            Ok(n) => n,
            Err(_) => continue,
        };

        let mut max_output_channels = 0;
        let mut sample_rates = Vec::new();
        let mut supports_f32 = false;
        if let Ok(configs) = device.supported_output_configs() {
            for config in configs {
                max_output_channels = max_output_channels.max(config.channels() as u32);
                supports_f32 |= config.sample_format() == cpal::SampleFormat::F32;
                rates_in_range(config.min_sample_rate(), config.max_sample_rate(), &mut sample_rates);
            }
        }
        if max_output_channels == 0 {
            continue;
        }
        sample_rates.sort();

        let is_default_output = default_output_name
            .as_ref()
            .is_some_and(|default| default == &name);

        devices.push(AudioDeviceInfo {
            name,
            max_output_channels,
            sample_rates,
            supports_f32,
            is_default_output,
        });
    }

    devices.sort_by(|a, b| {
        b.is_default_output
            .cmp(&a.is_default_output)
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(devices)
}

/// Open the named output device, or the host default when `name` is `None`.
pub fn find_output_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("No default output device")),
        Some(wanted) => {
            for device in host.output_devices()? {
                if device.name().is_ok_and(|n| n == wanted) {
                    return Ok(device);
                }
            }
            anyhow::bail!("Output device '{}' not found", wanted)
        }
    }
}

/// Print a formatted list of output devices to stdout.
pub fn print_audio_devices() -> Result<()> {
    let devices = list_audio_devices()?;

    println!("Available Output Devices:");
    println!("=========================\n");

    if devices.is_empty() {
        println!("  No output devices found.");
        return Ok(());
    }

    for device in devices {
        let mut markers = String::new();
        if device.is_default_output {
            markers.push_str(" [default]");
        }
        if !device.supports_f32 {
            markers.push_str(" [no f32 output, unusable]");
        }
        println!("  {}{}", device.name, markers);
        println!("    Output channels: {}", device.max_output_channels);
        if !device.sample_rates.is_empty() {
            let rates_str: Vec<String> = device.sample_rates.iter().map(|r| r.to_string()).collect();
            println!("    Sample rates:    {}", rates_str.join(", "));
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_in_range() {
        let mut rates = Vec::new();
        rates_in_range(44100, 48000, &mut rates);
        rates_in_range(48000, 96000, &mut rates);
        assert_eq!(rates, vec![44100, 48000, 88200, 96000]);
    }

    #[test]
    fn test_usable_device() {
        let mut info = AudioDeviceInfo {
            name: "test".to_string(),
            max_output_channels: 2,
            sample_rates: vec![48000],
            supports_f32: true,
            is_default_output: true,
        };
        assert!(info.is_usable());
        info.supports_f32 = false;
        assert!(!info.is_usable());
    }
}
