//! Input device enumeration for the selection layer.

use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait};

/// One selectable input device. The index is positional in the default
/// host's enumeration order and is what `CaptureConfig::device_index`
/// refers back to.
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
    pub max_input_channels: u16,
    pub default_sample_rate: u32,
}

/// List every usable input device on the default host.
///
/// Devices that refuse to report a default input config, or report zero
/// input channels, are skipped; their positional index is preserved so the
/// indices printed here stay valid for opening.
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, DeviceError> {
    let host = cpal::default_host();
    let devices = host.input_devices()?;
    let mut infos = Vec::new();
    for (index, device) in devices.enumerate() {
        let name = device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string());
        let Ok(config) = device.default_input_config() else {
            continue;
        };
        if config.channels() == 0 {
            continue;
        }
        infos.push(InputDeviceInfo {
            index,
            name,
            max_input_channels: config.channels(),
            default_sample_rate: config.sample_rate().0,
        });
    }
    Ok(infos)
}

/// Fetch the device at a positional index from `list_input_devices`.
pub(super) fn input_device_at(index: usize) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();
    let mut devices = host.input_devices()?;
    devices.nth(index).ok_or(DeviceError::NotFound(index))
}

/// The host's default input device, used when no index was selected.
pub(super) fn default_input_device() -> Result<cpal::Device, DeviceError> {
    cpal::default_host()
        .default_input_device()
        .ok_or(DeviceError::NoInputDevices)
}
