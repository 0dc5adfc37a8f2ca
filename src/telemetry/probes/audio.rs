use std::sync::Arc;

use super::super::error::ProbeFailure;
use super::super::types::{AudioLevel, MetricKind, RawReading, Sample};
use super::Probe;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioDirection {
    Output,
    Input,
}

impl AudioDirection {
    pub fn kind(&self) -> MetricKind {
        match self {
            AudioDirection::Output => MetricKind::Volume,
            AudioDirection::Input => MetricKind::Mic,
        }
    }
}

/// Volume and mute of the default output and input devices.
///
/// Writes are best effort: they report success only when a settable
/// property was found and written.
pub trait AudioBackend: Send + Sync {
    fn read(&self, direction: AudioDirection) -> Result<AudioLevel, ProbeFailure>;
    fn set_volume(&self, direction: AudioDirection, level: f32) -> bool;
    fn set_muted(&self, direction: AudioDirection, muted: bool) -> bool;
}

pub struct AudioProbe {
    direction: AudioDirection,
    backend: Arc<dyn AudioBackend>,
}

impl AudioProbe {
    pub fn new(direction: AudioDirection, backend: Arc<dyn AudioBackend>) -> Self {
        AudioProbe { direction, backend }
    }
}

impl Probe for AudioProbe {
    fn kind(&self) -> MetricKind {
        self.direction.kind()
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        let level = self.backend.read(self.direction)?;
        let reading = match self.direction {
            AudioDirection::Output => RawReading::Volume(level),
            AudioDirection::Input => RawReading::Mic(level),
        };
        Ok(Sample::new("coreaudio", reading))
    }
}

/// Main-channel scalar when the device exposes one, else the mean of the
/// left and right channels that do.
pub fn combine_channels(main: Option<f32>, left: Option<f32>, right: Option<f32>) -> Option<f32> {
    if let Some(main) = main {
        return Some(main.clamp(0.0, 1.0));
    }
    let channels: Vec<f32> = [left, right].into_iter().flatten().collect();
    if channels.is_empty() {
        return None;
    }
    let mean = channels.iter().sum::<f32>() / channels.len() as f32;
    Some(mean.clamp(0.0, 1.0))
}

/// CoreAudio-backed implementation for the default devices.
#[derive(Default)]
pub struct CoreAudioBackend;

impl CoreAudioBackend {
    pub fn new() -> Self {
        CoreAudioBackend
    }
}

#[cfg(target_os = "macos")]
mod coreaudio {
    use std::ffi::c_void;
    use std::mem::size_of;
    use std::ptr;

    use super::AudioDirection;

    #[repr(C)]
    pub struct AudioObjectPropertyAddress {
        pub selector: u32,
        pub scope: u32,
        pub element: u32,
    }

    const SYSTEM_OBJECT: u32 = 1;
    const DEFAULT_OUTPUT_DEVICE: u32 = 0x644F7574; // 'dOut'
    const DEFAULT_INPUT_DEVICE: u32 = 0x64496E20; // 'dIn '
    pub const VOLUME_SCALAR: u32 = 0x766F6C6D; // 'volm'
    pub const MUTE: u32 = 0x6D757465; // 'mute'
    const SCOPE_GLOBAL: u32 = 0x676C6F62; // 'glob'
    const SCOPE_OUTPUT: u32 = 0x6F757470; // 'outp'
    const SCOPE_INPUT: u32 = 0x696E7074; // 'inpt'
    pub const ELEMENT_MAIN: u32 = 0;

    #[link(name = "CoreAudio", kind = "framework")]
    extern "C" {
        fn AudioObjectHasProperty(object_id: u32, address: *const AudioObjectPropertyAddress) -> u8;
        fn AudioObjectIsPropertySettable(
            object_id: u32,
            address: *const AudioObjectPropertyAddress,
            settable: *mut u8,
        ) -> i32;
        fn AudioObjectGetPropertyData(
            object_id: u32,
            address: *const AudioObjectPropertyAddress,
            qualifier_data_size: u32,
            qualifier_data: *const c_void,
            data_size: *mut u32,
            data: *mut c_void,
        ) -> i32;
        fn AudioObjectSetPropertyData(
            object_id: u32,
            address: *const AudioObjectPropertyAddress,
            qualifier_data_size: u32,
            qualifier_data: *const c_void,
            data_size: u32,
            data: *const c_void,
        ) -> i32;
    }

    fn scope(direction: AudioDirection) -> u32 {
        match direction {
            AudioDirection::Output => SCOPE_OUTPUT,
            AudioDirection::Input => SCOPE_INPUT,
        }
    }

    fn address(selector: u32, scope: u32, element: u32) -> AudioObjectPropertyAddress {
        AudioObjectPropertyAddress {
            selector,
            scope,
            element,
        }
    }

    /// Default device for `direction`, `None` when there is none.
    pub fn default_device(direction: AudioDirection) -> Option<u32> {
        let selector = match direction {
            AudioDirection::Output => DEFAULT_OUTPUT_DEVICE,
            AudioDirection::Input => DEFAULT_INPUT_DEVICE,
        };
        let addr = address(selector, SCOPE_GLOBAL, ELEMENT_MAIN);
        let mut device: u32 = 0;
        let mut size = size_of::<u32>() as u32;
        let status = unsafe {
            AudioObjectGetPropertyData(
                SYSTEM_OBJECT,
                &addr,
                0,
                ptr::null(),
                &mut size,
                &mut device as *mut u32 as *mut c_void,
            )
        };
        (status == 0 && device != 0).then_some(device)
    }

    pub fn read_f32(device: u32, direction: AudioDirection, selector: u32, element: u32) -> Option<f32> {
        let addr = address(selector, scope(direction), element);
        if unsafe { AudioObjectHasProperty(device, &addr) } == 0 {
            return None;
        }
        let mut value: f32 = 0.0;
        let mut size = size_of::<f32>() as u32;
        let status = unsafe {
            AudioObjectGetPropertyData(
                device,
                &addr,
                0,
                ptr::null(),
                &mut size,
                &mut value as *mut f32 as *mut c_void,
            )
        };
        (status == 0).then_some(value)
    }

    pub fn read_u32(device: u32, direction: AudioDirection, selector: u32, element: u32) -> Option<u32> {
        let addr = address(selector, scope(direction), element);
        if unsafe { AudioObjectHasProperty(device, &addr) } == 0 {
            return None;
        }
        let mut value: u32 = 0;
        let mut size = size_of::<u32>() as u32;
        let status = unsafe {
            AudioObjectGetPropertyData(
                device,
                &addr,
                0,
                ptr::null(),
                &mut size,
                &mut value as *mut u32 as *mut c_void,
            )
        };
        (status == 0).then_some(value)
    }

    fn settable(device: u32, addr: &AudioObjectPropertyAddress) -> bool {
        if unsafe { AudioObjectHasProperty(device, addr) } == 0 {
            return false;
        }
        let mut settable: u8 = 0;
        let status = unsafe { AudioObjectIsPropertySettable(device, addr, &mut settable) };
        status == 0 && settable != 0
    }

    /// Writes `value` if the property exists and is settable.
    pub fn write<T: Copy>(
        device: u32,
        direction: AudioDirection,
        selector: u32,
        element: u32,
        value: T,
    ) -> bool {
        let addr = address(selector, scope(direction), element);
        if !settable(device, &addr) {
            return false;
        }
        let status = unsafe {
            AudioObjectSetPropertyData(
                device,
                &addr,
                0,
                ptr::null(),
                size_of::<T>() as u32,
                &value as *const T as *const c_void,
            )
        };
        status == 0
    }
}

#[cfg(target_os = "macos")]
impl AudioBackend for CoreAudioBackend {
    fn read(&self, direction: AudioDirection) -> Result<AudioLevel, ProbeFailure> {
        use coreaudio::*;

        let device = default_device(direction)
            .ok_or_else(|| ProbeFailure::no_data("no default audio device"))?;
        let level = combine_channels(
            read_f32(device, direction, VOLUME_SCALAR, ELEMENT_MAIN),
            read_f32(device, direction, VOLUME_SCALAR, 1),
            read_f32(device, direction, VOLUME_SCALAR, 2),
        )
        .ok_or_else(|| ProbeFailure::no_data("device has no volume control"))?;
        let muted = read_u32(device, direction, MUTE, ELEMENT_MAIN).unwrap_or(0) != 0;
        Ok(AudioLevel { level, muted })
    }

    fn set_volume(&self, direction: AudioDirection, level: f32) -> bool {
        use coreaudio::*;

        let Some(device) = default_device(direction) else {
            return false;
        };
        let level = level.clamp(0.0, 1.0);
        if write(device, direction, VOLUME_SCALAR, ELEMENT_MAIN, level) {
            return true;
        }
        // Devices without a main control expose per-channel scalars.
        let left = write(device, direction, VOLUME_SCALAR, 1, level);
        let right = write(device, direction, VOLUME_SCALAR, 2, level);
        left || right
    }

    fn set_muted(&self, direction: AudioDirection, muted: bool) -> bool {
        use coreaudio::*;

        let Some(device) = default_device(direction) else {
            return false;
        };
        write(device, direction, MUTE, ELEMENT_MAIN, muted as u32)
    }
}

#[cfg(not(target_os = "macos"))]
impl AudioBackend for CoreAudioBackend {
    fn read(&self, _direction: AudioDirection) -> Result<AudioLevel, ProbeFailure> {
        Err(ProbeFailure::Unsupported("coreaudio"))
    }

    fn set_volume(&self, _direction: AudioDirection, _level: f32) -> bool {
        false
    }

    fn set_muted(&self, _direction: AudioDirection, _muted: bool) -> bool {
        false
    }
}
