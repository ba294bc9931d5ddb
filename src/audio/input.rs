//! Audio input capture
//!
//! Opens an input device with cpal and turns its callbacks into fixed-size
//! frames. Backends deliver callbacks of whatever length they like, so the
//! callback owns a [`FrameAssembler`] that keeps channel 0, converts to
//! float and publishes only whole frames.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use thiserror::Error;

use super::slot::FrameSink;
use crate::settings::AnalyzerSettings;

/// Errors that can occur while opening the input device
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Audio device unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to get audio config: {0}")]
    Config(String),

    #[error("Failed to build audio stream: {0}")]
    Build(String),

    #[error("Failed to start audio stream: {0}")]
    Play(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Collects channel 0 of interleaved callback data into whole frames
pub struct FrameAssembler<S: FrameSink> {
    sink: S,
    staging: Vec<f32>,
    filled: usize,
    channels: usize,
}

impl<S: FrameSink> FrameAssembler<S> {
    pub fn new(sink: S, channels: usize) -> Self {
        let frame_len = sink.frame_len();
        Self {
            sink,
            staging: vec![0.0; frame_len],
            filled: 0,
            channels: channels.max(1),
        }
    }

    /// Feed one callback's worth of interleaved samples
    ///
    /// Runs on the audio thread: no allocation, no locking.
    #[inline]
    pub fn push_interleaved<T>(&mut self, data: &[T])
    where
        T: Copy,
        f32: FromSample<T>,
    {
        if self.staging.is_empty() {
            return;
        }

        for frame in data.chunks(self.channels) {
            self.staging[self.filled] = f32::from_sample_(frame[0]);
            self.filled += 1;

            if self.filled == self.staging.len() {
                self.sink.publish(&self.staging);
                self.filled = 0;
            }
        }
    }

    /// Samples collected towards the next frame
    pub fn pending(&self) -> usize {
        self.filled
    }
}

/// Live input stream feeding a [`FrameSink`]
///
/// Capture runs for as long as this value lives.
pub struct AudioInput {
    stream: cpal::Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

impl AudioInput {
    /// Open the configured input device and start capturing into `sink`
    ///
    /// There is no retry: without an input device the pipeline cannot run.
    pub fn start<S>(settings: &AnalyzerSettings, sink: S) -> Result<Self, DeviceError>
    where
        S: FrameSink + 'static,
    {
        let host = cpal::default_host();

        let device = match &settings.device {
            Some(wanted) => host
                .input_devices()
                .map_err(|e| DeviceError::Unavailable(e.to_string()))?
                .find(|d| d.name().map(|n| &n == wanted).unwrap_or(false))
                .ok_or_else(|| DeviceError::Unavailable(format!("no input device named {wanted:?}")))?,
            None => host
                .default_input_device()
                .ok_or_else(|| DeviceError::Unavailable("no default input device".to_string()))?,
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using input device: {}", device_name);

        let supported = match settings.sample_rate {
            Some(rate) => device
                .supported_input_configs()
                .map_err(|e| DeviceError::Config(e.to_string()))?
                .find(|r| r.min_sample_rate().0 <= rate && rate <= r.max_sample_rate().0)
                .map(|r| r.with_sample_rate(cpal::SampleRate(rate)))
                .ok_or_else(|| DeviceError::Config(format!("{rate} Hz is not supported")))?,
            None => device
                .default_input_config()
                .map_err(|e| DeviceError::Config(e.to_string()))?,
        };

        log::info!("Audio config: {:?}", supported);

        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.config();
        let assembler = FrameAssembler::new(sink, config.channels as usize);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32, S>(&device, &config, assembler),
            cpal::SampleFormat::I16 => build_stream::<i16, S>(&device, &config, assembler),
            cpal::SampleFormat::U16 => build_stream::<u16, S>(&device, &config, assembler),
            format => return Err(DeviceError::UnsupportedFormat(format!("{format:?}"))),
        }
        .map_err(|e| DeviceError::Build(e.to_string()))?;

        stream.play().map_err(|e| DeviceError::Play(e.to_string()))?;
        log::info!(
            "Capture started: {} Hz, {} channel(s), {} samples per frame",
            config.sample_rate.0,
            config.channels,
            settings.frame_len
        );

        Ok(Self {
            stream,
            device_name,
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Stop capture and release the device
    pub fn stop(self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("Failed to pause input stream: {}", e);
        }
        drop(self.stream);
        log::info!("Capture stopped");
    }
}

fn build_stream<T, S>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut assembler: FrameAssembler<S>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
    S: FrameSink + 'static,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| assembler.push_interleaved(data),
        |err| log::error!("Audio stream error: {}", err),
        None,
    )
}

/// Summary of one input device
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub max_channels: u16,
    /// Lowest and highest supported sample rate, if the device reported any
    pub sample_rates: Option<(u32, u32)>,
}

/// Enumerate input devices on the default host
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, DeviceError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

    let infos: Vec<InputDeviceInfo> = devices
        .map(|device| {
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            let ranges: Vec<_> = device
                .supported_input_configs()
                .map(|configs| configs.collect())
                .unwrap_or_default();

            let max_channels = ranges.iter().map(|r| r.channels()).max().unwrap_or(0);
            let sample_rates = ranges.iter().fold(None, |acc: Option<(u32, u32)>, r| {
                let (lo, hi) = (r.min_sample_rate().0, r.max_sample_rate().0);
                Some(acc.map_or((lo, hi), |(a, b)| (a.min(lo), b.max(hi))))
            });

            InputDeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                max_channels,
                sample_rates,
            }
        })
        .collect();

    log::info!("Found {} input device(s)", infos.len());
    for info in &infos {
        log::info!(
            "  {}{} - {} channel(s), rates {:?}",
            info.name,
            if info.is_default { " (default)" } else { "" },
            info.max_channels,
            info.sample_rates
        );
    }

    Ok(infos)
}
