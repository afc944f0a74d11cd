//! Audio output using cpal
//!
//! Opens an output device and pulls mixed frames from the platform
//! [`Context`] inside the cpal callback.

use crate::error::{Error, Result};
use crate::platform::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Preferred mixing rate when the device supports it
const PREFERRED_SAMPLE_RATE: u32 = 44100;

/// cpal output stream rendering a platform context.
pub struct AudioOutput {
    device: cpal::Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
    error_count: Arc<AtomicU32>,
}

impl AudioOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device.
    ///
    /// With a name, that device is tried first. Otherwise (or if it is
    /// missing) the output devices are probed in order and the first one that
    /// reports a usable configuration wins; the host default is the last
    /// resort.
    pub fn open(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let found = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().ok().as_deref() == Some(name));
            match found {
                Some(device) => {
                    info!("Found requested audio device: {}", name);
                    return Self::with_device(device);
                }
                None => warn!("Requested device '{}' not found, probing other devices", name),
            }
        }

        if let Ok(devices) = host.output_devices() {
            for device in devices {
                let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
                match Self::with_device(device) {
                    Ok(output) => {
                        info!("Using audio device: {}", name);
                        return Ok(output);
                    }
                    Err(e) => debug!("Skipping audio device {}: {}", name, e),
                }
            }
        }

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No usable output device found".to_string()))?;
        info!(
            "Using default audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Self::with_device(device)
    }

    fn with_device(device: cpal::Device) -> Result<Self> {
        let (config, sample_format) = Self::get_best_config(&device)?;
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );
        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            error_flag: Arc::new(AtomicBool::new(false)),
            error_count: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Prefer 44.1kHz stereo f32, else the device default.
    fn get_best_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported_configs = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported_configs.find(|config| {
            config.channels() == 2
                && config.min_sample_rate().0 <= PREFERRED_SAMPLE_RATE
                && config.max_sample_rate().0 >= PREFERRED_SAMPLE_RATE
                && config.sample_format() == SampleFormat::F32
        });

        if let Some(supported) = preferred {
            let sample_format = supported.sample_format();
            let config = supported
                .with_sample_rate(cpal::SampleRate(PREFERRED_SAMPLE_RATE))
                .config();
            return Ok((config, sample_format));
        }

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        Ok((supported.config(), supported.sample_format()))
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    /// Start the stream; the callback renders `context`.
    pub fn start(&mut self, context: Arc<Context>) -> Result<()> {
        info!("Starting audio stream");

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(context)?,
            SampleFormat::I16 => self.build_stream::<i16>(context)?,
            SampleFormat::U16 => self.build_stream::<u16>(context)?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn build_stream<T>(&self, context: Arc<Context>) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = self.config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);
        let error_count = Arc::clone(&self.error_count);
        let mut mix: Vec<f32> = Vec::new();

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    mix.resize(data.len(), 0.0);
                    context.render(&mut mix, channels);
                    for (out, sample) in data.iter_mut().zip(&mix) {
                        *out = T::from_sample(sample.clamp(-1.0, 1.0));
                    }
                },
                move |err| {
                    error!("Audio stream error: {} - marking for recovery", err);
                    error_flag.store(true, Ordering::SeqCst);
                    error_count.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    /// Pause and drop the stream.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            info!("Stopping audio stream");
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
        }
        Ok(())
    }

    /// Whether the stream error callback has fired since the last recovery
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::SeqCst)
    }

    /// Rebuild the stream on the same device after an error.
    pub fn try_recover(&mut self, context: Arc<Context>) -> Result<()> {
        warn!(
            "Attempting audio stream recovery (error count: {})",
            self.error_count()
        );
        if let Err(e) = self.stop() {
            warn!("Failed to stop stream during recovery: {}", e);
        }

        self.start(context)?;
        self.error_flag.store(false, Ordering::SeqCst);
        self.error_count.store(0, Ordering::SeqCst);
        info!("Audio stream recovery successful");
        Ok(())
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
