//! Audio test file generation
//!
//! Generates WAV files with known contents so decoder and streaming tests can
//! check exact sample values and frame counts.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;
use std::path::Path;

fn spec(channels: u16, sample_rate: u32) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Sample value of frame `frame_idx` in a ramp fixture (same on every channel)
pub fn ramp_sample(frame_idx: usize) -> i16 {
    ((frame_idx % 2000) as i16) - 1000
}

/// Generate a WAV whose frame `i` holds `ramp_sample(i)` on every channel.
///
/// # Arguments
/// * `path` - Output file path
/// * `frames` - Number of frames
/// * `channels` - Channel count
/// * `sample_rate` - Sample rate in Hz
pub fn generate_ramp_wav<P: AsRef<Path>>(
    path: P,
    frames: usize,
    channels: u16,
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(channels, sample_rate))?;
    for frame_idx in 0..frames {
        for _ in 0..channels {
            writer.write_sample(ramp_sample(frame_idx))?;
        }
    }
    writer.finalize()
}

/// Generate a sine wave stereo WAV file.
///
/// # Arguments
/// * `path` - Output file path
/// * `duration_ms` - Duration in milliseconds
/// * `frequency_hz` - Sine frequency
/// * `amplitude` - Amplitude 0.0-1.0
/// * `sample_rate` - Sample rate in Hz
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    frequency_hz: f32,
    amplitude: f32,
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(2, sample_rate))?;
    let total_frames = (sample_rate as u64 * duration_ms) / 1000;
    let amplitude_i16 = amplitude * i16::MAX as f32;

    for frame_idx in 0..total_frames {
        let t = frame_idx as f32 / sample_rate as f32;
        let sample = ((2.0 * PI * frequency_hz * t).sin() * amplitude_i16) as i16;
        writer.write_sample(sample)?;
        writer.write_sample(sample)?;
    }
    writer.finalize()
}

/// Ramp fixture rendered into an in-memory RIFF/WAVE blob.
pub fn wav_bytes(frames: usize, channels: u16, sample_rate: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec(channels, sample_rate))
            .expect("create in-memory WAV writer");
        for frame_idx in 0..frames {
            for _ in 0..channels {
                writer.write_sample(ramp_sample(frame_idx)).expect("write sample");
            }
        }
        writer.finalize().expect("finalize WAV");
    }
    bytes
}
