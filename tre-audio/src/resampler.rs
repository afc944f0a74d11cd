//! Streaming sample-rate conversion using rubato
//!
//! Decoded packets arrive in arbitrary sizes while rubato's fixed-input
//! resamplers consume exact chunks. [`StreamResampler`] keeps the leftover
//! input frames between calls and drains them at end of stream.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Input frames consumed per rubato call
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

/// Stateful resampler for one decoded stream.
pub struct StreamResampler {
    inner: FastFixedIn<f32>,
    channels: usize,
    /// Planar input frames not yet consumed by rubato
    pending: Vec<Vec<f32>>,
    input_rate: u32,
    output_rate: u32,
}

impl StreamResampler {
    /// Create a resampler converting `input_rate` to `output_rate`.
    ///
    /// # Errors
    /// - Zero channels or sample rates
    /// - rubato rejected the ratio or chunk size
    pub fn new(input_rate: u32, output_rate: u32, channels: u16, chunk_frames: usize) -> Result<Self> {
        if channels == 0 || input_rate == 0 || output_rate == 0 {
            return Err(Error::Resample(format!(
                "Invalid resampler parameters: {}Hz -> {}Hz, {} channels",
                input_rate, output_rate, channels
            )));
        }

        debug!(
            "Creating stream resampler {}Hz -> {}Hz ({} channels, chunk {})",
            input_rate, output_rate, channels, chunk_frames
        );

        let inner = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            chunk_frames,
            channels as usize,
        )
        .map_err(|e| Error::Resample(format!("Failed to create resampler: {}", e)))?;

        Ok(Self {
            inner,
            channels: channels as usize,
            pending: vec![Vec::with_capacity(chunk_frames * 2); channels as usize],
            input_rate,
            output_rate,
        })
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Frames buffered but not yet resampled
    pub fn pending_frames(&self) -> usize {
        self.pending.first().map_or(0, Vec::len)
    }

    /// Feed interleaved input; append every complete output chunk to `out`.
    pub fn process(&mut self, interleaved: &[f32], out: &mut Vec<f32>) -> Result<()> {
        deinterleave_into(interleaved, &mut self.pending);

        loop {
            let needed = self.inner.input_frames_next();
            if self.pending_frames() < needed {
                break;
            }

            let chunk: Vec<&[f32]> = self.pending.iter().map(|ch| &ch[..needed]).collect();
            let planar = self
                .inner
                .process(&chunk, None)
                .map_err(|e| Error::Resample(format!("Resampling failed: {}", e)))?;
            interleave_into(&planar, out);

            for channel in &mut self.pending {
                channel.drain(..needed);
            }
        }

        Ok(())
    }

    /// Resample whatever input is still pending (end of stream).
    pub fn flush(&mut self, out: &mut Vec<f32>) -> Result<()> {
        if self.pending_frames() == 0 {
            return Ok(());
        }

        let planar = self
            .inner
            .process_partial(Some(self.pending.as_slice()), None)
            .map_err(|e| Error::Resample(format!("Resampler flush failed: {}", e)))?;
        interleave_into(&planar, out);

        for channel in &mut self.pending {
            channel.clear();
        }
        Ok(())
    }

    /// Drop filter history and pending input (after a seek).
    pub fn reset(&mut self) {
        self.inner.reset();
        for channel in &mut self.pending {
            channel.clear();
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

/// Append interleaved samples to planar channel vectors.
///
/// Input:  [L, R, L, R, ...]
/// Output: [[.., L, L], [.., R, R]]
fn deinterleave_into(samples: &[f32], planar: &mut [Vec<f32>]) {
    let channels = planar.len();
    if channels == 0 {
        return;
    }
    for frame in samples.chunks_exact(channels) {
        for (channel, sample) in planar.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }
}

/// Append planar channel vectors to an interleaved output.
fn interleave_into(planar: &[Vec<f32>], out: &mut Vec<f32>) {
    let Some(first) = planar.first() else {
        return;
    };
    out.reserve(first.len() * planar.len());
    for frame_idx in 0..first.len() {
        for channel in planar {
            out.push(channel[frame_idx]);
        }
    }
}
