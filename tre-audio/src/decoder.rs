//! Streaming audio decoder using symphonia
//!
//! [`AudioStreamDecoder`] turns a compressed stream into a bounded FIFO of
//! fixed-format PCM chunks: interleaved signed 16-bit, mono or stereo,
//! resampled to the decoder's output rate. One thread feeds packets with
//! [`AudioStreamDecoder::push`] while another drains frames with
//! [`AudioStreamDecoder::read`]; every operation takes the decoder's mutex.

use crate::error::{Error, Result};
use crate::resampler::{StreamResampler, DEFAULT_CHUNK_FRAMES};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, trace, warn};

/// Maximum number of decoded chunks held by a decoder
pub const QUEUE_LIMIT: usize = 60;

struct DecoderState {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    resampler: Option<StreamResampler>,
    queue: VecDeque<Vec<i16>>,
    last_packet_ts: u64,
    /// Interleaved f32 staging for the current packet
    scratch: Vec<f32>,
    /// Resampler output staging
    resampled: Vec<f32>,
}

/// Compressed stream to bounded queue of PCM chunks.
pub struct AudioStreamDecoder {
    state: Mutex<DecoderState>,
    track_id: u32,
    time_base: Option<TimeBase>,
    n_frames: Option<u64>,
    source_rate: u32,
    output_rate: u32,
    channels: u16,
}

impl AudioStreamDecoder {
    /// Open a decoder on a file, using its extension as a format hint.
    ///
    /// # Arguments
    /// - `path`: Audio file
    /// - `output_rate`: Rate to resample to (None = keep the stream's rate)
    pub fn from_path(path: &Path, output_rate: Option<u32>) -> Result<Self> {
        debug!("Opening stream decoder for {}", path.display());
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }
        Self::open(Box::new(file), hint, output_rate)
    }

    /// Open a decoder on any seekable media source.
    ///
    /// # Errors
    /// - Unsupported or unrecognized container
    /// - No decodable audio track
    /// - Codec or resampler construction failed
    pub fn open(source: Box<dyn MediaSource>, hint: Hint, output_rate: Option<u32>) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());
        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let source_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
        let source_channels = codec_params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;
        let channels = source_channels.clamp(1, 2) as u16;

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let output_rate = output_rate.unwrap_or(source_rate);
        let resampler = if output_rate != source_rate {
            Some(StreamResampler::new(
                source_rate,
                output_rate,
                channels,
                DEFAULT_CHUNK_FRAMES,
            )?)
        } else {
            None
        };

        debug!(
            "Stream format: {}Hz x{} -> {}Hz x{}",
            source_rate, source_channels, output_rate, channels
        );

        Ok(Self {
            state: Mutex::new(DecoderState {
                format,
                decoder,
                resampler,
                queue: VecDeque::with_capacity(QUEUE_LIMIT),
                last_packet_ts: 0,
                scratch: Vec::new(),
                resampled: Vec::new(),
            }),
            track_id,
            time_base: codec_params.time_base,
            n_frames: codec_params.n_frames,
            source_rate,
            output_rate,
            channels,
        })
    }

    /// Output channel count (1 or 2)
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.output_rate
    }

    /// Sample rate of the encoded stream
    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    /// Number of chunks currently queued
    pub fn queued_chunks(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Number of frames currently queued
    pub fn queued_frames(&self) -> usize {
        let state = self.state.lock();
        state.queue.iter().map(Vec::len).sum::<usize>() / self.channels as usize
    }

    pub fn is_full(&self) -> bool {
        self.state.lock().queue.len() >= QUEUE_LIMIT
    }

    /// Read the next packet from the demuxer.
    ///
    /// Returns `Ok(None)` at end of stream.
    pub fn next_packet(&self) -> Result<Option<Packet>> {
        let mut state = self.state.lock();
        match state.format.next_packet() {
            Ok(packet) => Ok(Some(packet)),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                trace!("Reached end of stream");
                Ok(None)
            }
            Err(SymphoniaError::ResetRequired) => {
                debug!("Demuxer requested reset, treating as end of stream");
                Ok(None)
            }
            Err(e) => Err(Error::Decode(format!("Failed to read packet: {}", e))),
        }
    }

    /// Decode one packet of this stream into the queue.
    ///
    /// Returns `Ok(false)` without touching the packet when the queue is full
    /// or the packet belongs to another track.
    ///
    /// # Errors
    /// Unrecoverable codec failures. "Reset required" resets the codec and
    /// recoverable decode errors skip the packet; both return `Ok(true)`.
    pub fn push(&self, packet: &Packet) -> Result<bool> {
        if packet.track_id() != self.track_id {
            return Ok(false);
        }

        let mut guard = self.state.lock();
        if guard.queue.len() >= QUEUE_LIMIT {
            return Ok(false);
        }

        let state = &mut *guard;
        state.last_packet_ts = packet.ts();

        match state.decoder.decode(packet) {
            Ok(decoded) => {
                state.scratch.clear();
                append_interleaved(&decoded, self.channels as usize, &mut state.scratch);
            }
            Err(SymphoniaError::ResetRequired) => {
                debug!("Codec reset required");
                state.decoder.reset();
                return Ok(true);
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet at ts {}: {}", packet.ts(), e);
                return Ok(true);
            }
            Err(e) => return Err(Error::Decode(format!("Decode failed: {}", e))),
        }

        let chunk = match state.resampler.as_mut() {
            Some(resampler) => {
                state.resampled.clear();
                resampler.process(&state.scratch, &mut state.resampled)?;
                to_i16(&state.resampled)
            }
            None => to_i16(&state.scratch),
        };
        if !chunk.is_empty() {
            state.queue.push_back(chunk);
        }
        Ok(true)
    }

    /// Flush resampler carry-over into the queue at end of stream.
    ///
    /// Returns `false` if the queue is full and the flush must be retried.
    pub fn finish(&self) -> Result<bool> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(resampler) = state.resampler.as_mut() else {
            return Ok(true);
        };
        if resampler.pending_frames() == 0 {
            return Ok(true);
        }
        if state.queue.len() >= QUEUE_LIMIT {
            return Ok(false);
        }

        state.resampled.clear();
        resampler.flush(&mut state.resampled)?;
        if !state.resampled.is_empty() {
            state.queue.push_back(to_i16(&state.resampled));
        }
        Ok(true)
    }

    /// Pop up to `frame_count` frames into `buffer`; never blocks.
    ///
    /// Partially consumed chunks keep their remainder at the queue front.
    /// Whatever is not covered by queued data is zero-filled. Returns the
    /// number of frames taken from the queue.
    pub fn read(&self, buffer: &mut [i16], frame_count: usize) -> usize {
        let channels = self.channels as usize;
        let wanted = (frame_count * channels).min(buffer.len() / channels * channels);
        let mut written = 0;

        let mut state = self.state.lock();
        while written < wanted {
            let Some(front) = state.queue.front_mut() else {
                break;
            };
            let n = front.len().min(wanted - written);
            buffer[written..written + n].copy_from_slice(&front[..n]);
            front.drain(..n);
            if front.is_empty() {
                state.queue.pop_front();
            }
            written += n;
        }
        drop(state);

        buffer[written..wanted].fill(0);
        written / channels
    }

    /// Reposition the stream.
    ///
    /// Discards all queued chunks and resets codec and resampler state. A
    /// failed demuxer seek is logged and otherwise ignored.
    pub fn seek(&self, position: Duration) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.queue.clear();

        let time = Time::new(position.as_secs(), position.subsec_nanos() as f64 / 1e9);
        match state.format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time,
                track_id: Some(self.track_id),
            },
        ) {
            Ok(seeked) => {
                debug!("Seeked to {:?} (ts {})", position, seeked.actual_ts);
                state.last_packet_ts = seeked.actual_ts;
            }
            Err(e) => warn!("Seek to {:?} failed: {}", position, e),
        }

        state.decoder.reset();
        if let Some(resampler) = state.resampler.as_mut() {
            resampler.reset();
        }
    }

    /// Position of the most recently pushed packet
    pub fn position(&self) -> Duration {
        let ts = self.state.lock().last_packet_ts;
        self.ts_to_duration(ts)
    }

    /// Stream length from container metadata, if known
    pub fn duration(&self) -> Option<Duration> {
        self.n_frames.map(|frames| self.ts_to_duration(frames))
    }

    fn ts_to_duration(&self, ts: u64) -> Duration {
        match self.time_base {
            Some(tb) => {
                let time = tb.calc_time(ts);
                Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac)
            }
            None => tre_common::units::samples_to_duration(ts, self.source_rate),
        }
    }
}

/// Append a decoded buffer as interleaved f32, keeping the first `channels`.
fn append_interleaved(decoded: &AudioBufferRef<'_>, channels: usize, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::U8(buf) => append_planar(buf, channels, out),
        AudioBufferRef::U16(buf) => append_planar(buf, channels, out),
        AudioBufferRef::U24(buf) => append_planar(buf, channels, out),
        AudioBufferRef::U32(buf) => append_planar(buf, channels, out),
        AudioBufferRef::S8(buf) => append_planar(buf, channels, out),
        AudioBufferRef::S16(buf) => append_planar(buf, channels, out),
        AudioBufferRef::S24(buf) => append_planar(buf, channels, out),
        AudioBufferRef::S32(buf) => append_planar(buf, channels, out),
        AudioBufferRef::F32(buf) => append_planar(buf, channels, out),
        AudioBufferRef::F64(buf) => append_planar(buf, channels, out),
    }
}

fn append_planar<S>(buf: &AudioBuffer<S>, channels: usize, out: &mut Vec<f32>)
where
    S: Sample + IntoSample<f32>,
{
    let available = buf.spec().channels.count();
    let frames = buf.frames();
    out.reserve(frames * channels);

    for frame_idx in 0..frames {
        for ch_idx in 0..channels {
            // Mono sources feed both output channels when stereo is requested
            let sample = buf.chan(ch_idx.min(available - 1))[frame_idx];
            out.push(sample.into_sample());
        }
    }
}

fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}
