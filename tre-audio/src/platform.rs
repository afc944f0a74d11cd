//! Software audio platform
//!
//! An OpenAL-style object model implemented as a software mixer: named
//! buffers holding 16-bit PCM, sources that play a single buffer or a queue
//! of buffers, direct-path low-pass filters and a listener gain. The output
//! backend (or a test) pulls mixed frames with [`Context::render`].
//!
//! Calls return [`PlatformResult`]; callers outside this module go through
//! [`platform_call!`], which turns failures into `None` and logs them in debug
//! builds only. A degraded context (no output could be opened) answers every
//! call through the macro with `None`.

use crate::extensions::AudioExtensions;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

pub type BufferId = u32;
pub type SourceId = u32;
pub type FilterId = u32;

/// Name never handed out by the platform; a handle holding it is inert.
pub const NULL_ID: u32 = 0;

/// Platform call failure kinds
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformError {
    #[error("invalid object name {0}")]
    InvalidName(u32),

    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Playback state of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

/// Call a [`Context`] method, mapping failure to `None`.
///
/// Failures are logged at error level in debug builds and silently dropped in
/// release builds. On a degraded context the call is skipped entirely.
macro_rules! platform_call {
    ($ctx:expr, $method:ident($($arg:expr),* $(,)?)) => {{
        let context: &$crate::platform::Context = &$ctx;
        if context.is_live() {
            match context.$method($($arg),*) {
                Ok(value) => Some(value),
                Err(_err) => {
                    #[cfg(debug_assertions)]
                    tracing::error!("Platform call {} failed: {}", stringify!($method), _err);
                    None
                }
            }
        } else {
            None
        }
    }};
}
pub(crate) use platform_call;

#[derive(Debug, Default)]
struct BufferData {
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
    /// Number of source queue entries referencing this buffer
    attachments: usize,
}

impl BufferData {
    fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Linearly interpolated stereo frame at `index + frac`
    fn frame_at(&self, index: usize, frac: f32) -> (f32, f32) {
        let last = self.frames() - 1;
        let a = self.stereo(index.min(last));
        let b = self.stereo((index + 1).min(last));
        (a.0 + (b.0 - a.0) * frac, a.1 + (b.1 - a.1) * frac)
    }

    fn stereo(&self, index: usize) -> (f32, f32) {
        const SCALE: f32 = 1.0 / 32768.0;
        match self.channels {
            1 => {
                let s = self.samples[index] as f32 * SCALE;
                (s, s)
            }
            _ => {
                let base = index * self.channels as usize;
                (
                    self.samples[base] as f32 * SCALE,
                    self.samples[base + 1] as f32 * SCALE,
                )
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LowPass {
    gain: f32,
    gain_hf: f32,
}

#[derive(Debug)]
struct SourceData {
    queue: VecDeque<BufferId>,
    /// Index of the buffer being played; entries before it are processed
    current: usize,
    /// Fractional frame position within the current buffer
    cursor: f64,
    state: SourceState,
    gain: f32,
    pitch: f32,
    looping: bool,
    filter: Option<FilterId>,
    lp_memory: [f32; 2],
}

impl Default for SourceData {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            current: 0,
            cursor: 0.0,
            state: SourceState::Initial,
            gain: 1.0,
            pitch: 1.0,
            looping: false,
            filter: None,
            lp_memory: [0.0; 2],
        }
    }
}

impl SourceData {
    fn processed(&self) -> usize {
        match self.state {
            SourceState::Initial => 0,
            SourceState::Stopped => self.queue.len(),
            SourceState::Playing | SourceState::Paused => self.current.min(self.queue.len()),
        }
    }

    fn rewind(&mut self) {
        self.current = 0;
        self.cursor = 0.0;
        self.lp_memory = [0.0; 2];
    }
}

#[derive(Debug)]
struct ContextState {
    next_id: u32,
    buffers: HashMap<BufferId, BufferData>,
    sources: HashMap<SourceId, SourceData>,
    filters: HashMap<FilterId, LowPass>,
    listener_gain: f32,
}

impl ContextState {
    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    fn source_mut(&mut self, id: SourceId) -> PlatformResult<&mut SourceData> {
        self.sources.get_mut(&id).ok_or(PlatformError::InvalidName(id))
    }

    fn source(&self, id: SourceId) -> PlatformResult<&SourceData> {
        self.sources.get(&id).ok_or(PlatformError::InvalidName(id))
    }

    fn detach_queue(&mut self, source: SourceId) -> PlatformResult<()> {
        let queue = std::mem::take(&mut self.source_mut(source)?.queue);
        for buffer in queue {
            if let Some(data) = self.buffers.get_mut(&buffer) {
                data.attachments = data.attachments.saturating_sub(1);
            }
        }
        Ok(())
    }
}

/// Platform context: owns every buffer, source and filter object.
pub struct Context {
    live: bool,
    output_rate: u32,
    extensions: AudioExtensions,
    state: Mutex<ContextState>,
}

impl Context {
    /// Create a live context mixing at `output_rate`.
    pub fn new(output_rate: u32) -> Self {
        Self::with_extensions(output_rate, AudioExtensions::software(), true)
    }

    /// Create a context for a device without usable output.
    pub fn degraded() -> Self {
        Self::with_extensions(44100, AudioExtensions::none(), false)
    }

    fn with_extensions(output_rate: u32, extensions: AudioExtensions, live: bool) -> Self {
        Self {
            live,
            output_rate: output_rate.max(1),
            extensions,
            state: Mutex::new(ContextState {
                next_id: 1,
                buffers: HashMap::new(),
                sources: HashMap::new(),
                filters: HashMap::new(),
                listener_gain: 1.0,
            }),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn extensions(&self) -> &AudioExtensions {
        &self.extensions
    }

    // ----- buffers -----

    pub fn gen_buffer(&self) -> PlatformResult<BufferId> {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        state.buffers.insert(id, BufferData::default());
        Ok(id)
    }

    pub fn delete_buffer(&self, id: BufferId) -> PlatformResult<()> {
        let mut state = self.state.lock();
        match state.buffers.get(&id) {
            None => Err(PlatformError::InvalidName(id)),
            Some(data) if data.attachments > 0 => {
                Err(PlatformError::InvalidOperation("buffer is still queued"))
            }
            Some(_) => {
                state.buffers.remove(&id);
                Ok(())
            }
        }
    }

    /// Upload interleaved PCM into a buffer.
    ///
    /// Rejected with `InvalidOperation` while any source has the buffer queued.
    pub fn buffer_data(
        &self,
        id: BufferId,
        samples: &[i16],
        channels: u16,
        sample_rate: u32,
    ) -> PlatformResult<()> {
        if channels == 0 || channels > self.extensions.max_buffer_channels.max(2) {
            return Err(PlatformError::InvalidValue("unsupported channel count"));
        }
        if sample_rate == 0 {
            return Err(PlatformError::InvalidValue("sample rate must be non-zero"));
        }
        if samples.len() % channels as usize != 0 {
            return Err(PlatformError::InvalidValue("sample count not a multiple of channels"));
        }

        let mut state = self.state.lock();
        let data = state
            .buffers
            .get_mut(&id)
            .ok_or(PlatformError::InvalidName(id))?;
        if data.attachments > 0 {
            return Err(PlatformError::InvalidOperation("buffer is queued on a source"));
        }
        data.samples.clear();
        data.samples.extend_from_slice(samples);
        data.channels = channels;
        data.sample_rate = sample_rate;
        Ok(())
    }

    /// Frame count, channels and sample rate of a buffer
    pub fn buffer_info(&self, id: BufferId) -> PlatformResult<(usize, u16, u32)> {
        let state = self.state.lock();
        let data = state.buffers.get(&id).ok_or(PlatformError::InvalidName(id))?;
        Ok((data.frames(), data.channels, data.sample_rate))
    }

    // ----- sources -----

    pub fn gen_source(&self) -> PlatformResult<SourceId> {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        state.sources.insert(id, SourceData::default());
        Ok(id)
    }

    pub fn delete_source(&self, id: SourceId) -> PlatformResult<()> {
        let mut state = self.state.lock();
        state.detach_queue(id)?;
        state.sources.remove(&id);
        Ok(())
    }

    /// Attach a single static buffer (or none), replacing any queue.
    pub fn set_source_buffer(&self, id: SourceId, buffer: Option<BufferId>) -> PlatformResult<()> {
        let mut state = self.state.lock();
        match state.source(id)?.state {
            SourceState::Playing | SourceState::Paused => {
                return Err(PlatformError::InvalidOperation("source is active"));
            }
            SourceState::Initial | SourceState::Stopped => {}
        }
        if let Some(buffer) = buffer {
            if !state.buffers.contains_key(&buffer) {
                return Err(PlatformError::InvalidName(buffer));
            }
        }
        state.detach_queue(id)?;
        if let Some(buffer) = buffer {
            if let Some(data) = state.buffers.get_mut(&buffer) {
                data.attachments += 1;
            }
        }
        let source = state.source_mut(id)?;
        source.queue.extend(buffer);
        source.state = SourceState::Initial;
        source.rewind();
        Ok(())
    }

    pub fn source_queue_buffer(&self, id: SourceId, buffer: BufferId) -> PlatformResult<()> {
        let mut state = self.state.lock();
        state.source(id)?;
        let data = state
            .buffers
            .get_mut(&buffer)
            .ok_or(PlatformError::InvalidName(buffer))?;
        data.attachments += 1;
        state.source_mut(id)?.queue.push_back(buffer);
        Ok(())
    }

    /// Remove the oldest processed buffer from a source queue.
    pub fn source_unqueue_buffer(&self, id: SourceId) -> PlatformResult<BufferId> {
        let mut state = self.state.lock();
        let source = state.source_mut(id)?;
        if source.processed() == 0 {
            return Err(PlatformError::InvalidValue("no processed buffers to unqueue"));
        }
        let buffer = source
            .queue
            .pop_front()
            .ok_or(PlatformError::InvalidValue("source queue is empty"))?;
        source.current = source.current.saturating_sub(1);
        if let Some(data) = state.buffers.get_mut(&buffer) {
            data.attachments = data.attachments.saturating_sub(1);
        }
        Ok(buffer)
    }

    pub fn source_processed(&self, id: SourceId) -> PlatformResult<usize> {
        Ok(self.state.lock().source(id)?.processed())
    }

    pub fn source_queued(&self, id: SourceId) -> PlatformResult<usize> {
        Ok(self.state.lock().source(id)?.queue.len())
    }

    pub fn source_state(&self, id: SourceId) -> PlatformResult<SourceState> {
        Ok(self.state.lock().source(id)?.state)
    }

    pub fn source_play(&self, id: SourceId) -> PlatformResult<()> {
        let mut state = self.state.lock();
        let source = state.source_mut(id)?;
        match source.state {
            SourceState::Playing => {}
            SourceState::Paused => source.state = SourceState::Playing,
            SourceState::Initial | SourceState::Stopped => {
                source.rewind();
                source.state = if source.queue.is_empty() {
                    SourceState::Stopped
                } else {
                    SourceState::Playing
                };
            }
        }
        Ok(())
    }

    pub fn source_pause(&self, id: SourceId) -> PlatformResult<()> {
        let mut state = self.state.lock();
        let source = state.source_mut(id)?;
        if source.state == SourceState::Playing {
            source.state = SourceState::Paused;
        }
        Ok(())
    }

    pub fn source_stop(&self, id: SourceId) -> PlatformResult<()> {
        let mut state = self.state.lock();
        let source = state.source_mut(id)?;
        if source.state != SourceState::Initial {
            source.state = SourceState::Stopped;
        }
        Ok(())
    }

    pub fn source_rewind(&self, id: SourceId) -> PlatformResult<()> {
        let mut state = self.state.lock();
        let source = state.source_mut(id)?;
        source.state = SourceState::Initial;
        source.rewind();
        Ok(())
    }

    pub fn set_source_gain(&self, id: SourceId, gain: f32) -> PlatformResult<()> {
        if !gain.is_finite() || gain < 0.0 {
            return Err(PlatformError::InvalidValue("gain must be finite and non-negative"));
        }
        self.state.lock().source_mut(id)?.gain = gain;
        Ok(())
    }

    pub fn source_gain(&self, id: SourceId) -> PlatformResult<f32> {
        Ok(self.state.lock().source(id)?.gain)
    }

    pub fn set_source_pitch(&self, id: SourceId, pitch: f32) -> PlatformResult<()> {
        if !pitch.is_finite() || pitch <= 0.0 {
            return Err(PlatformError::InvalidValue("pitch must be positive"));
        }
        self.state.lock().source_mut(id)?.pitch = pitch;
        Ok(())
    }

    pub fn set_source_looping(&self, id: SourceId, looping: bool) -> PlatformResult<()> {
        self.state.lock().source_mut(id)?.looping = looping;
        Ok(())
    }

    pub fn set_source_direct_filter(
        &self,
        id: SourceId,
        filter: Option<FilterId>,
    ) -> PlatformResult<()> {
        if !self.extensions.efx {
            return Err(PlatformError::InvalidOperation("filters are not supported"));
        }
        let mut state = self.state.lock();
        if let Some(filter) = filter {
            if !state.filters.contains_key(&filter) {
                return Err(PlatformError::InvalidName(filter));
            }
        }
        let source = state.source_mut(id)?;
        source.filter = filter;
        source.lp_memory = [0.0; 2];
        Ok(())
    }

    pub fn source_direct_filter(&self, id: SourceId) -> PlatformResult<Option<FilterId>> {
        Ok(self.state.lock().source(id)?.filter)
    }

    // ----- filters -----

    pub fn gen_filter(&self) -> PlatformResult<FilterId> {
        if !self.extensions.efx {
            return Err(PlatformError::InvalidOperation("filters are not supported"));
        }
        let mut state = self.state.lock();
        let id = state.allocate_id();
        state.filters.insert(id, LowPass { gain: 1.0, gain_hf: 1.0 });
        Ok(id)
    }

    pub fn delete_filter(&self, id: FilterId) -> PlatformResult<()> {
        let mut state = self.state.lock();
        state
            .filters
            .remove(&id)
            .ok_or(PlatformError::InvalidName(id))?;
        for source in state.sources.values_mut() {
            if source.filter == Some(id) {
                source.filter = None;
            }
        }
        Ok(())
    }

    pub fn set_lowpass(&self, id: FilterId, gain: f32, gain_hf: f32) -> PlatformResult<()> {
        if !(0.0..=1.0).contains(&gain) || !(0.0..=1.0).contains(&gain_hf) {
            return Err(PlatformError::InvalidValue("low-pass gains must be within 0..=1"));
        }
        let mut state = self.state.lock();
        let filter = state
            .filters
            .get_mut(&id)
            .ok_or(PlatformError::InvalidName(id))?;
        filter.gain = gain;
        filter.gain_hf = gain_hf;
        Ok(())
    }

    // ----- listener -----

    pub fn set_listener_gain(&self, gain: f32) -> PlatformResult<()> {
        if !gain.is_finite() || gain < 0.0 {
            return Err(PlatformError::InvalidValue("gain must be finite and non-negative"));
        }
        self.state.lock().listener_gain = gain;
        Ok(())
    }

    pub fn listener_gain(&self) -> PlatformResult<f32> {
        Ok(self.state.lock().listener_gain)
    }

    // ----- mixing -----

    /// Mix all playing sources into `out` (interleaved, `channels` wide).
    ///
    /// `out` is overwritten. Sources advance by the number of frames rendered;
    /// a non-looping source that runs past its last buffer stops.
    pub fn render(&self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        if channels == 0 || !self.live {
            return;
        }

        let frames = out.len() / channels;
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let listener_gain = state.listener_gain;

        for source in state.sources.values_mut() {
            if source.state != SourceState::Playing {
                continue;
            }
            let lowpass = source.filter.and_then(|f| state.filters.get(&f)).copied();
            mix_source(
                source,
                &state.buffers,
                lowpass,
                listener_gain,
                self.output_rate,
                out,
                channels,
                frames,
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn mix_source(
    source: &mut SourceData,
    buffers: &HashMap<BufferId, BufferData>,
    lowpass: Option<LowPass>,
    listener_gain: f32,
    output_rate: u32,
    out: &mut [f32],
    channels: usize,
    frames: usize,
) {
    let gain = source.gain * listener_gain;
    let mut frame = 0;
    // Buffer hops without producing output; bounds the walk over empty queues
    let mut idle_hops = 0;

    while frame < frames {
        let Some(buffer) = source
            .queue
            .get(source.current)
            .and_then(|id| buffers.get(id))
        else {
            source.state = SourceState::Stopped;
            return;
        };

        let len = buffer.frames();
        if len > 0 && buffer.sample_rate > 0 {
            let step = buffer.sample_rate as f64 * source.pitch as f64 / output_rate as f64;
            while frame < frames && source.cursor < len as f64 {
                let index = source.cursor as usize;
                let frac = (source.cursor - index as f64) as f32;
                let (mut left, mut right) = buffer.frame_at(index, frac);

                if let Some(lp) = lowpass {
                    let alpha = lp.gain_hf;
                    source.lp_memory[0] += alpha * (left - source.lp_memory[0]);
                    source.lp_memory[1] += alpha * (right - source.lp_memory[1]);
                    left = source.lp_memory[0] * lp.gain;
                    right = source.lp_memory[1] * lp.gain;
                }

                let base = frame * channels;
                if channels == 1 {
                    out[base] += 0.5 * (left + right) * gain;
                } else {
                    out[base] += left * gain;
                    out[base + 1] += right * gain;
                }

                source.cursor += step;
                frame += 1;
                idle_hops = 0;
            }
        }

        if source.cursor >= len as f64 {
            source.cursor = (source.cursor - len as f64).max(0.0);
            source.current += 1;
            idle_hops += 1;
            if source.current >= source.queue.len() {
                if source.looping && idle_hops <= source.queue.len() {
                    source.current = 0;
                } else {
                    source.state = SourceState::Stopped;
                    source.cursor = 0.0;
                    return;
                }
            }
        }
    }
}
