//! Single-owner wrappers around platform objects
//!
//! Each handle owns exactly one platform name and releases it on drop.
//! Handles are not `Clone`; a buffer shared between a streaming queue and
//! its voice is shared through `Arc<BufferHandle>`.

use crate::error::{Error, Result};
use crate::extensions::AudioExtensions;
use crate::platform::{platform_call, BufferId, Context, FilterId, SourceId, SourceState, NULL_ID};
use crate::wav;
use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// A platform PCM buffer.
pub struct BufferHandle {
    context: Arc<Context>,
    id: BufferId,
    frames: AtomicUsize,
    sample_rate: AtomicU32,
}

impl BufferHandle {
    pub fn new(context: Arc<Context>) -> Self {
        let id = platform_call!(context, gen_buffer()).unwrap_or(NULL_ID);
        Self {
            context,
            id,
            frames: AtomicUsize::new(0),
            sample_rate: AtomicU32::new(0),
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Upload `frame_count` interleaved frames.
    ///
    /// Filling a buffer that is still queued on a source is rejected by the
    /// platform; the buffer keeps its previous contents and attributes.
    pub fn fill(&self, samples: &[i16], frame_count: usize, channels: u16, sample_rate: u32) {
        let len = (frame_count * channels as usize).min(samples.len());
        let uploaded = platform_call!(
            self.context,
            buffer_data(self.id, &samples[..len], channels, sample_rate)
        )
        .is_some();

        if uploaded || !self.context.is_live() {
            self.frames.store(len / channels.max(1) as usize, Ordering::Release);
            self.sample_rate.store(sample_rate, Ordering::Release);
        }
    }

    /// Decode a RIFF/WAVE blob and upload it as a single buffer.
    pub fn fill_from_wav(&self, data: &[u8]) -> Result<()> {
        let pcm = wav::decode_wav(data)?;
        self.fill(&pcm.samples, pcm.frames(), pcm.channels, pcm.sample_rate);
        Ok(())
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    pub fn duration(&self) -> Duration {
        tre_common::units::samples_to_duration(self.frames() as u64, self.sample_rate())
    }
}

impl Drop for BufferHandle {
    fn drop(&mut self) {
        if self.id != NULL_ID {
            platform_call!(self.context, delete_buffer(self.id));
        }
    }
}

impl std::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferHandle")
            .field("id", &self.id)
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate())
            .finish()
    }
}

/// A platform low-pass filter object.
pub struct FilterHandle {
    context: Arc<Context>,
    id: FilterId,
}

impl FilterHandle {
    /// Create a filter; inert when the context lacks filter support.
    pub fn new(context: Arc<Context>) -> Self {
        let id = if context.extensions().efx {
            platform_call!(context, gen_filter()).unwrap_or(NULL_ID)
        } else {
            NULL_ID
        };
        Self { context, id }
    }

    pub fn id(&self) -> FilterId {
        self.id
    }

    pub fn set_lowpass(&self, gain: f32, gain_hf: f32) {
        if self.id != NULL_ID {
            platform_call!(self.context, set_lowpass(self.id, gain, gain_hf));
        }
    }
}

impl Drop for FilterHandle {
    fn drop(&mut self) {
        if self.id != NULL_ID {
            platform_call!(self.context, delete_filter(self.id));
        }
    }
}

/// A platform voice slot.
pub struct SourceHandle {
    context: Arc<Context>,
    id: SourceId,
}

impl SourceHandle {
    pub fn new(context: Arc<Context>) -> Self {
        let id = platform_call!(context, gen_source()).unwrap_or(NULL_ID);
        Self { context, id }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn extensions(&self) -> &AudioExtensions {
        self.context.extensions()
    }

    pub(crate) fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Attach a static buffer, or detach with `None`.
    pub fn set_buffer(&self, buffer: Option<&BufferHandle>) {
        platform_call!(self.context, set_source_buffer(self.id, buffer.map(BufferHandle::id)));
    }

    pub fn play(&self) {
        platform_call!(self.context, source_play(self.id));
    }

    pub fn pause(&self) {
        platform_call!(self.context, source_pause(self.id));
    }

    pub fn stop(&self) {
        platform_call!(self.context, source_stop(self.id));
    }

    pub fn rewind(&self) {
        platform_call!(self.context, source_rewind(self.id));
    }

    /// Platform state; a slot the platform cannot answer for reads as stopped.
    pub fn state(&self) -> SourceState {
        platform_call!(self.context, source_state(self.id)).unwrap_or(SourceState::Stopped)
    }

    pub fn is_playing(&self) -> bool {
        self.state() == SourceState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state() == SourceState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == SourceState::Stopped
    }

    pub fn set_gain(&self, gain: f32) {
        platform_call!(self.context, set_source_gain(self.id, gain.max(0.0)));
    }

    pub fn set_pitch(&self, pitch: f32) {
        if self.extensions().pitch {
            platform_call!(self.context, set_source_pitch(self.id, pitch));
        }
    }

    pub fn set_looping(&self, looping: bool) {
        platform_call!(self.context, set_source_looping(self.id, looping));
    }

    pub fn set_direct_filter(&self, filter: Option<&FilterHandle>) {
        if !self.extensions().efx {
            return;
        }
        let filter = filter.map(FilterHandle::id).filter(|id| *id != NULL_ID);
        platform_call!(self.context, set_source_direct_filter(self.id, filter));
    }

    pub fn direct_filter(&self) -> Option<FilterId> {
        platform_call!(self.context, source_direct_filter(self.id)).flatten()
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        if self.id != NULL_ID {
            platform_call!(self.context, source_stop(self.id));
            platform_call!(self.context, delete_source(self.id));
        }
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle").field("id", &self.id).finish()
    }
}

/// A voice slot playing a queue of buffers.
///
/// Tracks which buffers are enqueued so that a buffer is never queued twice
/// and every dequeued platform name maps back to exactly one handle.
pub struct StreamingSourceHandle {
    // Declared first: deleting the source detaches the queue before the
    // buffers below are released.
    source: SourceHandle,
    queued: VecDeque<Arc<BufferHandle>>,
}

impl StreamingSourceHandle {
    pub fn new(context: Arc<Context>) -> Self {
        Self {
            source: SourceHandle::new(context),
            queued: VecDeque::new(),
        }
    }

    /// Append a buffer to the play queue.
    ///
    /// # Errors
    /// `InvariantViolation` if this buffer instance is already queued.
    pub fn queue_buffer(&mut self, buffer: Arc<BufferHandle>) -> Result<()> {
        if self.queued.iter().any(|b| Arc::ptr_eq(b, &buffer)) {
            return Err(Error::InvariantViolation(format!(
                "buffer {} is already queued on source {}",
                buffer.id(),
                self.source.id()
            )));
        }

        if platform_call!(self.source.context(), source_queue_buffer(self.source.id(), buffer.id()))
            .is_some()
        {
            self.queued.push_back(buffer);
        }
        Ok(())
    }

    /// Pop the oldest processed buffer, if any.
    ///
    /// # Errors
    /// `InvariantViolation` if the platform returns a buffer this handle never
    /// queued.
    pub fn unqueue_buffer(&mut self) -> Result<Option<Arc<BufferHandle>>> {
        let Some(id) = platform_call!(self.source.context(), source_unqueue_buffer(self.source.id()))
        else {
            return Ok(None);
        };

        let index = self
            .queued
            .iter()
            .position(|b| b.id() == id)
            .ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "source {} dequeued untracked buffer {}",
                    self.source.id(),
                    id
                ))
            })?;
        Ok(self.queued.remove(index))
    }

    /// Number of queued buffers the platform has finished playing
    pub fn processed(&self) -> usize {
        platform_call!(self.source.context(), source_processed(self.source.id())).unwrap_or(0)
    }

    /// Number of buffers currently enqueued
    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    pub fn is_queued(&self, buffer: &Arc<BufferHandle>) -> bool {
        self.queued.iter().any(|b| Arc::ptr_eq(b, buffer))
    }

    /// Stop playback, wait for the platform to confirm, then unqueue everything.
    ///
    /// Intended for teardown only; polls every `poll_interval`.
    pub fn gracefully_stop(&mut self, poll_interval: Duration) -> Result<()> {
        self.source.stop();
        // A source that never played stays Initial; stop does not move it
        while !matches!(self.source.state(), SourceState::Stopped | SourceState::Initial) {
            std::thread::sleep(poll_interval);
        }

        while self.unqueue_buffer()?.is_some() {}
        if !self.queued.is_empty() {
            trace!(
                "Source {} detaching {} unprocessed buffers",
                self.source.id(),
                self.queued.len()
            );
            self.source.set_buffer(None);
        }
        self.queued.clear();
        Ok(())
    }
}

impl Deref for StreamingSourceHandle {
    type Target = SourceHandle;

    fn deref(&self) -> &SourceHandle {
        &self.source
    }
}
