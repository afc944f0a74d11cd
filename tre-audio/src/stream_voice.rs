//! Streaming voice
//!
//! A [`StreamVoice`] owns a [`StreamSource`] and a ring of at least two
//! platform buffers. The device thread calls [`StreamVoice::update`], which
//! recycles at most one processed buffer per call.

use crate::error::{Error, Result};
use crate::handles::{BufferHandle, FilterHandle, StreamingSourceHandle};
use crate::platform::{Context, SourceId};
use crate::stream_source::StreamSource;
use crate::voice::{VoiceControl, VoiceParams};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const TEARDOWN_POLL: Duration = Duration::from_millis(1);

struct StreamState {
    params: VoiceParams,
    source: StreamingSourceHandle,
    stream: Box<dyn StreamSource>,
    buffer_count: usize,
    buffer_frames: usize,
    /// Interleaved staging for one buffer's worth of frames
    scratch: Vec<i16>,
    /// Stopped by the caller; never restarted by `update`
    halted: bool,
}

impl StreamState {
    /// Read one buffer's worth of frames and upload them, silence padded.
    ///
    /// Returns whether the stream produced any frames.
    fn fill_buffer(&mut self, buffer: &BufferHandle) -> Result<bool> {
        let frames = self
            .stream
            .read(&mut self.scratch, self.buffer_frames, self.params.looping)?;
        buffer.fill(
            &self.scratch,
            self.buffer_frames,
            self.stream.channels(),
            self.stream.sample_rate(),
        );
        Ok(frames != 0)
    }

    fn is_stopped(&self) -> bool {
        self.source.is_stopped() && self.source.queued_count() == 0
    }
}

/// Voice fed continuously from a stream source.
pub struct StreamVoice {
    state: Mutex<StreamState>,
}

impl StreamVoice {
    /// Create a voice and pre-roll its ring.
    ///
    /// Seeks the stream to `initial_position`, fills and enqueues all
    /// `buffer_count` buffers, then starts playback.
    ///
    /// # Errors
    /// - `buffer_count < 2` or `buffer_frames == 0`
    /// - Stream read failure during pre-roll
    pub fn new(
        context: Arc<Context>,
        mut stream: Box<dyn StreamSource>,
        buffer_frames: usize,
        buffer_count: usize,
        initial_position: Duration,
    ) -> Result<Self> {
        if buffer_count < 2 {
            return Err(Error::InvalidInput(format!(
                "stream voice needs at least 2 buffers, got {}",
                buffer_count
            )));
        }
        if buffer_frames == 0 {
            return Err(Error::InvalidInput("buffer_frames must be non-zero".to_string()));
        }

        stream.seek(initial_position);
        let channels = stream.channels().max(1) as usize;

        let mut state = StreamState {
            params: VoiceParams::default(),
            source: StreamingSourceHandle::new(Arc::clone(&context)),
            stream,
            buffer_count,
            buffer_frames,
            scratch: vec![0; buffer_frames * channels],
            halted: false,
        };

        for _ in 0..buffer_count {
            let buffer = Arc::new(BufferHandle::new(Arc::clone(&context)));
            state.fill_buffer(&buffer)?;
            state.source.queue_buffer(buffer)?;
        }
        state.source.play();
        state.params.mark_started();

        debug!(
            "Stream voice on source {} pre-rolled {} x {} frames from {:?}",
            state.source.id(),
            buffer_count,
            buffer_frames,
            initial_position
        );

        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// Recycle at most one processed buffer.
    ///
    /// No-op while paused, and once stopped unless looping.
    pub fn update(&self) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.params.paused || state.halted {
            return Ok(());
        }
        if state.is_stopped() && !state.params.looping {
            return Ok(());
        }

        let processed = state.source.processed();
        if processed >= state.buffer_count {
            warn!(
                "Lost stream sync on source {}: {} of {} buffers processed",
                state.source.id(),
                processed,
                state.buffer_count
            );
        }
        if processed == 0 {
            return Ok(());
        }

        let Some(buffer) = state.source.unqueue_buffer()? else {
            return Ok(());
        };

        if state.fill_buffer(&buffer)? {
            state.source.queue_buffer(buffer)?;
            if state.source.is_stopped() {
                warn!("Stream underrun on source {}, restarting", state.source.id());
                state.source.play();
            }
        }
        Ok(())
    }

    /// Platform stopped and no buffers left in the ring
    pub fn is_stopped(&self) -> bool {
        self.state.lock().is_stopped()
    }

    /// Start or resume playback
    pub fn play(&self) {
        let mut state = self.state.lock();
        state.halted = false;
        state.params.mark_paused(false);
        state.source.play();
    }

    /// Stop playback; `update` will not restart the voice until `play`.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.halted = true;
        state.source.stop();
    }

    pub fn set_looping(&self, looping: bool) {
        self.state.lock().params.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.state.lock().params.looping
    }

    pub fn buffer_count(&self) -> usize {
        self.state.lock().buffer_count
    }

    pub fn buffer_frames(&self) -> usize {
        self.state.lock().buffer_frames
    }

    /// Buffers currently enqueued on the platform source
    pub fn queued_count(&self) -> usize {
        self.state.lock().source.queued_count()
    }

    pub fn source_id(&self) -> SourceId {
        self.state.lock().source.id()
    }

    /// Decode position of the underlying stream
    pub fn position(&self) -> Duration {
        self.state.lock().stream.position()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.state.lock().stream.duration()
    }
}

impl VoiceControl for StreamVoice {
    fn params(&self) -> VoiceParams {
        self.state.lock().params
    }

    fn set_local_gain(&self, gain: f32) {
        let mut state = self.state.lock();
        state.params.local_gain = gain;
        state.source.set_gain(state.params.effective_gain());
    }

    fn set_group_gain(&self, gain: f32) {
        let mut state = self.state.lock();
        state.params.group_gain = gain;
        state.source.set_gain(state.params.effective_gain());
    }

    fn set_pitch(&self, pitch: f32) {
        let mut state = self.state.lock();
        state.params.pitch = pitch;
        state.source.set_pitch(pitch);
    }

    fn set_paused(&self, paused: bool) {
        let mut state = self.state.lock();
        state.params.mark_paused(paused);
        if paused {
            state.source.pause();
        } else if !state.halted {
            state.source.play();
        }
    }

    fn set_direct_filter(&self, filter: Option<&FilterHandle>) {
        self.state.lock().source.set_direct_filter(filter);
    }
}

impl Drop for StreamVoice {
    fn drop(&mut self) {
        if let Err(e) = self.state.get_mut().source.gracefully_stop(TEARDOWN_POLL) {
            warn!("Stream voice teardown: {}", e);
        }
    }
}
