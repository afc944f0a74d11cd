//! Playback voices
//!
//! A [`Voice`] plays one fully decoded buffer through a pooled source slot.
//! The device may detach a voice from its slot when the pool is exhausted;
//! a detached voice keeps its parameters and resumes once a slot frees up.

use crate::handles::{BufferHandle, FilterHandle, SourceHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Per-voice playback parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    pub local_gain: f32,
    /// Gain of the group (music, effects) the voice belongs to
    pub group_gain: f32,
    pub pitch: f32,
    pub looping: bool,
    pub paused: bool,
    pub started_at: Option<Instant>,
    pub paused_at: Option<Instant>,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            local_gain: 1.0,
            group_gain: 1.0,
            pitch: 1.0,
            looping: false,
            paused: false,
            started_at: None,
            paused_at: None,
        }
    }
}

impl VoiceParams {
    pub fn effective_gain(&self) -> f32 {
        (self.local_gain * self.group_gain).max(0.0)
    }

    pub(crate) fn mark_paused(&mut self, paused: bool) {
        if paused == self.paused {
            return;
        }
        self.paused = paused;
        self.paused_at = paused.then(Instant::now);
    }

    pub(crate) fn mark_started(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }
}

/// Control surface shared by buffer and stream voices.
pub trait VoiceControl: Send + Sync {
    fn params(&self) -> VoiceParams;

    fn set_local_gain(&self, gain: f32);

    fn set_group_gain(&self, gain: f32);

    fn set_pitch(&self, pitch: f32);

    fn set_paused(&self, paused: bool);

    fn set_direct_filter(&self, filter: Option<&FilterHandle>);

    fn local_gain(&self) -> f32 {
        self.params().local_gain
    }

    fn is_paused(&self) -> bool {
        self.params().paused
    }
}

struct VoiceState {
    params: VoiceParams,
    source: Option<SourceHandle>,
    /// Stopped by the caller; the slot (if any) is reclaimed on next update
    stopped: bool,
}

/// A voice playing a single static buffer.
pub struct Voice {
    buffer: Arc<BufferHandle>,
    state: Mutex<VoiceState>,
}

impl Voice {
    pub fn new(buffer: Arc<BufferHandle>) -> Self {
        Self::with_params(buffer, VoiceParams::default())
    }

    pub fn with_params(buffer: Arc<BufferHandle>, params: VoiceParams) -> Self {
        Self {
            buffer,
            state: Mutex::new(VoiceState {
                params,
                source: None,
                stopped: false,
            }),
        }
    }

    pub fn buffer(&self) -> &Arc<BufferHandle> {
        &self.buffer
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().source.is_some()
    }

    /// Give the voice a source slot and start it unless paused.
    pub fn attach(&self, source: SourceHandle, filter: Option<&FilterHandle>) {
        let mut state = self.state.lock();
        source.set_buffer(Some(&self.buffer));
        source.set_gain(state.params.effective_gain());
        source.set_pitch(state.params.pitch);
        source.set_looping(state.params.looping);
        source.set_direct_filter(filter);
        if !state.params.paused && !state.stopped {
            source.play();
            state.params.mark_started();
        }
        trace!("Voice attached to source {}", source.id());
        state.source = Some(source);
    }

    /// Take the source slot back, leaving the voice detached.
    pub fn detach(&self) -> Option<SourceHandle> {
        let source = self.state.lock().source.take()?;
        source.stop();
        source.set_buffer(None);
        source.set_direct_filter(None);
        source.rewind();
        Some(source)
    }

    pub fn play(&self) {
        let mut state = self.state.lock();
        state.stopped = false;
        state.params.mark_paused(false);
        if let Some(source) = &state.source {
            source.play();
        }
        state.params.mark_started();
    }

    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        if let Some(source) = &state.source {
            source.stop();
        }
    }

    pub fn set_looping(&self, looping: bool) {
        let mut state = self.state.lock();
        state.params.looping = looping;
        if let Some(source) = &state.source {
            source.set_looping(looping);
        }
    }

    /// Finished playing (or stopped by the caller) and not merely paused
    pub fn is_stopped(&self) -> bool {
        let state = self.state.lock();
        if state.stopped {
            return true;
        }
        match &state.source {
            Some(source) => !state.params.paused && source.is_stopped(),
            None => false,
        }
    }
}

impl VoiceControl for Voice {
    fn params(&self) -> VoiceParams {
        self.state.lock().params
    }

    fn set_local_gain(&self, gain: f32) {
        let mut state = self.state.lock();
        state.params.local_gain = gain;
        if let Some(source) = &state.source {
            source.set_gain(state.params.effective_gain());
        }
    }

    fn set_group_gain(&self, gain: f32) {
        let mut state = self.state.lock();
        state.params.group_gain = gain;
        if let Some(source) = &state.source {
            source.set_gain(state.params.effective_gain());
        }
    }

    fn set_pitch(&self, pitch: f32) {
        let mut state = self.state.lock();
        state.params.pitch = pitch;
        if let Some(source) = &state.source {
            source.set_pitch(pitch);
        }
    }

    fn set_paused(&self, paused: bool) {
        let mut state = self.state.lock();
        state.params.mark_paused(paused);
        if let Some(source) = &state.source {
            if paused {
                source.pause();
            } else if !state.stopped {
                source.play();
            }
        }
    }

    fn set_direct_filter(&self, filter: Option<&FilterHandle>) {
        if let Some(source) = &self.state.lock().source {
            source.set_direct_filter(filter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Context, SourceState};

    fn setup(frames: usize) -> (Arc<Context>, Voice) {
        let ctx = Arc::new(Context::new(100));
        let buffer = Arc::new(BufferHandle::new(Arc::clone(&ctx)));
        buffer.fill(&vec![8000; frames], frames, 1, 100);
        (ctx, Voice::new(buffer))
    }

    #[test]
    fn test_detached_voice_keeps_params() {
        let (ctx, voice) = setup(10);
        voice.set_local_gain(0.5);
        voice.set_paused(true);
        assert!(!voice.is_attached());
        assert!(!voice.is_stopped());

        voice.attach(SourceHandle::new(Arc::clone(&ctx)), None);
        let source = voice.detach().unwrap();
        assert_eq!(voice.params().local_gain, 0.5);
        assert!(voice.params().paused);
        assert_eq!(source.state(), SourceState::Initial);
    }

    #[test]
    fn test_attach_applies_gain_and_plays() {
        let (ctx, voice) = setup(10);
        voice.set_local_gain(0.5);
        voice.set_group_gain(0.5);
        let source = SourceHandle::new(Arc::clone(&ctx));
        let id = source.id();
        voice.attach(source, None);

        assert_eq!(ctx.source_gain(id).unwrap(), 0.25);
        assert_eq!(ctx.source_state(id).unwrap(), SourceState::Playing);
        assert!(voice.params().started_at.is_some());
    }

    #[test]
    fn test_voice_stops_at_buffer_end() {
        let (ctx, voice) = setup(4);
        voice.attach(SourceHandle::new(Arc::clone(&ctx)), None);
        let mut out = [0.0f32; 8];
        ctx.render(&mut out, 1);
        assert!(voice.is_stopped());
    }

    #[test]
    fn test_paused_voice_is_not_stopped() {
        let (ctx, voice) = setup(4);
        voice.attach(SourceHandle::new(Arc::clone(&ctx)), None);
        voice.set_paused(true);
        let mut out = [0.0f32; 8];
        ctx.render(&mut out, 1);
        assert!(!voice.is_stopped());
        assert!(voice.params().paused_at.is_some());
    }
}
