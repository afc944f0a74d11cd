//! Audio device
//!
//! The [`Device`] owns the platform context, the cpal output, the pool of
//! voice slots, every live stream voice and a registry of deferred
//! callbacks. A background thread drains decoders into platform buffers by
//! calling [`Device::update_streams`] roughly every millisecond.
//!
//! Streams and callbacks live behind a recursive lock so a callback may call
//! back into the device (for example to remove its own stream).

use crate::error::Result;
use crate::handles::{BufferHandle, FilterHandle, SourceHandle};
use crate::output::AudioOutput;
use crate::platform::{platform_call, Context};
use crate::stream_source::StreamSource;
use crate::stream_voice::StreamVoice;
use crate::voice::{Voice, VoiceControl};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tre_common::{AudioSettings, FadeCurve};
use tracing::{debug, info, warn};

/// Default number of pooled voice slots
pub const SOURCE_HANDLE_SLOTS: usize = 32;

/// Identifier returned by [`Device::add_callback`]
pub type CallbackId = u64;

struct DeferredCallback {
    id: CallbackId,
    next_invoke: Instant,
    interval: Duration,
    /// Returns `true` once finished
    callback: Box<dyn FnMut() -> bool + Send>,
}

struct DeviceState {
    streams: Vec<Arc<StreamVoice>>,
    /// Registered buffer voices in registration order
    voices: VecDeque<Arc<Voice>>,
    free_sources: Vec<SourceHandle>,
    callbacks: Vec<DeferredCallback>,
    /// Callbacks taken out of `callbacks` for the current update
    running: Vec<CallbackId>,
    /// Removed while running; dropped instead of rescheduled
    cancelled: Vec<CallbackId>,
    underwater: bool,
}

struct Shared {
    context: Arc<Context>,
    state: ReentrantMutex<RefCell<DeviceState>>,
    underwater_filter: FilterHandle,
    update_interval: Duration,
    shutdown: AtomicBool,
    next_callback_id: AtomicU64,
}

impl Shared {
    fn update_streams(&self) {
        let guard = self.state.lock();

        // Clone the list so stream updates run without a RefCell borrow held
        let streams = guard.borrow().streams.clone();
        for stream in &streams {
            if let Err(e) = stream.update() {
                warn!("Stream update failed: {}", e);
            }
        }

        let now = Instant::now();
        let due: Vec<DeferredCallback> = {
            let mut state = guard.borrow_mut();
            let (due, pending): (Vec<DeferredCallback>, Vec<DeferredCallback>) = std::mem::take(&mut state.callbacks)
                .into_iter()
                .partition(|cb| cb.next_invoke <= now);
            state.callbacks = pending;
            state.running = due.iter().map(|cb| cb.id).collect();
            due
        };

        for mut cb in due {
            let done = (cb.callback)();

            let mut state = guard.borrow_mut();
            state.running.retain(|id| *id != cb.id);
            let cancelled = state.cancelled.contains(&cb.id);
            state.cancelled.retain(|id| *id != cb.id);
            if !done && !cancelled {
                cb.next_invoke = now + cb.interval;
                state.callbacks.push(cb);
            }
        }
    }

    /// Remove a callback, including one that is running right now.
    fn remove_callback(&self, id: CallbackId) -> bool {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let before = state.callbacks.len();
        state.callbacks.retain(|cb| cb.id != id);
        if state.callbacks.len() != before {
            return true;
        }
        if state.running.contains(&id) {
            if !state.cancelled.contains(&id) {
                state.cancelled.push(id);
            }
            return true;
        }
        false
    }

    fn run(self: Arc<Self>) {
        debug!(
            "Audio device thread started ({:?} interval)",
            self.update_interval
        );
        while !self.shutdown.load(Ordering::Acquire) {
            self.update_streams();
            std::thread::yield_now();
            std::thread::sleep(self.update_interval);
        }
        debug!("Audio device thread stopped");
    }
}

/// Audio device: platform context, voices, streams and the drain thread.
pub struct Device {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
    output: Option<AudioOutput>,
    settings: AudioSettings,
}

impl Device {
    /// Open the configured output and start the drain thread.
    ///
    /// If no output can be opened the device runs degraded: every platform
    /// call is a no-op and nothing is heard.
    pub fn new(settings: &AudioSettings) -> Self {
        let mut output = match AudioOutput::open(settings.device.as_deref()) {
            Ok(output) => Some(output),
            Err(e) => {
                warn!("No audio output available, running degraded: {}", e);
                None
            }
        };

        let context = match output.as_mut() {
            Some(out) => {
                let context = Arc::new(Context::new(out.sample_rate()));
                match out.start(Arc::clone(&context)) {
                    Ok(()) => {
                        info!(
                            "Audio output {} at {}Hz x{}",
                            out.device_name(),
                            out.sample_rate(),
                            out.channels()
                        );
                        context
                    }
                    Err(e) => {
                        warn!("Failed to start audio output, running degraded: {}", e);
                        output = None;
                        Arc::new(Context::degraded())
                    }
                }
            }
            None => Arc::new(Context::degraded()),
        };

        Self::build(context, output, settings, true)
    }

    /// Device with a live software mixer but no output and no drain thread.
    ///
    /// The caller drives [`Device::update_streams`] and [`Device::render`].
    pub fn headless(settings: &AudioSettings, output_rate: u32) -> Self {
        Self::build(Arc::new(Context::new(output_rate)), None, settings, false)
    }

    /// Device whose platform calls are all no-ops.
    pub fn degraded(settings: &AudioSettings) -> Self {
        Self::build(Arc::new(Context::degraded()), None, settings, false)
    }

    fn build(
        context: Arc<Context>,
        output: Option<AudioOutput>,
        settings: &AudioSettings,
        spawn_thread: bool,
    ) -> Self {
        platform_call!(context, set_listener_gain(settings.master_gain));

        let underwater_filter = FilterHandle::new(Arc::clone(&context));
        underwater_filter.set_lowpass(settings.underwater_gain, settings.underwater_gain_hf);

        let free_sources = (0..settings.source_slots)
            .map(|_| SourceHandle::new(Arc::clone(&context)))
            .collect();

        let shared = Arc::new(Shared {
            context,
            state: ReentrantMutex::new(RefCell::new(DeviceState {
                streams: Vec::new(),
                voices: VecDeque::new(),
                free_sources,
                callbacks: Vec::new(),
                running: Vec::new(),
                cancelled: Vec::new(),
                underwater: false,
            })),
            underwater_filter,
            update_interval: Duration::from_millis(settings.update_interval_ms),
            shutdown: AtomicBool::new(false),
            next_callback_id: AtomicU64::new(1),
        });

        let thread = if spawn_thread {
            let worker = Arc::clone(&shared);
            match std::thread::Builder::new()
                .name("tre-audio-streams".to_string())
                .spawn(move || worker.run())
            {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("Failed to spawn audio stream thread: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            shared,
            thread,
            output,
            settings: settings.clone(),
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.shared.context
    }

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    pub fn is_degraded(&self) -> bool {
        !self.shared.context.is_live()
    }

    /// Mix `out` from the platform context (headless devices).
    pub fn render(&self, out: &mut [f32], channels: usize) {
        self.shared.context.render(out, channels);
    }

    /// Drain every stream once and run due callbacks.
    pub fn update_streams(&self) {
        self.shared.update_streams();
    }

    /// Create a stream voice and register it with the drain thread.
    pub fn create_stream(
        &self,
        source: Box<dyn StreamSource>,
        buffer_frames: usize,
        buffer_count: usize,
        initial_position: Duration,
    ) -> Result<Arc<StreamVoice>> {
        let stream = Arc::new(StreamVoice::new(
            Arc::clone(&self.shared.context),
            source,
            buffer_frames,
            buffer_count,
            initial_position,
        )?);

        let guard = self.shared.state.lock();
        let mut state = guard.borrow_mut();
        if state.underwater {
            stream.set_direct_filter(Some(&self.shared.underwater_filter));
        }
        state.streams.push(Arc::clone(&stream));
        debug!("Registered stream on source {}", stream.source_id());
        Ok(stream)
    }

    /// Create a stream voice using the configured ring geometry.
    pub fn create_default_stream(
        &self,
        source: Box<dyn StreamSource>,
        initial_position: Duration,
    ) -> Result<Arc<StreamVoice>> {
        self.create_stream(
            source,
            self.settings.stream_buffer_frames,
            self.settings.stream_buffer_count,
            initial_position,
        )
    }

    /// Unregister a stream; it is torn down when the last reference drops.
    pub fn remove_stream(&self, stream: &Arc<StreamVoice>) {
        let guard = self.shared.state.lock();
        guard
            .borrow_mut()
            .streams
            .retain(|s| !Arc::ptr_eq(s, stream));
    }

    pub fn stream_count(&self) -> usize {
        self.shared.state.lock().borrow().streams.len()
    }

    pub fn create_buffer(&self) -> Arc<BufferHandle> {
        Arc::new(BufferHandle::new(Arc::clone(&self.shared.context)))
    }

    /// Register a buffer voice; it starts as soon as a slot is free.
    pub fn register_voice(&self, voice: Arc<Voice>) {
        let guard = self.shared.state.lock();
        let mut state = guard.borrow_mut();
        if let Some(source) = state.free_sources.pop() {
            let filter = state.underwater.then_some(&self.shared.underwater_filter);
            voice.attach(source, filter);
        }
        state.voices.push_back(voice);
    }

    pub fn voice_count(&self) -> usize {
        self.shared.state.lock().borrow().voices.len()
    }

    pub fn free_slot_count(&self) -> usize {
        self.shared.state.lock().borrow().free_sources.len()
    }

    /// Main-thread housekeeping.
    ///
    /// Reclaims slots of stopped voices, then hands free slots to detached
    /// voices in registration order. Also restarts a failed output stream.
    pub fn update(&mut self) {
        {
            let guard = self.shared.state.lock();
            let mut state = guard.borrow_mut();
            let state = &mut *state;

            let underwater = state.underwater;
            let free_sources = &mut state.free_sources;
            state.voices.retain(|voice| {
                if !voice.is_stopped() {
                    return true;
                }
                if let Some(source) = voice.detach() {
                    free_sources.push(source);
                }
                false
            });

            let filter = underwater.then_some(&self.shared.underwater_filter);
            for voice in state.voices.iter().filter(|v| !v.is_attached()) {
                let Some(source) = state.free_sources.pop() else {
                    break;
                };
                voice.attach(source, filter);
            }
        }

        if let Some(output) = self.output.as_mut() {
            if output.has_error() {
                if let Err(e) = output.try_recover(Arc::clone(&self.shared.context)) {
                    warn!("Audio output recovery failed: {}", e);
                }
            }
        }
    }

    /// Register a callback invoked from the drain thread.
    ///
    /// The first call happens on the next update; afterwards it is invoked
    /// every `interval` until it returns `true`.
    pub fn add_callback<F>(&self, interval: Duration, callback: F) -> CallbackId
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let id = self.shared.next_callback_id.fetch_add(1, Ordering::Relaxed);
        let guard = self.shared.state.lock();
        guard.borrow_mut().callbacks.push(DeferredCallback {
            id,
            next_invoke: Instant::now(),
            interval,
            callback: Box::new(callback),
        });
        id
    }

    /// Unregister a callback.
    ///
    /// A callback removed while it runs finishes its current call and is not
    /// invoked again.
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.shared.remove_callback(id)
    }

    pub fn callback_count(&self) -> usize {
        self.shared.state.lock().borrow().callbacks.len()
    }

    /// Fade a voice's local gain to `target` over `duration`.
    pub fn fade_gain(
        &self,
        voice: Arc<dyn VoiceControl>,
        target: f32,
        curve: FadeCurve,
        duration: Duration,
    ) -> CallbackId {
        let from = voice.local_gain();
        let start = Instant::now();
        self.add_callback(self.shared.update_interval, move || {
            let position = if duration.is_zero() {
                1.0
            } else {
                start.elapsed().as_secs_f32() / duration.as_secs_f32()
            };
            if position >= 1.0 {
                voice.set_local_gain(target);
                return true;
            }
            voice.set_local_gain(curve.gain_at(from, target, position));
            false
        })
    }

    /// Apply or remove the underwater low-pass on every source.
    pub fn set_underwater(&self, underwater: bool) {
        let guard = self.shared.state.lock();
        let mut state = guard.borrow_mut();
        if state.underwater == underwater {
            return;
        }
        state.underwater = underwater;

        let filter = underwater.then_some(&self.shared.underwater_filter);
        for stream in &state.streams {
            stream.set_direct_filter(filter);
        }
        for voice in &state.voices {
            voice.set_direct_filter(filter);
        }
        debug!("Underwater filter {}", if underwater { "on" } else { "off" });
    }

    pub fn is_underwater(&self) -> bool {
        self.shared.state.lock().borrow().underwater
    }

    pub fn set_listener_gain(&self, gain: f32) {
        platform_call!(self.shared.context, set_listener_gain(gain));
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Audio stream thread panicked");
            }
        }

        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.stop() {
                warn!("Failed to stop audio output: {}", e);
            }
        }

        let guard = self.shared.state.lock();
        let mut state = guard.borrow_mut();
        state.callbacks.clear();
        state.streams.clear();
        for voice in std::mem::take(&mut state.voices) {
            voice.detach();
        }
        state.free_sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(slots: usize) -> AudioSettings {
        AudioSettings {
            source_slots: slots,
            ..AudioSettings::default()
        }
    }

    #[test]
    fn test_callback_runs_until_done() {
        let device = Device::headless(&settings(0), 100);
        let counter = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&counter);
        device.add_callback(Duration::ZERO, move || seen.fetch_add(1, Ordering::SeqCst) >= 2);

        for _ in 0..5 {
            device.update_streams();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(device.callback_count(), 0);
    }

    #[test]
    fn test_callback_waits_for_interval() {
        let device = Device::headless(&settings(0), 100);
        let counter = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&counter);
        let id = device.add_callback(Duration::from_secs(3600), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            false
        });

        device.update_streams();
        device.update_streams();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(device.remove_callback(id));
        assert_eq!(device.callback_count(), 0);
    }

    #[test]
    fn test_callback_removed_while_running_is_dropped() {
        let device = Device::headless(&settings(0), 100);
        let shared = Arc::downgrade(&device.shared);
        let own_id = Arc::new(AtomicU64::new(0));
        let id_slot = Arc::clone(&own_id);
        let removed = Arc::new(AtomicBool::new(false));
        let removed_flag = Arc::clone(&removed);
        let calls = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&calls);

        let id = device.add_callback(Duration::ZERO, move || {
            seen.fetch_add(1, Ordering::SeqCst);
            if let Some(shared) = shared.upgrade() {
                let ok = shared.remove_callback(id_slot.load(Ordering::SeqCst));
                removed_flag.store(ok, Ordering::SeqCst);
            }
            false
        });
        own_id.store(id, Ordering::SeqCst);

        device.update_streams();
        device.update_streams();

        assert!(removed.load(Ordering::SeqCst));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(device.callback_count(), 0);
        assert!(!device.remove_callback(id));
    }

    #[test]
    fn test_degraded_device_is_inert() {
        let device = Device::degraded(&settings(4));
        assert!(device.is_degraded());
        device.set_listener_gain(0.5);
        device.set_underwater(true);
        device.update_streams();
    }
}
