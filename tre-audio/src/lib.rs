//! # TRE Audio Library (tre-audio)
//!
//! Streaming audio engine for the game runtime.
//!
//! **Pipeline:** symphonia demux/decode -> rubato resample -> bounded PCM queue
//! ([`AudioStreamDecoder`]) -> streaming voice ring ([`StreamVoice`]) ->
//! software mixer ([`platform::Context`]) -> cpal output.
//!
//! The [`Device`] owns the mixer context, a pool of voice slots for
//! one-shot sound effects, and a background thread that keeps every stream
//! voice fed.

pub mod decoder;
pub mod device;
pub mod error;
pub mod extensions;
pub mod handles;
pub mod output;
pub mod platform;
pub mod resampler;
pub mod stream_source;
pub mod stream_voice;
pub mod voice;
pub mod wav;

pub use decoder::{AudioStreamDecoder, QUEUE_LIMIT};
pub use device::{CallbackId, Device, SOURCE_HANDLE_SLOTS};
pub use error::{Error, Result};
pub use extensions::AudioExtensions;
pub use handles::{BufferHandle, FilterHandle, SourceHandle, StreamingSourceHandle};
pub use stream_source::{DecoderStreamSource, FileSection, StreamSource};
pub use stream_voice::StreamVoice;
pub use voice::{Voice, VoiceControl, VoiceParams};
