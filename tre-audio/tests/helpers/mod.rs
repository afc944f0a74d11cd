//! Test helper modules for tre-audio integration tests
//!
//! - audio_generator: deterministic WAV fixtures written with hound
//! - sources: synthetic `StreamSource` implementations

#![allow(dead_code)]

pub mod audio_generator;
pub mod sources;

pub use audio_generator::{generate_ramp_wav, generate_sine_wav, ramp_sample, wav_bytes};
pub use sources::CountingSource;
