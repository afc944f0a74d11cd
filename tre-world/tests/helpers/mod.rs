//! Test helpers for tre-world integration tests
//!
//! - floor_data: word encoders for hand-written chunk lists
//! - recorders: camera and soundtrack doubles that log what triggers asked for
//! - levels: small level layouts

#![allow(dead_code)]

pub mod floor_data;
pub mod levels;
pub mod recorders;

pub use floor_data::{camera_word, command, header, request, sequence};
pub use levels::{build_world, room, single_room_level, TestWorld, PAD_X, PAD_Z};
pub use recorders::{CameraEvent, RecordingCamera, RecordingSoundtrack, SoundtrackEvent};
