//! # TRE World Library (tre-world)
//!
//! Floor data trigger engine and flip map room swapping.
//!
//! **Flow:** the player (or a heavy object) enters a sector ->
//! [`World::handle_sector_triggers`] walks the sector's floor data chunks ->
//! conditions fire switches, keyholes and pickups -> commands activate
//! objects, switch cameras, play tracks, count secrets and queue a room
//! swap -> [`World::swap_all_rooms`] exchanges rooms with their alternates.
//!
//! Rendering, AI and music playback sit behind the [`CameraController`] and
//! [`Soundtrack`] traits and the [`tre_audio::VoiceControl`] handles of
//! static sound effects.

pub mod box_data;
pub mod camera;
pub mod error;
pub mod floordata;
pub mod object;
pub mod player;
pub mod room;
pub mod room_swap;
pub mod sector;
pub mod soundtrack;
pub mod triggers;
pub mod world;

pub use box_data::{ZoneBox, ZoneIds, ZoneKind};
pub use camera::{CameraController, CameraMode, CameraRequest, CameraSink, TriggerCamera};
pub use error::{Error, Result};
pub use floordata::{
    ActivationState, CameraParameters, ChunkHeader, ChunkType, Command, CommandOpcode, FloorData,
    FloorDataCursor, SequenceCondition, FULL_ACTIVATION,
};
pub use object::{BlockLike, Object, ObjectId, ObjectKind, ObjectState, Position, TriggerState};
pub use player::{HandStatus, Player, UnderwaterRoute, SECRET_SLOTS};
pub use room::{NodeId, Room, StaticMesh};
pub use sector::{Sector, INVALID_HEIGHT, SECTOR_SIZE};
pub use soundtrack::{Soundtrack, TrackId, TrackTriggers};
pub use triggers::ConditionOutcome;
pub use world::{Level, StaticSoundEffect, StaticSoundMode, World, FLIP_SLOTS, MAX_CREATURE_SLOTS};
