//! World state
//!
//! [`World`] owns everything the trigger engine and room swaps mutate: rooms,
//! boxes, floor data, objects, the player and the flip map state. The engine
//! itself lives in `triggers.rs` and `room_swap.rs`.

use crate::box_data::ZoneBox;
use crate::camera::{CameraController, CameraSink};
use crate::error::{Error, Result};
use crate::floordata::{ActivationState, FloorData};
use crate::object::{Object, ObjectId};
use crate::player::Player;
use crate::room::Room;
use crate::soundtrack::{Soundtrack, TrackTriggers};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use tre_audio::VoiceControl;

/// Number of flip map slots
pub const FLIP_SLOTS: usize = 10;

/// Number of AI agents that can think at once
pub const MAX_CREATURE_SLOTS: usize = 5;

/// Room arrangement a static sound effect is audible in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticSoundMode {
    Always,
    NormalOnly,
    SwappedOnly,
}

impl StaticSoundMode {
    pub fn is_audible(self, rooms_swapped: bool) -> bool {
        match self {
            StaticSoundMode::Always => true,
            StaticSoundMode::NormalOnly => !rooms_swapped,
            StaticSoundMode::SwappedOnly => rooms_swapped,
        }
    }
}

/// Looping ambient sound placed in the level
pub struct StaticSoundEffect {
    pub voice: Arc<dyn VoiceControl>,
    pub mode: StaticSoundMode,
}

/// Loader output used to build a [`World`].
#[derive(Debug, Clone, Default)]
pub struct Level {
    pub rooms: Vec<Room>,
    pub boxes: Vec<ZoneBox>,
    pub floor_data: FloorData,
    pub camera_sinks: Vec<CameraSink>,
    pub objects: Vec<Object>,
}

pub struct World {
    pub(crate) rooms: Vec<Room>,
    pub(crate) boxes: Vec<ZoneBox>,
    pub(crate) floor_data: FloorData,
    pub(crate) camera_sinks: Vec<CameraSink>,
    pub(crate) objects: BTreeMap<ObjectId, Object>,
    pub(crate) player: Player,
    pub(crate) camera: Box<dyn CameraController>,
    pub(crate) soundtrack: Box<dyn Soundtrack>,
    pub(crate) track_triggers: TrackTriggers,
    pub(crate) flip_states: [ActivationState; FLIP_SLOTS],
    pub(crate) rooms_swapped: bool,
    pub(crate) active_flip_effect: Option<u16>,
    pub(crate) level_finished: bool,
    pub(crate) static_sounds: Vec<StaticSoundEffect>,
    pub(crate) creature_slots_used: usize,
}

impl World {
    /// Build a world from loaded level data.
    ///
    /// Derives sector ownership and portals, then places every object,
    /// patching the floor under movable blocks.
    ///
    /// # Errors
    /// Corrupt floor data, or objects or alternate rooms referencing rooms
    /// that do not exist.
    pub fn new(
        level: Level,
        camera: Box<dyn CameraController>,
        soundtrack: Box<dyn Soundtrack>,
    ) -> Result<Self> {
        let Level {
            rooms,
            boxes,
            floor_data,
            camera_sinks,
            objects,
        } = level;

        for room in &rooms {
            if let Some(alternate) = room.alternate_room {
                if alternate >= rooms.len() {
                    return Err(Error::InvalidRoom(alternate));
                }
            }
        }

        let mut world = Self {
            rooms,
            boxes,
            floor_data,
            camera_sinks,
            objects: BTreeMap::new(),
            player: Player::default(),
            camera,
            soundtrack,
            track_triggers: TrackTriggers::new(),
            flip_states: [ActivationState::default(); FLIP_SLOTS],
            rooms_swapped: false,
            active_flip_effect: None,
            level_finished: false,
            static_sounds: Vec::new(),
            creature_slots_used: 0,
        };
        world.connect_sectors()?;
        for object in objects {
            world.add_object(object)?;
        }

        debug!(
            "World built: {} rooms, {} boxes, {} objects, {} floor data words",
            world.rooms.len(),
            world.boxes.len(),
            world.objects.len(),
            world.floor_data.len()
        );
        Ok(world)
    }

    /// Place an object, attaching it to its room's node.
    ///
    /// Level-placed blocks raise the floor under them.
    pub fn add_object(&mut self, mut object: Object) -> Result<()> {
        let room = object.state.room;
        object.parent_node = self.rooms.get(room).ok_or(Error::InvalidRoom(room))?.node;

        if !object.dynamic {
            if let Some(block) = object.kind.as_block_like() {
                let position = object.state.position;
                self.patch_floor(room, position.x, position.z, -block.height());
            }
        }
        if let Some(previous) = self.objects.insert(object.id, object) {
            warn!("Object {} replaced", previous.id);
        }
        Ok(())
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room(&self, index: usize) -> Option<&Room> {
        self.rooms.get(index)
    }

    pub fn boxes(&self) -> &[ZoneBox] {
        &self.boxes
    }

    pub fn floor_data(&self) -> &FloorData {
        &self.floor_data
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn camera(&self) -> &dyn CameraController {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> &mut dyn CameraController {
        self.camera.as_mut()
    }

    pub fn track_triggers(&self) -> &TrackTriggers {
        &self.track_triggers
    }

    pub fn flip_state(&self, slot: usize) -> Option<&ActivationState> {
        self.flip_states.get(slot)
    }

    /// Flip map slot for direct edits, such as restoring a saved game
    pub fn flip_state_mut(&mut self, slot: usize) -> Option<&mut ActivationState> {
        self.flip_states.get_mut(slot)
    }

    pub fn rooms_swapped(&self) -> bool {
        self.rooms_swapped
    }

    /// Flip effect started by the last room swap
    pub fn active_flip_effect(&self) -> Option<u16> {
        self.active_flip_effect
    }

    pub fn clear_flip_effect(&mut self) {
        self.active_flip_effect = None;
    }

    pub fn level_finished(&self) -> bool {
        self.level_finished
    }

    pub fn creature_slots_used(&self) -> usize {
        self.creature_slots_used
    }

    /// Register an ambient sound and pause it if it is not audible now.
    pub fn add_static_sound(&mut self, voice: Arc<dyn VoiceControl>, mode: StaticSoundMode) {
        voice.set_paused(!mode.is_audible(self.rooms_swapped));
        self.static_sounds.push(StaticSoundEffect { voice, mode });
    }

    pub(crate) fn update_static_sounds(&self) {
        for effect in &self.static_sounds {
            effect.voice.set_paused(!effect.mode.is_audible(self.rooms_swapped));
        }
    }

    /// Take an object out of the active list, releasing its creature slot.
    pub fn deactivate_object(&mut self, id: ObjectId) -> Result<()> {
        let object = self.objects.get_mut(&id).ok_or(Error::MissingObject(id))?;
        object.is_active = false;
        object.state.trigger_state = crate::object::TriggerState::Deactivated;
        if object.has_creature {
            object.has_creature = false;
            self.creature_slots_used = self.creature_slots_used.saturating_sub(1);
        }
        Ok(())
    }

    /// Move the floor at `(x, z)` in `room` by `delta` and update box blocking.
    pub fn patch_floor(&mut self, room: usize, x: i32, z: i32, delta: i32) {
        let Some(sector) = self.rooms.get_mut(room).and_then(|r| r.sector_at_mut(x, z)) else {
            warn!("No sector at ({}, {}) in room {} to patch", x, z, room);
            return;
        };
        sector.patch_floor(delta);

        if let Some(zone_box) = sector.box_index.and_then(|b| self.boxes.get_mut(b)) {
            if zone_box.blockable {
                zone_box.blocked = delta < 0;
            }
        }
    }

    /// Re-derive each sector's owning room and portal target.
    pub fn connect_sectors(&mut self) -> Result<()> {
        let floor_data = self.floor_data.clone();
        for (index, room) in self.rooms.iter_mut().enumerate() {
            for sector in &mut room.sectors {
                sector.room = index;
                sector.portal_target = match sector.floor_data {
                    Some(offset) => floor_data.portal_target(offset)?,
                    None => None,
                };
            }
        }
        Ok(())
    }
}
