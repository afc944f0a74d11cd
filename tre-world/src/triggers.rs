//! Floor data trigger engine
//!
//! Runs the chunk list of the sector under the player (or under a heavy
//! object). A Death chunk is always handled first. The command sequence then
//! checks its condition, which for switches, keyholes and pickups consumes an
//! object word and fires that object's own trigger, and executes commands
//! until one is marked last. Room swaps requested by flip commands are
//! deferred until the whole list has run.

use crate::camera::{CameraMode, CameraRequest};
use crate::error::{Error, Result};
use crate::floordata::{
    ActivationState, CameraParameters, ChunkHeader, ChunkType, Command, CommandOpcode,
    FloorDataCursor, SequenceCondition,
};
use crate::object::{ObjectId, TriggerState};
use crate::player::{HandStatus, UnderwaterRoute, SECRET_SLOTS};
use crate::world::{World, FLIP_SLOTS, MAX_CREATURE_SLOTS};
use tracing::{debug, info, trace};

/// Result of a sequence condition check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditionOutcome {
    pub passed: bool,
    /// Switch conditions: the switch ended up in the off position
    pub switch_off: bool,
}

impl ConditionOutcome {
    fn from_bool(passed: bool) -> Self {
        Self {
            passed,
            switch_off: false,
        }
    }
}

impl World {
    /// Run the triggers of the sector at `(x, z)` in `room`.
    ///
    /// Follows rooms below until the sector that holds the floor.
    pub fn handle_sector_triggers(&mut self, room: usize, x: i32, z: i32, from_heavy: bool) -> Result<()> {
        let mut room_index = room;
        let mut sector = self
            .rooms
            .get(room_index)
            .ok_or(Error::InvalidRoom(room_index))?
            .sector_at(x, z);

        // Bounded by the room count so malformed links cannot loop forever
        for _ in 0..self.rooms.len() {
            let Some(below) = sector.and_then(|s| s.room_below) else {
                break;
            };
            room_index = below;
            sector = self
                .rooms
                .get(room_index)
                .ok_or(Error::InvalidRoom(room_index))?
                .sector_at(x, z);
        }

        let Some(offset) = sector.and_then(|s| s.floor_data) else {
            return Ok(());
        };
        match self.floor_data.locate_trigger_chunk(offset)? {
            Some(chunk) => self.handle_command_sequence(chunk, from_heavy),
            None => Ok(()),
        }
    }

    /// Interpret the trigger chunks starting at `offset`.
    ///
    /// `from_heavy` is set when an object rather than the player stands on
    /// the sector; only `ItemIsHere` sequences fire then.
    ///
    /// # Errors
    /// Corrupt floor data or references to missing objects, flip slots,
    /// secrets or camera sinks.
    pub fn handle_command_sequence(&mut self, offset: usize, from_heavy: bool) -> Result<()> {
        let floor_data = self.floor_data.clone();
        let mut cursor = floor_data.cursor(offset);

        let mut header_offset = offset;
        let mut header = ChunkHeader::from_word(cursor.read_word()?, offset)?;
        if header.chunk_type == ChunkType::Death {
            if !from_heavy && self.player.is_on_ground() {
                debug!("Death sector at floor data {}", offset);
                self.player.burn_if_alive();
            }
            if header.is_last {
                return Ok(());
            }
            header_offset = cursor.position();
            header = ChunkHeader::from_word(cursor.read_word()?, header_offset)?;
        }
        if header.chunk_type != ChunkType::CommandSequence {
            return Err(Error::corrupt(
                header_offset,
                format!("expected command sequence, found {:?}", header.chunk_type),
            ));
        }

        let request = ActivationState::from_word(cursor.read_word()?);
        let condition = header.sequence_condition;

        let outcome = if from_heavy {
            ConditionOutcome::from_bool(condition == SequenceCondition::ItemIsHere)
        } else {
            self.evaluate_condition(condition, &request, &mut cursor)?
        };
        if !outcome.passed {
            return Ok(());
        }

        let mut swap_rooms = false;
        let mut flip_effect = None;
        let mut look_at = None;

        loop {
            let mut command = Command::from_word(cursor.read_word()?);
            match command.opcode {
                CommandOpcode::Activate => {
                    self.activate_command(command.parameter, &request, condition)?;
                }
                CommandOpcode::SwitchCamera => {
                    let parameters = CameraParameters::from_word(cursor.read_word()?);
                    command.is_last = parameters.is_last;
                    self.camera.switch_camera(&CameraRequest {
                        camera: command.parameter,
                        parameters,
                        condition,
                        from_heavy,
                        switch_off: outcome.switch_off,
                    });
                }
                CommandOpcode::UnderwaterCurrent => self.underwater_current(command.parameter)?,
                CommandOpcode::FlipMap => {
                    let slot = flip_slot(command.parameter)?;
                    if !self.flip_states[slot].is_oneshot() {
                        let full = self.flip_map_command(slot, &request, condition)?;
                        swap_rooms |= full != self.rooms_swapped;
                    }
                }
                CommandOpcode::FlipOn => {
                    let full = self.flip_states[flip_slot(command.parameter)?].is_fully_activated();
                    swap_rooms |= full && !self.rooms_swapped;
                }
                CommandOpcode::FlipOff => {
                    let full = self.flip_states[flip_slot(command.parameter)?].is_fully_activated();
                    swap_rooms |= full && self.rooms_swapped;
                }
                CommandOpcode::LookAt => look_at = Some(command.parameter),
                CommandOpcode::EndLevel => {
                    info!("Level finished by trigger");
                    self.level_finished = true;
                }
                CommandOpcode::PlayTrack => {
                    self.track_triggers
                        .trigger(command.parameter, &request, condition, self.soundtrack.as_mut());
                }
                CommandOpcode::FlipEffect => flip_effect = Some(command.parameter),
                CommandOpcode::Secret => self.find_secret(command.parameter)?,
                CommandOpcode::Other(opcode) => trace!("Ignoring trigger opcode {}", opcode),
            }

            if command.is_last {
                break;
            }
        }

        if let Some(object) = look_at {
            if matches!(self.camera.mode(), CameraMode::Fixed | CameraMode::Heavy) {
                self.camera.set_look_at(object);
            }
        }

        if swap_rooms {
            self.swap_all_rooms()?;
            if let Some(effect) = flip_effect {
                debug!("Starting flip effect {}", effect);
                self.active_flip_effect = Some(effect);
            }
        }
        Ok(())
    }

    /// Check a sequence condition.
    ///
    /// Switch, key and pickup conditions consume the next word as an object
    /// id and run that object's trigger; the word is consumed whether or not
    /// the trigger fires.
    pub fn evaluate_condition(
        &mut self,
        condition: SequenceCondition,
        request: &ActivationState,
        cursor: &mut FloorDataCursor<'_>,
    ) -> Result<ConditionOutcome> {
        let outcome = match condition {
            SequenceCondition::LaraIsHere => ConditionOutcome::from_bool(true),
            SequenceCondition::LaraOnGround | SequenceCondition::LaraOnGroundInverted => {
                ConditionOutcome::from_bool(self.player.is_on_ground())
            }
            SequenceCondition::ItemActivated => {
                let id = read_object_id(cursor)?;
                let switch = self.objects.get_mut(&id).ok_or(Error::MissingObject(id))?;
                let passed = switch.trigger_switch(request.timeout_frames());
                ConditionOutcome {
                    passed,
                    switch_off: !switch.state.switch_on,
                }
            }
            SequenceCondition::KeyUsed => {
                let id = read_object_id(cursor)?;
                let hands_busy = self.player.hand_status == HandStatus::Busy;
                let keyhole = self.objects.get_mut(&id).ok_or(Error::MissingObject(id))?;
                ConditionOutcome::from_bool(keyhole.trigger_key(hands_busy))
            }
            SequenceCondition::ItemPickedUp => {
                let id = read_object_id(cursor)?;
                let pickup = self.objects.get_mut(&id).ok_or(Error::MissingObject(id))?;
                ConditionOutcome::from_bool(pickup.trigger_pickup())
            }
            SequenceCondition::LaraInCombatMode => {
                ConditionOutcome::from_bool(self.player.hand_status == HandStatus::Combat)
            }
            SequenceCondition::ItemIsHere | SequenceCondition::Dummy => ConditionOutcome::from_bool(false),
            SequenceCondition::Other(_) => ConditionOutcome::from_bool(true),
        };
        Ok(outcome)
    }

    /// Apply an activation request to an object.
    ///
    /// Order: combine bits, require full activation, honour one-shot, skip
    /// objects already active, then activate and clear touch bits.
    pub fn activate_command(
        &mut self,
        id: ObjectId,
        request: &ActivationState,
        condition: SequenceCondition,
    ) -> Result<()> {
        let object = self.objects.get_mut(&id).ok_or(Error::MissingObject(id))?;
        if object.state.activation.is_oneshot() {
            return Ok(());
        }

        object.state.timer = request.timeout_frames();
        object.state.activation.combine(request.activation_set(), condition);
        if !object.state.activation.is_fully_activated() {
            return Ok(());
        }
        if request.is_oneshot() {
            object.state.activation.set_oneshot(true);
        }
        if object.is_active {
            return Ok(());
        }

        if object.kind.is_ai_agent() {
            let slot_free = self.creature_slots_used < MAX_CREATURE_SLOTS;
            match object.state.trigger_state {
                TriggerState::Inactive => {
                    object.state.touch_bits = 0;
                    object.state.trigger_state = TriggerState::Active;
                    object.is_active = true;
                    if slot_free && !object.has_creature {
                        object.has_creature = true;
                        self.creature_slots_used += 1;
                    }
                }
                TriggerState::Invisible => {
                    object.state.touch_bits = 0;
                    object.is_active = true;
                    if slot_free && !object.has_creature {
                        object.has_creature = true;
                        self.creature_slots_used += 1;
                        object.state.trigger_state = TriggerState::Active;
                    }
                }
                TriggerState::Active | TriggerState::Deactivated => {}
            }
        } else {
            object.state.touch_bits = 0;
            object.state.trigger_state = TriggerState::Active;
            object.is_active = true;
        }
        trace!("Object {} activated ({:?})", id, object.state.trigger_state);
        Ok(())
    }

    /// Combine a request into a flip map slot.
    ///
    /// Returns whether the slot is fully activated afterwards. A one-shot
    /// slot is left untouched.
    pub fn flip_map_command(
        &mut self,
        slot: usize,
        request: &ActivationState,
        condition: SequenceCondition,
    ) -> Result<bool> {
        let state = self
            .flip_states
            .get_mut(slot)
            .ok_or(Error::BadFlipSlot(slot as u16))?;
        if state.is_oneshot() {
            return Ok(state.is_fully_activated());
        }

        state.combine(request.activation_set(), condition);
        let full = state.is_fully_activated();
        if full && request.is_oneshot() {
            state.set_oneshot(true);
        }
        Ok(full)
    }

    /// Point the player's underwater route at a camera sink.
    fn underwater_current(&mut self, sink_index: u16) -> Result<()> {
        let sink = *self
            .camera_sinks
            .get(usize::from(sink_index))
            .ok_or(Error::MissingCameraSink(sink_index))?;
        let zone_box = self.boxes.get(sink.box_index).ok_or(Error::InvalidBox(sink.box_index))?;

        let routed_here = self
            .player
            .underwater_route
            .is_some_and(|route| route.box_index == sink.box_index);
        if !routed_here {
            let (x, z) = zone_box.clamp(sink.position.x, sink.position.z);
            let mut target = sink.position;
            target.x = x;
            target.z = z;
            self.player.underwater_route = Some(UnderwaterRoute {
                box_index: sink.box_index,
                target,
            });
        }
        self.player.current_strength = 6 * i32::from(sink.strength);
        Ok(())
    }

    fn find_secret(&mut self, index: u16) -> Result<()> {
        if index >= SECRET_SLOTS {
            return Err(Error::BadSecretIndex(index));
        }
        let bit = 1u16 << index;
        if self.player.secrets_found & bit != 0 {
            return Ok(());
        }

        self.player.secrets_found |= bit;
        self.player.secret_count += 1;
        info!("Secret {} found ({} total)", index, self.player.secret_count);
        self.soundtrack.play_secret_jingle();
        Ok(())
    }
}

fn read_object_id(cursor: &mut FloorDataCursor<'_>) -> Result<ObjectId> {
    Ok(Command::from_word(cursor.read_word()?).parameter)
}

fn flip_slot(parameter: u16) -> Result<usize> {
    let slot = usize::from(parameter);
    if slot >= FLIP_SLOTS {
        return Err(Error::BadFlipSlot(parameter));
    }
    Ok(slot)
}
