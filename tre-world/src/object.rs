//! Level objects and their trigger state
//!
//! Object behaviour the trigger engine cares about is selected through the
//! closed [`ObjectKind`] enum: switches, keyholes and pickups answer the
//! condition checks, blocks patch the floor, AI agents need creature slots.

use crate::floordata::ActivationState;
use crate::room::NodeId;

/// Object reference as stored in floor data
pub type ObjectId = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerState {
    #[default]
    Inactive,
    Active,
    Deactivated,
    Invisible,
}

/// Movable block variants and the floor patch they apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLike {
    Block,
    TallBlock,
}

impl BlockLike {
    /// Height the block raises the floor by, in world units
    pub fn height(self) -> i32 {
        match self {
            BlockLike::Block => 1024,
            BlockLike::TallBlock => 2048,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Generic,
    Switch,
    Keyhole,
    Pickup,
    Block,
    TallBlock,
    AiAgent,
}

impl ObjectKind {
    pub fn as_block_like(self) -> Option<BlockLike> {
        match self {
            ObjectKind::Block => Some(BlockLike::Block),
            ObjectKind::TallBlock => Some(BlockLike::TallBlock),
            _ => None,
        }
    }

    pub fn is_ai_agent(self) -> bool {
        self == ObjectKind::AiAgent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Mutable per-object simulation state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectState {
    pub trigger_state: TriggerState,
    pub activation: ActivationState,
    /// Countdown in frames set by the last activation
    pub timer: u32,
    /// Collision mesh bits touched by the player this frame
    pub touch_bits: u32,
    pub room: usize,
    pub position: Position,
    /// Switch lever position; only meaningful for switches
    pub switch_on: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub state: ObjectState,
    /// In the active list
    pub is_active: bool,
    /// Spawned at runtime rather than placed by the level
    pub dynamic: bool,
    /// Render node this object is attached to
    pub parent_node: NodeId,
    /// Holds one of the world's creature slots
    pub has_creature: bool,
}

impl Object {
    pub fn new(id: ObjectId, kind: ObjectKind, room: usize, position: Position) -> Self {
        Self {
            id,
            kind,
            state: ObjectState {
                room,
                position,
                ..ObjectState::default()
            },
            is_active: false,
            dynamic: false,
            parent_node: 0,
            has_creature: false,
        }
    }

    /// Builder-style trigger state for level setup
    pub fn with_trigger_state(mut self, state: TriggerState) -> Self {
        self.state.trigger_state = state;
        self
    }

    pub fn with_dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    /// Switch condition check.
    ///
    /// Only a switch that has finished its animation (Deactivated) fires. A
    /// switch left in the off position with a timeout re-arms itself for that
    /// many frames; otherwise it returns to Inactive.
    pub fn trigger_switch(&mut self, timeout_frames: u32) -> bool {
        if self.state.trigger_state != TriggerState::Deactivated {
            return false;
        }
        if !self.state.switch_on && timeout_frames > 0 {
            self.state.timer = timeout_frames;
            self.state.trigger_state = TriggerState::Active;
        } else {
            self.state.trigger_state = TriggerState::Inactive;
            self.is_active = false;
        }
        true
    }

    /// Keyhole condition check; fires once after a key was used.
    pub fn trigger_key(&mut self, hands_busy: bool) -> bool {
        if self.state.trigger_state != TriggerState::Active || hands_busy {
            return false;
        }
        self.state.trigger_state = TriggerState::Deactivated;
        true
    }

    /// Pickup condition check; fires once after the item was collected.
    pub fn trigger_pickup(&mut self) -> bool {
        if self.state.trigger_state != TriggerState::Invisible {
            return false;
        }
        self.state.trigger_state = TriggerState::Deactivated;
        true
    }
}
