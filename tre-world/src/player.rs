//! Player state touched by triggers

use crate::object::Position;

/// Number of secrets trackable per level
pub const SECRET_SLOTS: u16 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandStatus {
    #[default]
    Free,
    Busy,
    Combat,
}

/// Target an underwater current drags the player towards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnderwaterRoute {
    pub box_index: usize,
    pub target: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub room: usize,
    pub position: Position,
    /// Height of the floor under the player
    pub floor_height: i32,
    pub hit_points: i32,
    pub burning: bool,
    pub hand_status: HandStatus,
    /// One bit per secret already found
    pub secrets_found: u16,
    pub secret_count: u32,
    pub underwater_route: Option<UnderwaterRoute>,
    pub current_strength: i32,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            room: 0,
            position: Position::default(),
            floor_height: 0,
            hit_points: 1000,
            burning: false,
            hand_status: HandStatus::Free,
            secrets_found: 0,
            secret_count: 0,
            underwater_route: None,
            current_strength: 0,
        }
    }
}

impl Player {
    pub fn is_on_ground(&self) -> bool {
        self.position.y == self.floor_height
    }

    pub fn is_alive(&self) -> bool {
        self.hit_points > 0
    }

    /// Set the player on fire; no effect once dead or already burning.
    pub fn burn_if_alive(&mut self) {
        if !self.is_alive() || self.burning {
            return;
        }
        self.burning = true;
        self.hit_points = -1;
    }
}
