//! Room grid cells

/// World units per sector edge
pub const SECTOR_SIZE: i32 = 1024;

/// Floor height marking a sector without walkable floor
pub const INVALID_HEIGHT: i32 = -127 * 256;

/// One cell of a room's sector grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    /// Owning room; re-derived by `World::connect_sectors`
    pub room: usize,
    pub box_index: Option<usize>,
    pub room_below: Option<usize>,
    pub room_above: Option<usize>,
    /// Room reached through this sector's portal chunk
    pub portal_target: Option<usize>,
    pub floor_height: i32,
    pub ceiling_height: i32,
    /// Offset of this sector's chunk list in the floor data
    pub floor_data: Option<usize>,
}

impl Default for Sector {
    fn default() -> Self {
        Self {
            room: 0,
            box_index: None,
            room_below: None,
            room_above: None,
            portal_target: None,
            floor_height: INVALID_HEIGHT,
            ceiling_height: INVALID_HEIGHT,
            floor_data: None,
        }
    }
}

impl Sector {
    pub fn has_floor(&self) -> bool {
        self.floor_height != INVALID_HEIGHT
    }

    /// Move the floor by `delta` world units.
    ///
    /// A sector without floor gets one at `ceiling + delta`; a floor that
    /// reaches the ceiling becomes invalid.
    pub fn patch_floor(&mut self, delta: i32) {
        if self.floor_height == INVALID_HEIGHT {
            self.floor_height = self.ceiling_height + delta;
        } else {
            self.floor_height += delta;
            if self.floor_height == self.ceiling_height {
                self.floor_height = INVALID_HEIGHT;
            }
        }
    }
}
