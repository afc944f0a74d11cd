//! Pathfinding boxes
//!
//! Boxes are axis-aligned X/Z regions used by the AI pathfinder. The core only
//! stores their zone ids and toggles the blocked flag when movable blocks
//! patch the floor; zone ids are opaque and selected by [`ZoneBox::zone_ref`].

/// Zone id set for one room arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZoneIds {
    pub fly: u16,
    pub ground1: u16,
    pub ground2: u16,
}

/// Which locomotion zone to look up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Fly,
    Ground1,
    Ground2,
}

/// A pathfinding box.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ZoneBox {
    pub xmin: i32,
    pub xmax: i32,
    pub zmin: i32,
    pub zmax: i32,
    pub floor: i32,
    /// Blocks may stand in this box
    pub blockable: bool,
    /// A block currently stands in this box
    pub blocked: bool,
    /// Zones with rooms in their normal arrangement
    pub zones: ZoneIds,
    /// Zones while rooms are swapped with their alternates
    pub swapped_zones: ZoneIds,
    /// Indices of boxes reachable from this one
    pub overlaps: Vec<usize>,
}

impl ZoneBox {
    pub fn zone_ref(&self, rooms_swapped: bool, kind: ZoneKind) -> u16 {
        let zones = if rooms_swapped {
            &self.swapped_zones
        } else {
            &self.zones
        };
        match kind {
            ZoneKind::Fly => zones.fly,
            ZoneKind::Ground1 => zones.ground1,
            ZoneKind::Ground2 => zones.ground2,
        }
    }

    pub fn contains(&self, x: i32, z: i32) -> bool {
        (self.xmin..=self.xmax).contains(&x) && (self.zmin..=self.zmax).contains(&z)
    }

    /// Nearest point inside the box
    pub fn clamp(&self, x: i32, z: i32) -> (i32, i32) {
        (
            x.clamp(self.xmin, self.xmax.max(self.xmin)),
            z.clamp(self.zmin, self.zmax.max(self.zmin)),
        )
    }

    pub fn overlaps_with(&self, other: usize) -> bool {
        self.overlaps.contains(&other)
    }
}
