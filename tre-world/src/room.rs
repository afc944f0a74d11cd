//! Rooms and their sector grids

use crate::sector::{Sector, SECTOR_SIZE};

/// Render scene node owned by a room
pub type NodeId = usize;

/// Static mesh placed in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticMesh {
    pub mesh_id: u16,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// A room slot.
///
/// Swapping with the alternate room exchanges everything except `visible`
/// and `alternate_room`, which belong to the slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Room {
    pub node: NodeId,
    pub visible: bool,
    pub alternate_room: Option<usize>,
    /// World X of the grid origin
    pub x: i32,
    /// World Z of the grid origin
    pub z: i32,
    pub sector_count_x: usize,
    pub sector_count_z: usize,
    /// Grid in X-major order
    pub sectors: Vec<Sector>,
    pub static_meshes: Vec<StaticMesh>,
    pub is_water: bool,
}

impl Room {
    /// Index of the sector under world position `(x, z)`
    pub fn sector_index(&self, x: i32, z: i32) -> Option<usize> {
        let sx = usize::try_from((x - self.x).div_euclid(SECTOR_SIZE)).ok()?;
        let sz = usize::try_from((z - self.z).div_euclid(SECTOR_SIZE)).ok()?;
        if sx >= self.sector_count_x || sz >= self.sector_count_z {
            return None;
        }
        let index = sx * self.sector_count_z + sz;
        (index < self.sectors.len()).then_some(index)
    }

    pub fn sector_at(&self, x: i32, z: i32) -> Option<&Sector> {
        self.sector_index(x, z).map(|i| &self.sectors[i])
    }

    pub fn sector_at_mut(&mut self, x: i32, z: i32) -> Option<&mut Sector> {
        self.sector_index(x, z).map(move |i| &mut self.sectors[i])
    }
}
