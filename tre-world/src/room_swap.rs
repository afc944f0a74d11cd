//! Flip map room swapping
//!
//! A room slot with an alternate exchanges its contents with the alternate
//! slot. Objects stay in their slot index and are re-attached to whatever
//! room now occupies it; floor patches from blocks are lifted before the
//! swap and reapplied to the new sectors after it.

use crate::error::{Error, Result};
use crate::object::{Object, Position};
use crate::world::World;
use tracing::{debug, info};

fn static_block(object: &Object, room: usize) -> Option<(Position, i32)> {
    if object.dynamic || object.state.room != room {
        return None;
    }
    object
        .kind
        .as_block_like()
        .map(|block| (object.state.position, block.height()))
}

impl World {
    /// Swap room slot `orig` with slot `alternate`.
    ///
    /// The slots keep their own `visible` flag and alternate link.
    pub fn swap_with_alternate(&mut self, orig: usize, alternate: usize) -> Result<()> {
        let room_count = self.rooms.len();
        if orig >= room_count {
            return Err(Error::InvalidRoom(orig));
        }
        if alternate >= room_count {
            return Err(Error::InvalidRoom(alternate));
        }
        if orig == alternate {
            return Ok(());
        }

        let blocks: Vec<(Position, i32)> = self
            .objects
            .values()
            .filter_map(|object| static_block(object, orig))
            .collect();

        for (position, height) in &blocks {
            self.patch_floor(orig, position.x, position.z, *height);
        }

        self.rooms.swap(orig, alternate);
        {
            let (low, high) = self.rooms.split_at_mut(orig.max(alternate));
            let a = &mut low[orig.min(alternate)];
            let b = &mut high[0];
            std::mem::swap(&mut a.visible, &mut b.visible);
            std::mem::swap(&mut a.alternate_room, &mut b.alternate_room);
        }

        for object in self.objects.values_mut() {
            let room = object.state.room;
            if room == orig || room == alternate {
                object.parent_node = self.rooms[room].node;
            }
        }
        for (position, height) in &blocks {
            self.patch_floor(orig, position.x, position.z, -height);
        }

        debug!("Swapped room {} with alternate {}", orig, alternate);
        Ok(())
    }

    /// Swap every room that has an alternate and flip the arrangement flag.
    pub fn swap_all_rooms(&mut self) -> Result<()> {
        for index in 0..self.rooms.len() {
            if let Some(alternate) = self.rooms[index].alternate_room {
                self.swap_with_alternate(index, alternate)?;
            }
        }

        self.rooms_swapped = !self.rooms_swapped;
        self.connect_sectors()?;
        self.update_static_sounds();
        info!(
            "Rooms {}",
            if self.rooms_swapped { "swapped" } else { "restored" }
        );
        Ok(())
    }
}
