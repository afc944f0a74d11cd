//! Small level layouts

use super::recorders::{CameraEvent, RecordingCamera, RecordingSoundtrack, SoundtrackEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tre_world::{CameraSink, Level, Object, Position, Room, Sector, World, ZoneBox};

/// World position inside the trigger sector of [`single_room_level`]
pub const PAD_X: i32 = 512;
pub const PAD_Z: i32 = 512;

/// A 2x2 room at the origin; every sector belongs to `box_index`.
pub fn room(node: usize, floor_height: i32, box_index: usize) -> Room {
    let sector = Sector {
        box_index: Some(box_index),
        floor_height,
        ceiling_height: -4096,
        ..Sector::default()
    };
    Room {
        node,
        visible: true,
        sector_count_x: 2,
        sector_count_z: 2,
        sectors: vec![sector; 4],
        ..Room::default()
    }
}

/// One room whose first sector holds `floor_data` at offset 0.
pub fn single_room_level(floor_data: Vec<u16>, objects: Vec<Object>) -> Level {
    let mut room = room(10, 0, 0);
    room.sectors[0].floor_data = Some(0);
    Level {
        rooms: vec![room],
        boxes: vec![ZoneBox {
            xmin: 0,
            xmax: 2047,
            zmin: 0,
            zmax: 2047,
            blockable: true,
            ..ZoneBox::default()
        }],
        floor_data: floor_data.into(),
        camera_sinks: vec![CameraSink {
            position: Position::new(5000, -100, 300),
            box_index: 0,
            strength: 4,
        }],
        objects,
    }
}

/// A world plus handles on what its camera and soundtrack were asked to do.
pub struct TestWorld {
    pub world: World,
    pub camera_events: Arc<Mutex<Vec<CameraEvent>>>,
    pub soundtrack_events: Arc<Mutex<Vec<SoundtrackEvent>>>,
}

impl TestWorld {
    /// Run the trigger sector of [`single_room_level`].
    pub fn step_on_pad(&mut self) -> tre_world::Result<()> {
        self.world.handle_sector_triggers(0, PAD_X, PAD_Z, false)
    }

    pub fn heavy_on_pad(&mut self) -> tre_world::Result<()> {
        self.world.handle_sector_triggers(0, PAD_X, PAD_Z, true)
    }

    pub fn camera_events(&self) -> Vec<CameraEvent> {
        self.camera_events.lock().clone()
    }

    pub fn soundtrack_events(&self) -> Vec<SoundtrackEvent> {
        self.soundtrack_events.lock().clone()
    }
}

pub fn build_world(level: Level) -> TestWorld {
    let camera = RecordingCamera::default();
    let soundtrack = RecordingSoundtrack::default();
    let camera_events = Arc::clone(&camera.events);
    let soundtrack_events = Arc::clone(&soundtrack.events);
    let world = World::new(level, Box::new(camera), Box::new(soundtrack)).unwrap();
    TestWorld {
        world,
        camera_events,
        soundtrack_events,
    }
}
