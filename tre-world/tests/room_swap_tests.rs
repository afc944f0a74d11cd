//! Flip map room swapping

mod helpers;

use helpers::*;
use std::sync::Arc;
use tre_audio::platform::Context;
use tre_audio::{BufferHandle, Voice, VoiceControl};
use tre_world::{
    ChunkType, Error, Level, Object, ObjectKind, Position, SequenceCondition, StaticSoundMode,
    TriggerCamera, World, ZoneBox,
};

fn blockable_box() -> ZoneBox {
    ZoneBox {
        xmin: 0,
        xmax: 2047,
        zmin: 0,
        zmax: 2047,
        blockable: true,
        ..ZoneBox::default()
    }
}

/// Room 0 (node 10, floor 0, box 0) with alternate room 1 (node 11, floor -512, box 1).
///
/// A block stands on sector 0 of room 0 and object 3 sits in room 1.
fn block_level() -> Level {
    let mut normal = room(10, 0, 0);
    normal.alternate_room = Some(1);
    normal.sectors[0].floor_data = Some(0);
    let mut alternate = room(11, -512, 1);
    alternate.visible = false;

    Level {
        rooms: vec![normal, alternate],
        boxes: vec![blockable_box(), blockable_box()],
        floor_data: vec![header(ChunkType::Portal, SequenceCondition::LaraIsHere, true), 3].into(),
        objects: vec![
            Object::new(1, ObjectKind::Block, 0, Position::new(512, 0, 512)),
            Object::new(2, ObjectKind::TallBlock, 0, Position::new(1536, 0, 1536)).with_dynamic(true),
            Object::new(3, ObjectKind::Generic, 1, Position::new(512, -512, 512)),
        ],
        ..Level::default()
    }
}

fn degraded_voice() -> Arc<Voice> {
    let context = Arc::new(Context::degraded());
    Arc::new(Voice::new(Arc::new(BufferHandle::new(context))))
}

#[test]
fn test_level_blocks_patch_floor_on_load() {
    let t = build_world(block_level());

    let normal = t.world.room(0).unwrap();
    assert_eq!(normal.sectors[0].floor_height, -1024);
    // Dynamic blocks patch themselves when they settle
    assert_eq!(normal.sectors[3].floor_height, 0);
    assert!(t.world.boxes()[0].blocked);
    assert!(!t.world.boxes()[1].blocked);
}

#[test]
fn test_swap_moves_block_patch_to_new_room() {
    let mut t = build_world(block_level());

    t.world.swap_all_rooms().unwrap();

    let slot0 = t.world.room(0).unwrap();
    let slot1 = t.world.room(1).unwrap();
    assert_eq!(slot0.node, 11);
    assert_eq!(slot0.sectors[0].floor_height, -512 - 1024);
    assert_eq!(slot0.sectors[3].floor_height, -512);
    assert_eq!(slot1.node, 10);
    assert_eq!(slot1.sectors[0].floor_height, 0);
    assert!(!t.world.boxes()[0].blocked);
    assert!(t.world.boxes()[1].blocked);
}

#[test]
fn test_swap_keeps_slot_visibility_and_links() {
    let mut t = build_world(block_level());

    t.world.swap_all_rooms().unwrap();

    let slot0 = t.world.room(0).unwrap();
    let slot1 = t.world.room(1).unwrap();
    assert!(slot0.visible);
    assert_eq!(slot0.alternate_room, Some(1));
    assert!(!slot1.visible);
    assert_eq!(slot1.alternate_room, None);
    assert!(t.world.rooms_swapped());
}

#[test]
fn test_swap_reattaches_objects_in_both_slots() {
    let mut t = build_world(block_level());
    assert_eq!(t.world.object(1).unwrap().parent_node, 10);
    assert_eq!(t.world.object(3).unwrap().parent_node, 11);

    t.world.swap_all_rooms().unwrap();

    assert_eq!(t.world.object(1).unwrap().parent_node, 11);
    assert_eq!(t.world.object(2).unwrap().parent_node, 11);
    assert_eq!(t.world.object(3).unwrap().parent_node, 10);
    assert_eq!(t.world.object(1).unwrap().state.room, 0);
}

#[test]
fn test_swap_rederives_sector_links() {
    let mut t = build_world(block_level());
    assert_eq!(t.world.room(0).unwrap().sectors[0].portal_target, Some(3));

    t.world.swap_all_rooms().unwrap();

    let slot0 = &t.world.room(0).unwrap().sectors[0];
    let slot1 = &t.world.room(1).unwrap().sectors[0];
    assert_eq!(slot0.portal_target, None);
    assert_eq!(slot0.room, 0);
    assert_eq!(slot1.portal_target, Some(3));
    assert_eq!(slot1.room, 1);
}

#[test]
fn test_double_swap_restores_everything() {
    let mut t = build_world(block_level());
    let rooms = t.world.rooms().to_vec();
    let boxes = t.world.boxes().to_vec();
    let objects: Vec<Object> = t.world.objects().cloned().collect();

    t.world.swap_all_rooms().unwrap();
    assert_ne!(t.world.rooms(), rooms.as_slice());
    t.world.swap_all_rooms().unwrap();

    assert!(!t.world.rooms_swapped());
    assert_eq!(t.world.rooms(), rooms.as_slice());
    assert_eq!(t.world.boxes(), boxes.as_slice());
    assert_eq!(t.world.objects().cloned().collect::<Vec<_>>(), objects);
}

#[test]
fn test_each_pair_swapped_once() {
    let mut first = room(0, 0, 0);
    first.alternate_room = Some(2);
    let mut second = room(1, 0, 0);
    second.alternate_room = Some(3);
    let level = Level {
        rooms: vec![first, second, room(2, 0, 0), room(3, 0, 0)],
        boxes: vec![blockable_box()],
        ..Level::default()
    };
    let mut t = build_world(level);

    t.world.swap_all_rooms().unwrap();

    let nodes: Vec<_> = t.world.rooms().iter().map(|r| r.node).collect();
    assert_eq!(nodes, vec![2, 3, 0, 1]);
    let links: Vec<_> = t.world.rooms().iter().map(|r| r.alternate_room).collect();
    assert_eq!(links, vec![Some(2), Some(3), None, None]);
}

#[test]
fn test_invalid_room_indices_rejected() {
    let mut level = block_level();
    level.rooms[0].alternate_room = Some(5);
    let result = World::new(
        level,
        Box::new(TriggerCamera::new()),
        Box::new(RecordingSoundtrack::default()),
    );
    assert_eq!(result.err(), Some(Error::InvalidRoom(5)));

    let mut t = build_world(block_level());
    assert_eq!(t.world.swap_with_alternate(0, 9), Err(Error::InvalidRoom(9)));
    assert_eq!(t.world.swap_with_alternate(4, 1), Err(Error::InvalidRoom(4)));
    assert_eq!(t.world.room(0).unwrap().node, 10);
}

#[test]
fn test_static_sounds_follow_room_arrangement() {
    let mut t = build_world(block_level());
    let always = degraded_voice();
    let normal_only = degraded_voice();
    let swapped_only = degraded_voice();
    t.world.add_static_sound(always.clone(), StaticSoundMode::Always);
    t.world.add_static_sound(normal_only.clone(), StaticSoundMode::NormalOnly);
    t.world.add_static_sound(swapped_only.clone(), StaticSoundMode::SwappedOnly);

    assert!(!always.is_paused());
    assert!(!normal_only.is_paused());
    assert!(swapped_only.is_paused());

    t.world.swap_all_rooms().unwrap();
    assert!(!always.is_paused());
    assert!(normal_only.is_paused());
    assert!(!swapped_only.is_paused());

    t.world.swap_all_rooms().unwrap();
    assert!(!normal_only.is_paused());
    assert!(swapped_only.is_paused());
}
