//! Camera seam
//!
//! The trigger engine only asks the camera controller to switch to a fixed
//! camera or to look at an object. [`TriggerCamera`] is a controller that
//! keeps just the state those requests need; renderers wrap or replace it.

use crate::floordata::{CameraParameters, SequenceCondition};
use crate::object::{ObjectId, Position};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    #[default]
    Chase,
    Fixed,
    Look,
    Combat,
    /// Fixed camera switched by a heavy trigger
    Heavy,
}

/// Camera table entry used by underwater currents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSink {
    pub position: Position,
    pub box_index: usize,
    pub strength: u16,
}

/// A SwitchCamera command together with the sequence context it ran in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraRequest {
    pub camera: u16,
    pub parameters: CameraParameters,
    pub condition: SequenceCondition,
    pub from_heavy: bool,
    /// The sequence's switch is in the off position
    pub switch_off: bool,
}

pub trait CameraController {
    fn mode(&self) -> CameraMode;

    fn switch_camera(&mut self, request: &CameraRequest);

    fn set_look_at(&mut self, object: ObjectId);
}

/// Minimal fixed-camera state machine.
#[derive(Debug, Clone, Default)]
pub struct TriggerCamera {
    pub mode: CameraMode,
    /// Camera selected by the last request, even if it was not applied
    pub current: Option<u16>,
    /// Camera last switched to
    pub last: Option<u16>,
    pub look_at: Option<ObjectId>,
    /// Remaining frames before falling back to the chase camera
    pub timeout: u32,
    pub speed: u16,
    used_oneshots: HashSet<u16>,
}

impl TriggerCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one frame.
    pub fn tick(&mut self) {
        if !matches!(self.mode, CameraMode::Fixed | CameraMode::Heavy) || self.timeout == 0 {
            return;
        }
        self.timeout -= 1;
        if self.timeout == 0 {
            self.mode = CameraMode::Chase;
            self.look_at = None;
        }
    }
}

impl CameraController for TriggerCamera {
    fn mode(&self) -> CameraMode {
        self.mode
    }

    fn switch_camera(&mut self, request: &CameraRequest) {
        if self.used_oneshots.contains(&request.camera) {
            return;
        }
        self.current = Some(request.camera);

        if matches!(self.mode, CameraMode::Look | CameraMode::Combat) {
            return;
        }
        let from_switch = request.condition == SequenceCondition::ItemActivated;
        match request.condition {
            SequenceCondition::LaraInCombatMode => return,
            SequenceCondition::ItemActivated if request.parameters.timeout != 0 && request.switch_off => {
                return
            }
            _ => {}
        }
        if self.last == Some(request.camera) && !from_switch {
            return;
        }

        self.timeout = request.parameters.timeout_frames();
        if request.parameters.oneshot {
            self.used_oneshots.insert(request.camera);
        }
        self.speed = request.parameters.smoothness + 1;
        self.mode = if request.from_heavy {
            CameraMode::Heavy
        } else {
            CameraMode::Fixed
        };
        self.last = Some(request.camera);
        debug!("Switched to fixed camera {} ({:?})", request.camera, self.mode);
    }

    fn set_look_at(&mut self, object: ObjectId) {
        self.look_at = Some(object);
    }
}
