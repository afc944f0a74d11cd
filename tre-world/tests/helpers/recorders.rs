//! Camera and soundtrack doubles

use parking_lot::Mutex;
use std::sync::Arc;
use tre_world::{CameraController, CameraMode, CameraRequest, ObjectId, Soundtrack, TrackId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    Switch(CameraRequest),
    LookAt(ObjectId),
}

/// Camera that enters Fixed (or Heavy) mode on every switch request
#[derive(Debug, Clone, Default)]
pub struct RecordingCamera {
    pub mode: CameraMode,
    pub events: Arc<Mutex<Vec<CameraEvent>>>,
}

impl CameraController for RecordingCamera {
    fn mode(&self) -> CameraMode {
        self.mode
    }

    fn switch_camera(&mut self, request: &CameraRequest) {
        self.mode = if request.from_heavy {
            CameraMode::Heavy
        } else {
            CameraMode::Fixed
        };
        self.events.lock().push(CameraEvent::Switch(*request));
    }

    fn set_look_at(&mut self, object: ObjectId) {
        self.events.lock().push(CameraEvent::LookAt(object));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundtrackEvent {
    Play(TrackId),
    Stop,
    SecretJingle,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSoundtrack {
    pub events: Arc<Mutex<Vec<SoundtrackEvent>>>,
}

impl Soundtrack for RecordingSoundtrack {
    fn play_track(&mut self, track: TrackId) {
        self.events.lock().push(SoundtrackEvent::Play(track));
    }

    fn stop_track(&mut self) {
        self.events.lock().push(SoundtrackEvent::Stop);
    }

    fn play_secret_jingle(&mut self) {
        self.events.lock().push(SoundtrackEvent::SecretJingle);
    }
}
