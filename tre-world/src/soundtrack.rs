//! Soundtrack seam and per-track trigger state

use crate::floordata::{ActivationState, SequenceCondition};
use std::collections::HashMap;
use tracing::debug;

/// Soundtrack track number as stored in floor data
pub type TrackId = u16;

/// Music playback driven by triggers
pub trait Soundtrack {
    fn play_track(&mut self, track: TrackId);

    fn stop_track(&mut self);

    /// Short cue played when a new secret is found
    fn play_secret_jingle(&mut self);
}

/// Activation state per soundtrack track.
///
/// Tracks combine requests like objects do: once fully activated the track
/// plays, otherwise the current track stops.
#[derive(Debug, Clone, Default)]
pub struct TrackTriggers {
    states: HashMap<TrackId, ActivationState>,
}

impl TrackTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, track: TrackId) -> Option<&ActivationState> {
        self.states.get(&track)
    }

    pub fn trigger(
        &mut self,
        track: TrackId,
        request: &ActivationState,
        condition: SequenceCondition,
        soundtrack: &mut dyn Soundtrack,
    ) {
        let state = self.states.entry(track).or_default();
        if state.is_oneshot() {
            return;
        }

        state.combine(request.activation_set(), condition);
        if state.is_fully_activated() {
            if request.is_oneshot() {
                state.set_oneshot(true);
            }
            debug!("Track {} triggered", track);
            soundtrack.play_track(track);
        } else {
            soundtrack.stop_track();
        }
    }

    /// Forget all track state (new level)
    pub fn reset(&mut self) {
        self.states.clear();
    }
}
