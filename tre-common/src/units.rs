//! Frame-rate and time conversions
//!
//! The simulation ticks at a fixed 30 frames per second; trigger timeouts in
//! level data are expressed in seconds and converted to frame counts here.

use std::time::Duration;

/// Simulation frames per second
pub const FRAME_RATE: u32 = 30;

/// Duration of a single simulation frame
pub const FRAME_DURATION: Duration = Duration::from_nanos(1_000_000_000 / FRAME_RATE as u64);

/// Convert a frame count to wall-clock duration
pub fn frames_to_duration(frames: u32) -> Duration {
    FRAME_DURATION * frames
}

/// Convert a duration to whole frames (truncating)
pub fn duration_to_frames(duration: Duration) -> u32 {
    let frames = duration.as_nanos() / FRAME_DURATION.as_nanos();
    frames.min(u32::MAX as u128) as u32
}

/// Convert a level-data timeout (seconds) to frames.
///
/// A timeout of exactly one second is stored as a single frame by the level
/// format; every other value is scaled by the frame rate.
pub fn timeout_to_frames(seconds: u8) -> u32 {
    if seconds == 1 {
        1
    } else {
        u32::from(seconds) * FRAME_RATE
    }
}

/// Convert a sample frame count at `sample_rate` to a duration
pub fn samples_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / sample_rate as f64)
}

/// Convert a duration to sample frames at `sample_rate`
pub fn duration_to_samples(duration: Duration, sample_rate: u32) -> u64 {
    (duration.as_secs_f64() * sample_rate as f64).round() as u64
}
