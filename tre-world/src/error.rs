//! Error types for the world trigger engine

use crate::object::ObjectId;
use thiserror::Error;

/// Result type for world operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while interpreting level data.
///
/// Every variant indicates level data that does not match the loaded world;
/// callers treat them as fatal for the current level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Floor data references an object that does not exist
    #[error("Floor data references missing object {0}")]
    MissingObject(ObjectId),

    /// Floor data ran past its end or holds an unknown chunk
    #[error("Corrupt floor data at word {offset}: {reason}")]
    CorruptFloorData { offset: usize, reason: String },

    /// Secret index outside the 16-bit found mask
    #[error("Secret index {0} out of range")]
    BadSecretIndex(u16),

    /// Flip map slot outside the flip state table
    #[error("Flip map slot {0} out of range")]
    BadFlipSlot(u16),

    /// Room index outside the room table
    #[error("Invalid room index {0}")]
    InvalidRoom(usize),

    /// Box index outside the box table
    #[error("Invalid box index {0}")]
    InvalidBox(usize),

    /// Underwater current references a missing camera sink
    #[error("Missing camera sink {0}")]
    MissingCameraSink(u16),
}

impl Error {
    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        Error::CorruptFloorData {
            offset,
            reason: reason.into(),
        }
    }
}
