//! Optional platform capabilities
//!
//! Resolved once when the platform context is created and shared with every
//! handle that needs to know whether a capability is usable.

/// Capabilities reported by the platform context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioExtensions {
    /// Direct-path filters (used for the underwater low-pass)
    pub efx: bool,
    /// Per-source pitch control
    pub pitch: bool,
    /// Maximum channels a single buffer may carry
    pub max_buffer_channels: u16,
}

impl AudioExtensions {
    /// Capabilities of the built-in software mixer
    pub fn software() -> Self {
        Self {
            efx: true,
            pitch: true,
            max_buffer_channels: 2,
        }
    }

    /// Capabilities of a context that could not open an output
    pub fn none() -> Self {
        Self {
            efx: false,
            pitch: false,
            max_buffer_channels: 0,
        }
    }
}

impl Default for AudioExtensions {
    fn default() -> Self {
        Self::software()
    }
}
