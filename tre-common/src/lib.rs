//! # TRE Common Library
//!
//! Shared code for the engine crates:
//! - Error type shared by configuration loading
//! - Engine configuration (TOML) and its resolution order
//! - Fade curve definitions used for voice gain fades
//! - Frame/time unit conversions for the 30 Hz simulation clock

pub mod config;
pub mod error;
pub mod fade_curves;
pub mod units;

pub use config::{AudioSettings, EngineConfig};
pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
