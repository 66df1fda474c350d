//! Combination-tone synthesizer.
//!
//! A Standard MIDI File is parsed into timed events, replayed against the
//! audio clock, and the latest pitches of two channels are turned into a
//! pair of carrier frequencies `f1 = fA + fB`, `f2 = 2fA + fB` whose
//! difference tones recreate the original notes. Pitches map to frequency
//! through a swappable tuning, usually a generated microtonal scale.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod midi;
pub mod session;
pub mod timing;
pub mod tracker;
pub mod tuning;

pub use config::{SynthConfig, TuningConfig};
pub use engine::{EngineCommand, EngineHandle, EngineUpdate, spawn_engine};
pub use error::{Error, Result};
pub use events::TimedEvent;
pub use session::Session;
pub use tracker::{CombinationTones, PitchTracker};
pub use tuning::{ScaleTable, Tuning};
