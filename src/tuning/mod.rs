mod scale;

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::TuningError;

pub use scale::{DUPLICATE_TOLERANCE, MAX_GENERATORS, ScaleTable};

pub const A4_PITCH: u8 = 69;
pub const A4_FREQUENCY: f64 = 440.0;

/// Twelve-tone equal temperament with A4 = 440 Hz.
pub fn midi_to_freq(pitch: u8) -> f64 {
    A4_FREQUENCY * 2.0_f64.powf((pitch as f64 - A4_PITCH as f64) / 12.0)
}

/// A scale table anchored to a MIDI pitch.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleTuning {
    table: ScaleTable,
    reference_pitch: u8,
    reference_frequency: f64,
    tonic_transposition: f64,
}

impl ScaleTuning {
    pub fn new(
        table: ScaleTable,
        reference_pitch: u8,
        reference_frequency: f64,
        tonic_transposition: f64,
    ) -> Result<Self, TuningError> {
        if !(reference_frequency.is_finite() && reference_frequency > 0.0) {
            return Err(TuningError::InvalidReferenceFrequency(reference_frequency));
        }
        if !(tonic_transposition.is_finite() && tonic_transposition > 0.0) {
            return Err(TuningError::InvalidTransposition(tonic_transposition));
        }
        Ok(Self {
            table,
            reference_pitch,
            reference_frequency,
            tonic_transposition,
        })
    }

    pub fn table(&self) -> &ScaleTable {
        &self.table
    }

    pub fn frequency(&self, pitch: u8) -> f64 {
        self.table.nth_step(
            pitch as i64 - self.reference_pitch as i64,
            self.reference_frequency,
            self.tonic_transposition,
        )
    }
}

/// Pitch-to-frequency mapping used by the combination-tone tracker.
#[derive(Clone)]
pub enum Tuning {
    EqualTemperament { reference_frequency: f64 },
    Scale(ScaleTuning),
    Custom(Arc<dyn Fn(u8) -> f64 + Send + Sync>),
}

impl Tuning {
    pub fn custom(f: impl Fn(u8) -> f64 + Send + Sync + 'static) -> Self {
        Tuning::Custom(Arc::new(f))
    }

    pub fn frequency(&self, pitch: u8) -> f64 {
        match self {
            Tuning::EqualTemperament {
                reference_frequency,
            } => midi_to_freq(pitch) * reference_frequency / A4_FREQUENCY,
            Tuning::Scale(scale) => scale.frequency(pitch),
            Tuning::Custom(f) => f(pitch),
        }
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning::EqualTemperament {
            reference_frequency: A4_FREQUENCY,
        }
    }
}

impl fmt::Debug for Tuning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tuning::EqualTemperament {
                reference_frequency,
            } => f
                .debug_struct("EqualTemperament")
                .field("reference_frequency", reference_frequency)
                .finish(),
            Tuning::Scale(scale) => f.debug_tuple("Scale").field(scale).finish(),
            Tuning::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Shared, hot-swappable tuning. The control side stores a new `Tuning`;
/// the render side picks it up on the next lookup.
pub type TuningHandle = Arc<ArcSwap<Tuning>>;

pub fn shared(tuning: Tuning) -> TuningHandle {
    Arc::new(ArcSwap::from_pointee(tuning))
}
