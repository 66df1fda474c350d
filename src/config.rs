use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::audio::{ChannelMode, Rolloff, SmoothingFilter, Wave};
use crate::error::{ConfigError, TuningError};
use crate::tracker::validate_channels;
use crate::tuning::{A4_FREQUENCY, A4_PITCH, ScaleTable, ScaleTuning, Tuning};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub current: f64,
    pub target: f64,
}

impl Weights {
    pub const fn new(current: f64, target: f64) -> Self {
        Self { current, target }
    }

    pub fn filter(&self) -> SmoothingFilter {
        SmoothingFilter::new(self.current, self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub frequency: Weights,
    pub envelope: Weights,
    pub master: Weights,
    pub master_stereo: Weights,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            frequency: Weights::new(1.0, 0.02),
            envelope: Weights::new(0.99, 0.01),
            master: Weights::new(0.99, 0.005),
            master_stereo: Weights::new(0.95, 0.05),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillatorConfig {
    pub waveform: Wave,
    pub rolloff_threshold_hz: f64,
    pub rolloff_db_per_octave: f64,
}

impl OscillatorConfig {
    pub fn rolloff(&self) -> Rolloff {
        Rolloff {
            threshold_hz: self.rolloff_threshold_hz,
            db_per_octave: self.rolloff_db_per_octave,
        }
    }
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        let rolloff = Rolloff::default();
        Self {
            waveform: Wave::Sine,
            rolloff_threshold_hz: rolloff.threshold_hz,
            rolloff_db_per_octave: rolloff.db_per_octave,
        }
    }
}

/// Where a scale's MIDI pitches are pinned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Anchor {
    pub reference_pitch: u8,
    pub reference_frequency: f64,
    pub tonic_transposition: f64,
}

impl Default for Anchor {
    fn default() -> Self {
        Self {
            reference_pitch: A4_PITCH,
            reference_frequency: A4_FREQUENCY,
            tonic_transposition: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScaleSource {
    PeriodGenerator {
        pitch_classes: usize,
        period: f64,
        generator: f64,
    },
    Temperament {
        pitch_classes: usize,
        units: Vec<f64>,
        period: f64,
        generator: f64,
        comma: f64,
    },
    EulerFokker {
        generators: Vec<f64>,
        #[serde(default)]
        remove_duplicates: bool,
    },
    CombinationProductSet {
        generators: Vec<f64>,
        elements: usize,
        #[serde(default)]
        reduction_index: usize,
        #[serde(default)]
        remove_duplicates: bool,
    },
    Ratios {
        ratios: Vec<f64>,
        period: f64,
    },
}

impl ScaleSource {
    pub fn build(&self) -> Result<ScaleTable, TuningError> {
        match self {
            ScaleSource::PeriodGenerator {
                pitch_classes,
                period,
                generator,
            } => ScaleTable::period_and_generator(*pitch_classes, *period, *generator),
            ScaleSource::Temperament {
                pitch_classes,
                units,
                period,
                generator,
                comma,
            } => ScaleTable::temperament(*pitch_classes, units, *period, *generator, *comma),
            ScaleSource::EulerFokker {
                generators,
                remove_duplicates,
            } => ScaleTable::euler_fokker_genus(generators, *remove_duplicates),
            ScaleSource::CombinationProductSet {
                generators,
                elements,
                reduction_index,
                remove_duplicates,
            } => ScaleTable::combination_product_set(
                generators,
                *elements,
                *reduction_index,
                *remove_duplicates,
            ),
            ScaleSource::Ratios { ratios, period } => ScaleTable::new(ratios.clone(), *period),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TuningConfig {
    EqualTemperament {
        reference_frequency: f64,
    },
    Scale {
        scale: ScaleSource,
        #[serde(default)]
        anchor: Anchor,
        #[serde(default)]
        mirror: bool,
    },
}

impl TuningConfig {
    pub fn build(&self) -> Result<Tuning, TuningError> {
        match self {
            TuningConfig::EqualTemperament {
                reference_frequency,
            } => {
                if !(reference_frequency.is_finite() && *reference_frequency > 0.0) {
                    return Err(TuningError::InvalidReferenceFrequency(*reference_frequency));
                }
                Ok(Tuning::EqualTemperament {
                    reference_frequency: *reference_frequency,
                })
            }
            TuningConfig::Scale {
                scale,
                anchor,
                mirror,
            } => {
                let table = scale.build()?;
                let table = if *mirror { table.mirror() } else { table };
                let tuning = ScaleTuning::new(
                    table,
                    anchor.reference_pitch,
                    anchor.reference_frequency,
                    anchor.tonic_transposition,
                )?;
                Ok(Tuning::Scale(tuning))
            }
        }
    }
}

impl Default for TuningConfig {
    /// Seven steps of an octave stacked inside a fifth, A = 415.
    fn default() -> Self {
        TuningConfig::Scale {
            scale: ScaleSource::PeriodGenerator {
                pitch_classes: 7,
                period: 1.5,
                generator: 2.0,
            },
            anchor: Anchor {
                reference_frequency: 415.0,
                ..Anchor::default()
            },
            mirror: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub channel_a: u8,
    pub channel_b: u8,
    pub channel_mode: ChannelMode,
    pub master_volume: f64,
    pub master_volume_left: f64,
    pub master_volume_right: f64,
    pub envelope_level: f64,
    pub oscillator: OscillatorConfig,
    pub smoothing: SmoothingConfig,
    pub tuning: TuningConfig,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            channel_a: 1,
            channel_b: 0,
            channel_mode: ChannelMode::Mono,
            master_volume: 0.9,
            master_volume_left: 0.9,
            master_volume_right: 0.9,
            envelope_level: 0.5,
            oscillator: OscillatorConfig::default(),
            smoothing: SmoothingConfig::default(),
            tuning: TuningConfig::default(),
        }
    }
}

impl SynthConfig {
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_string = fs::read_to_string(path)?;
        Self::from_ron(&ron_string)
    }

    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Checks channels and that the tuning builds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_channels(self.channel_a, self.channel_b)?;
        self.tuning.build()?;
        Ok(())
    }

    /// Sections that differ from `other` but are baked into the audio
    /// graph when the output stream is built.
    pub fn restart_only_changes(&self, other: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.channel_mode != other.channel_mode {
            changed.push("channel_mode");
        }
        if self.oscillator != other.oscillator {
            changed.push("oscillator");
        }
        if self.smoothing != other.smoothing {
            changed.push("smoothing");
        }
        changed
    }
}
