use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ROLLOFF_THRESHOLD_HZ: f64 = 1000.0;
pub const DEFAULT_ROLLOFF_DB_PER_OCTAVE: f64 = -6.0;

/// Oscillator shape. Stored by name; names that are not recognised load as
/// `Silent` rather than failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Wave {
    #[default]
    Sine,
    Square,
    Saw,
    Triangle,
    Silent,
}

impl Wave {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "sine" => Wave::Sine,
            "square" => Wave::Square,
            "saw" | "sawtooth" => Wave::Saw,
            "triangle" => Wave::Triangle,
            _ => Wave::Silent,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Wave::Sine => "sine",
            Wave::Square => "square",
            Wave::Saw => "saw",
            Wave::Triangle => "triangle",
            Wave::Silent => "silent",
        }
    }

    /// One sample at `phase` in `[0, 1)`.
    pub fn sample(&self, phase: f64) -> f64 {
        match self {
            Wave::Sine => (TAU * phase).sin(),
            Wave::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Wave::Saw => 2.0 * phase - 1.0,
            Wave::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Wave::Silent => 0.0,
        }
    }
}

impl From<String> for Wave {
    fn from(name: String) -> Self {
        Wave::from_name(&name)
    }
}

impl From<Wave> for String {
    fn from(wave: Wave) -> Self {
        wave.name().to_string()
    }
}

/// Fixed attenuation above a corner frequency, in dB per octave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rolloff {
    pub threshold_hz: f64,
    pub db_per_octave: f64,
}

impl Rolloff {
    pub fn gain(&self, frequency: f64) -> f64 {
        if frequency <= self.threshold_hz {
            return 1.0;
        }
        let octaves = (frequency / self.threshold_hz).log2();
        10f64.powf(self.db_per_octave / 20.0 * octaves)
    }
}

impl Default for Rolloff {
    fn default() -> Self {
        Self {
            threshold_hz: DEFAULT_ROLLOFF_THRESHOLD_HZ,
            db_per_octave: DEFAULT_ROLLOFF_DB_PER_OCTAVE,
        }
    }
}

/// Phase-accumulating oscillator driven by a per-sample frequency stream.
#[derive(Debug, Clone)]
pub struct Oscillator {
    wave: Wave,
    rolloff: Rolloff,
    sample_rate: f64,
    phase: f64,
}

impl Oscillator {
    pub fn new(wave: Wave, sample_rate: f64) -> Self {
        Self {
            wave,
            rolloff: Rolloff::default(),
            sample_rate,
            phase: 0.0,
        }
    }

    pub fn with_rolloff(mut self, rolloff: Rolloff) -> Self {
        self.rolloff = rolloff;
        self
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Renders `output.len()` samples. Positions with no frequency, or a
    /// frequency that is not finite and positive, are silent and leave the
    /// phase untouched.
    pub fn process(&mut self, frequency: &[f32], output: &mut [f32]) {
        for (i, out) in output.iter_mut().enumerate() {
            let freq = frequency.get(i).map_or(0.0, |&f| f as f64);
            if !(freq.is_finite() && freq > 0.0) {
                *out = 0.0;
                continue;
            }
            self.phase = (self.phase + freq / self.sample_rate).fract();
            *out = (self.wave.sample(self.phase) * self.rolloff.gain(freq)) as f32;
        }
    }
}
