use super::{ChannelMode, ControlSignal, Oscillator, SmoothingFilter, StereoCombiner, multiply};
use crate::config::SynthConfig;

/// Largest block the graph renders in one go.
pub const MAX_QUANTUM: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    FrequencyA,
    FrequencyB,
    EnvelopeA,
    EnvelopeB,
    MasterVolume,
    MasterVolumeLeft,
    MasterVolumeRight,
}

struct Scratch {
    raw: [f32; MAX_QUANTUM],
    smoothed: [f32; MAX_QUANTUM],
    tone: [f32; MAX_QUANTUM],
}

/// frequency -> smoother -> oscillator, times smoothed envelope.
struct CarrierPath {
    frequency: ControlSignal,
    envelope: ControlSignal,
    smooth_frequency: SmoothingFilter,
    smooth_envelope: SmoothingFilter,
    oscillator: Oscillator,
}

impl CarrierPath {
    fn new(config: &SynthConfig, sample_rate: f64) -> Self {
        Self {
            frequency: ControlSignal::default(),
            envelope: ControlSignal::default(),
            smooth_frequency: config.smoothing.frequency.filter(),
            smooth_envelope: config.smoothing.envelope.filter(),
            oscillator: Oscillator::new(config.oscillator.waveform, sample_rate)
                .with_rolloff(config.oscillator.rolloff()),
        }
    }

    fn render(&mut self, scratch: &mut Scratch, output: &mut [f32]) {
        let n = output.len();
        self.frequency.fill(&mut scratch.raw[..n]);
        self.smooth_frequency
            .process_mono(&scratch.raw[..n], &mut scratch.smoothed[..n]);
        self.oscillator
            .process(&scratch.smoothed[..n], &mut scratch.tone[..n]);

        self.envelope.fill(&mut scratch.raw[..n]);
        self.smooth_envelope
            .process_mono(&scratch.raw[..n], &mut scratch.smoothed[..n]);
        multiply(Some(&scratch.tone[..n]), Some(&scratch.smoothed[..n]), output);
    }
}

struct MasterGain {
    level: ControlSignal,
    smoother: SmoothingFilter,
}

impl MasterGain {
    fn new(level: f64, smoother: SmoothingFilter) -> Self {
        Self {
            level: ControlSignal::new(level),
            smoother,
        }
    }

    fn render(&mut self, raw: &mut [f32], gain: &mut [f32]) {
        self.level.fill(raw);
        self.smoother.process_mono(raw, gain);
    }
}

fn apply_gain(signal: &mut [f32], gain: &[f32]) {
    for (s, g) in signal.iter_mut().zip(gain) {
        *s *= g;
    }
}

/// The fixed two-carrier voice: two carrier paths, a stereo combiner and
/// smoothed master gain. Control values arrive through `ControlSignal`s, so
/// rendering never waits on the writer.
pub struct SynthGraph {
    path_a: CarrierPath,
    path_b: CarrierPath,
    combiner: StereoCombiner,
    master: MasterGain,
    master_left: MasterGain,
    master_right: MasterGain,
    scratch: Scratch,
    voice_a: [f32; MAX_QUANTUM],
    voice_b: [f32; MAX_QUANTUM],
    gain: [f32; MAX_QUANTUM],
}

impl SynthGraph {
    pub fn new(config: &SynthConfig, sample_rate: f64) -> Self {
        let stereo = &config.smoothing.master_stereo;
        Self {
            path_a: CarrierPath::new(config, sample_rate),
            path_b: CarrierPath::new(config, sample_rate),
            combiner: StereoCombiner::new(config.channel_mode),
            master: MasterGain::new(config.master_volume, config.smoothing.master.filter()),
            master_left: MasterGain::new(config.master_volume_left, stereo.filter()),
            master_right: MasterGain::new(config.master_volume_right, stereo.filter()),
            scratch: Scratch {
                raw: [0.0; MAX_QUANTUM],
                smoothed: [0.0; MAX_QUANTUM],
                tone: [0.0; MAX_QUANTUM],
            },
            voice_a: [0.0; MAX_QUANTUM],
            voice_b: [0.0; MAX_QUANTUM],
            gain: [0.0; MAX_QUANTUM],
        }
    }

    /// Carrier frequency inputs, for wiring to the pitch tracker.
    pub fn frequency_sinks(&self) -> (ControlSignal, ControlSignal) {
        (self.path_a.frequency.clone(), self.path_b.frequency.clone())
    }

    pub fn control(&self, parameter: Parameter) -> &ControlSignal {
        match parameter {
            Parameter::FrequencyA => &self.path_a.frequency,
            Parameter::FrequencyB => &self.path_b.frequency,
            Parameter::EnvelopeA => &self.path_a.envelope,
            Parameter::EnvelopeB => &self.path_b.envelope,
            Parameter::MasterVolume => &self.master.level,
            Parameter::MasterVolumeLeft => &self.master_left.level,
            Parameter::MasterVolumeRight => &self.master_right.level,
        }
    }

    pub fn set_parameter(&self, parameter: Parameter, value: f64) {
        self.control(parameter).set(value);
    }

    /// Renders up to `MAX_QUANTUM` frames into `left` and `right`.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let n = left.len().min(right.len()).min(MAX_QUANTUM);
        let (left, right) = (&mut left[..n], &mut right[..n]);

        self.path_a.render(&mut self.scratch, &mut self.voice_a[..n]);
        self.path_b.render(&mut self.scratch, &mut self.voice_b[..n]);
        self.combiner
            .process(&self.voice_a[..n], &self.voice_b[..n], left, right);

        let raw = &mut self.scratch.raw[..n];
        let gain = &mut self.gain[..n];
        match self.combiner.mode() {
            ChannelMode::Mono => {
                self.master.render(raw, gain);
                apply_gain(left, gain);
                apply_gain(right, gain);
            }
            ChannelMode::Stereo => {
                self.master_left.render(raw, gain);
                apply_gain(left, gain);
                self.master_right.render(raw, gain);
                apply_gain(right, gain);
            }
        }
    }
}
