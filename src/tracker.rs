//! Pitch tracking for the two combination-tone voices.
//!
//! One channel feeds voice A, another voice B. Whenever the most recent
//! note-on pitch of either channel changes and both are known, the tracker
//! recomputes `f1 = fA + fB` and `f2 = 2fA + fB` and pushes them to its
//! destinations.

use crate::audio::ValueSink;
use crate::error::ConfigError;
use crate::events::ChannelMessage;
use crate::timing::MessageSink;
use crate::tuning::TuningHandle;

pub const MAX_CHANNEL: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinationTones {
    pub f1: f64,
    pub f2: f64,
    pub frequency_a: f64,
    pub frequency_b: f64,
}

impl CombinationTones {
    pub fn new(frequency_a: f64, frequency_b: f64) -> Self {
        let (f1, f2) = combination_tone_pair(frequency_a, frequency_b);
        Self {
            f1,
            f2,
            frequency_a,
            frequency_b,
        }
    }
}

pub fn combination_tone_pair(frequency_a: f64, frequency_b: f64) -> (f64, f64) {
    (
        frequency_a + frequency_b,
        2.0 * frequency_a + frequency_b,
    )
}

pub fn validate_channels(channel_a: u8, channel_b: u8) -> Result<(), ConfigError> {
    for channel in [channel_a, channel_b] {
        if channel > MAX_CHANNEL {
            return Err(ConfigError::InvalidChannel(channel));
        }
    }
    if channel_a == channel_b {
        return Err(ConfigError::SameChannels(channel_a));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelPitchState {
    pub last_pitch: Option<u8>,
    pub last_frequency: Option<f64>,
}

type Listener = Box<dyn FnMut(CombinationTones) + Send>;

pub struct PitchTracker {
    channel_a: u8,
    channel_b: u8,
    a: ChannelPitchState,
    b: ChannelPitchState,
    tuning: TuningHandle,
    destination_a: Option<Box<dyn ValueSink>>,
    destination_b: Option<Box<dyn ValueSink>>,
    listeners: Vec<Listener>,
    last_tones: Option<CombinationTones>,
}

impl PitchTracker {
    pub fn new(channel_a: u8, channel_b: u8, tuning: TuningHandle) -> Result<Self, ConfigError> {
        validate_channels(channel_a, channel_b)?;
        Ok(Self {
            channel_a,
            channel_b,
            a: ChannelPitchState::default(),
            b: ChannelPitchState::default(),
            tuning,
            destination_a: None,
            destination_b: None,
            listeners: Vec::new(),
            last_tones: None,
        })
    }

    pub fn channels(&self) -> (u8, u8) {
        (self.channel_a, self.channel_b)
    }

    pub fn state_a(&self) -> ChannelPitchState {
        self.a
    }

    pub fn state_b(&self) -> ChannelPitchState {
        self.b
    }

    pub fn last_tones(&self) -> Option<CombinationTones> {
        self.last_tones
    }

    /// Forgets both observed pitches, so the next note on each channel
    /// recomputes even if it repeats the previous one.
    pub fn reset(&mut self) {
        self.a = ChannelPitchState::default();
        self.b = ChannelPitchState::default();
        self.last_tones = None;
    }

    /// Switches the tracked channels. Both pitch states reset and each
    /// destination is silenced with 0.0 until new pitches arrive.
    pub fn set_channels(&mut self, channel_a: u8, channel_b: u8) -> Result<(), ConfigError> {
        validate_channels(channel_a, channel_b)?;
        self.channel_a = channel_a;
        self.channel_b = channel_b;
        self.reset();
        for sink in [&mut self.destination_a, &mut self.destination_b]
            .into_iter()
            .flatten()
        {
            sink.accept(0.0);
        }
        Ok(())
    }

    pub fn set_destination_a(&mut self, sink: Option<Box<dyn ValueSink>>) {
        self.destination_a = sink;
    }

    pub fn set_destination_b(&mut self, sink: Option<Box<dyn ValueSink>>) {
        self.destination_b = sink;
    }

    /// Registers a callback for every recomputation. Listeners run in
    /// whatever context drives the tracker and must not block.
    pub fn subscribe(&mut self, listener: impl FnMut(CombinationTones) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Feeds one raw MIDI message. Only note-ons with non-zero velocity on
    /// a tracked channel matter; everything else is ignored.
    pub fn receive(&mut self, message: &[u8]) -> Option<CombinationTones> {
        let Some(ChannelMessage::NoteOn {
            channel,
            pitch,
            velocity,
        }) = ChannelMessage::decode(message)
        else {
            return None;
        };
        if velocity == 0 {
            return None;
        }

        let state = if channel == self.channel_a {
            &mut self.a
        } else if channel == self.channel_b {
            &mut self.b
        } else {
            return None;
        };
        if state.last_pitch == Some(pitch) {
            return None;
        }
        state.last_pitch = Some(pitch);

        let (Some(pitch_a), Some(pitch_b)) = (self.a.last_pitch, self.b.last_pitch) else {
            return None;
        };

        let tuning = self.tuning.load();
        let frequency_a = tuning.frequency(pitch_a);
        let frequency_b = tuning.frequency(pitch_b);
        self.a.last_frequency = Some(frequency_a);
        self.b.last_frequency = Some(frequency_b);

        let tones = CombinationTones::new(frequency_a, frequency_b);
        if let Some(sink) = self.destination_a.as_mut() {
            sink.accept(tones.f1);
        }
        if let Some(sink) = self.destination_b.as_mut() {
            sink.accept(tones.f2);
        }
        for listener in &mut self.listeners {
            listener(tones);
        }
        self.last_tones = Some(tones);
        Some(tones)
    }
}

impl MessageSink for PitchTracker {
    fn receive(&mut self, message: &[u8]) {
        PitchTracker::receive(self, message);
    }
}
