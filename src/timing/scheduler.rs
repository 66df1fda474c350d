use std::sync::Arc;

use super::Clock;
use crate::events::TimedEvent;

/// Receives raw messages as the scheduler dispatches them.
pub trait MessageSink {
    fn receive(&mut self, message: &[u8]);
}

impl<F: FnMut(&[u8])> MessageSink for F {
    fn receive(&mut self, message: &[u8]) {
        self(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loaded,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyPlaying,
    NothingLoaded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuantumOutcome {
    pub dispatched: usize,
    /// Set exactly once per playback, on the quantum that dispatched the
    /// final event.
    pub finished: bool,
}

/// Walks a time-sorted event list against a clock, one render quantum at a
/// time. Never allocates or frees: replaced lists are handed back to the
/// caller to be dropped elsewhere.
#[derive(Debug)]
pub struct Scheduler {
    events: Option<Arc<[TimedEvent]>>,
    state: PlaybackState,
    cursor: usize,
    start_time: f64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            events: None,
            state: PlaybackState::Idle,
            cursor: 0,
            start_time: 0.0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Replaces the event list, stopping playback if it was running.
    /// Returns the previous list, if any.
    pub fn load(&mut self, events: Arc<[TimedEvent]>) -> Option<Arc<[TimedEvent]>> {
        self.cursor = 0;
        self.state = if events.is_empty() {
            PlaybackState::Idle
        } else {
            PlaybackState::Loaded
        };
        self.events.replace(events)
    }

    pub fn start(&mut self, clock: &impl Clock) -> StartOutcome {
        match self.state {
            PlaybackState::Playing => StartOutcome::AlreadyPlaying,
            PlaybackState::Idle => StartOutcome::NothingLoaded,
            PlaybackState::Loaded => {
                self.start_time = clock.now();
                self.cursor = 0;
                self.state = PlaybackState::Playing;
                StartOutcome::Started
            }
        }
    }

    /// Returns whether playback was running.
    pub fn stop(&mut self) -> bool {
        let was_playing = self.state == PlaybackState::Playing;
        if was_playing {
            self.state = PlaybackState::Loaded;
        }
        self.cursor = 0;
        was_playing
    }

    /// Dispatches, in list order, every pending event whose time has been
    /// reached.
    pub fn process_quantum(
        &mut self,
        clock: &impl Clock,
        sink: &mut impl MessageSink,
    ) -> QuantumOutcome {
        let mut outcome = QuantumOutcome::default();
        if self.state != PlaybackState::Playing {
            return outcome;
        }
        let Some(events) = self.events.as_deref() else {
            return outcome;
        };

        let elapsed = clock.now() - self.start_time;
        while let Some(event) = events.get(self.cursor) {
            if event.time_seconds > elapsed {
                break;
            }
            sink.receive(&event.message);
            self.cursor += 1;
            outcome.dispatched += 1;
        }

        if self.cursor >= events.len() {
            self.cursor = 0;
            self.state = PlaybackState::Loaded;
            outcome.finished = true;
        }
        outcome
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
