use std::sync::Arc;

use crate::events::TimedEvent;

/// Per-run state of the player: whether audio is up, what is loaded and
/// whether it is playing.
///
/// Lifecycle: `new` -> `initialize` once the output stream exists ->
/// any number of `load`/`set_playing` -> `teardown` when the stream goes
/// away. Loading is allowed before `initialize`.
#[derive(Debug, Default)]
pub struct Session {
    audio_enabled: bool,
    file_name: Option<String>,
    events: Option<Arc<[TimedEvent]>>,
    playing: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self) {
        self.audio_enabled = true;
    }

    pub fn teardown(&mut self) {
        self.audio_enabled = false;
        self.playing = false;
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    /// Replaces the loaded score wholesale. Playback of the old score, if
    /// any, is considered stopped.
    pub fn load(&mut self, file_name: impl Into<String>, events: Vec<TimedEvent>) -> Arc<[TimedEvent]> {
        let events: Arc<[TimedEvent]> = events.into();
        self.file_name = Some(file_name.into());
        self.events = Some(events.clone());
        self.playing = false;
        events
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn events(&self) -> Option<&Arc<[TimedEvent]>> {
        self.events.as_ref()
    }

    pub fn has_score(&self) -> bool {
        self.events.as_ref().is_some_and(|e| !e.is_empty())
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn status_line(&self) -> String {
        format!(
            "audio: {} | file: {} | {}",
            if self.audio_enabled { "on" } else { "off" },
            self.file_name.as_deref().unwrap_or("-"),
            if self.playing { "playing" } else { "stopped" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> TimedEvent {
        TimedEvent {
            time_seconds: 0.0,
            tick: 0,
            track: 0,
            message: vec![0x90, 60, 100],
        }
    }

    #[test]
    fn lifecycle() {
        let mut session = Session::new();
        assert!(!session.audio_enabled());
        assert!(!session.has_score());

        session.initialize();
        session.load("a.mid", vec![event()]);
        session.set_playing(true);
        assert_eq!(session.status_line(), "audio: on | file: a.mid | playing");

        session.teardown();
        assert!(!session.is_playing());
        assert!(session.has_score());
    }

    #[test]
    fn load_replaces_and_stops() {
        let mut session = Session::new();
        let first = session.load("a.mid", vec![event()]);
        session.set_playing(true);

        let second = session.load("b.mid", Vec::new());
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!session.is_playing());
        assert!(!session.has_score());
        assert_eq!(session.file_name(), Some("b.mid"));
    }
}
