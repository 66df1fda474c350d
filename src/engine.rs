use crate::audio::{Parameter, RenderCommand, RenderLink, RenderNotification, Renderer, SynthGraph};
use crate::config::{SynthConfig, TuningConfig};
use crate::error::{EngineError, Error};
use crate::events::RawMessage;
use crate::midi::{self, ParseWarning};
use crate::session::Session;
use crate::timing::StartOutcome;
use crate::tracker::{CombinationTones, PitchTracker, validate_channels};
use crate::tuning::{self, TuningHandle};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How often the engine drains render notifications while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub enum EngineCommand {
    LoadFile(PathBuf),
    Play,
    Stop,
    SetTuning(TuningConfig),
    SetChannels { channel_a: u8, channel_b: u8 },
    SetParameter { parameter: Parameter, value: f64 },
    /// Applies a reloaded config: tuning, channels, volumes and envelope
    /// level take effect now, the rest on restart.
    ApplyConfig(Box<SynthConfig>),
    LiveMessage(RawMessage),
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum EngineUpdate {
    ScoreLoaded {
        file_name: String,
        events: usize,
        duration_seconds: f64,
        warnings: Vec<ParseWarning>,
    },
    PlaybackState { playing: bool },
    PlaybackFinished,
    Tones(CombinationTones),
    Error { message: String },
}

pub struct EngineHandle {
    pub command_tx: Sender<EngineCommand>,
    pub update_rx: Receiver<EngineUpdate>,
}

impl EngineHandle {
    pub fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.command_tx
            .send(command)
            .map_err(|_| EngineError::Disconnected)
    }

    pub fn commands(&self) -> Sender<EngineCommand> {
        self.command_tx.clone()
    }
}

pub fn spawn_engine(config: SynthConfig) -> EngineHandle {
    let (command_tx, command_rx) = crossbeam::channel::unbounded();
    let (update_tx, update_rx) = crossbeam::channel::unbounded();

    std::thread::spawn(move || {
        engine_thread(config, command_rx, update_tx);
    });

    EngineHandle {
        command_tx,
        update_rx,
    }
}

struct AudioOutput {
    _stream: cpal::Stream,
    link: RenderLink,
}

impl AudioOutput {
    fn send(&mut self, command: RenderCommand) {
        if let Err(command) = self.link.send(command) {
            warn!(?command, "render queue full, command dropped");
        }
    }

    fn set_envelopes(&mut self, level: f64) {
        self.send(RenderCommand::SetParameter(Parameter::EnvelopeA, level));
        self.send(RenderCommand::SetParameter(Parameter::EnvelopeB, level));
    }
}

struct EngineState {
    config: SynthConfig,
    tuning: TuningHandle,
    session: Session,
    audio: Option<AudioOutput>,
    update_tx: Sender<EngineUpdate>,
}

impl EngineState {
    fn publish(&self, update: EngineUpdate) {
        let _ = self.update_tx.send(update);
    }

    fn report(&self, message: String) {
        error!("{message}");
        self.publish(EngineUpdate::Error { message });
    }

    fn load_file(&mut self, path: &Path) {
        let score = match midi::parse_file(path) {
            Ok(score) => score,
            Err(e) => {
                self.report(format!("Failed to load {}: {e}", path.display()));
                return;
            }
        };
        let file_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let duration_seconds = score.duration_seconds();
        let event_count = score.events.len();
        let was_playing = self.session.is_playing();
        let events = self.session.load(file_name.clone(), score.events);
        info!(
            file = %file_name,
            format = score.header.format,
            tracks = score.header.tracks,
            events = event_count,
            duration_seconds,
            "score loaded"
        );

        if let Some(audio) = self.audio.as_mut() {
            if was_playing {
                audio.set_envelopes(0.0);
            }
            audio.send(RenderCommand::Load(events));
        }
        if was_playing {
            self.publish(EngineUpdate::PlaybackState { playing: false });
        }
        self.publish(EngineUpdate::ScoreLoaded {
            file_name,
            events: event_count,
            duration_seconds,
            warnings: score.warnings,
        });
    }

    fn play(&mut self) {
        let events = match self.session.events() {
            Some(events) if self.session.has_score() => events.clone(),
            _ => {
                self.report("Nothing to play: no score loaded".into());
                return;
            }
        };
        if self.session.is_playing() {
            info!("already playing");
            return;
        }
        if self.audio.is_none() {
            match setup_audio(&self.config, self.tuning.clone()) {
                Ok(audio) => {
                    self.audio = Some(audio);
                    self.session.initialize();
                }
                Err(e) => {
                    self.report(format!("Failed to start audio: {e}"));
                    return;
                }
            }
        }
        let Some(audio) = self.audio.as_mut() else {
            return;
        };

        audio.set_envelopes(self.config.envelope_level);
        audio.send(RenderCommand::Load(events));
        audio.send(RenderCommand::Start);
        self.session.set_playing(true);
        info!(status = %self.session.status_line(), "playback started");
        self.publish(EngineUpdate::PlaybackState { playing: true });
    }

    fn stop(&mut self) {
        if !self.session.is_playing() {
            return;
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.set_envelopes(0.0);
            audio.send(RenderCommand::Stop);
        }
        self.session.set_playing(false);
        self.publish(EngineUpdate::PlaybackState { playing: false });
    }

    fn set_tuning(&mut self, tuning: TuningConfig) {
        match tuning.build() {
            Ok(built) => {
                debug!(?built, "tuning replaced");
                self.tuning.store(Arc::new(built));
                self.config.tuning = tuning;
            }
            Err(e) => self.report(format!("Invalid tuning: {e}")),
        }
    }

    fn set_channels(&mut self, channel_a: u8, channel_b: u8) {
        if let Err(e) = validate_channels(channel_a, channel_b) {
            self.report(format!("Invalid channels: {e}"));
            return;
        }
        self.config.channel_a = channel_a;
        self.config.channel_b = channel_b;
        if let Some(audio) = self.audio.as_mut() {
            audio.send(RenderCommand::SetChannels(channel_a, channel_b));
        }
    }

    fn apply_config(&mut self, config: SynthConfig) {
        if let Err(e) = config.validate() {
            self.report(format!("Config not applied: {e}"));
            return;
        }
        if self.audio.is_some() {
            let pending = self.config.restart_only_changes(&config);
            if !pending.is_empty() {
                warn!(sections = ?pending, "config changes take effect on restart");
            }
        }

        if config.tuning != self.config.tuning {
            self.set_tuning(config.tuning.clone());
        }
        // Switching channels silences both carriers.
        if (config.channel_a, config.channel_b) != (self.config.channel_a, self.config.channel_b) {
            self.set_channels(config.channel_a, config.channel_b);
        }
        for (parameter, value) in [
            (Parameter::MasterVolume, config.master_volume),
            (Parameter::MasterVolumeLeft, config.master_volume_left),
            (Parameter::MasterVolumeRight, config.master_volume_right),
        ] {
            self.send_to_renderer(RenderCommand::SetParameter(parameter, value));
        }
        if self.session.is_playing() {
            if let Some(audio) = self.audio.as_mut() {
                audio.set_envelopes(config.envelope_level);
            }
        }
        self.config = config;
        info!("config applied");
    }

    fn send_to_renderer(&mut self, command: RenderCommand) {
        if let Some(audio) = self.audio.as_mut() {
            audio.send(command);
        }
    }

    fn drain_notifications(&mut self) {
        let mut finished = false;
        let mut latest_tones = None;
        if let Some(audio) = self.audio.as_mut() {
            while let Some(notification) = audio.link.poll() {
                match notification {
                    RenderNotification::PlaybackFinished => finished = true,
                    RenderNotification::StartIgnored(StartOutcome::AlreadyPlaying) => {
                        info!("start ignored: already playing");
                    }
                    RenderNotification::StartIgnored(outcome) => {
                        warn!(?outcome, "start ignored");
                    }
                    RenderNotification::Retired(events) => {
                        debug!(events = events.len(), "released previous score");
                    }
                    RenderNotification::Tones(tones) => {
                        debug!(
                            f1 = tones.f1,
                            f2 = tones.f2,
                            frequency_a = tones.frequency_a,
                            frequency_b = tones.frequency_b,
                            "carrier frequencies"
                        );
                        latest_tones = Some(tones);
                    }
                }
            }
            if finished {
                audio.set_envelopes(0.0);
                audio.send(RenderCommand::SetParameter(Parameter::FrequencyA, 0.0));
                audio.send(RenderCommand::SetParameter(Parameter::FrequencyB, 0.0));
            }
        }

        if let Some(tones) = latest_tones {
            self.publish(EngineUpdate::Tones(tones));
        }
        if finished {
            self.session.set_playing(false);
            info!("playback finished");
            self.publish(EngineUpdate::PlaybackFinished);
            self.publish(EngineUpdate::PlaybackState { playing: false });
        }
    }

    fn shutdown(&mut self) {
        self.stop();
        self.audio = None;
        self.session.teardown();
        info!("engine stopped");
    }
}

fn engine_thread(
    config: SynthConfig,
    command_rx: Receiver<EngineCommand>,
    update_tx: Sender<EngineUpdate>,
) {
    let tuning = match config.tuning.build() {
        Ok(tuning) => tuning,
        Err(e) => {
            let message = format!("Invalid tuning, using 12-TET: {e}");
            warn!("{message}");
            let _ = update_tx.send(EngineUpdate::Error { message });
            tuning::Tuning::default()
        }
    };
    let mut state = EngineState {
        config,
        tuning: tuning::shared(tuning),
        session: Session::new(),
        audio: None,
        update_tx,
    };

    loop {
        match command_rx.recv_timeout(POLL_INTERVAL) {
            Ok(EngineCommand::LoadFile(path)) => state.load_file(&path),
            Ok(EngineCommand::Play) => state.play(),
            Ok(EngineCommand::Stop) => state.stop(),
            Ok(EngineCommand::SetTuning(tuning)) => state.set_tuning(tuning),
            Ok(EngineCommand::SetChannels {
                channel_a,
                channel_b,
            }) => state.set_channels(channel_a, channel_b),
            Ok(EngineCommand::SetParameter { parameter, value }) => {
                state.send_to_renderer(RenderCommand::SetParameter(parameter, value));
            }
            Ok(EngineCommand::ApplyConfig(config)) => state.apply_config(*config),
            Ok(EngineCommand::LiveMessage(message)) => {
                state.send_to_renderer(RenderCommand::Message(message));
            }
            Ok(EngineCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                state.shutdown();
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        state.drain_notifications();
    }
}

fn setup_audio(config: &SynthConfig, tuning: TuningHandle) -> Result<AudioOutput, Error> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(EngineError::NoOutputDevice)?;
    let supported = device.default_output_config().map_err(EngineError::from)?;
    let stream_config: cpal::StreamConfig = supported.into();

    let channels = stream_config.channels as usize;
    let sample_rate = stream_config.sample_rate as f64;
    info!(channels, sample_rate, "audio output");

    let tracker = PitchTracker::new(config.channel_a, config.channel_b, tuning)?;
    let graph = SynthGraph::new(config, sample_rate);
    let (mut renderer, link) = Renderer::new(graph, tracker, sample_rate);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                renderer.render(data, channels);
            },
            |err| error!(%err, "audio stream error"),
            None,
        )
        .map_err(EngineError::from)?;
    stream.play().map_err(EngineError::from)?;

    Ok(AudioOutput {
        _stream: stream,
        link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn state() -> (EngineState, Receiver<EngineUpdate>) {
        let (update_tx, update_rx) = crossbeam::channel::unbounded();
        let state = EngineState {
            config: SynthConfig::default(),
            tuning: tuning::shared(tuning::Tuning::default()),
            session: Session::new(),
            audio: None,
            update_tx,
        };
        (state, update_rx)
    }

    #[test]
    fn play_without_score_reports_error() {
        let (mut state, updates) = state();
        state.play();
        assert!(matches!(updates.try_recv(), Ok(EngineUpdate::Error { .. })));
        assert!(!state.session.is_playing());
    }

    #[test]
    fn apply_config_swaps_tuning_and_channels() {
        let (mut state, updates) = state();
        let mut config = SynthConfig::default();
        config.channel_a = 4;
        config.channel_b = 9;
        config.master_volume = 0.3;
        config.tuning = TuningConfig::EqualTemperament {
            reference_frequency: 432.0,
        };

        state.apply_config(config.clone());
        assert_eq!(state.config, config);
        assert_relative_eq!(state.tuning.load().frequency(69), 432.0);
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn invalid_config_is_rejected_whole() {
        let (mut state, updates) = state();
        let mut config = SynthConfig::default();
        config.channel_a = 2;
        config.channel_b = 2;
        config.tuning = TuningConfig::EqualTemperament {
            reference_frequency: 432.0,
        };

        state.apply_config(config);
        assert!(matches!(updates.try_recv(), Ok(EngineUpdate::Error { .. })));
        assert_eq!(state.config, SynthConfig::default());
        assert_relative_eq!(state.tuning.load().frequency(69), 440.0);
    }
}
