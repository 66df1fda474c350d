use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use combitone::midi::connect_input;
use combitone::{EngineCommand, EngineUpdate, SynthConfig, spawn_engine};
use crossbeam::channel::Sender;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "combitone")]
#[command(version, about = "Plays a MIDI file as a pair of combination-tone carriers")]
struct Args {
    /// Standard MIDI File to play
    score: PathBuf,

    /// Synth configuration (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reload the score and config when they change on disk
    #[arg(long)]
    watch: bool,

    /// Also track notes from this MIDI input port
    #[arg(long)]
    midi_in: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> combitone::Result<()> {
    let config = match &args.config {
        Some(path) => SynthConfig::load(path)?,
        None => SynthConfig::default(),
    };
    config.validate()?;

    let engine = spawn_engine(config);
    engine.send(EngineCommand::LoadFile(args.score.clone()))?;

    let _score_watcher = args
        .watch
        .then(|| watch(&args.score, engine.commands(), reload_score))
        .transpose()?;
    let _config_watcher = match (&args.config, args.watch) {
        (Some(path), true) => Some(watch(path, engine.commands(), reload_config)?),
        _ => None,
    };
    let _midi_input = match &args.midi_in {
        Some(name) => Some(connect_input(name, engine.commands())?),
        None => None,
    };
    let keep_running = args.watch || args.midi_in.is_some();

    for update in engine.update_rx.iter() {
        match update {
            EngineUpdate::ScoreLoaded {
                file_name,
                events,
                duration_seconds,
                warnings,
            } => {
                info!(
                    file = %file_name,
                    events,
                    duration_seconds,
                    warnings = warnings.len(),
                    "ready"
                );
                engine.send(EngineCommand::Play)?;
            }
            EngineUpdate::PlaybackState { playing } => debug!(playing, "playback state"),
            EngineUpdate::Tones(tones) => {
                debug!(f1 = tones.f1, f2 = tones.f2, "combination tones");
            }
            EngineUpdate::PlaybackFinished => {
                if !keep_running {
                    break;
                }
            }
            EngineUpdate::Error { message } => {
                if !keep_running {
                    engine.send(EngineCommand::Shutdown)?;
                    return Err(std::io::Error::other(message).into());
                }
            }
        }
    }

    engine.send(EngineCommand::Shutdown)?;
    Ok(())
}

type Reload = fn(&Path, &Sender<EngineCommand>);

fn watch(
    path: &Path,
    commands: Sender<EngineCommand>,
    reload: Reload,
) -> combitone::Result<RecommendedWatcher> {
    let path_owned = path.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) if event.kind.is_modify() => {
                info!(path = %path_owned.display(), "file changed, reloading");
                reload(&path_owned, &commands);
            }
            Ok(_) => {}
            Err(e) => warn!("watch error: {e}"),
        },
        Config::default(),
    )
    .map_err(std::io::Error::other)?;
    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(std::io::Error::other)?;
    info!(path = %path.display(), "watching");
    Ok(watcher)
}

fn reload_score(path: &Path, commands: &Sender<EngineCommand>) {
    let _ = commands.send(EngineCommand::LoadFile(path.to_path_buf()));
}

fn reload_config(path: &Path, commands: &Sender<EngineCommand>) {
    match SynthConfig::load(path).and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => {
            let _ = commands.send(EngineCommand::ApplyConfig(Box::new(config)));
        }
        Err(e) => warn!("config not reloaded: {e}"),
    }
}
