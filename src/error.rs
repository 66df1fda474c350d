use thiserror::Error;

/// Fatal problems in a Standard MIDI File. No partial event list is ever
/// returned alongside one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("missing MThd header")]
    MissingHeader,

    #[error("invalid header length {0}")]
    InvalidHeaderLength(u32),

    #[error("track {track}: missing MTrk header at offset {offset}")]
    MissingTrackHeader { track: usize, offset: usize },

    #[error("track {track}: declared length {length} exceeds file size")]
    TrackLengthExceedsFile { track: usize, length: u32 },

    #[error("unexpected end of data at offset {offset}")]
    Truncated { offset: usize },

    #[error("variable length quantity exceeds 4 bytes at offset {offset}")]
    VlqTooLong { offset: usize },

    #[error("running status used before any status byte at offset {offset}")]
    RunningStatusWithoutStatus { offset: usize },

    #[error("status byte {status:#04x} at offset {offset} has no known length")]
    UndeterminedLength { status: u8, offset: usize },

    #[error("division field is zero")]
    ZeroDivision,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TuningError {
    #[error("scale needs at least one pitch class")]
    EmptyScale,

    #[error("period must be finite and greater than 1, got {0}")]
    InvalidPeriod(f64),

    #[error("generator must be finite and positive, got {0}")]
    InvalidGenerator(f64),

    #[error("ratio {value} at index {index} is outside [1, period) or out of order")]
    InvalidRatio { index: usize, value: f64 },

    #[error("first ratio must be exactly 1.0, got {0}")]
    FirstRatioNotUnison(f64),

    #[error("cannot choose {elements} of {generators} generators")]
    InvalidCombination { elements: usize, generators: usize },

    #[error("too many generators ({0})")]
    TooManyGenerators(usize),

    #[error("expected {expected} temperament units summing to a finite non-zero value")]
    InvalidTemperamentUnits { expected: usize },

    #[error("reduction index {index} out of range for {len} products")]
    ReductionIndexOutOfRange { index: usize, len: usize },

    #[error("tonic transposition must be finite and positive, got {0}")]
    InvalidTransposition(f64),

    #[error("reference frequency must be finite and positive, got {0}")]
    InvalidReferenceFrequency(f64),

    #[error("comma must be finite and positive, got {0}")]
    InvalidComma(f64),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid MIDI channel {0}, expected 0-15")]
    InvalidChannel(u8),

    #[error("channels A and B must differ, both are {0}")]
    SameChannels(u8),

    #[error("invalid tuning: {0}")]
    Tuning(#[from] TuningError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("config write error: {0}")]
    Write(#[from] ron::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no output device")]
    NoOutputDevice,

    #[error("default stream config: {0}")]
    StreamConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("build stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("play stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("MIDI input: {0}")]
    MidiInput(String),

    #[error("engine thread is gone")]
    Disconnected,
}

impl From<midir::InitError> for EngineError {
    fn from(e: midir::InitError) -> Self {
        EngineError::MidiInput(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiInput>> for EngineError {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        EngineError::MidiInput(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("MIDI format error: {0}")]
    Format(#[from] FormatError),

    #[error(transparent)]
    Tuning(#[from] TuningError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
