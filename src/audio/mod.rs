mod graph;
mod multiply;
mod oscillator;
mod renderer;
mod signal;
mod smoothing;
mod stereo;

pub use graph::{MAX_QUANTUM, Parameter, SynthGraph};
pub use multiply::multiply;
pub use oscillator::{
    DEFAULT_ROLLOFF_DB_PER_OCTAVE, DEFAULT_ROLLOFF_THRESHOLD_HZ, Oscillator, Rolloff, Wave,
};
pub use renderer::{RenderCommand, RenderLink, RenderNotification, Renderer};
pub use signal::{ControlSignal, ValueSink};
pub use smoothing::SmoothingFilter;
pub use stereo::{ChannelMode, StereoCombiner, interleave};
