mod clock;
mod scheduler;

pub use clock::{Clock, SampleClock};
pub use scheduler::{MessageSink, PlaybackState, QuantumOutcome, Scheduler, StartOutcome};
