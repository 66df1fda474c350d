use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Anything that can take a control value, such as a frequency or a gain.
pub trait ValueSink: Send {
    fn accept(&mut self, value: f64);
}

/// A single `f64` shared between a writer and the render graph. Reads and
/// writes are lock-free; each quantum sees whatever value was last stored.
#[derive(Debug, Clone, Default)]
pub struct ControlSignal(Arc<AtomicU64>);

impl ControlSignal {
    pub fn new(value: f64) -> Self {
        Self(Arc::new(AtomicU64::new(value.to_bits())))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Writes the current value into every sample of `output`.
    pub fn fill(&self, output: &mut [f32]) {
        output.fill(self.get() as f32);
    }
}

impl ValueSink for ControlSignal {
    fn accept(&mut self, value: f64) {
        self.set(value);
    }
}
