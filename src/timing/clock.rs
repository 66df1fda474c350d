/// Monotonic time source, in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Clock driven by rendered frames rather than wall time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleClock {
    frames: u64,
    sample_rate: f64,
}

impl SampleClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            frames: 0,
            sample_rate,
        }
    }

    pub fn advance(&mut self, frames: u64) {
        self.frames += frames;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Clock for SampleClock {
    fn now(&self) -> f64 {
        self.frames as f64 / self.sample_rate
    }
}

/// A fixed instant; handy for driving the scheduler by hand.
impl Clock for f64 {
    fn now(&self) -> f64 {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_clock_counts_frames() {
        let mut clock = SampleClock::new(48_000.0);
        assert_eq!(clock.now(), 0.0);
        clock.advance(24_000);
        clock.advance(24_000);
        assert_eq!(clock.frames(), 48_000);
        assert_eq!(clock.now(), 1.0);
    }
}
