/// Channels the state vector is sized for up front, so the usual mono and
/// stereo paths never allocate while rendering.
const RESERVED_CHANNELS: usize = 2;

/// One-pole smoother:
/// `current = (wc * current + wt * target) / (wc + wt)` per sample.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    current_weight: f64,
    target_weight: f64,
    values: Vec<f64>,
}

impl SmoothingFilter {
    /// Weights that sum to zero, or are not finite, give a pass-through
    /// filter.
    pub fn new(current_weight: f64, target_weight: f64) -> Self {
        let usable = current_weight.is_finite()
            && target_weight.is_finite()
            && current_weight + target_weight != 0.0;
        let (current_weight, target_weight) = if usable {
            (current_weight, target_weight)
        } else {
            (0.0, 1.0)
        };
        Self {
            current_weight,
            target_weight,
            values: Vec::with_capacity(RESERVED_CHANNELS),
        }
    }

    pub fn is_pass_through(&self) -> bool {
        self.current_weight == 0.0
    }

    /// Smoothed value per channel, as of the last processed sample.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Processes one quantum. Channel `c` of `outputs` follows channel `c`
    /// of `inputs`; a channel whose lengths disagree is written as silence.
    pub fn process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        let channels = inputs.len().min(outputs.len());
        if channels == 0 {
            return;
        }
        if self.values.len() != channels {
            self.reshape(inputs, channels);
        }

        let total = self.current_weight + self.target_weight;
        for c in 0..channels {
            let input = inputs[c];
            let output = &mut *outputs[c];
            if input.len() != output.len() {
                output.fill(0.0);
                continue;
            }

            let mut current = self.values[c];
            if !current.is_finite() {
                current = input.first().map_or(0.0, |&x| x as f64);
                if !current.is_finite() {
                    current = 0.0;
                }
            }

            for (out, &target) in output.iter_mut().zip(input) {
                let target = target as f64;
                if target.is_finite() {
                    let next = (self.current_weight * current + self.target_weight * target) / total;
                    current = if next.is_finite() { next } else { target };
                }
                *out = current as f32;
            }
            self.values[c] = current;
        }
    }

    pub fn process_mono(&mut self, input: &[f32], output: &mut [f32]) {
        self.process(&[input], &mut [output]);
    }

    fn reshape(&mut self, inputs: &[&[f32]], channels: usize) {
        let kept = self.values.len().min(channels);
        self.values.truncate(kept);
        for input in &inputs[kept..channels] {
            let seed = input
                .first()
                .map(|&x| x as f64)
                .filter(|x| x.is_finite())
                .unwrap_or(0.0);
            self.values.push(seed);
        }
    }
}
