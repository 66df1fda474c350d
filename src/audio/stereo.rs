use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMode {
    /// Both paths summed into both outputs.
    #[default]
    Mono,
    /// Path A to the left output, path B to the right.
    Stereo,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StereoCombiner {
    mode: ChannelMode,
}

impl StereoCombiner {
    pub fn new(mode: ChannelMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    pub fn process(&self, a: &[f32], b: &[f32], left: &mut [f32], right: &mut [f32]) {
        let sample = |path: &[f32], i: usize| path.get(i).copied().unwrap_or(0.0);
        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            match self.mode {
                ChannelMode::Mono => {
                    let sum = sample(a, i) + sample(b, i);
                    *l = sum;
                    *r = sum;
                }
                ChannelMode::Stereo => {
                    *l = sample(a, i);
                    *r = sample(b, i);
                }
            }
        }
    }
}

/// Writes a left/right pair into an interleaved device buffer with
/// `channels` channels per frame. Mono devices get the average; channels
/// beyond the second are silent.
pub fn interleave(left: &[f32], right: &[f32], data: &mut [f32], channels: usize) {
    if channels == 0 {
        return;
    }
    for ((frame, &l), &r) in data.chunks_mut(channels).zip(left).zip(right) {
        match frame {
            [mono] => *mono = 0.5 * (l + r),
            [first, second, rest @ ..] => {
                *first = l;
                *second = r;
                rest.fill(0.0);
            }
            [] => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_sums_into_both() {
        let combiner = StereoCombiner::new(ChannelMode::Mono);
        let (mut l, mut r) = ([0.0f32; 2], [0.0f32; 2]);
        combiner.process(&[0.25, 0.5], &[0.5, -0.5], &mut l, &mut r);
        assert_eq!(l, [0.75, 0.0]);
        assert_eq!(r, l);
    }

    #[test]
    fn stereo_keeps_paths_apart() {
        let combiner = StereoCombiner::new(ChannelMode::Stereo);
        let (mut l, mut r) = ([0.0f32; 2], [0.0f32; 2]);
        combiner.process(&[0.25, 0.5], &[0.5], &mut l, &mut r);
        assert_eq!(l, [0.25, 0.5]);
        assert_eq!(r, [0.5, 0.0]);
    }

    #[test]
    fn interleaves_for_any_channel_count() {
        let mut stereo = [9.0f32; 4];
        interleave(&[1.0, 2.0], &[3.0, 4.0], &mut stereo, 2);
        assert_eq!(stereo, [1.0, 3.0, 2.0, 4.0]);

        let mut mono = [9.0f32; 2];
        interleave(&[1.0, 2.0], &[3.0, 4.0], &mut mono, 1);
        assert_eq!(mono, [2.0, 3.0]);

        let mut quad = [9.0f32; 4];
        interleave(&[1.0], &[3.0], &mut quad, 4);
        assert_eq!(quad, [1.0, 3.0, 0.0, 0.0]);
    }
}
