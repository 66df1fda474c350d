/// Elementwise product of two streams. A missing input, or the tail of a
/// shorter one, counts as zero.
pub fn multiply(a: Option<&[f32]>, b: Option<&[f32]>, output: &mut [f32]) {
    let (Some(a), Some(b)) = (a, b) else {
        output.fill(0.0);
        return;
    };
    for (i, out) in output.iter_mut().enumerate() {
        *out = match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => x * y,
            _ => 0.0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_envelope() {
        let mut out = [0.0f32; 3];
        multiply(Some(&[1.0, -1.0, 0.5][..]), Some(&[0.5; 3][..]), &mut out);
        assert_eq!(out, [0.5, -0.5, 0.25]);
    }

    #[test]
    fn missing_or_short_inputs_are_zero() {
        let mut out = [7.0f32; 3];
        multiply(Some(&[1.0, 2.0, 3.0][..]), Some(&[2.0][..]), &mut out);
        assert_eq!(out, [2.0, 0.0, 0.0]);

        let mut out = [7.0f32; 2];
        multiply(None, Some(&[1.0, 1.0][..]), &mut out);
        assert_eq!(out, [0.0, 0.0]);
    }
}
