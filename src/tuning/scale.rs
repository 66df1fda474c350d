use crate::error::TuningError;

/// Absolute tolerance under which two ratios count as the same step.
pub const DUPLICATE_TOLERANCE: f64 = 0.001;
pub const MAX_GENERATORS: usize = 16;
const OCTAVE: f64 = 2.0;

/// Ratios of one period of a scale, ascending, starting at exactly `1.0`
/// and staying below `period`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleTable {
    ratios: Vec<f64>,
    period: f64,
}

impl ScaleTable {
    pub fn new(ratios: Vec<f64>, period: f64) -> Result<Self, TuningError> {
        check_period(period)?;
        let first = *ratios.first().ok_or(TuningError::EmptyScale)?;
        if first != 1.0 {
            return Err(TuningError::FirstRatioNotUnison(first));
        }
        let mut previous = 1.0;
        for (index, &value) in ratios.iter().enumerate() {
            if !(value >= previous && value < period) {
                return Err(TuningError::InvalidRatio { index, value });
            }
            previous = value;
        }
        Ok(Self { ratios, period })
    }

    /// Stacks `generator` `pitch_classes` times, folding each power into one
    /// period.
    pub fn period_and_generator(
        pitch_classes: usize,
        period: f64,
        generator: f64,
    ) -> Result<Self, TuningError> {
        if pitch_classes == 0 {
            return Err(TuningError::EmptyScale);
        }
        check_period(period)?;
        check_generator(generator)?;

        let ratios = (0..pitch_classes)
            .map(|i| reduce(generator.powi(i as i32), period))
            .collect();
        Self::new(sorted(ratios), period)
    }

    /// All `2^k` products of subsets of the generators, octave reduced.
    pub fn euler_fokker_genus(
        generators: &[f64],
        remove_duplicates: bool,
    ) -> Result<Self, TuningError> {
        check_generators(generators)?;

        let ratios = (0..1usize << generators.len())
            .map(|mask| reduce(subset_product(generators, mask), OCTAVE))
            .collect();
        Self::finish(ratios, OCTAVE, remove_duplicates)
    }

    /// Products of every `elements`-sized subset, divided by the product at
    /// `reduction_index` (in subset enumeration order) and octave reduced.
    pub fn combination_product_set(
        generators: &[f64],
        elements: usize,
        reduction_index: usize,
        remove_duplicates: bool,
    ) -> Result<Self, TuningError> {
        check_generators(generators)?;
        if elements > generators.len() {
            return Err(TuningError::InvalidCombination {
                elements,
                generators: generators.len(),
            });
        }

        let products: Vec<f64> = (0..1usize << generators.len())
            .filter(|mask| mask.count_ones() as usize == elements)
            .map(|mask| subset_product(generators, mask))
            .collect();
        let reduction = *products.get(reduction_index).ok_or(
            TuningError::ReductionIndexOutOfRange {
                index: reduction_index,
                len: products.len(),
            },
        )?;

        let ratios = products
            .into_iter()
            .map(|p| reduce(p / reduction, OCTAVE))
            .collect();
        Self::finish(ratios, OCTAVE, remove_duplicates)
    }

    /// A chain of generators where each step is narrowed by its share of
    /// `comma`: step `i` is divided by `comma^(units[i] / sum(units))`.
    pub fn temperament(
        pitch_classes: usize,
        units: &[f64],
        period: f64,
        generator: f64,
        comma: f64,
    ) -> Result<Self, TuningError> {
        if pitch_classes == 0 {
            return Err(TuningError::EmptyScale);
        }
        check_period(period)?;
        check_generator(generator)?;
        if !(comma.is_finite() && comma > 0.0) {
            return Err(TuningError::InvalidComma(comma));
        }
        let base: f64 = units.iter().sum();
        if units.len() != pitch_classes || !base.is_finite() || base == 0.0 {
            return Err(TuningError::InvalidTemperamentUnits {
                expected: pitch_classes,
            });
        }

        let mut ratios = Vec::with_capacity(pitch_classes);
        ratios.push(1.0);
        for &unit in &units[1..] {
            let previous = ratios[ratios.len() - 1];
            let tempered = previous * generator / comma.powf(unit / base);
            ratios.push(reduce(tempered, period));
        }
        Self::new(sorted(ratios), period)
    }

    /// Inverts every interval of the scale within its period.
    pub fn mirror(&self) -> Self {
        let n = self.ratios.len();
        let mut ratios = Vec::with_capacity(n);
        ratios.push(1.0);
        for i in 1..n {
            ratios.push(reduce(self.period / self.ratios[n - i], self.period));
        }
        Self {
            ratios: sorted(ratios),
            period: self.period,
        }
    }

    fn finish(ratios: Vec<f64>, period: f64, remove_duplicates: bool) -> Result<Self, TuningError> {
        let ratios = if remove_duplicates {
            dedup_within(ratios, DUPLICATE_TOLERANCE)
        } else {
            ratios
        };
        Self::new(sorted(ratios), period)
    }

    pub fn ratios(&self) -> &[f64] {
        &self.ratios
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    /// Frequency of scale step `step`, counted from `reference_frequency`.
    ///
    /// The step is first shifted by the number of scale steps closest to
    /// `tonic_transposition`, then split into a whole number of periods
    /// (floor) and an index inside the table (truncation).
    pub fn nth_step(&self, step: i64, reference_frequency: f64, tonic_transposition: f64) -> f64 {
        let transposed = step as f64 - self.transposition_steps(tonic_transposition);
        self.frequency_at(transposed, reference_frequency, tonic_transposition)
    }

    /// Like [`nth_step`](Self::nth_step) but for an arbitrary interval ratio
    /// above the reference. `None` for non-positive or non-finite intervals.
    pub fn pitch_of_interval(
        &self,
        interval: f64,
        reference_frequency: f64,
        tonic_transposition: f64,
    ) -> Option<f64> {
        if !(interval.is_finite() && interval > 0.0) {
            return None;
        }
        let length = self.ratios.len() as f64;
        let transposed = length * (interval.ln() / self.period.ln())
            - self.transposition_steps(tonic_transposition);
        Some(self.frequency_at(transposed, reference_frequency, tonic_transposition))
    }

    fn transposition_steps(&self, tonic_transposition: f64) -> f64 {
        let length = self.ratios.len() as f64;
        // Half-way cases round up.
        (length * (tonic_transposition.ln() / self.period.ln()) + 0.5).floor()
    }

    fn frequency_at(&self, transposed: f64, reference_frequency: f64, tonic_transposition: f64) -> f64 {
        let length = self.ratios.len() as f64;
        let equave = (transposed / length).floor();
        let index = (transposed - equave * length).trunc() as usize;
        // Rounding in the subtraction can land exactly on `length`.
        let index = index.min(self.ratios.len() - 1);
        reference_frequency * self.ratios[index] * self.period.powf(equave) * tonic_transposition
    }
}

fn check_period(period: f64) -> Result<(), TuningError> {
    if period.is_finite() && period > 1.0 {
        Ok(())
    } else {
        Err(TuningError::InvalidPeriod(period))
    }
}

fn check_generator(generator: f64) -> Result<(), TuningError> {
    if generator.is_finite() && generator > 0.0 {
        Ok(())
    } else {
        Err(TuningError::InvalidGenerator(generator))
    }
}

fn check_generators(generators: &[f64]) -> Result<(), TuningError> {
    if generators.len() > MAX_GENERATORS {
        return Err(TuningError::TooManyGenerators(generators.len()));
    }
    generators.iter().try_for_each(|&g| check_generator(g))
}

fn subset_product(generators: &[f64], mask: usize) -> f64 {
    generators
        .iter()
        .enumerate()
        .filter(|(bit, _)| mask >> bit & 1 == 1)
        .map(|(_, g)| g)
        .product()
}

/// Folds `value` into `[1, period)`. Non-finite and non-positive values are
/// returned unchanged so the loops always terminate.
fn reduce(value: f64, period: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return value;
    }
    let mut value = value;
    while value >= period {
        value /= period;
    }
    while value < 1.0 {
        value *= period;
    }
    // A value a hair under unison can round up to the period itself.
    if value >= period { 1.0 } else { value }
}

fn sorted(mut ratios: Vec<f64>) -> Vec<f64> {
    ratios.sort_by(f64::total_cmp);
    ratios
}

/// Keeps the first of every group of values closer than `tolerance`.
fn dedup_within(values: Vec<f64>, tolerance: f64) -> Vec<f64> {
    let mut kept: Vec<f64> = Vec::with_capacity(values.len());
    for value in values {
        if !kept.iter().any(|k| (value - k).abs() < tolerance) {
            kept.push(value);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn equal_division(steps: usize, period: f64) -> ScaleTable {
        let ratios = (0..steps)
            .map(|i| period.powf(i as f64 / steps as f64))
            .collect();
        ScaleTable::new(ratios, period).unwrap()
    }

    fn assert_well_formed(table: &ScaleTable) {
        assert_eq!(table.ratios()[0], 1.0);
        assert!(table.ratios().windows(2).all(|w| w[0] <= w[1]));
        assert!(
            table
                .ratios()
                .iter()
                .all(|&r| (1.0..table.period()).contains(&r))
        );
    }

    #[test]
    fn pythagorean_scale_is_sorted_and_in_range() {
        let table = ScaleTable::period_and_generator(12, 2.0, 3.0).unwrap();
        assert_eq!(table.len(), 12);
        assert_well_formed(&table);
        assert!(table.ratios().contains(&1.5));
        assert!(table.ratios().contains(&1.125));
    }

    #[test]
    fn generator_below_one_is_folded_up() {
        let table = ScaleTable::period_and_generator(7, 2.0, 2.0 / 3.0).unwrap();
        assert_well_formed(&table);
        // (2/3)^1 folds to 4/3.
        assert!(table.ratios().iter().any(|&r| (r - 4.0 / 3.0).abs() < 1e-12));
    }

    #[test]
    fn non_octave_period() {
        let table = ScaleTable::period_and_generator(7, 1.5, 2.0).unwrap();
        assert_well_formed(&table);
        assert_eq!(table.period(), 1.5);
    }

    #[test]
    fn reduction_never_reaches_the_period() {
        let period = 1.5;
        let just_below_unison = f64::from_bits(1.0f64.to_bits() - 1);
        let reduced = reduce(just_below_unison / period, period);
        assert!((1.0..period).contains(&reduced));
    }

    proptest! {
        #[test]
        fn generated_tables_are_sorted_from_unison(
            pitch_classes in 1usize..=24,
            period in 1.05f64..4.0,
            generator in 0.2f64..8.0,
        ) {
            let table = ScaleTable::period_and_generator(pitch_classes, period, generator).unwrap();
            prop_assert_eq!(table.len(), pitch_classes);
            prop_assert_eq!(table.ratios()[0], 1.0);
            prop_assert!(table.ratios().windows(2).all(|w| w[0] <= w[1]));
            prop_assert!(table.ratios().iter().all(|&r| (1.0..period).contains(&r)));
        }
    }

    #[test]
    fn overflowing_generator_is_rejected_not_looped() {
        let err = ScaleTable::period_and_generator(2000, 2.0, 1e300).unwrap_err();
        assert!(matches!(err, TuningError::InvalidRatio { .. }));
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(
            ScaleTable::period_and_generator(0, 2.0, 1.5).unwrap_err(),
            TuningError::EmptyScale
        );
        assert_eq!(
            ScaleTable::period_and_generator(5, 1.0, 1.5).unwrap_err(),
            TuningError::InvalidPeriod(1.0)
        );
        assert!(matches!(
            ScaleTable::period_and_generator(5, 2.0, f64::NAN).unwrap_err(),
            TuningError::InvalidGenerator(_)
        ));
        assert!(matches!(
            ScaleTable::new(vec![1.0, 1.5, 1.2], 2.0).unwrap_err(),
            TuningError::InvalidRatio { index: 2, .. }
        ));
        assert_eq!(
            ScaleTable::new(vec![1.1], 2.0).unwrap_err(),
            TuningError::FirstRatioNotUnison(1.1)
        );
        assert!(ScaleTable::new(vec![1.0, 2.0], 2.0).is_err());
    }

    #[test]
    fn euler_fokker_genus_of_three_and_five() {
        let table = ScaleTable::euler_fokker_genus(&[3.0, 5.0], false).unwrap();
        assert_eq!(table.ratios(), &[1.0, 1.25, 1.5, 1.875]);
    }

    #[test]
    fn euler_fokker_genus_removes_duplicates() {
        let with = ScaleTable::euler_fokker_genus(&[3.0, 3.0], true).unwrap();
        assert_eq!(with.ratios(), &[1.0, 1.125, 1.5]);
        let without = ScaleTable::euler_fokker_genus(&[3.0, 3.0], false).unwrap();
        assert_eq!(without.len(), 4);
    }

    #[test]
    fn hexany_from_combination_product_set() {
        let table = ScaleTable::combination_product_set(&[1.0, 3.0, 5.0, 7.0], 2, 0, true).unwrap();
        let expected = [1.0, 7.0 / 6.0, 1.25, 35.0 / 24.0, 5.0 / 3.0, 1.75];
        assert_eq!(table.len(), expected.len());
        for (got, want) in table.ratios().iter().zip(expected) {
            assert_relative_eq!(*got, want, max_relative = 1e-12);
        }
    }

    #[test]
    fn combination_product_set_validates_indices() {
        assert!(matches!(
            ScaleTable::combination_product_set(&[3.0, 5.0], 3, 0, false).unwrap_err(),
            TuningError::InvalidCombination { .. }
        ));
        assert!(matches!(
            ScaleTable::combination_product_set(&[3.0, 5.0, 7.0], 2, 3, false).unwrap_err(),
            TuningError::ReductionIndexOutOfRange { index: 3, len: 3 }
        ));
        assert!(matches!(
            ScaleTable::euler_fokker_genus(&[3.0; 17], false).unwrap_err(),
            TuningError::TooManyGenerators(17)
        ));
    }

    #[test]
    fn tempered_fifths_stay_in_range() {
        let units = vec![-60.0; 12];
        let comma = 531_441.0 / 524_288.0;
        let table = ScaleTable::temperament(12, &units, 2.0, 1.5, comma).unwrap();
        assert_eq!(table.len(), 12);
        assert_well_formed(&table);

        assert!(matches!(
            ScaleTable::temperament(12, &units[..3], 2.0, 1.5, comma).unwrap_err(),
            TuningError::InvalidTemperamentUnits { expected: 12 }
        ));
    }

    #[test]
    fn mirror_inverts_intervals() {
        let table = ScaleTable::new(vec![1.0, 1.25, 1.5], 2.0).unwrap();
        let mirrored = table.mirror();
        assert_eq!(mirrored.ratios(), &[1.0, 4.0 / 3.0, 1.6]);
    }

    #[test]
    fn twelve_tone_steps_match_equal_temperament() {
        let table = equal_division(12, 2.0);
        for step in -24..=24i64 {
            let expected = 440.0 * 2f64.powf(step as f64 / 12.0);
            assert_relative_eq!(table.nth_step(step, 440.0, 1.0), expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn bohlen_pierce_tritave() {
        let table = equal_division(13, 3.0);
        assert_relative_eq!(table.nth_step(13, 440.0, 1.0), 1320.0, max_relative = 1e-12);
        assert_relative_eq!(table.nth_step(-13, 440.0, 1.0), 440.0 / 3.0, max_relative = 1e-12);
    }

    #[test]
    fn tonic_transposition_shifts_the_table() {
        let table = equal_division(12, 2.0);
        let semitone = 2f64.powf(1.0 / 12.0);
        assert_relative_eq!(table.nth_step(1, 440.0, semitone), 440.0 * semitone, max_relative = 1e-12);
        assert_relative_eq!(table.nth_step(0, 440.0, semitone), 440.0, max_relative = 1e-12);
    }

    #[test]
    fn index_truncates_while_equave_floors() {
        // A just scale where truncation and rounding would disagree.
        let table = ScaleTable::new(vec![1.0, 1.2, 1.5], 2.0).unwrap();
        // transposed = 3 * log2(1.9) ~= 2.78: index 2, equave 0.
        assert_relative_eq!(table.pitch_of_interval(1.9, 100.0, 1.0).unwrap(), 150.0);
        // transposed = 3 * log2(0.9) ~= -0.456: equave -1, index trunc(2.54) = 2.
        assert_relative_eq!(table.pitch_of_interval(0.9, 100.0, 1.0).unwrap(), 75.0);
    }

    #[test]
    fn pitch_of_interval_octave_and_invalid_input() {
        let table = equal_division(12, 2.0);
        assert_relative_eq!(table.pitch_of_interval(2.0, 440.0, 1.0).unwrap(), 880.0, max_relative = 1e-9);
        assert_eq!(table.pitch_of_interval(0.0, 440.0, 1.0), None);
        assert_eq!(table.pitch_of_interval(f64::INFINITY, 440.0, 1.0), None);
    }
}
