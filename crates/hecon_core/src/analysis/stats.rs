//! Small summary statistics over Monte Carlo draws.

/// Arithmetic mean; NaN for an empty slice
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Percentile `p` in [0, 1] of already-sorted data, interpolating linearly
/// between closest ranks. NaN for an empty slice.
#[must_use]
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Two-sided interval at the given percentiles
#[must_use]
pub fn interval(values: &[f64], lower: f64, upper: f64) -> [f64; 2] {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    [
        percentile_sorted(&sorted, lower),
        percentile_sorted(&sorted, upper),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 6.0]), 3.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile_sorted(&sorted, 0.0), 10.0);
        assert_eq!(percentile_sorted(&sorted, 0.5), 30.0);
        assert_eq!(percentile_sorted(&sorted, 1.0), 50.0);
        assert!((percentile_sorted(&sorted, 0.1) - 14.0).abs() < 1e-12);
        assert_eq!(percentile_sorted(&[7.0], 0.975), 7.0);
        assert!(percentile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn test_interval_sorts_input() {
        let values: Vec<f64> = (0..=100).rev().map(f64::from).collect();
        let [lo, hi] = interval(&values, 0.025, 0.975);
        assert!((lo - 2.5).abs() < 1e-12);
        assert!((hi - 97.5).abs() < 1e-12);
    }
}
