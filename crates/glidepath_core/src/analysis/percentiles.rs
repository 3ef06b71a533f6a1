//! Exact percentiles over materialized samples

/// Percentiles reported by default (as fractions)
pub const STANDARD_PERCENTILES: [f64; 5] = [0.10, 0.25, 0.50, 0.75, 0.90];

/// Percentile of an ascending-sorted slice by linear interpolation between
/// closest ranks. `p` is a fraction in [0, 1]; out-of-range values clamp.
///
/// Returns NaN for an empty slice.
#[must_use]
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            if lo == hi {
                sorted[lo]
            } else {
                let frac = rank - lo as f64;
                sorted[lo] + (sorted[hi] - sorted[lo]) * frac
            }
        }
    }
}

/// Sort a copy of `values` and evaluate each percentile.
///
/// Returns `(percentile, value)` pairs in the order requested.
#[must_use]
pub fn percentiles(values: &[f64], ps: &[f64]) -> Vec<(f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    ps.iter().map(|&p| (p, percentile_sorted(&sorted, p))).collect()
}

/// Value for a percentile from a `(percentile, value)` list
#[must_use]
pub fn find_percentile_value(pairs: &[(f64, f64)], p: f64) -> Option<f64> {
    pairs
        .iter()
        .find(|(q, _)| (q - p).abs() < 1e-9)
        .map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolates_between_ranks() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&v, 0.5), 3.0);
        assert_eq!(percentile_sorted(&v, 0.0), 1.0);
        assert_eq!(percentile_sorted(&v, 1.0), 5.0);
        assert!((percentile_sorted(&v, 0.1) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_single_and_empty() {
        assert_eq!(percentile_sorted(&[7.0], 0.9), 7.0);
        assert!(percentile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn test_percentiles_are_monotone() {
        let values: Vec<f64> = (0..101).rev().map(f64::from).collect();
        let out = percentiles(&values, &STANDARD_PERCENTILES);
        assert!(out.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(find_percentile_value(&out, 0.5), Some(50.0));
        assert_eq!(find_percentile_value(&out, 0.05), None);
    }
}
