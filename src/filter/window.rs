//! Welch window
//!
//! Parabolic taper applied to every analysis window before the forward transform.

/// Welch weight of sample `j` in a window of `n` samples:
/// `1 - ((j - (n-1)/2) / ((n+1)/2))^2`
#[inline]
pub fn welch(j: usize, n: usize) -> f64 {
    let j = j as f64;
    let n = n as f64;
    let x = (j - 0.5 * (n - 1.0)) / (0.5 * (n + 1.0));
    1.0 - x * x
}

/// All `n` weights of a Welch window
pub fn welch_window(n: usize) -> Vec<f64> {
    (0..n).map(|j| welch(j, n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welch_symmetric_edges() {
        for n in [2, 3, 8, 17, 1024] {
            let first = welch(0, n);
            let last = welch(n - 1, n);
            assert!((first - last).abs() < 1e-12, "n={}: {} vs {}", n, first, last);
            assert!(first > 0.0, "edge weight must stay positive, got {}", first);
        }
    }

    #[test]
    fn test_welch_symmetric_everywhere() {
        let n = 33;
        for j in 0..n {
            assert!((welch(j, n) - welch(n - 1 - j, n)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_welch_peak_at_centre() {
        // Odd length: single peak of exactly 1.0 at the centre sample
        let n = 9;
        let window = welch_window(n);
        let (peak, &max) = window
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .unwrap();
        assert_eq!(peak, 4);
        assert!((max - 1.0).abs() < 1e-12);

        // Even length: the two middle samples share the maximum
        let n = 8;
        let window = welch_window(n);
        let max = window.iter().cloned().fold(f64::MIN, f64::max);
        assert!((window[3] - max).abs() < 1e-12);
        assert!((window[4] - max).abs() < 1e-12);
        for (j, w) in window.iter().enumerate() {
            if j != 3 && j != 4 {
                assert!(*w < max);
            }
        }
    }

    #[test]
    fn test_welch_known_values() {
        // n = 8: centre 3.5, half-width 4.5
        let expected = 1.0 - (3.5f64 / 4.5).powi(2);
        assert!((welch(0, 8) - expected).abs() < 1e-15);
        let expected = 1.0 - (0.5f64 / 4.5).powi(2);
        assert!((welch(3, 8) - expected).abs() < 1e-15);
    }
}
