/// Unbiased pass@k estimator from the code-generation benchmarking
/// literature: the probability that at least one of `k` randomly selected
/// samples out of `n` passes, given `c` of the `n` passed.
///
/// Uses the numerically stable product form
/// `1 - prod(1 - k/j) for j in n-c+1..=n` rather than binomial
/// coefficients, which overflow for large `n`.
pub fn pass_at_k(n: usize, c: usize, k: usize) -> f64 {
    // Fewer than k incorrect samples left: every selection of k contains
    // at least one correct sample.
    if n - c < k {
        return 1.0;
    }

    let mut product = 1.0;
    for j in (n - c + 1)..=n {
        product *= 1.0 - k as f64 / j as f64;
    }

    1.0 - product
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-10;

    #[test]
    fn all_samples_correct_is_certain() {
        assert_eq!(pass_at_k(10, 10, 5), 1.0);
        assert_eq!(pass_at_k(1, 1, 1), 1.0);
    }

    #[test]
    fn no_samples_correct_is_zero() {
        assert_eq!(pass_at_k(10, 0, 5), 0.0);
        assert_eq!(pass_at_k(10, 0, 10), 0.0);
    }

    #[test]
    fn guaranteed_when_incorrect_pool_smaller_than_k() {
        // n - c < k means we cannot fill a selection with failures only.
        assert_eq!(pass_at_k(10, 8, 3), 1.0);
        assert_eq!(pass_at_k(10, 1, 10), 1.0);
    }

    #[test]
    fn k_of_one_is_the_plain_ratio() {
        assert!((pass_at_k(100, 20, 1) - 0.2).abs() < TOLERANCE);
        assert!((pass_at_k(5, 2, 1) - 0.4).abs() < TOLERANCE);
    }

    #[test]
    fn matches_manually_calculated_values() {
        // n=10, c=3, k=2: 1 - C(7,2)/C(10,2) = 1 - 21/45
        assert!((pass_at_k(10, 3, 2) - (1.0 - 21.0 / 45.0)).abs() < TOLERANCE);
    }

    #[test]
    fn matches_product_form_reference() {
        // Recompute the product form independently for a larger case.
        let (n, c, k) = (20usize, 10usize, 5usize);
        let mut expected = 1.0;
        for j in (n - c + 1)..=n {
            expected *= 1.0 - k as f64 / j as f64;
        }
        let expected = 1.0 - expected;
        assert!((pass_at_k(n, c, k) - expected).abs() < TOLERANCE);
    }

    #[test]
    fn bounded_and_monotonic_in_correct_count() {
        for n in 1..=30usize {
            for k in 1..=n {
                let mut previous = 0.0;
                for c in 0..=n {
                    let p = pass_at_k(n, c, k);
                    assert!((0.0..=1.0).contains(&p), "pass_at_k({n},{c},{k}) = {p}");
                    assert!(
                        p >= previous - TOLERANCE,
                        "pass_at_k not monotonic at n={n} c={c} k={k}"
                    );
                    previous = p;
                }
            }
        }
    }

    #[test]
    fn large_sample_counts_stay_finite() {
        let p = pass_at_k(10_000, 100, 10);
        assert!(p.is_finite());
        assert!((0.0..=1.0).contains(&p));
    }
}
