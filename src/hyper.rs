//! Dirichlet priors and their digamma-based re-estimation.
//!
//! The priors are re-derived from the current count tables with Minka's
//! fixed-point update (moment matching on the Dirichlet-multinomial
//! likelihood). Each component update has the shape
//!
//! ```text
//! a_k <- a_k * (sum_d psi(n_dk + a_k) - D psi(a_k))
//!             / (sum_d psi(n_d  + A)  - D psi(A))      A = sum_k a_k
//! ```
//!
//! where `psi` is the digamma function. The iteration is bounded and
//! reports whether it stabilized; a degenerate or non-positive update is
//! clamped to a small floor and logged, never fatal.
//!
//! # References
//! - Minka, T. (2000). Estimating a Dirichlet distribution.
//! - Heinrich, G. (2005). Parameter estimation for text analysis.

use log::warn;
use ndarray::{Array1, Array2};

/// Floor applied when an update would drive a prior component to zero or
/// below; keeps the conditional weights strictly positive.
const PRIOR_FLOOR: f64 = 1e-8;

/// Iteration budget for one re-estimation call.
const MAX_FIXED_POINT_ITERS: usize = 100;

/// Relative-change threshold below which the fixed point is considered
/// stable.
const FIXED_POINT_TOL: f64 = 1e-6;

/// Digamma function (derivative of `ln Gamma`) for strictly positive
/// arguments.
///
/// Small arguments are shifted into the asymptotic regime with the
/// recurrence `psi(x) = psi(x + 1) - 1/x`, then the Bernoulli-number
/// asymptotic series in `1/x^2` is evaluated. Accurate to roughly 1e-12
/// over the range produced by count-plus-prior arguments.
///
/// # Example
/// ```
/// use author_topic::hyper::digamma;
/// // psi(1) is the negative Euler-Mascheroni constant
/// assert!((digamma(1.0) + 0.5772156649015329).abs() < 1e-10);
/// ```
pub fn digamma(x: f64) -> f64 {
    debug_assert!(x > 0.0, "digamma is only evaluated at positive arguments");
    let mut shift = 0.0;
    let mut y = x;
    // psi(x) = psi(x + 1) - 1/x until the series applies
    while y < 6.0 {
        shift -= 1.0 / y;
        y += 1.0;
    }
    let r = 1.0 / y;
    let r2 = r * r;
    let series = r2
        * (1.0 / 12.0
            - r2 * (1.0 / 120.0
                - r2 * (1.0 / 252.0 - r2 * (1.0 / 240.0 - r2 * (1.0 / 132.0)))));
    shift + y.ln() - 0.5 * r - series
}

/// Compensated (Kahan) accumulator for the digamma sums.
///
/// The fixed point divides two sums of nearly equal magnitude; plain f64
/// accumulation over many authors or words loses enough precision to make
/// the iterate wander.
#[derive(Debug, Default)]
struct KahanSum {
    sum: f64,
    carry: f64,
}

impl KahanSum {
    #[inline]
    fn add(&mut self, value: f64) {
        let y = value - self.carry;
        let t = self.sum + y;
        self.carry = (t - self.sum) - y;
        self.sum = t;
    }

    #[inline]
    fn value(&self) -> f64 {
        self.sum
    }
}

/// Outcome of one bounded fixed-point run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedPoint {
    /// The update stabilized within the iteration budget.
    Converged {
        /// Iterations actually performed.
        iterations: usize,
    },
    /// The budget ran out or the update was degenerate; the last (possibly
    /// clamped) iterate was kept.
    MaxIterations,
}

impl FixedPoint {
    /// Whether the run ended in [`FixedPoint::Converged`].
    pub fn converged(&self) -> bool {
        matches!(self, FixedPoint::Converged { .. })
    }
}

/// Dirichlet hyperparameters: `alpha` over topics (length K) and `beta`
/// over words (length V), with their sums cached for the conditional
/// weight denominators.
///
/// Symmetric scalars are the common starting point; the vectors become
/// asymmetric once re-estimation runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Priors {
    alpha: Array1<f64>,
    beta: Array1<f64>,
    alpha_sum: f64,
    beta_sum: f64,
}

impl Priors {
    /// Symmetric priors: `alpha` repeated over K topics, `beta` over V
    /// words.
    ///
    /// # Panics
    /// Panics if either scalar is not strictly positive or a dimension is
    /// zero.
    pub fn symmetric(num_topics: usize, num_words: usize, alpha: f64, beta: f64) -> Self {
        assert!(num_topics > 0 && num_words > 0, "empty prior dimensions");
        assert!(alpha > 0.0 && beta > 0.0, "priors must be strictly positive");
        Self {
            alpha: Array1::from_elem(num_topics, alpha),
            beta: Array1::from_elem(num_words, beta),
            alpha_sum: alpha * num_topics as f64,
            beta_sum: beta * num_words as f64,
        }
    }

    /// Asymmetric priors from explicit vectors.
    ///
    /// # Panics
    /// Panics if either vector is empty or contains a non-positive or
    /// non-finite component.
    pub fn from_vectors(alpha: Vec<f64>, beta: Vec<f64>) -> Self {
        assert!(!alpha.is_empty() && !beta.is_empty(), "empty prior vectors");
        assert!(
            alpha.iter().chain(&beta).all(|&v| v.is_finite() && v > 0.0),
            "priors must be strictly positive"
        );
        let alpha = Array1::from_vec(alpha);
        let beta = Array1::from_vec(beta);
        let alpha_sum = alpha.sum();
        let beta_sum = beta.sum();
        Self { alpha, beta, alpha_sum, beta_sum }
    }

    /// Per-topic prior vector `alpha_theta`.
    pub fn alpha(&self) -> &Array1<f64> {
        &self.alpha
    }

    /// Per-word prior vector `beta_phi`.
    pub fn beta(&self) -> &Array1<f64> {
        &self.beta
    }

    /// Cached `sum_k alpha_k`.
    #[inline]
    pub fn alpha_sum(&self) -> f64 {
        self.alpha_sum
    }

    /// Cached `sum_v beta_v`.
    #[inline]
    pub fn beta_sum(&self) -> f64 {
        self.beta_sum
    }

    /// Re-estimate `alpha` from the author-topic counts `na` (A×K) and
    /// their totals `nasum`.
    pub(crate) fn reestimate_alpha(
        &mut self,
        na: &Array2<u32>,
        nasum: &Array1<u32>,
    ) -> FixedPoint {
        let status = fixed_point(
            &mut self.alpha,
            |k, component| {
                let mut numer = KahanSum::default();
                for a in 0..na.nrows() {
                    numer.add(digamma(f64::from(na[[a, k]]) + component));
                }
                numer.value() - na.nrows() as f64 * digamma(component)
            },
            |total| {
                let mut denom = KahanSum::default();
                for &n in nasum {
                    denom.add(digamma(f64::from(n) + total));
                }
                denom.value() - nasum.len() as f64 * digamma(total)
            },
            "alpha",
        );
        self.alpha_sum = self.alpha.sum();
        status
    }

    /// Re-estimate `beta` from the word-topic counts `nw` (V×K) and the
    /// per-topic totals `nwsum`; topics play the role the authors play in
    /// the `alpha` update.
    pub(crate) fn reestimate_beta(
        &mut self,
        nw: &Array2<u32>,
        nwsum: &Array1<u32>,
    ) -> FixedPoint {
        let status = fixed_point(
            &mut self.beta,
            |v, component| {
                let mut numer = KahanSum::default();
                for k in 0..nw.ncols() {
                    numer.add(digamma(f64::from(nw[[v, k]]) + component));
                }
                numer.value() - nw.ncols() as f64 * digamma(component)
            },
            |total| {
                let mut denom = KahanSum::default();
                for &n in nwsum {
                    denom.add(digamma(f64::from(n) + total));
                }
                denom.value() - nwsum.len() as f64 * digamma(total)
            },
            "beta",
        );
        self.beta_sum = self.beta.sum();
        status
    }
}

/// Shared bounded fixed-point driver for both prior vectors.
///
/// `numerator(i, component)` and `denominator(vector_sum)` evaluate the two
/// digamma sums of the update; `label` only feeds the warnings.
fn fixed_point(
    components: &mut Array1<f64>,
    numerator: impl Fn(usize, f64) -> f64,
    denominator: impl Fn(f64) -> f64,
    label: &str,
) -> FixedPoint {
    for iter in 0..MAX_FIXED_POINT_ITERS {
        let total: f64 = components.sum();
        let denom = denominator(total);
        if !(denom > 0.0) {
            // All counts zero: the update is undefined. Keep the current
            // values rather than corrupting them.
            warn!("{label} fixed point degenerate (denominator {denom:.3e}); keeping current values");
            return FixedPoint::MaxIterations;
        }

        let mut max_rel_change = 0.0f64;
        let mut clamped = false;
        for i in 0..components.len() {
            let old = components[i];
            let mut new = old * numerator(i, old) / denom;
            if !new.is_finite() || new <= 0.0 {
                new = PRIOR_FLOOR;
                clamped = true;
            }
            max_rel_change = max_rel_change.max((new - old).abs() / old);
            components[i] = new;
        }
        if clamped {
            warn!("{label} fixed point clamped at least one component to {PRIOR_FLOOR:.1e}");
        }
        if max_rel_change < FIXED_POINT_TOL {
            return FixedPoint::Converged { iterations: iter + 1 };
        }
    }
    warn!("{label} fixed point did not converge within {MAX_FIXED_POINT_ITERS} iterations");
    FixedPoint::MaxIterations
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn digamma_matches_known_constants() {
        // psi(1) = -gamma, psi(2) = 1 - gamma
        assert_relative_eq!(digamma(1.0), -0.5772156649015329, max_relative = 1e-10);
        assert_relative_eq!(digamma(2.0), 0.4227843350984671, max_relative = 1e-10);
        assert_relative_eq!(digamma(0.5), -1.9635100260214235, max_relative = 1e-10);
    }

    #[test]
    fn digamma_satisfies_recurrence() {
        for &x in &[0.1, 0.7, 1.0, 3.5, 12.0, 117.25] {
            assert_relative_eq!(
                digamma(x + 1.0),
                digamma(x) + 1.0 / x,
                max_relative = 1e-10
            );
        }
    }

    #[test]
    fn kahan_sum_keeps_small_terms() {
        // each 1e-16 is below half an ulp of 1.0, so naive addition drops
        // every one of them; the compensated sum keeps the tail
        let mut naive = 1.0f64;
        let mut kahan = KahanSum::default();
        kahan.add(1.0);
        for _ in 0..10_000 {
            naive += 1e-16;
            kahan.add(1e-16);
        }
        assert_eq!(naive, 1.0);
        assert_relative_eq!(kahan.value(), 1.0 + 1e-12, max_relative = 1e-3);
    }

    #[test]
    fn symmetric_counts_keep_alpha_symmetric() {
        let mut priors = Priors::symmetric(3, 4, 0.5, 0.1);
        // every author saw every topic equally often; the concentration
        // grows without a finite fixed point, but the components must stay
        // equal and the bounded loop must stop on its own
        let na = Array2::from_elem((5, 3), 6u32);
        let nasum = Array1::from_elem(5, 18u32);

        priors.reestimate_alpha(&na, &nasum);
        let first = priors.alpha()[0];
        assert!(first.is_finite() && first > 0.0);
        for &a in priors.alpha() {
            assert_relative_eq!(a, first, max_relative = 1e-9);
        }
        assert_relative_eq!(priors.alpha_sum(), priors.alpha().sum(), max_relative = 1e-12);
    }

    #[test]
    fn heterogeneous_counts_converge() {
        let mut priors = Priors::symmetric(3, 4, 0.5, 0.1);
        // authors with clearly different topic profiles: finite optimum
        let na = array![
            [10u32, 2, 1],
            [3, 8, 2],
            [1, 2, 12],
            [12, 1, 2],
            [2, 9, 4],
        ];
        let nasum = array![13u32, 13, 15, 15, 15];

        let status = priors.reestimate_alpha(&na, &nasum);
        assert!(status.converged());
        assert!(priors.alpha().iter().all(|&a| a.is_finite() && a > 0.0));
    }

    #[test]
    fn empty_counts_leave_priors_untouched() {
        let mut priors = Priors::symmetric(2, 3, 0.5, 0.1);
        let before = priors.clone();
        let na: Array2<u32> = Array2::zeros((4, 2));
        let nasum: Array1<u32> = Array1::zeros(4);

        let status = priors.reestimate_alpha(&na, &nasum);
        assert_eq!(status, FixedPoint::MaxIterations);
        assert_eq!(priors, before);
    }

    #[test]
    fn skewed_counts_skew_alpha() {
        let mut priors = Priors::symmetric(2, 3, 0.5, 0.1);
        // topic 0 dominates every author
        let na = array![[20u32, 1], [18, 2], [25, 1]];
        let nasum = array![21u32, 20, 26];

        priors.reestimate_alpha(&na, &nasum);
        assert!(priors.alpha()[0] > priors.alpha()[1]);
    }

    #[test]
    fn beta_update_runs_on_word_counts() {
        let mut priors = Priors::symmetric(2, 3, 0.5, 0.1);
        let nw = array![[9u32, 0], [1, 5], [0, 6]];
        let nwsum = array![10u32, 11];

        let status = priors.reestimate_beta(&nw, &nwsum);
        assert!(status.converged());
        assert!(priors.beta().iter().all(|&b| b > 0.0));
        assert_relative_eq!(priors.beta_sum(), priors.beta().sum(), max_relative = 1e-12);
    }
}
