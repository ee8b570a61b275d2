//! Posterior estimates derived from the count tables.
//!
//! Everything here is a pure function of the current counts and priors:
//! the Dirichlet posterior means `theta` (author-topic) and `phi`
//! (topic-word), ranked report content, and the collapsed
//! Dirichlet-multinomial word likelihood used as a training diagnostic.
//! Nothing in this module mutates sampler state, so any of it can run
//! between sweeps.

use ndarray::{Array1, Array2};
use statrs::function::gamma::ln_gamma;

use crate::hyper::Priors;

/// Posterior mean of the author-topic distributions, `A×K`.
///
/// `theta[a][k] = (na[a][k] + alpha_k) / (nasum[a] + sum(alpha))`; each row
/// sums to one by construction.
pub(crate) fn theta(na: &Array2<u32>, nasum: &Array1<u32>, priors: &Priors) -> Array2<f64> {
    let (num_authors, num_topics) = na.dim();
    Array2::from_shape_fn((num_authors, num_topics), |(a, k)| {
        (f64::from(na[[a, k]]) + priors.alpha()[k])
            / (f64::from(nasum[a]) + priors.alpha_sum())
    })
}

/// Posterior mean of the topic-word distributions, `K×V`.
///
/// `phi[k][v] = (nw[v][k] + beta_v) / (nwsum[k] + sum(beta))`; each row
/// sums to one by construction.
pub(crate) fn phi(nw: &Array2<u32>, nwsum: &Array1<u32>, priors: &Priors) -> Array2<f64> {
    let (num_words, num_topics) = nw.dim();
    Array2::from_shape_fn((num_topics, num_words), |(k, v)| {
        (f64::from(nw[[v, k]]) + priors.beta()[v])
            / (f64::from(nwsum[k]) + priors.beta_sum())
    })
}

/// [`phi`] over the elementwise sum of a read-only base and an overlay,
/// for held-out inference.
pub(crate) fn phi_combined(
    base_nw: &Array2<u32>,
    base_nwsum: &Array1<u32>,
    nw: &Array2<u32>,
    nwsum: &Array1<u32>,
    priors: &Priors,
) -> Array2<f64> {
    phi(&(base_nw + nw), &(base_nwsum + nwsum), priors)
}

/// The `n` highest-probability words of every topic, most probable first.
///
/// Report content for the persistence layer; pairs are `(word id,
/// probability)` taken from a `K×V` matrix as produced by the model's
/// `phi` accessor.
pub fn top_words(phi: &Array2<f64>, n: usize) -> Vec<Vec<(usize, f64)>> {
    ranked_rows(phi, n)
}

/// The `n` highest-probability topics of every author, most probable
/// first, from an `A×K` matrix as produced by the model's `theta`
/// accessor.
pub fn top_topics(theta: &Array2<f64>, n: usize) -> Vec<Vec<(usize, f64)>> {
    ranked_rows(theta, n)
}

fn ranked_rows(matrix: &Array2<f64>, n: usize) -> Vec<Vec<(usize, f64)>> {
    matrix
        .rows()
        .into_iter()
        .map(|row| {
            let mut ranked: Vec<(usize, f64)> = row.iter().copied().enumerate().collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            ranked.truncate(n);
            ranked
        })
        .collect()
}

/// Collapsed word log-likelihood `log p(w | z)` under the current
/// assignments.
///
/// Summing the Dirichlet-multinomial normalizers per topic:
///
/// ```text
/// sum_k [ ln G(sum_v b_v) - sum_v ln G(b_v)
///       + sum_v ln G(nw_vk + b_v) - ln G(nwsum_k + sum_v b_v) ]
/// ```
///
/// Useful as a convergence trace; it is not a perplexity.
pub(crate) fn word_log_likelihood(
    nw: &Array2<u32>,
    nwsum: &Array1<u32>,
    priors: &Priors,
) -> f64 {
    let (num_words, num_topics) = nw.dim();
    let prior_norm = ln_gamma(priors.beta_sum())
        - priors.beta().iter().map(|&b| ln_gamma(b)).sum::<f64>();

    let mut ll = num_topics as f64 * prior_norm;
    for k in 0..num_topics {
        for v in 0..num_words {
            ll += ln_gamma(f64::from(nw[[v, k]]) + priors.beta()[v]);
        }
        ll -= ln_gamma(f64::from(nwsum[k]) + priors.beta_sum());
    }
    ll
}
