//! Collapsed Gibbs sweep over the token assignments.
//!
//! One sweep visits every token of every document exactly once, in document
//! order then position order, and redraws its `(topic, author)` pair from
//! the joint conditional given every other assignment. The same engine
//! drives training and held-out inference: the only difference is the
//! read-only [`WordBase`] layered under the mutable word-topic counts.

use ndarray::{Array1, Array2};
use rand::Rng;

use crate::Corpus;
use crate::hyper::Priors;
use crate::state::{SamplerState, TokenAssignment};

/// Read-only word-topic counts underneath the mutable state.
///
/// Empty during training (the state owns all counts); the trained model's
/// `nw`/`nwsum` during inference, where they bias the word term without
/// ever being written to.
#[derive(Clone, Copy)]
pub(crate) struct WordBase<'a> {
    counts: Option<(&'a Array2<u32>, &'a Array1<u32>)>,
}

impl<'a> WordBase<'a> {
    pub(crate) fn empty() -> Self {
        Self { counts: None }
    }

    pub(crate) fn trained(nw: &'a Array2<u32>, nwsum: &'a Array1<u32>) -> Self {
        Self { counts: Some((nw, nwsum)) }
    }

    #[inline]
    fn word_topic(&self, word: usize, topic: usize) -> f64 {
        self.counts.map_or(0.0, |(nw, _)| f64::from(nw[[word, topic]]))
    }

    #[inline]
    fn topic_total(&self, topic: usize) -> f64 {
        self.counts.map_or(0.0, |(_, nwsum)| f64::from(nwsum[topic]))
    }
}

/// Sweep engine holding the reusable weight buffer.
///
/// The buffer stores the running cumulative sum of the joint weights in a
/// fixed author-major, topic-minor enumeration, so a draw is a single
/// scan.
#[derive(Debug)]
pub(crate) struct SweepEngine {
    weights: Vec<f64>,
}

impl SweepEngine {
    pub(crate) fn new(num_topics: usize, max_authors: usize) -> Self {
        Self {
            weights: Vec::with_capacity(num_topics * max_authors.max(1)),
        }
    }

    /// Resample every token once.
    pub(crate) fn sweep<R: Rng + ?Sized>(
        &mut self,
        state: &mut SamplerState,
        corpus: &Corpus,
        priors: &Priors,
        base: WordBase<'_>,
        rng: &mut R,
    ) {
        for (m, doc) in corpus.docs().iter().enumerate() {
            for (n, &word) in doc.words.iter().enumerate() {
                self.resample(state, priors, base, m, n, word, &doc.authors, rng);
            }
        }
    }

    /// Redraw the `(topic, author)` pair of token `(doc, pos)`.
    ///
    /// The token's current contribution is removed from the counts, the
    /// joint conditional over all `K × |authors|` candidates is evaluated,
    /// a pair is drawn by inverse-CDF scan, and the counts are updated with
    /// the new pair. The count invariants hold again on return.
    fn resample<R: Rng + ?Sized>(
        &mut self,
        state: &mut SamplerState,
        priors: &Priors,
        base: WordBase<'_>,
        doc: usize,
        pos: usize,
        word: usize,
        authors: &[usize],
        rng: &mut R,
    ) {
        let num_topics = state.num_topics();
        let old = state.assignments[doc][pos];
        state.unseat(doc, word, authors[old.author], old.topic);

        self.weights.clear();
        let mut total = 0.0;
        for &author in authors {
            let author_denom = f64::from(state.nasum[author]) + priors.alpha_sum();
            for k in 0..num_topics {
                let theta_term =
                    (f64::from(state.na[[author, k]]) + priors.alpha()[k]) / author_denom;
                let phi_term = (base.word_topic(word, k)
                    + f64::from(state.nw[[word, k]])
                    + priors.beta()[word])
                    / (base.topic_total(k)
                        + f64::from(state.nwsum[k])
                        + priors.beta_sum());
                total += theta_term * phi_term;
                self.weights.push(total);
            }
        }

        let draw = rng.gen_range(0.0..total);
        // first candidate whose cumulative mass exceeds the draw; the
        // fallback only absorbs floating-point round-off at the tail
        let pick = self
            .weights
            .iter()
            .position(|&cumulative| cumulative > draw)
            .unwrap_or(self.weights.len() - 1);
        let assign = TokenAssignment {
            topic: pick % num_topics,
            author: pick / num_topics,
        };

        state.seat(doc, word, authors[assign.author], assign.topic);
        state.assignments[doc][pos] = assign;
    }
}
