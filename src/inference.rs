//! Held-out inference over a trained word-topic base.
//!
//! New documents are restricted to the training vocabulary (unknown word
//! ids are dropped, silently) and sampled with the same sweep engine as
//! training, except that the trained `nw`/`nwsum` tables sit underneath the
//! overlay counts as a read-only bias. The author term comes from the
//! overlay alone: held-out authors have no trained history. The trained
//! state is never written to.

use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::gibbs::{SweepEngine, WordBase};
use crate::hyper::Priors;
use crate::posterior;
use crate::state::SamplerState;
use crate::{Corpus, Document};

/// Posterior estimates for a batch of unseen documents.
#[derive(Debug, Clone)]
pub struct Inference {
    /// Author-topic distribution of the held-out authors, `newA×K`.
    pub theta: Array2<f64>,
    /// Topic-word distribution over the training vocabulary, re-estimated
    /// from the combined trained and held-out counts, `K×V`.
    pub phi: Array2<f64>,
}

/// Sample assignments for `new_corpus` against the trained counts and
/// return the held-out posteriors.
pub(crate) fn run(
    trained: &SamplerState,
    priors: &Priors,
    vocab_size: usize,
    new_corpus: &Corpus,
    iterations: usize,
    seed: u64,
) -> Inference {
    let restricted = restrict_vocabulary(new_corpus, vocab_size);
    let num_topics = trained.num_topics();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut overlay = SamplerState::random_init(&restricted, num_topics, &mut rng);
    let mut engine = SweepEngine::new(num_topics, restricted.max_authors());
    let base = WordBase::trained(&trained.nw, &trained.nwsum);
    for _ in 0..iterations {
        engine.sweep(&mut overlay, &restricted, priors, base, &mut rng);
    }

    Inference {
        theta: posterior::theta(&overlay.na, &overlay.nasum, priors),
        phi: posterior::phi_combined(
            &trained.nw,
            &trained.nwsum,
            &overlay.nw,
            &overlay.nwsum,
            priors,
        ),
    }
}

/// Drop every word id outside the training vocabulary; author lists pass
/// through untouched.
fn restrict_vocabulary(corpus: &Corpus, vocab_size: usize) -> Corpus {
    let docs = corpus
        .docs()
        .iter()
        .map(|doc| Document {
            words: doc.words.iter().copied().filter(|&w| w < vocab_size).collect(),
            authors: doc.authors.clone(),
        })
        .collect();
    Corpus {
        docs,
        num_words: vocab_size,
        num_authors: corpus.num_authors(),
    }
}
