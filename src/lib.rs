//! # Author-Topic Model Estimation via Collapsed Gibbs Sampling
//!
//! This crate estimates the author-topic model, an extension of Latent
//! Dirichlet Allocation in which every word token is produced by a latent
//! `(author, topic)` pair, with the author drawn from the owning document's
//! declared co-author list. Estimation runs a collapsed Gibbs sampler over
//! the pair assignments; the per-word and per-author Dirichlet parameters
//! are periodically re-estimated with a digamma fixed point.
//!
//! ## Features
//!
//! - **Estimation:** a single sequential Markov chain over `(topic, author)`
//!   assignments, deterministic under a fixed seed.
//! - **Hyperparameters:** Minka-style fixed-point re-estimation of
//!   asymmetric `alpha` (per topic) and `beta` (per word) priors.
//! - **Posteriors:** author-topic (`theta`) and topic-word (`phi`)
//!   distributions, ranked top-words/top-topics report content, and a
//!   collapsed word log-likelihood diagnostic.
//! - **Continuation:** serde-serializable checkpoints that replay into
//!   bit-identical count tables.
//! - **Inference:** held-out documents sampled over the trained counts as a
//!   read-only base, without mutating the trained model.
//!
//! ## Mathematical Background
//!
//! With counts `na` (author-topic), `nw` (word-topic) and their cached
//! totals, the collapsed conditional for a token with word `v` in a
//! document with author list `A_d` is, for `k < K` and `a` in `A_d`,
//!
//! ```text
//! p(z = k, x = a | rest) ∝ (na[a][k] + alpha_k) / (nasum[a] + sum(alpha))
//!                        · (nw[v][k] + beta_v)  / (nwsum[k] + sum(beta))
//! ```
//!
//! See:
//!
//! - Rosen-Zvi, M., Griffiths, T., Steyvers, M., & Smyth, P. (2004). The Author-Topic
//!   Model for Authors and Documents. *UAI 2004*.
//! - Griffiths, T.L. & Steyvers, M. (2004). Finding Scientific Topics. *PNAS*, 101.
//! - Heinrich, G. (2005). Parameter Estimation for Text Analysis.
//! - Minka, T. (2000). Estimating a Dirichlet Distribution.
//!
//! ## Usage Example
//!
//! ```rust
//! use author_topic::{AuthorTopicModel, Corpus, Document, ModelConfig};
//!
//! let corpus = Corpus::new(
//!     vec![
//!         Document::new(vec![0, 1, 2, 1], vec![0]),
//!         Document::new(vec![2, 3, 3, 0], vec![0, 1]),
//!     ],
//!     4, // vocabulary size
//!     2, // number of authors
//! )
//! .unwrap();
//!
//! let mut config = ModelConfig::new(2);
//! config.iterations = 100;
//! let mut model = AuthorTopicModel::new(corpus, config);
//! model.estimate();
//!
//! let theta = model.theta(); // authors × topics
//! let phi = model.phi();     // topics × words
//! assert_eq!(theta.dim(), (2, 2));
//! assert_eq!(phi.dim(), (2, 4));
//! ```
//!
//! Tokenization, vocabulary/author id mapping, checkpoint file formats and
//! report formatting are left to the caller; the crate consumes word ids
//! and produces plain values.
//!
//! ## License
//! This crate is dual-licensed under the MIT OR Apache-2.0 licenses.

use std::error::Error;
use std::fmt;

use log::info;
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub use crate::checkpoint::Checkpoint;
pub use crate::inference::Inference;
pub use crate::state::TokenAssignment;

use crate::gibbs::{SweepEngine, WordBase};
use crate::hyper::{FixedPoint, Priors};
use crate::state::SamplerState;

mod checkpoint;
mod gibbs;
pub mod hyper;
mod inference;
pub mod posterior;
mod state;

/// One document: an ordered word-id sequence and its declared co-authors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Word ids, in token order.
    pub words: Vec<usize>,
    /// Author ids declared on this document. Every token's author is
    /// sampled from this list and no other.
    pub authors: Vec<usize>,
}

impl Document {
    pub fn new(words: Vec<usize>, authors: Vec<usize>) -> Self {
        Self { words, authors }
    }
}

/// A validated training or inference corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    pub(crate) docs: Vec<Document>,
    pub(crate) num_words: usize,
    pub(crate) num_authors: usize,
}

impl Corpus {
    /// Build a corpus over a vocabulary of `num_words` ids and an author
    /// universe of `num_authors` ids.
    ///
    /// # Errors
    /// [`ModelError::EmptyAuthorList`] for a document without co-authors,
    /// [`ModelError::WordOutOfRange`] / [`ModelError::AuthorOutOfRange`]
    /// for ids at or above the declared sizes.
    pub fn new(
        docs: Vec<Document>,
        num_words: usize,
        num_authors: usize,
    ) -> Result<Self, ModelError> {
        for (m, doc) in docs.iter().enumerate() {
            if doc.authors.is_empty() {
                return Err(ModelError::EmptyAuthorList { doc: m });
            }
            for (n, &word) in doc.words.iter().enumerate() {
                if word >= num_words {
                    return Err(ModelError::WordOutOfRange { doc: m, pos: n, word });
                }
            }
            for &author in &doc.authors {
                if author >= num_authors {
                    return Err(ModelError::AuthorOutOfRange { doc: m, author });
                }
            }
        }
        Ok(Self { docs, num_words, num_authors })
    }

    pub fn docs(&self) -> &[Document] {
        &self.docs
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    pub fn num_words(&self) -> usize {
        self.num_words
    }

    pub fn num_authors(&self) -> usize {
        self.num_authors
    }

    pub fn total_tokens(&self) -> usize {
        self.docs.iter().map(|doc| doc.words.len()).sum()
    }

    pub(crate) fn max_authors(&self) -> usize {
        self.docs.iter().map(|doc| doc.authors.len()).max().unwrap_or(0)
    }
}

/// Errors surfaced while validating corpora or replaying checkpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Checkpoint metadata disagrees with the corpus or configuration.
    InconsistentModel(String),
    /// A replayed assignment is outside its valid range.
    InvalidAssignment(String),
    /// A document was declared without any co-author.
    EmptyAuthorList { doc: usize },
    /// A word id at or above the declared vocabulary size.
    WordOutOfRange { doc: usize, pos: usize, word: usize },
    /// An author id at or above the declared author count.
    AuthorOutOfRange { doc: usize, author: usize },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InconsistentModel(detail) => {
                write!(f, "inconsistent model: {detail}")
            }
            ModelError::InvalidAssignment(detail) => {
                write!(f, "invalid assignment: {detail}")
            }
            ModelError::EmptyAuthorList { doc } => {
                write!(f, "document {doc} has an empty author list")
            }
            ModelError::WordOutOfRange { doc, pos, word } => {
                write!(f, "document {doc}, token {pos}: word id {word} outside the vocabulary")
            }
            ModelError::AuthorOutOfRange { doc, author } => {
                write!(f, "document {doc}: author id {author} outside the author universe")
            }
        }
    }
}

impl Error for ModelError {}

/// Configuration surface of an estimation run.
///
/// `save_every == 0` disables intermediate snapshots (the final one is
/// always delivered); `hyper_every == 0` disables prior re-estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Number of topics K.
    pub num_topics: usize,
    /// Symmetric per-topic prior used at initialization.
    pub alpha: f64,
    /// Symmetric per-word prior used at initialization.
    pub beta: f64,
    /// Gibbs sweeps to run per `estimate` call.
    pub iterations: usize,
    /// Sweeps between snapshots handed to the observer.
    pub save_every: usize,
    /// Sweeps between hyperparameter re-estimations.
    pub hyper_every: usize,
    /// Seed of the sampling chain.
    pub seed: u64,
}

impl ModelConfig {
    /// Defaults in the usual collapsed-LDA ranges: `alpha = 50/K`,
    /// `beta = 0.1`, 1000 sweeps, snapshot every 200, re-estimate priors
    /// every 10.
    ///
    /// # Panics
    /// Panics if `num_topics` is zero.
    pub fn new(num_topics: usize) -> Self {
        assert!(num_topics > 0, "need at least one topic");
        Self {
            num_topics,
            alpha: 50.0 / num_topics as f64,
            beta: 0.1,
            iterations: 1000,
            save_every: 200,
            hyper_every: 10,
            seed: 42,
        }
    }
}

/// Everything the persistence layer needs at a save point: the replayable
/// checkpoint plus the posterior estimates at that iteration.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Sweep count at capture time.
    pub iteration: usize,
    /// Replayable latent state.
    pub checkpoint: Checkpoint,
    /// Author-topic posterior means, `A×K`.
    pub theta: Array2<f64>,
    /// Topic-word posterior means, `K×V`.
    pub phi: Array2<f64>,
}

/// Author-topic model estimated by collapsed Gibbs sampling.
///
/// The model owns the corpus, the latent state and the sampling chain.
/// One instance is one strictly sequential chain: sweeps, prior updates
/// and snapshots happen one after another, never interleaved.
///
/// # Example
/// ```rust
/// # use author_topic::{AuthorTopicModel, Corpus, Document, ModelConfig};
/// let corpus = Corpus::new(
///     vec![Document::new(vec![0, 1, 0], vec![0])],
///     2,
///     1,
/// )
/// .unwrap();
/// let mut config = ModelConfig::new(2);
/// config.iterations = 20;
/// let mut model = AuthorTopicModel::new(corpus, config);
/// model.estimate_with(|snapshot| {
///     // hand snapshot.checkpoint / theta / phi to the persistence layer
///     assert_eq!(snapshot.theta.dim(), (1, 2));
/// });
/// ```
#[derive(Debug)]
pub struct AuthorTopicModel {
    corpus: Corpus,
    config: ModelConfig,
    priors: Priors,
    state: SamplerState,
    engine: SweepEngine,
    rng: ChaCha8Rng,
    iteration: usize,
}

impl AuthorTopicModel {
    /// Start a fresh estimation: every token gets a uniformly random topic
    /// and a uniformly random author from its document's author list.
    ///
    /// # Panics
    /// Panics if `config.alpha` or `config.beta` is not strictly positive.
    pub fn new(corpus: Corpus, config: ModelConfig) -> Self {
        let priors = Priors::symmetric(
            config.num_topics,
            corpus.num_words(),
            config.alpha,
            config.beta,
        );
        Self::with_priors(corpus, config, priors)
    }

    /// Start a fresh estimation with explicit (possibly asymmetric) prior
    /// vectors.
    ///
    /// # Panics
    /// Panics if the prior dimensions do not match `config.num_topics` and
    /// the corpus vocabulary.
    pub fn with_priors(corpus: Corpus, config: ModelConfig, priors: Priors) -> Self {
        assert_eq!(
            priors.alpha().len(),
            config.num_topics,
            "alpha length must equal the topic count"
        );
        assert_eq!(
            priors.beta().len(),
            corpus.num_words(),
            "beta length must equal the vocabulary size"
        );
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let state = SamplerState::random_init(&corpus, config.num_topics, &mut rng);
        let engine = SweepEngine::new(config.num_topics, corpus.max_authors());
        Self { corpus, config, priors, state, engine, rng, iteration: 0 }
    }

    /// Continue a previous estimation from a checkpoint.
    ///
    /// The count tables are rebuilt by replaying the checkpoint's
    /// assignments; priors and the iteration counter are restored from the
    /// checkpoint.
    ///
    /// # Errors
    /// [`ModelError::InconsistentModel`] if the checkpoint shape metadata
    /// disagrees with the corpus or `config.num_topics`;
    /// [`ModelError::InvalidAssignment`] if any replayed topic or author
    /// index is out of range.
    pub fn from_checkpoint(
        corpus: Corpus,
        config: ModelConfig,
        checkpoint: Checkpoint,
    ) -> Result<Self, ModelError> {
        checkpoint.validate(&corpus, config.num_topics)?;
        let priors = Priors::from_vectors(checkpoint.alpha.clone(), checkpoint.beta.clone());
        let state = SamplerState::replay(&corpus, config.num_topics, checkpoint.assignments)?;
        let engine = SweepEngine::new(config.num_topics, corpus.max_authors());
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            corpus,
            config,
            priors,
            state,
            engine,
            rng,
            iteration: checkpoint.iteration,
        })
    }

    /// Run `config.iterations` sweeps, discarding snapshots.
    pub fn estimate(&mut self) {
        self.estimate_with(|_| {});
    }

    /// Run `config.iterations` sweeps, handing a [`Snapshot`] to
    /// `observer` every `config.save_every` sweeps and once after the
    /// final sweep.
    ///
    /// Priors are re-estimated every `config.hyper_every` sweeps. The
    /// observer is the seam for the persistence layer: it receives the
    /// checkpoint and posteriors and may write them wherever it likes.
    pub fn estimate_with<F>(&mut self, mut observer: F)
    where
        F: FnMut(Snapshot),
    {
        let target = self.iteration + self.config.iterations;
        info!(
            "estimating {} topics over {} documents ({} tokens), sweeps {}..{}",
            self.config.num_topics,
            self.corpus.num_docs(),
            self.corpus.total_tokens(),
            self.iteration,
            target,
        );

        let mut last_snapshot = usize::MAX;
        while self.iteration < target {
            self.sweep();
            if self.config.hyper_every != 0 && self.iteration % self.config.hyper_every == 0 {
                self.reestimate_priors();
            }
            if self.config.save_every != 0 && self.iteration % self.config.save_every == 0 {
                info!(
                    "sweep {}: word log-likelihood {:.4}",
                    self.iteration,
                    self.log_likelihood()
                );
                observer(self.snapshot());
                last_snapshot = self.iteration;
            }
        }
        if last_snapshot != self.iteration {
            observer(self.snapshot());
        }
    }

    /// Resample every token once, in document order then position order.
    pub fn sweep(&mut self) {
        self.engine.sweep(
            &mut self.state,
            &self.corpus,
            &self.priors,
            WordBase::empty(),
            &mut self.rng,
        );
        self.iteration += 1;
    }

    /// Re-estimate `alpha` from the author-topic counts and `beta` from
    /// the word-topic counts.
    ///
    /// Non-convergence is logged and left clamped, never fatal; the
    /// statuses are returned for callers that want to inspect them.
    pub fn reestimate_priors(&mut self) -> (FixedPoint, FixedPoint) {
        let alpha = self.priors.reestimate_alpha(&self.state.na, &self.state.nasum);
        let beta = self.priors.reestimate_beta(&self.state.nw, &self.state.nwsum);
        (alpha, beta)
    }

    /// Author-topic posterior means, `A×K`; rows sum to one.
    pub fn theta(&self) -> Array2<f64> {
        posterior::theta(&self.state.na, &self.state.nasum, &self.priors)
    }

    /// Topic-word posterior means, `K×V`; rows sum to one.
    pub fn phi(&self) -> Array2<f64> {
        posterior::phi(&self.state.nw, &self.state.nwsum, &self.priors)
    }

    /// Collapsed word log-likelihood `log p(w | z)` of the current state.
    pub fn log_likelihood(&self) -> f64 {
        posterior::word_log_likelihood(&self.state.nw, &self.state.nwsum, &self.priors)
    }

    /// Capture the complete replayable latent state.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            num_topics: self.config.num_topics,
            num_words: self.corpus.num_words(),
            num_docs: self.corpus.num_docs(),
            num_authors: self.corpus.num_authors(),
            iteration: self.iteration,
            alpha: self.priors.alpha().to_vec(),
            beta: self.priors.beta().to_vec(),
            assignments: self.state.assignments.clone(),
        }
    }

    /// Checkpoint plus posteriors, as handed to `estimate_with` observers.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            iteration: self.iteration,
            checkpoint: self.checkpoint(),
            theta: self.theta(),
            phi: self.phi(),
        }
    }

    /// Sample topic and author assignments for unseen documents against
    /// this model's counts, without mutating them.
    ///
    /// Word ids outside the training vocabulary are dropped silently; the
    /// held-out author universe is the new corpus's own.
    pub fn infer(&self, new_corpus: &Corpus, iterations: usize, seed: u64) -> Inference {
        inference::run(
            &self.state,
            &self.priors,
            self.corpus.num_words(),
            new_corpus,
            iterations,
            seed,
        )
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn priors(&self) -> &Priors {
        &self.priors
    }

    /// Sweeps performed so far (including any restored from a checkpoint).
    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_corpus() -> Corpus {
        Corpus::new(
            vec![
                Document::new(vec![0, 1, 2, 0], vec![0]),
                Document::new(vec![3, 2, 3], vec![0, 1]),
                Document::new(vec![1, 4, 4, 4, 0], vec![1, 2]),
            ],
            5,
            3,
        )
        .unwrap()
    }

    fn quick_config() -> ModelConfig {
        let mut config = ModelConfig::new(2);
        config.iterations = 6;
        config.save_every = 0;
        config.hyper_every = 0;
        config
    }

    #[test]
    fn corpus_rejects_bad_input() {
        let empty_authors = vec![Document::new(vec![0], vec![])];
        assert_eq!(
            Corpus::new(empty_authors, 1, 1).unwrap_err(),
            ModelError::EmptyAuthorList { doc: 0 }
        );

        let bad_word = vec![Document::new(vec![3], vec![0])];
        assert!(matches!(
            Corpus::new(bad_word, 3, 1).unwrap_err(),
            ModelError::WordOutOfRange { word: 3, .. }
        ));

        let bad_author = vec![Document::new(vec![0], vec![2])];
        assert!(matches!(
            Corpus::new(bad_author, 1, 2).unwrap_err(),
            ModelError::AuthorOutOfRange { author: 2, .. }
        ));
    }

    #[test]
    fn estimation_produces_normalized_posteriors() {
        let mut model = AuthorTopicModel::new(small_corpus(), quick_config());
        model.estimate();

        let theta = model.theta();
        let phi = model.phi();
        assert_eq!(theta.dim(), (3, 2));
        assert_eq!(phi.dim(), (2, 5));
        for row in theta.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        for row in phi.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert_eq!(model.iteration(), 6);
    }

    #[test]
    fn observer_sees_periodic_and_final_snapshots() {
        let mut config = quick_config();
        config.iterations = 5;
        config.save_every = 2;
        let mut model = AuthorTopicModel::new(small_corpus(), config);

        let mut seen = Vec::new();
        model.estimate_with(|snapshot| seen.push(snapshot.iteration));
        assert_eq!(seen, vec![2, 4, 5]);
    }

    #[test]
    fn final_snapshot_is_not_duplicated() {
        let mut config = quick_config();
        config.iterations = 4;
        config.save_every = 2;
        let mut model = AuthorTopicModel::new(small_corpus(), config);

        let mut seen = Vec::new();
        model.estimate_with(|snapshot| seen.push(snapshot.iteration));
        assert_eq!(seen, vec![2, 4]);
    }

    #[test]
    fn checkpoint_replay_restores_identical_state() {
        let mut model = AuthorTopicModel::new(small_corpus(), quick_config());
        model.estimate();

        let checkpoint = model.checkpoint();
        let resumed =
            AuthorTopicModel::from_checkpoint(small_corpus(), quick_config(), checkpoint.clone())
                .unwrap();

        assert_eq!(resumed.state, model.state);
        assert_eq!(resumed.priors, model.priors);
        assert_eq!(resumed.iteration(), model.iteration());
        assert_eq!(resumed.checkpoint(), checkpoint);
    }

    #[test]
    fn checkpoint_from_other_model_is_rejected() {
        let model = AuthorTopicModel::new(small_corpus(), quick_config());
        let mut config = quick_config();
        config.num_topics = 4;
        let err = AuthorTopicModel::from_checkpoint(small_corpus(), config, model.checkpoint())
            .unwrap_err();
        assert!(matches!(err, ModelError::InconsistentModel(_)));
    }

    #[test]
    fn same_seed_same_trajectory() {
        let run = || {
            let mut model = AuthorTopicModel::new(small_corpus(), quick_config());
            model.estimate();
            model.checkpoint()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn prior_reestimation_keeps_sampling_well_defined() {
        let mut config = quick_config();
        config.hyper_every = 2;
        config.iterations = 8;
        let mut model = AuthorTopicModel::new(small_corpus(), config);
        model.estimate();

        assert!(model.priors().alpha().iter().all(|&a| a > 0.0));
        assert!(model.priors().beta().iter().all(|&b| b > 0.0));
        assert!(model.state.invariants_hold(&model.corpus));
    }
}
