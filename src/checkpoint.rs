//! Serializable sampler checkpoints.
//!
//! A checkpoint carries the complete latent state of a run (per-token
//! assignments, the prior vectors and the shape metadata needed to verify
//! them) as plain serde-serializable values. Where and how they are
//! written (JSON, a database, anything) is the persistence layer's
//! business, not this crate's.

use serde::{Deserialize, Serialize};

use crate::state::TokenAssignment;
use crate::{Corpus, ModelError};

/// Complete latent state of an estimation run.
///
/// Replaying a checkpoint through `AuthorTopicModel::from_checkpoint`
/// rebuilds count tables identical to the ones it was captured from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Number of topics K.
    pub num_topics: usize,
    /// Vocabulary size V.
    pub num_words: usize,
    /// Number of documents M.
    pub num_docs: usize,
    /// Number of authors A.
    pub num_authors: usize,
    /// Sweep count at capture time.
    pub iteration: usize,
    /// Per-topic Dirichlet prior, length K.
    pub alpha: Vec<f64>,
    /// Per-word Dirichlet prior, length V.
    pub beta: Vec<f64>,
    /// Per-token assignments, one inner vector per document.
    pub assignments: Vec<Vec<TokenAssignment>>,
}

impl Checkpoint {
    /// Verify the shape metadata against the corpus and configuration the
    /// checkpoint is about to be replayed into.
    ///
    /// Per-token range checks happen during the replay itself; this
    /// catches the grosser mismatch of loading a checkpoint from a
    /// different model.
    pub(crate) fn validate(&self, corpus: &Corpus, num_topics: usize) -> Result<(), ModelError> {
        let mismatch = |what: &str, expected: usize, found: usize| {
            ModelError::InconsistentModel(format!(
                "checkpoint {what} is {found}, expected {expected}"
            ))
        };
        if self.num_topics != num_topics {
            return Err(mismatch("topic count", num_topics, self.num_topics));
        }
        if self.num_words != corpus.num_words() {
            return Err(mismatch("vocabulary size", corpus.num_words(), self.num_words));
        }
        if self.num_docs != corpus.num_docs() {
            return Err(mismatch("document count", corpus.num_docs(), self.num_docs));
        }
        if self.num_authors != corpus.num_authors() {
            return Err(mismatch("author count", corpus.num_authors(), self.num_authors));
        }
        if self.alpha.len() != num_topics {
            return Err(mismatch("alpha length", num_topics, self.alpha.len()));
        }
        if self.beta.len() != corpus.num_words() {
            return Err(mismatch("beta length", corpus.num_words(), self.beta.len()));
        }
        if !self.alpha.iter().chain(&self.beta).all(|&v| v.is_finite() && v > 0.0) {
            return Err(ModelError::InconsistentModel(
                "checkpoint priors must be strictly positive".into(),
            ));
        }
        Ok(())
    }
}
