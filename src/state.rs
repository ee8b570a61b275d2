//! Latent assignments and sufficient-statistic count tables.
//!
//! [`SamplerState`] owns everything the collapsed sampler mutates: the
//! per-token `(topic, author)` assignments and the count tables derived from
//! them. All counter updates go through the single `seat`/`unseat` pair so
//! the tables cannot drift apart from the assignments.

use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Corpus, ModelError};

/// Latent state of one token: its topic and its responsible author.
///
/// The author is stored as an index into the owning document's co-author
/// list rather than as a global author id, so a token can only ever be
/// attributed to one of the authors declared on its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAssignment {
    /// Topic index in `[0, K)`.
    pub topic: usize,
    /// Index into the document's author list.
    pub author: usize,
}

/// Mutable sampler state: per-token assignments plus the count tables that
/// summarize them.
///
/// Shapes: `nw` is `V×K` (word-topic), `nd` is `M×K` (document-topic),
/// `na` is `A×K` (author-topic); `nwsum`, `ndsum` and `nasum` cache the
/// corresponding totals so a conditional weight costs O(1) per candidate.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SamplerState {
    pub(crate) nw: Array2<u32>,
    pub(crate) nd: Array2<u32>,
    pub(crate) na: Array2<u32>,
    pub(crate) nwsum: Array1<u32>,
    pub(crate) ndsum: Array1<u32>,
    pub(crate) nasum: Array1<u32>,
    pub(crate) assignments: Vec<Vec<TokenAssignment>>,
    num_topics: usize,
}

impl SamplerState {
    /// Zero tables of the right shapes, with `ndsum` fixed to the document
    /// lengths (a document's token count never changes during sampling).
    fn zeroed(corpus: &Corpus, num_topics: usize) -> Self {
        let ndsum = corpus
            .docs()
            .iter()
            .map(|doc| doc.words.len() as u32)
            .collect::<Vec<_>>();
        Self {
            nw: Array2::zeros((corpus.num_words(), num_topics)),
            nd: Array2::zeros((corpus.num_docs(), num_topics)),
            na: Array2::zeros((corpus.num_authors(), num_topics)),
            nwsum: Array1::zeros(num_topics),
            ndsum: Array1::from_vec(ndsum),
            nasum: Array1::zeros(corpus.num_authors()),
            assignments: Vec::new(),
            num_topics,
        }
    }

    /// Initialize by drawing, for every token, a topic uniformly from
    /// `[0, K)` and an author uniformly from the document's author list.
    pub(crate) fn random_init<R: Rng + ?Sized>(
        corpus: &Corpus,
        num_topics: usize,
        rng: &mut R,
    ) -> Self {
        let mut state = Self::zeroed(corpus, num_topics);
        state.assignments = corpus
            .docs()
            .iter()
            .map(|doc| {
                doc.words
                    .iter()
                    .map(|_| TokenAssignment {
                        topic: rng.gen_range(0..num_topics),
                        author: rng.gen_range(0..doc.authors.len()),
                    })
                    .collect()
            })
            .collect();
        state.seat_all(corpus);
        state
    }

    /// Rebuild the tables by replaying assignments loaded from a
    /// checkpoint.
    ///
    /// # Errors
    /// [`ModelError::InconsistentModel`] if the assignment layout does not
    /// match the corpus, [`ModelError::InvalidAssignment`] if any replayed
    /// topic or author index is out of range.
    pub(crate) fn replay(
        corpus: &Corpus,
        num_topics: usize,
        assignments: Vec<Vec<TokenAssignment>>,
    ) -> Result<Self, ModelError> {
        if assignments.len() != corpus.num_docs() {
            return Err(ModelError::InconsistentModel(format!(
                "checkpoint has {} documents, corpus has {}",
                assignments.len(),
                corpus.num_docs()
            )));
        }
        for (m, (doc, replayed)) in corpus.docs().iter().zip(&assignments).enumerate() {
            if replayed.len() != doc.words.len() {
                return Err(ModelError::InconsistentModel(format!(
                    "checkpoint document {m} has {} tokens, corpus document has {}",
                    replayed.len(),
                    doc.words.len()
                )));
            }
            for (n, assign) in replayed.iter().enumerate() {
                if assign.topic >= num_topics {
                    return Err(ModelError::InvalidAssignment(format!(
                        "token ({m}, {n}): topic {} outside [0, {num_topics})",
                        assign.topic
                    )));
                }
                if assign.author >= doc.authors.len() {
                    return Err(ModelError::InvalidAssignment(format!(
                        "token ({m}, {n}): author index {} outside the document's \
                         author list of length {}",
                        assign.author,
                        doc.authors.len()
                    )));
                }
            }
        }

        let mut state = Self::zeroed(corpus, num_topics);
        state.assignments = assignments;
        state.seat_all(corpus);
        Ok(state)
    }

    /// Fold every current assignment into the count tables.
    fn seat_all(&mut self, corpus: &Corpus) {
        for (m, doc) in corpus.docs().iter().enumerate() {
            for (n, &word) in doc.words.iter().enumerate() {
                let assign = self.assignments[m][n];
                self.seat(m, word, doc.authors[assign.author], assign.topic);
            }
        }
    }

    /// Add one token's contribution to the tables.
    ///
    /// `ndsum` is deliberately untouched: the document length is constant.
    #[inline]
    pub(crate) fn seat(&mut self, doc: usize, word: usize, author: usize, topic: usize) {
        self.nw[[word, topic]] += 1;
        self.nd[[doc, topic]] += 1;
        self.na[[author, topic]] += 1;
        self.nwsum[topic] += 1;
        self.nasum[author] += 1;
    }

    /// Remove one token's contribution from the tables.
    #[inline]
    pub(crate) fn unseat(&mut self, doc: usize, word: usize, author: usize, topic: usize) {
        self.nw[[word, topic]] -= 1;
        self.nd[[doc, topic]] -= 1;
        self.na[[author, topic]] -= 1;
        self.nwsum[topic] -= 1;
        self.nasum[author] -= 1;
    }

    pub(crate) fn num_topics(&self) -> usize {
        self.num_topics
    }

    /// Check the at-rest count invariants against the corpus.
    ///
    /// Every column of `nw` must total `nwsum`, every row of `nd` must
    /// total the document length, every row of `na` must total `nasum`,
    /// and the grand totals must agree with the corpus token count.
    pub(crate) fn invariants_hold(&self, corpus: &Corpus) -> bool {
        let nw_ok = (0..self.num_topics)
            .all(|k| self.nw.column(k).sum() == self.nwsum[k]);
        let nd_ok = corpus
            .docs()
            .iter()
            .enumerate()
            .all(|(m, doc)| self.nd.row(m).sum() == doc.words.len() as u32);
        let na_ok = (0..corpus.num_authors())
            .all(|a| self.na.row(a).sum() == self.nasum[a]);
        let total = corpus.total_tokens() as u32;
        nw_ok && nd_ok && na_ok && self.nwsum.sum() == total && self.nasum.sum() == total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn one_doc_corpus() -> Corpus {
        let doc = Document::new(vec![0, 1, 0, 2], vec![0]);
        Corpus::new(vec![doc], 3, 1).unwrap()
    }

    #[test]
    fn init_totals_match_document_lengths() {
        let corpus = one_doc_corpus();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let state = SamplerState::random_init(&corpus, 2, &mut rng);

        assert_eq!(state.nd.row(0).sum(), 4);
        assert_eq!(state.na.row(0).sum(), 4);
        assert_eq!(state.nwsum.sum(), 4);
        assert_eq!(state.nasum[0], 4);
        assert!(state.invariants_hold(&corpus));
    }

    #[test]
    fn seat_unseat_round_trips() {
        let corpus = one_doc_corpus();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut state = SamplerState::random_init(&corpus, 2, &mut rng);
        let before = state.clone();

        state.unseat(0, 0, 0, state.assignments[0][0].topic);
        state.seat(0, 0, 0, state.assignments[0][0].topic);
        assert_eq!(state, before);
    }

    #[test]
    fn replay_rejects_out_of_range_topic() {
        let corpus = one_doc_corpus();
        let assignments = vec![vec![TokenAssignment { topic: 2, author: 0 }; 4]];
        let err = SamplerState::replay(&corpus, 2, assignments).unwrap_err();
        assert!(matches!(err, ModelError::InvalidAssignment(_)));
    }

    #[test]
    fn replay_rejects_out_of_range_author() {
        let corpus = one_doc_corpus();
        let assignments = vec![vec![TokenAssignment { topic: 0, author: 1 }; 4]];
        let err = SamplerState::replay(&corpus, 2, assignments).unwrap_err();
        assert!(matches!(err, ModelError::InvalidAssignment(_)));
    }

    #[test]
    fn replay_rejects_wrong_token_count() {
        let corpus = one_doc_corpus();
        let assignments = vec![vec![TokenAssignment { topic: 0, author: 0 }; 3]];
        let err = SamplerState::replay(&corpus, 2, assignments).unwrap_err();
        assert!(matches!(err, ModelError::InconsistentModel(_)));
    }

    #[test]
    fn replay_rebuilds_identical_counts() {
        let corpus = one_doc_corpus();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let state = SamplerState::random_init(&corpus, 2, &mut rng);

        let replayed =
            SamplerState::replay(&corpus, 2, state.assignments.clone()).unwrap();
        assert_eq!(replayed, state);
    }
}
