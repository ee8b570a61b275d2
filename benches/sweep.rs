use author_topic::{AuthorTopicModel, Corpus, Document, ModelConfig};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

/// Deterministic synthetic corpus; no point pulling an RNG into a bench.
fn synthetic_corpus(num_docs: usize, doc_len: usize, vocab: usize, authors: usize) -> Corpus {
    let docs = (0..num_docs)
        .map(|i| {
            let words = (0..doc_len).map(|t| (i * 7 + t * 13) % vocab).collect();
            Document::new(words, vec![i % authors, (i + 1) % authors])
        })
        .collect();
    Corpus::new(docs, vocab, authors).unwrap()
}

fn bench_sweep(c: &mut Criterion) {
    let corpus = synthetic_corpus(100, 64, 500, 20);
    let mut config = ModelConfig::new(20);
    config.seed = 42;
    let mut model = AuthorTopicModel::new(corpus, config);
    c.bench_function("gibbs_sweep", |bencher| {
        bencher.iter(|| {
            model.sweep();
            black_box(model.iteration());
        });
    });
}

fn bench_reestimate_priors(c: &mut Criterion) {
    let corpus = synthetic_corpus(100, 64, 500, 20);
    let mut config = ModelConfig::new(20);
    config.seed = 42;
    let mut model = AuthorTopicModel::new(corpus, config);
    for _ in 0..5 {
        model.sweep();
    }
    c.bench_function("reestimate_priors", |bencher| {
        bencher.iter(|| {
            black_box(model.reestimate_priors());
        });
    });
}

criterion_group!(benches, bench_sweep, bench_reestimate_priors);
criterion_main!(benches);
