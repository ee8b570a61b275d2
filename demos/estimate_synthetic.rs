//! Train on a small synthetic corpus and print the recovered structure.
//!
//! Run with `RUST_LOG=info` to see the sweep progress:
//! `RUST_LOG=info cargo run --example estimate_synthetic`

use author_topic::{AuthorTopicModel, Corpus, Document, ModelConfig, posterior};

/// Three authors: 0 writes words 0..5, 1 writes 5..10, 2 co-authors with
/// both and mixes the vocabularies.
fn synthetic_corpus() -> Corpus {
    let mut docs = Vec::new();
    for i in 0..10 {
        docs.push(Document::new(
            (0..40).map(|t| (i + t) % 5).collect(),
            vec![0],
        ));
        docs.push(Document::new(
            (0..40).map(|t| 5 + (i + t) % 5).collect(),
            vec![1],
        ));
        docs.push(Document::new(
            (0..40).map(|t| (i * 3 + t * 7) % 10).collect(),
            vec![i % 2, 2],
        ));
    }
    Corpus::new(docs, 10, 3).expect("synthetic corpus is valid")
}

fn main() {
    env_logger::init();

    let mut config = ModelConfig::new(2);
    config.alpha = 0.5;
    config.beta = 0.1;
    config.iterations = 300;
    config.save_every = 100;
    config.hyper_every = 25;
    config.seed = 42;

    let mut model = AuthorTopicModel::new(synthetic_corpus(), config);
    model.estimate_with(|snapshot| {
        eprintln!("snapshot at sweep {}", snapshot.iteration);
    });

    println!("word log-likelihood: {:.3}", model.log_likelihood());
    println!();

    let phi = model.phi();
    for (k, ranked) in posterior::top_words(&phi, 5).into_iter().enumerate() {
        print!("topic {k}:");
        for (word, prob) in ranked {
            print!("  {word} ({prob:.3})");
        }
        println!();
    }
    println!();

    let theta = model.theta();
    for (author, ranked) in posterior::top_topics(&theta, 2).into_iter().enumerate() {
        print!("author {author}:");
        for (topic, prob) in ranked {
            print!("  topic {topic} ({prob:.3})");
        }
        println!();
    }
}
