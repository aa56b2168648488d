use super::*;
use crate::embeddings::HashingEmbedder;
use crate::index::Neighbor;
use std::thread;

fn record(id: u64, title: &str, text: &str) -> DocumentRecord {
    DocumentRecord {
        id,
        title: title.to_string(),
        text: text.to_string(),
        asset_paths: vec![format!("images/{}_image_0.png", title)],
    }
}

fn abc_store() -> DocumentStore {
    DocumentStore::new(vec![
        record(0, "A", "A week of hiking in the Dolomites with heavy rain."),
        record(1, "B", "Sailing around Sardinia and swimming in turquoise coves."),
        record(2, "C", "Street food tour through the night markets of Taipei."),
    ])
}

fn retriever(store: DocumentStore) -> Retriever {
    Retriever::build(Arc::new(HashingEmbedder::default()), store).expect("build retriever")
}

/// Always answers with a position past the end of any store
#[derive(Debug)]
struct OutOfBoundsIndex;

impl VectorIndex for OutOfBoundsIndex {
    fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<Neighbor>> {
        Ok(vec![Neighbor {
            position: 99,
            distance: 0.0,
        }])
    }

    fn len(&self) -> usize {
        3
    }

    fn dimension(&self) -> usize {
        crate::embeddings::hashing::DEFAULT_HASHING_DIMENSION
    }
}

#[test]
fn exact_text_query_returns_that_record() {
    let retriever = retriever(abc_store());
    let query = abc_store().get(1).expect("record B").text.clone();

    let results = retriever.retrieve(&query, 1).expect("retrieve");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.title, "B");
    assert_eq!(results[0].rank, 0);
    assert_eq!(results[0].distance, 0.0);
}

#[test]
fn blank_query_rejected() {
    let retriever = retriever(abc_store());
    assert!(matches!(
        retriever.retrieve("", 5),
        Err(RagError::InvalidQuery(_))
    ));
    assert!(matches!(
        retriever.retrieve("  \t ", 5),
        Err(RagError::InvalidQuery(_))
    ));
}

#[test]
fn zero_k_rejected() {
    let retriever = retriever(abc_store());
    assert!(matches!(
        retriever.retrieve("sailing", 0),
        Err(RagError::InvalidArgument(_))
    ));
}

#[test]
fn results_ranked_by_distance() {
    let retriever = retriever(abc_store());
    let results = retriever
        .retrieve("swimming near Sardinia", DEFAULT_TOP_K)
        .expect("retrieve");

    assert_eq!(results.len(), 3);
    for (expected_rank, result) in results.iter().enumerate() {
        assert_eq!(result.rank, expected_rank);
    }
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn every_record_retrieves_itself() {
    let store = abc_store();
    let retriever = retriever(store.clone());

    for record in store.records() {
        let results = retriever.retrieve(&record.text, 1).expect("retrieve");
        assert_eq!(&results[0].record, record);
    }
}

#[test]
fn empty_corpus_cannot_be_indexed() {
    let result = Retriever::build(
        Arc::new(HashingEmbedder::default()),
        DocumentStore::default(),
    );
    assert!(matches!(result, Err(RagError::EmptyIndex)));
}

#[test]
fn rebuild_publishes_new_snapshot() {
    let retriever = retriever(abc_store());
    let before = retriever.snapshot();

    retriever
        .rebuild(DocumentStore::new(vec![
            record(0, "D", "Cycling the Danube from Passau to Vienna."),
            record(1, "E", "Cold mornings and hot springs in Iceland."),
        ]))
        .expect("rebuild");

    assert_eq!(before.len(), 3);
    assert_eq!(retriever.len(), 2);

    let results = retriever
        .retrieve("Cold mornings and hot springs in Iceland.", 1)
        .expect("retrieve");
    assert_eq!(results[0].record.title, "E");
}

#[test]
fn failed_rebuild_keeps_previous_snapshot() {
    let retriever = retriever(abc_store());
    let result = retriever.rebuild(DocumentStore::new(vec![record(0, "X", "   ")]));

    assert!(matches!(result, Err(RagError::EmptyInput { position: 0 })));
    assert_eq!(retriever.len(), 3);
}

#[test]
fn rebuild_from_same_corpus_is_idempotent() {
    let retriever = retriever(abc_store());
    let first = retriever.retrieve("night markets", 3).expect("retrieve");
    retriever.rebuild(abc_store()).expect("rebuild");
    let second = retriever.retrieve("night markets", 3).expect("retrieve");
    assert_eq!(first, second);
}

#[test]
fn concurrent_readers_during_rebuild() {
    let retriever = Arc::new(retriever(abc_store()));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let retriever = Arc::clone(&retriever);
            thread::spawn(move || {
                for _ in 0..50 {
                    let snapshot = retriever.snapshot();
                    assert_eq!(snapshot.len(), snapshot.index().len());
                    let results = retriever.retrieve("travel", 10).expect("retrieve");
                    assert!(results.len() == 3 || results.len() == 2);
                }
            })
        })
        .collect();

    for round in 0..10 {
        let store = if round % 2 == 0 {
            DocumentStore::new(vec![
                record(0, "D", "Cycling the Danube."),
                record(1, "E", "Hot springs in Iceland."),
            ])
        } else {
            abc_store()
        };
        retriever.rebuild(store).expect("rebuild");
    }

    for reader in readers {
        reader.join().expect("reader thread should not panic");
    }
}

#[test]
fn out_of_bounds_position_is_corrupt_index() {
    let snapshot = Snapshot::new(abc_store(), Box::new(OutOfBoundsIndex)).expect("snapshot");
    let retriever = Retriever::from_snapshot(Arc::new(HashingEmbedder::default()), snapshot)
        .expect("retriever");

    let err = retriever
        .retrieve("anything", 1)
        .expect_err("out of bounds position should fail");
    assert!(matches!(
        err,
        RagError::CorruptIndex {
            position: 99,
            records: 3
        }
    ));
    assert!(err.is_invariant_violation());
}

#[test]
fn snapshot_requires_matching_sizes() {
    let index = FlatIndex::build(&[vec![1.0; 4]]).expect("build");
    let err = Snapshot::new(abc_store(), Box::new(index)).expect_err("sizes differ");
    assert!(matches!(
        err,
        RagError::IndexSizeMismatch {
            vectors: 1,
            records: 3
        }
    ));
    assert_eq!(
        err.to_string(),
        "Index holds 1 vectors but the store holds 3 records"
    );
}

#[test]
fn from_snapshot_checks_dimension() {
    let index = FlatIndex::build(&[vec![1.0; 4], vec![2.0; 4], vec![3.0; 4]]).expect("build");
    let snapshot = Snapshot::new(abc_store(), Box::new(index)).expect("snapshot");
    let result = Retriever::from_snapshot(Arc::new(HashingEmbedder::default()), snapshot);
    assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));
}

#[test]
fn publish_rejects_wrong_dimension() {
    let retriever = retriever(abc_store());
    let index = FlatIndex::build(&[vec![1.0; 4], vec![2.0; 4], vec![3.0; 4]]).expect("build");
    let snapshot = Snapshot::new(abc_store(), Box::new(index)).expect("snapshot");
    let before = retriever.snapshot();

    let err = retriever
        .publish(snapshot)
        .expect_err("4-dimensional index should be rejected");

    assert!(matches!(
        err,
        RagError::DimensionMismatch {
            expected: 384,
            actual: 4,
            ..
        }
    ));
    assert!(Arc::ptr_eq(&before, &retriever.snapshot()));
    assert!(!retriever.retrieve("night markets", 1).expect("retrieve").is_empty());
}
