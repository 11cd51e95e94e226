use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use find_neardup::{
    ComparisonResult, EditDistanceEngine, FieldWeights, FindNeardupError, HybridPipeline,
    IndexConfig, Record,
};

const THRESHOLD: f64 = 0.8;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn random_text<R: Rng>(rng: &mut R, min_len: usize, max_len: usize) -> String {
    let len = rng.gen_range(min_len..=max_len);
    (0..len)
        .map(|_| char::from(b'a' + rng.gen_range(0..26)))
        .collect()
}

/// Replaces the characters at `positions` with a different letter.
fn substitute(text: &str, positions: &[usize]) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    for &pos in positions {
        chars[pos] = if chars[pos] == 'z' { 'y' } else { 'z' };
    }
    chars.into_iter().collect()
}

/// About 200 random records with planted near-duplicates of earlier records:
///
/// * `dup0`-`dup2` substitute one character in the middle of the name;
/// * `dup3` drops the description;
/// * `dup4` substitutes two characters in each field, spread over the text;
/// * `dup5` carries an extra field not compared by the engine;
/// * `dup6` drops the name.
fn corpus_with_planted() -> (Vec<Record>, Vec<(String, String)>) {
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(1234);
    let mut records: Vec<_> = (0..193)
        .map(|i| {
            Record::new(
                format!("r{i:03}"),
                [random_text(&mut rng, 12, 20), random_text(&mut rng, 20, 40)],
            )
        })
        .collect();
    let mut planted = vec![];
    for (k, src) in [5, 77, 150, 20, 100, 120, 140].into_iter().enumerate() {
        let original = records[src].clone();
        let (name, desc) = (original.field(0), original.field(1));
        let (name_len, desc_len) = (name.len(), desc.len());
        let id = format!("dup{k}");
        let record = match k {
            0..=2 => Record::new(id.clone(), [substitute(name, &[name_len / 2]), desc.to_string()]),
            3 => Record::new(id.clone(), [name, ""]),
            4 => Record::new(
                id.clone(),
                [
                    substitute(name, &[name_len / 4, name_len * 3 / 4]),
                    substitute(desc, &[desc_len / 4, desc_len * 3 / 4]),
                ],
            ),
            5 => Record::new(id.clone(), [name, desc, "warehouse 7, shelf 12"]),
            _ => Record::new(id.clone(), ["", desc]),
        };
        records.push(record);
        planted.push((original.id().to_string(), id));
    }
    (records, planted)
}

fn owned_key(result: &ComparisonResult) -> (String, String) {
    let (a, b) = result.pair_key();
    (a.to_string(), b.to_string())
}

fn built_pipeline(records: &[Record], config: IndexConfig) -> HybridPipeline {
    let mut pipeline = HybridPipeline::new(config).unwrap().shows_progress(true);
    pipeline.build_index(records.to_vec()).unwrap();
    pipeline
}

#[test]
fn test_recall_parity_with_brute_force() {
    init_tracing();
    let (records, planted) = corpus_with_planted();
    let brute = EditDistanceEngine::default().find_duplicates(&records, THRESHOLD);

    let mut expected: Vec<_> = planted
        .iter()
        .map(|(a, b)| find_neardup::record::pair_key(a, b))
        .collect();
    expected.sort_unstable();
    let mut found: Vec<_> = brute.iter().map(|r| r.pair_key()).collect();
    found.sort_unstable();
    assert_eq!(found, expected);

    let pipeline = built_pipeline(&records, IndexConfig::default().seed(42));
    assert_eq!(pipeline.find_all_duplicates(THRESHOLD).unwrap(), brute);

    let hybrid = pipeline.find_duplicates(&records, THRESHOLD).unwrap();
    assert_eq!(hybrid.len(), brute.len());
    for (h, b) in hybrid.iter().zip(&brute) {
        assert_eq!(h.pair_key(), b.pair_key());
        assert_eq!(h.combined_similarity, b.combined_similarity);
    }
}

#[test]
fn test_recall_parity_for_each_record() {
    let (records, planted) = corpus_with_planted();
    let brute: BTreeSet<_> = EditDistanceEngine::default()
        .find_duplicates(&records, THRESHOLD)
        .iter()
        .map(owned_key)
        .collect();
    let expected: BTreeSet<_> = planted
        .iter()
        .map(|(a, b)| {
            let (x, y) = find_neardup::record::pair_key(a, b);
            (x.to_string(), y.to_string())
        })
        .collect();
    assert_eq!(brute, expected);

    for seed in [3, 42, 2024] {
        let pipeline = built_pipeline(&records, IndexConfig::default().seed(seed));
        let mut found = BTreeSet::new();
        for record in &records {
            for result in pipeline.find_duplicates_for_one(record, THRESHOLD).unwrap() {
                assert_eq!(result.record_a, record.id());
                let other = lookup(&records, &result.record_b);
                assert_eq!(result, pipeline.compare(record, &other));
                found.insert(owned_key(&result));
            }
        }
        assert_eq!(found, brute, "seed={seed}");
    }
}

fn lookup(records: &[Record], id: &str) -> Record {
    records.iter().find(|r| r.id() == id).unwrap().clone()
}

fn filler_records(rng: &mut rand_xoshiro::Xoshiro256PlusPlus, n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            Record::new(
                format!("f{i}"),
                [random_text(rng, 10, 20), random_text(rng, 20, 50)],
            )
        })
        .collect()
}

#[test]
fn test_one_sided_description_is_found() {
    let a = Record::new("a", ["Kindle Paperwhite", ""]);
    let b = Record::new(
        "b",
        [
            "Kindle Paperwhite",
            "E-reader with a 6.8 inch glare free display, adjustable warm light and weeks of battery life",
        ],
    );
    assert_eq!(EditDistanceEngine::default().compare(&a, &b).combined_similarity, 1.);

    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(8);
    for seed in 0..20 {
        let mut records = filler_records(&mut rng, 50);
        records.push(a.clone());
        records.push(b.clone());
        let pipeline = built_pipeline(&records, IndexConfig::default().seed(seed));

        let all: Vec<_> = pipeline.find_all_duplicates(THRESHOLD).unwrap();
        assert!(all.iter().any(|r| r.pair_key() == ("a", "b")), "seed={seed}");
        let for_a = pipeline.find_duplicates_for_one(&a, THRESHOLD).unwrap();
        assert_eq!(for_a.len(), 1, "seed={seed}");
        assert_eq!(for_a[0].record_b, "b");
    }
}

#[test]
fn test_uncompared_fields_do_not_hide_pairs() {
    let a = Record::new("a", ["Kindle Paperwhite", "E-reader", "Sold by shop A since 2019"]);
    let b = Record::new("b", ["Kindle Paperwhite", "E-reader", "Warehouse 42, shelf 7, bin 3"]);
    assert_eq!(EditDistanceEngine::default().compare(&a, &b).combined_similarity, 1.);

    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(9);
    for seed in 0..20 {
        let mut records = filler_records(&mut rng, 50);
        records.push(b.clone());
        let pipeline = built_pipeline(&records, IndexConfig::default().seed(seed));
        let results = pipeline.find_duplicates_for_one(&a, THRESHOLD).unwrap();
        assert_eq!(results.len(), 1, "seed={seed}");
        assert_eq!(results[0].record_b, "b");
        assert_eq!(results[0].combined_similarity, 1.);
    }
}

#[test]
fn test_parallel_matches_sequential() {
    let (records, _) = corpus_with_planted();
    let config = IndexConfig::default().seed(7);
    let sequential = built_pipeline(&records, config.parallel_threshold(usize::MAX));
    let parallel = built_pipeline(&records, config.parallel_threshold(10));
    assert_eq!(
        sequential.find_duplicates(&records, 0.5).unwrap(),
        parallel.find_duplicates(&records, 0.5).unwrap()
    );
    assert_eq!(
        sequential.index_stats().unwrap(),
        parallel.index_stats().unwrap()
    );

    let engine = |parallel_threshold: usize| {
        EditDistanceEngine::default()
            .default_filters()
            .parallel_threshold(parallel_threshold)
    };
    assert_eq!(
        engine(usize::MAX).find_duplicates(&records, 0.5),
        engine(10).find_duplicates(&records, 0.5)
    );
}

#[test]
fn test_idempotent_queries() {
    let (records, planted) = corpus_with_planted();
    let pipeline = built_pipeline(&records, IndexConfig::default().seed(99));
    let query = records
        .iter()
        .find(|r| r.id() == planted[0].0)
        .unwrap()
        .clone();
    let first = pipeline.find_duplicates_for_one(&query, THRESHOLD).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].record_b, planted[0].1);
    for _ in 0..3 {
        assert_eq!(
            pipeline.find_duplicates_for_one(&query, THRESHOLD).unwrap(),
            first
        );
        assert_eq!(
            pipeline.index().query(&query).unwrap(),
            pipeline.index().query(&query).unwrap()
        );
    }
    let all = pipeline.find_all_duplicates(THRESHOLD).unwrap();
    assert_eq!(pipeline.find_all_duplicates(THRESHOLD).unwrap(), all);
}

#[test]
fn test_iphone_scenario() {
    let records = vec![
        Record::new("1", ["Apple iPhone 14 Pro", "A16 chip"]),
        Record::new("2", ["Apple iPhone 14 Pro", "A16 chip"]),
        Record::new("3", ["Samsung Galaxy S23", "Snapdragon"]),
    ];
    let exact = EditDistanceEngine::default().find_duplicates(&records, THRESHOLD);
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].pair_key(), ("1", "2"));
    assert_eq!(exact[0].combined_similarity, 1.0);

    let pipeline = built_pipeline(&records, IndexConfig::default());
    let hybrid = pipeline.find_duplicates(&records, THRESHOLD).unwrap();
    assert_eq!(hybrid, exact);
}

#[test]
fn test_weights_equivalence() {
    let a = Record::new("a", ["Logitech MX Master 3", "Wireless mouse"]);
    let b = Record::new("b", ["Logitech MX Master 3S", "Wireless mouse, graphite"]);
    let engine = EditDistanceEngine::default();
    let small = FieldWeights::new(&[0.8, 0.2]).unwrap();
    let large = FieldWeights::new(&[8., 2.]).unwrap();
    assert_eq!(
        engine.compare_with_weights(&a, &b, &small),
        engine.compare_with_weights(&a, &b, &large)
    );
    let weighted = EditDistanceEngine::new(large);
    assert_eq!(
        weighted.compare(&a, &b),
        engine.compare_with_weights(&a, &b, &small)
    );
}

#[test]
fn test_errors() {
    let err = HybridPipeline::new(IndexConfig::default().bands(34, 3))
        .err()
        .unwrap();
    assert!(matches!(err, FindNeardupError::Configuration(_)));

    let record = Record::new("a", ["x", "y"]);
    let pipeline = HybridPipeline::new(IndexConfig::default()).unwrap();
    let err = pipeline.find_duplicates_for_one(&record, THRESHOLD).unwrap_err();
    assert!(matches!(err, FindNeardupError::Precondition(_)));

    let mut pipeline = HybridPipeline::new(IndexConfig::default()).unwrap();
    let err = pipeline
        .build_index([record.clone(), record.clone()])
        .unwrap_err();
    assert!(matches!(err, FindNeardupError::Input(_)));

    let err = FieldWeights::new(&[-1., 2.]).unwrap_err();
    assert!(matches!(err, FindNeardupError::Input(_)));
}

#[test]
fn test_edited_queries() {
    let (records, planted) = corpus_with_planted();
    let originals: Vec<_> = records
        .iter()
        .filter(|r| !r.id().starts_with("dup"))
        .cloned()
        .collect();
    let queries: Vec<_> = records
        .iter()
        .filter(|r| r.id().starts_with("dup"))
        .cloned()
        .collect();
    let pipeline = built_pipeline(&originals, IndexConfig::default().seed(5));
    let results = pipeline.find_duplicates(&queries, THRESHOLD).unwrap();
    let mut found: Vec<_> = results
        .iter()
        .map(|r| (r.record_b.clone(), r.record_a.clone()))
        .collect();
    found.sort_unstable();
    let mut expected = planted;
    expected.sort_unstable();
    assert_eq!(found, expected);
}
