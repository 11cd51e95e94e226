use std::time::Duration;

use rand::{Rng, SeedableRng};

use criterion::{
    criterion_group, criterion_main, measurement::WallTime, BenchmarkGroup, Criterion, SamplingMode,
};

use find_neardup::{EditDistanceEngine, HybridPipeline, IndexConfig, Record};

const SAMPLE_SIZE: usize = 10;
const WARM_UP_TIME: Duration = Duration::from_secs(3);
const MEASURE_TIME: Duration = Duration::from_secs(10);

const NUM_RECORDS: [usize; 3] = [200, 1000, 5000];
const MAX_EXACT_RECORDS: usize = 1000;
const THRESHOLD: f64 = 0.8;

const WORDS: [&str; 16] = [
    "apple", "galaxy", "pro", "max", "mini", "ultra", "wireless", "charger", "case", "cable",
    "black", "white", "64gb", "128gb", "edition", "bundle",
];

/// Generates product-like records, one in ten a slightly edited copy of an earlier one.
fn synthetic_records(n: usize) -> Vec<Record> {
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(n as u64);
    let mut records: Vec<Record> = Vec::with_capacity(n);
    for i in 0..n {
        let record = if i > 0 && i % 10 == 0 {
            let src = &records[rng.gen_range(0..i)];
            let mut name = src.field(0).to_string();
            name.push(char::from(b'a' + rng.gen_range(0..26)));
            Record::new(i.to_string(), [name, src.field(1).to_string()])
        } else {
            let mut text = |num_words: usize| {
                (0..num_words)
                    .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
                    .collect::<Vec<_>>()
                    .join(" ")
            };
            let name = text(4);
            let description = text(8);
            Record::new(i.to_string(), [name, description])
        };
        records.push(record);
    }
    records
}

fn criterion_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP_TIME);
    group.measurement_time(MEASURE_TIME);
    group.sampling_mode(SamplingMode::Flat);

    add_search_benches(&mut group);
}

fn add_search_benches(group: &mut BenchmarkGroup<WallTime>) {
    for n in NUM_RECORDS {
        let records = synthetic_records(n);

        if n <= MAX_EXACT_RECORDS {
            let engine = EditDistanceEngine::default().default_filters();
            group.bench_function(format!("exact/{n}"), |b| {
                b.iter(|| engine.find_duplicates(&records, THRESHOLD));
            });
        }

        let mut pipeline = HybridPipeline::new(IndexConfig::default().seed(42)).unwrap();
        pipeline.build_index(records.clone()).unwrap();
        group.bench_function(format!("hybrid/{n}"), |b| {
            b.iter(|| pipeline.find_all_duplicates(THRESHOLD).unwrap());
        });
    }
}

criterion_group!(benches, criterion_search);
criterion_main!(benches);
