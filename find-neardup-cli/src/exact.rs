use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use find_neardup::{EditDistanceEngine, KernelKind};

mod common;

#[derive(Parser, Debug)]
#[clap(
    name = "find-neardup-exact",
    about = "A program to find near-duplicate records by comparing all pairs."
)]
struct Args {
    /// File path to a TSV file of `id<TAB>name<TAB>description` lines.
    #[clap(short = 'i', long)]
    input_path: PathBuf,

    /// Minimum combined similarity in the range of [0,1].
    #[clap(short = 't', long, default_value = "0.8")]
    threshold: f64,

    /// Weight of the name field.
    #[clap(long, default_value = "0.7")]
    name_weight: f64,

    /// Weight of the description field.
    #[clap(long, default_value = "0.3")]
    description_weight: f64,

    /// Number of records above which pairs are compared in parallel.
    #[clap(short = 'p', long, default_value = "100")]
    parallel_threshold: usize,

    /// Disables the length and character-bag pre-filters.
    #[clap(long)]
    no_prefilter: bool,

    /// Uses the scalar kernel regardless of the CPU.
    #[clap(long)]
    scalar: bool,
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();

    let records = common::read_records(&args.input_path)?;
    let weights = common::field_weights(args.name_weight, args.description_weight)?;

    let mut engine = EditDistanceEngine::new(weights)
        .parallel_threshold(args.parallel_threshold)
        .shows_progress(true);
    if !args.no_prefilter {
        engine = engine.default_filters();
    }
    if args.scalar {
        engine = engine.kernel(KernelKind::Scalar);
    }

    tracing::info!(
        records = records.len(),
        kernel = engine.levenshtein().kernel_name(),
        "Comparing all pairs..."
    );
    let start = Instant::now();
    let results = engine.find_duplicates(&records, args.threshold);
    let pool = engine.levenshtein().pool().stats();
    tracing::info!(
        pairs = results.len(),
        pool_hits = pool.hits,
        pool_misses = pool.misses,
        "Done in {} sec",
        start.elapsed().as_secs_f64()
    );

    common::print_results(&results)
}
