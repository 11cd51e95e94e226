use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use find_neardup::{EditDistanceEngine, HybridPipeline, IndexConfig};

mod common;

#[derive(Parser, Debug)]
#[clap(
    name = "find-neardup-hybrid",
    about = "A program to find near-duplicate records with MinHash LSH and edit distance."
)]
struct Args {
    /// File path to a TSV file of `id<TAB>name<TAB>description` lines to be indexed.
    #[clap(short = 'i', long)]
    input_path: PathBuf,

    /// File path to a TSV file of query records.
    /// If None, all pairs of near-duplicates within the input are searched.
    #[clap(short = 'q', long)]
    query_path: Option<PathBuf>,

    /// Minimum combined similarity in the range of [0,1].
    #[clap(short = 't', long, default_value = "0.8")]
    threshold: f64,

    /// Delimiter for recognizing words as tokens in shingling.
    /// If None, characters are used for tokens.
    #[clap(short = 'd', long)]
    delimiter: Option<char>,

    /// Window size for w-shingling (must be more than 0).
    #[clap(short = 'w', long, default_value = "3")]
    window_size: usize,

    /// Number of MinHash functions.
    #[clap(short = 'k', long, default_value = "100")]
    num_hashes: usize,

    /// Number of LSH bands.
    #[clap(short = 'b', long, default_value = "33")]
    num_bands: usize,

    /// Number of rows in an LSH band.
    #[clap(short = 'r', long, default_value = "3")]
    rows_per_band: usize,

    /// Seed value for random values.
    #[clap(short = 's', long)]
    seed: Option<u64>,

    /// Weight of the name field.
    #[clap(long, default_value = "0.7")]
    name_weight: f64,

    /// Weight of the description field.
    #[clap(long, default_value = "0.3")]
    description_weight: f64,
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();

    let mut config = IndexConfig::default()
        .num_hashes(args.num_hashes)
        .bands(args.num_bands, args.rows_per_band)
        .window_size(args.window_size)
        .delimiter(args.delimiter);
    if let Some(seed) = args.seed {
        config = config.seed(seed);
    }
    let engine = EditDistanceEngine::new(common::field_weights(
        args.name_weight,
        args.description_weight,
    )?)
    .default_filters()
    .parallel_threshold(config.get_parallel_threshold());
    let mut pipeline = HybridPipeline::new(config)?
        .with_engine(engine)?
        .shows_progress(true);

    {
        let records = common::read_records(&args.input_path)?;
        tracing::info!(records = records.len(), "Building the index...");
        let start = Instant::now();
        pipeline.build_index(records)?;
        let stats = pipeline.index_stats()?;
        tracing::info!(
            %stats,
            threshold_estimate = pipeline.index().threshold_estimate(),
            "Built in {} sec, consuming {} MiB",
            start.elapsed().as_secs_f64(),
            pipeline.index().memory_in_bytes() as f64 / (1024. * 1024.)
        );
    }

    let start = Instant::now();
    let results = match &args.query_path {
        Some(query_path) => {
            let queries = common::read_records(query_path)?;
            tracing::info!(queries = queries.len(), "Searching near-duplicates of queries...");
            pipeline.find_duplicates(&queries, args.threshold)?
        }
        None => {
            tracing::info!("Searching all near-duplicate pairs...");
            pipeline.find_all_duplicates(args.threshold)?
        }
    };
    tracing::info!(
        pairs = results.len(),
        "Done in {} sec",
        start.elapsed().as_secs_f64()
    );

    common::print_results(&results)
}
