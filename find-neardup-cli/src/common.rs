use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use find_neardup::{ComparisonResult, FieldWeights, Record};

/// Sends logs to stderr, at the level of `RUST_LOG` or `info` by default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
}

/// Reads records from a TSV file of `id<TAB>name<TAB>description` lines.
///
/// Blank lines are skipped, and missing columns are empty.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut records = vec![];
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut cols = line.splitn(3, '\t');
        let id = cols.next().unwrap_or_default();
        if id.is_empty() {
            bail!("{}:{}: the id column is empty", path.display(), i + 1);
        }
        let name = cols.next().unwrap_or_default();
        let description = cols.next().unwrap_or_default();
        records.push(Record::new(id, [name, description]));
    }
    Ok(records)
}

/// Builds the weights of the name and description fields.
pub fn field_weights(name: f64, description: f64) -> Result<FieldWeights> {
    Ok(FieldWeights::new(&[name, description])?)
}

/// Prints results to stdout as CSV.
pub fn print_results(results: &[ComparisonResult]) -> Result<()> {
    let mut out = BufWriter::new(std::io::stdout().lock());
    writeln!(out, "id_a,id_b,similarity")?;
    for result in results {
        writeln!(out, "{result}")?;
    }
    out.flush()?;
    Ok(())
}
