//! MinHash LSH index over records.
use std::fmt;
use std::time::Instant;

use hashbrown::{HashMap, HashSet};
use lsh::banding::BucketTables;
use lsh::minhash::{MinHasher, Signature};
use rayon::prelude::*;

use crate::config::IndexConfig;
use crate::errors::{FindNeardupError, Result};
use crate::feature::{FeatureConfig, FeatureExtractor};
use crate::record::{PreparedRecord, Record};

const NOT_BUILT: &str = "The index is not built yet.";

/// Statistics of a built index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexStats {
    /// Number of indexed records.
    pub record_count: usize,
    /// Number of non-empty buckets over all bands.
    pub bucket_count: usize,
    /// Average number of records in a non-empty bucket.
    pub avg_bucket_size: f64,
    /// Number of records in the largest bucket.
    pub max_bucket_size: usize,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "records={}, buckets={}, avg_bucket_size={:.3}, max_bucket_size={}",
            self.record_count, self.bucket_count, self.avg_bucket_size, self.max_bucket_size
        )
    }
}

/// Index finding candidate near-duplicates by the MinHash of their shingles.
///
/// The text of a record is its normalized non-empty fields joined by spaces. Its
/// shingles are hashed into a MinHash signature, which is split into bands; records
/// sharing a band are candidates of each other. Every non-empty field is also
/// banded in a table of its own, so that two records sharing one similar field
/// become candidates even when the other fields differ or are missing on one side.
///
/// Only the first `num_fields` fields of a record are indexed, the same fields the
/// verifying engine compares.
///
/// The index is built once and is read-only afterwards.
///
/// # Examples
///
/// ```
/// use find_neardup::{IndexConfig, LshIndex, Record};
///
/// let mut index = LshIndex::new(IndexConfig::default().seed(42), 2).unwrap();
/// index
///     .build([
///         Record::new("a", ["Apple iPhone 14 Pro", "A16 chip"]),
///         Record::new("b", ["Apple iPhone 14 Pro", "A16 chip"]),
///         Record::new("c", ["Samsung Galaxy S23", "Snapdragon"]),
///     ])
///     .unwrap();
///
/// let query = Record::new("q", ["apple iphone 14 pro", "a16 chip"]);
/// let candidates = index.query(&query).unwrap();
/// assert!(candidates.contains(&"a"));
/// assert!(candidates.contains(&"b"));
/// ```
pub struct LshIndex {
    config: IndexConfig,
    num_fields: usize,
    feature: FeatureConfig,
    hasher: MinHasher,
    joined_tables: BucketTables,
    field_tables: Vec<BucketTables>,
    records: Vec<Record>,
    signatures: Vec<RecordSignatures>,
    slots: HashMap<String, usize>,
    built: bool,
    shows_progress: bool,
}

/// Signatures of the joined text and of each non-empty field of a record.
struct RecordSignatures {
    joined: Signature,
    fields: Vec<Option<Signature>>,
}

impl RecordSignatures {
    fn memory_in_bytes(&self) -> usize {
        self.joined.memory_in_bytes()
            + self
                .fields
                .iter()
                .flatten()
                .map(Signature::memory_in_bytes)
                .sum::<usize>()
    }
}

impl LshIndex {
    /// Creates an empty index over the first `num_fields` fields of records.
    ///
    /// # Errors
    ///
    /// [`FindNeardupError::Configuration`] is returned if `config` is invalid or
    /// `num_fields` is zero.
    pub fn new(config: IndexConfig, num_fields: usize) -> Result<Self> {
        config.validate()?;
        if num_fields == 0 {
            return Err(FindNeardupError::configuration(
                "The number of indexed fields must not be 0.",
            ));
        }
        let (feature, hash_seed) = config.derive();
        let banding = config.banding();
        Ok(Self {
            config,
            num_fields,
            feature,
            hasher: MinHasher::new(config.get_num_hashes(), hash_seed),
            joined_tables: BucketTables::new(banding),
            field_tables: vec![BucketTables::new(banding); num_fields],
            records: vec![],
            signatures: vec![],
            slots: HashMap::new(),
            built: false,
            shows_progress: false,
        })
    }

    /// Logs the progress of building?
    pub const fn shows_progress(mut self, yes: bool) -> Self {
        self.shows_progress = yes;
        self
    }

    /// Indexes the records. This can be done only once.
    ///
    /// Above the parallel threshold of the configuration, signatures are computed
    /// in parallel.
    ///
    /// # Errors
    ///
    /// * [`FindNeardupError::Precondition`] if the index is already built.
    /// * [`FindNeardupError::Input`] if two records share an id.
    pub fn build<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = Record>,
    {
        if self.built {
            return Err(FindNeardupError::precondition("The index is already built."));
        }
        let start = Instant::now();
        let records: Vec<_> = records.into_iter().collect();
        let mut slots = HashMap::with_capacity(records.len());
        for (slot, record) in records.iter().enumerate() {
            if slots.insert(record.id().to_string(), slot).is_some() {
                return Err(FindNeardupError::input(format!(
                    "Record id {:?} appears more than once.",
                    record.id()
                )));
            }
        }

        let signatures: Vec<_> = if records.len() > self.config.get_parallel_threshold() {
            records
                .par_iter()
                .map_init(
                    || (FeatureExtractor::new(self.feature), vec![]),
                    |(extractor, feature), record| {
                        self.signatures_with(record, extractor, feature)
                    },
                )
                .collect()
        } else {
            let mut extractor = FeatureExtractor::new(self.feature);
            let mut feature = vec![];
            records
                .iter()
                .map(|record| self.signatures_with(record, &mut extractor, &mut feature))
                .collect()
        };

        for (slot, signatures) in signatures.iter().enumerate() {
            if self.shows_progress && (slot + 1) % 10000 == 0 {
                tracing::info!("Indexed {} records...", slot + 1);
            }
            self.joined_tables.insert(slot, &signatures.joined);
            for (tables, signature) in self.field_tables.iter_mut().zip(&signatures.fields) {
                if let Some(signature) = signature {
                    tables.insert(slot, signature);
                }
            }
        }
        self.records = records;
        self.signatures = signatures;
        self.slots = slots;
        self.built = true;

        if let Ok(stats) = self.stats() {
            tracing::debug!(
                %stats,
                elapsed_sec = start.elapsed().as_secs_f64(),
                "index built"
            );
        }
        Ok(())
    }

    /// Finds the ids of the candidate near-duplicates of a record.
    ///
    /// The ids are in indexing order. If the record itself is indexed, its own
    /// id is among them.
    ///
    /// # Errors
    ///
    /// [`FindNeardupError::Precondition`] is returned if the index is not built.
    pub fn query(&self, record: &Record) -> Result<Vec<&str>> {
        Ok(self
            .query_slots(record)?
            .into_iter()
            .map(|slot| self.records[slot].id())
            .collect())
    }

    /// Finds the slots of the candidates of a record, in ascending order.
    pub(crate) fn query_slots(&self, record: &Record) -> Result<Vec<usize>> {
        if !self.built {
            return Err(FindNeardupError::precondition(NOT_BUILT));
        }
        let mut found = HashSet::new();
        match self.indexed_slot(record) {
            Some(slot) => self.collect_candidates(&self.signatures[slot], &mut found),
            None => {
                let mut extractor = FeatureExtractor::new(self.feature);
                let signatures = self.signatures_with(record, &mut extractor, &mut vec![]);
                self.collect_candidates(&signatures, &mut found);
            }
        }
        let mut slots: Vec<_> = found.into_iter().collect();
        slots.sort_unstable();
        Ok(slots)
    }

    /// Finds the slots of the candidates of the record in `slot`.
    pub(crate) fn candidates_of_slot(&self, slot: usize, found: &mut HashSet<usize>) {
        self.collect_candidates(&self.signatures[slot], found);
    }

    fn collect_candidates(&self, signatures: &RecordSignatures, found: &mut HashSet<usize>) {
        self.joined_tables.candidates(&signatures.joined, found);
        for (tables, signature) in self.field_tables.iter().zip(&signatures.fields) {
            if let Some(signature) = signature {
                tables.candidates(signature, found);
            }
        }
    }

    /// Gets the slot of an indexed record identical to `record`.
    fn indexed_slot(&self, record: &Record) -> Option<usize> {
        self.slots
            .get(record.id())
            .copied()
            .filter(|&slot| &self.records[slot] == record)
    }

    /// Gets the slot of the record with `id`.
    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Gets the record in `slot`.
    pub fn record(&self, slot: usize) -> Option<&Record> {
        self.records.get(slot)
    }

    /// Gets the indexed records in slot order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Checks if the index is built.
    pub const fn is_built(&self) -> bool {
        self.built
    }

    fn tables(&self) -> impl Iterator<Item = &BucketTables> {
        std::iter::once(&self.joined_tables).chain(&self.field_tables)
    }

    /// Gets the statistics of the index, summed over the joined-text and
    /// per-field tables.
    ///
    /// # Errors
    ///
    /// [`FindNeardupError::Precondition`] is returned if the index is not built.
    pub fn stats(&self) -> Result<IndexStats> {
        if !self.built {
            return Err(FindNeardupError::precondition(NOT_BUILT));
        }
        let bucket_count: usize = self.tables().map(BucketTables::num_buckets).sum();
        let num_entries: usize = self.tables().map(BucketTables::num_entries).sum();
        Ok(IndexStats {
            record_count: self.records.len(),
            bucket_count,
            avg_bucket_size: if bucket_count == 0 {
                0.
            } else {
                num_entries as f64 / bucket_count as f64
            },
            max_bucket_size: self
                .tables()
                .map(BucketTables::max_bucket_size)
                .max()
                .unwrap_or(0),
        })
    }

    /// Computes the MinHash signature of the joined text of a record.
    pub fn signature(&self, record: &Record) -> Signature {
        let text = PreparedRecord::new(record, self.num_fields).joined_text();
        let mut extractor = FeatureExtractor::new(self.feature);
        self.text_signature(&text, &mut extractor, &mut vec![])
    }

    fn signatures_with(
        &self,
        record: &Record,
        extractor: &mut FeatureExtractor,
        feature: &mut Vec<u64>,
    ) -> RecordSignatures {
        let prepared = PreparedRecord::new(record, self.num_fields);
        let joined = self.text_signature(&prepared.joined_text(), extractor, feature);
        let fields = (0..self.num_fields)
            .map(|i| {
                let field = prepared.field(i);
                if field.is_empty() {
                    return None;
                }
                let text: String = field.iter().collect();
                Some(self.text_signature(&text, extractor, feature))
            })
            .collect();
        RecordSignatures { joined, fields }
    }

    fn text_signature(
        &self,
        text: &str,
        extractor: &mut FeatureExtractor,
        feature: &mut Vec<u64>,
    ) -> Signature {
        extractor.extract(text, feature);
        self.hasher.signature(feature)
    }

    /// Gets the probability that two texts of Jaccard similarity `s` become
    /// candidates through one table, i.e., `1 - (1 - s^r)^b`.
    pub fn collision_probability(&self, s: f64) -> f64 {
        self.joined_tables.banding().collision_probability(s)
    }

    /// Gets the Jaccard similarity at the steepest point of the collision curve,
    /// approximately `(1/b)^(1/r)`.
    pub fn threshold_estimate(&self) -> f64 {
        self.joined_tables.banding().threshold_estimate()
    }

    /// Gets the configuration.
    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Gets the number of indexed fields.
    pub const fn num_fields(&self) -> usize {
        self.num_fields
    }

    /// Gets the number of indexed records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Checks if no record is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the approximate memory usage of the signatures and buckets in bytes.
    pub fn memory_in_bytes(&self) -> usize {
        self.signatures
            .iter()
            .map(RecordSignatures::memory_in_bytes)
            .sum::<usize>()
            + self.tables().map(BucketTables::memory_in_bytes).sum::<usize>()
    }
}
