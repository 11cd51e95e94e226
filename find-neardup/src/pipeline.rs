//! Two-stage search: LSH candidates verified by exact edit distance.
use std::time::Instant;

use hashbrown::HashSet;
use rayon::prelude::*;

use crate::cache::DerivedCache;
use crate::config::IndexConfig;
use crate::engine::EditDistanceEngine;
use crate::errors::{FindNeardupError, Result};
use crate::index::{IndexStats, LshIndex};
use crate::record::{pair_key, sort_results, ComparisonResult, FieldWeights, Record};
use crate::scheduler::WorkerPlan;

const NOT_BUILT: &str = "build_index must be called before searching.";

/// Near-duplicate search over an indexed corpus.
///
/// The [`LshIndex`] over-approximates the near-duplicates of a record with a small
/// candidate set, and the [`EditDistanceEngine`] keeps the candidates whose exact
/// combined similarity reaches the threshold. Normalized fields of the corpus are
/// derived on first use and kept in a side table.
///
/// # Examples
///
/// ```
/// use find_neardup::{HybridPipeline, IndexConfig, Record};
///
/// let mut pipeline = HybridPipeline::new(IndexConfig::default().seed(42)).unwrap();
/// pipeline
///     .build_index([
///         Record::new("1", ["Apple iPhone 14 Pro", "A16 chip"]),
///         Record::new("2", ["Apple iPhone 14 Pro", "A16 chip"]),
///         Record::new("3", ["Samsung Galaxy S23", "Snapdragon"]),
///     ])
///     .unwrap();
///
/// let results = pipeline.find_all_duplicates(0.8).unwrap();
/// assert_eq!(results.len(), 1);
/// assert_eq!(results[0].pair_key(), ("1", "2"));
/// assert_eq!(results[0].combined_similarity, 1.0);
/// ```
pub struct HybridPipeline {
    index: LshIndex,
    engine: EditDistanceEngine,
    cache: Option<DerivedCache>,
    shows_progress: bool,
}

impl HybridPipeline {
    /// Creates a pipeline with the default engine and its pre-filters.
    ///
    /// # Errors
    ///
    /// [`FindNeardupError::Configuration`] is returned if `config` is invalid.
    pub fn new(config: IndexConfig) -> Result<Self> {
        let engine = EditDistanceEngine::default()
            .default_filters()
            .parallel_threshold(config.get_parallel_threshold());
        Ok(Self {
            index: LshIndex::new(config, engine.num_fields())?,
            engine,
            cache: None,
            shows_progress: false,
        })
    }

    /// Replaces the verifying engine. The index is set up for the fields the new
    /// engine compares.
    ///
    /// # Errors
    ///
    /// [`FindNeardupError::Precondition`] is returned if the index is already built.
    pub fn with_engine(mut self, engine: EditDistanceEngine) -> Result<Self> {
        if self.index.is_built() {
            return Err(FindNeardupError::precondition(
                "The engine cannot be replaced after build_index.",
            ));
        }
        self.index = LshIndex::new(*self.index.config(), engine.num_fields())?
            .shows_progress(self.shows_progress);
        self.engine = engine;
        Ok(self)
    }

    /// Logs the progress of building and searching?
    pub fn shows_progress(mut self, yes: bool) -> Self {
        self.index = self.index.shows_progress(yes);
        self.engine = self.engine.shows_progress(yes);
        self.shows_progress = yes;
        self
    }

    /// Indexes the corpus. This can be done only once.
    ///
    /// # Errors
    ///
    /// * [`FindNeardupError::Precondition`] if the index is already built.
    /// * [`FindNeardupError::Input`] if two records share an id.
    pub fn build_index<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = Record>,
    {
        self.index.build(records)?;
        self.cache = Some(DerivedCache::new(self.index.len(), self.engine.num_fields()));
        if self.shows_progress {
            tracing::info!(records = self.index.len(), "index built");
        }
        Ok(())
    }

    fn cache(&self) -> Result<&DerivedCache> {
        self.cache
            .as_ref()
            .ok_or(FindNeardupError::precondition(NOT_BUILT))
    }

    /// Finds the indexed records similar to `record`, sorted by similarity descending.
    ///
    /// An indexed record with the same id as `record` is not reported. The threshold
    /// is not clamped: a value above 1 yields nothing and a value of at most 0
    /// yields every candidate.
    ///
    /// # Errors
    ///
    /// [`FindNeardupError::Precondition`] is returned if the index is not built.
    pub fn find_duplicates_for_one(
        &self,
        record: &Record,
        threshold: f64,
    ) -> Result<Vec<ComparisonResult>> {
        let cache = self.cache()?;
        let query = self.engine.prepare(record);
        let mut results: Vec<_> = self
            .index
            .query_slots(record)?
            .into_iter()
            .filter_map(|slot| {
                let candidate = &self.index.records()[slot];
                if candidate.id() == record.id() {
                    return None;
                }
                self.engine.verify(
                    (record.id(), &query),
                    (candidate.id(), cache.get_or_prepare(slot, candidate)),
                    threshold,
                )
            })
            .collect();
        sort_results(&mut results);
        Ok(results)
    }

    /// Finds the pairs of a query record and an indexed record whose combined
    /// similarity is at least `threshold`, sorted by similarity descending.
    ///
    /// Each unordered pair of ids is verified and reported once, even if both
    /// records are queries. Pairs of a record with itself (by id) are skipped.
    ///
    /// # Errors
    ///
    /// [`FindNeardupError::Precondition`] is returned if the index is not built.
    pub fn find_duplicates(
        &self,
        records: &[Record],
        threshold: f64,
    ) -> Result<Vec<ComparisonResult>> {
        let start = Instant::now();
        let cache = self.cache()?;
        let candidates: Vec<Vec<usize>> =
            if records.len() > self.index.config().get_parallel_threshold() {
                records
                    .par_iter()
                    .map(|r| self.index.query_slots(r))
                    .collect::<Result<_>>()?
            } else {
                records
                    .iter()
                    .map(|r| self.index.query_slots(r))
                    .collect::<Result<_>>()?
            };
        let queries: Vec<_> = records.iter().map(|r| self.engine.prepare(r)).collect();
        if self.shows_progress {
            tracing::info!(
                queries = records.len(),
                candidates = candidates.iter().map(Vec::len).sum::<usize>(),
                "candidates generated"
            );
        }

        let corpus = self.index.records();
        let mut seen = HashSet::new();
        let jobs = candidates
            .iter()
            .enumerate()
            .flat_map(|(i, slots)| slots.iter().map(move |&slot| (i, slot)))
            .filter(move |&(i, slot)| {
                let (a, b) = (records[i].id(), corpus[slot].id());
                a != b && seen.insert(pair_key(a, b))
            });
        let mut results = WorkerPlan::for_batch(records.len()).run(jobs, |(i, slot)| {
            self.engine.verify(
                (records[i].id(), &queries[i]),
                (corpus[slot].id(), cache.get_or_prepare(slot, &corpus[slot])),
                threshold,
            )
        });
        sort_results(&mut results);
        tracing::debug!(
            queries = records.len(),
            matched = results.len(),
            elapsed_sec = start.elapsed().as_secs_f64(),
            "hybrid search done"
        );
        Ok(results)
    }

    /// Finds all pairs of indexed records whose combined similarity is at least
    /// `threshold`, sorted by similarity descending.
    ///
    /// # Errors
    ///
    /// [`FindNeardupError::Precondition`] is returned if the index is not built.
    pub fn find_all_duplicates(&self, threshold: f64) -> Result<Vec<ComparisonResult>> {
        let start = Instant::now();
        let cache = self.cache()?;
        let corpus = self.index.records();

        // Bucket sharing is symmetric, so each pair is produced from its smaller slot.
        let jobs = (0..corpus.len()).flat_map(|i| {
            let mut found = HashSet::new();
            self.index.candidates_of_slot(i, &mut found);
            let mut slots: Vec<_> = found.into_iter().filter(|&j| j > i).collect();
            slots.sort_unstable();
            slots.into_iter().map(move |j| (i, j))
        });
        let mut results = WorkerPlan::for_batch(corpus.len()).run(jobs, |(i, j)| {
            self.engine.verify(
                (corpus[i].id(), cache.get_or_prepare(i, &corpus[i])),
                (corpus[j].id(), cache.get_or_prepare(j, &corpus[j])),
                threshold,
            )
        });
        sort_results(&mut results);
        tracing::debug!(
            records = corpus.len(),
            matched = results.len(),
            prepared = cache.num_filled(),
            elapsed_sec = start.elapsed().as_secs_f64(),
            "hybrid search over the corpus done"
        );
        Ok(results)
    }

    /// Gets the statistics of the index.
    ///
    /// # Errors
    ///
    /// [`FindNeardupError::Precondition`] is returned if the index is not built.
    pub fn index_stats(&self) -> Result<IndexStats> {
        self.index.stats()
    }

    /// Compares two records exactly with the engine's weights.
    pub fn compare(&self, a: &Record, b: &Record) -> ComparisonResult {
        self.engine.compare(a, b)
    }

    /// Compares two records exactly with the given weights.
    pub fn compare_with_weights(
        &self,
        a: &Record,
        b: &Record,
        weights: &FieldWeights,
    ) -> ComparisonResult {
        self.engine.compare_with_weights(a, b, weights)
    }

    /// Gets the verifying engine.
    pub const fn engine(&self) -> &EditDistanceEngine {
        &self.engine
    }

    /// Gets the index.
    pub const fn index(&self) -> &LshIndex {
        &self.index
    }

    /// Gets the number of indexed records.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Checks if no record is indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Vec<Record> {
        vec![
            Record::new("1", ["Apple iPhone 14 Pro", "A16 chip"]),
            Record::new("2", ["Apple iPhone 14 Pro", "A16 chip"]),
            Record::new("3", ["Samsung Galaxy S23", "Snapdragon"]),
        ]
    }

    fn built(records: Vec<Record>) -> HybridPipeline {
        let mut pipeline = HybridPipeline::new(IndexConfig::default().seed(11)).unwrap();
        pipeline.build_index(records).unwrap();
        pipeline
    }

    #[test]
    fn test_scenario() {
        let pipeline = built(scenario());
        let results = pipeline.find_duplicates(&scenario(), 0.8).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].pair_key(), ("1", "2"));
        assert_eq!(results[0].combined_similarity, 1.);
        assert_eq!(pipeline.find_all_duplicates(0.8).unwrap(), results);
    }

    #[test]
    fn test_for_one_skips_itself() {
        let pipeline = built(scenario());
        let results = pipeline.find_duplicates_for_one(&scenario()[0], 0.8).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record_a, "1");
        assert_eq!(results[0].record_b, "2");
    }

    #[test]
    fn test_unknown_query() {
        let pipeline = built(scenario());
        let query = Record::new("q", ["apple iphone 14 pro ", "A16 Chip"]);
        let results = pipeline.find_duplicates_for_one(&query, 0.9).unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.record_b.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_not_built() {
        let pipeline = HybridPipeline::new(IndexConfig::default()).unwrap();
        let record = &scenario()[0];
        for err in [
            pipeline.find_duplicates_for_one(record, 0.8).unwrap_err(),
            pipeline.find_duplicates(&scenario(), 0.8).unwrap_err(),
            pipeline.find_all_duplicates(0.8).unwrap_err(),
            pipeline.index_stats().unwrap_err(),
        ] {
            assert!(matches!(err, FindNeardupError::Precondition(_)));
        }
    }

    #[test]
    fn test_build_twice() {
        let mut pipeline = built(scenario());
        let err = pipeline.build_index(scenario()).unwrap_err();
        assert!(matches!(err, FindNeardupError::Precondition(_)));
        assert_eq!(pipeline.len(), 3);
    }

    #[test]
    fn test_engine_after_build() {
        let pipeline = built(scenario());
        let engine = EditDistanceEngine::new(FieldWeights::new(&[1., 1., 1.]).unwrap());
        let err = pipeline.with_engine(engine).err().unwrap();
        assert!(matches!(err, FindNeardupError::Precondition(_)));
    }

    #[test]
    fn test_engine_fields_reach_index() {
        let engine = EditDistanceEngine::new(FieldWeights::new(&[1., 1., 1.]).unwrap());
        let mut pipeline = HybridPipeline::new(IndexConfig::default().seed(13))
            .unwrap()
            .with_engine(engine)
            .unwrap();
        assert_eq!(pipeline.index().num_fields(), 3);
        pipeline
            .build_index([
                Record::new("a", ["Kindle", "E-reader", "Black"]),
                Record::new("b", ["Kindle", "E-reader", "White"]),
                Record::new("c", ["Kindle", "E-reader", "Black"]),
            ])
            .unwrap();
        let query = Record::new("q", ["Kindle", "E-reader", "Black"]);
        let results = pipeline.find_duplicates_for_one(&query, 0.9).unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.record_b.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        for result in &results {
            assert_eq!(result.similarities, vec![1., 1., 1.]);
        }
    }

    #[test]
    fn test_threshold_above_one() {
        let pipeline = built(scenario());
        assert!(pipeline.find_duplicates(&scenario(), 1.01).unwrap().is_empty());
        assert!(pipeline.find_all_duplicates(1.01).unwrap().is_empty());
    }

    #[test]
    fn test_stats_and_delegates() {
        let pipeline = built(scenario());
        assert_eq!(pipeline.index_stats().unwrap().record_count, 3);
        let records = scenario();
        assert_eq!(
            pipeline.compare(&records[0], &records[1]),
            pipeline.engine().compare(&records[0], &records[1])
        );
        let weights = FieldWeights::new(&[1., 0.]).unwrap();
        assert_eq!(
            pipeline
                .compare_with_weights(&records[0], &records[2], &weights)
                .combined_similarity,
            pipeline.compare(&records[0], &records[2]).similarities[0]
        );
    }
}
