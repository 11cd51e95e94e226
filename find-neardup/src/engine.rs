//! Exact comparison of records by edit distance.
use std::time::Instant;

use edit_distance::{KernelKind, Levenshtein};

use crate::config::DEFAULT_PARALLEL_THRESHOLD;
use crate::filter::{CharBagFilter, LengthFilter, PreFilter};
use crate::record::{
    sort_results, ComparisonResult, FieldState, FieldWeights, PreparedRecord, Record,
};
use crate::scheduler::WorkerPlan;

/// Engine comparing records field by field with the Levenshtein distance.
///
/// # Examples
///
/// ```
/// use find_neardup::{EditDistanceEngine, Record};
///
/// let engine = EditDistanceEngine::default();
/// let a = Record::new("a", ["Apple iPhone 14 Pro", "A16 chip"]);
/// let b = Record::new("b", ["Apple iPhone 14 Pro", "A16 chip"]);
/// let result = engine.compare(&a, &b);
/// assert_eq!(result.combined_similarity, 1.0);
/// ```
pub struct EditDistanceEngine {
    weights: FieldWeights,
    levenshtein: Levenshtein,
    filters: Vec<Box<dyn PreFilter>>,
    parallel_threshold: usize,
    shows_progress: bool,
}

impl Default for EditDistanceEngine {
    fn default() -> Self {
        Self::new(FieldWeights::default())
    }
}

impl EditDistanceEngine {
    /// Creates an engine for records with `weights.len()` fields.
    ///
    /// The distance kernel is chosen by probing the running CPU.
    pub fn new(weights: FieldWeights) -> Self {
        let levenshtein = Levenshtein::new();
        tracing::debug!(kernel = levenshtein.kernel_name(), "selected edit distance kernel");
        Self {
            weights,
            levenshtein,
            filters: vec![],
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            shows_progress: false,
        }
    }

    /// Uses a specific distance kernel.
    pub fn kernel(mut self, kind: KernelKind) -> Self {
        self.levenshtein = Levenshtein::with_kernel(kind);
        self
    }

    /// Appends a pre-filter run in front of threshold comparisons.
    ///
    /// The filter is called with the engine's weights.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: PreFilter + 'static,
    {
        self.filters.push(Box::new(filter));
        self
    }

    /// Appends the built-in [`LengthFilter`] and [`CharBagFilter`].
    pub fn default_filters(self) -> Self {
        self.filter(LengthFilter).filter(CharBagFilter)
    }

    /// Sets the number of records above which [`Self::find_duplicates()`] runs in parallel.
    pub const fn parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }

    /// Logs the progress of long-running searches?
    pub const fn shows_progress(mut self, yes: bool) -> Self {
        self.shows_progress = yes;
        self
    }

    /// Gets the field weights.
    pub const fn weights(&self) -> &FieldWeights {
        &self.weights
    }

    /// Gets the number of fields compared.
    pub fn num_fields(&self) -> usize {
        self.weights.len()
    }

    /// Gets the underlying Levenshtein calculator.
    pub const fn levenshtein(&self) -> &Levenshtein {
        &self.levenshtein
    }

    /// Computes the edit distance between two texts after normalization.
    pub fn distance(&self, a: &str, b: &str) -> usize {
        self.levenshtein
            .distance(&edit_distance::normalize(a), &edit_distance::normalize(b))
    }

    /// Converts the distance between two texts into a similarity in `[0,1]`.
    pub fn similarity(&self, a: &str, b: &str, distance: usize) -> f64 {
        let len_a = edit_distance::normalize(a).len();
        let len_b = edit_distance::normalize(b).len();
        edit_distance::similarity(len_a, len_b, distance)
    }

    /// Normalizes the fields of a record.
    pub fn prepare(&self, record: &Record) -> PreparedRecord {
        PreparedRecord::new(record, self.num_fields())
    }

    /// Compares two records with the engine's weights.
    pub fn compare(&self, a: &Record, b: &Record) -> ComparisonResult {
        self.compare_with_weights(a, b, &self.weights)
    }

    /// Compares two records with the given weights.
    ///
    /// Records are compared on as many fields as `weights` has.
    pub fn compare_with_weights(
        &self,
        a: &Record,
        b: &Record,
        weights: &FieldWeights,
    ) -> ComparisonResult {
        let pa = PreparedRecord::new(a, weights.len());
        let pb = PreparedRecord::new(b, weights.len());
        self.compare_prepared((a.id(), &pa), (b.id(), &pb), weights)
    }

    /// Compares two records, returning `None` if their combined similarity is below
    /// `threshold`.
    ///
    /// Pairs are first screened by the pre-filters and by per-field distance bounds,
    /// neither of which discards a pair reaching the threshold.
    pub fn compare_if_similar(
        &self,
        a: &Record,
        b: &Record,
        threshold: f64,
    ) -> Option<ComparisonResult> {
        let (pa, pb) = (self.prepare(a), self.prepare(b));
        self.verify((a.id(), &pa), (b.id(), &pb), threshold)
    }

    pub(crate) fn compare_prepared(
        &self,
        a: (&str, &PreparedRecord),
        b: (&str, &PreparedRecord),
        weights: &FieldWeights,
    ) -> ComparisonResult {
        let distances = (0..weights.len())
            .map(|i| self.levenshtein.distance(a.1.field(i), b.1.field(i)))
            .collect();
        Self::assemble(a, b, distances, weights)
    }

    /// Compares prepared records with the engine's weights if they may reach `threshold`.
    pub(crate) fn verify(
        &self,
        a: (&str, &PreparedRecord),
        b: (&str, &PreparedRecord),
        threshold: f64,
    ) -> Option<ComparisonResult> {
        if threshold > 1. {
            return None;
        }
        if !self
            .filters
            .iter()
            .all(|f| f.quick_reject(a.1, b.1, &self.weights, threshold))
        {
            return None;
        }
        let distances = self.bounded_distances(a.1, b.1, threshold)?;
        let result = Self::assemble(a, b, distances, &self.weights);
        (result.combined_similarity >= threshold).then_some(result)
    }

    /// Computes the field distances, giving up as soon as a field exceeds the largest
    /// distance that still allows the pair to reach `threshold`.
    fn bounded_distances(
        &self,
        a: &PreparedRecord,
        b: &PreparedRecord,
        threshold: f64,
    ) -> Option<Vec<usize>> {
        let num_fields = self.num_fields();
        // Optimistic states: every comparable field treated as identical.
        let states: Vec<_> = (0..num_fields)
            .map(|i| FieldState::new(a.field(i), b.field(i), 1.))
            .collect();
        let mut distances = Vec::with_capacity(num_fields);
        for i in 0..num_fields {
            let (x, y) = (a.field(i), b.field(i));
            let max_len = x.len().max(y.len());
            let bound = self
                .weights
                .max_field_distance(&states, i, max_len, threshold);
            let dist = self.levenshtein.distance_bounded(x, y, bound);
            if bound.map_or(false, |bound| dist > bound) {
                return None;
            }
            distances.push(dist);
        }
        Some(distances)
    }

    fn assemble(
        (id_a, a): (&str, &PreparedRecord),
        (id_b, b): (&str, &PreparedRecord),
        distances: Vec<usize>,
        weights: &FieldWeights,
    ) -> ComparisonResult {
        let mut similarities = Vec::with_capacity(distances.len());
        let mut states = Vec::with_capacity(distances.len());
        for (i, &dist) in distances.iter().enumerate() {
            let (x, y) = (a.field(i), b.field(i));
            let sim = edit_distance::similarity(x.len(), y.len(), dist);
            similarities.push(sim);
            states.push(FieldState::new(x, y, sim));
        }
        ComparisonResult {
            record_a: id_a.to_string(),
            record_b: id_b.to_string(),
            distances,
            similarities,
            combined_similarity: weights.combine(states),
        }
    }

    /// Finds all unordered pairs whose combined similarity is at least `threshold`,
    /// sorted by similarity descending.
    ///
    /// Every pair is compared, making `n(n-1)/2` comparisons. Above the parallel
    /// threshold the pairs are spread over a pool of workers sized for the batch.
    /// The threshold is not clamped: a value above 1 yields nothing and a value
    /// of at most 0 yields every pair.
    pub fn find_duplicates(&self, records: &[Record], threshold: f64) -> Vec<ComparisonResult> {
        let start = Instant::now();
        let prepared: Vec<_> = records.iter().map(|r| self.prepare(r)).collect();
        let n = records.len();
        let pairs = (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j)));
        let verify = |(i, j): (usize, usize)| {
            self.verify(
                (records[i].id(), &prepared[i]),
                (records[j].id(), &prepared[j]),
                threshold,
            )
        };

        let mut results = if n > self.parallel_threshold {
            let plan = WorkerPlan::for_batch(n);
            if self.shows_progress {
                tracing::info!(
                    records = n,
                    workers = plan.workers(),
                    "comparing all pairs in parallel"
                );
            }
            plan.run(pairs, verify)
        } else {
            pairs.filter_map(verify).collect()
        };
        sort_results(&mut results);
        tracing::debug!(
            records = n,
            matched = results.len(),
            elapsed_sec = start.elapsed().as_secs_f64(),
            "brute-force search done"
        );
        results
    }
}
