//! Records, field weights, and comparison results.
use std::fmt;

use crate::errors::{FindNeardupError, Result};

/// Default number of text fields, a name and a description.
pub const DEFAULT_NUM_FIELDS: usize = 2;

/// Immutable record of an id and a small fixed set of text fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Record {
    id: String,
    fields: Box<[String]>,
}

impl Record {
    /// Creates a record.
    ///
    /// # Examples
    ///
    /// ```
    /// use find_neardup::Record;
    ///
    /// let record = Record::new("p1", ["Apple iPhone 14 Pro", "A16 chip"]);
    /// assert_eq!(record.id(), "p1");
    /// assert_eq!(record.field(1), "A16 chip");
    /// assert_eq!(record.field(5), "");
    /// ```
    pub fn new<I, S>(id: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Gets the id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the fields.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Gets the `i`-th field, or an empty string if the record has fewer fields.
    pub fn field(&self, i: usize) -> &str {
        self.fields.get(i).map_or("", String::as_str)
    }
}

/// Normalized field texts of a record, derived once and reused across comparisons.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedRecord {
    fields: Box<[Box<[char]>]>,
}

impl PreparedRecord {
    /// Normalizes the first `num_fields` fields of a record.
    pub fn new(record: &Record, num_fields: usize) -> Self {
        Self {
            fields: (0..num_fields)
                .map(|i| edit_distance::normalize(record.field(i)).into_boxed_slice())
                .collect(),
        }
    }

    /// Gets the number of fields.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Gets the `i`-th normalized field, or an empty slice if out of range.
    pub fn field(&self, i: usize) -> &[char] {
        self.fields.get(i).map_or(&[][..], |f| &f[..])
    }

    /// Checks if every field is empty.
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|f| f.is_empty())
    }

    /// Concatenates the non-empty normalized fields with single spaces.
    pub fn joined_text(&self) -> String {
        let mut text = String::new();
        for field in self.fields.iter().filter(|f| !f.is_empty()) {
            if !text.is_empty() {
                text.push(' ');
            }
            text.extend(field.iter());
        }
        text
    }
}

/// How a field contributes to the combined similarity of a pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum FieldState {
    /// Empty on both sides: no signal.
    BothEmpty,
    /// Empty on exactly one side: no ratio to combine.
    OneSided,
    /// Non-empty on both sides, with its similarity (or an upper bound of it).
    Comparable(f64),
}

impl FieldState {
    pub(crate) fn new(a: &[char], b: &[char], similarity: f64) -> Self {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => Self::BothEmpty,
            (false, false) => Self::Comparable(similarity),
            _ => Self::OneSided,
        }
    }
}

/// Non-negative per-field weights, normalized to sum to 1.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldWeights {
    weights: Box<[f64]>,
}

impl Default for FieldWeights {
    /// Name-heavy weights for a name and a description.
    fn default() -> Self {
        Self {
            weights: Box::new([0.7, 0.3]),
        }
    }
}

impl FieldWeights {
    /// Creates normalized weights. If all weights are zero, uniform weights are used.
    ///
    /// # Errors
    ///
    /// An error is returned if `weights` is empty or has a negative or non-finite value.
    ///
    /// # Examples
    ///
    /// ```
    /// use find_neardup::FieldWeights;
    ///
    /// let w = FieldWeights::new(&[8., 2.]).unwrap();
    /// assert_eq!(w.as_slice(), &[0.8, 0.2]);
    /// let w = FieldWeights::new(&[0., 0.]).unwrap();
    /// assert_eq!(w.as_slice(), &[0.5, 0.5]);
    /// ```
    pub fn new(weights: &[f64]) -> Result<Self> {
        if weights.is_empty() {
            return Err(FindNeardupError::input("At least one field weight is required."));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.) {
            return Err(FindNeardupError::input(format!(
                "Field weights must be finite and non-negative, but got {w}."
            )));
        }
        let total: f64 = weights.iter().sum();
        if total == 0. {
            return Ok(Self::uniform(weights.len()));
        }
        Ok(Self {
            weights: weights.iter().map(|w| w / total).collect(),
        })
    }

    /// Creates uniform weights for `num_fields` fields.
    ///
    /// # Panics
    ///
    /// Panics if `num_fields` is zero.
    pub fn uniform(num_fields: usize) -> Self {
        assert!(num_fields >= 1);
        Self {
            weights: vec![1. / num_fields as f64; num_fields].into_boxed_slice(),
        }
    }

    /// Gets the number of fields.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Always false, since at least one weight exists.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Gets the normalized weights.
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// Combines per-field states into one similarity in `[0,1]`.
    ///
    /// Only fields comparable on both sides are averaged, re-weighted over themselves.
    /// Without any comparable field, the result is 1 if every field is empty on both
    /// sides and 0 otherwise. If all comparable fields have zero weight, they are
    /// averaged uniformly.
    pub(crate) fn combine<I>(&self, states: I) -> f64
    where
        I: IntoIterator<Item = FieldState>,
    {
        let mut weighted = 0.;
        let mut total_weight = 0.;
        let mut plain = 0.;
        let mut num_comparable = 0;
        let mut one_sided = false;
        for (&w, state) in self.weights.iter().zip(states) {
            match state {
                FieldState::Comparable(sim) => {
                    weighted += w * sim;
                    total_weight += w;
                    plain += sim;
                    num_comparable += 1;
                }
                FieldState::OneSided => one_sided = true,
                FieldState::BothEmpty => {}
            }
        }
        if num_comparable == 0 {
            return if one_sided { 0. } else { 1. };
        }
        let combined = if total_weight > 0. {
            weighted / total_weight
        } else {
            plain / num_comparable as f64
        };
        combined.clamp(0., 1.)
    }

    /// Gets the largest distance that field `i` may have while the pair can still
    /// reach `threshold`, assuming every other comparable field is identical.
    ///
    /// Returns `None` if the field alone cannot decide, e.g., it has zero weight.
    pub(crate) fn max_field_distance(
        &self,
        states: &[FieldState],
        i: usize,
        max_len: usize,
        threshold: f64,
    ) -> Option<usize> {
        if threshold <= 0. || threshold > 1. {
            return None;
        }
        let comparable = |s: &FieldState| matches!(s, FieldState::Comparable(_));
        if !comparable(&states[i]) {
            return None;
        }
        let total_weight: f64 = self
            .weights
            .iter()
            .zip(states)
            .filter(|(_, s)| comparable(s))
            .map(|(w, _)| w)
            .sum();
        let (w, total_weight) = if total_weight > 0. {
            (self.weights[i], total_weight)
        } else {
            (1., states.iter().filter(|s| comparable(s)).count() as f64)
        };
        if w == 0. {
            return None;
        }
        // d/L <= W(1-t)/w_i is necessary for the combined similarity to reach t.
        let bound = total_weight * (1. - threshold) * max_len as f64 / w;
        Some((bound + 1e-9).floor() as usize)
    }
}

/// Result of comparing two records.
#[derive(Clone, Debug, PartialEq)]
pub struct ComparisonResult {
    /// Id of the left-side record.
    pub record_a: String,
    /// Id of the right-side record.
    pub record_b: String,
    /// Edit distance of each field.
    pub distances: Vec<usize>,
    /// Similarity of each field in `[0,1]`.
    pub similarities: Vec<f64>,
    /// Weighted similarity of the pair in `[0,1]`.
    pub combined_similarity: f64,
}

impl ComparisonResult {
    /// Gets the order-independent key of the pair.
    pub fn pair_key(&self) -> (&str, &str) {
        pair_key(&self.record_a, &self.record_b)
    }
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{},{},{}",
            self.record_a, self.record_b, self.combined_similarity
        )
    }
}

/// Makes the key `(min(a,b), max(a,b))` identifying an unordered pair of ids.
pub fn pair_key<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Sorts results by combined similarity descending, breaking ties by pair key.
pub fn sort_results(results: &mut [ComparisonResult]) {
    results.sort_by(|x, y| {
        y.combined_similarity
            .total_cmp(&x.combined_similarity)
            .then_with(|| x.pair_key().cmp(&y.pair_key()))
    });
}
