//! Banding of MinHash signatures into hash buckets.
use hashbrown::{HashMap, HashSet};

use crate::minhash::Signature;

/// Splits signatures into `num_bands` contiguous bands of `rows_per_band` rows.
///
/// Two signatures collide in a band iff all rows of the band are equal, so for
/// Jaccard similarity `s` the probability of colliding in at least one band is
/// `1 - (1 - s^r)^b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Banding {
    num_bands: usize,
    rows_per_band: usize,
}

impl Banding {
    /// Creates an instance.
    ///
    /// # Panics
    ///
    /// Panics if `num_bands` or `rows_per_band` is zero.
    pub fn new(num_bands: usize, rows_per_band: usize) -> Self {
        assert!(num_bands >= 1);
        assert!(rows_per_band >= 1);
        Self {
            num_bands,
            rows_per_band,
        }
    }

    /// Gets the number of bands.
    pub const fn num_bands(&self) -> usize {
        self.num_bands
    }

    /// Gets the number of rows in a band.
    pub const fn rows_per_band(&self) -> usize {
        self.rows_per_band
    }

    /// Gets the number of signature rows consumed by the bands.
    pub const fn num_rows(&self) -> usize {
        self.num_bands * self.rows_per_band
    }

    /// Creates an iterator of the bucket keys of a signature, one per band.
    ///
    /// Keys of different bands are seeded by the band position, so equal rows in
    /// different bands do not share a key.
    ///
    /// # Panics
    ///
    /// Panics if the signature is shorter than [`Self::num_rows()`].
    pub fn keys<'a>(&self, signature: &'a Signature) -> impl Iterator<Item = u64> + 'a {
        assert!(signature.len() >= self.num_rows());
        signature
            .as_slice()
            .chunks_exact(self.rows_per_band)
            .take(self.num_bands)
            .enumerate()
            .map(|(band, rows)| {
                rows.iter()
                    .fold(band as u64, |acc, &x| crate::hash_u64(x, acc))
            })
    }

    /// Computes the probability that two signatures of Jaccard similarity `s`
    /// collide in at least one band.
    pub fn collision_probability(&self, s: f64) -> f64 {
        let s = s.clamp(0., 1.);
        1. - (1. - s.powi(self.rows_per_band as i32)).powi(self.num_bands as i32)
    }

    /// Estimates the similarity at which the s-curve is steepest, `(1/b)^(1/r)`.
    pub fn threshold_estimate(&self) -> f64 {
        (1. / self.num_bands as f64).powf(1. / self.rows_per_band as f64)
    }
}

/// Bucket tables of a banded index, mapping bucket keys to slot numbers.
#[derive(Clone, Debug)]
pub struct BucketTables {
    banding: Banding,
    tables: Vec<HashMap<u64, Vec<usize>>>,
}

impl BucketTables {
    /// Creates empty tables.
    pub fn new(banding: Banding) -> Self {
        Self {
            banding,
            tables: vec![HashMap::new(); banding.num_bands()],
        }
    }

    /// Gets the banding.
    pub const fn banding(&self) -> Banding {
        self.banding
    }

    /// Appends `slot` under the key of every band of `signature`.
    pub fn insert(&mut self, slot: usize, signature: &Signature) {
        for (table, key) in self.tables.iter_mut().zip(self.banding.keys(signature)) {
            table.entry(key).or_default().push(slot);
        }
    }

    /// Collects the slots sharing a bucket with `signature` in any band.
    pub fn candidates(&self, signature: &Signature, found: &mut HashSet<usize>) {
        for (table, key) in self.tables.iter().zip(self.banding.keys(signature)) {
            if let Some(slots) = table.get(&key) {
                found.extend(slots.iter().copied());
            }
        }
    }

    /// Gets the number of non-empty buckets over all bands.
    pub fn num_buckets(&self) -> usize {
        self.tables.iter().map(|t| t.len()).sum()
    }

    /// Gets the size of the largest bucket.
    pub fn max_bucket_size(&self) -> usize {
        self.tables
            .iter()
            .flat_map(|t| t.values().map(|v| v.len()))
            .max()
            .unwrap_or(0)
    }

    /// Gets the number of slot entries over all buckets.
    pub fn num_entries(&self) -> usize {
        self.tables
            .iter()
            .flat_map(|t| t.values().map(|v| v.len()))
            .sum()
    }

    /// Gets the average bucket size, or 0 if there is no bucket.
    pub fn avg_bucket_size(&self) -> f64 {
        let num_buckets = self.num_buckets();
        if num_buckets == 0 {
            return 0.;
        }
        self.num_entries() as f64 / num_buckets as f64
    }

    /// Gets the approximate memory usage in bytes.
    pub fn memory_in_bytes(&self) -> usize {
        self.tables
            .iter()
            .flat_map(|t| t.values())
            .map(|v| std::mem::size_of::<u64>() + v.capacity() * std::mem::size_of::<usize>())
            .sum()
    }
}
