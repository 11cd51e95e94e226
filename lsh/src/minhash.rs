//! MinHash for the Jaccard similarity.
use rand_xoshiro::rand_core::{RngCore, SeedableRng};

/// [MinHash](https://doi.org/10.1109/SEQUEN.1997.666900) with a fixed number of
/// independently seeded hash functions.
///
/// The `i`-th value of a signature is the minimum of the `i`-th hash function over
/// all input features, so the probability that two signatures agree at a position
/// equals the Jaccard similarity of the underlying feature sets.
#[derive(Clone, Debug)]
pub struct MinHasher {
    seeds: Vec<u64>,
}

impl MinHasher {
    /// Creates an instance with `num_hashes` hash functions derived from `seed`.
    pub fn new(num_hashes: usize, seed: u64) -> Self {
        let mut seeder = rand_xoshiro::SplitMix64::seed_from_u64(seed);
        let seeds = (0..num_hashes).map(|_| seeder.next_u64()).collect();
        Self { seeds }
    }

    /// Gets the number of hash functions, i.e., the signature length.
    pub fn num_hashes(&self) -> usize {
        self.seeds.len()
    }

    /// Creates an iterator to generate the minimum hash of each function in turn.
    pub fn iter<'a>(&'a self, feats: &'a [u64]) -> MinHashIter<'a> {
        MinHashIter {
            feats,
            seeds: self.seeds.iter(),
        }
    }

    /// Computes the signature of a feature set.
    ///
    /// An empty feature set yields `u64::MAX` at every position.
    pub fn signature(&self, feats: &[u64]) -> Signature {
        Signature(self.iter(feats).collect())
    }
}

/// Iterator to generate the minimum hash values of [`MinHasher`].
pub struct MinHashIter<'a> {
    feats: &'a [u64],
    seeds: std::slice::Iter<'a, u64>,
}

impl<'a> Iterator for MinHashIter<'a> {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        let &seed = self.seeds.next()?;
        Some(
            self.feats
                .iter()
                .map(|&i| crate::hash_u64(i, seed))
                .min()
                .unwrap_or(u64::MAX),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.seeds.size_hint()
    }
}

impl<'a> ExactSizeIterator for MinHashIter<'a> {}

/// Fixed-length MinHash signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature(Box<[u64]>);

impl Signature {
    /// Gets the signature values.
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// Gets the signature length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if the signature has no values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Estimates the Jaccard similarity as the fraction of equal positions.
    ///
    /// Signatures of different lengths are compared on their common prefix.
    pub fn estimate_jaccard(&self, other: &Self) -> f64 {
        let len = self.len().min(other.len());
        if len == 0 {
            return 0.;
        }
        let equal = self
            .0
            .iter()
            .zip(other.0.iter())
            .filter(|(a, b)| a == b)
            .count();
        equal as f64 / len as f64
    }

    /// Gets the memory usage in bytes.
    pub fn memory_in_bytes(&self) -> usize {
        self.len() * std::mem::size_of::<u64>()
    }
}

impl From<Vec<u64>> for Signature {
    fn from(values: Vec<u64>) -> Self {
        Self(values.into_boxed_slice())
    }
}
