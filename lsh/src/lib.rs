//! MinHash signatures and LSH banding over `u64` features.
pub mod banding;
pub mod minhash;

use std::hash::Hash;

use hashbrown::HashSet;
use rand_xoshiro::rand_core::{RngCore, SeedableRng};

/// Generates a hash value.
#[inline(always)]
pub fn hash_u64(x: u64, seed: u64) -> u64 {
    rand_xoshiro::SplitMix64::seed_from_u64(x ^ seed).next_u64()
}

/// Generates a hash value of a byte string, stable across runs and platforms.
pub fn hash_bytes(bytes: &[u8], seed: u64) -> u64 {
    let mut h = hash_u64(bytes.len() as u64, seed);
    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        h = hash_u64(u64::from_le_bytes(word), h);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut word = [0u8; 8];
        word[..rest.len()].copy_from_slice(rest);
        h = hash_u64(u64::from_le_bytes(word), h);
    }
    h
}

/// Computes the Jaccard similarity of two sets.
///
/// Two empty sets are identical, so their similarity is 1.
///
/// # Examples
///
/// ```
/// use lsh::jaccard_similarity;
///
/// let x = vec![1, 2, 4];
/// let y = vec![1, 2, 5, 7];
/// assert_eq!(jaccard_similarity(x, y), 0.4);
/// ```
pub fn jaccard_similarity<I, T>(lhs: I, rhs: I) -> f64
where
    I: IntoIterator<Item = T>,
    T: Hash + Eq,
{
    let a = HashSet::<T>::from_iter(lhs);
    let b = HashSet::<T>::from_iter(rhs);
    let union = a.union(&b).count();
    if union == 0 {
        return 1.;
    }
    (a.intersection(&b).count() as f64) / (union as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bytes_is_stable() {
        assert_eq!(hash_bytes(b"abc", 7), hash_bytes(b"abc", 7));
        assert_ne!(hash_bytes(b"abc", 7), hash_bytes(b"abc", 8));
        assert_ne!(hash_bytes(b"abc", 7), hash_bytes(b"abd", 7));
        // Length is mixed in, so zero padding does not collide.
        assert_ne!(hash_bytes(b"a", 7), hash_bytes(b"a\0", 7));
    }

    #[test]
    fn test_jaccard_similarity() {
        assert_eq!(jaccard_similarity(vec![1, 2], vec![1, 2]), 1.);
        assert_eq!(jaccard_similarity(vec![1, 2], vec![3, 4]), 0.);
        assert_eq!(jaccard_similarity(Vec::<u64>::new(), vec![]), 1.);
    }
}
