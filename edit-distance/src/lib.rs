//! Levenshtein distance over normalized code points.
//!
//! The distance is computed by interchangeable [`kernel::Kernel`]s drawing their
//! scratch rows from a [`pool::BufferPool`]. [`Levenshtein`] bundles a kernel chosen
//! by a capability probe with a pool owned by the instance.
#![deny(missing_docs)]

pub mod kernel;
pub mod pool;

pub use kernel::{Kernel, KernelKind};
pub use pool::BufferPool;

/// Normalizes a text for comparison by trimming and lowercasing it.
///
/// # Examples
///
/// ```
/// use edit_distance::normalize;
///
/// assert_eq!(normalize("  ApPle "), vec!['a', 'p', 'p', 'l', 'e']);
/// ```
pub fn normalize(text: &str) -> Vec<char> {
    text.trim().chars().flat_map(char::to_lowercase).collect()
}

/// Converts a distance into a similarity in `[0,1]`, i.e., `1 - dist/max(|a|,|b|)`.
///
/// Two empty inputs are identical and have similarity 1.
///
/// # Examples
///
/// ```
/// use edit_distance::similarity;
///
/// assert_eq!(similarity(5, 4, 1), 0.8);
/// assert_eq!(similarity(0, 0, 0), 1.0);
/// ```
pub fn similarity(len_a: usize, len_b: usize, distance: usize) -> f64 {
    let max_len = len_a.max(len_b);
    if max_len == 0 {
        return 1.;
    }
    (1. - distance as f64 / max_len as f64).clamp(0., 1.)
}

/// Computes the edit distance between two texts after normalization.
///
/// # Examples
///
/// ```
/// assert_eq!(edit_distance::distance("kitten", "sitting"), 3);
/// assert_eq!(edit_distance::distance("APPLE", "appl "), 1);
/// ```
pub fn distance(a: &str, b: &str) -> usize {
    Levenshtein::new().distance(&normalize(a), &normalize(b))
}

/// Levenshtein calculator owning its kernel choice and scratch-row pool.
///
/// An instance can be shared by many threads.
pub struct Levenshtein {
    kernel: &'static dyn Kernel,
    pool: BufferPool,
}

impl Default for Levenshtein {
    fn default() -> Self {
        Self::new()
    }
}

impl Levenshtein {
    /// Creates an instance with the kernel picked by [`KernelKind::detect()`].
    pub fn new() -> Self {
        Self::with_kernel(KernelKind::detect())
    }

    /// Creates an instance with a specific kernel.
    pub fn with_kernel(kind: KernelKind) -> Self {
        Self {
            kernel: kind.kernel(),
            pool: BufferPool::new(),
        }
    }

    /// Gets the name of the kernel in use.
    pub fn kernel_name(&self) -> &'static str {
        self.kernel.name()
    }

    /// Gets the scratch-row pool.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Computes the edit distance between two normalized sequences.
    pub fn distance(&self, a: &[char], b: &[char]) -> usize {
        let (a, b) = strip_common_affixes(a, b);
        self.kernel.distance(a, b, &self.pool)
    }

    /// Computes the edit distance, or returns the length difference without running
    /// the kernel when that difference alone exceeds `max_distance`.
    ///
    /// The result is exact whenever it is at most `max_distance`.
    pub fn distance_bounded(&self, a: &[char], b: &[char], max_distance: Option<usize>) -> usize {
        if let Some(max_distance) = max_distance {
            let diff = a.len().abs_diff(b.len());
            if diff > max_distance {
                return diff;
            }
        }
        self.distance(a, b)
    }
}

fn strip_common_affixes<'a>(a: &'a [char], b: &'a [char]) -> (&'a [char], &'a [char]) {
    let prefix = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
    let (a, b) = (&a[prefix..], &b[prefix..]);
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    (&a[..a.len() - suffix], &b[..b.len() - suffix])
}
