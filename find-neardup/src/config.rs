//! Parameters of the LSH index.
use lsh::banding::Banding;
use rand::{RngCore, SeedableRng};

use crate::errors::{FindNeardupError, Result};
use crate::feature::FeatureConfig;

/// Default number of MinHash functions.
pub const DEFAULT_NUM_HASHES: usize = 100;
/// Default number of bands.
pub const DEFAULT_NUM_BANDS: usize = 33;
/// Default number of rows in a band.
pub const DEFAULT_ROWS_PER_BAND: usize = 3;
/// Default window size of character shingles.
pub const DEFAULT_WINDOW_SIZE: usize = 3;
/// Default number of records above which work is spread over threads.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 100;

/// Configuration of an [`LshIndex`](crate::index::LshIndex).
///
/// The defaults (100 hashes, 33 bands of 3 rows, character trigrams) put the
/// steepest point of the LSH s-curve at a Jaccard similarity of about 0.31, so
/// near-duplicates collide with probability close to 1 while unrelated records
/// rarely do.
///
/// # Examples
///
/// ```
/// use find_neardup::IndexConfig;
///
/// let config = IndexConfig::default().bands(20, 5).seed(42);
/// assert!(config.validate().is_ok());
///
/// let config = IndexConfig::default().num_hashes(50).bands(20, 5);
/// assert!(config.validate().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexConfig {
    num_hashes: usize,
    num_bands: usize,
    rows_per_band: usize,
    window_size: usize,
    delimiter: Option<char>,
    seed: u64,
    parallel_threshold: usize,
}

impl Default for IndexConfig {
    /// Creates the default configuration with a random seed.
    fn default() -> Self {
        Self {
            num_hashes: DEFAULT_NUM_HASHES,
            num_bands: DEFAULT_NUM_BANDS,
            rows_per_band: DEFAULT_ROWS_PER_BAND,
            window_size: DEFAULT_WINDOW_SIZE,
            delimiter: None,
            seed: rand::random::<u64>(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl IndexConfig {
    /// Sets the number of MinHash functions, i.e., the signature length.
    pub const fn num_hashes(mut self, num_hashes: usize) -> Self {
        self.num_hashes = num_hashes;
        self
    }

    /// Sets the number of bands and the number of rows in each band.
    pub const fn bands(mut self, num_bands: usize, rows_per_band: usize) -> Self {
        self.num_bands = num_bands;
        self.rows_per_band = rows_per_band;
        self
    }

    /// Sets the window size for w-shingling (must be more than 0).
    pub const fn window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Sets the delimiter for recognizing words as tokens.
    /// If `None`, characters are used for tokens.
    pub const fn delimiter(mut self, delimiter: Option<char>) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the seed value for random values.
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the number of records above which signatures and verifications are
    /// computed in parallel.
    pub const fn parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }

    /// Checks the consistency of the parameters.
    ///
    /// # Errors
    ///
    /// [`FindNeardupError::Configuration`] is returned if a count is zero or the
    /// bands need more rows than there are hash functions.
    pub fn validate(&self) -> Result<()> {
        if self.num_hashes == 0 {
            return Err(FindNeardupError::configuration(
                "The number of hash functions must not be 0.",
            ));
        }
        if self.num_bands == 0 || self.rows_per_band == 0 {
            return Err(FindNeardupError::configuration(
                "The numbers of bands and rows per band must not be 0.",
            ));
        }
        let num_rows = self.num_bands.checked_mul(self.rows_per_band);
        if num_rows.map_or(true, |num_rows| num_rows > self.num_hashes) {
            return Err(FindNeardupError::configuration(format!(
                "{} bands of {} rows exceed the {} available hash functions.",
                self.num_bands, self.rows_per_band, self.num_hashes
            )));
        }
        if self.window_size == 0 {
            return Err(FindNeardupError::configuration("Window size must not be 0."));
        }
        Ok(())
    }

    /// Gets the number of MinHash functions.
    pub const fn get_num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Gets the number of records above which work is spread over threads.
    pub const fn get_parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    /// Gets the seed value.
    pub const fn get_seed(&self) -> u64 {
        self.seed
    }

    /// Gets the banding. The configuration must be valid.
    pub(crate) fn banding(&self) -> Banding {
        Banding::new(self.num_bands, self.rows_per_band)
    }

    /// Derives the shingling configuration and the MinHash seed from the seed value.
    /// The configuration must be valid.
    pub(crate) fn derive(&self) -> (FeatureConfig, u64) {
        let mut seeder = rand_xoshiro::SplitMix64::seed_from_u64(self.seed);
        let feature = FeatureConfig::new(self.window_size, self.delimiter, seeder.next_u64());
        (feature, seeder.next_u64())
    }
}
