//! Shingling of texts into hashed features.
use std::ops::Range;

use crate::shingling::Shingles;

/// Configuration of w-shingling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureConfig {
    window_size: usize,
    delimiter: Option<char>,
    seed: u64,
}

impl FeatureConfig {
    /// Creates an instance.
    ///
    /// # Arguments
    ///
    /// * `window_size` - Number of tokens in a shingle (must be more than 0).
    /// * `delimiter` - Delimiter for recognizing words as tokens.
    ///                 If `None`, characters are used for tokens.
    /// * `seed` - Seed value for hashing shingles.
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero.
    pub fn new(window_size: usize, delimiter: Option<char>, seed: u64) -> Self {
        assert!(window_size >= 1);
        Self {
            window_size,
            delimiter,
            seed,
        }
    }

    /// Gets the window size.
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Gets the delimiter.
    pub const fn delimiter(&self) -> Option<char> {
        self.delimiter
    }

    fn hash(&self, shingle: &str) -> u64 {
        lsh::hash_bytes(shingle.as_bytes(), self.seed)
    }
}

/// Extractor of shingles and their hashes, reusing its token buffer across texts.
pub struct FeatureExtractor {
    config: FeatureConfig,
    token_ranges: Vec<Range<usize>>,
}

impl FeatureExtractor {
    /// Creates an instance.
    pub const fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            token_ranges: vec![],
        }
    }

    /// Extracts the overlapping shingles of a text.
    ///
    /// Text with fewer tokens than the window size yields one shingle, the whole text.
    pub fn shingles<'t>(&mut self, text: &'t str) -> Vec<&'t str> {
        self.tokenize(text);
        Shingles::new(&self.token_ranges, self.config.window_size)
            .map(|window| match (window.first(), window.last()) {
                (Some(first), Some(last)) if window.len() == self.config.window_size => {
                    &text[first.start..last.end]
                }
                _ => text,
            })
            .collect()
    }

    /// Extracts the hashes of the shingles of a text into `feature`.
    pub fn extract<S>(&mut self, text: S, feature: &mut Vec<u64>)
    where
        S: AsRef<str>,
    {
        let text = text.as_ref();
        feature.clear();
        let config = self.config;
        feature.extend(self.shingles(text).into_iter().map(|s| config.hash(s)));
    }

    fn tokenize(&mut self, text: &str) {
        self.token_ranges.clear();

        let mut offset = 0;
        if let Some(delim) = self.config.delimiter {
            while offset < text.len() {
                let len = text[offset..].find(delim).unwrap_or(text.len() - offset);
                if len != 0 {
                    self.token_ranges.push(offset..offset + len);
                }
                offset += len + delim.len_utf8();
            }
        } else {
            for c in text.chars() {
                let len = c.len_utf8();
                self.token_ranges.push(offset..offset + len);
                offset += len;
            }
        }
    }
}

/// Extracts the overlapping shingles of a text.
///
/// # Examples
///
/// ```
/// use find_neardup::feature::shingles;
///
/// assert_eq!(shingles("abcd", 3, None), vec!["abc", "bcd"]);
/// assert_eq!(shingles("ab", 3, None), vec!["ab"]);
/// assert_eq!(shingles("a b  c", 2, Some(' ')), vec!["a b", "b  c"]);
/// ```
///
/// # Panics
///
/// Panics if `window_size` is zero.
pub fn shingles(text: &str, window_size: usize, delimiter: Option<char>) -> Vec<&str> {
    FeatureExtractor::new(FeatureConfig::new(window_size, delimiter, 0)).shingles(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_unigram() {
        assert_eq!(shingles("abcd", 1, None), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_char_trigram() {
        let config = FeatureConfig::new(3, None, 42);
        let mut extractor = FeatureExtractor::new(config);

        let mut feature = vec![];
        extractor.extract("abcd", &mut feature);
        assert_eq!(feature, vec![config.hash("abc"), config.hash("bcd")]);
    }

    #[test]
    fn test_multibyte() {
        assert_eq!(shingles("東京都庁", 2, None), vec!["東京", "京都", "都庁"]);
    }

    #[test]
    fn test_word_bigram() {
        let config = FeatureConfig::new(2, Some(' '), 42);
        let mut extractor = FeatureExtractor::new(config);

        let mut feature = vec![];
        extractor.extract("abc de fgh", &mut feature);
        assert_eq!(
            feature,
            vec![config.hash("abc de"), config.hash("de fgh")]
        );
    }

    #[test]
    fn test_short_text() {
        assert_eq!(shingles("ab", 3, None), vec!["ab"]);
        assert_eq!(shingles("abc de", 3, Some(' ')), vec!["abc de"]);
        assert_eq!(shingles("", 3, None), vec![""]);

        let config = FeatureConfig::new(3, None, 42);
        let mut extractor = FeatureExtractor::new(config);
        let mut feature = vec![];
        extractor.extract("", &mut feature);
        assert_eq!(feature, vec![config.hash("")]);
    }

    #[test]
    fn test_trailing_delimiter() {
        assert_eq!(shingles("ab cd ", 1, Some(' ')), vec!["ab", "cd"]);
    }
}
