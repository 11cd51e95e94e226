use std::slice::Windows;

/// Overlapping windows of `window_size` tokens.
///
/// A sequence shorter than the window yields one window holding the whole
/// sequence, so every input has at least one shingle.
pub enum Shingles<'a, T> {
    /// The sequence is shorter than the window.
    Whole(Option<&'a [T]>),
    /// Regular sliding windows.
    Sliding(Windows<'a, T>),
}

impl<'a, T> Shingles<'a, T> {
    pub fn new(tokens: &'a [T], window_size: usize) -> Self {
        debug_assert!(window_size >= 1);
        if tokens.len() < window_size {
            Self::Whole(Some(tokens))
        } else {
            Self::Sliding(tokens.windows(window_size))
        }
    }
}

impl<'a, T> Iterator for Shingles<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Whole(tokens) => tokens.take(),
            Self::Sliding(windows) => windows.next(),
        }
    }
}
