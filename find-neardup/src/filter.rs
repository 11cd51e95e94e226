//! Cheap pre-filters skipping pairs that cannot reach a threshold.
//!
//! A filter bounds the combined similarity of a pair from above without running
//! the edit distance kernel. Since the bound is never below the exact value, a
//! filter never discards a pair the exact comparison would keep.
use crate::record::{FieldState, FieldWeights, PreparedRecord};

/// Slack absorbing floating-point error in the bounds.
const SAFETY_MARGIN: f64 = 1e-9;

/// Contract of a pre-filter.
///
/// The engine running a filter hands it the weights it combines field
/// similarities with, so a filter bounds exactly the score being verified.
pub trait PreFilter: Send + Sync {
    /// Returns `true` if the pair must be passed on to the exact comparison, or
    /// `false` if its combined similarity under `weights` is definitely below
    /// `threshold`.
    fn quick_reject(
        &self,
        a: &PreparedRecord,
        b: &PreparedRecord,
        weights: &FieldWeights,
        threshold: f64,
    ) -> bool;

    /// Name for logging.
    fn name(&self) -> &'static str;
}

fn passes<F>(
    weights: &FieldWeights,
    a: &PreparedRecord,
    b: &PreparedRecord,
    threshold: f64,
    bound: F,
) -> bool
where
    F: Fn(&[char], &[char]) -> usize,
{
    let upper = weights.combine((0..weights.len()).map(|i| {
        let (x, y) = (a.field(i), b.field(i));
        let max_len = x.len().max(y.len());
        let sim = if max_len == 0 {
            1.
        } else {
            1. - bound(x, y) as f64 / max_len as f64
        };
        FieldState::new(x, y, sim)
    }));
    upper + SAFETY_MARGIN >= threshold
}

/// Filter bounding each field's distance from below by the length difference.
#[derive(Clone, Copy, Debug, Default)]
pub struct LengthFilter;

impl PreFilter for LengthFilter {
    fn quick_reject(
        &self,
        a: &PreparedRecord,
        b: &PreparedRecord,
        weights: &FieldWeights,
        threshold: f64,
    ) -> bool {
        passes(weights, a, b, threshold, |x, y| x.len().abs_diff(y.len()))
    }

    fn name(&self) -> &'static str {
        "length"
    }
}

const NUM_BAG_BUCKETS: usize = 32;

/// Filter comparing sampled character histograms.
///
/// Characters are hashed into 32 buckets. An edit operation adds at most one
/// character and removes at most one, so the distance is at least the larger of
/// the total surplus and the total deficit over the buckets.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharBagFilter;

#[inline(always)]
fn bucket(c: char) -> usize {
    ((c as u32).wrapping_mul(0x9E37_79B1) >> 27) as usize
}

fn histogram_bound(x: &[char], y: &[char]) -> usize {
    let mut hist = [0i64; NUM_BAG_BUCKETS];
    x.iter().for_each(|&c| hist[bucket(c)] += 1);
    y.iter().for_each(|&c| hist[bucket(c)] -= 1);
    let surplus: i64 = hist.iter().filter(|&&h| h > 0).sum();
    let deficit: i64 = -hist.iter().filter(|&&h| h < 0).sum::<i64>();
    surplus.max(deficit) as usize
}

impl PreFilter for CharBagFilter {
    fn quick_reject(
        &self,
        a: &PreparedRecord,
        b: &PreparedRecord,
        weights: &FieldWeights,
        threshold: f64,
    ) -> bool {
        passes(weights, a, b, threshold, histogram_bound)
    }

    fn name(&self) -> &'static str {
        "char-bag"
    }
}
