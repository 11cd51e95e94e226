//! Strategies for the inner Levenshtein loop.
use hashbrown::HashMap;

use crate::pool::BufferPool;

/// Trait of a Levenshtein kernel over code-point sequences.
///
/// Every implementation must return exactly the unit-cost edit distance, so that
/// kernels are interchangeable.
pub trait Kernel: Send + Sync {
    /// Computes the edit distance between `a` and `b`.
    fn distance(&self, a: &[char], b: &[char], pool: &BufferPool) -> usize;

    /// Name for logging.
    fn name(&self) -> &'static str;
}

/// Available kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelKind {
    /// Two rolling rows of the dynamic programming matrix.
    Scalar,
    /// Bit-vector kernel processing 64 matrix cells per word operation.
    BitParallel,
}

static SCALAR: ScalarKernel = ScalarKernel;
static BIT_PARALLEL: BitParallelKernel = BitParallelKernel;

impl KernelKind {
    /// Probes the running CPU and picks a kernel.
    ///
    /// Both kernels are portable: the bit-parallel one only needs wrapping `u64`
    /// arithmetic, and either gives the same distances. The probe is a policy
    /// switch that prefers the bit-parallel kernel on CPUs reporting native
    /// 64-bit bit-manipulation support, and the scalar one elsewhere.
    pub fn detect() -> Self {
        if has_fast_bit_ops() {
            Self::BitParallel
        } else {
            Self::Scalar
        }
    }

    /// Gets the kernel implementation.
    pub fn kernel(self) -> &'static dyn Kernel {
        match self {
            Self::Scalar => &SCALAR,
            Self::BitParallel => &BIT_PARALLEL,
        }
    }
}

// Tells whether the CPU advertises fast word-level bit operations. Nothing
// here is required for correctness.
#[cfg(target_arch = "x86_64")]
fn has_fast_bit_ops() -> bool {
    std::arch::is_x86_feature_detected!("popcnt") && std::arch::is_x86_feature_detected!("bmi1")
}

#[cfg(target_arch = "aarch64")]
fn has_fast_bit_ops() -> bool {
    std::arch::is_aarch64_feature_detected!("neon")
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn has_fast_bit_ops() -> bool {
    false
}

/// Classic dynamic programming with two rows sized to the shorter input.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScalarKernel;

impl Kernel for ScalarKernel {
    fn distance(&self, a: &[char], b: &[char], pool: &BufferPool) -> usize {
        let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
        if short.is_empty() {
            return long.len();
        }
        let mut prev = pool.take(short.len() + 1);
        let mut curr = pool.take(short.len() + 1);
        for (j, x) in prev.iter_mut().enumerate() {
            *x = j;
        }
        for (i, &lc) in long.iter().enumerate() {
            curr[0] = i + 1;
            for (j, &sc) in short.iter().enumerate() {
                curr[j + 1] = if lc == sc {
                    prev[j]
                } else {
                    1 + prev[j].min(prev[j + 1]).min(curr[j])
                };
            }
            std::mem::swap(&mut prev, &mut curr);
        }
        prev[short.len()]
    }

    fn name(&self) -> &'static str {
        "scalar"
    }
}

/// Bit-vector kernel of [Myers (1999)](https://doi.org/10.1145/316542.316550)
/// in the formulation of [Hyyrö (2003)](https://doi.org/10.1007/978-3-540-39984-1_15).
///
/// One column of vertical deltas is packed into a `u64`, so the shorter input must
/// fit in 64 code points; longer inputs are handed to [`ScalarKernel`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BitParallelKernel;

const WORD_LEN: usize = 64;

impl Kernel for BitParallelKernel {
    fn distance(&self, a: &[char], b: &[char], pool: &BufferPool) -> usize {
        let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
        if short.is_empty() {
            return long.len();
        }
        if short.len() > WORD_LEN {
            return ScalarKernel.distance(long, short, pool);
        }
        if short.iter().all(char::is_ascii) {
            let mut peq = [0u64; 128];
            for (i, &c) in short.iter().enumerate() {
                peq[c as usize] |= 1 << i;
            }
            myers(long, short.len(), |c| {
                if c.is_ascii() {
                    peq[c as usize]
                } else {
                    0
                }
            })
        } else {
            let mut peq = HashMap::<char, u64>::with_capacity(short.len());
            for (i, &c) in short.iter().enumerate() {
                *peq.entry(c).or_default() |= 1 << i;
            }
            myers(long, short.len(), |c| peq.get(&c).copied().unwrap_or(0))
        }
    }

    fn name(&self) -> &'static str {
        "bit-parallel"
    }
}

#[inline(always)]
fn myers<F>(text: &[char], m: usize, peq: F) -> usize
where
    F: Fn(char) -> u64,
{
    debug_assert!(1 <= m && m <= WORD_LEN);
    let last = 1u64 << (m - 1);
    let mut pv = !0u64;
    let mut mv = 0u64;
    let mut score = m;
    for &c in text {
        let eq = peq(c);
        let xv = eq | mv;
        let xh = ((eq & pv).wrapping_add(pv) ^ pv) | eq;
        let mut ph = mv | !(xh | pv);
        let mut mh = pv & xh;
        if ph & last != 0 {
            score += 1;
        }
        if mh & last != 0 {
            score -= 1;
        }
        // The top row of the global alignment matrix grows by one per column.
        ph = (ph << 1) | 1;
        mh <<= 1;
        pv = mh | !(xv | ph);
        mv = ph & xv;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{Rng, SeedableRng};

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    const KINDS: [KernelKind; 2] = [KernelKind::Scalar, KernelKind::BitParallel];

    #[test]
    fn test_known_distances() {
        let pool = BufferPool::new();
        for kind in KINDS {
            let k = kind.kernel();
            assert_eq!(k.distance(&chars("kitten"), &chars("sitting"), &pool), 3);
            assert_eq!(k.distance(&chars("apple"), &chars("appl"), &pool), 1);
            assert_eq!(k.distance(&chars(""), &chars("abc"), &pool), 3);
            assert_eq!(k.distance(&chars("abc"), &chars(""), &pool), 3);
            assert_eq!(k.distance(&chars(""), &chars(""), &pool), 0);
            assert_eq!(k.distance(&chars("flaw"), &chars("lawn"), &pool), 2);
            assert_eq!(k.distance(&chars("東京都"), &chars("京都府"), &pool), 2);
        }
    }

    fn random_text<R: Rng>(rng: &mut R, alphabet: &[char], max_len: usize) -> Vec<char> {
        let len = rng.gen_range(0..=max_len);
        (0..len)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect()
    }

    #[test]
    fn test_kernels_agree() {
        let pool = BufferPool::new();
        let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(42);
        let alphabets: [&[char]; 3] = [
            &['a', 'b'],
            &['a', 'b', 'c', 'd', 'e', 'f', 'g', ' '],
            &['x', 'y', 'é', 'ß', '語', 'z'],
        ];
        for alphabet in alphabets {
            for max_len in [5, 40, 64, 65, 150] {
                for _ in 0..200 {
                    let a = random_text(&mut rng, alphabet, max_len);
                    let b = random_text(&mut rng, alphabet, max_len);
                    let expected = ScalarKernel.distance(&a, &b, &pool);
                    assert_eq!(
                        BitParallelKernel.distance(&a, &b, &pool),
                        expected,
                        "a={a:?}, b={b:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_word_boundary() {
        let pool = BufferPool::new();
        let a: Vec<char> = std::iter::repeat('a').take(64).collect();
        let mut b = a.clone();
        b[63] = 'b';
        assert_eq!(BitParallelKernel.distance(&a, &b, &pool), 1);
        b.push('c');
        assert_eq!(BitParallelKernel.distance(&a, &b, &pool), 2);
    }

    #[test]
    fn test_detect() {
        let kind = KernelKind::detect();
        assert!(KINDS.contains(&kind));
        assert!(!kind.kernel().name().is_empty());
    }

    #[test]
    fn test_every_kind_runs_anywhere() {
        // Whatever the CPU reports, both kernels are usable and agree.
        let pool = BufferPool::new();
        let (a, b) = (chars("saturday sunday"), chars("sunday saturday"));
        let expected = ScalarKernel.distance(&a, &b, &pool);
        assert_eq!(expected, 6);
        assert_eq!(KernelKind::detect().kernel().distance(&a, &b, &pool), expected);
        for kind in KINDS {
            assert_eq!(kind.kernel().distance(&a, &b, &pool), expected);
        }
    }
}
