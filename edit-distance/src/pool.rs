//! Reusable scratch rows for the dynamic programming kernels.
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use hashbrown::HashMap;

const DEFAULT_MAX_PER_CLASS: usize = 64;

/// Arena of scratch rows keyed by capacity class.
///
/// A row is taken with [`BufferPool::take()`] and goes back to the pool when the
/// returned [`PooledBuffer`] is dropped. Capacities are rounded up to a power of
/// two so that rows of similar lengths share a class. At most `max_per_class`
/// idle rows are retained per class; the surplus is freed.
#[derive(Debug)]
pub struct BufferPool {
    classes: Mutex<HashMap<usize, Vec<Vec<usize>>>>,
    max_per_class: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

/// Counters of a [`BufferPool`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of takes served by a retained row.
    pub hits: usize,
    /// Number of takes that allocated a new row.
    pub misses: usize,
    /// Number of idle rows currently retained.
    pub retained: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::with_max_per_class(DEFAULT_MAX_PER_CLASS)
    }

    /// Creates an empty pool retaining at most `max_per_class` idle rows per class.
    pub fn with_max_per_class(max_per_class: usize) -> Self {
        Self {
            classes: Mutex::new(HashMap::new()),
            max_per_class,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Takes a zero-filled row of length `len`.
    pub fn take(&self, len: usize) -> PooledBuffer<'_> {
        let class = len.next_power_of_two();
        let reused = self.lock().get_mut(&class).and_then(|rows| rows.pop());
        let mut buf = if let Some(buf) = reused {
            self.hits.fetch_add(1, Ordering::Relaxed);
            buf
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            Vec::with_capacity(class)
        };
        buf.clear();
        buf.resize(len, 0);
        PooledBuffer { pool: self, buf }
    }

    /// Gets the counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            retained: self.lock().values().map(|rows| rows.len()).sum(),
        }
    }

    fn give_back(&self, buf: Vec<usize>) {
        let class = buf.capacity().next_power_of_two();
        let mut classes = self.lock();
        let rows = classes.entry(class).or_default();
        if rows.len() < self.max_per_class {
            rows.push(buf);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, Vec<Vec<usize>>>> {
        // Rows hold no invariants, so a poisoned pool is still usable.
        self.classes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Row borrowed from a [`BufferPool`].
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Vec<usize>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse() {
        let pool = BufferPool::new();
        {
            let mut row = pool.take(5);
            assert_eq!(&row[..], &[0; 5]);
            row[3] = 7;
        }
        assert_eq!(
            pool.stats(),
            PoolStats {
                hits: 0,
                misses: 1,
                retained: 1
            }
        );
        // Same class, and the row comes back cleared.
        let row = pool.take(7);
        assert_eq!(&row[..], &[0; 7]);
        assert_eq!(pool.stats().hits, 1);
        assert_eq!(pool.stats().retained, 0);
    }

    #[test]
    fn test_classes() {
        let pool = BufferPool::new();
        drop(pool.take(3));
        drop(pool.take(100));
        let stats = pool.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.retained, 2);
    }

    #[test]
    fn test_bounded_retention() {
        let pool = BufferPool::with_max_per_class(2);
        let rows: Vec<_> = (0..4).map(|_| pool.take(8)).collect();
        drop(rows);
        assert_eq!(pool.stats().retained, 2);
    }

    #[test]
    fn test_empty_row() {
        let pool = BufferPool::new();
        let row = pool.take(0);
        assert!(row.is_empty());
    }
}
