//! Side table of per-record derived data.
use std::sync::OnceLock;

use crate::record::{PreparedRecord, Record};

/// Lazily filled table of prepared records, indexed by record slot.
///
/// Records stay immutable; their normalized fields are computed on first use
/// and shared by every later comparison. Reads of a filled slot take no lock.
pub(crate) struct DerivedCache {
    num_fields: usize,
    slots: Vec<OnceLock<PreparedRecord>>,
}

impl DerivedCache {
    pub(crate) fn new(num_records: usize, num_fields: usize) -> Self {
        Self {
            num_fields,
            slots: (0..num_records).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Gets the prepared form of the record in `slot`, preparing it on a miss.
    ///
    /// Concurrent misses on one slot run a single initializer.
    pub(crate) fn get_or_prepare(&self, slot: usize, record: &Record) -> &PreparedRecord {
        self.slots[slot].get_or_init(|| PreparedRecord::new(record, self.num_fields))
    }

    /// Gets the number of filled slots.
    pub(crate) fn num_filled(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    #[test]
    fn test_lazy_fill() {
        let records = [Record::new("a", ["Foo", "Bar"]), Record::new("b", ["Baz", ""])];
        let cache = DerivedCache::new(records.len(), 2);
        assert_eq!(cache.num_filled(), 0);

        let p = cache.get_or_prepare(1, &records[1]);
        assert_eq!(p.field(0), &['b', 'a', 'z']);
        assert_eq!(cache.num_filled(), 1);

        let q = cache.get_or_prepare(1, &records[1]);
        assert!(std::ptr::eq(p, q));
    }

    #[test]
    fn test_concurrent_fill() {
        let records: Vec<_> = (0..64)
            .map(|i| Record::new(i.to_string(), [format!("Name {i}"), String::new()]))
            .collect();
        let cache = DerivedCache::new(records.len(), 2);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for (slot, record) in records.iter().enumerate() {
                        let p = cache.get_or_prepare(slot, record);
                        assert_eq!(p.joined_text(), format!("name {slot}"));
                    }
                });
            }
        });
        assert_eq!(cache.num_filled(), records.len());
    }
}
