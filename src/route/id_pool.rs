//! Allocator of small integer identifiers, backed by a sorted list of free
//! ranges.

use log::trace;

/// Inclusive range of free identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Range {
    first: u32,
    last: u32,
}

impl Range {
    fn len(&self) -> u64 {
        (self.last - self.first) as u64 + 1
    }
}

/// Pool of identifiers in `[0, max_id]`.
///
/// Allocation always returns the smallest available identifier, and released
/// identifiers are available again immediately.
#[derive(Clone, Debug)]
pub struct IdPool {
    /// Sorted, disjoint and non-adjacent free ranges.
    free: Vec<Range>,
    max_id: u32,
}

impl IdPool {
    /// Creates a pool where all identifiers in `[0, max_id]` are free.
    pub fn new(max_id: u32) -> Self {
        IdPool {
            free: vec![Range {
                first: 0,
                last: max_id,
            }],
            max_id,
        }
    }

    /// Returns the largest identifier of this pool.
    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    /// Releases all identifiers.
    pub fn reset(&mut self) {
        *self = IdPool::new(self.max_id);
    }

    /// Allocates the smallest free identifier, or returns `None` if the pool
    /// is exhausted.
    pub fn create_id(&mut self) -> Option<u32> {
        let range = self.free.first_mut()?;
        let id = range.first;
        if range.first == range.last {
            self.free.remove(0);
        } else {
            range.first += 1;
        }
        trace!("Allocated id {id}");
        Some(id)
    }

    /// Allocates `count` consecutive identifiers, returning the first one.
    ///
    /// The lowest free range large enough is used.
    pub fn create_range_id(&mut self, count: u32) -> Option<u32> {
        if count == 0 {
            return None;
        }
        let index = self.free.iter().position(|r| r.len() >= count as u64)?;
        let range = &mut self.free[index];
        let first = range.first;
        if range.len() == count as u64 {
            self.free.remove(index);
        } else {
            range.first += count;
        }
        trace!("Allocated ids [{first}, {}]", first + (count - 1));
        Some(first)
    }

    /// Releases an identifier. Returns false if it wasn't allocated.
    pub fn destroy_id(&mut self, id: u32) -> bool {
        self.destroy_range_id(id, 1)
    }

    /// Releases `count` consecutive identifiers starting at `first`. Returns
    /// false, leaving the pool unchanged, if any of them wasn't allocated.
    pub fn destroy_range_id(&mut self, first: u32, count: u32) -> bool {
        if count == 0 {
            return false;
        }
        let last = match first.checked_add(count - 1) {
            Some(last) if last <= self.max_id => last,
            _ => return false,
        };

        // First free range that ends at or after the released range.
        let index = self.free.partition_point(|r| r.last < first);
        if index < self.free.len() && self.free[index].first <= last {
            return false;
        }

        let merge_prev = index > 0 && self.free[index - 1].last + 1 == first;
        let merge_next = index < self.free.len() && Some(self.free[index].first) == last.checked_add(1);
        match (merge_prev, merge_next) {
            (true, true) => {
                self.free[index - 1].last = self.free[index].last;
                self.free.remove(index);
            }
            (true, false) => self.free[index - 1].last = last,
            (false, true) => self.free[index].first = first,
            (false, false) => self.free.insert(index, Range { first, last }),
        }
        trace!("Released ids [{first}, {last}]");
        true
    }

    /// Checks whether an identifier is currently allocated.
    pub fn is_id(&self, id: u32) -> bool {
        if id > self.max_id {
            return false;
        }
        let index = self.free.partition_point(|r| r.last < id);
        !(index < self.free.len() && self.free[index].first <= id)
    }

    /// Returns the number of free identifiers.
    pub fn available_ids(&self) -> u64 {
        self.free.iter().map(Range::len).sum()
    }

    /// Returns the size of the largest run of consecutive free identifiers.
    pub fn largest_continuous_range(&self) -> u64 {
        self.free.iter().map(Range::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocates_smallest_first() {
        let mut pool = IdPool::new(10);
        assert_eq!(pool.create_id(), Some(0));
        assert_eq!(pool.create_id(), Some(1));
        assert_eq!(pool.create_id(), Some(2));
        assert!(pool.is_id(1));
        assert!(!pool.is_id(3));
        assert!(!pool.is_id(11));
    }

    #[test]
    fn reuses_disposed_id() {
        const MAX: u32 = 100;
        const N: u32 = 10;
        let mut pool = IdPool::new(MAX);
        for i in 0..N {
            assert_eq!(pool.create_id(), Some(i));
        }
        assert!(pool.destroy_id(4));
        assert!(!pool.is_id(4));
        assert_eq!(pool.available_ids(), (MAX + 1 - (N - 1)) as u64);
        assert_eq!(pool.create_id(), Some(4));
        assert_eq!(pool.create_id(), Some(N));
    }

    #[test]
    fn double_destroy_fails() {
        let mut pool = IdPool::new(10);
        let id = pool.create_id().unwrap();
        assert!(pool.destroy_id(id));
        assert!(!pool.destroy_id(id));
        assert!(!pool.destroy_id(11));
        assert_eq!(pool.available_ids(), 11);
    }

    #[test]
    fn exhaustion() {
        let mut pool = IdPool::new(2);
        assert_eq!(pool.create_id(), Some(0));
        assert_eq!(pool.create_id(), Some(1));
        assert_eq!(pool.create_id(), Some(2));
        assert_eq!(pool.create_id(), None);
        assert_eq!(pool.available_ids(), 0);
        assert_eq!(pool.largest_continuous_range(), 0);
        assert!(pool.destroy_id(1));
        assert_eq!(pool.create_id(), Some(1));
    }

    #[test]
    fn ranges_merge_with_neighbours() {
        let mut pool = IdPool::new(20);
        assert_eq!(pool.create_range_id(10), Some(0));
        assert_eq!(pool.largest_continuous_range(), 11);

        assert!(pool.destroy_id(2));
        assert!(pool.destroy_id(4));
        assert_eq!(pool.free.len(), 3);
        // Fills the hole between 2 and 4.
        assert!(pool.destroy_id(3));
        assert_eq!(pool.free.len(), 2);
        assert_eq!(pool.largest_continuous_range(), 11);

        // Merges with the trailing free range.
        assert!(pool.destroy_range_id(5, 5));
        assert_eq!(
            pool.free,
            vec![Range { first: 2, last: 20 }]
        );
        assert_eq!(pool.largest_continuous_range(), 19);
    }

    #[test]
    fn range_allocation_is_first_fit() {
        let mut pool = IdPool::new(20);
        assert_eq!(pool.create_range_id(10), Some(0));
        assert!(pool.destroy_range_id(2, 2));
        // The hole [2, 3] is too small.
        assert_eq!(pool.create_range_id(3), Some(10));
        assert_eq!(pool.create_range_id(2), Some(2));
        assert_eq!(pool.create_range_id(0), None);
        assert_eq!(pool.create_range_id(100), None);
    }

    #[test]
    fn overlapping_release_is_rejected() {
        let mut pool = IdPool::new(20);
        assert_eq!(pool.create_range_id(5), Some(0));
        // [3, 7] overlaps the free range starting at 5.
        assert!(!pool.destroy_range_id(3, 5));
        assert_eq!(pool.available_ids(), 16);
        assert!(!pool.destroy_range_id(u32::MAX, 2));
    }

    #[test]
    fn reset_frees_everything() {
        let mut pool = IdPool::new(5);
        pool.create_range_id(4);
        pool.reset();
        assert_eq!(pool.available_ids(), 6);
        assert_eq!(pool.create_id(), Some(0));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        proptest! {
            #[test]
            fn prop_matches_reference_model(ops in prop::collection::vec((any::<bool>(), 0u32..40), 0..200)) {
                const MAX: u32 = 31;
                let mut pool = IdPool::new(MAX);
                let mut allocated = BTreeSet::new();

                for (create, id) in ops {
                    if create {
                        let expected = (0..=MAX).find(|i| !allocated.contains(i));
                        prop_assert_eq!(pool.create_id(), expected);
                        if let Some(id) = expected {
                            allocated.insert(id);
                        }
                    } else {
                        prop_assert_eq!(pool.destroy_id(id), allocated.remove(&id));
                    }

                    prop_assert_eq!(pool.available_ids(), (MAX + 1) as u64 - allocated.len() as u64);
                    for i in 0..=MAX + 1 {
                        prop_assert_eq!(pool.is_id(i), allocated.contains(&i));
                    }
                    for pair in pool.free.windows(2) {
                        prop_assert!(pair[0].last + 1 < pair[1].first);
                    }
                }
            }
        }
    }
}
