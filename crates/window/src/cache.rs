use rollcall_extract::models::AccountRecord;
use std::collections::{HashMap, HashSet};

/// A contiguous run of records cached together.
#[derive(Debug, Clone)]
pub(crate) struct IndexSlice {
    pub range_start: usize,
    /// Exclusive.
    pub range_end: usize,
    pub records: Vec<AccountRecord>,
    /// Logical tick of the last hit; larger is more recent.
    pub last_touched_at: u64,
}

impl IndexSlice {
    fn record(&self, index: usize) -> Option<&AccountRecord> {
        if !(self.range_start..self.range_end).contains(&index) {
            return None;
        }
        // Records are ordered by index but a failed or short read may leave gaps.
        let offset = index - self.range_start;
        match self.records.get(offset) {
            Some(record) if record.index == index => Some(record),
            _ => self.records.iter().find(|record| record.index == index),
        }
    }
}

/// Slice bookkeeping for the windowed source, free of any I/O.
///
/// Slices are keyed by their start index. A slice is either resident or
/// loading, never both. Loading slices aren't resident yet, so eviction can't
/// touch them.
#[derive(Debug)]
pub(crate) struct SliceCache {
    slice_size: usize,
    max_slices: usize,
    slices: HashMap<usize, IndexSlice>,
    loading: HashSet<usize>,
    clock: u64,
}

impl SliceCache {
    pub fn new(slice_size: usize, max_slices: usize) -> Self {
        Self { slice_size, max_slices, slices: HashMap::new(), loading: HashSet::new(), clock: 0 }
    }

    pub fn slice_size(&self) -> usize {
        self.slice_size
    }

    /// Start of the fixed-size slice owning `index`.
    pub fn slice_start(&self, index: usize) -> usize {
        (index / self.slice_size) * self.slice_size
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub fn is_resident(&self, start: usize) -> bool {
        self.slices.contains_key(&start)
    }

    pub fn is_loading(&self, start: usize) -> bool {
        self.loading.contains(&start)
    }

    /// Look up `index`, refreshing its slice's recency.
    ///
    /// The outer `None` means the slice isn't resident; `Some(None)` means it
    /// is, but holds no record for `index`.
    pub fn get(&mut self, index: usize) -> Option<Option<AccountRecord>> {
        let start = self.slice_start(index);
        let now = self.tick();
        let slice = self.slices.get_mut(&start)?;
        slice.last_touched_at = now;
        Some(slice.record(index).cloned())
    }

    /// Mark the slice at `start` as loading.
    ///
    /// Returns `false`, and changes nothing, if it is already resident or
    /// loading.
    pub fn begin_load(&mut self, start: usize) -> bool {
        if self.is_resident(start) {
            return false;
        }
        self.loading.insert(start)
    }

    /// Store a fetched slice and evict if over budget. Returns the number of
    /// slices evicted.
    pub fn complete_load(&mut self, start: usize, end: usize, records: Vec<AccountRecord>) -> usize {
        self.loading.remove(&start);
        let last_touched_at = self.tick();
        self.slices.insert(start, IndexSlice { range_start: start, range_end: end, records, last_touched_at });
        self.evict()
    }

    /// Once more than `1.5 × max_slices` are resident, drop the least
    /// recently touched down to `max_slices`.
    fn evict(&mut self) -> usize {
        if self.slices.len() * 2 <= self.max_slices * 3 {
            return 0;
        }
        let mut by_age: Vec<(u64, usize)> =
            self.slices.values().map(|slice| (slice.last_touched_at, slice.range_start)).collect();
        by_age.sort_unstable();
        let excess = self.slices.len() - self.max_slices;
        for (_, start) in by_age.into_iter().take(excess) {
            self.slices.remove(&start);
        }
        excess
    }

    pub fn resident(&self) -> usize {
        self.slices.len()
    }

    pub fn clear(&mut self) {
        self.slices.clear();
        self.loading.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_extract::models::BadgeSet;
    use rstest::rstest;

    fn records(start: usize, end: usize) -> Vec<AccountRecord> {
        (start..end).map(|index| AccountRecord::new(index, format!("user{index}"), BadgeSet::empty())).collect()
    }

    fn load(cache: &mut SliceCache, start: usize) -> usize {
        let end = start + cache.slice_size();
        assert!(cache.begin_load(start));
        cache.complete_load(start, end, records(start, end))
    }

    #[rstest]
    #[case(0, 0)]
    #[case(99, 0)]
    #[case(100, 100)]
    #[case(250, 200)]
    fn test_slice_start(#[case] index: usize, #[case] start: usize) {
        assert_eq!(SliceCache::new(100, 20).slice_start(index), start);
    }

    #[test]
    fn test_load_lifecycle() {
        let mut cache = SliceCache::new(10, 4);
        assert_eq!(cache.get(3), None);
        assert!(cache.begin_load(0));
        assert!(!cache.begin_load(0));
        assert!(cache.is_loading(0));
        assert_eq!(cache.get(3), None);

        cache.complete_load(0, 10, records(0, 10));
        assert!(!cache.is_loading(0));
        assert!(!cache.begin_load(0));
        assert_eq!(cache.get(3).flatten().map(|record| record.username), Some("user3".to_string()));
    }

    #[test]
    fn test_short_slice_has_no_record_past_its_data() {
        let mut cache = SliceCache::new(10, 4);
        cache.begin_load(20);
        cache.complete_load(20, 30, Vec::new());
        assert_eq!(cache.get(25), Some(None));
    }

    #[test]
    fn test_eviction_keeps_most_recently_touched() {
        let mut cache = SliceCache::new(10, 4);
        for start in [0, 10, 20, 30, 40, 50] {
            assert_eq!(load(&mut cache, start), 0);
        }
        assert_eq!(cache.resident(), 6);

        assert!(cache.get(5).is_some());
        assert_eq!(load(&mut cache, 60), 3);
        assert_eq!(cache.resident(), 4);
        for start in [0, 40, 50, 60] {
            assert!(cache.is_resident(start), "{start}");
        }
    }

    #[test]
    fn test_loading_slices_survive_eviction() {
        let mut cache = SliceCache::new(10, 2);
        assert!(cache.begin_load(0));
        for start in [10, 20, 30, 40] {
            load(&mut cache, start);
        }
        assert!(cache.resident() <= 3);
        assert!(cache.is_loading(0));
        cache.complete_load(0, 10, records(0, 10));
        assert!(cache.is_resident(0));
    }

    #[test]
    fn test_resident_count_stays_bounded() {
        let mut cache = SliceCache::new(10, 20);
        for slice in 0..31 {
            load(&mut cache, slice * 10);
        }
        assert_eq!(cache.resident(), 20);
        for slice in 31..200 {
            load(&mut cache, slice * 10);
            assert!(cache.resident() <= 30);
        }
    }

    #[test]
    fn test_clear() {
        let mut cache = SliceCache::new(10, 4);
        load(&mut cache, 0);
        cache.begin_load(10);
        cache.clear();
        assert_eq!(cache.resident(), 0);
        assert!(!cache.is_loading(10));
    }
}
