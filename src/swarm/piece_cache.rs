use std::collections::HashMap;

use bytes::Bytes;

#[derive(Debug)]
struct CacheEntry {
    data: Bytes,
    /// Logical access time: the value of the cache's counter at the last
    /// touch. Smaller = colder.
    touched: u64,
}

/// LRU cache of whole piece bodies, keyed by piece index.
///
/// Capacity is in bytes. Inserting at or over capacity first evicts the
/// coldest quarter of the entries (by access counter), repeating until
/// the stored total is back under the limit, so a burst of large pieces
/// cannot wedge the cache at its ceiling.
#[derive(Debug)]
pub struct PieceCache {
    entries: HashMap<u32, CacheEntry>,
    max_size: usize,
    current_size: usize,
    counter: u64,
}

impl PieceCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_size,
            current_size: 0,
            counter: 0,
        }
    }

    /// Looks a piece up, marking it most recently used on a hit.
    pub fn get(&mut self, index: u32) -> Option<Bytes> {
        self.counter += 1;
        let entry = self.entries.get_mut(&index)?;
        entry.touched = self.counter;
        Some(entry.data.clone())
    }

    /// Inserts a piece body, evicting cold entries first when full.
    pub fn add(&mut self, index: u32, data: Bytes) {
        while self.current_size >= self.max_size && !self.entries.is_empty() {
            self.evict_coldest_quarter();
        }
        self.counter += 1;
        if let Some(old) = self.entries.insert(
            index,
            CacheEntry {
                touched: self.counter,
                data,
            },
        ) {
            self.current_size -= old.data.len();
        }
        if let Some(entry) = self.entries.get(&index) {
            self.current_size += entry.data.len();
        }
    }

    pub fn contains(&self, index: u32) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently stored.
    pub fn size(&self) -> usize {
        self.current_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // Drops the oldest ~25% of entries by access counter, at least one.
    fn evict_coldest_quarter(&mut self) {
        let mut by_age: Vec<(u64, u32)> = self
            .entries
            .iter()
            .map(|(&index, entry)| (entry.touched, index))
            .collect();
        by_age.sort_unstable();
        let victims = (by_age.len() / 4).max(1);
        for &(_, index) in by_age.iter().take(victims) {
            if let Some(entry) = self.entries.remove(&index) {
                self.current_size -= entry.data.len();
            }
        }
    }
}
