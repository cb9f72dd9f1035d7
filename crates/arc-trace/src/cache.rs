// crates/arc-trace/src/cache.rs
// ============================================================================
// Module: Blame Cache
// Description: Fixed-capacity LRU cache keyed by (repo_path, file_path,
//              line_number), used to avoid re-running `git blame` for a
//              line the caller has already traced.
// Purpose: Mirrors `@lru_cache(maxsize=BLAME_CACHE_SIZE)` in the original
//          implementation's `arc_memory/trace.py`, hand-rolled over a
//          `HashMap` plus an intrusive access-order list rather than
//          pulling in an LRU crate for one call site.
// Dependencies: none (std only)
// ============================================================================

//! ## Overview
//! [`BlameCache`] is process-local and bounded: once it holds `capacity`
//! entries, inserting a new one evicts the least recently used. It is safe
//! to share across threads via a `Mutex`; the trace engine owns one
//! instance per process, not a global singleton.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

// ============================================================================
// SECTION: Cache Key
// ============================================================================

/// Cache key: a specific line of a specific file in a specific repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlameKey {
    /// Filesystem path to the repository root.
    pub repo_path: String,
    /// Repository-relative file path.
    pub file_path: String,
    /// One-indexed line number.
    pub line_number: u32,
}

impl BlameKey {
    /// Builds a cache key.
    #[must_use]
    pub fn new(repo_path: impl Into<String>, file_path: impl Into<String>, line_number: u32) -> Self {
        Self {
            repo_path: repo_path.into(),
            file_path: file_path.into(),
            line_number,
        }
    }
}

// ============================================================================
// SECTION: LRU Cache
// ============================================================================

/// Fixed-capacity, least-recently-used cache of blame results.
///
/// # Invariants
/// - Never holds more than `capacity` entries.
/// - `order` always contains exactly the keys present in `entries`, most
///   recently used last.
#[derive(Debug)]
pub struct BlameCache {
    capacity: usize,
    entries: HashMap<BlameKey, String>,
    /// Access order, oldest first. Re-touched keys are moved to the back.
    order: Vec<BlameKey>,
}

impl BlameCache {
    /// Builds an empty cache bounded to `capacity` entries (clamped to at
    /// least 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Looks up `key`, marking it most recently used on a hit.
    #[must_use]
    pub fn get(&mut self, key: &BlameKey) -> Option<String> {
        let value = self.entries.get(key).cloned()?;
        self.touch(key);
        Some(value)
    }

    /// Inserts `key -> value`, evicting the least recently used entry if
    /// the cache is at capacity and `key` is new.
    pub fn put(&mut self, key: BlameKey, value: String) {
        if self.entries.insert(key.clone(), value).is_some() {
            self.touch(&key);
            return;
        }
        self.order.push(key);
        if self.entries.len() > self.capacity
            && !self.order.is_empty()
        {
            let oldest = self.order.remove(0);
            self.entries.remove(&oldest);
        }
    }

    /// Returns the number of entries currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Moves `key` to the most-recently-used end of `order`.
    fn touch(&mut self, key: &BlameKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let moved = self.order.remove(pos);
            self.order.push(moved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BlameCache;
    use super::BlameKey;

    #[test]
    fn evicts_least_recently_used_entry_past_capacity() {
        let mut cache = BlameCache::new(2);
        cache.put(BlameKey::new("/repo", "a.py", 1), "sha-a".to_string());
        cache.put(BlameKey::new("/repo", "b.py", 1), "sha-b".to_string());
        cache.put(BlameKey::new("/repo", "c.py", 1), "sha-c".to_string());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&BlameKey::new("/repo", "a.py", 1)).is_none());
        assert!(cache.get(&BlameKey::new("/repo", "c.py", 1)).is_some());
    }

    #[test]
    fn get_refreshes_recency_and_spares_eviction() {
        let mut cache = BlameCache::new(2);
        cache.put(BlameKey::new("/repo", "a.py", 1), "sha-a".to_string());
        cache.put(BlameKey::new("/repo", "b.py", 1), "sha-b".to_string());
        assert!(cache.get(&BlameKey::new("/repo", "a.py", 1)).is_some());

        cache.put(BlameKey::new("/repo", "c.py", 1), "sha-c".to_string());

        assert!(cache.get(&BlameKey::new("/repo", "a.py", 1)).is_some());
        assert!(cache.get(&BlameKey::new("/repo", "b.py", 1)).is_none());
    }

    #[test]
    fn put_overwrite_does_not_grow_beyond_capacity() {
        let mut cache = BlameCache::new(2);
        cache.put(BlameKey::new("/repo", "a.py", 1), "sha-a".to_string());
        cache.put(BlameKey::new("/repo", "a.py", 1), "sha-a2".to_string());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&BlameKey::new("/repo", "a.py", 1)), Some("sha-a2".to_string()));
    }
}
