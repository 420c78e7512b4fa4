use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Cached answer to one inline query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InlineEntry {
    /// RFC 3339 creation time.
    pub timestamp: String,
    /// Opaque, channel-specific inline results.
    pub results: Vec<Value>,
    /// Set by one sweep, evicted by the next.
    pub marked: bool,
    /// The query resolved to a permanently unavailable resource.
    pub ignored: bool,
}

impl InlineEntry {
    pub fn new(results: Vec<Value>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            results,
            marked: false,
            ignored: false,
        }
    }
}

/// Short-lived inline-query cache. Memory only; lost on restart.
///
/// Only external inline-query producers fill it, through
/// [`InlineCache::put`]. The gateway binary runs none, so its cache stays
/// empty and the sweeper has nothing to evict.
#[derive(Default)]
pub struct InlineCache {
    entries: DashMap<String, InlineEntry>,
}

/// Outcome of one [`InlineCache::sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepStats {
    pub marked: usize,
    pub evicted: usize,
}

impl InlineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, query: &str) -> Option<InlineEntry> {
        self.entries.get(query).map(|e| e.clone())
    }

    pub fn put(&self, query: &str, entry: InlineEntry) {
        self.entries.insert(query.to_string(), entry);
    }

    /// Flag the entry for `query` as ignored. Returns `false` if absent.
    pub fn mark_ignored(&self, query: &str) -> bool {
        match self.entries.get_mut(query) {
            Some(mut entry) => {
                entry.ignored = true;
                true
            }
            None => false,
        }
    }

    /// Two-pass eviction: delete entries marked by the previous sweep, mark
    /// the rest. Every entry lives at least one full sweep interval.
    pub fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        self.entries.retain(|_, entry| {
            if entry.marked {
                stats.evicted += 1;
                false
            } else {
                entry.marked = true;
                stats.marked += 1;
                true
            }
        });
        debug!(marked = stats.marked, evicted = stats.evicted, "inline cache swept");
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_survives_exactly_one_sweep() {
        let cache = InlineCache::new();
        cache.put("q", InlineEntry::new(vec![]));

        assert_eq!(cache.sweep(), SweepStats { marked: 1, evicted: 0 });
        assert!(cache.get("q").unwrap().marked);

        assert_eq!(cache.sweep(), SweepStats { marked: 0, evicted: 1 });
        assert!(cache.get("q").is_none());
    }

    #[test]
    fn entry_added_between_sweeps_gets_full_grace() {
        let cache = InlineCache::new();
        cache.put("old", InlineEntry::new(vec![]));
        cache.sweep();
        cache.put("new", InlineEntry::new(vec![]));

        cache.sweep();
        assert!(cache.get("old").is_none());
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn replacing_an_entry_resets_its_mark() {
        let cache = InlineCache::new();
        cache.put("q", InlineEntry::new(vec![]));
        cache.sweep();
        cache.put("q", InlineEntry::new(vec![serde_json::json!({"id": "1"})]));
        cache.sweep();
        assert_eq!(cache.get("q").unwrap().results.len(), 1);
    }

    #[test]
    fn mark_ignored_only_touches_existing() {
        let cache = InlineCache::new();
        assert!(!cache.mark_ignored("q"));
        cache.put("q", InlineEntry::new(vec![]));
        assert!(cache.mark_ignored("q"));
        assert!(cache.get("q").unwrap().ignored);
    }
}
