use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vidrelay_core::ResourceRecord;

use crate::error::Result;
use crate::persistence::{Persistence, Table};

/// Stored document in the `resources` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum CacheEntry {
    Record { record: ResourceRecord },
    Alias { target: String },
}

/// Maps resource keys to fetched records.
///
/// Several keys may share one record: an alias entry points at the key that
/// owns it. Aliases are always one hop. The cache never evicts.
pub struct ResourceCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    persistence: Arc<dyn Persistence>,
}

impl ResourceCache {
    /// Rebuild the cache from every row in `persistence`.
    ///
    /// Undecodable rows are skipped with a warning rather than failing startup.
    pub fn load(persistence: Arc<dyn Persistence>) -> Result<Self> {
        let mut entries = HashMap::new();
        for (key, data) in persistence.load_all(Table::Resources)? {
            match serde_json::from_str::<CacheEntry>(&data) {
                Ok(entry) => {
                    entries.insert(key, entry);
                }
                Err(e) => warn!(%key, error = %e, "skipping undecodable resource row"),
            }
        }
        info!(count = entries.len(), "resource cache loaded");
        Ok(Self {
            entries: Mutex::new(entries),
            persistence,
        })
    }

    /// Look up `key`, following an alias to the record it names.
    pub fn get(&self, key: &str) -> Option<ResourceRecord> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key)? {
            CacheEntry::Record { record } => Some(record.clone()),
            CacheEntry::Alias { target } => match entries.get(target)? {
                CacheEntry::Record { record } => Some(record.clone()),
                CacheEntry::Alias { .. } => None,
            },
        }
    }

    /// Store `record` under `key`, replacing whatever was there.
    pub fn put(&self, key: &str, record: ResourceRecord) -> Result<()> {
        let entry = CacheEntry::Record { record };
        let mut entries = self.entries.lock().unwrap();
        self.persistence
            .upsert(Table::Resources, key, &serde_json::to_string(&entry)?)?;
        entries.insert(key.to_string(), entry);
        debug!(key, "resource stored");
        Ok(())
    }

    /// Point `alias_key` at the record owned by `existing_key`.
    ///
    /// Idempotent. Never overwrites a real record at `alias_key`. Returns
    /// `true` if the alias is in place after the call.
    pub fn put_alias(&self, alias_key: &str, existing_key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();

        // Collapse chains so every alias stays one hop from its record.
        let target = match entries.get(existing_key) {
            Some(CacheEntry::Record { .. }) => existing_key.to_string(),
            Some(CacheEntry::Alias { target }) => target.clone(),
            None => {
                warn!(alias_key, existing_key, "alias target not cached");
                return Ok(false);
            }
        };
        if target == alias_key {
            return Ok(true);
        }

        match entries.get(alias_key) {
            Some(CacheEntry::Record { .. }) => {
                debug!(alias_key, "alias refused: key owns a record");
                return Ok(false);
            }
            Some(CacheEntry::Alias { target: current }) if *current == target => return Ok(true),
            _ => {}
        }

        let entry = CacheEntry::Alias {
            target: target.clone(),
        };
        self.persistence
            .upsert(Table::Resources, alias_key, &serde_json::to_string(&entry)?)?;
        entries.insert(alias_key.to_string(), entry);
        info!(alias_key, %target, "resource alias registered");
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqlitePersistence;
    use vidrelay_core::{MediaHandle, Payload};

    fn record(title: &str, handle: Option<&str>) -> ResourceRecord {
        ResourceRecord {
            title: title.to_string(),
            description: String::new(),
            caption: title.to_string(),
            duration: 1,
            width: None,
            height: None,
            webpage_url: None,
            upload_date: None,
            timestamp: None,
            thumbnail: None,
            uploader_url: None,
            format: None,
            payload: match handle {
                Some(h) => Payload::Uploaded {
                    handle: MediaHandle::from(h),
                },
                None => Payload::Metadata,
            },
            origin: None,
            source: None,
            processed_at: None,
        }
    }

    fn cache() -> (ResourceCache, Arc<dyn Persistence>) {
        let persistence: Arc<dyn Persistence> = Arc::new(SqlitePersistence::in_memory().unwrap());
        (ResourceCache::load(Arc::clone(&persistence)).unwrap(), persistence)
    }

    #[test]
    fn put_then_get() {
        let (cache, _) = cache();
        assert!(cache.get("k").is_none());
        cache.put("k", record("a", Some("f1"))).unwrap();
        assert_eq!(cache.get("k").unwrap().title, "a");
    }

    #[test]
    fn alias_resolves_to_target_record() {
        let (cache, _) = cache();
        cache.put("https://x/1", record("a", Some("f1"))).unwrap();
        assert!(cache.put_alias("short", "https://x/1").unwrap());
        assert_eq!(cache.get("short"), cache.get("https://x/1"));
    }

    #[test]
    fn alias_is_idempotent() {
        let (cache, persistence) = cache();
        cache.put("canon", record("a", None)).unwrap();
        assert!(cache.put_alias("q", "canon").unwrap());
        assert!(cache.put_alias("q", "canon").unwrap());
        assert_eq!(persistence.load_all(Table::Resources).unwrap().len(), 2);
    }

    #[test]
    fn alias_never_overwrites_a_record() {
        let (cache, _) = cache();
        cache.put("canon", record("canonical", None)).unwrap();
        cache.put("q", record("own", None)).unwrap();
        assert!(!cache.put_alias("q", "canon").unwrap());
        assert_eq!(cache.get("q").unwrap().title, "own");
    }

    #[test]
    fn alias_of_alias_collapses_to_one_hop() {
        let (cache, _) = cache();
        cache.put("canon", record("a", None)).unwrap();
        cache.put_alias("q1", "canon").unwrap();
        cache.put_alias("q2", "q1").unwrap();
        assert_eq!(cache.get("q2").unwrap().title, "a");
    }

    #[test]
    fn alias_to_missing_key_is_refused() {
        let (cache, _) = cache();
        assert!(!cache.put_alias("q", "nowhere").unwrap());
        assert!(cache.get("q").is_none());
    }

    #[test]
    fn reload_restores_records_and_aliases() {
        let (cache, persistence) = cache();
        cache.put("canon", record("a", Some("f1"))).unwrap();
        cache.put_alias("q", "canon").unwrap();
        drop(cache);

        let reloaded = ResourceCache::load(persistence).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.get("q").unwrap().handle(),
            Some(&MediaHandle::from("f1"))
        );
    }
}
