use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use vidrelay_core::types::priority_increment;
use vidrelay_core::{Intent, Target};

use crate::error::Result;
use crate::persistence::{Persistence, Table};

struct IntentState {
    intents: HashMap<String, Intent>,
    /// Next first-seen sequence number.
    next_seq: u64,
}

/// Durable map of resource key → pending [`Intent`].
///
/// Every mutation is a read-modify-write under one lock and is persisted
/// before the lock is released, so concurrent producers never lose an
/// update and an `Ok` return means the change survives a crash.
///
/// # Selection order
///
/// [`select_max_priority`](Self::select_max_priority) returns the non-ignored
/// key with the highest priority. Ties go to the key that was first seen
/// earliest (lowest `seq`). A popped key that is appended again counts as
/// newly seen.
pub struct IntentStore {
    state: Mutex<IntentState>,
    persistence: Arc<dyn Persistence>,
}

impl IntentStore {
    /// Rebuild the store from every row in `persistence`.
    pub fn load(persistence: Arc<dyn Persistence>) -> Result<Self> {
        let mut loaded: Vec<(String, Intent)> = Vec::new();
        for (key, data) in persistence.load_all(Table::Intents)? {
            match serde_json::from_str::<Intent>(&data) {
                Ok(intent) => loaded.push((key, intent)),
                Err(e) => warn!(%key, error = %e, "skipping undecodable intent row"),
            }
        }
        // Stable: rows without a stored seq keep their table order.
        loaded.sort_by_key(|(_, intent)| intent.seq);

        let mut intents = HashMap::with_capacity(loaded.len());
        for (seq, (key, mut intent)) in loaded.into_iter().enumerate() {
            intent.seq = seq as u64;
            intents.insert(key, intent);
        }
        let next_seq = intents.len() as u64;
        info!(count = intents.len(), "intent store loaded");

        Ok(Self {
            state: Mutex::new(IntentState { intents, next_seq }),
            persistence,
        })
    }

    /// Create or merge the intent for `key`.
    ///
    /// Targets are unioned. Priority grows by `targets.len()`, or by 2 when
    /// `targets` is empty, unless the intent is ignored. Returns the
    /// priority actually added.
    pub fn append(&self, key: &str, targets: &[Target], source: Option<&str>) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let seq = state.next_seq;
        let mut intent = state
            .intents
            .get(key)
            .cloned()
            .unwrap_or_else(|| Intent::new(seq));

        intent.merge_targets(targets);
        if intent.source.is_none() {
            intent.source = source.filter(|s| !s.is_empty()).map(String::from);
        }
        let delta = if intent.ignored {
            0
        } else {
            priority_increment(targets)
        };
        intent.priority += delta;

        self.persist(key, &intent)?;
        if intent.seq == seq {
            state.next_seq += 1;
        }
        debug!(key, priority = intent.priority, delta, "intent appended");
        state.intents.insert(key.to_string(), intent);
        Ok(delta)
    }

    /// Remove and return the intent for `key`, claiming it for processing.
    pub fn pop(&self, key: &str) -> Result<Option<Intent>> {
        let mut state = self.state.lock().unwrap();
        if !state.intents.contains_key(key) {
            return Ok(None);
        }
        self.persistence.delete(Table::Intents, key)?;
        let intent = state.intents.remove(key);
        debug!(key, "intent popped");
        Ok(intent)
    }

    /// Flag `key` as ignored so it is never selected and stops gaining priority.
    ///
    /// An absent key is recorded as a fresh ignored intent so repeated
    /// requests for a broken resource stay suppressed.
    pub fn mark_ignored(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let seq = state.next_seq;
        let mut intent = state
            .intents
            .get(key)
            .cloned()
            .unwrap_or_else(|| Intent::new(seq));
        if intent.ignored {
            return Ok(());
        }
        intent.ignored = true;

        self.persist(key, &intent)?;
        if intent.seq == seq {
            state.next_seq += 1;
        }
        info!(key, priority = intent.priority, "intent marked ignored");
        state.intents.insert(key.to_string(), intent);
        Ok(())
    }

    /// Highest-priority non-ignored key; ties go to the earliest seen.
    pub fn select_max_priority(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .intents
            .iter()
            .filter(|(_, intent)| !intent.ignored)
            .max_by(|(_, a), (_, b)| a.priority.cmp(&b.priority).then(b.seq.cmp(&a.seq)))
            .map(|(key, _)| key.clone())
    }

    pub fn get(&self, key: &str) -> Option<Intent> {
        self.state.lock().unwrap().intents.get(key).cloned()
    }

    /// Number of intents the scheduler could still select.
    pub fn pending_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.intents.values().filter(|i| !i.ignored).count()
    }

    fn persist(&self, key: &str, intent: &Intent) -> Result<()> {
        self.persistence
            .upsert(Table::Intents, key, &serde_json::to_string(intent)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqlitePersistence;

    fn store() -> (IntentStore, Arc<dyn Persistence>) {
        let persistence: Arc<dyn Persistence> = Arc::new(SqlitePersistence::in_memory().unwrap());
        (IntentStore::load(Arc::clone(&persistence)).unwrap(), persistence)
    }

    #[test]
    fn appends_merge_targets_and_sum_priority() {
        let (store, _) = store();
        let a = Target::broadcast("A");
        let b = Target::broadcast("B");
        assert_eq!(store.append("https://x/1", &[a.clone()], None).unwrap(), 1);
        assert_eq!(
            store
                .append("https://x/1", &[a.clone(), b.clone()], None)
                .unwrap(),
            2
        );

        let intent = store.pop("https://x/1").unwrap().unwrap();
        assert_eq!(intent.targets, vec![a, b]);
        assert_eq!(intent.priority, 3);
    }

    #[test]
    fn empty_append_counts_as_implicit_target() {
        let (store, _) = store();
        store.append("k", &[], None).unwrap();
        store.append("k", &[], None).unwrap();
        store.append("k", &[Target::inline("i")], None).unwrap();
        let intent = store.get("k").unwrap();
        assert_eq!(intent.priority, 5);
        assert_eq!(intent.targets.len(), 1);
    }

    #[test]
    fn ignored_intent_keeps_priority_but_tracks_targets() {
        let (store, _) = store();
        store.append("k", &[Target::broadcast("A")], None).unwrap();
        store.mark_ignored("k").unwrap();
        assert_eq!(
            store.append("k", &[Target::broadcast("B")], None).unwrap(),
            0
        );
        assert_eq!(store.append("k", &[], None).unwrap(), 0);

        let intent = store.get("k").unwrap();
        assert!(intent.ignored);
        assert_eq!(intent.priority, 1);
        assert_eq!(intent.targets.len(), 2);
    }

    #[test]
    fn mark_ignored_on_absent_key_records_it() {
        let (store, _) = store();
        store.mark_ignored("broken").unwrap();
        let intent = store.get("broken").unwrap();
        assert!(intent.ignored);
        assert_eq!(intent.priority, 0);
        assert_eq!(store.select_max_priority(), None);
    }

    #[test]
    fn select_skips_ignored_and_prefers_priority() {
        let (store, _) = store();
        store.append("low", &[Target::broadcast("A")], None).unwrap();
        store.append("high", &[], None).unwrap();
        assert_eq!(store.select_max_priority().as_deref(), Some("high"));

        store.mark_ignored("high").unwrap();
        assert_eq!(store.select_max_priority().as_deref(), Some("low"));
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn ties_go_to_first_seen() {
        let (store, _) = store();
        for key in ["c", "a", "b"] {
            store.append(key, &[], None).unwrap();
        }
        assert_eq!(store.select_max_priority().as_deref(), Some("c"));
        store.pop("c").unwrap();
        assert_eq!(store.select_max_priority().as_deref(), Some("a"));

        // Re-appending a popped key puts it behind everything still queued.
        store.append("c", &[], None).unwrap();
        store.pop("a").unwrap();
        assert_eq!(store.select_max_priority().as_deref(), Some("b"));
    }

    #[test]
    fn tie_break_survives_reload() {
        let (store, persistence) = store();
        for key in ["z", "y", "x"] {
            store.append(key, &[], None).unwrap();
        }
        drop(store);
        let reloaded = IntentStore::load(persistence).unwrap();
        let mut order = Vec::new();
        while let Some(key) = reloaded.select_max_priority() {
            reloaded.pop(&key).unwrap();
            order.push(key);
        }
        assert_eq!(order, vec!["z", "y", "x"]);
    }

    #[test]
    fn pop_is_durable_and_absent_pop_is_none() {
        let (store, persistence) = store();
        store.append("k", &[], Some("download")).unwrap();
        assert_eq!(store.get("k").unwrap().source.as_deref(), Some("download"));
        assert!(store.pop("k").unwrap().is_some());
        assert!(store.pop("k").unwrap().is_none());
        assert!(persistence.load_all(Table::Intents).unwrap().is_empty());
    }

    #[test]
    fn first_source_wins() {
        let (store, _) = store();
        store.append("k", &[], None).unwrap();
        store.append("k", &[], Some("inline")).unwrap();
        store.append("k", &[], Some("subscription")).unwrap();
        assert_eq!(store.get("k").unwrap().source.as_deref(), Some("inline"));
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let (store, _) = store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        let target = Target::broadcast(format!("{i}-{j}"));
                        store.append("shared", &[target], None).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let intent = store.get("shared").unwrap();
        assert_eq!(intent.priority, 200);
        assert_eq!(intent.targets.len(), 200);
    }
}
