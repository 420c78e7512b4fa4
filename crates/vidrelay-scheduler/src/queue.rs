use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

use vidrelay_core::Target;
use vidrelay_store::IntentStore;

use crate::error::Result;

/// Producer-side entry point: records intents and wakes the scheduler.
///
/// Cheap to clone; every producer gets its own copy.
#[derive(Clone)]
pub struct IntentQueue {
    store: Arc<IntentStore>,
    wake: Arc<Notify>,
}

impl IntentQueue {
    pub fn new(store: Arc<IntentStore>) -> Self {
        Self {
            store,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Record an intent for `key` and signal the scheduler.
    ///
    /// The intent is durable when this returns. Never waits on the
    /// scheduler: if it is busy the signal is kept until it next idles.
    pub fn append_intent(&self, key: &str, targets: &[Target], source: Option<&str>) -> Result<u64> {
        let delta = self.store.append(key, targets, source)?;
        self.wake.notify_one();
        debug!(key, delta, "scheduler woken");
        Ok(delta)
    }

    /// Wake the scheduler if restored intents are waiting.
    pub fn resume(&self) -> usize {
        let pending = self.store.pending_count();
        if pending > 0 {
            self.wake.notify_one();
        }
        pending
    }

    pub fn store(&self) -> &Arc<IntentStore> {
        &self.store
    }

    pub(crate) fn wake(&self) -> &Arc<Notify> {
        &self.wake
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use vidrelay_store::{Persistence, SqlitePersistence};

    use super::*;

    fn queue() -> IntentQueue {
        let persistence: Arc<dyn Persistence> = Arc::new(SqlitePersistence::in_memory().unwrap());
        IntentQueue::new(Arc::new(IntentStore::load(persistence).unwrap()))
    }

    #[tokio::test]
    async fn append_leaves_a_wake_permit() {
        let q = queue();
        q.append_intent("k", &[], Some("download")).unwrap();
        // The permit is stored even though nobody was waiting.
        tokio::time::timeout(Duration::from_millis(50), q.wake().notified())
            .await
            .unwrap();
        assert_eq!(q.store().get("k").unwrap().priority, 2);
    }

    #[tokio::test]
    async fn resume_only_signals_with_pending_work() {
        let q = queue();
        assert_eq!(q.resume(), 0);
        assert!(
            tokio::time::timeout(Duration::from_millis(20), q.wake().notified())
                .await
                .is_err()
        );

        q.store().append("k", &[], None).unwrap();
        assert_eq!(q.resume(), 1);
        tokio::time::timeout(Duration::from_millis(50), q.wake().notified())
            .await
            .unwrap();
    }
}
