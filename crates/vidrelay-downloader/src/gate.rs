use std::future::Future;

use tokio::sync::Semaphore;
use tracing::debug;

/// Process-wide gate that lets at most one guarded future run at a time.
///
/// Waiters are admitted in FIFO order. The permit is released when the
/// guarded future completes or is dropped, so a caller-side timeout
/// releases the gate too.
pub struct SingleFlight {
    permit: Semaphore,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            permit: Semaphore::new(1),
        }
    }

    /// Run `fut` while holding the gate.
    pub async fn run<F, T>(&self, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .permit
            .acquire()
            .await
            .expect("single-flight semaphore is never closed");
        debug!("lock_acquire");
        let out = fut.await;
        debug!("lock_release");
        out
    }

    /// `true` while a guarded future is running.
    pub fn is_busy(&self) -> bool {
        self.permit.available_permits() == 0
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn never_more_than_one_inside() {
        let gate = Arc::new(SingleFlight::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let inside = Arc::clone(&inside);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    gate.run(async {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_releases_the_gate() {
        let gate = SingleFlight::new();
        let stalled = tokio::time::timeout(
            Duration::from_secs(1),
            gate.run(std::future::pending::<()>()),
        )
        .await;
        assert!(stalled.is_err());
        assert!(!gate.is_busy());
        assert_eq!(gate.run(async { 7 }).await, 7);
    }
}
