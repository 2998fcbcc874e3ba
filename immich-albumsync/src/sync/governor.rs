use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;

/// Upper bound on the concurrency limit; larger requests are clamped.
pub const MAX_LIMIT: usize = 256;

#[derive(Debug, Error)]
#[error("concurrency limiter is closed")]
pub struct GovernorClosed;

/// Caps the number of remote calls in flight across the whole run.
///
/// Permits are handed out in FIFO order, so a waiting task starts as soon as a
/// running one finishes. Cloning shares the same capacity.
#[derive(Clone, Debug)]
pub struct Governor {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl Governor {
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, MAX_LIMIT);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs `task` while holding one permit; the permit is released when the
    /// task completes.
    pub async fn run<F>(&self, task: F) -> Result<F::Output, GovernorClosed>
    where
        F: Future,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GovernorClosed)?;
        Ok(task.await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_limit_under_concurrent_submission() {
        let governor = Governor::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let governor = governor.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            tasks.spawn(async move {
                governor
                    .run(async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                    .unwrap();
            });
        }

        let mut finished = 0;
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
            finished += 1;
        }

        assert_eq!(finished, 10);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(governor.available(), 2);
    }

    #[tokio::test]
    async fn below_limit_does_not_block() {
        let governor = Governor::new(3);
        let value = tokio::time::timeout(Duration::from_millis(100), governor.run(async { 7 }))
            .await
            .expect("run should not wait for capacity")
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn waiting_task_starts_when_capacity_frees() {
        let governor = Governor::new(1);
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let holder = {
            let governor = governor.clone();
            tokio::spawn(async move {
                governor
                    .run(async {
                        release_rx.await.ok();
                    })
                    .await
                    .unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(governor.available(), 0);

        let waiter = {
            let governor = governor.clone();
            tokio::spawn(async move { governor.run(async { "ran" }).await.unwrap() })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        release_tx.send(()).unwrap();
        holder.await.unwrap();
        assert_eq!(waiter.await.unwrap(), "ran");
    }

    #[test]
    fn zero_limit_is_raised_to_one() {
        assert_eq!(Governor::new(0).limit(), 1);
    }

    #[test]
    fn oversized_limit_is_clamped() {
        let governor = Governor::new(usize::MAX);
        assert_eq!(governor.limit(), MAX_LIMIT);
        assert_eq!(governor.available(), MAX_LIMIT);
    }
}
