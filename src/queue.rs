//! Work Queue (spec §4.5): a durable FIFO of crawl tasks, woken by storage
//! change notifications rather than polling.

use std::sync::Arc;

use chrono::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::storage::{Operation, Storage};
use crate::url_canon;

/// A crawl task ready for a worker to pick up.
#[derive(Debug, Clone)]
pub struct Msg {
    pub url: Url,
    pub origin: Url,
    pub depth: i64,
    pub max_depth: i64,
}

/// Couples [`Storage`]'s change-notification hook to waiting workers via a
/// `tokio::sync::Notify` — the async runtime's condition-variable analogue.
pub struct WorkQueue {
    storage: Arc<Storage>,
    notify: Arc<tokio::sync::Notify>,
}

impl WorkQueue {
    /// Subscribe to `queue_items` inserts so every committed insert wakes
    /// exactly one blocked [`next`](Self::next) caller.
    pub fn new(storage: Arc<Storage>) -> Self {
        let notify = Arc::new(tokio::sync::Notify::new());
        let hook_notify = notify.clone();
        storage.register(
            "queue_items",
            Operation::Insert,
            Box::new(move |_row_id| {
                hook_notify.notify_one();
            }),
        );
        Self { storage, notify }
    }

    /// Canonicalize, gate-check, and enqueue. A gate rejection (URL still
    /// fresh) is not an error — it is the intended "skip" outcome.
    pub async fn add(
        &self,
        url: &str,
        origin: &str,
        depth: i64,
        max_depth: i64,
        reindex_duration: Duration,
    ) -> Result<()> {
        let url = url_canon::clean(url)?;
        let origin = url_canon::clean(origin)?;

        let inserted = self
            .storage
            .enqueue_if_fresh(
                url.as_str(),
                origin.as_str(),
                depth,
                max_depth,
                reindex_duration,
            )
            .await?;

        if !inserted {
            debug!(url = %url, "gate rejected enqueue, url still fresh");
        }
        Ok(())
    }

    /// Produce the next message, blocking until one is available or
    /// `cancel` fires. Loops through spurious wakes (an empty dequeue after
    /// a notification) rather than returning a zero message.
    pub async fn next(&self, cancel: &CancellationToken) -> Result<Msg> {
        loop {
            // Register for the next notification before checking, so a
            // notify racing between the check and the wait is not missed.
            let notified = self.notify.notified();

            if let Some(row) = self.storage.dequeue().await? {
                let url = url_canon::clean(&row.url)?;
                let origin = url_canon::clean(&row.origin)?;
                return Ok(Msg {
                    url,
                    origin,
                    depth: row.depth,
                    max_depth: row.max_depth,
                });
            }

            tokio::select! {
                _ = notified => continue,
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn add_then_next_round_trips() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let queue = WorkQueue::new(storage);
        let cancel = CancellationToken::new();

        queue
            .add("http://a/", "http://a/", 0, 1, Duration::hours(24))
            .await
            .unwrap();

        let msg = queue.next(&cancel).await.unwrap();
        assert_eq!(msg.url.as_str(), "http://a/");
        assert_eq!(msg.depth, 0);
    }

    #[tokio::test]
    async fn next_is_fifo() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let queue = WorkQueue::new(storage);
        let cancel = CancellationToken::new();

        queue
            .add("http://a/", "http://a/", 0, 1, Duration::hours(24))
            .await
            .unwrap();
        queue
            .add("http://b/", "http://a/", 1, 1, Duration::hours(24))
            .await
            .unwrap();

        let first = queue.next(&cancel).await.unwrap();
        let second = queue.next(&cancel).await.unwrap();
        assert_eq!(first.url.as_str(), "http://a/");
        assert_eq!(second.url.as_str(), "http://b/");
    }

    #[tokio::test]
    async fn next_wakes_on_later_insert() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let queue = Arc::new(WorkQueue::new(storage));
        let cancel = CancellationToken::new();

        let waiter = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.next(&cancel).await })
        };

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        queue
            .add("http://a/", "http://a/", 0, 1, Duration::hours(24))
            .await
            .unwrap();

        let msg = tokio::time::timeout(StdDuration::from_secs(1), waiter)
            .await
            .expect("did not wake in time")
            .unwrap()
            .unwrap();
        assert_eq!(msg.url.as_str(), "http://a/");
    }

    #[tokio::test]
    async fn next_unblocks_on_cancellation() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let queue = Arc::new(WorkQueue::new(storage));
        let cancel = CancellationToken::new();

        let waiter = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.next(&cancel).await })
        };

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(StdDuration::from_secs(1), waiter)
            .await
            .expect("did not unblock in time")
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
