/// In-process journal backed by one broadcast channel per queue
use crate::{
    error::KeyringResult,
    journal::{Journal, Row, RowHandler, Subscription},
    metrics,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

/// Rows buffered per queue before slow watchers start lagging
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Journal for a single process. Rows pushed while nobody watches a queue
/// are dropped.
pub struct LocalJournal {
    queues: Mutex<HashMap<String, broadcast::Sender<Row>>>,
    capacity: usize,
}

impl LocalJournal {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, queue: &str) -> broadcast::Sender<Row> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues
            .entry(queue.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Number of live watchers on `queue`
    pub fn watcher_count(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(queue)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for LocalJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Journal for LocalJournal {
    async fn push_rows(&self, queue: &str, rows: Vec<Row>) -> KeyringResult<()> {
        let sender = self.sender(queue);
        for row in rows {
            if sender.send(row).is_err() {
                debug!("No watchers on {}, row dropped", queue);
            }
        }
        Ok(())
    }

    fn watch_queue(
        &self,
        queue: &str,
        watcher: &str,
        handler: Arc<dyn RowHandler>,
        tracker: &TaskTracker,
        cancel: &CancellationToken,
    ) -> Subscription {
        // Subscribe before spawning so rows pushed right after this call
        // returns are not missed.
        let mut receiver = self.sender(queue).subscribe();
        let token = cancel.child_token();
        let subscription = Subscription::new(watcher, queue, token.clone());

        let queue = queue.to_string();
        let watcher = watcher.to_string();
        tracker.spawn(async move {
            info!("{} watching {}", watcher, queue);

            loop {
                let row = tokio::select! {
                    _ = token.cancelled() => break,
                    received = receiver.recv() => received,
                };

                match row {
                    Ok(row) => match handler.handle(row).await {
                        Ok(()) => metrics::record_journal_event(&queue, true),
                        Err(e) => {
                            metrics::record_journal_event(&queue, false);
                            warn!("{} failed to handle row from {}: {}", watcher, queue, e);
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("{} lagged on {}, {} rows skipped", watcher, queue, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            info!("{} stopped watching {}", watcher, queue);
        });

        subscription
    }
}
