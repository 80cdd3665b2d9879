/// Journal - named queues of JSON rows with push and watch
///
/// Other services announce state changes (a client was deleted, ...) by
/// pushing rows onto a named queue. Watchers register a handler per queue
/// and get every row pushed after they subscribed.

pub mod local;

pub use local::LocalJournal;

use crate::error::KeyringResult;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Queue that carries client deletion notifications
pub const CLIENT_DELETE_QUEUE: &str = "Server.Internal.ClientDelete";

/// Column of a client deletion row that names the deleted client
pub const CLIENT_ID_COLUMN: &str = "ClientId";

/// One journal row: column name to value
pub type Row = Map<String, Value>;

/// Processes the rows of one queue
#[async_trait]
pub trait RowHandler: Send + Sync {
    /// Handle a single row. Errors are logged by the watcher and the row is
    /// dropped; they never stop the watch.
    async fn handle(&self, row: Row) -> KeyringResult<()>;
}

/// Queue transport
#[async_trait]
pub trait Journal: Send + Sync {
    /// Append rows to `queue`, in order
    async fn push_rows(&self, queue: &str, rows: Vec<Row>) -> KeyringResult<()>;

    /// Deliver every row pushed to `queue` from now on to `handler`.
    ///
    /// The watch task is spawned on `tracker` and stops when `cancel` fires
    /// or the returned subscription is cancelled.
    fn watch_queue(
        &self,
        queue: &str,
        watcher: &str,
        handler: Arc<dyn RowHandler>,
        tracker: &TaskTracker,
        cancel: &CancellationToken,
    ) -> Subscription;
}

/// Handle to a running queue watch
#[derive(Debug)]
pub struct Subscription {
    name: String,
    queue: String,
    cancel: CancellationToken,
}

impl Subscription {
    pub(crate) fn new(watcher: &str, queue: &str, cancel: CancellationToken) -> Self {
        Self {
            name: watcher.to_string(),
            queue: queue.to_string(),
            cancel,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Stop the watch. Rows already being handled finish first.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Build the row announcing that `client_id` was deleted
pub fn client_delete_row(client_id: &str) -> Row {
    let mut row = Row::new();
    row.insert(
        CLIENT_ID_COLUMN.to_string(),
        Value::String(client_id.to_string()),
    );
    row
}
