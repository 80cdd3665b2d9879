/// Invalidation listener - evicts resolver state when a client is deleted
use crate::{
    error::{KeyringError, KeyringResult},
    identity::PublicKeyResolver,
    journal::{Journal, Row, RowHandler, Subscription, CLIENT_DELETE_QUEUE, CLIENT_ID_COLUMN},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::debug;

/// Watcher name registered on the deletion queue
pub const WATCHER_NAME: &str = "server_key_manager_listener";

/// Watches client deletions and evicts the deleted ids from the resolver
pub struct InvalidationListener {
    resolver: Arc<dyn PublicKeyResolver>,
}

impl InvalidationListener {
    pub fn new(resolver: Arc<dyn PublicKeyResolver>) -> Self {
        Self { resolver }
    }

    /// Register the listener on the client deletion queue
    pub fn start(
        journal: &dyn Journal,
        resolver: Arc<dyn PublicKeyResolver>,
        tracker: &TaskTracker,
        cancel: &CancellationToken,
    ) -> Subscription {
        journal.watch_queue(
            CLIENT_DELETE_QUEUE,
            WATCHER_NAME,
            Arc::new(Self::new(resolver)),
            tracker,
            cancel,
        )
    }
}

#[async_trait]
impl RowHandler for InvalidationListener {
    async fn handle(&self, row: Row) -> KeyringResult<()> {
        let client_id = row
            .get(CLIENT_ID_COLUMN)
            .and_then(|value| value.as_str())
            .ok_or_else(|| {
                KeyringError::Validation(format!(
                    "Client deletion row without a string {}",
                    CLIENT_ID_COLUMN
                ))
            })?;

        debug!("Client {} deleted, evicting", client_id);
        self.resolver.delete_subject(client_id);
        Ok(())
    }
}
