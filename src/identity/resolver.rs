/// Public key resolver - maps a client id to its enrolled key
///
/// Resolution order:
/// 1. Negative cache (a recent failure means not found, no store read)
/// 2. Key store
/// 3. On any failure, remember the id in the negative cache
///
/// Only failures are cached. A store outage therefore looks exactly like
/// "not enrolled" to callers: an unresolvable client is never authenticated.
use crate::{
    crypto::ClientPublicKey,
    error::KeyringResult,
    identity::negative_cache::NegativeCache,
    metrics,
    store::{ClientPathManager, KeyStore, PublicKeyRecord},
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolve, bind and evict client keys
#[async_trait]
pub trait PublicKeyResolver: Send + Sync {
    /// Look up the key bound to `client_id`. `None` means the client cannot
    /// be authenticated right now.
    async fn get_public_key(&self, client_id: &str) -> Option<ClientPublicKey>;

    /// Bind `key` to `client_id`, overwriting any previous binding
    async fn set_public_key(&self, client_id: &str, key: &ClientPublicKey) -> KeyringResult<()>;

    /// Drop any cached lookup failure for `client_id`
    fn delete_subject(&self, client_id: &str);

    /// Drop all cached state
    fn clear(&self);
}

/// Store-backed resolver with a negative cache in front
pub struct ServerPublicKeyResolver {
    negative_cache: NegativeCache,
    store: Arc<dyn KeyStore>,
}

impl ServerPublicKeyResolver {
    pub fn new(negative_cache: NegativeCache, store: Arc<dyn KeyStore>) -> Self {
        Self {
            negative_cache,
            store,
        }
    }

    #[cfg(test)]
    pub(crate) fn negative_cache(&self) -> &NegativeCache {
        &self.negative_cache
    }

    fn remember_failure(&self, client_id: &str) -> Option<ClientPublicKey> {
        self.negative_cache.insert(client_id);
        metrics::record_key_resolution("miss");
        None
    }
}

#[async_trait]
impl PublicKeyResolver for ServerPublicKeyResolver {
    async fn get_public_key(&self, client_id: &str) -> Option<ClientPublicKey> {
        if self.negative_cache.contains(client_id) {
            metrics::record_key_resolution("negative_cache");
            return None;
        }

        let path = ClientPathManager::new(client_id).key();
        let record = match self.store.get(&path).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No key enrolled for {}", client_id);
                return self.remember_failure(client_id);
            }
            Err(e) => {
                warn!("Failed to read key for {}: {}", client_id, e);
                return self.remember_failure(client_id);
            }
        };

        match ClientPublicKey::from_pem(&record.pem) {
            Ok(key) => {
                metrics::record_key_resolution("hit");
                Some(key)
            }
            Err(e) => {
                warn!("Stored key for {} does not decode: {}", client_id, e);
                self.remember_failure(client_id)
            }
        }
    }

    async fn set_public_key(&self, client_id: &str, key: &ClientPublicKey) -> KeyringResult<()> {
        self.negative_cache.remove(client_id);

        let path = ClientPathManager::new(client_id).key();
        let record = PublicKeyRecord {
            pem: key.to_pem(),
            enroll_time: Utc::now().timestamp().max(0) as u64,
        };

        self.store.set(&path, &record).await?;

        // A lookup that missed while the write was in flight may have
        // re-inserted the id
        self.negative_cache.remove(client_id);
        Ok(())
    }

    fn delete_subject(&self, client_id: &str) {
        if self.negative_cache.remove(client_id) {
            debug!("Evicted negative cache entry for {}", client_id);
        }
    }

    fn clear(&self) {
        self.negative_cache.clear();
    }
}
