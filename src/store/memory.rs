/// In-memory key store
use crate::{
    error::KeyringResult,
    store::{KeyStore, PublicKeyRecord},
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Volatile key store; contents are lost on restart
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    records: RwLock<HashMap<String, PublicKeyRecord>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get(&self, path: &str) -> KeyringResult<Option<PublicKeyRecord>> {
        Ok(self.records.read().await.get(path).cloned())
    }

    async fn set(&self, path: &str, record: &PublicKeyRecord) -> KeyringResult<()> {
        self.records
            .write()
            .await
            .insert(path.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, path: &str) -> KeyringResult<()> {
        self.records.write().await.remove(path);
        Ok(())
    }
}
