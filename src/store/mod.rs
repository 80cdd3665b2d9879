/// Key store - durable mapping from client id to its enrolled public key
///
/// The resolver only ever talks to a [`KeyStore`]; the backing engine is
/// chosen at startup (SQLite for real deployments, memory for tests and
/// ephemeral runs).

pub mod memory;
pub mod sqlite;

pub use memory::MemoryKeyStore;
pub use sqlite::SqliteKeyStore;

use crate::error::KeyringResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Persisted public key record, one per client id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    /// SubjectPublicKeyInfo PEM
    pub pem: String,
    /// Unix seconds of the enrollment that wrote this record
    pub enroll_time: u64,
}

/// Get/set/delete by path
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Read a record. `Ok(None)` means nothing is stored at `path`.
    async fn get(&self, path: &str) -> KeyringResult<Option<PublicKeyRecord>>;

    /// Write (or overwrite) a record
    async fn set(&self, path: &str, record: &PublicKeyRecord) -> KeyringResult<()>;

    /// Delete a record. Deleting a missing path is not an error.
    async fn delete(&self, path: &str) -> KeyringResult<()>;
}

/// Deterministic store paths for a client
#[derive(Debug, Clone)]
pub struct ClientPathManager {
    client_id: String,
}

impl ClientPathManager {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }

    /// Where the client's public key record lives
    pub fn key(&self) -> String {
        format!("/clients/{}/key", self.client_id)
    }
}
