/// Shared fixtures for unit tests
use crate::{
    error::{KeyringError, KeyringResult},
    store::{KeyStore, MemoryKeyStore, PublicKeyRecord},
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

pub const CLIENT_A_CSR: &str = include_str!("../testdata/client_a.csr");
pub const CLIENT_A_KEY: &str = include_str!("../testdata/client_a.key");
pub const CLIENT_A_PUBLIC_KEY: &str = include_str!("../testdata/client_a.pub");
pub const CLIENT_A_ID: &str = "C.37234998e986946f";

/// Client A's key behind a CSR that claims client B's id
pub const CLIENT_A_MISMATCH_CSR: &str = include_str!("../testdata/client_a_mismatch.csr");

pub const CLIENT_B_CSR: &str = include_str!("../testdata/client_b.csr");
pub const CLIENT_B_PUBLIC_KEY: &str = include_str!("../testdata/client_b.pub");
pub const CLIENT_B_ID: &str = "C.332191e84bbd4f83";

/// P-256 key, well-formed but not an enrollable scheme
pub const CLIENT_EC_CSR: &str = include_str!("../testdata/client_ec.csr");

pub const SERVER_CERTIFICATE: &str = include_str!("../testdata/server.crt");
pub const SERVER_PRIVATE_KEY: &str = include_str!("../testdata/server.key");
pub const SERVER_NAME: &str = "frontend.test";

/// Memory store that counts reads
#[derive(Default)]
pub struct CountingKeyStore {
    inner: MemoryKeyStore,
    reads: AtomicUsize,
}

impl CountingKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// The wrapped store, for seeding records without counting
    pub fn inner(&self) -> &MemoryKeyStore {
        &self.inner
    }
}

#[async_trait]
impl KeyStore for CountingKeyStore {
    async fn get(&self, path: &str) -> KeyringResult<Option<PublicKeyRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(path).await
    }

    async fn set(&self, path: &str, record: &PublicKeyRecord) -> KeyringResult<()> {
        self.inner.set(path, record).await
    }

    async fn delete(&self, path: &str) -> KeyringResult<()> {
        self.inner.delete(path).await
    }
}

/// Store whose every call fails
#[derive(Default)]
pub struct FailingKeyStore {
    reads: AtomicUsize,
}

impl FailingKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyStore for FailingKeyStore {
    async fn get(&self, _path: &str) -> KeyringResult<Option<PublicKeyRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(KeyringError::StoreUnavailable("store is down".to_string()))
    }

    async fn set(&self, _path: &str, _record: &PublicKeyRecord) -> KeyringResult<()> {
        Err(KeyringError::StoreUnavailable("store is down".to_string()))
    }

    async fn delete(&self, _path: &str) -> KeyringResult<()> {
        Err(KeyringError::StoreUnavailable("store is down".to_string()))
    }
}

/// Memory store whose writes park until released
#[derive(Default)]
pub struct GatedKeyStore {
    inner: MemoryKeyStore,
    entered: Notify,
    release: Notify,
}

impl GatedKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until a `set` call is parked
    pub async fn wait_for_write(&self) {
        self.entered.notified().await;
    }

    /// Let the parked `set` call finish
    pub fn release_write(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl KeyStore for GatedKeyStore {
    async fn get(&self, path: &str) -> KeyringResult<Option<PublicKeyRecord>> {
        self.inner.get(path).await
    }

    async fn set(&self, path: &str, record: &PublicKeyRecord) -> KeyringResult<()> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.set(path, record).await
    }

    async fn delete(&self, path: &str) -> KeyringResult<()> {
        self.inner.delete(path).await
    }
}
