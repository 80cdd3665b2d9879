/// Endpoint Keyring - client identity for a fleet frontend
///
/// Clients enroll by posting a CSR whose common name is the hash of their
/// own public key; the frontend pins that key on first use and resolves it
/// for every later message, caching failed lookups briefly.

pub mod api;
pub mod config;
pub mod context;
pub mod crypto;
pub mod db;
pub mod engine;
pub mod error;
pub mod identity;
pub mod journal;
pub mod manager;
pub mod metrics;
pub mod rate_limit;
pub mod server;
pub mod store;

#[cfg(test)]
mod testutil;

pub use context::AppContext;
pub use error::{KeyringError, KeyringResult};
pub use manager::ServerCryptoManager;
