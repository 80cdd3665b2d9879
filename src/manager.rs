/// Server crypto manager - wires the identity subsystem together
///
/// Owns the resolver (and its negative cache), the enrollment handler and
/// the signing engine, and registers the invalidation listener on the
/// deletion queue. Everything it spawns runs on the caller's tracker and
/// stops with the caller's cancellation token.
use crate::{
    config::ServerConfig,
    crypto::{parse_certificate_pem, ServerCertificate},
    engine::{CryptoEngine, SignedMessage, VerifiedMessage},
    error::{KeyringError, KeyringResult},
    identity::{
        EnrollmentHandler, InvalidationListener, NegativeCache, NegativeCacheTtl,
        PublicKeyResolver, ServerPublicKeyResolver,
    },
    journal::{Journal, Subscription},
    store::KeyStore,
};
use std::sync::Arc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

/// Composition root for enrollment, resolution and message signing
pub struct ServerCryptoManager {
    certificate: ServerCertificate,
    resolver: Arc<dyn PublicKeyResolver>,
    enrollment: EnrollmentHandler,
    engine: CryptoEngine,
    listener: Subscription,
}

impl ServerCryptoManager {
    /// Build the manager from configuration.
    ///
    /// Fails with `ConfigurationMissing` when the frontend certificate or
    /// private key is absent or unusable.
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn KeyStore>,
        journal: Arc<dyn Journal>,
        tracker: &TaskTracker,
        cancel: &CancellationToken,
    ) -> KeyringResult<Self> {
        let frontend = config.frontend.as_ref().ok_or_else(|| {
            KeyringError::ConfigurationMissing(
                "Frontend certificate and private key are required".to_string(),
            )
        })?;

        let certificate = parse_certificate_pem(&frontend.certificate).map_err(|e| {
            KeyringError::ConfigurationMissing(format!("Invalid frontend certificate: {}", e))
        })?;

        let ttl = NegativeCacheTtl::from_seconds(config.defaults.unauthenticated_lru_timeout_sec);
        let negative_cache = NegativeCache::new(ttl).with_sweeper(tracker, cancel.child_token());
        let resolver: Arc<dyn PublicKeyResolver> =
            Arc::new(ServerPublicKeyResolver::new(negative_cache, store));

        let engine = CryptoEngine::new(
            certificate.subject_name.clone(),
            &frontend.private_key,
            resolver.clone(),
        )?;

        let enrollment =
            EnrollmentHandler::new(resolver.clone(), config.identity.org_id.clone());

        let listener = InvalidationListener::start(journal.as_ref(), resolver.clone(), tracker, cancel);

        info!(
            "Crypto manager ready for {} (negative cache: {:?})",
            certificate.subject_name, ttl
        );

        Ok(Self {
            certificate,
            resolver,
            enrollment,
            engine,
            listener,
        })
    }

    /// Enroll a client from a PEM CSR; returns the client id
    pub async fn add_certificate_request(&self, csr_pem: &[u8]) -> KeyringResult<String> {
        self.enrollment.add_certificate_request(csr_pem).await
    }

    pub fn sign(&self, destination: &str, payload: &[u8]) -> KeyringResult<SignedMessage> {
        self.engine.sign(destination, payload)
    }

    pub async fn verify(&self, message: &SignedMessage) -> KeyringResult<VerifiedMessage> {
        self.engine.verify(message).await
    }

    pub fn server_name(&self) -> &str {
        self.engine.server_name()
    }

    pub fn server_certificate_pem(&self) -> &str {
        &self.certificate.pem
    }

    pub fn resolver(&self) -> &Arc<dyn PublicKeyResolver> {
        &self.resolver
    }

    /// Stop listening for deletions. The sweep stops with the service token.
    pub fn stop(&self) {
        self.listener.cancel();
        self.resolver.clear();
    }
}
