/// Enrollment - admit a client by pinning the key from its CSR
///
/// Nothing is signed here. Clients generate their own key pair and the
/// client id is a hash of the public key, so the only check that matters
/// is that the CSR's common name is the id its key derives. A client cannot
/// claim an id that does not hash from the key it presents.
use crate::{
    crypto::{parse_csr_pem, ClientPublicKey, KeyScheme},
    error::{KeyringError, KeyringResult},
    identity::{client_id_for_org, PublicKeyResolver},
    metrics,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Validates CSRs and binds their keys through the resolver
pub struct EnrollmentHandler {
    resolver: Arc<dyn PublicKeyResolver>,
    org_id: Option<String>,
}

impl EnrollmentHandler {
    pub fn new(resolver: Arc<dyn PublicKeyResolver>, org_id: Option<String>) -> Self {
        Self { resolver, org_id }
    }

    /// Enroll the client described by `csr_pem` and return its client id
    pub async fn add_certificate_request(&self, csr_pem: &[u8]) -> KeyringResult<String> {
        let result = self.enroll(csr_pem).await;

        match &result {
            Ok(client_id) => {
                metrics::record_enrollment("success");
                info!("Enrolled client {}", client_id);
            }
            Err(e) => {
                metrics::record_enrollment(outcome_label(e));
                warn!("Rejected enrollment: {}", e);
            }
        }

        result
    }

    async fn enroll(&self, csr_pem: &[u8]) -> KeyringResult<String> {
        let csr = parse_csr_pem(csr_pem)?;

        if KeyScheme::from_algorithm(&csr.public_key_algorithm).is_none() {
            return Err(KeyringError::UnsupportedAlgorithm(
                csr.public_key_algorithm.to_id_string(),
            ));
        }

        let public_key = ClientPublicKey::from_spki_der(&csr.public_key_der)?;
        let expected = public_key.client_id();

        let common_name = csr.common_name.unwrap_or_default();
        if common_name != expected {
            return Err(KeyringError::IdentityMismatch {
                claimed: common_name,
                expected,
            });
        }

        let client_id = client_id_for_org(&common_name, self.org_id.as_deref());
        self.resolver.set_public_key(&client_id, &public_key).await?;

        Ok(client_id)
    }
}

fn outcome_label(e: &KeyringError) -> &'static str {
    match e {
        KeyringError::MalformedRequest(_) => "malformed_request",
        KeyringError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
        KeyringError::IdentityMismatch { .. } => "identity_mismatch",
        KeyringError::StoreUnavailable(_) => "store_unavailable",
        _ => "error",
    }
}
