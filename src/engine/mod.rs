/// Message signing engine
///
/// Signs outbound messages with the frontend's private key and verifies
/// inbound messages against the sender's enrolled key. Sender lookup goes
/// through the resolver, so an unenrolled or negatively cached sender is
/// rejected before any signature work happens.
use crate::{
    error::{KeyringError, KeyringResult},
    identity::PublicKeyResolver,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use jsonwebtoken::{crypto, Algorithm, DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const SIGNATURE_ALGORITHM: Algorithm = Algorithm::RS256;

/// A payload with its routing and the source's signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub source: String,
    pub destination: String,
    /// Base64 (standard alphabet) payload bytes
    pub payload: String,
    /// Base64url RS256 signature over the signing input
    pub signature: String,
}

impl SignedMessage {
    fn signing_input(source: &str, destination: &str, payload: &str) -> String {
        format!("{}\n{}\n{}", source, destination, payload)
    }
}

/// An inbound message whose signature checked out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedMessage {
    pub source: String,
    pub destination: String,
    #[serde(serialize_with = "serialize_base64")]
    pub payload: Vec<u8>,
}

fn serialize_base64<S>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&STANDARD.encode(bytes))
}

/// Signing and verification bound to one server identity
pub struct CryptoEngine {
    server_name: String,
    private_key: EncodingKey,
    resolver: Arc<dyn PublicKeyResolver>,
}

impl CryptoEngine {
    /// Build an engine for `server_name`. A private key that does not parse
    /// is rejected here rather than on first use.
    pub fn new(
        server_name: impl Into<String>,
        private_key_pem: &str,
        resolver: Arc<dyn PublicKeyResolver>,
    ) -> KeyringResult<Self> {
        let private_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).map_err(|e| {
            KeyringError::ConfigurationMissing(format!("Invalid frontend private key: {}", e))
        })?;

        Ok(Self {
            server_name: server_name.into(),
            private_key,
            resolver,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Sign `payload` for delivery to `destination`
    pub fn sign(&self, destination: &str, payload: &[u8]) -> KeyringResult<SignedMessage> {
        let payload = STANDARD.encode(payload);
        let input = SignedMessage::signing_input(&self.server_name, destination, &payload);

        let signature = crypto::sign(input.as_bytes(), &self.private_key, SIGNATURE_ALGORITHM)
            .map_err(|e| KeyringError::Internal(format!("Signing failed: {}", e)))?;

        Ok(SignedMessage {
            source: self.server_name.clone(),
            destination: destination.to_string(),
            payload,
            signature,
        })
    }

    /// Check `message` against its sender's enrolled key
    pub async fn verify(&self, message: &SignedMessage) -> KeyringResult<VerifiedMessage> {
        let key = self
            .resolver
            .get_public_key(&message.source)
            .await
            .ok_or_else(|| KeyringError::UnknownSender(message.source.clone()))?;

        let decoding_key = DecodingKey::from_rsa_pem(key.to_pem().as_bytes()).map_err(|e| {
            KeyringError::Internal(format!("Unusable key for {}: {}", message.source, e))
        })?;

        let input =
            SignedMessage::signing_input(&message.source, &message.destination, &message.payload);
        let valid = crypto::verify(
            &message.signature,
            input.as_bytes(),
            &decoding_key,
            SIGNATURE_ALGORITHM,
        )
        .unwrap_or(false);

        if !valid {
            debug!("Signature from {} did not verify", message.source);
            return Err(KeyringError::InvalidSignature(message.source.clone()));
        }

        let payload = STANDARD
            .decode(&message.payload)
            .map_err(|e| KeyringError::Validation(format!("Payload is not base64: {}", e)))?;

        Ok(VerifiedMessage {
            source: message.source.clone(),
            destination: message.destination.clone(),
            payload,
        })
    }
}
