/// Client public keys and client id derivation
///
/// A client id is a pure function of the client's public key, so a CSR can
/// be checked for impersonation without any authority signing anything.
use crate::error::{KeyringError, KeyringResult};
use ::pem::{EncodeConfig, LineEnding, Pem};
use sha2::{Digest, Sha256};
use x509_parser::oid_registry::{Oid, OID_PKCS1_RSAENCRYPTION};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

/// Prefix shared by every client id
pub const CLIENT_ID_PREFIX: &str = "C.";

/// Number of digest bytes kept in a client id
const CLIENT_ID_DIGEST_BYTES: usize = 8;

/// PEM tag used for persisted keys (SubjectPublicKeyInfo)
const PUBLIC_KEY_TAG: &str = "PUBLIC KEY";

/// Asymmetric schemes a client may enroll with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyScheme {
    Rsa,
}

impl KeyScheme {
    /// Every scheme the enrollment path accepts
    pub const SUPPORTED: &'static [KeyScheme] = &[KeyScheme::Rsa];

    /// Look up the scheme for a SubjectPublicKeyInfo algorithm OID
    pub fn from_algorithm(oid: &Oid<'_>) -> Option<Self> {
        Self::SUPPORTED
            .iter()
            .copied()
            .find(|scheme| scheme.algorithm() == *oid)
    }

    pub fn algorithm(&self) -> Oid<'static> {
        match self {
            KeyScheme::Rsa => OID_PKCS1_RSAENCRYPTION,
        }
    }
}

/// A client's public key as presented at enrollment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPublicKey {
    scheme: KeyScheme,
    /// DER-encoded SubjectPublicKeyInfo
    spki_der: Vec<u8>,
    /// Scheme-specific material the client id is derived from.
    /// For RSA this is the modulus as minimal big-endian bytes.
    id_material: Vec<u8>,
}

impl ClientPublicKey {
    /// Decode a DER SubjectPublicKeyInfo
    pub fn from_spki_der(der: &[u8]) -> KeyringResult<Self> {
        let (_, spki) = SubjectPublicKeyInfo::from_der(der).map_err(|e| {
            KeyringError::MalformedRequest(format!("Invalid public key info: {}", e))
        })?;

        let scheme = KeyScheme::from_algorithm(&spki.algorithm.algorithm).ok_or_else(|| {
            KeyringError::UnsupportedAlgorithm(spki.algorithm.algorithm.to_id_string())
        })?;

        let parsed = spki
            .parsed()
            .map_err(|e| KeyringError::MalformedRequest(format!("Invalid public key: {}", e)))?;

        let id_material = match (scheme, parsed) {
            (KeyScheme::Rsa, PublicKey::RSA(rsa)) => strip_leading_zeros(rsa.modulus).to_vec(),
            (KeyScheme::Rsa, _) => {
                return Err(KeyringError::MalformedRequest(
                    "RSA algorithm identifier with non-RSA key".to_string(),
                ))
            }
        };

        if id_material.is_empty() {
            return Err(KeyringError::MalformedRequest(
                "Public key has an empty modulus".to_string(),
            ));
        }

        Ok(Self {
            scheme,
            spki_der: spki.raw.to_vec(),
            id_material,
        })
    }

    /// Decode a `PUBLIC KEY` PEM block
    pub fn from_pem(pem_text: &str) -> KeyringResult<Self> {
        let block = ::pem::parse(pem_text)
            .map_err(|e| KeyringError::MalformedRequest(format!("Invalid PEM: {}", e)))?;

        if block.tag() != PUBLIC_KEY_TAG {
            return Err(KeyringError::MalformedRequest(format!(
                "Expected {} PEM block, found {}",
                PUBLIC_KEY_TAG,
                block.tag()
            )));
        }

        Self::from_spki_der(block.contents())
    }

    /// Encode as a `PUBLIC KEY` PEM block
    pub fn to_pem(&self) -> String {
        let block = Pem::new(PUBLIC_KEY_TAG, self.spki_der.clone());
        ::pem::encode_config(&block, EncodeConfig::new().set_line_ending(LineEnding::LF))
    }

    pub fn scheme(&self) -> KeyScheme {
        self.scheme
    }

    /// The client id this key hashes to
    pub fn client_id(&self) -> String {
        client_id_from_public_key(self)
    }
}

/// Derive the client id for a public key.
///
/// `C.` followed by the hex of the first 8 bytes of SHA-256 over the
/// scheme's identifying material.
pub fn client_id_from_public_key(key: &ClientPublicKey) -> String {
    let digest = Sha256::digest(&key.id_material);
    format!(
        "{}{}",
        CLIENT_ID_PREFIX,
        hex::encode(&digest[..CLIENT_ID_DIGEST_BYTES])
    )
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
