/// Cryptography helpers: client key handling, client id derivation and
/// X.509 parsing for CSRs and the frontend certificate

pub mod keys;
pub mod x509;

pub use keys::{client_id_from_public_key, ClientPublicKey, KeyScheme, CLIENT_ID_PREFIX};
pub use x509::{parse_certificate_pem, parse_csr_pem, CertificateRequest, ServerCertificate};
