/// PEM/X.509 parsing for enrollment requests and the frontend certificate
use crate::error::{KeyringError, KeyringResult};
use x509_parser::oid_registry::Oid;
use x509_parser::prelude::*;

const CSR_TAGS: &[&str] = &["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];
const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// The parts of a CSR enrollment cares about
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    /// Subject common name, if the CSR carries one
    pub common_name: Option<String>,
    /// SubjectPublicKeyInfo algorithm OID
    pub public_key_algorithm: Oid<'static>,
    /// DER-encoded SubjectPublicKeyInfo
    pub public_key_der: Vec<u8>,
}

/// Parse a PEM-encoded PKCS#10 certificate signing request
pub fn parse_csr_pem(pem_bytes: &[u8]) -> KeyringResult<CertificateRequest> {
    let block = ::pem::parse(pem_bytes)
        .map_err(|e| KeyringError::MalformedRequest(format!("Invalid CSR PEM: {}", e)))?;

    if !CSR_TAGS.contains(&block.tag()) {
        return Err(KeyringError::MalformedRequest(format!(
            "Expected a certificate request, found {}",
            block.tag()
        )));
    }

    let (_, csr) = X509CertificationRequest::from_der(block.contents())
        .map_err(|e| KeyringError::MalformedRequest(format!("Invalid CSR: {}", e)))?;

    let info = &csr.certification_request_info;
    let common_name = first_common_name(&info.subject)?;

    Ok(CertificateRequest {
        common_name,
        public_key_algorithm: info.subject_pki.algorithm.algorithm.to_owned(),
        public_key_der: info.subject_pki.raw.to_vec(),
    })
}

/// Summary of the frontend's own certificate
#[derive(Debug, Clone)]
pub struct ServerCertificate {
    pub subject_name: String,
    pub pem: String,
}

/// Parse the frontend certificate and extract its subject name
pub fn parse_certificate_pem(pem_text: &str) -> KeyringResult<ServerCertificate> {
    let block = ::pem::parse(pem_text)
        .map_err(|e| KeyringError::MalformedRequest(format!("Invalid certificate PEM: {}", e)))?;

    if block.tag() != CERTIFICATE_TAG {
        return Err(KeyringError::MalformedRequest(format!(
            "Expected a certificate, found {}",
            block.tag()
        )));
    }

    let (_, cert) = X509Certificate::from_der(block.contents())
        .map_err(|e| KeyringError::MalformedRequest(format!("Invalid certificate: {}", e)))?;

    let subject_name = first_common_name(cert.subject())?.ok_or_else(|| {
        KeyringError::MalformedRequest("Certificate subject has no common name".to_string())
    })?;

    Ok(ServerCertificate {
        subject_name,
        pem: pem_text.to_string(),
    })
}

fn first_common_name(name: &X509Name<'_>) -> KeyringResult<Option<String>> {
    match name.iter_common_name().next() {
        Some(attr) => attr
            .as_str()
            .map(|cn| Some(cn.to_string()))
            .map_err(|e| KeyringError::MalformedRequest(format!("Invalid common name: {}", e))),
        None => Ok(None),
    }
}
