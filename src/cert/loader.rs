//! Certificate loading from PEM files.
//!
//! Decodes the `CERTIFICATE` blocks written by the generator back into
//! `x509_cert` structures, and pulls typed extensions out of them.

use crate::error::{CertGenError, Result};
use const_oid::AssociatedOid;
use der::Decode;
use std::fs;
use std::path::Path;
use x509_cert::certificate::Certificate;

/// PEM label for certificates.
pub const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Load a Certificate from PEM format.
///
/// # Example
///
/// ```rust,no_run
/// use sm2_certgen::cert::loader::cert_from_pem;
///
/// # fn example() -> sm2_certgen::error::Result<()> {
/// let pem = std::fs::read_to_string("sm2_ca.crt")?;
/// let cert = cert_from_pem(&pem)?;
/// println!("Issuer: {}", cert.tbs_certificate.issuer);
/// # Ok(())
/// # }
/// ```
pub fn cert_from_pem(pem_str: &str) -> Result<Certificate> {
    let pem = pem::parse(pem_str)
        .map_err(|e| CertGenError::PemError(format!("Failed to parse PEM: {}", e)))?;

    if pem.tag() != CERTIFICATE_TAG {
        return Err(CertGenError::PemError(format!(
            "Expected {}, got {}",
            CERTIFICATE_TAG,
            pem.tag()
        )));
    }

    cert_from_der(pem.contents())
}

/// Load a Certificate from DER bytes.
pub fn cert_from_der(der: &[u8]) -> Result<Certificate> {
    Certificate::from_der(der).map_err(|e| {
        CertGenError::CertificateError(format!("Failed to decode certificate: {}", e))
    })
}

/// Read and decode a PEM certificate file.
pub fn load_certificate_file(path: &Path) -> Result<Certificate> {
    let pem_str = fs::read_to_string(path)?;
    cert_from_pem(&pem_str)
}

/// Find and decode the extension of type `T`, if the certificate has one.
pub fn find_extension<T>(certificate: &Certificate) -> Result<Option<T>>
where
    T: AssociatedOid + for<'a> Decode<'a>,
{
    let Some(extensions) = &certificate.tbs_certificate.extensions else {
        return Ok(None);
    };

    match extensions.iter().find(|ext| ext.extn_id == T::OID) {
        Some(ext) => Ok(Some(T::from_der(ext.extn_value.as_bytes())?)),
        None => Ok(None),
    }
}
