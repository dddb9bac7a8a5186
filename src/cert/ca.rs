//! Root CA certificate operations.
//!
//! This module creates the self-signed SM2 certificate authority that signs
//! every leaf of a run.

use crate::cert::template::CertificateTemplate;
use crate::cert::x509_signing::{sign_template, IssuedCertificate};
use crate::crypto::keypair::generate_sm2_keypair;
use crate::error::Result;
use log::debug;

/// Create a self-signed Root CA certificate with a fresh SM2 key.
///
/// The CA carries `digitalSignature | keyCertSign`, client and server auth,
/// a critical `cA = true` basic constraint and a ten-year validity.
///
/// # Example
///
/// ```
/// use sm2_certgen::cert::ca::issue_ca;
///
/// # fn example() -> sm2_certgen::error::Result<()> {
/// let ca = issue_ca(None)?;
/// assert!(!ca.der.is_empty());
/// # Ok(())
/// # }
/// ```
pub fn issue_ca(common_name: Option<&str>) -> Result<IssuedCertificate> {
    let template = CertificateTemplate::ca(common_name)?;
    debug!(
        "CA template: serial {} subject {} valid {} to {}",
        template.serial_hex(),
        template.subject,
        template.not_before,
        template.not_after
    );

    let keypair = generate_sm2_keypair()?;

    // Self-signed: issuer is the template's own subject.
    sign_template(&template, keypair.clone(), &template.subject, &keypair, None)
}
