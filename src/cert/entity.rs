//! End-entity certificate operations.
//!
//! SM2 deployments issue two certificates per entity: one whose key only
//! signs and one whose key only encrypts or agrees keys. Each role below gets
//! its own freshly generated key pair, signed by the CA.

use crate::cert::template::CertificateTemplate;
use crate::cert::x509_signing::{key_identifier, sign_template, IssuedCertificate};
use crate::crypto::keypair::{generate_sm2_keypair, Keypair};
use crate::error::Result;
use flagset::FlagSet;
use log::debug;
use std::fmt;
use x509_cert::certificate::Certificate;
use x509_cert::ext::pkix::KeyUsages;

/// The three leaf certificates of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafRole {
    ServerSigning,
    ServerEncryption,
    ClientSigning,
}

impl LeafRole {
    /// All roles, in issuance order.
    pub const ALL: [LeafRole; 3] = [
        LeafRole::ServerSigning,
        LeafRole::ServerEncryption,
        LeafRole::ClientSigning,
    ];

    /// Key usage bits for the role.
    pub fn key_usage(self) -> FlagSet<KeyUsages> {
        match self {
            LeafRole::ServerSigning | LeafRole::ClientSigning => KeyUsages::DigitalSignature.into(),
            LeafRole::ServerEncryption => {
                KeyUsages::KeyEncipherment | KeyUsages::DataEncipherment | KeyUsages::KeyAgreement
            }
        }
    }

    /// File name stem shared by the role's `.key` and `.crt`.
    pub fn file_stem(self) -> &'static str {
        match self {
            LeafRole::ServerSigning => "sm2_server_sign",
            LeafRole::ServerEncryption => "sm2_server_enc",
            LeafRole::ClientSigning => "sm2_client_sign",
        }
    }
}

impl fmt::Display for LeafRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LeafRole::ServerSigning => "server signing",
            LeafRole::ServerEncryption => "server encryption",
            LeafRole::ClientSigning => "client signing",
        };
        f.write_str(label)
    }
}

/// Create a leaf certificate for `role`, signed by the CA.
///
/// # Arguments
///
/// * `role` - Which leaf to issue; selects the key usage
/// * `ca_keypair` - The CA's keypair (used for signing)
/// * `ca_cert` - The CA's certificate; its subject becomes the issuer
///
/// # Example
///
/// ```
/// use sm2_certgen::cert::ca::issue_ca;
/// use sm2_certgen::cert::entity::{issue_leaf, LeafRole};
///
/// # fn example() -> sm2_certgen::error::Result<()> {
/// let ca = issue_ca(None)?;
/// let leaf = issue_leaf(LeafRole::ServerSigning, &ca.keypair, &ca.certificate)?;
/// assert_eq!(
///     leaf.certificate.tbs_certificate.issuer,
///     ca.certificate.tbs_certificate.subject
/// );
/// # Ok(())
/// # }
/// ```
pub fn issue_leaf(
    role: LeafRole,
    ca_keypair: &Keypair,
    ca_cert: &Certificate,
) -> Result<IssuedCertificate> {
    let template = CertificateTemplate::leaf(role.key_usage())?;
    debug!(
        "{} template: serial {} valid {} to {}",
        role,
        template.serial_hex(),
        template.not_before,
        template.not_after
    );

    let keypair = generate_sm2_keypair()?;
    let ca_tbs = &ca_cert.tbs_certificate;
    let authority_key_id = key_identifier(&ca_tbs.subject_public_key_info);

    sign_template(
        &template,
        keypair,
        &ca_tbs.subject,
        ca_keypair,
        Some(&authority_key_id),
    )
}
