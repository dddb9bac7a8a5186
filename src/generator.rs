//! End-to-end generation run.
//!
//! Issues the CA, then the server signing, server encryption and client
//! signing leaves, writing each key and certificate as soon as it exists.
//! The first error stops the run; files already written stay on disk.

use crate::cert::ca::issue_ca;
use crate::cert::entity::{issue_leaf, LeafRole};
use crate::cert::x509_signing::IssuedCertificate;
use crate::error::Result;
use crate::storage::pem_files::{persist_certificate, persist_key, KeyFormat};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// File name stem of the CA key and certificate.
pub const CA_FILE_STEM: &str = "sm2_ca";

/// Settings for one generation run.
#[derive(Debug, Clone, Default)]
pub struct GeneratorConfig {
    /// Directory for the output files; an empty path means the current directory.
    pub out_dir: PathBuf,
    pub key_format: KeyFormat,
    /// Optional CN for the CA subject.
    pub common_name: Option<String>,
}

/// Everything issued by one run.
#[derive(Debug)]
pub struct GeneratedChain {
    pub ca: IssuedCertificate,
    pub leaves: Vec<(LeafRole, IssuedCertificate)>,
}

impl GeneratedChain {
    /// The leaf issued for `role`.
    pub fn leaf(&self, role: LeafRole) -> Option<&IssuedCertificate> {
        self.leaves
            .iter()
            .find(|(leaf_role, _)| *leaf_role == role)
            .map(|(_, issued)| issued)
    }
}

/// Path of the `.key` file for a stem.
pub fn key_path(out_dir: &Path, stem: &str) -> PathBuf {
    out_dir.join(format!("{}.key", stem))
}

/// Path of the `.crt` file for a stem.
pub fn cert_path(out_dir: &Path, stem: &str) -> PathBuf {
    out_dir.join(format!("{}.crt", stem))
}

/// Run the full generation: CA first, then the three leaves.
///
/// # Example
///
/// ```rust,no_run
/// use sm2_certgen::generator::{generate, GeneratorConfig};
///
/// # fn example() -> sm2_certgen::error::Result<()> {
/// let chain = generate(&GeneratorConfig::default())?;
/// assert_eq!(chain.leaves.len(), 3);
/// # Ok(())
/// # }
/// ```
pub fn generate(config: &GeneratorConfig) -> Result<GeneratedChain> {
    let out_dir = config.out_dir.as_path();
    if !out_dir.as_os_str().is_empty() {
        fs::create_dir_all(out_dir)?;
    }

    info!("generating sm2 ca");
    let ca = issue_ca(config.common_name.as_deref())?;
    write_pair(out_dir, CA_FILE_STEM, &ca, config.key_format)?;

    let mut leaves = Vec::with_capacity(LeafRole::ALL.len());
    for role in LeafRole::ALL {
        match role {
            LeafRole::ServerSigning => info!("generating server sm2 double certs"),
            LeafRole::ClientSigning => info!("generating client sm2 double certs"),
            LeafRole::ServerEncryption => {}
        }

        let leaf = issue_leaf(role, &ca.keypair, &ca.certificate)?;
        write_pair(out_dir, role.file_stem(), &leaf, config.key_format)?;
        leaves.push((role, leaf));
    }

    Ok(GeneratedChain { ca, leaves })
}

fn write_pair(
    out_dir: &Path,
    stem: &str,
    issued: &IssuedCertificate,
    key_format: KeyFormat,
) -> Result<()> {
    let key_file = key_path(out_dir, stem);
    let cert_file = cert_path(out_dir, stem);

    persist_key(&key_file, &issued.keypair, key_format)?;
    persist_certificate(&cert_file, &issued.der)?;

    info!(
        "wrote {} and {} (serial {})",
        key_file.display(),
        cert_file.display(),
        issued.serial_hex()
    );
    Ok(())
}
