//! PEM output for keys and certificates.
//!
//! Private keys are written owner-only (0600), certificates world-readable
//! (0644). PEM text always uses LF line endings and 64-column base64.

use crate::crypto::keypair::Keypair;
use crate::error::{CertGenError, Result};
use const_oid::AssociatedOid;
use der::Encode;
use pem::{EncodeConfig, LineEnding, Pem};
use std::fs;
use std::io::Write;
use std::path::Path;

/// PEM label for the named-curve parameters block.
pub const EC_PARAMETERS_TAG: &str = "EC PARAMETERS";
/// PEM label for a SEC1 private key.
pub const EC_PRIVATE_KEY_TAG: &str = "EC PRIVATE KEY";
/// PEM label for a PKCS#8 private key.
pub const PKCS8_PRIVATE_KEY_TAG: &str = "PRIVATE KEY";
/// PEM label for certificates.
pub const CERTIFICATE_TAG: &str = crate::cert::loader::CERTIFICATE_TAG;

/// Mode for private key files.
pub const KEY_FILE_MODE: u32 = 0o600;
/// Mode for certificate files.
pub const CERT_FILE_MODE: u32 = 0o644;

/// Container used for private key files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum KeyFormat {
    /// `EC PARAMETERS` followed by a SEC1 `EC PRIVATE KEY`.
    #[default]
    Ec,
    /// A single PKCS#8 `PRIVATE KEY` block.
    Pkcs8,
}

/// Encode PEM blocks back to back, as `openssl ecparam -genkey` does.
pub fn encode_pem_blocks(blocks: &[Pem]) -> String {
    blocks
        .iter()
        .map(|block| pem::encode_config(block, EncodeConfig::new().set_line_ending(LineEnding::LF)))
        .collect()
}

/// DER of the SM2 named-curve OID, the body of an `EC PARAMETERS` block.
pub fn sm2_ec_parameters() -> Result<Vec<u8>> {
    Ok(sm2::Sm2::OID.to_der()?)
}

/// Encode a private key in the requested container.
///
/// # Example
///
/// ```
/// use sm2_certgen::crypto::keypair::generate_sm2_keypair;
/// use sm2_certgen::storage::pem_files::{encode_private_key_pem, KeyFormat};
///
/// # fn example() -> sm2_certgen::error::Result<()> {
/// let keypair = generate_sm2_keypair()?;
/// let pem = encode_private_key_pem(&keypair, KeyFormat::Ec)?;
/// assert!(pem.starts_with("-----BEGIN EC PARAMETERS-----\nBggqgRzPVQGCLQ==\n"));
/// # Ok(())
/// # }
/// ```
pub fn encode_private_key_pem(keypair: &Keypair, format: KeyFormat) -> Result<String> {
    let blocks = match format {
        KeyFormat::Ec => vec![
            Pem::new(EC_PARAMETERS_TAG, sm2_ec_parameters()?),
            Pem::new(EC_PRIVATE_KEY_TAG, keypair.to_sec1_der()?),
        ],
        KeyFormat::Pkcs8 => vec![Pem::new(PKCS8_PRIVATE_KEY_TAG, keypair.to_pkcs8_der()?)],
    };

    Ok(encode_pem_blocks(&blocks))
}

/// Wrap certificate DER in a single `CERTIFICATE` block.
pub fn encode_certificate_pem(der: &[u8]) -> String {
    encode_pem_blocks(&[Pem::new(CERTIFICATE_TAG, der.to_vec())])
}

/// Decode a private key written in either container.
///
/// An `EC PARAMETERS` block, when present, must name the SM2 curve.
pub fn decode_private_key_pem(pem_str: &str) -> Result<Keypair> {
    let blocks = pem::parse_many(pem_str)
        .map_err(|e| CertGenError::PemError(format!("Failed to parse PEM: {}", e)))?;

    let mut keypair = None;
    for block in &blocks {
        match block.tag() {
            EC_PARAMETERS_TAG => {
                if block.contents() != sm2_ec_parameters()?.as_slice() {
                    return Err(CertGenError::InvalidKeyError(
                        "EC PARAMETERS does not name the SM2 curve".to_string(),
                    ));
                }
            }
            EC_PRIVATE_KEY_TAG => keypair = Some(Keypair::from_sec1_der(block.contents())?),
            PKCS8_PRIVATE_KEY_TAG => keypair = Some(Keypair::from_pkcs8_der(block.contents())?),
            other => {
                return Err(CertGenError::PemError(format!(
                    "Unexpected PEM block {} in key file",
                    other
                )))
            }
        }
    }

    keypair.ok_or_else(|| CertGenError::PemError("No private key found in PEM".to_string()))
}

/// Write a private key file with mode 0600.
pub fn persist_key(path: &Path, keypair: &Keypair, format: KeyFormat) -> Result<()> {
    let pem = encode_private_key_pem(keypair, format)?;
    write_with_mode(path, pem.as_bytes(), KEY_FILE_MODE)
}

/// Write a certificate file with mode 0644.
pub fn persist_certificate(path: &Path, der: &[u8]) -> Result<()> {
    let pem = encode_certificate_pem(der);
    write_with_mode(path, pem.as_bytes(), CERT_FILE_MODE)
}

/// Read a private key file written by [`persist_key`].
pub fn load_private_key(path: &Path) -> Result<Keypair> {
    let pem_str = fs::read_to_string(path)?;
    decode_private_key_pem(&pem_str)
}

fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options.open(path)?;

    // Creation modes are filtered by the umask and ignored for existing
    // files, so the mode is set on the handle before any bytes land.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    file.write_all(contents)?;

    Ok(())
}
