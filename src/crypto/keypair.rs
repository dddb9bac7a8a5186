//! SM2 key operations.
//!
//! This module provides generation, signing and DER export/import for SM2
//! key pairs. Signatures are computed over `SM3(Z_A || message)` where `Z_A`
//! is derived from the default distinguishing identifier.

use crate::error::{CertGenError, Result};
use const_oid::AssociatedOid;
use der::Encode;
use pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rand::rngs::OsRng;
use sec1::{EcParameters, EcPrivateKey};
use signature::{Signer, Verifier};
use sm2::dsa::{Signature, SigningKey, VerifyingKey};
use sm2::{PublicKey, SecretKey, Sm2};
use spki::EncodePublicKey;
use std::fmt;

/// Default SM2 distinguishing identifier (GM/T 0009).
pub const DEFAULT_DIST_ID: &str = "1234567812345678";

/// An SM2 keypair, held as its signing key.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Create a new keypair from a secret key.
    pub fn from_secret(secret: SecretKey) -> Result<Self> {
        let signing_key = SigningKey::new(DEFAULT_DIST_ID, &secret).map_err(|e| {
            CertGenError::KeyGenerationError(format!("Failed to derive signing key: {}", e))
        })?;
        Ok(Self { signing_key })
    }

    /// The public half of the keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(self.signing_key.verifying_key())
    }

    /// Get the public key as uncompressed SEC1 bytes.
    pub fn public_bytes(&self) -> Vec<u8> {
        self.public_key().to_sec1_bytes().into_vec()
    }

    fn secret_key(&self) -> SecretKey {
        SecretKey::from(self.signing_key.as_nonzero_scalar())
    }

    /// Sign a message with the default distinguishing identifier.
    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        self.signing_key
            .try_sign(message)
            .map_err(|e| CertGenError::CryptoError(format!("SM2 signing failed: {}", e)))
    }

    /// Verify a signature made by this keypair.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        verify_with_public_key(&self.public_key(), message, signature)
    }

    /// Encode the private key as a SEC1 `ECPrivateKey` (RFC 5915).
    ///
    /// The encoding carries the SM2 named-curve OID in `[0] parameters` and
    /// the uncompressed public key in `[1] publicKey`; OpenSSL refuses the
    /// key without the curve.
    pub fn to_sec1_der(&self) -> Result<Vec<u8>> {
        let private_key = self.secret_key().to_bytes();
        let public_key = self.public_bytes();

        let ec_private_key = EcPrivateKey {
            private_key: private_key.as_slice(),
            parameters: Some(EcParameters::NamedCurve(Sm2::OID)),
            public_key: Some(&public_key),
        };
        Ok(ec_private_key.to_der()?)
    }

    /// Encode the private key as a PKCS#8 `PrivateKeyInfo`.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let document = self.secret_key().to_pkcs8_der().map_err(|e| {
            CertGenError::InvalidKeyError(format!("Failed to encode PKCS#8 key: {}", e))
        })?;
        Ok(document.as_bytes().to_vec())
    }

    /// Encode the public key as a DER `SubjectPublicKeyInfo`.
    pub fn to_public_key_der(&self) -> Result<Vec<u8>> {
        let document = self.public_key().to_public_key_der().map_err(|e| {
            CertGenError::InvalidKeyError(format!("Failed to encode public key: {}", e))
        })?;
        Ok(document.as_bytes().to_vec())
    }

    /// Import a keypair from a SEC1 `ECPrivateKey`.
    pub fn from_sec1_der(bytes: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_sec1_der(bytes).map_err(|e| {
            CertGenError::InvalidKeyError(format!("Invalid SEC1 private key: {}", e))
        })?;
        Self::from_secret(secret)
    }

    /// Import a keypair from a PKCS#8 `PrivateKeyInfo`.
    pub fn from_pkcs8_der(bytes: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_pkcs8_der(bytes).map_err(|e| {
            CertGenError::InvalidKeyError(format!("Invalid PKCS#8 private key: {}", e))
        })?;
        Self::from_secret(secret)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public_bytes()))
            .finish_non_exhaustive()
    }
}

/// Generate a new SM2 keypair from the operating system's random source.
///
/// # Example
///
/// ```
/// use sm2_certgen::crypto::keypair::generate_sm2_keypair;
///
/// let keypair = generate_sm2_keypair().unwrap();
/// assert_eq!(keypair.public_bytes().len(), 65);
/// ```
pub fn generate_sm2_keypair() -> Result<Keypair> {
    let secret = SecretKey::random(&mut OsRng);
    Keypair::from_secret(secret)
}

/// Verify an SM2 signature against a public key.
pub fn verify_with_public_key(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<()> {
    let verifying_key = VerifyingKey::new(DEFAULT_DIST_ID, public_key.clone()).map_err(|e| {
        CertGenError::InvalidKeyError(format!("Invalid SM2 public key: {}", e))
    })?;

    verifying_key
        .verify(message, signature)
        .map_err(|e| CertGenError::CryptoError(format!("Signature verification failed: {}", e)))
}
