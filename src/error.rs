//! Error types for the certificate generator.
//!
//! Every failure in a generation run maps to one of these variants. None of
//! them are recovered from: they propagate to `main` and end the process.

use thiserror::Error;

/// The main error type for certificate generation.
///
/// Covers randomness and key-generation failures, certificate construction
/// and encoding failures, and filesystem errors while writing PEM files.
#[derive(Error, Debug)]
pub enum CertGenError {
    /// Signing, signature verification or randomness failure
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Key generation or key import failed
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Invalid key format or content
    #[error("Invalid key: {0}")]
    InvalidKeyError(String),

    /// Certificate template or certificate construction error
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// ASN.1 DER encoding or decoding failed
    #[error("DER encoding error: {0}")]
    EncodingError(#[from] der::Error),

    /// PEM encoding/decoding error
    #[error("PEM error: {0}")]
    PemError(String),

    /// Storage I/O error
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),
}

/// A specialized Result type for certificate generation.
pub type Result<T> = std::result::Result<T, CertGenError>;
