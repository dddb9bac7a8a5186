//! sm2-certgen: SM2 test certificates for GM/T TLS stacks
//!
//! This library builds a small certificate chain using the SM2 signature
//! scheme with the SM3 digest:
//!
//! - A self-signed certificate authority
//! - A server signing certificate and a separate server encryption
//!   certificate (the SM2 "double certificate" pair)
//! - A client signing certificate
//!
//! Keys are written as `EC PARAMETERS` + `EC PRIVATE KEY` PEM (or PKCS#8 on
//! request) and certificates as `CERTIFICATE` PEM.
//!
//! # Example
//!
//! ```rust,no_run
//! use sm2_certgen::cert::ca::issue_ca;
//! use sm2_certgen::cert::entity::{issue_leaf, LeafRole};
//! use sm2_certgen::error::Result;
//!
//! fn example() -> Result<()> {
//!     let ca = issue_ca(None)?;
//!     let leaf = issue_leaf(LeafRole::ServerEncryption, &ca.keypair, &ca.certificate)?;
//!     println!("Issued leaf with serial {}", leaf.serial_hex());
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod crypto;
pub mod error;
pub mod generator;
pub mod storage;

// Re-export commonly used types
pub use error::{CertGenError, Result};
pub use generator::{generate, GeneratedChain, GeneratorConfig};
