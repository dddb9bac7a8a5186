//! Cryptographic operations module.
//!
//! SM2 key generation, SM2-with-SM3 signing and private key DER containers.
//!
//! # Example
//!
//! ```rust
//! use sm2_certgen::crypto::keypair::generate_sm2_keypair;
//!
//! # fn example() -> sm2_certgen::error::Result<()> {
//! let keypair = generate_sm2_keypair()?;
//! let signature = keypair.sign(b"tbs bytes")?;
//! keypair.verify(b"tbs bytes", &signature)?;
//! # Ok(())
//! # }
//! ```

pub mod keypair;
