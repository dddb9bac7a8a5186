//! Certificate generation module.
//!
//! This module builds an SM2 chain: a self-signed root and leaves signed by
//! it, all using the SM2-with-SM3 signature algorithm.

pub mod ca;
pub mod entity;
pub mod loader;
pub mod template;
pub mod x509_signing;
