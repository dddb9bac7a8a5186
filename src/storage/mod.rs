//! Storage module for writing generated keys and certificates to disk.

pub mod pem_files;
