//! sm2-certgen CLI application.
//!
//! Writes an SM2 CA plus server signing, server encryption and client
//! signing certificates. With no arguments the eight PEM files land in the
//! current directory.

use clap::Parser;
use env_logger::{Env, Target};
use log::info;
use sm2_certgen::error::Result;
use sm2_certgen::storage::pem_files::KeyFormat;
use sm2_certgen::{generate, GeneratorConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sm2-certgen")]
#[command(about = "Generate an SM2 test CA and SM2 double certificates", long_about = None)]
struct Cli {
    /// Output directory (created if missing)
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Private key container
    #[arg(long, value_enum, default_value = "ec")]
    key_format: KeyFormat,

    /// Common name for the CA subject
    #[arg(long)]
    common_name: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .init();

    let cli = Cli::parse();

    let config = GeneratorConfig {
        out_dir: cli.out_dir,
        key_format: cli.key_format,
        common_name: cli.common_name,
    };

    generate(&config)?;
    info!("done");

    Ok(())
}
