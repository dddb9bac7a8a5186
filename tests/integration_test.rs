//! Integration tests for sm2-certgen.
//!
//! These tests run the complete generator into a temporary directory and
//! check the written files.

use der::oid::ObjectIdentifier;
use der::Decode;
use sec1::EcPrivateKey;
use sm2_certgen::cert::entity::LeafRole;
use sm2_certgen::cert::loader::{find_extension, load_certificate_file};
use sm2_certgen::cert::template::{add_validity_years, from_x509_time};
use sm2_certgen::cert::x509_signing::{certificate_public_key, verify_certificate_signature};
use sm2_certgen::error::Result;
use sm2_certgen::generator::{cert_path, generate, key_path, GeneratorConfig, CA_FILE_STEM};
use sm2_certgen::storage::pem_files::{encode_pem_blocks, load_private_key, KeyFormat};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use x509_cert::certificate::Certificate;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage, SubjectAltName};

const ALL_STEMS: [&str; 4] = [CA_FILE_STEM, "sm2_server_sign", "sm2_server_enc", "sm2_client_sign"];

fn run_into(dir: &Path, key_format: KeyFormat) -> Result<()> {
    let config = GeneratorConfig {
        out_dir: dir.to_path_buf(),
        key_format,
        common_name: None,
    };
    generate(&config)?;
    Ok(())
}

fn load_all(dir: &Path) -> Result<Vec<Certificate>> {
    ALL_STEMS
        .iter()
        .map(|stem| load_certificate_file(&cert_path(dir, stem)))
        .collect()
}

#[test]
fn test_writes_all_eight_files() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;

    let mut names: Vec<String> = fs::read_dir(temp_dir.path())?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    names.sort();

    assert_eq!(
        names,
        vec![
            "sm2_ca.crt",
            "sm2_ca.key",
            "sm2_client_sign.crt",
            "sm2_client_sign.key",
            "sm2_server_enc.crt",
            "sm2_server_enc.key",
            "sm2_server_sign.crt",
            "sm2_server_sign.key",
        ]
    );

    Ok(())
}

#[cfg(unix)]
#[test]
fn test_file_permissions() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;

    for stem in ALL_STEMS {
        let key_mode = fs::metadata(key_path(temp_dir.path(), stem))?.permissions().mode() & 0o777;
        let cert_mode = fs::metadata(cert_path(temp_dir.path(), stem))?.permissions().mode() & 0o777;
        assert_eq!(key_mode, 0o600, "{}.key", stem);
        assert_eq!(cert_mode, 0o644, "{}.crt", stem);
    }

    Ok(())
}

#[test]
fn test_complete_chain_verifies() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;

    let certs = load_all(temp_dir.path())?;
    let ca = &certs[0];
    let ca_public = certificate_public_key(ca)?;

    // Self-signed root
    assert_eq!(ca.tbs_certificate.issuer, ca.tbs_certificate.subject);
    verify_certificate_signature(ca, &ca_public)?;

    // Every leaf is signed by the root, not by itself
    for leaf in &certs[1..] {
        assert_eq!(leaf.tbs_certificate.issuer, ca.tbs_certificate.subject);
        verify_certificate_signature(leaf, &ca_public)?;

        let own_public = certificate_public_key(leaf)?;
        assert!(verify_certificate_signature(leaf, &own_public).is_err());
    }

    Ok(())
}

#[test]
fn test_key_files_match_certificates() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;

    for stem in ALL_STEMS {
        let keypair = load_private_key(&key_path(temp_dir.path(), stem))?;
        let cert = load_certificate_file(&cert_path(temp_dir.path(), stem))?;
        assert_eq!(keypair.public_key(), certificate_public_key(&cert)?, "{}", stem);
    }

    Ok(())
}

#[test]
fn test_basic_constraints() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;

    let certs = load_all(temp_dir.path())?;

    let ca_constraints: Option<BasicConstraints> = find_extension(&certs[0])?;
    assert!(ca_constraints.map_or(false, |bc| bc.ca));

    for leaf in &certs[1..] {
        let constraints: Option<BasicConstraints> = find_extension(leaf)?;
        assert!(constraints.map_or(true, |bc| !bc.ca));
    }

    Ok(())
}

#[test]
fn test_validity_is_ten_calendar_years() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;

    for cert in load_all(temp_dir.path())? {
        let validity = &cert.tbs_certificate.validity;
        let not_before = from_x509_time(&validity.not_before)?;
        let not_after = from_x509_time(&validity.not_after)?;
        assert_eq!(not_after, add_validity_years(not_before)?);
    }

    Ok(())
}

#[test]
fn test_leaf_subject_alt_names() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;

    let certs = load_all(temp_dir.path())?;

    let ca_san: Option<SubjectAltName> = find_extension(&certs[0])?;
    assert!(ca_san.is_none());

    for leaf in &certs[1..] {
        let san: SubjectAltName = find_extension(leaf)?.expect("leaf has SAN");
        let rendered: Vec<String> = san
            .0
            .iter()
            .map(|name| match name {
                GeneralName::DnsName(dns) => dns.to_string(),
                GeneralName::IpAddress(ip) => match ip.as_bytes().len() {
                    4 => {
                        let octets: [u8; 4] = ip.as_bytes().try_into().unwrap();
                        std::net::Ipv4Addr::from(octets).to_string()
                    }
                    16 => {
                        let octets: [u8; 16] = ip.as_bytes().try_into().unwrap();
                        std::net::Ipv6Addr::from(octets).to_string()
                    }
                    n => panic!("unexpected IP length {}", n),
                },
                other => panic!("unexpected SAN {:?}", other),
            })
            .collect();

        assert_eq!(rendered, vec!["localhost", "127.0.0.1", "::1"]);
    }

    Ok(())
}

#[test]
fn test_extended_key_usage() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;

    for cert in load_all(temp_dir.path())? {
        let eku: ExtendedKeyUsage = find_extension(&cert)?.expect("EKU present");
        assert_eq!(
            eku.0,
            vec![
                const_oid::db::rfc5280::ID_KP_CLIENT_AUTH,
                const_oid::db::rfc5280::ID_KP_SERVER_AUTH
            ]
        );
    }

    Ok(())
}

#[test]
fn test_serial_numbers_distinct() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;

    let serials: HashSet<Vec<u8>> = load_all(temp_dir.path())?
        .iter()
        .map(|cert| cert.tbs_certificate.serial_number.as_bytes().to_vec())
        .collect();
    assert_eq!(serials.len(), 4);

    Ok(())
}

#[test]
fn test_key_file_pem_roundtrip() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;

    for stem in ALL_STEMS {
        let original = fs::read_to_string(key_path(temp_dir.path(), stem))?;
        let blocks = pem::parse_many(&original).unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].tag(), "EC PARAMETERS");
        assert_eq!(blocks[1].tag(), "EC PRIVATE KEY");
        assert_eq!(encode_pem_blocks(&blocks), original);
    }

    Ok(())
}

#[test]
fn test_ec_private_key_is_self_describing() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;

    let sm2_curve = ObjectIdentifier::new_unwrap("1.2.156.10197.1.301");

    for stem in ALL_STEMS {
        let original = fs::read_to_string(key_path(temp_dir.path(), stem))?;
        let blocks = pem::parse_many(&original).unwrap();
        let key = EcPrivateKey::from_der(blocks[1].contents())?;

        let cert = load_certificate_file(&cert_path(temp_dir.path(), stem))?;
        let cert_point = cert
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .raw_bytes();

        assert_eq!(key.private_key.len(), 32, "{}", stem);
        assert_eq!(key.parameters.and_then(|p| p.named_curve()), Some(sm2_curve), "{}", stem);
        assert_eq!(key.public_key, Some(cert_point), "{}", stem);
    }

    Ok(())
}

#[test]
fn test_pkcs8_key_format() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Pkcs8)?;

    for stem in ALL_STEMS {
        let original = fs::read_to_string(key_path(temp_dir.path(), stem))?;
        let blocks = pem::parse_many(&original).unwrap();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].tag(), "PRIVATE KEY");
        assert_eq!(encode_pem_blocks(&blocks), original);

        let keypair = load_private_key(&key_path(temp_dir.path(), stem))?;
        let cert = load_certificate_file(&cert_path(temp_dir.path(), stem))?;
        assert_eq!(keypair.public_key(), certificate_public_key(&cert)?);
    }

    Ok(())
}

#[test]
fn test_two_runs_differ() -> Result<()> {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    run_into(first.path(), KeyFormat::Ec)?;
    run_into(second.path(), KeyFormat::Ec)?;

    for stem in ALL_STEMS {
        assert_ne!(
            fs::read(key_path(first.path(), stem))?,
            fs::read(key_path(second.path(), stem))?
        );

        let a = load_certificate_file(&cert_path(first.path(), stem))?;
        let b = load_certificate_file(&cert_path(second.path(), stem))?;
        assert_ne!(a.tbs_certificate.serial_number, b.tbs_certificate.serial_number);
        assert_ne!(
            a.tbs_certificate.subject_public_key_info,
            b.tbs_certificate.subject_public_key_info
        );
    }

    Ok(())
}

#[test]
fn test_rerun_overwrites_previous_output() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    run_into(temp_dir.path(), KeyFormat::Ec)?;
    let before = fs::read(cert_path(temp_dir.path(), CA_FILE_STEM))?;

    run_into(temp_dir.path(), KeyFormat::Ec)?;
    let after = fs::read(cert_path(temp_dir.path(), CA_FILE_STEM))?;

    assert_ne!(before, after);
    let ca = load_certificate_file(&cert_path(temp_dir.path(), CA_FILE_STEM))?;
    let leaf = load_certificate_file(&cert_path(
        temp_dir.path(),
        LeafRole::ServerEncryption.file_stem(),
    ))?;
    verify_certificate_signature(&leaf, &certificate_public_key(&ca)?)?;

    Ok(())
}
