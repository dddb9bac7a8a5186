//! X.509 certificate signing with SM2-with-SM3.
//!
//! This module turns a [`CertificateTemplate`] plus a subject key and an
//! issuer identity into a signed certificate. The CA passes its own name and
//! key (self-signed); leaves pass the CA's subject and key.

use crate::cert::template::CertificateTemplate;
use crate::crypto::keypair::{verify_with_public_key, Keypair};
use crate::error::{CertGenError, Result};
use const_oid::AssociatedOid;
use der::asn1::{BitString, Ia5String, OctetString, UintRef};
use der::oid::ObjectIdentifier;
use der::{Decode, Encode, Sequence};
use sm2::dsa::Signature;
use sm2::PublicKey;
use sm3::{Digest, Sm3};
use spki::{AlgorithmIdentifierOwned, DecodePublicKey, SubjectPublicKeyInfoOwned};
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName,
    SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::name::Name;

/// `SM2-with-SM3` signature algorithm (GM/T 0006).
pub const SM2_WITH_SM3: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.501");

/// Key identifiers are the leftmost 160 bits of the SM3 digest.
const KEY_IDENTIFIER_LEN: usize = 20;

/// SM2 scalars are 32 bytes.
const SCALAR_LEN: usize = 32;

/// A freshly issued certificate together with the key it certifies.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub keypair: Keypair,
    pub certificate: Certificate,
    /// DER encoding of `certificate`.
    pub der: Vec<u8>,
}

impl IssuedCertificate {
    /// Serial number as lowercase hex.
    pub fn serial_hex(&self) -> String {
        hex::encode(self.certificate.tbs_certificate.serial_number.as_bytes())
    }
}

/// DER body of an SM2 signature value.
#[derive(Sequence)]
struct Sm2SignatureValue<'a> {
    r: UintRef<'a>,
    s: UintRef<'a>,
}

/// Sign `template` for `subject_keypair` with the issuer's key.
///
/// `authority_key_id` is the issuer's subject key identifier; pass `None`
/// for self-signed certificates. The signature is checked against the
/// issuer's public key before the certificate is returned.
///
/// # Example
///
/// ```
/// use sm2_certgen::cert::template::CertificateTemplate;
/// use sm2_certgen::cert::x509_signing::sign_template;
/// use sm2_certgen::crypto::keypair::generate_sm2_keypair;
///
/// # fn example() -> sm2_certgen::error::Result<()> {
/// let keypair = generate_sm2_keypair()?;
/// let template = CertificateTemplate::ca(None)?;
/// let issued = sign_template(&template, keypair.clone(), &template.subject, &keypair, None)?;
/// assert_eq!(
///     issued.certificate.tbs_certificate.issuer,
///     issued.certificate.tbs_certificate.subject
/// );
/// # Ok(())
/// # }
/// ```
pub fn sign_template(
    template: &CertificateTemplate,
    subject_keypair: Keypair,
    issuer: &Name,
    issuer_keypair: &Keypair,
    authority_key_id: Option<&[u8]>,
) -> Result<IssuedCertificate> {
    let tbs = build_tbs_certificate(template, &subject_keypair, issuer, authority_key_id)?;

    // Sign with the issuer's key, not the subject's.
    let tbs_der = tbs.to_der()?;
    let signature = issuer_keypair.sign(&tbs_der)?;

    let certificate = Certificate {
        tbs_certificate: tbs,
        signature_algorithm: sm2_with_sm3_algorithm(),
        signature: encode_signature(&signature)?,
    };

    verify_certificate_signature(&certificate, &issuer_keypair.public_key())?;

    let der = certificate.to_der()?;
    Ok(IssuedCertificate {
        keypair: subject_keypair,
        certificate,
        der,
    })
}

/// Assemble the to-be-signed portion of a certificate.
pub fn build_tbs_certificate(
    template: &CertificateTemplate,
    subject_keypair: &Keypair,
    issuer: &Name,
    authority_key_id: Option<&[u8]>,
) -> Result<TbsCertificate> {
    let spki = create_subject_public_key_info(subject_keypair)?;
    let extensions = build_extensions(template, &spki, authority_key_id)?;

    Ok(TbsCertificate {
        version: Version::V3,
        serial_number: template.serial_number.clone(),
        signature: sm2_with_sm3_algorithm(),
        issuer: issuer.clone(),
        validity: template.validity()?,
        subject: template.subject.clone(),
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    })
}

/// Check a certificate's signature against an issuer public key.
pub fn verify_certificate_signature(
    certificate: &Certificate,
    issuer_public_key: &PublicKey,
) -> Result<()> {
    if certificate.signature_algorithm.oid != SM2_WITH_SM3 {
        return Err(CertGenError::CertificateError(format!(
            "Unexpected signature algorithm {}",
            certificate.signature_algorithm.oid
        )));
    }

    let tbs_der = certificate.tbs_certificate.to_der()?;
    let signature = decode_signature(&certificate.signature)?;
    verify_with_public_key(issuer_public_key, &tbs_der, &signature)
}

/// Extract the SM2 public key embedded in a certificate.
pub fn certificate_public_key(certificate: &Certificate) -> Result<PublicKey> {
    let spki_der = certificate.tbs_certificate.subject_public_key_info.to_der()?;
    PublicKey::from_public_key_der(&spki_der).map_err(|e| {
        CertGenError::InvalidKeyError(format!("Certificate does not carry an SM2 key: {}", e))
    })
}

/// Subject key identifier: SM3 over the subject public key bits, truncated
/// to 160 bits (RFC 7093 method 1).
pub fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    let digest = Sm3::digest(spki.subject_public_key.raw_bytes());
    digest[..KEY_IDENTIFIER_LEN].to_vec()
}

/// DER-encode an SM2 signature as `SEQUENCE { r INTEGER, s INTEGER }`.
pub fn encode_signature(signature: &Signature) -> Result<BitString> {
    let bytes = signature.to_bytes();
    let (r, s) = bytes.split_at(SCALAR_LEN);

    let value = Sm2SignatureValue {
        r: UintRef::new(r)?,
        s: UintRef::new(s)?,
    };

    Ok(BitString::from_bytes(&value.to_der()?)?)
}

/// Decode a DER SM2 signature value from a certificate's signature bits.
pub fn decode_signature(bits: &BitString) -> Result<Signature> {
    let der = bits.as_bytes().ok_or_else(|| {
        CertGenError::CertificateError("Signature has unused bits".to_string())
    })?;
    let value = Sm2SignatureValue::from_der(der)?;

    let mut fixed = [0u8; SCALAR_LEN * 2];
    left_pad(value.r.as_bytes(), &mut fixed[..SCALAR_LEN])?;
    left_pad(value.s.as_bytes(), &mut fixed[SCALAR_LEN..])?;

    Signature::from_slice(&fixed)
        .map_err(|e| CertGenError::CryptoError(format!("Invalid SM2 signature: {}", e)))
}

fn left_pad(src: &[u8], dst: &mut [u8]) -> Result<()> {
    if src.len() > dst.len() {
        return Err(CertGenError::CryptoError(format!(
            "Signature component is {} bytes, expected at most {}",
            src.len(),
            dst.len()
        )));
    }
    let offset = dst.len() - src.len();
    dst[offset..].copy_from_slice(src);
    Ok(())
}

fn sm2_with_sm3_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: SM2_WITH_SM3,
        parameters: None,
    }
}

fn create_subject_public_key_info(keypair: &Keypair) -> Result<SubjectPublicKeyInfoOwned> {
    let der = keypair.to_public_key_der()?;
    Ok(SubjectPublicKeyInfoOwned::from_der(&der)?)
}

fn build_extensions(
    template: &CertificateTemplate,
    spki: &SubjectPublicKeyInfoOwned,
    authority_key_id: Option<&[u8]>,
) -> Result<Vec<Extension>> {
    let mut extensions = Vec::new();

    extensions.push(to_extension(&KeyUsage(template.key_usage), true)?);

    if !template.extended_key_usage.is_empty() {
        extensions.push(to_extension(
            &ExtendedKeyUsage(template.extended_key_usage.clone()),
            false,
        )?);
    }

    if template.is_ca {
        let constraints = BasicConstraints {
            ca: true,
            path_len_constraint: None,
        };
        extensions.push(to_extension(&constraints, true)?);
    }

    let subject_key_id = SubjectKeyIdentifier(OctetString::new(key_identifier(spki))?);
    extensions.push(to_extension(&subject_key_id, false)?);

    if let Some(key_id) = authority_key_id {
        let authority = AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(key_id)?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };
        extensions.push(to_extension(&authority, false)?);
    }

    let alt_names = subject_alt_names(template)?;
    if !alt_names.is_empty() {
        extensions.push(to_extension(&SubjectAltName(alt_names), false)?);
    }

    Ok(extensions)
}

fn subject_alt_names(template: &CertificateTemplate) -> Result<Vec<GeneralName>> {
    let mut names = Vec::with_capacity(template.dns_names.len() + template.ip_addresses.len());

    for dns in &template.dns_names {
        let ia5 = Ia5String::new(dns)
            .map_err(|e| CertGenError::CertificateError(format!("Invalid DNS name {}: {}", dns, e)))?;
        names.push(GeneralName::DnsName(ia5));
    }

    for ip in &template.ip_addresses {
        let octets = match ip {
            std::net::IpAddr::V4(v4) => v4.octets().to_vec(),
            std::net::IpAddr::V6(v6) => v6.octets().to_vec(),
        };
        names.push(GeneralName::IpAddress(OctetString::new(octets)?));
    }

    Ok(names)
}

fn to_extension<T: AssociatedOid + Encode>(value: &T, critical: bool) -> Result<Extension> {
    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value: OctetString::new(value.to_der()?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::loader::find_extension;
    use crate::crypto::keypair::generate_sm2_keypair;
    use x509_cert::ext::pkix::KeyUsages;

    fn self_signed() -> IssuedCertificate {
        let keypair = generate_sm2_keypair().unwrap();
        let template = CertificateTemplate::ca(Some("Test CA")).unwrap();
        sign_template(&template, keypair.clone(), &template.subject, &keypair, None).unwrap()
    }

    #[test]
    fn test_self_signed_verifies_with_own_key() {
        let issued = self_signed();
        let public = certificate_public_key(&issued.certificate).unwrap();

        assert_eq!(public, issued.keypair.public_key());
        assert!(verify_certificate_signature(&issued.certificate, &public).is_ok());
        assert_eq!(
            issued.certificate.tbs_certificate.issuer,
            issued.certificate.tbs_certificate.subject
        );
    }

    #[test]
    fn test_der_matches_certificate() {
        let issued = self_signed();
        let decoded = Certificate::from_der(&issued.der).unwrap();
        assert_eq!(decoded, issued.certificate);
    }

    #[test]
    fn test_signed_by_issuer_not_subject() {
        let ca = self_signed();
        let leaf_keypair = generate_sm2_keypair().unwrap();
        let template = CertificateTemplate::leaf(KeyUsages::DigitalSignature.into()).unwrap();
        let ca_subject = ca.certificate.tbs_certificate.subject.clone();

        let leaf = sign_template(&template, leaf_keypair, &ca_subject, &ca.keypair, None).unwrap();

        assert!(verify_certificate_signature(&leaf.certificate, &ca.keypair.public_key()).is_ok());
        assert!(
            verify_certificate_signature(&leaf.certificate, &leaf.keypair.public_key()).is_err()
        );
        assert_eq!(leaf.certificate.tbs_certificate.issuer, ca_subject);
    }

    #[test]
    fn test_tampered_certificate_fails_verification() {
        let mut issued = self_signed();
        issued.certificate.tbs_certificate.subject = crate::cert::template::build_subject(Some("Other")).unwrap();

        let result = verify_certificate_signature(&issued.certificate, &issued.keypair.public_key());
        assert!(matches!(result, Err(CertGenError::CryptoError(_))));
    }

    #[test]
    fn test_signature_algorithm_is_sm2_with_sm3() {
        let issued = self_signed();
        assert_eq!(issued.certificate.signature_algorithm.oid, SM2_WITH_SM3);
        assert_eq!(issued.certificate.tbs_certificate.signature.oid, SM2_WITH_SM3);
        assert!(issued.certificate.signature_algorithm.parameters.is_none());
    }

    #[test]
    fn test_signature_encoding_roundtrip() {
        let keypair = generate_sm2_keypair().unwrap();
        let signature = keypair.sign(b"message").unwrap();

        let bits = encode_signature(&signature).unwrap();
        let decoded = decode_signature(&bits).unwrap();
        assert_eq!(decoded.to_bytes(), signature.to_bytes());
    }

    #[test]
    fn test_key_identifier_is_160_bits() {
        let issued = self_signed();
        let id = key_identifier(&issued.certificate.tbs_certificate.subject_public_key_info);
        assert_eq!(id.len(), 20);

        let ski: SubjectKeyIdentifier = find_extension(&issued.certificate).unwrap().unwrap();
        assert_eq!(ski.0.as_bytes(), id.as_slice());
    }

    #[test]
    fn test_authority_key_identifier_emitted_when_given() {
        let ca = self_signed();
        let ca_key_id = key_identifier(&ca.certificate.tbs_certificate.subject_public_key_info);
        let template = CertificateTemplate::leaf(KeyUsages::DigitalSignature.into()).unwrap();

        let leaf = sign_template(
            &template,
            generate_sm2_keypair().unwrap(),
            &ca.certificate.tbs_certificate.subject,
            &ca.keypair,
            Some(&ca_key_id),
        )
        .unwrap();

        let aki: AuthorityKeyIdentifier = find_extension(&leaf.certificate).unwrap().unwrap();
        assert_eq!(aki.key_identifier.unwrap().as_bytes(), ca_key_id.as_slice());

        let ca_aki: Option<AuthorityKeyIdentifier> = find_extension(&ca.certificate).unwrap();
        assert!(ca_aki.is_none());
    }

    #[test]
    fn test_extension_criticality() {
        let issued = self_signed();
        let extensions = issued.certificate.tbs_certificate.extensions.unwrap();

        for ext in extensions {
            let expect_critical = ext.extn_id == KeyUsage::OID || ext.extn_id == BasicConstraints::OID;
            assert_eq!(ext.critical, expect_critical, "extension {}", ext.extn_id);
        }
    }
}
