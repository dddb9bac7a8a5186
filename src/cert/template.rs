//! Certificate templates.
//!
//! A template is the in-memory description of a certificate before it is
//! signed: serial, subject, validity window and the extension values.

use crate::error::{CertGenError, Result};
use chrono::{DateTime, Months, SubsecRound, Utc};
use const_oid::db::rfc4519;
use const_oid::db::rfc5280::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
use der::asn1::{GeneralizedTime, PrintableStringRef, SetOfVec, UtcTime, Utf8StringRef};
use der::oid::ObjectIdentifier;
use der::Any;
use flagset::FlagSet;
use rand::rngs::OsRng;
use rand::RngCore;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::KeyUsages;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};

/// Lifetime of every generated certificate, in calendar years.
pub const VALIDITY_YEARS: u32 = 10;

/// Serial numbers are drawn uniformly from `[0, 2^128)`.
pub const SERIAL_NUMBER_BYTES: usize = 16;

/// Subject country (PrintableString).
pub const SUBJECT_COUNTRY: &str = "CN";
/// Subject state or province.
pub const SUBJECT_PROVINCE: &str = "广东省";
/// Subject locality.
pub const SUBJECT_LOCALITY: &str = "深圳市";
/// Subject organization.
pub const SUBJECT_ORGANIZATION: &str = "某某科技（深圳）有限公司";

/// DNS subject alternative name carried by every leaf.
pub const LEAF_DNS_NAME: &str = "localhost";

/// Everything needed to build a `TbsCertificate`, minus keys and issuer.
#[derive(Debug, Clone)]
pub struct CertificateTemplate {
    pub serial_number: SerialNumber,
    pub subject: Name,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Emits a critical basic-constraints extension with `cA = true`.
    pub is_ca: bool,
    pub key_usage: FlagSet<KeyUsages>,
    pub extended_key_usage: Vec<ObjectIdentifier>,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

impl CertificateTemplate {
    /// Template for the self-signed root.
    ///
    /// `digitalSignature | keyCertSign`, client and server auth, no SANs.
    pub fn ca(common_name: Option<&str>) -> Result<Self> {
        let (not_before, not_after) = validity_window_from_now()?;

        Ok(Self {
            serial_number: random_serial_number()?,
            subject: build_subject(common_name)?,
            not_before,
            not_after,
            is_ca: true,
            key_usage: KeyUsages::DigitalSignature | KeyUsages::KeyCertSign,
            extended_key_usage: default_extended_key_usage(),
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
        })
    }

    /// Template for a leaf bound to `localhost` and both loopback addresses.
    pub fn leaf(key_usage: FlagSet<KeyUsages>) -> Result<Self> {
        let (not_before, not_after) = validity_window_from_now()?;

        Ok(Self {
            serial_number: random_serial_number()?,
            subject: build_subject(None)?,
            not_before,
            not_after,
            is_ca: false,
            key_usage,
            extended_key_usage: default_extended_key_usage(),
            dns_names: vec![LEAF_DNS_NAME.to_string()],
            ip_addresses: vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
        })
    }

    /// The X.509 validity window for this template.
    pub fn validity(&self) -> Result<Validity> {
        Ok(Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        })
    }

    /// Serial number as lowercase hex, for logging.
    pub fn serial_hex(&self) -> String {
        hex::encode(self.serial_number.as_bytes())
    }
}

fn default_extended_key_usage() -> Vec<ObjectIdentifier> {
    vec![ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH]
}

/// Draw a serial number uniformly from `[0, 2^128)`.
///
/// Serials are independent draws; nothing deduplicates them.
pub fn random_serial_number() -> Result<SerialNumber> {
    let mut bytes = [0u8; SERIAL_NUMBER_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CertGenError::CryptoError(format!("Random source failed: {}", e)))?;

    SerialNumber::new(&bytes)
        .map_err(|e| CertGenError::CertificateError(format!("Failed to create serial number: {}", e)))
}

/// Not-before is now (whole seconds), not-after is ten calendar years later.
pub fn validity_window_from_now() -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let not_before = Utc::now().trunc_subsecs(0);
    let not_after = add_validity_years(not_before)?;
    Ok((not_before, not_after))
}

/// Add [`VALIDITY_YEARS`] calendar years.
///
/// February 29th clamps to February 28th when the target year is not a
/// leap year.
pub fn add_validity_years(start: DateTime<Utc>) -> Result<DateTime<Utc>> {
    start
        .checked_add_months(Months::new(12 * VALIDITY_YEARS))
        .ok_or_else(|| {
            CertGenError::CertificateError(format!("Validity end overflows for start {}", start))
        })
}

/// RFC 5280: UTCTime through 2049, GeneralizedTime from 2050.
pub fn to_x509_time(instant: DateTime<Utc>) -> Result<Time> {
    let seconds = u64::try_from(instant.timestamp()).map_err(|_| {
        CertGenError::CertificateError(format!("Time before the Unix epoch: {}", instant))
    })?;
    let date_time = der::DateTime::from_unix_duration(Duration::from_secs(seconds))?;

    if date_time.year() < 2050 {
        Ok(Time::UtcTime(UtcTime::from_date_time(date_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

/// Convert an X.509 time back to a chrono timestamp.
pub fn from_x509_time(time: &Time) -> Result<DateTime<Utc>> {
    let seconds = i64::try_from(time.to_unix_duration().as_secs()).map_err(|_| {
        CertGenError::CertificateError("Certificate time out of range".to_string())
    })?;

    DateTime::<Utc>::from_timestamp(seconds, 0)
        .ok_or_else(|| CertGenError::CertificateError("Certificate time out of range".to_string()))
}

/// Build the fixed subject: C, ST, L, O and an optional CN.
///
/// An empty common name is treated as absent.
pub fn build_subject(common_name: Option<&str>) -> Result<Name> {
    let mut rdns = Vec::new();

    push_attribute(
        &mut rdns,
        rfc4519::C,
        Any::encode_from(&PrintableStringRef::new(SUBJECT_COUNTRY)?)?,
    )?;
    push_attribute(&mut rdns, rfc4519::ST, utf8_value(SUBJECT_PROVINCE)?)?;
    push_attribute(&mut rdns, rfc4519::L, utf8_value(SUBJECT_LOCALITY)?)?;
    push_attribute(&mut rdns, rfc4519::O, utf8_value(SUBJECT_ORGANIZATION)?)?;

    if let Some(cn) = common_name.filter(|cn| !cn.is_empty()) {
        push_attribute(&mut rdns, rfc4519::CN, utf8_value(cn)?)?;
    }

    Ok(RdnSequence(rdns))
}

fn utf8_value(value: &str) -> Result<Any> {
    let utf8 = Utf8StringRef::new(value)
        .map_err(|e| CertGenError::CertificateError(format!("Invalid subject value: {}", e)))?;
    Ok(Any::encode_from(&utf8)?)
}

fn push_attribute(
    rdns: &mut Vec<RelativeDistinguishedName>,
    oid: ObjectIdentifier,
    value: Any,
) -> Result<()> {
    let mut attr_set = SetOfVec::new();
    attr_set
        .insert_ordered(AttributeTypeAndValue { oid, value })
        .map_err(|e| CertGenError::CertificateError(format!("Failed to add attribute: {}", e)))?;

    rdns.push(RelativeDistinguishedName::from(attr_set));
    Ok(())
}
