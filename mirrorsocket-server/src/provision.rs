//! TLS material provisioning
//!
//! The secure server needs a certificate and key. If both configured files
//! exist and are non-empty they are used verbatim; otherwise a self-signed
//! RSA certificate is generated from a [`CertificateProfile`] and written to
//! those same paths so the next start reuses it.

use crate::config::TlsConfig;
use crate::logging::{EventSink, ServerEvent};
use chrono::{Datelike, Months, Utc};
use mirrorsocket_core::error::{ConfigError, Error, ProvisionError};
use mirrorsocket_core::Result;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyIdMethod, KeyPair, KeyUsagePurpose, SanType,
    SerialNumber,
};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use rustls::{Certificate as RustlsCert, PrivateKey as RustlsKey, ServerConfig as RustlsServerConfig};
use rustls_pemfile::{certs, pkcs8_private_keys, rsa_private_keys};
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

/// PEM-encoded certificate and private key
#[derive(Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    /// Certificate, PEM
    pub certificate: Vec<u8>,
    /// Private key, PEM
    pub private_key: Vec<u8>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("certificate", &format_args!("{} bytes", self.certificate.len()))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Parameters of a generated self-signed certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateProfile {
    /// RSA modulus size
    pub key_bits: usize,
    /// Serial number, big-endian
    pub serial: Vec<u8>,
    /// Validity from today, in months
    pub validity_months: u32,
    /// Subject/issuer CN
    pub common_name: String,
    /// Subject/issuer C
    pub country: String,
    /// Subject/issuer L
    pub locality: String,
    /// Subject/issuer O
    pub organization: String,
    /// Subject/issuer OU
    pub organizational_unit: String,
    /// IP subject alternative names
    pub ip_addresses: Vec<IpAddr>,
    /// URI subject alternative names
    pub uris: Vec<String>,
}

impl Default for CertificateProfile {
    fn default() -> Self {
        Self {
            key_bits: 2048,
            serial: vec![0x01],
            validity_months: 12,
            common_name: "example.org".to_string(),
            country: "US".to_string(),
            locality: "Test".to_string(),
            organization: "Test".to_string(),
            organizational_unit: "Test".to_string(),
            ip_addresses: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
            uris: vec!["http://example.org/webid#me".to_string()],
        }
    }
}

/// Load the configured certificate and key, or generate and persist new ones
pub fn provision(
    tls: &TlsConfig,
    profile: &CertificateProfile,
    sink: &dyn EventSink,
) -> Result<TlsMaterial> {
    if usable(&tls.cert_file) && usable(&tls.key_file) {
        sink.emit(ServerEvent::ReadingCertificate(tls.cert_file.clone()));
        sink.emit(ServerEvent::ReadingKey(tls.key_file.clone()));
        match read_material(tls) {
            Ok(material) => return Ok(material),
            Err(e) => sink.emit(ServerEvent::MaterialUnreadable(e.to_string())),
        }
    }

    sink.emit(ServerEvent::GeneratingCertificate);
    let material = generate(profile)?;

    sink.emit(ServerEvent::WritingKey(tls.key_file.clone()));
    persist(&tls.key_file, &material.private_key)?;
    sink.emit(ServerEvent::WritingCertificate(tls.cert_file.clone()));
    persist(&tls.cert_file, &material.certificate)?;

    Ok(material)
}

/// A regular, non-empty file
fn usable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

fn read_material(tls: &TlsConfig) -> io::Result<TlsMaterial> {
    Ok(TlsMaterial {
        certificate: fs::read(&tls.cert_file)?,
        private_key: fs::read(&tls.key_file)?,
    })
}

fn persist(path: &Path, contents: &[u8]) -> Result<()> {
    let persist_error = |source| {
        Error::Provision(ProvisionError::Persist {
            path: path.display().to_string(),
            source,
        })
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(persist_error)?;
    }
    fs::write(path, contents).map_err(persist_error)
}

/// Generate a self-signed certificate and its RSA key
pub fn generate(profile: &CertificateProfile) -> Result<TlsMaterial> {
    let key_error = |e: String| Error::Provision(ProvisionError::KeyGeneration(e));
    let cert_error = |e: rcgen::Error| Error::Provision(ProvisionError::Certificate(e.to_string()));

    let rsa_key = RsaPrivateKey::new(&mut rand::thread_rng(), profile.key_bits)
        .map_err(|e| key_error(e.to_string()))?;
    let pkcs8 = rsa_key.to_pkcs8_der().map_err(|e| key_error(e.to_string()))?;
    let key_pair = KeyPair::from_der(pkcs8.as_bytes()).map_err(cert_error)?;

    let mut params = CertificateParams::default();
    params.alg = &rcgen::PKCS_RSA_SHA256;
    params.key_pair = Some(key_pair);
    params.serial_number = Some(SerialNumber::from_slice(&profile.serial));

    let today = Utc::now().date_naive();
    let expiry = today
        .checked_add_months(Months::new(profile.validity_months))
        .ok_or_else(|| {
            Error::Provision(ProvisionError::Certificate(
                "validity period is out of range".to_string(),
            ))
        })?;
    params.not_before = rcgen::date_time_ymd(today.year(), today.month() as u8, today.day() as u8);
    params.not_after = rcgen::date_time_ymd(expiry.year(), expiry.month() as u8, expiry.day() as u8);

    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, profile.common_name.as_str());
    name.push(DnType::CountryName, profile.country.as_str());
    name.push(DnType::LocalityName, profile.locality.as_str());
    name.push(DnType::OrganizationName, profile.organization.as_str());
    name.push(DnType::OrganizationalUnitName, profile.organizational_unit.as_str());
    params.distinguished_name = name;

    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::ContentCommitment,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::DataEncipherment,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
        ExtendedKeyUsagePurpose::CodeSigning,
        ExtendedKeyUsagePurpose::EmailProtection,
        ExtendedKeyUsagePurpose::TimeStamping,
    ];
    params.subject_alt_names = profile
        .uris
        .iter()
        .cloned()
        .map(SanType::URI)
        .chain(profile.ip_addresses.iter().copied().map(SanType::IpAddress))
        .collect();
    params.key_identifier_method = KeyIdMethod::Sha256;

    let certificate = Certificate::from_params(params).map_err(cert_error)?;
    let certificate_pem = certificate.serialize_pem().map_err(cert_error)?;
    let key_pem = certificate.serialize_private_key_pem();

    Ok(TlsMaterial {
        certificate: certificate_pem.into_bytes(),
        private_key: key_pem.into_bytes(),
    })
}

/// Build a rustls server configuration from PEM material
pub fn build_rustls_config(material: &TlsMaterial) -> Result<RustlsServerConfig> {
    let invalid = |what: String| Error::Config(ConfigError::Validation(what));

    let chain: Vec<RustlsCert> = certs(&mut material.certificate.as_slice())
        .map_err(|e| invalid(format!("Failed to parse certificate: {}", e)))?
        .into_iter()
        .map(RustlsCert)
        .collect();
    if chain.is_empty() {
        return Err(invalid("No certificates found".to_string()));
    }

    let key = load_private_key(&material.private_key)
        .ok_or_else(|| invalid("No private keys found".to_string()))?;

    RustlsServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .map_err(|e| invalid(format!("Invalid TLS certificate/key: {}", e)))
}

/// First PKCS#8 key, falling back to PKCS#1
fn load_private_key(pem: &[u8]) -> Option<RustlsKey> {
    if let Ok(keys) = pkcs8_private_keys(&mut &pem[..]) {
        if let Some(key) = keys.into_iter().next() {
            return Some(RustlsKey(key));
        }
    }

    rsa_private_keys(&mut &pem[..])
        .ok()
        .and_then(|keys| keys.into_iter().next())
        .map(RustlsKey)
}
