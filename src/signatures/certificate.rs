//! Self-signed certificates and their RSA key pairs.
//!
//! A [`CertificateBundle`] always holds a certificate together with the
//! private key for its public key. Bundles are immutable; clones share the
//! key material.

use super::types::{SignatureInfo, INFO_TIME_FORMAT, NOT_SPECIFIED};
use crate::config::{SignerConfig, MIN_KEY_BITS};
use crate::error::{Error, Result};
use crate::writer::write_atomic;
use chrono::{DateTime, Datelike, Timelike, Utc};
use der::asn1::{
    BitString, GeneralizedTime, Ia5String, Ia5StringRef, OctetString, PrintableStringRef, SetOfVec, UtcTime,
    Utf8StringRef,
};
use der::pem::LineEnding;
use der::{Any, Decode, Encode};
use pkcs1::DecodeRsaPrivateKey;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};
use spki::{AlgorithmIdentifierOwned, ObjectIdentifier, SubjectPublicKeyInfoOwned};
use std::path::Path;
use std::sync::Arc;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages, SubjectAltName};
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};

const OID_SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const OID_ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const OID_EMAIL: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");
const OID_BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");
const OID_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.15");
const OID_SUBJECT_ALT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.17");

const PEM_CERTIFICATE: &str = "CERTIFICATE";
const PEM_PRIVATE_KEY: &str = "PRIVATE KEY";
const PEM_ENCRYPTED_PRIVATE_KEY: &str = "ENCRYPTED PRIVATE KEY";
const PEM_RSA_PRIVATE_KEY: &str = "RSA PRIVATE KEY";

/// Identity to put in a new certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    /// Subject common name (required)
    pub common_name: String,
    /// Subject email address
    pub email: Option<String>,
    /// Subject organization
    pub organization: Option<String>,
    /// Two-letter country code
    pub country: String,
}

impl CertificateRequest {
    /// Request for `common_name` in country "US".
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            email: None,
            organization: None,
            country: "US".to_string(),
        }
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the organization.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Set the country code.
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Check the fields can be encoded in a certificate subject.
    pub fn validate(&self) -> Result<()> {
        if self.common_name.trim().is_empty() {
            return Err(Error::InvalidInput("common name must not be empty".to_string()));
        }
        if self.country.len() != 2 || !self.country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::InvalidInput(format!(
                "country must be a two-letter code, got {:?}",
                self.country
            )));
        }
        if let Some(email) = self.email() {
            if !email.is_ascii() {
                return Err(Error::InvalidInput(format!("email must be ASCII, got {:?}", email)));
            }
        }
        Ok(())
    }

    fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.is_empty())
    }

    fn organization(&self) -> Option<&str> {
        self.organization.as_deref().filter(|o| !o.is_empty())
    }
}

struct BundleInner {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    certificate_der: Vec<u8>,
    info: SignatureInfo,
}

/// A certificate and its private key.
#[derive(Clone)]
pub struct CertificateBundle {
    inner: Arc<BundleInner>,
}

impl std::fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("info", &self.inner.info)
            .field("certificate", &format!("{} bytes", self.inner.certificate_der.len()))
            .field("key_bits", &self.key_bits())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl CertificateBundle {
    /// Generate a key pair and a self-signed certificate with default settings.
    pub fn generate(request: &CertificateRequest) -> Result<Self> {
        Self::generate_with_config(request, &SignerConfig::default())
    }

    /// Generate a key pair of `config.key_bits` and a self-signed certificate
    /// valid for `config.validity_years` from now.
    pub fn generate_with_config(request: &CertificateRequest, config: &SignerConfig) -> Result<Self> {
        request.validate()?;
        config.validate()?;

        log::debug!("Generating {}-bit RSA key for {:?}", config.key_bits, request.common_name);
        let private_key = RsaPrivateKey::new(&mut OsRng, config.key_bits)
            .map_err(|e| Error::credential("key generation failed", e))?;
        let public_key = RsaPublicKey::from(&private_key);

        let created = Utc::now().with_nanosecond(0).unwrap_or_else(Utc::now);
        let valid_until = add_years(created, config.validity_years);

        let subject = build_subject(request)?;
        let spki_der = public_key
            .to_public_key_der()
            .map_err(|e| Error::credential("encoding public key", e))?;
        let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes())
            .map_err(|e| Error::credential("encoding public key", e))?;

        let signature_algorithm = AlgorithmIdentifierOwned {
            oid: OID_SHA256_WITH_RSA,
            parameters: Some(Any::null()),
        };

        let tbs = TbsCertificate {
            version: Version::V3,
            serial_number: random_serial()?,
            signature: signature_algorithm.clone(),
            issuer: subject.clone(),
            validity: Validity {
                not_before: asn1_time(created)?,
                not_after: asn1_time(valid_until)?,
            },
            subject,
            subject_public_key_info: spki,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(build_extensions()?),
        };

        let tbs_der = tbs.to_der().map_err(|e| Error::credential("encoding certificate", e))?;
        let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(private_key.clone());
        let signature = signing_key.sign(&tbs_der).to_bytes();

        let certificate = Certificate {
            tbs_certificate: tbs,
            signature_algorithm,
            signature: BitString::from_bytes(&signature).map_err(|e| Error::credential("encoding certificate", e))?,
        };
        let certificate_der = certificate
            .to_der()
            .map_err(|e| Error::credential("encoding certificate", e))?;

        let info = SignatureInfo {
            common_name: request.common_name.clone(),
            email: request.email().unwrap_or(NOT_SPECIFIED).to_string(),
            organization: request.organization().unwrap_or(NOT_SPECIFIED).to_string(),
            country: request.country.clone(),
            created: created.format(INFO_TIME_FORMAT).to_string(),
            valid_until: valid_until.format(INFO_TIME_FORMAT).to_string(),
        };

        log::info!("Generated self-signed certificate for {}", info.common_name);
        Ok(Self::from_parts(private_key, public_key, certificate_der, info))
    }

    /// Load a PEM certificate and PEM private key from disk.
    ///
    /// The key may be PKCS#8 (optionally password protected) or PKCS#1.
    /// The key must belong to the certificate.
    pub fn load(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>, password: Option<&str>) -> Result<Self> {
        let cert_pem = std::fs::read_to_string(cert_path.as_ref())?;
        let key_pem = std::fs::read_to_string(key_path.as_ref())?;
        let bundle = Self::from_pem(&cert_pem, &key_pem, password)?;
        log::info!(
            "Loaded certificate for {} from {}",
            bundle.info().common_name,
            cert_path.as_ref().display()
        );
        Ok(bundle)
    }

    /// Build a bundle from PEM text.
    pub fn from_pem(cert_pem: &str, key_pem: &str, password: Option<&str>) -> Result<Self> {
        let (_, pem) = x509_parser::pem::parse_x509_pem(cert_pem.as_bytes())
            .map_err(|e| Error::credential("malformed certificate PEM", e))?;
        if pem.label != PEM_CERTIFICATE {
            return Err(Error::Credential(format!("expected a CERTIFICATE PEM block, found {}", pem.label)));
        }
        let certificate_der = pem.contents;

        let (info, cert_public_key) = inspect_certificate(&certificate_der)?;
        let private_key = decode_private_key(key_pem, password)?;

        let public_key = RsaPublicKey::from(&private_key);
        if public_key != cert_public_key {
            return Err(Error::KeyMismatch);
        }
        let bits = public_key.n().bits();
        if bits < MIN_KEY_BITS {
            return Err(Error::Credential(format!(
                "RSA key is {} bits, at least {} required",
                bits, MIN_KEY_BITS
            )));
        }

        Ok(Self::from_parts(private_key, public_key, certificate_der, info))
    }

    fn from_parts(
        private_key: RsaPrivateKey,
        public_key: RsaPublicKey,
        certificate_der: Vec<u8>,
        info: SignatureInfo,
    ) -> Self {
        Self {
            inner: Arc::new(BundleInner {
                private_key,
                public_key,
                certificate_der,
                info,
            }),
        }
    }

    /// Write the certificate and private key as PEM files.
    ///
    /// With a non-empty password the key is stored as PKCS#8
    /// `ENCRYPTED PRIVATE KEY` (PBES2, scrypt + AES-256-CBC).
    pub fn save(&self, cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>, password: Option<&str>) -> Result<()> {
        let cert_pem = self.certificate_pem()?;
        let key_pem = self.private_key_pem(password)?;
        write_atomic(cert_path.as_ref(), cert_pem.as_bytes())?;
        write_atomic(key_path.as_ref(), key_pem.as_bytes())?;
        log::info!(
            "Saved certificate to {} and key to {}",
            cert_path.as_ref().display(),
            key_path.as_ref().display()
        );
        Ok(())
    }

    /// The certificate as a `CERTIFICATE` PEM block.
    pub fn certificate_pem(&self) -> Result<String> {
        der::pem::encode_string(PEM_CERTIFICATE, LineEnding::LF, &self.inner.certificate_der)
            .map_err(|e| Error::credential("encoding certificate PEM", e))
    }

    /// The private key as PKCS#8 PEM, encrypted when a password is given.
    pub fn private_key_pem(&self, password: Option<&str>) -> Result<der::zeroize::Zeroizing<String>> {
        match non_empty(password) {
            Some(password) => self
                .inner
                .private_key
                .to_pkcs8_encrypted_pem(&mut OsRng, password.as_bytes(), LineEnding::LF)
                .map_err(|e| Error::credential("encrypting private key", e)),
            None => self
                .inner
                .private_key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| Error::credential("encoding private key", e)),
        }
    }

    /// DER encoding of the certificate.
    pub fn certificate_der(&self) -> &[u8] {
        &self.inner.certificate_der
    }

    /// Subject and validity details.
    pub fn info(&self) -> &SignatureInfo {
        &self.inner.info
    }

    /// The certificate's public key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.inner.public_key
    }

    /// RSA modulus size in bits.
    pub fn key_bits(&self) -> usize {
        self.inner.public_key.n().bits()
    }

    /// RSASSA-PSS signature (SHA-256, MGF1-SHA256, maximum salt) over `data`.
    pub fn sign_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let salt_len = max_pss_salt_len(self.key_bits());
        let signing_key = rsa::pss::BlindedSigningKey::<Sha256>::new_with_salt_len(
            self.inner.private_key.clone(),
            salt_len,
        );
        let signature = signing_key
            .try_sign_with_rng(&mut OsRng, data)
            .map_err(|e| Error::credential("signing failed", e))?;
        Ok(signature.to_vec())
    }
}

/// Check an RSASSA-PSS signature made by [`CertificateBundle::sign_bytes`].
pub fn verify_pss(public_key: &RsaPublicKey, data: &[u8], signature: &[u8]) -> Result<()> {
    let salt_len = max_pss_salt_len(public_key.n().bits());
    let verifying_key = rsa::pss::VerifyingKey::<Sha256>::new_with_salt_len(public_key.clone(), salt_len);
    let signature = rsa::pss::Signature::try_from(signature)
        .map_err(|e| Error::credential("malformed signature", e))?;
    verifying_key
        .verify(data, &signature)
        .map_err(|e| Error::credential("signature does not verify", e))
}

/// RSA public key of a DER certificate.
pub fn certificate_public_key(certificate_der: &[u8]) -> Result<RsaPublicKey> {
    inspect_certificate(certificate_der).map(|(_, key)| key)
}

/// Longest salt that fits: emLen - hLen - 2.
fn max_pss_salt_len(key_bits: usize) -> usize {
    let em_len = (key_bits.saturating_sub(1) + 7) / 8;
    em_len.saturating_sub(32 + 2)
}

fn non_empty(password: Option<&str>) -> Option<&str> {
    password.filter(|p| !p.is_empty())
}

/// `created` plus `years`, keeping month, day and time. Feb 29 becomes
/// Feb 28 when the target year is not a leap year.
pub(crate) fn add_years(created: DateTime<Utc>, years: u32) -> DateTime<Utc> {
    let year = created.year() + years as i32;
    created
        .with_year(year)
        .or_else(|| created.with_day(28).and_then(|d| d.with_year(year)))
        .unwrap_or(created)
}

fn asn1_time(at: DateTime<Utc>) -> Result<Time> {
    let date_time = der::DateTime::new(
        at.year() as u16,
        at.month() as u8,
        at.day() as u8,
        at.hour() as u8,
        at.minute() as u8,
        at.second() as u8,
    )
    .map_err(|e| Error::credential("certificate validity", e))?;

    // RFC 5280: UTCTime through 2049, GeneralizedTime from 2050
    if at.year() < 2050 {
        let utc = UtcTime::from_date_time(date_time).map_err(|e| Error::credential("certificate validity", e))?;
        Ok(Time::UtcTime(utc))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

/// 128 random bits, kept positive.
fn random_serial() -> Result<SerialNumber> {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes[0] &= 0x7F;
    if bytes[0] == 0 {
        bytes[0] = 1;
    }
    SerialNumber::new(&bytes).map_err(|e| Error::credential("certificate serial", e))
}

fn rdn(oid: ObjectIdentifier, value: Any) -> Result<RelativeDistinguishedName> {
    let attribute = AttributeTypeAndValue { oid, value };
    let set = SetOfVec::try_from(vec![attribute]).map_err(|e| Error::credential("certificate subject", e))?;
    Ok(RelativeDistinguishedName(set))
}

/// CN, C, then email and O when present.
fn build_subject(request: &CertificateRequest) -> Result<Name> {
    let subject_err = |e: der::Error| Error::InvalidInput(format!("certificate subject: {}", e));

    let utf8 = |s: &str| -> Result<Any> {
        let value = Utf8StringRef::new(s).map_err(subject_err)?;
        Any::encode_from(&value).map_err(subject_err)
    };

    let mut rdns = vec![rdn(OID_COMMON_NAME, utf8(&request.common_name)?)?];

    let country = PrintableStringRef::new(&request.country).map_err(subject_err)?;
    rdns.push(rdn(OID_COUNTRY, Any::encode_from(&country).map_err(subject_err)?)?);

    if let Some(email) = request.email() {
        let email = Ia5StringRef::new(email).map_err(subject_err)?;
        rdns.push(rdn(OID_EMAIL, Any::encode_from(&email).map_err(subject_err)?)?);
    }
    if let Some(organization) = request.organization() {
        rdns.push(rdn(OID_ORGANIZATION, utf8(organization)?)?);
    }

    Ok(RdnSequence(rdns))
}

fn build_extensions() -> Result<Vec<Extension>> {
    let ext_err = |e: der::Error| Error::credential("certificate extension", e);

    let basic = BasicConstraints {
        ca: false,
        path_len_constraint: None,
    };
    let key_usage = KeyUsage(
        (KeyUsages::DigitalSignature | KeyUsages::NonRepudiation | KeyUsages::KeyEncipherment).into(),
    );
    let alt_names = SubjectAltName(vec![GeneralName::DnsName(
        Ia5String::new("localhost").map_err(ext_err)?,
    )]);

    Ok(vec![
        Extension {
            extn_id: OID_SUBJECT_ALT_NAME,
            critical: false,
            extn_value: OctetString::new(alt_names.to_der().map_err(ext_err)?).map_err(ext_err)?,
        },
        Extension {
            extn_id: OID_BASIC_CONSTRAINTS,
            critical: true,
            extn_value: OctetString::new(basic.to_der().map_err(ext_err)?).map_err(ext_err)?,
        },
        Extension {
            extn_id: OID_KEY_USAGE,
            critical: true,
            extn_value: OctetString::new(key_usage.to_der().map_err(ext_err)?).map_err(ext_err)?,
        },
    ])
}

/// Subject details and RSA public key of a DER certificate.
fn inspect_certificate(der: &[u8]) -> Result<(SignatureInfo, RsaPublicKey)> {
    let (_, cert) =
        x509_parser::parse_x509_certificate(der).map_err(|e| Error::credential("malformed certificate", e))?;

    let subject = cert.subject();
    let validity = cert.validity();
    let format_time = |t: &x509_parser::time::ASN1Time| {
        DateTime::<Utc>::from_timestamp(t.timestamp(), 0)
            .map(|dt| dt.format(INFO_TIME_FORMAT).to_string())
            .unwrap_or_else(|| NOT_SPECIFIED.to_string())
    };

    let info = SignatureInfo {
        common_name: attribute(subject.iter_common_name()),
        email: attribute(subject.iter_email()),
        organization: attribute(subject.iter_organization()),
        country: attribute(subject.iter_country()),
        created: format_time(&validity.not_before),
        valid_until: format_time(&validity.not_after),
    };

    let public_key = RsaPublicKey::from_public_key_der(cert.public_key().raw)
        .map_err(|e| Error::credential("certificate does not hold an RSA public key", e))?;

    Ok((info, public_key))
}

fn attribute<'a, 'b: 'a>(mut values: impl Iterator<Item = &'a x509_parser::x509::AttributeTypeAndValue<'b>>) -> String {
    values
        .next()
        .and_then(|value| value.as_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

/// Parse an RSA private key PEM, decrypting it if needed.
fn decode_private_key(key_pem: &str, password: Option<&str>) -> Result<RsaPrivateKey> {
    let label =
        der::pem::decode_label(key_pem.as_bytes()).map_err(|e| Error::credential("malformed private key PEM", e))?;

    match (label, non_empty(password)) {
        (PEM_ENCRYPTED_PRIVATE_KEY, Some(password)) => RsaPrivateKey::from_pkcs8_encrypted_pem(key_pem, password)
            .map_err(|e| Error::credential("could not decrypt private key (wrong password?)", e)),
        (PEM_ENCRYPTED_PRIVATE_KEY, None) => {
            Err(Error::Credential("private key is encrypted but no password was given".to_string()))
        },
        (PEM_PRIVATE_KEY | PEM_RSA_PRIVATE_KEY, Some(_)) => {
            Err(Error::Credential("password was given but the private key is not encrypted".to_string()))
        },
        (PEM_PRIVATE_KEY, None) => {
            RsaPrivateKey::from_pkcs8_pem(key_pem).map_err(|e| Error::credential("malformed PKCS#8 private key", e))
        },
        (PEM_RSA_PRIVATE_KEY, None) => {
            RsaPrivateKey::from_pkcs1_pem(key_pem).map_err(|e| Error::credential("malformed PKCS#1 private key", e))
        },
        (other, _) => Err(Error::Credential(format!("unsupported private key type {}", other))),
    }
}
