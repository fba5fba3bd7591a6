//! Stateful front end that holds the active certificate.

use super::certificate::{CertificateBundle, CertificateRequest};
use super::signer::PdfSigner;
use super::types::{SignOptions, SignatureInfo, VerificationResult};
use super::verifier::SignatureVerifier;
use crate::config::SignerConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Generates or loads one certificate and signs and verifies with it.
///
/// ```no_run
/// use pdf_sealer::{CertificateRequest, SignOptions, SigningManager};
///
/// let mut manager = SigningManager::new();
/// manager.generate(&CertificateRequest::new("Alice").with_organization("Acme Corp"))?;
/// manager.save_certificate("alice.crt", "alice.key", Some("s3cret"))?;
///
/// let signed = manager.sign("contract.pdf", &SignOptions::new().with_output("signed.pdf"))?;
/// assert!(manager.verify(&signed).is_valid);
/// # Ok::<(), pdf_sealer::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SigningManager {
    signer: PdfSigner,
    verifier: SignatureVerifier,
    bundle: Option<CertificateBundle>,
}

impl SigningManager {
    /// Create a manager with the default configuration and no certificate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager using `config`.
    pub fn with_config(config: SignerConfig) -> Self {
        Self {
            verifier: SignatureVerifier::from_config(&config),
            signer: PdfSigner::new(config),
            bundle: None,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &SignerConfig {
        self.signer.config()
    }

    /// Generate a new self-signed certificate and make it active.
    pub fn generate(&mut self, request: &CertificateRequest) -> Result<&SignatureInfo> {
        let bundle = CertificateBundle::generate_with_config(request, self.signer.config()).inspect_err(|e| {
            log::warn!("Certificate generation failed: {}", e);
        })?;
        Ok(self.bundle.insert(bundle).info())
    }

    /// Load a certificate and key from PEM files and make them active.
    ///
    /// On failure the previously active certificate stays in place.
    pub fn load_certificate(
        &mut self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        password: Option<&str>,
    ) -> Result<&SignatureInfo> {
        let bundle = CertificateBundle::load(cert_path, key_path, password).inspect_err(|e| {
            log::warn!("Loading certificate failed: {}", e);
        })?;
        Ok(self.bundle.insert(bundle).info())
    }

    /// Make an existing bundle the active certificate.
    pub fn use_certificate(&mut self, bundle: CertificateBundle) -> &SignatureInfo {
        self.bundle.insert(bundle).info()
    }

    /// Write the active certificate and key as PEM files.
    pub fn save_certificate(
        &self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        password: Option<&str>,
    ) -> Result<()> {
        self.active()?.save(cert_path, key_path, password)
    }

    /// Sign the PDF at `input` with the active certificate.
    pub fn sign(&self, input: impl AsRef<Path>, options: &SignOptions) -> Result<PathBuf> {
        let bundle = self.active()?;
        self.signer.sign(bundle, input.as_ref(), options).inspect_err(|e| {
            log::warn!("Signing {} failed: {}", input.as_ref().display(), e);
        })
    }

    /// Check the PDF at `path` for a signature. Needs no certificate.
    pub fn verify(&self, path: impl AsRef<Path>) -> VerificationResult {
        self.verifier.verify(path)
    }

    /// Check `signed_path` cryptographically against the unsigned
    /// `original_path` using the active certificate.
    pub fn verify_against_original(&self, signed_path: impl AsRef<Path>, original_path: impl AsRef<Path>) -> Result<bool> {
        let bundle = self.active()?;
        let signed = read_document(signed_path.as_ref())?;
        let original = read_document(original_path.as_ref())?;
        self.verifier
            .verify_against_original(&signed, &original, bundle.certificate_der())
    }

    /// Details of the active certificate, if any.
    pub fn certificate_info(&self) -> Option<&SignatureInfo> {
        self.bundle.as_ref().map(CertificateBundle::info)
    }

    /// Whether a certificate is active.
    pub fn is_certificate_loaded(&self) -> bool {
        self.bundle.is_some()
    }

    /// The active certificate bundle.
    pub fn bundle(&self) -> Option<&CertificateBundle> {
        self.bundle.as_ref()
    }

    fn active(&self) -> Result<&CertificateBundle> {
        self.bundle.as_ref().ok_or(Error::NoCertificateLoaded)
    }
}

fn read_document(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(Error::DocumentNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::signatures::certificate::tests::test_bundle;

    fn loaded_manager() -> SigningManager {
        let mut manager = SigningManager::new();
        manager.use_certificate(test_bundle());
        manager
    }

    #[test]
    fn test_starts_without_certificate() {
        let manager = SigningManager::new();
        assert!(!manager.is_certificate_loaded());
        assert!(manager.certificate_info().is_none());

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, b"%PDF-1.4\n").unwrap();

        let err = manager.sign(&input, &SignOptions::new()).unwrap_err();
        assert!(matches!(err, Error::NoCertificateLoaded));
        assert_eq!(err.kind(), ErrorKind::State);

        let err = manager
            .save_certificate(dir.path().join("c.pem"), dir.path().join("k.pem"), None)
            .unwrap_err();
        assert!(matches!(err, Error::NoCertificateLoaded));
        assert!(!dir.path().join("c.pem").exists());
    }

    #[test]
    fn test_failed_load_keeps_certificate() {
        let mut manager = loaded_manager();
        let dir = tempfile::tempdir().unwrap();
        assert!(manager
            .load_certificate(dir.path().join("none.crt"), dir.path().join("none.key"), None)
            .is_err());
        assert_eq!(manager.certificate_info().unwrap().common_name, "Alice");
    }

    #[test]
    fn test_failed_generate_keeps_certificate() {
        let mut manager = loaded_manager();
        assert!(manager.generate(&CertificateRequest::new("")).is_err());
        assert!(manager.is_certificate_loaded());
        assert_eq!(manager.certificate_info().unwrap().common_name, "Alice");
    }

    #[test]
    fn test_save_and_reload() {
        let manager = loaded_manager();
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("alice.crt");
        let key = dir.path().join("alice.key");
        manager.save_certificate(&cert, &key, None).unwrap();

        let mut fresh = SigningManager::new();
        let info = fresh.load_certificate(&cert, &key, None).unwrap();
        assert_eq!(info.common_name, "Alice");
        assert!(fresh.is_certificate_loaded());
    }

    #[test]
    fn test_config_reaches_verifier() {
        let manager = SigningManager::with_config(SignerConfig::default().with_producer("Custom"));
        assert_eq!(manager.verifier.producer(), "Custom");
        assert_eq!(manager.config().producer, "Custom");
    }
}
