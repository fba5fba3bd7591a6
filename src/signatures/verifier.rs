//! Signature verification.
//!
//! [`SignatureVerifier::verify`] inspects document metadata only: a
//! document counts as signed when its information dictionary carries a
//! `/Signature` entry, and as valid when its `/Producer` names this tool.
//! [`SignatureVerifier::verify_against_original`] performs the
//! cryptographic check when the unsigned original is still available.

use super::certificate::{certificate_public_key, verify_pss};
use super::types::{InfoKey, VerificationResult, UNKNOWN};
use crate::config::SignerConfig;
use crate::document::PdfDocument;
use crate::error::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::Path;

/// Error text for a path that does not exist.
pub const MSG_NOT_FOUND: &str = "PDF file not found";
/// Error text for a document without an information dictionary.
pub const MSG_NO_METADATA: &str = "No metadata found in PDF";
/// Error text for a document without a `/Signature` entry.
pub const MSG_NO_SIGNATURE: &str = "No digital signature found";
/// Error text for a signed document from another producer.
pub const MSG_UNRECOGNIZED: &str = "Signature format not recognized";

/// Checks documents for signatures made by [`PdfSigner`](super::PdfSigner).
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    producer: String,
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::from_config(&SignerConfig::default())
    }
}

impl SignatureVerifier {
    /// Accept documents whose `/Producer` equals `producer`.
    pub fn new(producer: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
        }
    }

    /// Accept documents tagged with `config.producer`.
    pub fn from_config(config: &SignerConfig) -> Self {
        Self::new(config.producer.clone())
    }

    /// Producer tag a valid document must carry.
    pub fn producer(&self) -> &str {
        &self.producer
    }

    /// Check the PDF at `path`. Failures are reported in the result.
    pub fn verify(&self, path: impl AsRef<Path>) -> VerificationResult {
        let path = path.as_ref();
        if !path.is_file() {
            return VerificationResult::failed(MSG_NOT_FOUND);
        }
        match std::fs::read(path) {
            Ok(data) => self.verify_bytes(&data),
            Err(e) => {
                log::warn!("Reading {} failed: {}", path.display(), e);
                VerificationResult::failed(format!("Error verifying signature: {}", e))
            },
        }
    }

    /// Check an in-memory PDF.
    pub fn verify_bytes(&self, data: &[u8]) -> VerificationResult {
        match self.inspect(data) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Verification failed: {}", e);
                VerificationResult::failed(format!("Error verifying signature: {}", e))
            },
        }
    }

    fn inspect(&self, data: &[u8]) -> Result<VerificationResult> {
        let mut doc = PdfDocument::from_bytes(data.to_vec())?;
        let info = match doc.metadata()? {
            Some(info) if !info.is_empty() => info,
            _ => return Ok(VerificationResult::failed(MSG_NO_METADATA)),
        };

        if !info.contains_key(InfoKey::Signature.as_str()) {
            return Ok(VerificationResult::failed(MSG_NO_SIGNATURE));
        }

        let field = |key: InfoKey| info.get(key.as_str()).cloned().unwrap_or_else(|| UNKNOWN.to_string());
        let is_valid = info.get(InfoKey::Producer.as_str()).map(String::as_str) == Some(self.producer.as_str());

        let result = VerificationResult {
            is_signed: true,
            is_valid,
            signer: field(InfoKey::Author),
            signature_date: field(InfoKey::ModDate),
            error: (!is_valid).then(|| MSG_UNRECOGNIZED.to_string()),
        };
        log::debug!("Signed by {} (valid: {})", result.signer, result.is_valid);
        Ok(result)
    }

    /// Check the `/Signature` of `signed` against the unsigned `original`
    /// bytes and the signer's DER certificate.
    ///
    /// Returns `Ok(false)` when the signature is missing, malformed, or
    /// does not match. Errors are reserved for unreadable input.
    pub fn verify_against_original(&self, signed: &[u8], original: &[u8], certificate_der: &[u8]) -> Result<bool> {
        let public_key = certificate_public_key(certificate_der)?;
        let mut doc = PdfDocument::from_bytes(signed.to_vec())?;

        let Some(encoded) = doc
            .metadata()?
            .and_then(|info| info.get(InfoKey::Signature.as_str()).cloned())
        else {
            return Ok(false);
        };

        let Ok(signature) = BASE64.decode(encoded.trim()) else {
            log::debug!("Signature entry is not base64");
            return Ok(false);
        };

        match verify_pss(&public_key, original, &signature) {
            Ok(()) => Ok(true),
            Err(e) => {
                log::debug!("Signature check failed: {}", e);
                Ok(false)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::build_pdf;
    use crate::signatures::certificate::tests::test_bundle;
    use crate::signatures::{PdfSigner, SignOptions};

    fn one_page(info: &str) -> Vec<u8> {
        build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
                info,
            ],
            "/Info 4 0 R",
        )
    }

    #[test]
    fn test_not_found() {
        let result = SignatureVerifier::default().verify("/nonexistent/file.pdf");
        assert!(!result.is_signed);
        assert_eq!(result.error.as_deref(), Some(MSG_NOT_FOUND));
    }

    #[test]
    fn test_no_metadata() {
        let data = build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
                "<< /Type /Page /Parent 2 0 R >>",
            ],
            "",
        );
        let result = SignatureVerifier::default().verify_bytes(&data);
        assert_eq!(result.error.as_deref(), Some(MSG_NO_METADATA));

        let result = SignatureVerifier::default().verify_bytes(&one_page("<< >>"));
        assert_eq!(result.error.as_deref(), Some(MSG_NO_METADATA));
    }

    #[test]
    fn test_no_signature() {
        let result = SignatureVerifier::default().verify_bytes(&one_page("<< /Title (Plain) >>"));
        assert!(!result.is_signed);
        assert!(!result.is_valid);
        assert_eq!(result.signer, UNKNOWN);
        assert_eq!(result.error.as_deref(), Some(MSG_NO_SIGNATURE));
    }

    #[test]
    fn test_signed_with_matching_producer() {
        let data = one_page(
            "<< /Signature (abc) /Author (Alice) /ModDate (D:20260101120000) /Producer (PDF Sealer Digital Signature) >>",
        );
        let result = SignatureVerifier::default().verify_bytes(&data);
        assert!(result.is_signed);
        assert!(result.is_valid);
        assert_eq!(result.signer, "Alice");
        assert_eq!(result.signature_date, "D:20260101120000");
        assert_eq!(result.error, None);
    }

    #[test]
    fn test_signed_with_other_producer() {
        let data = one_page("<< /Signature (abc) /Producer (Other Tool) >>");
        let result = SignatureVerifier::default().verify_bytes(&data);
        assert!(result.is_signed);
        assert!(!result.is_valid);
        assert_eq!(result.signer, UNKNOWN);
        assert_eq!(result.signature_date, UNKNOWN);
        assert_eq!(result.error.as_deref(), Some(MSG_UNRECOGNIZED));

        assert!(SignatureVerifier::new("Other Tool").verify_bytes(&data).is_valid);
    }

    #[test]
    fn test_non_string_signature_counts_as_signed() {
        let data = one_page("<< /Signature << /Filter /Adobe.PPKLite >> /Producer (PDF Sealer Digital Signature) >>");
        let result = SignatureVerifier::default().verify_bytes(&data);
        assert!(result.is_signed);
        assert!(result.is_valid);

        let result = SignatureVerifier::default().verify_bytes(&one_page("<< /Signature null /Title (T) >>"));
        assert!(!result.is_signed);
        assert_eq!(result.error.as_deref(), Some(MSG_NO_SIGNATURE));
    }

    #[test]
    fn test_garbage_reports_error() {
        let result = SignatureVerifier::default().verify_bytes(b"GIF89a");
        assert!(!result.is_signed);
        assert!(result.error.unwrap().starts_with("Error verifying signature: "));
    }

    #[test]
    fn test_oversized_predictor_columns_reported() {
        let mut data = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
            2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n"
            .to_vec();
        let body = crate::decoders::flate_encode(&[1, 0, 9, 0, 1, 0, 60, 0]).unwrap();
        let xref_at = data.len();
        data.extend_from_slice(
            format!(
                "3 0 obj\n<< /Type /XRef /Size 4 /W [1 2 1] /Root 1 0 R /Filter /FlateDecode \
                 /DecodeParms << /Predictor 2 /Columns 2305843009213693952 >> /Length {} >>\nstream\n",
                body.len()
            )
            .as_bytes(),
        );
        data.extend_from_slice(&body);
        data.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_at).as_bytes());

        let result = SignatureVerifier::default().verify_bytes(&data);
        assert!(!result.is_signed);
        assert!(!result.is_valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_verify_against_original() {
        let bundle = test_bundle();
        let original = one_page("<< /Title (Contract) >>");
        let signed = PdfSigner::default()
            .sign_document(&bundle, &original, "contract", &SignOptions::new())
            .unwrap();

        let verifier = SignatureVerifier::default();
        assert!(verifier
            .verify_against_original(&signed, &original, bundle.certificate_der())
            .unwrap());

        let mut altered = original.clone();
        let pos = altered.windows(8).position(|w| w == b"Contract").unwrap();
        altered[pos] = b'K';
        assert!(!verifier
            .verify_against_original(&signed, &altered, bundle.certificate_der())
            .unwrap());

        // An unsigned document has nothing to check
        assert!(!verifier
            .verify_against_original(&original, &original, bundle.certificate_der())
            .unwrap());

        assert!(verifier.verify_against_original(&signed, &original, b"not a cert").is_err());
    }
}
