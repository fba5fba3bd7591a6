//! Certificates, document signing and signature verification.
//!
//! ## Flow
//!
//! ```text
//! CertificateRequest ──generate──▶ CertificateBundle ◀──load── cert.pem + key.pem
//!                                        │
//!                       PdfSigner::sign  │  (overlay on last page, PSS signature
//!                                        ▼   of the original bytes in /Signature)
//!                                   signed.pdf
//!                                        │
//!                SignatureVerifier::verify  (metadata and producer check)
//! ```
//!
//! [`SigningManager`] wraps the three and keeps the active certificate.
//!
//! ## Example
//!
//! ```no_run
//! use pdf_sealer::signatures::{CertificateBundle, CertificateRequest, PdfSigner, SignOptions, SignatureVerifier};
//!
//! let bundle = CertificateBundle::generate(&CertificateRequest::new("Alice"))?;
//! let signed = PdfSigner::default().sign(&bundle, "report.pdf", &SignOptions::new().with_output("signed.pdf"))?;
//!
//! let result = SignatureVerifier::default().verify(&signed);
//! assert!(result.is_signed && result.is_valid);
//! # Ok::<(), pdf_sealer::Error>(())
//! ```

mod appearance;
mod certificate;
mod manager;
mod signer;
mod types;
mod verifier;

pub use appearance::{default_signature_text, SignatureAppearance, APPEARANCE_TIME_FORMAT};
pub use certificate::{certificate_public_key, verify_pss, CertificateBundle, CertificateRequest};
pub use manager::SigningManager;
pub use signer::{PdfSigner, MOD_DATE_FORMAT, SIGNED_SUBJECT};
pub use types::{
    InfoKey, SignOptions, SignatureInfo, SignaturePosition, VerificationResult, INFO_TIME_FORMAT, NOT_SPECIFIED,
    UNKNOWN,
};
pub use verifier::{SignatureVerifier, MSG_NOT_FOUND, MSG_NO_METADATA, MSG_NO_SIGNATURE, MSG_UNRECOGNIZED};
