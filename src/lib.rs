// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::match_like_matches_macro)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Sealer
//!
//! Self-signed certificates, visible PDF signatures and signature checks.
//!
//! ## Features
//!
//! ### Certificates
//! - **Generation**: RSA-2048+ key pair and a self-signed X.509 v3 certificate
//!   (SHA-256 with RSA, one-year validity, `localhost` SAN)
//! - **Storage**: PEM certificate, PKCS#8 private key, optionally password-encrypted
//! - **Loading**: PKCS#8 and PKCS#1 keys, with a check that the key matches the certificate
//!
//! ### Signing
//! - **Overlay**: a "DIGITALLY SIGNED" box stamped on the last page
//! - **Metadata**: signer, tool and timestamp written to the document information
//! - **Signature**: RSASSA-PSS (SHA-256) over the original file bytes, base64 in `/Signature`
//!
//! ### Verification
//! - **Metadata check**: signed when `/Signature` is present, valid when the producer matches
//! - **Cryptographic check**: against the unsigned original and the signer's certificate
//!
//! ## Architecture
//!
//! ```text
//! signatures   certificate / signer / verifier / manager
//!     │
//! writer       overlay canvas, page copying, serialization
//!     │
//! document     reading: lexer → parser → xref → objects
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_sealer::{CertificateRequest, SignOptions, SigningManager};
//!
//! # fn main() -> pdf_sealer::Result<()> {
//! let mut manager = SigningManager::new();
//! manager.generate(&CertificateRequest::new("Alice").with_email("a@x.com"))?;
//!
//! let signed = manager.sign("report.pdf", &SignOptions::new().with_output("report_signed.pdf"))?;
//! let result = manager.verify(&signed);
//! println!("signed by {} at {}", result.signer, result.signature_date);
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 (<http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license (<http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;
pub mod xref_reconstruction;

// Stream decoders
pub mod decoders;

// PDF writing
pub mod writer;

// Certificates, signing and verification
pub mod signatures;

pub use config::{SignerConfig, MIN_KEY_BITS};
pub use document::{DocumentInfo, PdfDocument};
pub use error::{Error, ErrorKind, Result};
pub use signatures::{
    CertificateBundle, CertificateRequest, PdfSigner, SignOptions, SignatureInfo, SignaturePosition,
    SignatureVerifier, SigningManager, VerificationResult,
};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
