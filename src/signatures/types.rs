//! Digital signature types and data structures.
//!
//! This module defines the core types used for certificates, signing and
//! verification.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Format of every timestamp in [`SignatureInfo`] (UTC).
pub const INFO_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Placeholder for subject attributes that are absent.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Placeholder for verification fields with no value.
pub const UNKNOWN: &str = "Unknown";

/// Human-readable description of a signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    /// Subject common name
    pub common_name: String,
    /// Subject email address, or "Not specified"
    pub email: String,
    /// Subject organization, or "Not specified"
    pub organization: String,
    /// Two-letter country code, or "Not specified"
    pub country: String,
    /// Start of the validity window, `YYYY-MM-DD HH:MM:SS` UTC
    pub created: String,
    /// End of the validity window, `YYYY-MM-DD HH:MM:SS` UTC
    pub valid_until: String,
}

/// Outcome of checking a document for a signature.
///
/// `is_valid` reports whether the document carries this tool's signing
/// tag. It does not prove the document is unchanged or that the signer
/// holds the key; use
/// [`SignatureVerifier::verify_against_original`](super::SignatureVerifier::verify_against_original)
/// for a cryptographic check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Document metadata holds a `/Signature` entry
    pub is_signed: bool,
    /// Signed, and the producer matches the signing tool
    pub is_valid: bool,
    /// `/Author` of a signed document, otherwise "Unknown"
    pub signer: String,
    /// `/ModDate` of a signed document, otherwise "Unknown"
    pub signature_date: String,
    /// Why the document is not signed or not valid
    pub error: Option<String>,
}

impl Default for VerificationResult {
    fn default() -> Self {
        Self {
            is_signed: false,
            is_valid: false,
            signer: UNKNOWN.to_string(),
            signature_date: UNKNOWN.to_string(),
            error: None,
        }
    }
}

impl VerificationResult {
    /// An unsigned result carrying `error`.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Anchor point of the visible signature box, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignaturePosition {
    /// Horizontal offset from the left edge
    pub x: f64,
    /// Vertical offset from the bottom edge
    pub y: f64,
}

impl SignaturePosition {
    /// Create a position, rejecting NaN and infinite coordinates.
    pub fn new(x: f64, y: f64) -> Result<Self> {
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::InvalidInput(format!("signature position ({}, {}) is not finite", x, y)));
        }
        Ok(Self { x, y })
    }
}

impl From<(f64, f64)> for SignaturePosition {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Options for signing a PDF.
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    /// Where to write the signed document; the input is replaced if unset
    pub output_path: Option<PathBuf>,
    /// Second line of the signature box; defaults to "Digitally signed by {name}"
    pub signature_text: Option<String>,
    /// Box anchor; defaults to the configured position
    pub position: Option<SignaturePosition>,
}

impl SignOptions {
    /// Create options with every field defaulted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output path.
    pub fn with_output(mut self, path: impl AsRef<Path>) -> Self {
        self.output_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the signature text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.signature_text = Some(text.into());
        self
    }

    /// Set the box anchor.
    pub fn with_position(mut self, position: impl Into<SignaturePosition>) -> Self {
        self.position = Some(position.into());
        self
    }
}

/// Document information keys written when signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoKey {
    /// `/Title`
    Title,
    /// `/Author`
    Author,
    /// `/Subject`
    Subject,
    /// `/Creator`
    Creator,
    /// `/Producer`
    Producer,
    /// `/ModDate`
    ModDate,
    /// `/Signature` (base64 RSASSA-PSS signature of the original bytes)
    Signature,
}

impl InfoKey {
    /// Every key, in the order they are written.
    pub const ALL: [InfoKey; 7] = [
        InfoKey::Title,
        InfoKey::Author,
        InfoKey::Subject,
        InfoKey::Creator,
        InfoKey::Producer,
        InfoKey::ModDate,
        InfoKey::Signature,
    ];

    /// Key name without the leading slash.
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoKey::Title => "Title",
            InfoKey::Author => "Author",
            InfoKey::Subject => "Subject",
            InfoKey::Creator => "Creator",
            InfoKey::Producer => "Producer",
            InfoKey::ModDate => "ModDate",
            InfoKey::Signature => "Signature",
        }
    }
}

impl std::fmt::Display for InfoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
