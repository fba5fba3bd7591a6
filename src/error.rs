//! Error types for certificate handling, signing and PDF processing.
//!
//! Every variant belongs to one [`ErrorKind`], so callers can branch on the
//! category of failure (bad input, bad credentials, wrong state, I/O, or a
//! malformed document) without matching individual variants.

use std::path::PathBuf;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing file, empty required field, invalid position values
    Input,
    /// Missing or wrong password, malformed or mismatched key material
    Credential,
    /// Signing or saving without a loaded certificate
    State,
    /// Unreadable or unwritable path, disk failure
    Io,
    /// Malformed or unsupported PDF structure
    Document,
}

/// Error types that can occur while managing certificates and signing PDFs.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Document to sign or verify does not exist
    #[error("Document not found: {0}")]
    DocumentNotFound(PathBuf),

    /// Caller supplied an invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Key or certificate material could not be used
    #[error("Credential error: {0}")]
    Credential(String),

    /// Private key does not belong to the certificate
    #[error("Private key does not match the certificate public key")]
    KeyMismatch,

    /// Operation requires a certificate and key pair
    #[error("No certificate loaded. Generate or load a certificate first.")]
    NoCertificateLoaded,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(crate::object::ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DocumentNotFound(_) | Error::InvalidInput(_) => ErrorKind::Input,
            Error::Credential(_) | Error::KeyMismatch => ErrorKind::Credential,
            Error::NoCertificateLoaded => ErrorKind::State,
            Error::Io(_) => ErrorKind::Io,
            Error::InvalidHeader(_)
            | Error::ParseError { .. }
            | Error::InvalidXref
            | Error::InvalidObjectType { .. }
            | Error::InvalidPdf(_)
            | Error::Decode(_)
            | Error::UnsupportedFilter(_)
            | Error::Unsupported(_)
            | Error::CircularReference(_)
            | Error::RecursionLimitExceeded(_) => ErrorKind::Document,
        }
    }

    pub(crate) fn credential(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Credential(format!("{}: {}", context, err))
    }
}
