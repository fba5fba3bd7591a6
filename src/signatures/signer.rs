//! PDF signing.
//!
//! Signing rewrites the document: every page is copied into a new file,
//! the signature box is stamped onto the last page, and the document
//! information dictionary receives the signer details together with an
//! RSASSA-PSS signature over the bytes of the unsigned input.

use super::appearance::{default_signature_text, SignatureAppearance};
use super::certificate::CertificateBundle;
use super::types::{InfoKey, SignOptions, SignaturePosition};
use crate::config::SignerConfig;
use crate::document::{DocumentInfo, PdfDocument};
use crate::error::{Error, Result};
use crate::writer::{write_atomic, PageAssembler};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::{Path, PathBuf};

/// `Subject` written to signed documents.
pub const SIGNED_SUBJECT: &str = "Digitally Signed Document";

/// `ModDate` format (local time).
pub const MOD_DATE_FORMAT: &str = "D:%Y%m%d%H%M%S";

/// Signs PDF files with a [`CertificateBundle`].
#[derive(Debug, Clone, Default)]
pub struct PdfSigner {
    config: SignerConfig,
}

impl PdfSigner {
    /// Create a signer using `config` for producer tags and defaults.
    pub fn new(config: SignerConfig) -> Self {
        Self { config }
    }

    /// The signer configuration.
    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Sign the PDF at `input` and return the path written.
    ///
    /// The output goes to `options.output_path`, or replaces `input` when
    /// none is given. Nothing is written if any step fails.
    pub fn sign(&self, bundle: &CertificateBundle, input: impl AsRef<Path>, options: &SignOptions) -> Result<PathBuf> {
        let input = input.as_ref();
        if !input.is_file() {
            return Err(Error::DocumentNotFound(input.to_path_buf()));
        }

        let original = std::fs::read(input)?;
        let document_name = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let signed = self.sign_document(bundle, &original, &document_name, options)?;

        let output = options.output_path.clone().unwrap_or_else(|| input.to_path_buf());
        write_atomic(&output, &signed)?;
        log::info!(
            "Signed {} as {} ({} bytes)",
            input.display(),
            bundle.info().common_name,
            signed.len()
        );
        Ok(output)
    }

    /// Sign an in-memory PDF and return the signed bytes.
    ///
    /// `document_name` is used for the `Title` entry.
    pub fn sign_document(
        &self,
        bundle: &CertificateBundle,
        original: &[u8],
        document_name: &str,
        options: &SignOptions,
    ) -> Result<Vec<u8>> {
        let position = match options.position {
            Some(position) => SignaturePosition::new(position.x, position.y)?,
            None => SignaturePosition::new(self.config.default_position.0, self.config.default_position.1)?,
        };

        let mut doc = PdfDocument::from_bytes(original.to_vec())?;
        let existing = doc.metadata()?.unwrap_or_default();

        let mut assembler = PageAssembler::new(doc.version()).with_compression(self.config.compress_overlay);
        let page_count = assembler.import_pages(&mut doc)?;
        log::debug!("Copied {} pages for signing", page_count);

        let info = bundle.info();
        let text = options
            .signature_text
            .clone()
            .unwrap_or_else(|| default_signature_text(&info.common_name));
        let overlay = SignatureAppearance::new(info, text, position).render();
        assembler.overlay_last_page(&overlay)?;

        let signature = bundle.sign_bytes(original)?;
        assembler.set_info(&self.signed_info(existing, document_name, bundle, &signature));

        Ok(assembler.finish())
    }

    /// Existing metadata overlaid with the signing entries.
    fn signed_info(
        &self,
        mut info: DocumentInfo,
        document_name: &str,
        bundle: &CertificateBundle,
        signature: &[u8],
    ) -> DocumentInfo {
        let mod_date = chrono::Local::now().format(MOD_DATE_FORMAT).to_string();
        for key in InfoKey::ALL {
            let value = match key {
                InfoKey::Title => format!("Signed PDF - {}", document_name),
                InfoKey::Author => bundle.info().common_name.clone(),
                InfoKey::Subject => SIGNED_SUBJECT.to_string(),
                InfoKey::Creator => self.config.creator.clone(),
                InfoKey::Producer => self.config.producer.clone(),
                InfoKey::ModDate => mod_date.clone(),
                InfoKey::Signature => BASE64.encode(signature),
            };
            info.insert(key.as_str().to_string(), value);
        }
        info
    }
}
