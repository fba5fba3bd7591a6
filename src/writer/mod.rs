//! PDF writing module.
//!
//! ## Architecture
//!
//! ```text
//! [OverlayPage] (drawing surface for one page)
//!     ↓
//! [ContentStreamBuilder] (operators → content stream bytes)
//!     ↓
//! [PdfWriter] new document        [PageAssembler] pages copied from a PdfDocument
//!     ↓                                ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! PDF bytes
//! ```
//!
//! ## Writing a new document
//!
//! ```
//! use pdf_sealer::writer::{PdfWriter, StandardFont};
//!
//! let mut writer = PdfWriter::new();
//! writer
//!     .add_letter_page()
//!     .add_text("Hello, World!", 72.0, 720.0, StandardFont::Helvetica, 12.0);
//! let bytes = writer.finish()?;
//! assert!(bytes.starts_with(b"%PDF-1.7"));
//! # Ok::<(), pdf_sealer::Error>(())
//! ```

mod canvas;
mod content_stream;
mod object_serializer;
mod page_assembler;
mod pdf_writer;

pub use canvas::{OverlayPage, LETTER_HEIGHT, LETTER_WIDTH};
pub use content_stream::{Color, ContentStreamBuilder, ContentStreamOp, StandardFont};
pub use object_serializer::ObjectSerializer;
pub use page_assembler::PageAssembler;
pub use pdf_writer::{PageBuilder, PdfWriter, PdfWriterConfig};

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Write `data` to a sibling temporary file, then rename it over `path`.
///
/// Either the old content or the complete new content is at `path`
/// afterwards; the temporary file is removed on failure.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidInput(format!("not a file path: {}", path.display())))?;
    let tmp_path = path.with_file_name(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    ));

    let written = (|| -> std::io::Result<()> {
        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(data)?;
        f.flush()?;
        f.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        fs::write(&path, b"old").unwrap();

        write_atomic(&path, b"new content").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new content");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomic_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.pdf");
        let err = write_atomic(&path, b"data").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
        assert!(!path.exists());
    }
}
