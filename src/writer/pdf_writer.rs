//! PDF document writer.
//!
//! Assembles complete PDF documents with proper structure:
//! header, body, xref table, and trailer.

use super::canvas::{font_dictionary, OverlayPage, LETTER_HEIGHT, LETTER_WIDTH};
use super::content_stream::{Color, StandardFont};
use super::object_serializer::ObjectSerializer;
use crate::decoders::flate_encode;
use crate::error::Result;
use crate::object::{encode_text_string, Dictionary, Object, ObjectRef};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Configuration for PDF generation.
#[derive(Debug, Clone)]
pub struct PdfWriterConfig {
    /// PDF version (e.g., "1.7")
    pub version: String,
    /// Document title
    pub title: Option<String>,
    /// Document author
    pub author: Option<String>,
    /// Document subject
    pub subject: Option<String>,
    /// Creator application
    pub creator: Option<String>,
    /// Producer application
    pub producer: Option<String>,
    /// Whether to compress streams
    pub compress: bool,
}

impl Default for PdfWriterConfig {
    fn default() -> Self {
        Self {
            version: "1.7".to_string(),
            title: None,
            author: None,
            subject: None,
            creator: None,
            producer: None,
            compress: false,
        }
    }
}

impl PdfWriterConfig {
    /// Set document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set document author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set document subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the creator application.
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    /// Set the producer application.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    fn info_entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("Title", &self.title),
            ("Author", &self.author),
            ("Subject", &self.subject),
            ("Creator", &self.creator),
            ("Producer", &self.producer),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect()
    }
}

/// A page being built.
pub struct PageBuilder<'a> {
    writer: &'a mut PdfWriter,
    page_index: usize,
}

impl<'a> PageBuilder<'a> {
    fn page(&mut self) -> &mut OverlayPage {
        &mut self.writer.pages[self.page_index]
    }

    /// Add text to the page.
    pub fn add_text(&mut self, text: &str, x: f32, y: f32, font: StandardFont, size: f32) -> &mut Self {
        self.page().draw_text(text, x, y, font, size);
        self
    }

    /// Draw a rectangle outline on the page.
    pub fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.page().stroke_rect(x, y, width, height);
        self
    }

    /// Set the stroke colour.
    pub fn stroke_color(&mut self, color: Color) -> &mut Self {
        self.page().stroke_color(color);
        self
    }

    /// Set the fill colour.
    pub fn fill_color(&mut self, color: Color) -> &mut Self {
        self.page().fill_color(color);
        self
    }

    /// Finish building this page and return to the writer.
    pub fn finish(self) -> &'a mut PdfWriter {
        self.writer
    }
}

/// PDF document writer.
///
/// Builds a complete PDF document from [`OverlayPage`]s using only the
/// standard 14 fonts.
#[derive(Debug, Default)]
pub struct PdfWriter {
    config: PdfWriterConfig,
    pages: Vec<OverlayPage>,
}

impl PdfWriter {
    /// Create a new PDF writer with default config.
    pub fn new() -> Self {
        Self::with_config(PdfWriterConfig::default())
    }

    /// Create a PDF writer with custom config.
    pub fn with_config(config: PdfWriterConfig) -> Self {
        Self {
            config,
            pages: Vec::new(),
        }
    }

    /// Add a page with the given dimensions.
    pub fn add_page(&mut self, width: f32, height: f32) -> PageBuilder<'_> {
        let page_index = self.pages.len();
        self.pages.push(OverlayPage::new(width, height));
        PageBuilder {
            writer: self,
            page_index,
        }
    }

    /// Add a US Letter sized page (8.5" x 11").
    pub fn add_letter_page(&mut self) -> PageBuilder<'_> {
        self.add_page(LETTER_WIDTH, LETTER_HEIGHT)
    }

    /// Append an already drawn page.
    pub fn push_page(&mut self, page: OverlayPage) -> &mut Self {
        self.pages.push(page);
        self
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Build the complete PDF document.
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut objects = BTreeMap::new();
        let catalog_id = 1;
        let pages_id = 2;
        let mut next_id = 3;
        let mut alloc = || {
            let id = next_id;
            next_id += 1;
            id
        };

        // One shared font object per standard font
        let mut font_ids: BTreeMap<StandardFont, u32> = BTreeMap::new();
        for page in &self.pages {
            for &font in page.fonts() {
                if !font_ids.contains_key(&font) {
                    let id = alloc();
                    font_ids.insert(font, id);
                    objects.insert(id, font_dictionary(font));
                }
            }
        }

        let mut kids = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let content = page.content_bytes()?;
            let mut stream_dict = HashMap::new();
            let data = if self.config.compress {
                stream_dict.insert("Filter".to_string(), Object::name("FlateDecode"));
                flate_encode(&content)?
            } else {
                content
            };
            let content_id = alloc();
            objects.insert(content_id, Object::stream(stream_dict, data));

            let mut fonts = HashMap::new();
            for font in page.fonts() {
                if let Some(&id) = font_ids.get(font) {
                    fonts.insert(font.resource_name().to_string(), Object::reference(id));
                }
            }
            let mut resources = HashMap::new();
            resources.insert("Font".to_string(), Object::Dictionary(fonts));

            let mut page_dict = HashMap::new();
            page_dict.insert("Type".to_string(), Object::name("Page"));
            page_dict.insert("Parent".to_string(), Object::reference(pages_id));
            page_dict.insert("MediaBox".to_string(), media_box(page.width(), page.height()));
            page_dict.insert("Resources".to_string(), Object::Dictionary(resources));
            page_dict.insert("Contents".to_string(), Object::reference(content_id));

            let page_id = alloc();
            objects.insert(page_id, Object::Dictionary(page_dict));
            kids.push(Object::reference(page_id));
        }

        let mut pages_dict = HashMap::new();
        pages_dict.insert("Type".to_string(), Object::name("Pages"));
        pages_dict.insert("Count".to_string(), Object::Integer(kids.len() as i64));
        pages_dict.insert("Kids".to_string(), Object::Array(kids));
        objects.insert(pages_id, Object::Dictionary(pages_dict));

        let mut catalog = HashMap::new();
        catalog.insert("Type".to_string(), Object::name("Catalog"));
        catalog.insert("Pages".to_string(), Object::reference(pages_id));
        objects.insert(catalog_id, Object::Dictionary(catalog));

        let entries = self.config.info_entries();
        let info_id = if entries.is_empty() {
            None
        } else {
            let info: Dictionary = entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), Object::String(encode_text_string(value))))
                .collect();
            let id = alloc();
            objects.insert(id, Object::Dictionary(info));
            Some(id)
        };

        log::debug!("Writing {} pages in {} objects", self.pages.len(), objects.len());
        Ok(write_document(&self.config.version, &objects, catalog_id, info_id))
    }

    /// Save the PDF to a file.
    pub fn save(self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.finish()?;
        super::write_atomic(path.as_ref(), &bytes)
    }
}

pub(crate) fn media_box(width: f32, height: f32) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Real(width as f64),
        Object::Real(height as f64),
    ])
}

/// Lay out a whole file: header, numbered objects, classic xref table and
/// trailer with a fresh `/ID`.
///
/// Object numbers missing from `objects` are written as free entries.
pub(crate) fn write_document(
    version: &str,
    objects: &BTreeMap<u32, Object>,
    root: u32,
    info: Option<u32>,
) -> Vec<u8> {
    let serializer = ObjectSerializer::new();
    let mut output = format!("%PDF-{}\n", version).into_bytes();
    // Binary marker (recommended for binary content)
    output.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets: BTreeMap<u32, usize> = BTreeMap::new();
    for (&id, obj) in objects {
        offsets.insert(id, output.len());
        output.extend_from_slice(&serializer.serialize_indirect(id, 0, obj));
    }

    let size = objects.keys().next_back().map_or(1, |&max| max + 1);
    let xref_start = output.len();
    output.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
    // Object 0 is always free
    output.extend_from_slice(b"0000000000 65535 f \n");
    for id in 1..size {
        match offsets.get(&id) {
            Some(offset) => output.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes()),
            None => output.extend_from_slice(b"0000000000 00001 f \n"),
        }
    }

    let file_id = Object::String(uuid::Uuid::new_v4().as_bytes().to_vec());
    let mut trailer = HashMap::new();
    trailer.insert("Size".to_string(), Object::Integer(size as i64));
    trailer.insert("Root".to_string(), Object::Reference(ObjectRef::new(root, 0)));
    if let Some(info) = info {
        trailer.insert("Info".to_string(), Object::Reference(ObjectRef::new(info, 0)));
    }
    trailer.insert("ID".to_string(), Object::Array(vec![file_id.clone(), file_id]));

    output.extend_from_slice(b"trailer\n");
    output.extend_from_slice(&ObjectSerializer::compact().serialize(&Object::Dictionary(trailer)));
    output.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_start).as_bytes());
    output
}
