//! Single-page drawing surface.
//!
//! An [`OverlayPage`] collects drawing operations for one page. It can be
//! written out as a standalone one-page PDF or stamped onto an existing
//! page as a Form XObject by the [`PageAssembler`](super::PageAssembler).

use super::content_stream::{Color, ContentStreamBuilder, StandardFont};
use super::pdf_writer::PdfWriter;
use crate::error::Result;
use crate::object::{Dictionary, Object};
use std::collections::HashMap;

/// US Letter width in points.
pub const LETTER_WIDTH: f32 = 612.0;
/// US Letter height in points.
pub const LETTER_HEIGHT: f32 = 792.0;

/// A blank page-sized canvas.
#[derive(Debug, Clone)]
pub struct OverlayPage {
    width: f32,
    height: f32,
    content: ContentStreamBuilder,
}

impl OverlayPage {
    /// Create a canvas of the given size in points.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            content: ContentStreamBuilder::new(),
        }
    }

    /// Create a US Letter canvas (8.5" x 11").
    pub fn letter() -> Self {
        Self::new(LETTER_WIDTH, LETTER_HEIGHT)
    }

    /// Page width in points.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Page height in points.
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Set the colour used by later strokes.
    pub fn stroke_color(&mut self, color: Color) -> &mut Self {
        self.content.stroke_color(color);
        self
    }

    /// Set the colour used by later fills and text.
    pub fn fill_color(&mut self, color: Color) -> &mut Self {
        self.content.fill_color(color);
        self
    }

    /// Set the stroke width.
    pub fn line_width(&mut self, width: f32) -> &mut Self {
        self.content.set_line_width(width);
        self
    }

    /// Outline a rectangle with the current stroke colour.
    pub fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.content.rect(x, y, width, height).stroke();
        self
    }

    /// Draw one line of text with its baseline starting at (x, y).
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32, font: StandardFont, size: f32) -> &mut Self {
        self.content
            .begin_text()
            .set_font(font, size)
            .text(text, x, y)
            .end_text();
        self
    }

    /// Fonts used by the text drawn so far.
    pub fn fonts(&self) -> &[StandardFont] {
        self.content.fonts_used()
    }

    /// The content stream for everything drawn so far.
    pub fn content_bytes(&self) -> Result<Vec<u8>> {
        self.content.build()
    }

    /// `<< /Font << ... >> >>` naming every used font as a direct dictionary.
    pub fn font_resources(&self) -> Dictionary {
        let mut fonts = HashMap::new();
        for &font in self.fonts() {
            fonts.insert(font.resource_name().to_string(), font_dictionary(font));
        }
        let mut resources = HashMap::new();
        resources.insert("Font".to_string(), Object::Dictionary(fonts));
        resources
    }

    /// Serialize the canvas as a one-page PDF.
    pub fn to_pdf(&self) -> Result<Vec<u8>> {
        let mut writer = PdfWriter::new();
        writer.push_page(self.clone());
        writer.finish()
    }
}

/// `<< /Type /Font /Subtype /Type1 /BaseFont ... >>` for a standard font.
pub(crate) fn font_dictionary(font: StandardFont) -> Object {
    let mut dict = HashMap::new();
    dict.insert("Type".to_string(), Object::name("Font"));
    dict.insert("Subtype".to_string(), Object::name("Type1"));
    dict.insert("BaseFont".to_string(), Object::name(font.base_font()));
    if font.uses_win_ansi() {
        dict.insert("Encoding".to_string(), Object::name("WinAnsiEncoding"));
    }
    Object::Dictionary(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PdfDocument;

    #[test]
    fn test_draw_and_resources() {
        let mut page = OverlayPage::letter();
        page.stroke_color(Color::Blue)
            .line_width(2.0)
            .stroke_rect(10.0, 10.0, 100.0, 50.0)
            .draw_text("Title", 20.0, 40.0, StandardFont::HelveticaBold, 10.0)
            .draw_text("Body", 20.0, 20.0, StandardFont::Helvetica, 8.0);

        assert_eq!(page.fonts(), &[StandardFont::HelveticaBold, StandardFont::Helvetica]);
        let resources = page.font_resources();
        let fonts = resources.get("Font").unwrap().as_dict().unwrap();
        assert_eq!(
            fonts.get("HeBo").unwrap().as_dict().unwrap().get("BaseFont").unwrap().as_name(),
            Some("Helvetica-Bold")
        );

        let content = String::from_utf8(page.content_bytes().unwrap()).unwrap();
        assert!(content.starts_with("0 0 1 RG\n2 w\n10 10 100 50 re\nS\nBT\n/HeBo 10 Tf"));
        assert!(content.contains("(Body) Tj\nET\n"));
    }

    #[test]
    fn test_to_pdf_is_readable() {
        let mut page = OverlayPage::new(300.0, 200.0);
        page.draw_text("Hello", 10.0, 10.0, StandardFont::Courier, 12.0);

        let mut doc = PdfDocument::from_bytes(page.to_pdf().unwrap()).unwrap();
        let tree = doc.pages().unwrap();
        assert_eq!(tree.pages.len(), 1);
        let media_box = tree.pages[0].dict.get("MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_number(), Some(300.0));
        assert_eq!(media_box[3].as_number(), Some(200.0));
    }
}
