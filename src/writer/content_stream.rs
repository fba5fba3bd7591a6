//! PDF content stream builder.
//!
//! Builds PDF content streams containing graphics and text operators
//! according to PDF specification ISO 32000-1:2008 Section 8-9.

use crate::error::Result;
use std::io::Write;

/// Colours available to overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// Black
    Black,
    /// White
    White,
    /// Blue (0, 0, 1)
    Blue,
    /// Dark blue
    DarkBlue,
    /// Red
    Red,
    /// Green
    Green,
    /// Mid gray
    Gray,
}

impl Color {
    /// RGB components in the 0..=1 range.
    pub fn rgb(self) -> (f32, f32, f32) {
        match self {
            Color::Black => (0.0, 0.0, 0.0),
            Color::White => (1.0, 1.0, 1.0),
            Color::Blue => (0.0, 0.0, 1.0),
            Color::DarkBlue => (0.0, 0.0, 0.5),
            Color::Red => (1.0, 0.0, 0.0),
            Color::Green => (0.0, 0.5, 0.0),
            Color::Gray => (0.5, 0.5, 0.5),
        }
    }
}

/// The standard 14 Type 1 fonts that need no embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    /// Helvetica
    Helvetica,
    /// Helvetica-Bold
    HelveticaBold,
    /// Helvetica-Oblique
    HelveticaOblique,
    /// Helvetica-BoldOblique
    HelveticaBoldOblique,
    /// Times-Roman
    TimesRoman,
    /// Times-Bold
    TimesBold,
    /// Times-Italic
    TimesItalic,
    /// Times-BoldItalic
    TimesBoldItalic,
    /// Courier
    Courier,
    /// Courier-Bold
    CourierBold,
    /// Courier-Oblique
    CourierOblique,
    /// Courier-BoldOblique
    CourierBoldOblique,
    /// Symbol
    Symbol,
    /// ZapfDingbats
    ZapfDingbats,
}

impl StandardFont {
    /// PostScript name used for `/BaseFont`.
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
            StandardFont::Symbol => "Symbol",
            StandardFont::ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Name of the font in a `/Font` resource dictionary.
    pub fn resource_name(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helv",
            StandardFont::HelveticaBold => "HeBo",
            StandardFont::HelveticaOblique => "HeOb",
            StandardFont::HelveticaBoldOblique => "HeBO",
            StandardFont::TimesRoman => "TiRo",
            StandardFont::TimesBold => "TiBo",
            StandardFont::TimesItalic => "TiIt",
            StandardFont::TimesBoldItalic => "TiBI",
            StandardFont::Courier => "Cour",
            StandardFont::CourierBold => "CoBo",
            StandardFont::CourierOblique => "CoOb",
            StandardFont::CourierBoldOblique => "CoBO",
            StandardFont::Symbol => "Symb",
            StandardFont::ZapfDingbats => "ZaDb",
        }
    }

    /// Symbol and ZapfDingbats have their own built-in encodings.
    pub fn uses_win_ansi(self) -> bool {
        !matches!(self, StandardFont::Symbol | StandardFont::ZapfDingbats)
    }
}

/// Operations that can be added to a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentStreamOp {
    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Set transformation matrix (cm)
    Transform(f32, f32, f32, f32, f32, f32),
    /// Begin text object (BT)
    BeginText,
    /// End text object (ET)
    EndText,
    /// Set font and size (Tf)
    SetFont(StandardFont, f32),
    /// Set text matrix (Tm)
    SetTextMatrix(f32, f32, f32, f32, f32, f32),
    /// Show text (Tj) - literal string
    ShowText(String),
    /// Set fill color RGB (rg)
    SetFillColorRGB(f32, f32, f32),
    /// Set stroke color RGB (RG)
    SetStrokeColorRGB(f32, f32, f32),
    /// Set line width (w)
    SetLineWidth(f32),
    /// Rectangle (re)
    Rectangle(f32, f32, f32, f32),
    /// Stroke (S)
    Stroke,
    /// Paint XObject (Do)
    PaintXObject(String),
}

/// Builder for PDF content streams.
#[derive(Debug, Clone, Default)]
pub struct ContentStreamBuilder {
    /// Operations in the stream
    operations: Vec<ContentStreamOp>,
    /// Current font
    current_font: Option<(StandardFont, f32)>,
    /// Whether we're in a text object
    in_text_object: bool,
    /// Every font selected so far, for the resource dictionary
    fonts_used: Vec<StandardFont>,
}

impl ContentStreamBuilder {
    /// Create a new content stream builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation to the stream.
    pub fn op(&mut self, op: ContentStreamOp) -> &mut Self {
        if let ContentStreamOp::SetFont(font, _) = op {
            if !self.fonts_used.contains(&font) {
                self.fonts_used.push(font);
            }
        }
        self.operations.push(op);
        self
    }

    /// Operations added so far.
    pub fn operations(&self) -> &[ContentStreamOp] {
        &self.operations
    }

    /// Fonts referenced by `Tf` operators, in first-use order.
    pub fn fonts_used(&self) -> &[StandardFont] {
        &self.fonts_used
    }

    /// Begin a text object.
    pub fn begin_text(&mut self) -> &mut Self {
        if !self.in_text_object {
            self.op(ContentStreamOp::BeginText);
            self.in_text_object = true;
            // Tf does not survive ET, so the next text object must set it again
            self.current_font = None;
        }
        self
    }

    /// End a text object.
    pub fn end_text(&mut self) -> &mut Self {
        if self.in_text_object {
            self.op(ContentStreamOp::EndText);
            self.in_text_object = false;
        }
        self
    }

    /// Set font for text operations.
    pub fn set_font(&mut self, font: StandardFont, size: f32) -> &mut Self {
        if self.current_font != Some((font, size)) {
            self.op(ContentStreamOp::SetFont(font, size));
            self.current_font = Some((font, size));
        }
        self
    }

    /// Add text at a position (literal string for Base-14 fonts).
    pub fn text(&mut self, text: &str, x: f32, y: f32) -> &mut Self {
        self.begin_text();
        self.op(ContentStreamOp::SetTextMatrix(1.0, 0.0, 0.0, 1.0, x, y));
        self.op(ContentStreamOp::ShowText(text.to_string()));
        self
    }

    /// Set fill color.
    pub fn fill_color(&mut self, color: Color) -> &mut Self {
        let (r, g, b) = color.rgb();
        self.op(ContentStreamOp::SetFillColorRGB(r, g, b))
    }

    /// Set stroke color.
    pub fn stroke_color(&mut self, color: Color) -> &mut Self {
        let (r, g, b) = color.rgb();
        self.op(ContentStreamOp::SetStrokeColorRGB(r, g, b))
    }

    /// Set line width.
    pub fn set_line_width(&mut self, width: f32) -> &mut Self {
        self.op(ContentStreamOp::SetLineWidth(width))
    }

    /// Add a rectangle path.
    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.op(ContentStreamOp::Rectangle(x, y, width, height))
    }

    /// Stroke the current path.
    pub fn stroke(&mut self) -> &mut Self {
        self.op(ContentStreamOp::Stroke)
    }

    /// Save graphics state.
    pub fn save_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::SaveState)
    }

    /// Restore graphics state.
    pub fn restore_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::RestoreState)
    }

    /// Apply a transformation matrix.
    pub fn transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> &mut Self {
        self.op(ContentStreamOp::Transform(a, b, c, d, e, f))
    }

    /// Paint a named XObject.
    pub fn paint_xobject(&mut self, name: &str) -> &mut Self {
        self.op(ContentStreamOp::PaintXObject(name.to_string()))
    }

    /// Build the content stream bytes.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();

        for op in &self.operations {
            self.write_op(&mut buf, op)?;
            writeln!(buf)?;
        }

        Ok(buf)
    }

    /// Write a single operation to the buffer.
    fn write_op<W: Write>(&self, w: &mut W, op: &ContentStreamOp) -> std::io::Result<()> {
        match op {
            ContentStreamOp::SaveState => write!(w, "q"),
            ContentStreamOp::RestoreState => write!(w, "Q"),
            ContentStreamOp::Transform(a, b, c, d, e, f) => {
                write!(w, "{} {} {} {} {} {} cm", a, b, c, d, e, f)
            },
            ContentStreamOp::BeginText => write!(w, "BT"),
            ContentStreamOp::EndText => write!(w, "ET"),
            ContentStreamOp::SetFont(font, size) => {
                write!(w, "/{} {} Tf", font.resource_name(), size)
            },
            ContentStreamOp::SetTextMatrix(a, b, c, d, e, f) => {
                write!(w, "{} {} {} {} {} {} Tm", a, b, c, d, e, f)
            },
            ContentStreamOp::ShowText(text) => {
                write!(w, "(")?;
                write_escaped_text(w, text)?;
                write!(w, ") Tj")
            },
            ContentStreamOp::SetFillColorRGB(r, g, b) => write!(w, "{} {} {} rg", r, g, b),
            ContentStreamOp::SetStrokeColorRGB(r, g, b) => write!(w, "{} {} {} RG", r, g, b),
            ContentStreamOp::SetLineWidth(width) => write!(w, "{} w", width),
            ContentStreamOp::Rectangle(x, y, width, height) => {
                write!(w, "{} {} {} {} re", x, y, width, height)
            },
            ContentStreamOp::Stroke => write!(w, "S"),
            ContentStreamOp::PaintXObject(name) => {
                let mut buf = Vec::new();
                super::object_serializer::write_name(&mut buf, name);
                w.write_all(&buf)?;
                write!(w, " Do")
            },
        }
    }
}

/// Write text as a WinAnsi literal string body.
///
/// Characters outside Latin-1 have no glyph in the standard fonts and are
/// replaced with `?`.
fn write_escaped_text<W: Write>(w: &mut W, text: &str) -> std::io::Result<()> {
    for c in text.chars() {
        let byte = match c as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ if c == '\t' => b' ',
            _ => b'?',
        };
        match byte {
            b'(' => w.write_all(b"\\(")?,
            b')' => w.write_all(b"\\)")?,
            b'\\' => w.write_all(b"\\\\")?,
            _ => w.write_all(&[byte])?,
        }
    }
    Ok(())
}
