//! Visible signature box stamped on the signed page.

use super::types::{SignatureInfo, SignaturePosition};
use crate::writer::{Color, OverlayPage, StandardFont};

/// Overlay timestamp format (local time).
pub const APPEARANCE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BOX_WIDTH: f32 = 200.0;
const BOX_HEIGHT: f32 = 80.0;
const BOX_MARGIN: f32 = 10.0;
const MAX_TEXT_CHARS: usize = 30;
const MAX_NAME_CHARS: usize = 25;

/// Layout of the signature box.
///
/// ```text
///   +--------------------------+
///   | DIGITALLY SIGNED         |   y + 50, Helvetica-Bold 10
///   | <signature text>         |   y + 35, Helvetica 9
///   | Date: <timestamp>        |   y + 20, Helvetica 8
///   | By: <common name>        |   y + 10
///   | Org: <organization>      |   y
///   +--------------------------+
/// ```
///
/// The box is 200x80 points with its lower-left corner at
/// (x - 10, y - 10).
#[derive(Debug, Clone)]
pub struct SignatureAppearance {
    position: SignaturePosition,
    text: String,
    signer: String,
    organization: String,
    timestamp: String,
}

impl SignatureAppearance {
    /// Appearance for `info`, timestamped now.
    pub fn new(info: &SignatureInfo, text: impl Into<String>, position: SignaturePosition) -> Self {
        Self {
            position,
            text: text.into(),
            signer: info.common_name.clone(),
            organization: info.organization.clone(),
            timestamp: chrono::Local::now().format(APPEARANCE_TIME_FORMAT).to_string(),
        }
    }

    /// Replace the timestamp shown on the `Date:` line.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Draw the box on a US Letter canvas.
    pub fn render(&self) -> OverlayPage {
        let mut page = OverlayPage::letter();
        let x = self.position.x as f32;
        let y = self.position.y as f32;

        page.stroke_color(Color::Blue)
            .line_width(2.0)
            .stroke_rect(x - BOX_MARGIN, y - BOX_MARGIN, BOX_WIDTH, BOX_HEIGHT)
            .fill_color(Color::Blue)
            .draw_text("DIGITALLY SIGNED", x, y + 50.0, StandardFont::HelveticaBold, 10.0)
            .draw_text(&truncate(&self.text, MAX_TEXT_CHARS), x, y + 35.0, StandardFont::Helvetica, 9.0)
            .draw_text(&format!("Date: {}", self.timestamp), x, y + 20.0, StandardFont::Helvetica, 8.0)
            .draw_text(
                &format!("By: {}", truncate(&self.signer, MAX_NAME_CHARS)),
                x,
                y + 10.0,
                StandardFont::Helvetica,
                8.0,
            )
            .draw_text(
                &format!("Org: {}", truncate(&self.organization, MAX_NAME_CHARS)),
                x,
                y,
                StandardFont::Helvetica,
                8.0,
            );
        page
    }
}

/// Default second line of the box.
pub fn default_signature_text(common_name: &str) -> String {
    format!("Digitally signed by {}", common_name)
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::types::NOT_SPECIFIED;

    fn info(common_name: &str, organization: &str) -> SignatureInfo {
        SignatureInfo {
            common_name: common_name.to_string(),
            email: NOT_SPECIFIED.to_string(),
            organization: organization.to_string(),
            country: "US".to_string(),
            created: "2026-01-01 00:00:00".to_string(),
            valid_until: "2027-01-01 00:00:00".to_string(),
        }
    }

    fn render_text(appearance: &SignatureAppearance) -> String {
        String::from_utf8(appearance.render().content_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_layout() {
        let appearance = SignatureAppearance::new(
            &info("Alice", "Acme Corp"),
            default_signature_text("Alice"),
            SignaturePosition { x: 400.0, y: 50.0 },
        )
        .with_timestamp("2026-10-16 09:30:00");
        let content = render_text(&appearance);

        assert!(content.contains("390 40 200 80 re"));
        assert!(content.contains("2 w"));
        assert!(content.contains("(DIGITALLY SIGNED) Tj"));
        assert!(content.contains("1 0 0 1 400 100 Tm"));
        assert!(content.contains("(Digitally signed by Alice) Tj"));
        assert!(content.contains("(Date: 2026-10-16 09:30:00) Tj"));
        assert!(content.contains("(By: Alice) Tj"));
        assert!(content.contains("(Org: Acme Corp) Tj"));
        assert!(content.contains("1 0 0 1 400 50 Tm"));
        assert!(content.contains("/HeBo 10 Tf"));
        assert!(content.contains("/Helv 8 Tf"));
    }

    #[test]
    fn test_long_fields_truncated() {
        let long_name = "A".repeat(40);
        let appearance = SignatureAppearance::new(
            &info(&long_name, "Org"),
            "x".repeat(50),
            SignaturePosition { x: 0.0, y: 0.0 },
        );
        let content = render_text(&appearance);

        assert!(content.contains(&format!("({}) Tj", "x".repeat(30))));
        assert!(!content.contains(&"x".repeat(31)));
        assert!(content.contains(&format!("(By: {}) Tj", "A".repeat(25))));
        assert!(!content.contains(&"A".repeat(26)));
    }

    #[test]
    fn test_fonts_registered() {
        let appearance =
            SignatureAppearance::new(&info("Bob", NOT_SPECIFIED), "text", SignaturePosition { x: 10.0, y: 10.0 });
        let page = appearance.render();
        assert_eq!(page.fonts(), &[StandardFont::HelveticaBold, StandardFont::Helvetica]);
    }
}
