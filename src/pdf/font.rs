//! Font programs and advance-width metrics
//!
//! All text is written with simple (single-byte) fonts in WinAnsiEncoding.
//! The same per-code width table is used both to measure text for layout
//! and as the `/Widths` array of the embedded font dictionary, so a string
//! measured here renders at exactly the measured width.

use std::sync::Arc;

use crate::error::{Error, Result};

/// First character code covered by the width tables
pub const FIRST_CHAR: u8 = 32;
/// Last character code covered by the width tables
pub const LAST_CHAR: u8 = 255;

const TABLE_LEN: usize = (LAST_CHAR - FIRST_CHAR) as usize + 1;

/// Weight selector for the two faces of a [`Typeface`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Regular,
    Bold,
}

impl FontWeight {
    /// Name of the font in every page's resource dictionary
    pub fn resource_name(self) -> &'static str {
        match self {
            FontWeight::Regular => "F1",
            FontWeight::Bold => "F2",
        }
    }
}

/// Vertical metrics of a TrueType face, in 1/1000 em
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMetrics {
    pub bbox: [f32; 4],
    pub ascent: f32,
    pub descent: f32,
    pub cap_height: f32,
}

/// How the font reaches the PDF
#[derive(Debug, Clone)]
pub enum FontProgram {
    /// One of the standard 14 fonts; nothing is embedded
    Standard,
    /// A TrueType program embedded as `FontFile2`
    TrueType {
        data: Arc<Vec<u8>>,
        metrics: FaceMetrics,
    },
}

/// A measurable, embeddable font
#[derive(Debug, Clone)]
pub struct Font {
    base_name: String,
    program: FontProgram,
    widths: Vec<f32>,
}

impl Font {
    /// Standard Helvetica
    pub fn helvetica() -> Self {
        Self {
            base_name: "Helvetica".to_string(),
            program: FontProgram::Standard,
            widths: HELVETICA_WIDTHS.iter().map(|&w| w as f32).collect(),
        }
    }

    /// Standard Helvetica-Bold
    pub fn helvetica_bold() -> Self {
        Self {
            base_name: "Helvetica-Bold".to_string(),
            program: FontProgram::Standard,
            widths: HELVETICA_BOLD_WIDTHS.iter().map(|&w| w as f32).collect(),
        }
    }

    /// Load a TrueType/OpenType face, reading advance widths with rustybuzz
    pub fn from_truetype(base_name: &str, data: Vec<u8>) -> Result<Self> {
        let face = rustybuzz::Face::from_slice(&data, 0)
            .ok_or_else(|| Error::Font(format!("{}: not a TrueType/OpenType face", base_name)))?;

        let units_per_em = face.units_per_em() as f32;
        if units_per_em <= 0.0 {
            return Err(Error::Font(format!("{}: zero units per em", base_name)));
        }
        let scale = 1000.0 / units_per_em;

        let widths = (FIRST_CHAR..=LAST_CHAR)
            .map(|code| {
                winansi_to_char(code)
                    .and_then(|ch| face.glyph_index(ch))
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .map(|advance| advance as f32 * scale)
                    .unwrap_or(0.0)
            })
            .collect();

        let bbox = face.global_bounding_box();
        let metrics = FaceMetrics {
            bbox: [
                bbox.x_min as f32 * scale,
                bbox.y_min as f32 * scale,
                bbox.x_max as f32 * scale,
                bbox.y_max as f32 * scale,
            ],
            ascent: face.ascender() as f32 * scale,
            descent: face.descender() as f32 * scale,
            cap_height: face.capital_height().unwrap_or(face.ascender()) as f32 * scale,
        };

        // PDF names may not contain spaces
        let base_name: String = base_name.chars().filter(|c| !c.is_whitespace()).collect();

        Ok(Self {
            base_name,
            program: FontProgram::TrueType {
                data: Arc::new(data),
                metrics,
            },
            widths,
        })
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn program(&self) -> &FontProgram {
        &self.program
    }

    /// Advance widths for codes `FIRST_CHAR..=LAST_CHAR`, in 1/1000 em
    pub fn widths(&self) -> &[f32] {
        &self.widths
    }

    /// Rendered width of `text` at `size` points
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: f32 = encode_winansi(text)
            .into_iter()
            .map(|code| self.code_width(code))
            .sum();
        units * size / 1000.0
    }

    /// Bytes to place in a `Tj` string for `text`
    pub fn encode(&self, text: &str) -> Vec<u8> {
        encode_winansi(text)
    }

    fn code_width(&self, code: u8) -> f32 {
        if code < FIRST_CHAR {
            return 0.0;
        }
        self.widths
            .get((code - FIRST_CHAR) as usize)
            .copied()
            .unwrap_or(0.0)
    }
}

/// The regular/bold pair every layout draws with
#[derive(Debug, Clone)]
pub struct Typeface {
    pub regular: Font,
    pub bold: Font,
}

impl Typeface {
    pub fn font(&self, weight: FontWeight) -> &Font {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }
}

impl Default for Typeface {
    fn default() -> Self {
        Self {
            regular: Font::helvetica(),
            bold: Font::helvetica_bold(),
        }
    }
}

/// WinAnsi code points 0x80..=0x9F that differ from Latin-1
const WINANSI_HIGH: [(u8, char); 27] = [
    (0x80, '\u{20AC}'),
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'),
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'),
    (0x96, '\u{2013}'),
    (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'),
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

fn char_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    WINANSI_HIGH
        .iter()
        .find(|(_, c)| *c == ch)
        .map(|(code, _)| *code)
}

fn winansi_to_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        _ => WINANSI_HIGH
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, ch)| *ch),
    }
}

/// Encode text as WinAnsi; whitespace controls become spaces, anything
/// unencodable becomes `?`
pub fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| {
            if ch.is_whitespace() && (ch as u32) < 0x20 {
                b' '
            } else {
                char_to_winansi(ch).unwrap_or(b'?')
            }
        })
        .collect()
}

/// Helvetica AFM widths for WinAnsi codes 32-255
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; TABLE_LEN] = [
    // 32-47
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    // 48-63
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    // 64-79
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    // 80-95
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    // 96-111
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    // 112-127
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, 350,
    // 128-143
    556, 350, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 350, 611, 350,
    // 144-159
    350, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 350, 500, 667,
    // 160-175
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    // 176-191
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    // 192-207
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    // 208-223
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    // 224-239
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    // 240-255
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

/// Helvetica-Bold AFM widths for WinAnsi codes 32-255
#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; TABLE_LEN] = [
    // 32-47
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    // 48-63
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    // 64-79
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    // 80-95
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    // 96-111
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    // 112-127
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, 350,
    // 128-143
    556, 350, 278, 556, 500, 1000, 556, 556, 333, 1000, 667, 333, 1000, 350, 611, 350,
    // 144-159
    350, 278, 278, 500, 500, 350, 556, 1000, 333, 1000, 556, 333, 944, 350, 500, 667,
    // 160-175
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    // 176-191
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    // 192-207
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    // 208-223
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    // 224-239
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278,
    // 240-255
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556,
];

/// Smallest TrueType face the parser accepts: `.notdef`, `A` and space
#[cfg(test)]
pub(crate) fn tiny_truetype() -> Vec<u8> {
    fn be16(out: &mut Vec<u8>, values: &[u16]) {
        for v in values {
            out.extend_from_slice(&v.to_be_bytes());
        }
    }

    // Format 6 cmap covering U+0020..=U+0041
    let mut cmap = Vec::new();
    be16(&mut cmap, &[0, 1, 3, 1]);
    cmap.extend_from_slice(&12u32.to_be_bytes());
    let mut glyphs = vec![0u16; 0x22];
    glyphs[0] = 2;
    glyphs[0x21] = 1;
    be16(&mut cmap, &[6, 10 + 2 * glyphs.len() as u16, 0, 0x20, glyphs.len() as u16]);
    be16(&mut cmap, &glyphs);

    let mut head = Vec::new();
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    head.extend_from_slice(&0u32.to_be_bytes());
    head.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
    be16(&mut head, &[0, 1000]);
    head.extend_from_slice(&[0; 16]);
    for v in [0i16, -200, 600, 800] {
        head.extend_from_slice(&v.to_be_bytes());
    }
    be16(&mut head, &[0, 8, 2, 0, 0]);

    let mut hhea = Vec::new();
    hhea.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    for v in [800i16, -200, 0] {
        hhea.extend_from_slice(&v.to_be_bytes());
    }
    be16(&mut hhea, &[600, 0, 0, 600, 1, 0, 0, 0, 0, 0, 0, 0, 3]);

    let mut hmtx = Vec::new();
    be16(&mut hmtx, &[500, 0, 600, 0, 250, 0]);

    let mut maxp = Vec::new();
    maxp.extend_from_slice(&0x0000_5000u32.to_be_bytes());
    be16(&mut maxp, &[3]);

    // Table records must be sorted by tag
    let tables: [(&[u8; 4], Vec<u8>); 5] = [
        (b"cmap", cmap),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"maxp", maxp),
    ];
    let mut font = Vec::new();
    font.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    be16(&mut font, &[tables.len() as u16, 64, 2, 16]);

    let mut offset = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in &tables {
        font.extend_from_slice(*tag);
        font.extend_from_slice(&0u32.to_be_bytes());
        font.extend_from_slice(&(offset as u32).to_be_bytes());
        font.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * tables.len() + body.len();
    }
    font.extend_from_slice(&body);
    font
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helvetica_width_of_known_strings() {
        let font = Font::helvetica();
        // "Hello" = 722 + 556 + 222 + 222 + 556 = 2278 units
        assert!((font.text_width("Hello", 10.0) - 22.78).abs() < 1e-3);
        assert_eq!(font.text_width("", 12.0), 0.0);
    }

    #[test]
    fn test_bold_is_wider_than_regular() {
        let text = "EDIFÍCIO ITAGUA / ALDEOTA";
        let regular = Font::helvetica().text_width(text, 20.0);
        let bold = Font::helvetica_bold().text_width(text, 20.0);
        assert!(bold > regular);
    }

    #[test]
    fn test_width_scales_linearly_with_size() {
        let font = Font::helvetica_bold();
        let w10 = font.text_width("R$ 720.000,00", 10.0);
        let w20 = font.text_width("R$ 720.000,00", 20.0);
        assert!((w20 - 2.0 * w10).abs() < 1e-3);
    }

    #[test]
    fn test_encode_portuguese_text() {
        assert_eq!(encode_winansi("Área"), vec![0xC1, b'r', b'e', b'a']);
        assert_eq!(encode_winansi("m²"), vec![b'm', 0xB2]);
        assert_eq!(encode_winansi("Não"), vec![b'N', 0xE3, b'o']);
    }

    #[test]
    fn test_encode_windows_specials_and_unknowns() {
        assert_eq!(encode_winansi("€"), vec![0x80]);
        assert_eq!(encode_winansi("—"), vec![0x97]);
        assert_eq!(encode_winansi("日"), vec![b'?']);
        assert_eq!(encode_winansi("a\tb"), vec![b'a', b' ', b'b']);
    }

    #[test]
    fn test_unencodable_text_measures_as_question_mark() {
        let font = Font::helvetica();
        assert_eq!(font.text_width("日", 10.0), font.text_width("?", 10.0));
    }

    #[test]
    fn test_winansi_round_trip_for_high_codes() {
        for (code, ch) in WINANSI_HIGH {
            assert_eq!(winansi_to_char(code), Some(ch));
            assert_eq!(char_to_winansi(ch), Some(code));
        }
        assert_eq!(winansi_to_char(0x81), None);
    }

    #[test]
    fn test_truetype_widths_come_from_hmtx() {
        let font = Font::from_truetype("Tiny Sans", tiny_truetype()).unwrap();
        assert_eq!(font.base_name(), "TinySans");
        assert_eq!(font.widths()[(b'A' - FIRST_CHAR) as usize], 600.0);
        assert_eq!(font.widths()[(b' ' - FIRST_CHAR) as usize], 250.0);
        // Outside the cmap
        assert_eq!(font.text_width("B", 10.0), 0.0);
        assert!((font.text_width("A A", 10.0) - 14.5).abs() < 1e-4);

        match font.program() {
            FontProgram::TrueType { data, metrics } => {
                assert_eq!(data.as_slice(), tiny_truetype().as_slice());
                assert_eq!(metrics.bbox, [0.0, -200.0, 600.0, 800.0]);
                assert_eq!((metrics.ascent, metrics.descent), (800.0, -200.0));
                assert_eq!(metrics.cap_height, 800.0);
            }
            FontProgram::Standard => panic!("expected an embedded program"),
        }
    }

    #[test]
    fn test_truetype_rejects_garbage() {
        let result = Font::from_truetype("Broken", vec![0, 1, 2, 3]);
        assert!(matches!(result, Err(Error::Font(_))));
    }

    #[test]
    fn test_resource_names_are_distinct() {
        assert_ne!(
            FontWeight::Regular.resource_name(),
            FontWeight::Bold.resource_name()
        );
    }
}
