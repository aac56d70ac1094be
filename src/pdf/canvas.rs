//! Page drawing surface
//!
//! A [`PageCanvas`] records PDF content-stream operators for a single page.
//! Coordinates are absolute points with the origin at the bottom-left corner
//! of the page, the same convention as the PDF user space. The canvas is
//! handed back to [`PdfBuilder::finish_page`](super::PdfBuilder::finish_page)
//! once drawing is done.

use std::collections::BTreeMap;
use std::sync::Arc;

use lopdf::content::Operation;
use lopdf::{Object, ObjectId, StringFormat};

use crate::layout::{PageDimensions, Rect};
use crate::pdf::font::{FontWeight, Typeface};

/// Bezier control-point factor for quarter circles
const KAPPA: f32 = 0.552_284_8;

/// RGB colour with components in 0..=1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb8(0x00, 0x00, 0x00);
    pub const WHITE: Color = Color::rgb8(0xFF, 0xFF, 0xFF);

    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }
}

/// Whether a path is filled, stroked, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    Fill,
    Stroke,
    FillStroke,
}

impl Paint {
    fn operator(self) -> &'static str {
        match self {
            Paint::Fill => "f",
            Paint::Stroke => "S",
            Paint::FillStroke => "B",
        }
    }
}

/// An image already embedded in the document as an XObject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef {
    pub id: ObjectId,
    /// Pixel width of the embedded raster
    pub width: u32,
    /// Pixel height of the embedded raster
    pub height: u32,
}

/// Drawing surface for one page
pub struct PageCanvas {
    page: PageDimensions,
    typeface: Arc<Typeface>,
    operations: Vec<Operation>,
    xobjects: BTreeMap<String, ObjectId>,
}

impl PageCanvas {
    pub(crate) fn new(page: PageDimensions, typeface: Arc<Typeface>) -> Self {
        Self {
            page,
            typeface,
            operations: Vec::new(),
            xobjects: BTreeMap::new(),
        }
    }

    pub fn page(&self) -> PageDimensions {
        self.page
    }

    pub fn width(&self) -> f32 {
        self.page.width_pt()
    }

    pub fn height(&self) -> f32 {
        self.page.height_pt()
    }

    /// Fonts used for measuring and drawing on this page
    pub fn typeface(&self) -> &Typeface {
        &self.typeface
    }

    /// Names of the recorded operators, in order
    pub fn operators(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.operator.as_str()).collect()
    }

    pub(crate) fn into_parts(self) -> (Vec<Operation>, BTreeMap<String, ObjectId>) {
        (self.operations, self.xobjects)
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    pub fn save_state(&mut self) {
        self.push("q", vec![]);
    }

    pub fn restore_state(&mut self) {
        self.push("Q", vec![]);
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.push("rg", vec![color.r.into(), color.g.into(), color.b.into()]);
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.push("RG", vec![color.r.into(), color.g.into(), color.b.into()]);
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.push("w", vec![width.into()]);
    }

    /// Rectangle painted with the current colours
    pub fn rect(&mut self, rect: Rect, paint: Paint) {
        self.push(
            "re",
            vec![rect.x.into(), rect.y.into(), rect.width.into(), rect.height.into()],
        );
        self.push(paint.operator(), vec![]);
    }

    /// Rectangle with quarter-circle corners of `radius`
    pub fn round_rect(&mut self, rect: Rect, radius: f32, paint: Paint) {
        let r = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
        let k = r * KAPPA;
        let (x0, y0, x1, y1) = (rect.x, rect.y, rect.right(), rect.top());

        self.move_to(x0 + r, y0);
        self.line_to(x1 - r, y0);
        self.curve_to(x1 - r + k, y0, x1, y0 + r - k, x1, y0 + r);
        self.line_to(x1, y1 - r);
        self.curve_to(x1, y1 - r + k, x1 - r + k, y1, x1 - r, y1);
        self.line_to(x0 + r, y1);
        self.curve_to(x0 + r - k, y1, x0, y1 - r + k, x0, y1 - r);
        self.line_to(x0, y0 + r);
        self.curve_to(x0, y0 + r - k, x0 + r - k, y0, x0 + r, y0);
        self.push("h", vec![]);
        self.push(paint.operator(), vec![]);
    }

    pub fn circle(&mut self, cx: f32, cy: f32, radius: f32, paint: Paint) {
        let k = radius * KAPPA;
        self.move_to(cx + radius, cy);
        self.curve_to(cx + radius, cy + k, cx + k, cy + radius, cx, cy + radius);
        self.curve_to(cx - k, cy + radius, cx - radius, cy + k, cx - radius, cy);
        self.curve_to(cx - radius, cy - k, cx - k, cy - radius, cx, cy - radius);
        self.curve_to(cx + k, cy - radius, cx + radius, cy - k, cx + radius, cy);
        self.push("h", vec![]);
        self.push(paint.operator(), vec![]);
    }

    /// Straight stroked segment
    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.move_to(x1, y1);
        self.line_to(x2, y2);
        self.push("S", vec![]);
    }

    /// Intersect the clipping path with `rect` until the next restore
    pub fn clip_rect(&mut self, rect: Rect) {
        self.push(
            "re",
            vec![rect.x.into(), rect.y.into(), rect.width.into(), rect.height.into()],
        );
        self.push("W", vec![]);
        self.push("n", vec![]);
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.push("m", vec![x.into(), y.into()]);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.push("l", vec![x.into(), y.into()]);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x3: f32, y3: f32) {
        self.push(
            "c",
            vec![x1.into(), y1.into(), x2.into(), y2.into(), x3.into(), y3.into()],
        );
    }

    fn text_string(&self, weight: FontWeight, text: &str) -> Object {
        Object::String(
            self.typeface.font(weight).encode(text),
            StringFormat::Hexadecimal,
        )
    }

    /// One line of text with its baseline starting at (x, y)
    pub fn draw_text(&mut self, weight: FontWeight, size: f32, x: f32, y: f32, text: &str) {
        let string = self.text_string(weight, text);
        self.push("BT", vec![]);
        self.push(
            "Tf",
            vec![Object::Name(weight.resource_name().as_bytes().to_vec()), size.into()],
        );
        self.push(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                x.into(),
                y.into(),
            ],
        );
        self.push("Tj", vec![string]);
        self.push("ET", vec![]);
    }

    /// One line of text horizontally centred on `center_x`
    pub fn draw_centred_text(
        &mut self,
        weight: FontWeight,
        size: f32,
        center_x: f32,
        y: f32,
        text: &str,
    ) {
        let width = self.typeface.font(weight).text_width(text, size);
        self.draw_text(weight, size, center_x - width / 2.0, y, text);
    }

    /// Left-aligned lines in a single text object, advanced with `TL`/`T*`
    pub fn draw_text_block(
        &mut self,
        weight: FontWeight,
        size: f32,
        leading: f32,
        x: f32,
        first_baseline: f32,
        lines: &[String],
    ) {
        if lines.is_empty() {
            return;
        }
        self.push("BT", vec![]);
        self.push(
            "Tf",
            vec![Object::Name(weight.resource_name().as_bytes().to_vec()), size.into()],
        );
        self.push("TL", vec![leading.into()]);
        self.push("Td", vec![x.into(), first_baseline.into()]);
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                self.push("T*", vec![]);
            }
            let string = self.text_string(weight, line);
            self.push("Tj", vec![string]);
        }
        self.push("ET", vec![]);
    }

    /// Paint an embedded image stretched onto `rect`
    pub fn draw_image(&mut self, image: &ImageRef, rect: Rect) {
        let name = match self.xobjects.iter().find(|(_, id)| **id == image.id) {
            Some((name, _)) => name.clone(),
            None => {
                let name = format!("Im{}", self.xobjects.len() + 1);
                self.xobjects.insert(name.clone(), image.id);
                name
            }
        };
        self.save_state();
        self.push(
            "cm",
            vec![
                rect.width.into(),
                Object::Integer(0),
                Object::Integer(0),
                rect.height.into(),
                rect.x.into(),
                rect.y.into(),
            ],
        );
        self.push("Do", vec![Object::Name(name.into_bytes())]);
        self.restore_state();
    }
}
