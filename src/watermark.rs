//! Watermark compositing
//!
//! The mark is scaled relative to the shorter side of the photo, its alpha
//! channel is multiplied by the requested opacity, and it is placed either at
//! one of nine anchors or tiled across a transparent overlay that is then
//! composited over the photo. All arithmetic is integer or fixed-order
//! floating point, so equal inputs give bit-identical pixels.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use log::debug;

use crate::error::{Error, Result};

/// One of the nine fixed watermark positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::MiddleLeft,
        Anchor::Center,
        Anchor::MiddleRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
    ];

    /// Label shown in the form
    pub fn label(self) -> &'static str {
        match self {
            Anchor::TopLeft => "Canto superior esquerdo",
            Anchor::TopCenter => "Topo centro",
            Anchor::TopRight => "Canto superior direito",
            Anchor::MiddleLeft => "Meio esquerdo",
            Anchor::Center => "Centro",
            Anchor::MiddleRight => "Meio direito",
            Anchor::BottomLeft => "Canto inferior esquerdo",
            Anchor::BottomCenter => "Base centro",
            Anchor::BottomRight => "Canto inferior direito",
        }
    }

    /// Short command-line identifier
    pub fn id(self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left",
            Anchor::TopCenter => "top-center",
            Anchor::TopRight => "top-right",
            Anchor::MiddleLeft => "middle-left",
            Anchor::Center => "center",
            Anchor::MiddleRight => "middle-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomCenter => "bottom-center",
            Anchor::BottomRight => "bottom-right",
        }
    }
}

impl FromStr for Anchor {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        Anchor::ALL
            .into_iter()
            .find(|a| a.label().eq_ignore_ascii_case(trimmed) || a.id() == trimmed)
            .ok_or_else(|| Error::UnknownAnchor(name.to_string()))
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where copies of the mark go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    Anchored(Anchor),
    Tiled,
}

/// Mark image plus the parameters it is applied with
#[derive(Debug, Clone)]
pub struct WatermarkSpec {
    pub image: Arc<RgbaImage>,
    pub placement: Placement,
    /// Fraction of the photo's shorter side the mark spans
    pub scale: f32,
    /// Multiplier applied to the mark's alpha, 0..=1
    pub opacity: f32,
    /// Inset from the photo edges in pixels
    pub margin: u32,
}

/// Size of the mark after scaling to `scale` of the base's shorter side
///
/// The mark keeps its aspect ratio: a landscape (or square) mark gets the
/// target width, a portrait mark gets the target height.
pub fn scale_size(base: (u32, u32), mark: (u32, u32), scale: f32) -> (u32, u32) {
    let shorter = base.0.min(base.1) as f32;
    let target = (shorter * scale).round().max(1.0);
    let (w, h) = mark;
    let aspect = if h == 0 { 1.0 } else { w as f32 / h as f32 };

    let (new_w, new_h) = if w >= h {
        (target, (target / aspect).round())
    } else {
        ((target * aspect).round(), target)
    };
    (new_w.max(1.0) as u32, new_h.max(1.0) as u32)
}

/// Resize the mark for a base of `base` dimensions
pub fn scale_mark(mark: &RgbaImage, base: (u32, u32), scale: f32) -> RgbaImage {
    let (w, h) = scale_size(base, mark.dimensions(), scale);
    imageops::resize(mark, w, h, FilterType::Lanczos3)
}

/// Multiply every alpha value by `opacity`
pub fn set_opacity(mark: &mut RgbaImage, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    for pixel in mark.pixels_mut() {
        pixel.0[3] = (pixel.0[3] as f32 * opacity).round() as u8;
    }
}

/// Top-left corner of the mark for `anchor`, in base pixel coordinates
///
/// Coordinates may be negative when the mark plus margin exceeds the base;
/// `imageops::overlay` clips.
pub fn place(base: (u32, u32), mark: (u32, u32), anchor: Anchor, margin: u32) -> (i64, i64) {
    let (bw, bh) = (base.0 as i64, base.1 as i64);
    let (mw, mh) = (mark.0 as i64, mark.1 as i64);
    let m = margin as i64;

    let left = m;
    let center_x = (bw - mw).div_euclid(2);
    let right = bw - mw - m;
    let top = m;
    let center_y = (bh - mh).div_euclid(2);
    let bottom = bh - mh - m;

    match anchor {
        Anchor::TopLeft => (left, top),
        Anchor::TopCenter => (center_x, top),
        Anchor::TopRight => (right, top),
        Anchor::MiddleLeft => (left, center_y),
        Anchor::Center => (center_x, center_y),
        Anchor::MiddleRight => (right, center_y),
        Anchor::BottomLeft => (left, bottom),
        Anchor::BottomCenter => (center_x, bottom),
        Anchor::BottomRight => (right, bottom),
    }
}

/// Apply the watermark once (or tiled) and return the composited photo
///
/// The result always has the base's dimensions and an alpha channel.
pub fn composite_once(base: &DynamicImage, spec: &WatermarkSpec) -> RgbaImage {
    let mut photo = base.to_rgba8();
    let dims = photo.dimensions();

    let mut mark = scale_mark(&spec.image, dims, spec.scale);
    set_opacity(&mut mark, spec.opacity);

    let mut overlay = RgbaImage::new(dims.0, dims.1);
    match spec.placement {
        Placement::Tiled => {
            let step_x = mark.width() as usize + 2 * spec.margin as usize;
            let step_y = mark.height() as usize + 2 * spec.margin as usize;
            let mut tiles = 0usize;
            for y in (spec.margin..dims.1).step_by(step_y) {
                for x in (spec.margin..dims.0).step_by(step_x) {
                    imageops::overlay(&mut overlay, &mark, x as i64, y as i64);
                    tiles += 1;
                }
            }
            debug!(
                "Tiled {}x{} mark {} times over {}x{} photo",
                mark.width(),
                mark.height(),
                tiles,
                dims.0,
                dims.1
            );
        }
        Placement::Anchored(anchor) => {
            let (x, y) = place(dims, mark.dimensions(), anchor, spec.margin);
            debug!(
                "Placed {}x{} mark at ({}, {}) [{}] on {}x{} photo",
                mark.width(),
                mark.height(),
                x,
                y,
                anchor,
                dims.0,
                dims.1
            );
            imageops::overlay(&mut overlay, &mark, x, y);
        }
    }

    imageops::overlay(&mut photo, &overlay, 0, 0);
    photo
}
