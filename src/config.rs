//! Asset locations, loaded assets, and watermark form settings

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, RgbaImage};
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::flyer::IconSet;
use crate::pdf::{Font, Typeface};
use crate::watermark::{Anchor, Placement, WatermarkSpec};

/// Default logo file, looked up relative to the working directory
pub const DEFAULT_LOGO: &str = "logotopo.png";
/// Default watermark file
pub const DEFAULT_WATERMARK: &str = "marcadagua.png";

/// Where assets are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub logo: Option<PathBuf>,
    pub watermark: Option<PathBuf>,
    /// JSON object mapping detail keys to base64 images
    pub icons: Option<PathBuf>,
    /// TrueType pair replacing Helvetica; both must load
    pub font_regular: Option<PathBuf>,
    pub font_bold: Option<PathBuf>,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            logo: Some(PathBuf::from(DEFAULT_LOGO)),
            watermark: Some(PathBuf::from(DEFAULT_WATERMARK)),
            icons: None,
            font_regular: None,
            font_bold: None,
        }
    }
}

/// Decoded, read-only assets shared by every render
#[derive(Debug, Clone)]
pub struct AssetConfig {
    pub logo: Option<Arc<DynamicImage>>,
    pub watermark: Option<Arc<RgbaImage>>,
    pub icons: IconSet,
    pub typeface: Arc<Typeface>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            logo: None,
            watermark: None,
            icons: IconSet::new(),
            typeface: Arc::new(Typeface::default()),
        }
    }
}

impl AssetConfig {
    /// Load every configured asset
    ///
    /// A missing or unreadable asset is logged and left out; loading never
    /// fails.
    pub fn load(paths: &AssetPaths) -> Self {
        let logo = paths
            .logo
            .as_deref()
            .and_then(|path| load_image(path, "logo"))
            .map(Arc::new);
        let watermark = paths
            .watermark
            .as_deref()
            .and_then(|path| load_image(path, "watermark"))
            .map(|image| Arc::new(image.to_rgba8()));
        let icons = paths
            .icons
            .as_deref()
            .map(load_icons)
            .unwrap_or_default();
        let typeface = match (&paths.font_regular, &paths.font_bold) {
            (Some(regular), Some(bold)) => load_typeface(regular, bold),
            (None, None) => Typeface::default(),
            _ => {
                warn!("Both regular and bold fonts are needed; using Helvetica");
                Typeface::default()
            }
        };

        info!(
            "Assets: logo {}, watermark {}, {} icon(s), font {}",
            if logo.is_some() { "loaded" } else { "absent" },
            if watermark.is_some() { "loaded" } else { "absent" },
            icons.len(),
            typeface.regular.base_name()
        );

        Self {
            logo,
            watermark,
            icons,
            typeface: Arc::new(typeface),
        }
    }

    pub fn with_logo(mut self, logo: DynamicImage) -> Self {
        self.logo = Some(Arc::new(logo));
        self
    }

    pub fn with_watermark(mut self, watermark: RgbaImage) -> Self {
        self.watermark = Some(Arc::new(watermark));
        self
    }

    pub fn with_icons(mut self, icons: IconSet) -> Self {
        self.icons = icons;
        self
    }

    pub fn with_typeface(mut self, typeface: Typeface) -> Self {
        self.typeface = Arc::new(typeface);
        self
    }

    /// Watermark parameters for `settings`, or `None` without a mark image
    pub fn watermark_spec(&self, settings: &WatermarkSettings) -> Result<Option<WatermarkSpec>> {
        settings.validate()?;
        Ok(self.watermark.as_ref().map(|image| WatermarkSpec {
            image: Arc::clone(image),
            placement: settings.placement(),
            scale: settings.scale_percent as f32 / 100.0,
            opacity: settings.opacity_percent as f32 / 100.0,
            margin: settings.margin_px,
        }))
    }

    /// Like [`watermark_spec`](Self::watermark_spec) but a missing mark is an error
    pub fn require_watermark_spec(&self, settings: &WatermarkSettings) -> Result<WatermarkSpec> {
        self.watermark_spec(settings)?.ok_or_else(|| {
            Error::MissingInput(format!("watermark image ({})", DEFAULT_WATERMARK))
        })
    }
}

fn load_image(path: &Path, what: &str) -> Option<DynamicImage> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("No {} at {}: {}", what, path.display(), e);
            return None;
        }
    };
    match image::load_from_memory(&bytes) {
        Ok(image) => {
            debug!("Loaded {} {}x{}", what, image.width(), image.height());
            Some(image)
        }
        Err(e) => {
            warn!("Unreadable {} {}: {}", what, path.display(), e);
            None
        }
    }
}

fn load_icons(path: &Path) -> IconSet {
    let table: HashMap<String, String> = match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()))
    {
        Ok(table) => table,
        Err(e) => {
            warn!("Ignoring icon table {}: {}", path.display(), e);
            return IconSet::new();
        }
    };
    IconSet::from_base64_table(&table)
}

fn load_typeface(regular: &Path, bold: &Path) -> Typeface {
    match load_font(regular).and_then(|r| Ok((r, load_font(bold)?))) {
        Ok((regular, bold)) => Typeface { regular, bold },
        Err(e) => {
            warn!("Falling back to Helvetica: {}", e);
            Typeface::default()
        }
    }
}

fn load_font(path: &Path) -> Result<Font> {
    let data = std::fs::read(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("EmbeddedFont")
        .replace(|c: char| !c.is_ascii_alphanumeric() && c != '-', "");
    Font::from_truetype(&name, data)
}

pub const SCALE_RANGE: (u32, u32) = (5, 60);
pub const OPACITY_RANGE: (u32, u32) = (5, 100);
pub const MARGIN_RANGE: (u32, u32) = (0, 2000);

/// Watermark controls as entered in the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatermarkSettings {
    pub anchor: Anchor,
    /// Percent of the photo's shorter side
    pub scale_percent: u32,
    pub opacity_percent: u32,
    pub margin_px: u32,
    pub tile: bool,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            anchor: Anchor::BottomRight,
            scale_percent: 20,
            opacity_percent: 60,
            margin_px: 24,
            tile: false,
        }
    }
}

impl WatermarkSettings {
    /// Reject values outside the form's ranges
    pub fn validate(&self) -> Result<()> {
        check_range("scale", self.scale_percent, SCALE_RANGE, "%")?;
        check_range("opacity", self.opacity_percent, OPACITY_RANGE, "%")?;
        check_range("margin", self.margin_px, MARGIN_RANGE, "px")?;
        Ok(())
    }

    pub fn placement(&self) -> Placement {
        if self.tile {
            Placement::Tiled
        } else {
            Placement::Anchored(self.anchor)
        }
    }
}

fn check_range(name: &'static str, value: u32, (min, max): (u32, u32), unit: &str) -> Result<()> {
    if value < min || value > max {
        return Err(Error::InvalidSetting {
            name,
            message: format!("{}{} is outside {}..={}{}", value, unit, min, max, unit),
        });
    }
    Ok(())
}
