//! Property flyers
//!
//! Two fixed layouts share the data model defined here:
//! - [`expanded`]: a single dark page with logo, title, detail pills, price
//!   band and a large cover photo
//! - [`quadrant`]: a page split into four regions holding the cover photo,
//!   the headings and details, the description, and a 2×2 photo mosaic
//!
//! Every builder is a pure function of its inputs; rendering the same
//! request twice yields the same bytes.
//!
//! The watermark is optional for a flyer on its own: without one the photos
//! are drawn unmarked (the command-line tool warns first). A flyer with
//! attached photos is refused with [`Error::MissingInput`] when no
//! watermark is given; attached photos are never published unmarked.

pub mod expanded;
pub mod quadrant;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use chrono::NaiveDateTime;
use image::DynamicImage;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::batch::BatchInput;
use crate::config::AssetConfig;
use crate::cover::draw_fullpage_cover;
use crate::error::{Error, Result};
use crate::layout::{PageDimensions, Rect};
use crate::pdf::{Color, FontWeight, PageCanvas, Paint, PdfBuilder};
use crate::photo::PhotoAsset;
use crate::watermark::{composite_once, WatermarkSpec};

pub use expanded::build_expanded_pdf;
pub use quadrant::build_quadrant_pdf;

/// File name prefix of a flyer on its own
pub const FLYER_PREFIX: &str = "folheto";
/// File name prefix of a flyer followed by attached photos
pub const COMBINED_PREFIX: &str = "folheto_com_lote";

/// Accent colour of price bands
pub const GOLD: Color = Color::rgb8(0xD4, 0xAF, 0x37);
/// Outline of the detail pills
pub const PILL_BORDER: Color = Color::rgb8(0x2A, 0x2A, 0x2A);
/// Detail labels on dark backgrounds
pub const LABEL_GREY: Color = Color::rgb8(0xC9, 0xC9, 0xC9);

/// Placeholder for blank detail values
pub const PLACEHOLDER: &str = "-";
const NAME_FALLBACK: &str = "EMPREENDIMENTO";
const NEIGHBORHOOD_FALLBACK: &str = "BAIRRO";

pub(crate) const PRICE_SIZE: f32 = 14.0;
pub(crate) const PRICE_PADDING: f32 = 18.0;
const PRICE_RADIUS: f32 = 8.0;
const PRICE_BORDER_WIDTH: f32 = 1.5;

/// Room counts as typed into the form; blank fields render as placeholders
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomCounts {
    #[serde(alias = "quartos")]
    pub bedrooms: String,
    pub suites: String,
    #[serde(alias = "banheiros")]
    pub bathrooms: String,
    #[serde(alias = "vagas")]
    pub parking: String,
    #[serde(alias = "m2")]
    pub area_m2: String,
    #[serde(alias = "pet")]
    pub pet_allowed: Option<bool>,
}

/// Everything the flyer says about one property
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyRecord {
    #[serde(alias = "empreendimento")]
    pub name: String,
    #[serde(alias = "bairro")]
    pub neighborhood: String,
    #[serde(alias = "endereco")]
    pub address: String,
    #[serde(alias = "preco")]
    pub price_text: String,
    #[serde(alias = "descricao")]
    pub description: String,
    #[serde(alias = "detalhes")]
    pub rooms: RoomCounts,
}

impl PropertyRecord {
    /// Load from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::General(format!("Invalid property JSON: {}", e)))
    }

    /// Name with its fallback
    pub fn display_name(&self) -> &str {
        non_blank(&self.name).unwrap_or(NAME_FALLBACK)
    }

    /// Neighbourhood with its fallback
    pub fn display_neighborhood(&self) -> &str {
        non_blank(&self.neighborhood).unwrap_or(NEIGHBORHOOD_FALLBACK)
    }

    /// "NAME / NEIGHBORHOOD", uppercased
    pub fn title(&self) -> String {
        format!(
            "{} / {}",
            self.display_name().to_uppercase(),
            self.display_neighborhood().to_uppercase()
        )
    }

    /// Price text, if any was given
    pub fn price(&self) -> Option<&str> {
        non_blank(&self.price_text)
    }
}

fn non_blank(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// The six fixed detail fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetailKind {
    Bedrooms,
    Suites,
    Bathrooms,
    Parking,
    Area,
    Pet,
}

impl DetailKind {
    pub const ALL: [DetailKind; 6] = [
        DetailKind::Bedrooms,
        DetailKind::Suites,
        DetailKind::Bathrooms,
        DetailKind::Parking,
        DetailKind::Area,
        DetailKind::Pet,
    ];

    /// Icon table key
    pub fn key(self) -> &'static str {
        match self {
            DetailKind::Bedrooms => "bedrooms",
            DetailKind::Suites => "suites",
            DetailKind::Bathrooms => "bathrooms",
            DetailKind::Parking => "parking",
            DetailKind::Area => "area",
            DetailKind::Pet => "pet",
        }
    }

    /// Key used by older icon tables
    pub fn legacy_key(self) -> &'static str {
        match self {
            DetailKind::Bedrooms => "quartos",
            DetailKind::Suites => "suites",
            DetailKind::Bathrooms => "banheiros",
            DetailKind::Parking => "vagas",
            DetailKind::Area => "m2",
            DetailKind::Pet => "pet",
        }
    }

    /// Printed label
    pub fn label(self) -> &'static str {
        match self {
            DetailKind::Bedrooms => "Quartos",
            DetailKind::Suites => "Suítes",
            DetailKind::Bathrooms => "Banheiros",
            DetailKind::Parking => "Vagas",
            DetailKind::Area => "Área",
            DetailKind::Pet => "Pet",
        }
    }

    /// Accepts either key vocabulary, case-insensitively
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == key || kind.legacy_key() == key)
    }
}

impl fmt::Display for DetailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One label/value pair shown in a pill or detail row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailItem {
    pub kind: DetailKind,
    pub value: String,
}

impl DetailItem {
    /// "Label: " as printed before the value
    pub fn label_text(&self) -> String {
        format!("{}: ", self.kind.label())
    }
}

/// The six detail items in display order, placeholders filled in
pub fn detail_items(rooms: &RoomCounts) -> Vec<DetailItem> {
    let text = |value: &str| non_blank(value).unwrap_or(PLACEHOLDER).to_string();
    DetailKind::ALL
        .into_iter()
        .map(|kind| {
            let value = match kind {
                DetailKind::Bedrooms => text(&rooms.bedrooms),
                DetailKind::Suites => text(&rooms.suites),
                DetailKind::Bathrooms => text(&rooms.bathrooms),
                DetailKind::Parking => text(&rooms.parking),
                DetailKind::Area => match non_blank(&rooms.area_m2) {
                    Some(area) => format!("{} m²", area),
                    None => PLACEHOLDER.to_string(),
                },
                DetailKind::Pet => match rooms.pet_allowed {
                    Some(true) => "Sim".to_string(),
                    Some(false) => "Não".to_string(),
                    None => PLACEHOLDER.to_string(),
                },
            };
            DetailItem { kind, value }
        })
        .collect()
}

/// Optional icons for the detail items
#[derive(Debug, Clone, Default)]
pub struct IconSet {
    icons: HashMap<DetailKind, Arc<DynamicImage>>,
}

impl IconSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: DetailKind, icon: DynamicImage) {
        self.icons.insert(kind, Arc::new(icon));
    }

    pub fn get(&self, kind: DetailKind) -> Option<&Arc<DynamicImage>> {
        self.icons.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    /// Build from a key → base64 image table
    ///
    /// Unknown keys and undecodable entries are skipped with a warning.
    pub fn from_base64_table(table: &HashMap<String, String>) -> Self {
        let mut set = Self::new();
        let mut keys: Vec<&String> = table.keys().collect();
        keys.sort();

        for key in keys {
            let Some(kind) = DetailKind::from_key(key) else {
                warn!("Ignoring icon for unknown detail key '{}'", key);
                continue;
            };
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(table[key].trim())
                .map_err(|e| e.to_string())
                .and_then(|bytes| image::load_from_memory(&bytes).map_err(|e| e.to_string()));
            match decoded {
                Ok(icon) => set.insert(kind, icon),
                Err(e) => warn!("Skipping icon '{}': {}", key, e),
            }
        }
        debug!("Loaded {} detail icons", set.len());
        set
    }
}

/// Inputs of one flyer render
#[derive(Debug, Clone, Copy)]
pub struct FlyerRequest<'a> {
    pub record: &'a PropertyRecord,
    /// Main photo; required by both layouts
    pub cover: Option<&'a DynamicImage>,
    /// Mosaic photos for the quadrant layout; at most four are used
    pub gallery: &'a [DynamicImage],
    /// Applied to every photo placed on the page
    pub watermark: Option<&'a WatermarkSpec>,
}

impl<'a> FlyerRequest<'a> {
    pub fn new(record: &'a PropertyRecord, cover: &'a DynamicImage) -> Self {
        Self {
            record,
            cover: Some(cover),
            gallery: &[],
            watermark: None,
        }
    }

    pub fn with_gallery(mut self, gallery: &'a [DynamicImage]) -> Self {
        self.gallery = gallery;
        self
    }

    pub fn with_watermark(mut self, watermark: Option<&'a WatermarkSpec>) -> Self {
        self.watermark = watermark;
        self
    }

    pub(crate) fn require_cover(&self) -> Result<&'a DynamicImage> {
        self.cover
            .ok_or_else(|| Error::MissingInput("cover photo".to_string()))
    }
}

/// Watermark `photo` if a mark is configured
pub(crate) fn prepare_photo(photo: &DynamicImage, watermark: Option<&WatermarkSpec>) -> DynamicImage {
    match watermark {
        Some(spec) => DynamicImage::ImageRgba8(composite_once(photo, spec)),
        None => photo.clone(),
    }
}

pub(crate) fn new_builder(assets: &AssetConfig, record: &PropertyRecord) -> Result<PdfBuilder> {
    Ok(PdfBuilder::new(Arc::clone(&assets.typeface))?.with_title(&record.title()))
}

/// Gold band with the price centred in black
pub(crate) fn draw_price_band(canvas: &mut PageCanvas, band: Rect, price: &str) {
    canvas.save_state();
    canvas.set_fill_color(GOLD);
    canvas.set_stroke_color(Color::BLACK);
    canvas.set_line_width(PRICE_BORDER_WIDTH);
    canvas.round_rect(band, PRICE_RADIUS, Paint::FillStroke);
    canvas.set_fill_color(Color::BLACK);
    canvas.draw_centred_text(
        FontWeight::Bold,
        PRICE_SIZE,
        band.center_x(),
        band.y + band.height / 2.0 - PRICE_SIZE * 0.4,
        price,
    );
    canvas.restore_state();
}

/// Band height for the price text
pub(crate) fn price_band_height() -> f32 {
    (PRICE_SIZE * 1.8).floor()
}

/// Expanded flyer followed by one full-page photo per attachment
///
/// Attachments are watermarked with the same mark as the cover, which is
/// therefore required here. An attachment that cannot be decoded is
/// skipped; the flyer page is always produced.
pub fn build_flyer_with_attachments(
    request: &FlyerRequest<'_>,
    assets: &AssetConfig,
    attachments: &[BatchInput],
) -> Result<Vec<u8>> {
    let watermark = request
        .watermark
        .ok_or_else(|| Error::MissingInput("watermark image for attached photos".to_string()))?;

    let mut builder = new_builder(assets, request.record)?;
    expanded::draw_page(&mut builder, request, assets)?;

    for attachment in attachments {
        let photo = match PhotoAsset::decode_upright(&attachment.bytes) {
            Ok(photo) => photo,
            Err(e) => {
                warn!("Skipping attachment {}: {}", attachment.name, e);
                continue;
            }
        };
        let marked = prepare_photo(&photo, Some(watermark));
        let image = builder.add_image(&marked)?;
        let mut canvas = builder.begin_page(PageDimensions::a4());
        draw_fullpage_cover(&mut canvas, &image);
        builder.finish_page(canvas)?;
        debug!("Attached {} as page {}", attachment.name, builder.page_count());
    }

    builder.finish()
}

/// `{prefix}_YYYYmmdd_HHMMSS.pdf`
pub fn flyer_file_name(prefix: &str, at: NaiveDateTime) -> String {
    format!("{}_{}.pdf", prefix, at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::{ImageFormat, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn test_title_uses_fallbacks() {
        let record = PropertyRecord::default();
        assert_eq!(record.title(), "EMPREENDIMENTO / BAIRRO");

        let record = PropertyRecord {
            name: "Edifício Itagua".to_string(),
            neighborhood: "Aldeota".to_string(),
            ..Default::default()
        };
        assert_eq!(record.title(), "EDIFÍCIO ITAGUA / ALDEOTA");
    }

    #[test]
    fn test_price_blank_is_none() {
        let mut record = PropertyRecord::default();
        assert_eq!(record.price(), None);
        record.price_text = "   ".to_string();
        assert_eq!(record.price(), None);
        record.price_text = " R$ 720.000,00 ".to_string();
        assert_eq!(record.price(), Some("R$ 720.000,00"));
    }

    #[test]
    fn test_detail_items_fill_placeholders() {
        let rooms = RoomCounts {
            bedrooms: "3".to_string(),
            area_m2: "120".to_string(),
            pet_allowed: Some(false),
            ..Default::default()
        };
        let items = detail_items(&rooms);
        let values: Vec<&str> = items.iter().map(|i| i.value.as_str()).collect();
        assert_eq!(values, vec!["3", "-", "-", "-", "120 m²", "Não"]);
        assert_eq!(items[1].label_text(), "Suítes: ");
    }

    #[test]
    fn test_detail_kind_accepts_both_vocabularies() {
        assert_eq!(DetailKind::from_key("quartos"), Some(DetailKind::Bedrooms));
        assert_eq!(DetailKind::from_key("Bedrooms"), Some(DetailKind::Bedrooms));
        assert_eq!(DetailKind::from_key("m2"), Some(DetailKind::Area));
        assert_eq!(DetailKind::from_key("vagas"), Some(DetailKind::Parking));
        assert_eq!(DetailKind::from_key("garagem"), None);
    }

    #[test]
    fn test_property_from_json_with_legacy_keys() {
        let json = r#"{
            "empreendimento": "Edifício Itagua",
            "bairro": "Aldeota",
            "price_text": "R$ 720.000,00",
            "rooms": {"quartos": "3", "suites": "1", "pet": true}
        }"#;
        let record = PropertyRecord::from_json(json).unwrap();
        assert_eq!(record.name, "Edifício Itagua");
        assert_eq!(record.neighborhood, "Aldeota");
        assert_eq!(record.rooms.bedrooms, "3");
        assert_eq!(record.rooms.pet_allowed, Some(true));
        assert!(record.address.is_empty());
    }

    #[test]
    fn test_icon_table_skips_bad_entries() {
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::new(4, 4))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

        let mut table = HashMap::new();
        table.insert("quartos".to_string(), encoded.clone());
        table.insert("pet".to_string(), encoded);
        table.insert("vagas".to_string(), "not base64!".to_string());
        table.insert("piscina".to_string(), "AAAA".to_string());

        let icons = IconSet::from_base64_table(&table);
        assert_eq!(icons.len(), 2);
        assert!(icons.get(DetailKind::Bedrooms).is_some());
        assert!(icons.get(DetailKind::Parking).is_none());
    }

    #[test]
    fn test_flyer_file_name() {
        let at = NaiveDate::from_ymd_opt(2026, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();
        assert_eq!(flyer_file_name(FLYER_PREFIX, at), "folheto_20260309_140507.pdf");
        assert_eq!(
            flyer_file_name(COMBINED_PREFIX, at),
            "folheto_com_lote_20260309_140507.pdf"
        );
    }

    #[test]
    fn test_watermark_required_only_with_attachments() {
        let record = PropertyRecord::default();
        let cover = DynamicImage::ImageRgb8(image::RgbImage::new(40, 30));
        let assets = AssetConfig::default();
        let request = FlyerRequest::new(&record, &cover);

        assert!(build_expanded_pdf(&request, &assets).is_ok());
        assert!(build_quadrant_pdf(&request, &assets).is_ok());

        let attachments = [BatchInput::new("a.png", Vec::new())];
        let err = build_flyer_with_attachments(&request, &assets, &attachments).unwrap_err();
        assert!(matches!(err, Error::MissingInput(_)));
    }

    #[test]
    fn test_price_band_operators() {
        let mut canvas = PageCanvas::new(PageDimensions::a4(), Arc::new(Default::default()));
        draw_price_band(&mut canvas, Rect::new(10.0, 10.0, 120.0, price_band_height()), "R$ 1");
        let ops = canvas.operators();
        assert_eq!(ops.first(), Some(&"q"));
        assert_eq!(ops.last(), Some(&"Q"));
        assert!(ops.contains(&"B"));
        assert!(ops.contains(&"Tj"));
        assert_eq!(price_band_height(), 25.0);
    }
}
