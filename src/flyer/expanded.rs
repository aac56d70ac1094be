//! Expanded single-page flyer
//!
//! Blocks are stacked top to bottom on a black page with a running cursor:
//! logo, one-line title, a row of detail pills, the price band, and finally
//! the cover photo, which takes whatever height is left above the bottom
//! margin.

use log::debug;

use super::{
    detail_items, draw_price_band, new_builder, prepare_photo, price_band_height, DetailItem,
    DetailKind, FlyerRequest, LABEL_GREY, PILL_BORDER, PRICE_PADDING, PRICE_SIZE,
};
use crate::config::AssetConfig;
use crate::cover::draw_cover;
use crate::error::Result;
use crate::layout::{PageDimensions, Rect};
use crate::pdf::{Color, FontWeight, ImageRef, PageCanvas, Paint, PdfBuilder, Typeface};
use crate::textfit::fit_one_line;

const PADDING: f32 = 36.0;
const BOTTOM_MARGIN: f32 = 24.0;

const LOGO_WIDTH_SHARE: f32 = 0.45;
const LOGO_MAX_WIDTH: f32 = 260.0;
const LOGO_SHRINK: f32 = 0.8;
const LOGO_GAP: f32 = 10.0;
const NO_LOGO_GAP: f32 = 8.0;

/// 80% of a 30pt heading
const TITLE_MAX_SIZE: f32 = 24.0;
const TITLE_MIN_SIZE: f32 = 10.0;
const TITLE_GAP: f32 = 20.0;

const PILL_MAX_SIZE: u32 = 16;
const PILL_MIN_SIZE: u32 = 9;
const PILL_RADIUS: f32 = 10.0;
const PILL_TOP_GAP: f32 = 10.0;

const PRICE_GAP: f32 = 12.0;
const NO_PRICE_GAP: f32 = 16.0;

const MIN_PHOTO_HEIGHT: f32 = 220.0;

/// Sizes shared by every pill in the row
#[derive(Debug, Clone, PartialEq)]
pub struct PillRow {
    pub font_size: f32,
    pub icon_box: f32,
    pub gap: f32,
    pub left_pad: f32,
    pub right_pad: f32,
    pub icon_gap: f32,
    pub widths: Vec<f32>,
}

impl PillRow {
    fn with_size(
        items: &[DetailItem],
        typeface: &Typeface,
        font_size: f32,
        icon_factor: f32,
        gap: f32,
        pads: (f32, f32),
        icon_gap: f32,
    ) -> Self {
        let icon_box = (font_size * icon_factor).floor();
        let widths = items
            .iter()
            .map(|item| {
                let label = typeface.regular.text_width(&item.label_text(), font_size);
                let value = typeface.bold.text_width(&item.value, font_size);
                pads.0 + icon_box + icon_gap + label + value + pads.1
            })
            .collect();
        Self {
            font_size,
            icon_box,
            gap,
            left_pad: pads.0,
            right_pad: pads.1,
            icon_gap,
            widths,
        }
    }

    pub fn total_width(&self) -> f32 {
        let gaps = self.widths.len().saturating_sub(1) as f32 * self.gap;
        self.widths.iter().sum::<f32>() + gaps
    }
}

/// Largest pill size whose row fits `available`, else the compact fallback
///
/// The fallback may be wider than `available`; the row then overflows.
pub fn layout_pills(items: &[DetailItem], typeface: &Typeface, available: f32) -> PillRow {
    for size in (PILL_MIN_SIZE..=PILL_MAX_SIZE).rev() {
        let row = PillRow::with_size(items, typeface, size as f32, 1.9, 10.0, (10.0, 12.0), 6.0);
        if row.total_width() <= available {
            return row;
        }
    }
    PillRow::with_size(items, typeface, 9.0, 1.8, 6.0, (8.0, 10.0), 4.0)
}

/// Render the expanded layout to a one-page PDF
pub fn build_expanded_pdf(request: &FlyerRequest<'_>, assets: &AssetConfig) -> Result<Vec<u8>> {
    let mut builder = new_builder(assets, request.record)?;
    draw_page(&mut builder, request, assets)?;
    builder.finish()
}

/// Append the expanded flyer page to `builder`
pub(crate) fn draw_page(
    builder: &mut PdfBuilder,
    request: &FlyerRequest<'_>,
    assets: &AssetConfig,
) -> Result<()> {
    let cover = request.require_cover()?;
    let logo = match &assets.logo {
        Some(logo) => Some(builder.add_image(logo)?),
        None => None,
    };
    let mut icons = Vec::new();
    for kind in DetailKind::ALL {
        if let Some(icon) = assets.icons.get(kind) {
            icons.push((kind, builder.add_image(icon)?));
        }
    }

    let mut canvas = builder.begin_page(PageDimensions::a4());
    let page = canvas.page().bounds();
    canvas.set_fill_color(Color::BLACK);
    canvas.rect(page, Paint::Fill);

    let content_x = PADDING;
    let content_w = page.width - 2.0 * PADDING;
    let center_x = content_x + content_w / 2.0;
    let mut cursor = page.height - PADDING;

    // Logo
    match logo {
        Some(logo) => {
            let target_w = (content_w * LOGO_WIDTH_SHARE).min(LOGO_MAX_WIDTH) * LOGO_SHRINK;
            let target_h = logo.height as f32 * target_w / logo.width.max(1) as f32;
            let x = content_x + (content_w - target_w) / 2.0;
            canvas.draw_image(&logo, Rect::new(x, cursor - target_h, target_w, target_h));
            cursor -= target_h + LOGO_GAP;
        }
        None => cursor -= NO_LOGO_GAP,
    }

    // Title
    let title = request.record.title();
    let title_size = fit_one_line(
        &title,
        content_w,
        &canvas.typeface().bold,
        TITLE_MAX_SIZE,
        TITLE_MIN_SIZE,
    );
    debug!("Title '{}' fitted at {}pt", title, title_size);
    let title_y = cursor - title_size;
    canvas.set_fill_color(Color::WHITE);
    canvas.draw_centred_text(FontWeight::Bold, title_size, center_x, title_y, &title);
    cursor = title_y - TITLE_GAP;

    // Detail pills
    let items = detail_items(&request.record.rooms);
    let row = layout_pills(&items, canvas.typeface(), content_w);
    debug!(
        "Pill row at {}pt spans {:.1} of {:.1}",
        row.font_size,
        row.total_width(),
        content_w
    );
    let pill_y = cursor - PILL_TOP_GAP;
    let mut x = content_x + (content_w - row.total_width()) / 2.0;
    for (item, &pill_w) in items.iter().zip(&row.widths) {
        let icon = icons.iter().find(|(kind, _)| *kind == item.kind).map(|(_, r)| *r);
        draw_pill(&mut canvas, &row, item, icon, x, pill_y, pill_w);
        x += pill_w + row.gap;
    }

    // Price band
    cursor = pill_y - PILL_TOP_GAP;
    match request.record.price() {
        Some(price) => {
            let text_w = canvas.typeface().bold.text_width(price, PRICE_SIZE);
            let band_w = content_w.min(text_w + 2.0 * PRICE_PADDING);
            let band_h = price_band_height();
            let band = Rect::new(
                content_x + (content_w - band_w) / 2.0,
                cursor - band_h,
                band_w,
                band_h,
            );
            draw_price_band(&mut canvas, band, price);
            cursor = band.y - PRICE_GAP;
        }
        None => cursor -= NO_PRICE_GAP,
    }

    // Photo
    let photo_h = (cursor - BOTTOM_MARGIN).floor().max(MIN_PHOTO_HEIGHT);
    let photo = prepare_photo(cover, request.watermark);
    let image = builder.add_image(&photo)?;
    draw_cover(
        &mut canvas,
        &image,
        Rect::new(content_x, BOTTOM_MARGIN, content_w, photo_h),
    );

    builder.finish_page(canvas)
}

fn draw_pill(
    canvas: &mut PageCanvas,
    row: &PillRow,
    item: &DetailItem,
    icon: Option<ImageRef>,
    x: f32,
    y: f32,
    width: f32,
) {
    let icon_x = x + row.left_pad;
    let icon_right = match icon {
        Some(icon) => {
            let icon_w = icon.width as f32 * row.icon_box / icon.height.max(1) as f32;
            canvas.draw_image(
                &icon,
                Rect::new(icon_x, y - row.icon_box * 0.10, icon_w, row.icon_box),
            );
            icon_x + icon_w
        }
        None => {
            canvas.set_fill_color(Color::WHITE);
            canvas.circle(
                icon_x + row.icon_box / 2.0,
                y + row.icon_box / 2.0,
                row.icon_box / 2.8,
                Paint::Fill,
            );
            icon_x + row.icon_box
        }
    };

    let label = item.label_text();
    let text_x = icon_right + row.icon_gap;
    let text_y = y + row.icon_box / 2.0 - row.font_size / 2.0 + 2.0;
    canvas.set_fill_color(LABEL_GREY);
    canvas.draw_text(FontWeight::Regular, row.font_size, text_x, text_y, &label);
    let label_w = canvas.typeface().regular.text_width(&label, row.font_size);
    canvas.set_fill_color(Color::WHITE);
    canvas.draw_text(FontWeight::Bold, row.font_size, text_x + label_w, text_y, &item.value);

    canvas.set_stroke_color(PILL_BORDER);
    canvas.round_rect(
        Rect::new(x, y - 6.0, width, row.icon_box + 12.0),
        PILL_RADIUS,
        Paint::Stroke,
    );
}
