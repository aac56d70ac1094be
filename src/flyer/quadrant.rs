//! Quadrant flyer
//!
//! The page is cut at its horizontal midline. The top half is split 50/50:
//! the cover photo with its price band on the left, headings and details on
//! the right. The bottom half is split 40/60: the description on the left,
//! a 2×2 photo mosaic on the right.

use log::debug;

use super::{
    detail_items, draw_price_band, new_builder, prepare_photo, price_band_height, DetailKind,
    FlyerRequest, LABEL_GREY, PRICE_PADDING, PRICE_SIZE,
};
use crate::config::AssetConfig;
use crate::cover::draw_cover;
use crate::error::Result;
use crate::layout::{Margins, PageDimensions, Rect};
use crate::pdf::{Color, FontWeight, ImageRef, PageCanvas, Paint, Typeface};
use crate::textfit::{fit_multiline, wrap};

/// Share of the page width given to the description
const DESCRIPTION_SHARE: f32 = 0.4;

const PANEL_BACKGROUND: Color = Color::rgb8(0x14, 0x14, 0x14);
const BODY_TEXT: Color = Color::rgb8(0x22, 0x22, 0x22);
const GRID_LINE_WIDTH: f32 = 1.5;

const PANEL_PADDING: f32 = 20.0;
const PRICE_INSET: f32 = 16.0;

const LOGO_WIDTH_SHARE: f32 = 0.6;
const LOGO_MAX_WIDTH: f32 = 180.0;
const LOGO_GAP: f32 = 12.0;

const HEADING_LINES: usize = 2;
const NAME_MAX_SIZE: f32 = 30.0;
const NAME_MIN_SIZE: f32 = 12.0;
const NEIGHBORHOOD_MAX_SIZE: f32 = 20.0;
const NEIGHBORHOOD_MIN_SIZE: f32 = 10.0;
const LINE_SPACING: f32 = 1.15;
const HEADING_GAP: f32 = 8.0;

const ADDRESS_SIZE: f32 = 10.0;
const ADDRESS_LEADING: f32 = 13.0;
const ADDRESS_LINES: usize = 3;

const DETAIL_SIZE: f32 = 10.0;
const DETAIL_ROW_HEIGHT: f32 = 22.0;
const DETAIL_ICON: f32 = 16.0;

const DESCRIPTION_SIZE: f32 = 10.0;
const DESCRIPTION_LEADING: f32 = 14.0;

/// The four regions of the page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrants {
    pub cover: Rect,
    pub panel: Rect,
    pub description: Rect,
    pub mosaic: Rect,
}

impl Quadrants {
    pub fn for_page(page: Rect) -> Self {
        let half_w = page.width / 2.0;
        let half_h = page.height / 2.0;
        let split = page.width * DESCRIPTION_SHARE;
        Self {
            cover: Rect::new(page.x, page.y + half_h, half_w, half_h),
            panel: Rect::new(page.x + half_w, page.y + half_h, page.width - half_w, half_h),
            description: Rect::new(page.x, page.y, split, half_h),
            mosaic: Rect::new(page.x + split, page.y, page.width - split, half_h),
        }
    }

    /// Mosaic cells: top-left, top-right, bottom-left, bottom-right
    pub fn mosaic_cells(&self) -> [Rect; 4] {
        let m = self.mosaic;
        let (w, h) = (m.width / 2.0, m.height / 2.0);
        [
            Rect::new(m.x, m.y + h, w, h),
            Rect::new(m.x + w, m.y + h, m.width - w, h),
            Rect::new(m.x, m.y, w, h),
            Rect::new(m.x + w, m.y, m.width - w, h),
        ]
    }
}

/// How many detail rows fit between `cursor` and `floor`
pub fn detail_capacity(cursor: f32, floor: f32) -> usize {
    if cursor <= floor {
        return 0;
    }
    ((cursor - floor) / DETAIL_ROW_HEIGHT).floor() as usize
}

/// Heading lines at their fitted size, cut to the line limit
pub fn fit_heading(
    text: &str,
    width: f32,
    typeface: &Typeface,
    max_size: f32,
    min_size: f32,
) -> (Vec<String>, f32) {
    let mut fitted = fit_multiline(text, width, &typeface.bold, max_size, min_size, HEADING_LINES);
    if fitted.lines.len() > HEADING_LINES {
        debug!(
            "Dropping {} heading line(s) of '{}' at {}pt",
            fitted.lines.len() - HEADING_LINES,
            text,
            fitted.size
        );
        fitted.lines.truncate(HEADING_LINES);
    }
    (fitted.lines, fitted.size)
}

/// Render the quadrant layout to a one-page PDF
pub fn build_quadrant_pdf(request: &FlyerRequest<'_>, assets: &AssetConfig) -> Result<Vec<u8>> {
    let cover = request.require_cover()?;
    let mut builder = new_builder(assets, request.record)?;

    let cover_image = builder.add_image(&prepare_photo(cover, request.watermark))?;
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
    let mut gallery = Vec::new();
    for photo in request.gallery.iter().take(4) {
        gallery.push(builder.add_image(&prepare_photo(photo, request.watermark))?);
    }

    let mut canvas = builder.begin_page(PageDimensions::a4());
    let page = canvas.page().bounds();
    let quadrants = Quadrants::for_page(page);

    canvas.set_fill_color(Color::WHITE);
    canvas.rect(page, Paint::Fill);

    draw_cover_quadrant(&mut canvas, quadrants.cover, &cover_image, request.record.price());
    draw_panel(&mut canvas, quadrants.panel, request, logo, &icons);
    draw_description(&mut canvas, quadrants.description, &request.record.description);
    draw_mosaic(&mut canvas, &quadrants, &gallery);

    builder.finish_page(canvas)?;
    builder.finish()
}

fn draw_cover_quadrant(canvas: &mut PageCanvas, area: Rect, cover: &ImageRef, price: Option<&str>) {
    draw_cover(canvas, cover, area);

    if let Some(price) = price {
        let text_w = canvas.typeface().bold.text_width(price, PRICE_SIZE);
        let band_w = (area.width - 2.0 * PRICE_INSET).min(text_w + 2.0 * PRICE_PADDING);
        let band = Rect::new(
            area.x + PRICE_INSET,
            area.y + PRICE_INSET,
            band_w,
            price_band_height(),
        );
        draw_price_band(canvas, band, price);
    }
}

fn draw_panel(
    canvas: &mut PageCanvas,
    area: Rect,
    request: &FlyerRequest<'_>,
    logo: Option<ImageRef>,
    icons: &[(DetailKind, ImageRef)],
) {
    let record = request.record;
    canvas.set_fill_color(PANEL_BACKGROUND);
    canvas.rect(area, Paint::Fill);

    let inner = area.inset(&Margins::uniform(PANEL_PADDING));
    let mut cursor = inner.top();

    if let Some(logo) = logo {
        let target_w = (inner.width * LOGO_WIDTH_SHARE).min(LOGO_MAX_WIDTH);
        let target_h = logo.height as f32 * target_w / logo.width.max(1) as f32;
        let x = inner.x + (inner.width - target_w) / 2.0;
        canvas.draw_image(&logo, Rect::new(x, cursor - target_h, target_w, target_h));
        cursor -= target_h + LOGO_GAP;
    }

    let (name_lines, name_size) = fit_heading(
        record.display_name(),
        inner.width,
        canvas.typeface(),
        NAME_MAX_SIZE,
        NAME_MIN_SIZE,
    );
    canvas.set_fill_color(Color::WHITE);
    cursor = draw_heading(canvas, inner.x, cursor, &name_lines, name_size);
    cursor -= HEADING_GAP;

    let (area_lines, area_size) = fit_heading(
        record.display_neighborhood(),
        inner.width,
        canvas.typeface(),
        NEIGHBORHOOD_MAX_SIZE,
        NEIGHBORHOOD_MIN_SIZE,
    );
    canvas.set_fill_color(LABEL_GREY);
    cursor = draw_heading(canvas, inner.x, cursor, &area_lines, area_size);
    cursor -= HEADING_GAP;

    let mut address = wrap(&record.address, inner.width, &canvas.typeface().regular, ADDRESS_SIZE);
    address.truncate(ADDRESS_LINES);
    if !address.is_empty() {
        canvas.set_fill_color(Color::WHITE);
        canvas.draw_text_block(
            FontWeight::Regular,
            ADDRESS_SIZE,
            ADDRESS_LEADING,
            inner.x,
            cursor - ADDRESS_SIZE,
            &address,
        );
        cursor -= ADDRESS_LEADING * address.len() as f32 + HEADING_GAP;
    }

    let items = detail_items(&record.rooms);
    let capacity = detail_capacity(cursor, inner.y);
    if capacity < items.len() {
        debug!("Detail panel fits {} of {} rows", capacity, items.len());
    }
    for item in items.iter().take(capacity) {
        let row_y = cursor - DETAIL_ROW_HEIGHT;
        let icon_y = row_y + (DETAIL_ROW_HEIGHT - DETAIL_ICON) / 2.0;
        match icons.iter().find(|(kind, _)| *kind == item.kind) {
            Some((_, icon)) => {
                let icon_w = icon.width as f32 * DETAIL_ICON / icon.height.max(1) as f32;
                canvas.draw_image(icon, Rect::new(inner.x, icon_y, icon_w.min(DETAIL_ICON * 2.0), DETAIL_ICON));
            }
            None => {
                canvas.set_fill_color(Color::WHITE);
                canvas.circle(
                    inner.x + DETAIL_ICON / 2.0,
                    icon_y + DETAIL_ICON / 2.0,
                    DETAIL_ICON / 2.8,
                    Paint::Fill,
                );
            }
        }

        let label = item.label_text();
        let text_x = inner.x + DETAIL_ICON + 8.0;
        let text_y = icon_y + DETAIL_ICON / 2.0 - DETAIL_SIZE * 0.35;
        canvas.set_fill_color(LABEL_GREY);
        canvas.draw_text(FontWeight::Regular, DETAIL_SIZE, text_x, text_y, &label);
        let label_w = canvas.typeface().regular.text_width(&label, DETAIL_SIZE);
        canvas.set_fill_color(Color::WHITE);
        canvas.draw_text(FontWeight::Bold, DETAIL_SIZE, text_x + label_w, text_y, &item.value);
        cursor = row_y;
    }
}

/// Draw heading lines below `top`, returning the new cursor
fn draw_heading(canvas: &mut PageCanvas, x: f32, top: f32, lines: &[String], size: f32) -> f32 {
    let mut cursor = top;
    for line in lines {
        canvas.draw_text(FontWeight::Bold, size, x, cursor - size, line);
        cursor -= size * LINE_SPACING;
    }
    cursor
}

/// Wrapped description; long text runs past the bottom of its area
fn draw_description(canvas: &mut PageCanvas, area: Rect, description: &str) {
    let inner = area.inset(&Margins::uniform(PANEL_PADDING));
    let lines = wrap(description, inner.width, &canvas.typeface().regular, DESCRIPTION_SIZE);
    canvas.set_fill_color(BODY_TEXT);
    canvas.draw_text_block(
        FontWeight::Regular,
        DESCRIPTION_SIZE,
        DESCRIPTION_LEADING,
        inner.x,
        inner.top() - DESCRIPTION_SIZE,
        &lines,
    );
}

fn draw_mosaic(canvas: &mut PageCanvas, quadrants: &Quadrants, gallery: &[ImageRef]) {
    let cells = quadrants.mosaic_cells();
    for (image, cell) in gallery.iter().zip(cells) {
        draw_cover(canvas, image, cell);
    }

    let m = quadrants.mosaic;
    let mid_x = cells[1].x;
    let mid_y = cells[2].top();
    canvas.save_state();
    canvas.set_stroke_color(Color::WHITE);
    canvas.set_line_width(GRID_LINE_WIDTH);
    canvas.line(mid_x, m.y, mid_x, m.top());
    canvas.line(m.x, mid_y, m.right(), mid_y);
    canvas.restore_state();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flyer::{PropertyRecord, RoomCounts};
    use crate::pdf::inspect_pdf;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::Arc;

    fn photo(shade: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([shade, shade, shade])))
    }

    #[test]
    fn test_quadrant_geometry() {
        let page = PageDimensions::a4().bounds();
        let q = Quadrants::for_page(page);
        let half_h = page.height / 2.0;

        assert_eq!(q.cover.y, half_h);
        assert_eq!(q.cover.width, page.width / 2.0);
        assert_eq!(q.panel.x, page.width / 2.0);
        assert!((q.panel.right() - page.width).abs() < 1e-3);
        assert!((q.description.width - page.width * 0.4).abs() < 1e-3);
        assert_eq!(q.mosaic.x, q.description.right());
        assert!((q.mosaic.right() - page.width).abs() < 1e-3);
        assert_eq!(q.mosaic.height, half_h);

        let cells = q.mosaic_cells();
        let area: f32 = cells.iter().map(|c| c.width * c.height).sum();
        assert!((area - q.mosaic.width * q.mosaic.height).abs() < 1e-1);
        assert_eq!(cells[0].x, q.mosaic.x);
        assert_eq!(cells[3].y, q.mosaic.y);
    }

    #[test]
    fn test_detail_capacity() {
        assert_eq!(detail_capacity(100.0, 0.0), 4);
        assert_eq!(detail_capacity(132.0, 0.0), 6);
        assert_eq!(detail_capacity(10.0, 0.0), 0);
        assert_eq!(detail_capacity(-5.0, 0.0), 0);
    }

    #[test]
    fn test_heading_truncated_at_floor() {
        let typeface = Typeface::default();
        let long = "Residencial Parque das Palmeiras Imperiais do Cumbuco Beach Resort";
        let (lines, size) = fit_heading(long, 60.0, &typeface, 30.0, 12.0);
        assert_eq!(size, 12.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines, wrap(long, 60.0, &typeface.bold, 12.0)[..2].to_vec());
    }

    #[test]
    fn test_heading_shrinks_before_truncating() {
        let typeface = Typeface::default();
        let (lines, size) = fit_heading("Edifício Itagua", 250.0, &typeface, 30.0, 12.0);
        assert!(lines.len() <= 2);
        assert!(size <= 30.0);
        assert_eq!(lines.join(" "), "Edifício Itagua");
    }

    #[test]
    fn test_grid_lines_drawn_without_gallery() {
        let mut canvas = PageCanvas::new(PageDimensions::a4(), Arc::new(Typeface::default()));
        let q = Quadrants::for_page(canvas.page().bounds());
        draw_mosaic(&mut canvas, &q, &[]);
        assert_eq!(canvas.operators().iter().filter(|op| **op == "S").count(), 2);
        assert!(!canvas.operators().contains(&"Do"));
    }

    #[test]
    fn test_renders_one_page_with_partial_gallery() {
        let record = PropertyRecord {
            name: "Edifício Itagua".to_string(),
            neighborhood: "Aldeota".to_string(),
            address: "Rua Silva Paulet, 1200 - Aldeota, Fortaleza - CE".to_string(),
            price_text: "R$ 720.000,00".to_string(),
            description: "Apartamento nascente com varanda gourmet. ".repeat(40),
            rooms: RoomCounts {
                bedrooms: "3".to_string(),
                ..Default::default()
            },
        };
        let cover = photo(120);
        let gallery = vec![photo(30), photo(200)];
        let request = FlyerRequest::new(&record, &cover).with_gallery(&gallery);
        let bytes = build_quadrant_pdf(&request, &AssetConfig::default()).unwrap();

        let meta = inspect_pdf(&bytes).unwrap();
        assert_eq!(meta.page_count, 1);
        assert_eq!(meta.title.as_deref(), Some("EDIFÍCIO ITAGUA / ALDEOTA"));
    }
}
