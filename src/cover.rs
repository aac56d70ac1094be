//! Cover rendering: fill a rectangle with an image, cropping the excess

use crate::layout::Rect;
use crate::pdf::{ImageRef, PageCanvas};

/// Where a covering image is drawn relative to its target rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverPlacement {
    pub scaled_width: f32,
    pub scaled_height: f32,
    /// Bottom-left corner of the scaled image
    pub x: f32,
    pub y: f32,
}

/// Uniform scale so an `image_w`×`image_h` raster covers `target`, centred
pub fn cover_placement(image_w: u32, image_h: u32, target: Rect) -> CoverPlacement {
    let (iw, ih) = (image_w.max(1) as f32, image_h.max(1) as f32);
    let ratio = (target.width / iw).max(target.height / ih);
    let scaled_width = iw * ratio;
    let scaled_height = ih * ratio;
    CoverPlacement {
        scaled_width,
        scaled_height,
        x: target.x + (target.width - scaled_width) / 2.0,
        y: target.y + (target.height - scaled_height) / 2.0,
    }
}

/// Draw `image` covering `target`, clipped to it
pub fn draw_cover(canvas: &mut PageCanvas, image: &ImageRef, target: Rect) {
    let placement = cover_placement(image.width, image.height, target);
    canvas.save_state();
    canvas.clip_rect(target);
    canvas.draw_image(
        image,
        Rect::new(
            placement.x,
            placement.y,
            placement.scaled_width,
            placement.scaled_height,
        ),
    );
    canvas.restore_state();
}

/// Draw `image` covering the whole page
pub fn draw_fullpage_cover(canvas: &mut PageCanvas, image: &ImageRef) {
    let page = canvas.page().bounds();
    draw_cover(canvas, image, page);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PageDimensions;
    use crate::pdf::Typeface;
    use std::sync::Arc;

    #[test]
    fn test_wide_image_overflows_horizontally() {
        let target = Rect::new(10.0, 20.0, 100.0, 100.0);
        let p = cover_placement(400, 200, target);
        assert_eq!((p.scaled_width, p.scaled_height), (200.0, 100.0));
        assert_eq!((p.x, p.y), (10.0 - 50.0, 20.0));
    }

    #[test]
    fn test_tall_image_overflows_vertically() {
        let target = Rect::new(0.0, 0.0, 300.0, 100.0);
        let p = cover_placement(100, 100, target);
        assert_eq!((p.scaled_width, p.scaled_height), (300.0, 300.0));
        assert_eq!((p.x, p.y), (0.0, -100.0));
    }

    #[test]
    fn test_cover_always_fills_target() {
        for (iw, ih) in [(1, 1), (640, 480), (480, 640), (3000, 17), (17, 3000)] {
            for target in [Rect::new(0.0, 0.0, 547.0, 400.0), Rect::new(5.0, 5.0, 120.5, 80.25)] {
                let p = cover_placement(iw, ih, target);
                assert!(p.scaled_width >= target.width - 1e-3);
                assert!(p.scaled_height >= target.height - 1e-3);
                let aspect_in = iw as f32 / ih as f32;
                let aspect_out = p.scaled_width / p.scaled_height;
                assert!((aspect_in - aspect_out).abs() / aspect_in < 1e-4);
                assert!((target.x - p.x - (p.scaled_width - target.width) / 2.0).abs() < 1e-3);
                assert!((target.y - p.y - (p.scaled_height - target.height) / 2.0).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_draw_cover_clips_to_target() {
        let mut canvas = PageCanvas::new(PageDimensions::a4(), Arc::new(Typeface::default()));
        let image = ImageRef {
            id: (3, 0),
            width: 40,
            height: 30,
        };
        draw_cover(&mut canvas, &image, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(
            canvas.operators(),
            vec!["q", "re", "W", "n", "q", "cm", "Do", "Q", "Q"]
        );
    }
}
