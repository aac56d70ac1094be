//! Integration tests for the property flyer library

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use lopdf::content::Content;
use lopdf::{Document, Object};
use tempfile::TempDir;

use property_flyer::batch::{process_batch, BatchInput, OutputMode, ARCHIVE_NAME};
use property_flyer::cache::{RenderCache, RenderKey};
use property_flyer::config::{AssetConfig, WatermarkSettings};
use property_flyer::flyer::{
    build_expanded_pdf, build_flyer_with_attachments, build_quadrant_pdf, FlyerRequest,
    PropertyRecord, RoomCounts,
};
use property_flyer::pdf::font::encode_winansi;
use property_flyer::pdf::{count_pages, extract_metadata, Font};
use property_flyer::photo::{encode_preserving, OutputFormat, PhotoAsset};
use property_flyer::textfit::fit_one_line;
use property_flyer::watermark::Anchor;

const COVER_COLOR: [u8; 3] = [30, 60, 90];

fn cover_photo() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 300, Rgb(COVER_COLOR)))
}

fn white_mark() -> RgbaImage {
    RgbaImage::from_pixel(50, 50, Rgba([255, 255, 255, 255]))
}

fn itagua() -> PropertyRecord {
    PropertyRecord {
        name: "Edifício Itagua".to_string(),
        neighborhood: "Aldeota".to_string(),
        address: "Rua Silva Paulet, 1200".to_string(),
        price_text: "R$ 720.000,00".to_string(),
        description: "Apartamento nascente, varanda gourmet e lazer completo.".to_string(),
        rooms: RoomCounts {
            bedrooms: "3".to_string(),
            suites: "2".to_string(),
            bathrooms: "3".to_string(),
            parking: "2".to_string(),
            area_m2: "120".to_string(),
            pet_allowed: Some(true),
        },
    }
}

fn centre_settings() -> WatermarkSettings {
    WatermarkSettings {
        anchor: Anchor::Center,
        scale_percent: 20,
        opacity_percent: 60,
        margin_px: 24,
        tile: false,
    }
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

/// JPEG-encoded image XObjects, decoded
fn jpeg_images(pdf: &[u8]) -> Vec<DynamicImage> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.objects
        .values()
        .filter_map(|object| match object {
            Object::Stream(stream) => Some(stream),
            _ => None,
        })
        .filter(|stream| {
            stream
                .dict
                .get(b"Filter")
                .and_then(|f| f.as_name())
                .map(|name| name == b"DCTDecode")
                .unwrap_or(false)
        })
        .map(|stream| image::load_from_memory(&stream.content).unwrap())
        .collect()
}

/// Every string shown with `Tj` on the first page
fn shown_strings(pdf: &[u8]) -> Vec<Vec<u8>> {
    let doc = Document::load_mem(pdf).unwrap();
    let page_id = *doc.get_pages().get(&1).unwrap();
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    content
        .operations
        .iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| op.operands.first())
        .filter_map(|operand| operand.as_str().ok().map(|s| s.to_vec()))
        .collect()
}

/// (name, data) pairs from a stored ZIP
fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let le16 = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize;
    let le32 = |at: usize| {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize
    };
    let end = bytes.len() - 22;
    let mut at = le32(end + 16);
    let mut entries = Vec::new();
    for _ in 0..le16(end + 10) {
        let size = le32(at + 20);
        let name_len = le16(at + 28);
        let offset = le32(at + 42);
        let name = String::from_utf8(bytes[at + 46..at + 46 + name_len].to_vec()).unwrap();
        let data_at = offset + 30 + le16(offset + 26);
        entries.push((name, bytes[data_at..data_at + size].to_vec()));
        at += 46 + name_len;
    }
    entries
}

#[test]
fn test_expanded_flyer_with_centred_watermark() {
    let assets = AssetConfig::default().with_watermark(white_mark());
    let spec = assets.watermark_spec(&centre_settings()).unwrap();
    let record = itagua();
    let cover = cover_photo();
    let request = FlyerRequest::new(&record, &cover).with_watermark(spec.as_ref());

    let pdf = build_expanded_pdf(&request, &assets).unwrap();
    assert_eq!(count_pages(&pdf).unwrap(), 1);

    let images = jpeg_images(&pdf);
    assert_eq!(images.len(), 1);
    let photo = images[0].to_rgb8();
    assert_eq!(photo.dimensions(), (400, 300));

    let centre = photo.get_pixel(200, 150).0;
    let corner = photo.get_pixel(5, 5).0;
    assert!(centre[0] > corner[0] + 60, "centre {:?} corner {:?}", centre, corner);
    assert!((corner[0] as i32 - COVER_COLOR[0] as i32).abs() <= 4);
}

#[test]
fn test_batch_archive_of_three_jpegs() {
    let assets = AssetConfig::default().with_watermark(white_mark());
    let spec = assets.require_watermark_spec(&WatermarkSettings::default()).unwrap();
    let inputs: Vec<BatchInput> = ["sala", "cozinha", "varanda"]
        .iter()
        .map(|stem| BatchInput::new(format!("{}.jpg", stem), encode(&cover_photo(), ImageFormat::Jpeg)))
        .collect();

    let output = process_batch(&inputs, &spec, OutputMode::Archive, &mut |_, _| {}).unwrap();
    assert!(output.failures.is_empty());
    assert_eq!(output.files.len(), 1);
    assert_eq!(output.files[0].name, ARCHIVE_NAME);

    let entries = zip_entries(&output.files[0].bytes);
    let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec!["sala_marcadagua.jpg", "cozinha_marcadagua.jpg", "varanda_marcadagua.jpg"]
    );
    for (_, data) in &entries {
        let decoded = image::load_from_memory(data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 300));
    }
}

#[test]
fn test_overlong_title_shrinks_to_floor_without_error() {
    let record = PropertyRecord {
        name: "Condomínio Residencial Parque das Palmeiras Imperiais do Atlântico Sul".to_string(),
        neighborhood: "Praia de Iracema".to_string(),
        ..Default::default()
    };
    let bold = Font::helvetica_bold();
    assert_eq!(fit_one_line(&record.title(), 523.28, &bold, 24.0, 10.0), 10.0);

    let cover = cover_photo();
    let pdf = build_expanded_pdf(&FlyerRequest::new(&record, &cover), &AssetConfig::default()).unwrap();
    assert_eq!(count_pages(&pdf).unwrap(), 1);
}

#[test]
fn test_empty_icon_table_still_draws_every_detail() {
    let record = itagua();
    let cover = cover_photo();
    let assets = AssetConfig::default();
    assert!(assets.icons.is_empty());

    let expanded = build_expanded_pdf(&FlyerRequest::new(&record, &cover), &assets).unwrap();
    let quadrant = build_quadrant_pdf(&FlyerRequest::new(&record, &cover), &assets).unwrap();

    for pdf in [expanded, quadrant] {
        let strings = shown_strings(&pdf);
        for label in ["Quartos: ", "Suítes: ", "Banheiros: ", "Vagas: ", "Área: ", "Pet: "] {
            assert!(
                strings.contains(&encode_winansi(label)),
                "missing label {}",
                label
            );
        }
        assert!(strings.contains(&encode_winansi("120 m²")));
        assert!(strings.contains(&encode_winansi("Sim")));
    }
}

#[test]
fn test_rendering_is_byte_identical() {
    let assets = AssetConfig::default()
        .with_watermark(white_mark())
        .with_logo(DynamicImage::ImageRgba8(RgbaImage::from_pixel(60, 20, Rgba([200, 160, 40, 180]))));
    let spec = assets.watermark_spec(&centre_settings()).unwrap();
    let record = itagua();
    let cover = cover_photo();
    let gallery = vec![cover_photo(), cover_photo(), cover_photo()];
    let request = FlyerRequest::new(&record, &cover)
        .with_gallery(&gallery)
        .with_watermark(spec.as_ref());

    assert_eq!(
        build_expanded_pdf(&request, &assets).unwrap(),
        build_expanded_pdf(&request, &assets).unwrap()
    );
    assert_eq!(
        build_quadrant_pdf(&request, &assets).unwrap(),
        build_quadrant_pdf(&request, &assets).unwrap()
    );
}

#[test]
fn test_batch_isolates_broken_photo() {
    let assets = AssetConfig::default().with_watermark(white_mark());
    let spec = assets.require_watermark_spec(&WatermarkSettings::default()).unwrap();
    let inputs = vec![
        BatchInput::new("a.png", encode(&cover_photo(), ImageFormat::Png)),
        BatchInput::new("b.jpg", b"\xFF\xD8 truncated".to_vec()),
        BatchInput::new("c.jpg", encode(&cover_photo(), ImageFormat::Jpeg)),
    ];

    for mode in [OutputMode::SingleDocument, OutputMode::IndividualFiles, OutputMode::Archive] {
        let output = process_batch(&inputs, &spec, mode, &mut |_, _| {}).unwrap();
        assert_eq!(output.failures.len(), 1, "mode {}", mode);
        assert_eq!(output.failures[0].name, "b.jpg");
        match mode {
            OutputMode::SingleDocument => {
                assert_eq!(count_pages(&output.files[0].bytes).unwrap(), 2)
            }
            OutputMode::IndividualFiles => assert_eq!(output.files.len(), 2),
            OutputMode::Archive => assert_eq!(zip_entries(&output.files[0].bytes).len(), 2),
        }
    }
}

#[test]
fn test_batch_files_keep_exif_and_icc() {
    const TIFF: &[u8] = &[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];
    const ICC: &[u8] = b"camera colour profile used for the batch run";

    let assets = AssetConfig::default().with_watermark(white_mark());
    let spec = assets.require_watermark_spec(&WatermarkSettings::default()).unwrap();
    let rgba = cover_photo().to_rgba8();
    let inputs = vec![
        BatchInput::new(
            "fachada.jpg",
            encode_preserving(&rgba, OutputFormat::Jpeg, Some(TIFF), Some(ICC)).unwrap(),
        ),
        BatchInput::new(
            "planta.png",
            encode_preserving(&rgba, OutputFormat::Png, Some(TIFF), Some(ICC)).unwrap(),
        ),
    ];

    let output = process_batch(&inputs, &spec, OutputMode::IndividualFiles, &mut |_, _| {}).unwrap();
    assert!(output.failures.is_empty());
    assert_eq!(output.fallback_encodes, 0);
    assert_eq!(output.files.len(), 2);

    let dir = TempDir::new().unwrap();
    for file in &output.files {
        let path = dir.path().join(&file.name);
        std::fs::write(&path, &file.bytes).unwrap();

        let reread = PhotoAsset::decode(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(reread.icc.as_deref(), Some(ICC), "{}", file.name);
        assert!(reread.exif.unwrap().ends_with(TIFF), "{}", file.name);
        assert_eq!(
            (reread.image.width(), reread.image.height()),
            (400, 300),
            "{}",
            file.name
        );
    }
}

#[test]
fn test_flyer_with_attachments() {
    let assets = AssetConfig::default().with_watermark(white_mark());
    let spec = assets.watermark_spec(&WatermarkSettings::default()).unwrap();
    let record = itagua();
    let cover = cover_photo();
    let request = FlyerRequest::new(&record, &cover).with_watermark(spec.as_ref());
    let attachments = vec![
        BatchInput::new("1.jpg", encode(&cover_photo(), ImageFormat::Jpeg)),
        BatchInput::new("2.txt", b"not a photo".to_vec()),
        BatchInput::new("3.png", encode(&cover_photo(), ImageFormat::Png)),
    ];

    let pdf = build_flyer_with_attachments(&request, &assets, &attachments).unwrap();
    assert_eq!(count_pages(&pdf).unwrap(), 3);

    let unmarked = FlyerRequest::new(&record, &cover);
    assert!(build_flyer_with_attachments(&unmarked, &assets, &attachments).is_err());
}

#[test]
fn test_written_flyer_metadata() {
    let dir = TempDir::new().unwrap();
    let record = itagua();
    let cover = cover_photo();
    let pdf = build_quadrant_pdf(&FlyerRequest::new(&record, &cover), &AssetConfig::default()).unwrap();

    let path = dir.path().join("folheto.pdf");
    std::fs::write(&path, &pdf).unwrap();
    let metadata = extract_metadata(&path).unwrap();
    assert_eq!(metadata.page_count, 1);
    assert_eq!(metadata.title.as_deref(), Some("EDIFÍCIO ITAGUA / ALDEOTA"));
    assert!(metadata.producer.unwrap().starts_with("property-flyer"));

    assert!(extract_metadata(&dir.path().join("missing.pdf")).is_err());
}

#[test]
fn test_render_cache_reuses_flyer() {
    let assets = AssetConfig::default();
    let record = itagua();
    let cover = cover_photo();
    let settings = WatermarkSettings::default();
    let key = |record: &PropertyRecord| {
        RenderKey::builder()
            .field("expanded")
            .field(record)
            .image(&cover)
            .field(&settings)
            .finish()
    };

    let cache = RenderCache::new(4);
    let first = cache
        .get_or_render(key(&record), || build_expanded_pdf(&FlyerRequest::new(&record, &cover), &assets))
        .unwrap();
    let second = cache
        .get_or_render(key(&record), || panic!("inputs unchanged, render must be skipped"))
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let mut changed = record.clone();
    changed.price_text = "R$ 699.000,00".to_string();
    assert_ne!(key(&record), key(&changed));
}
