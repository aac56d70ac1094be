//! Photo decoding and re-encoding with EXIF/ICC carried through

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::metadata::Orientation;
use image::{
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageError, ImageReader,
    RgbaImage,
};
use log::{debug, warn};

use crate::error::{Error, Result};

/// JPEG quality for metadata-preserving batch output
pub const BATCH_JPEG_QUALITY: u8 = 95;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const PNG_SIGNATURE_LEN: usize = 8;
const PNG_IHDR_CHUNK_LEN: usize = 25;

/// Format family a processed photo is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// JPEG for `.jpg`/`.jpeg` names, PNG for everything else
    pub fn from_file_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("jpg") | Some("jpeg") => OutputFormat::Jpeg,
            _ => OutputFormat::Png,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }
}

/// A decoded photo plus the metadata found in its file
#[derive(Debug, Clone)]
pub struct PhotoAsset {
    pub image: DynamicImage,
    pub exif: Option<Vec<u8>>,
    pub icc: Option<Vec<u8>>,
    pub orientation: Orientation,
}

impl PhotoAsset {
    /// Decode, keeping EXIF and ICC when the decoder can read them
    ///
    /// If reading metadata fails the pixels are decoded again without it.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match decode_with_metadata(bytes) {
            Ok(photo) => Ok(photo),
            Err(e) => {
                warn!("Reading photo metadata failed ({}); decoding pixels only", e);
                let image = image::load_from_memory(bytes)?;
                Ok(Self {
                    image,
                    exif: None,
                    icc: None,
                    orientation: Orientation::NoTransforms,
                })
            }
        }
    }

    /// Decode and rotate/flip according to the EXIF orientation
    pub fn decode_upright(bytes: &[u8]) -> Result<DynamicImage> {
        let photo = Self::decode(bytes)?;
        let mut image = photo.image;
        image.apply_orientation(photo.orientation);
        Ok(image)
    }
}

fn decode_with_metadata(bytes: &[u8]) -> Result<PhotoAsset> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let icc = decoder.icc_profile()?;
    let exif = decoder.exif_metadata()?;
    let orientation = decoder.orientation()?;
    let image = DynamicImage::from_decoder(decoder)?;

    debug!(
        "Decoded {}x{} photo (exif: {}, icc: {})",
        image.width(),
        image.height(),
        exif.is_some(),
        icc.is_some()
    );

    Ok(PhotoAsset {
        image,
        exif,
        icc,
        orientation,
    })
}

/// Encoded output of one processed photo
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPhoto {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    /// False when the simplified fallback encoder had to be used
    pub metadata_preserved: bool,
}

/// Encode keeping metadata; on any failure re-encode plainly
pub fn encode_photo(
    photo: &RgbaImage,
    format: OutputFormat,
    exif: Option<&[u8]>,
    icc: Option<&[u8]>,
) -> Result<EncodedPhoto> {
    match encode_preserving(photo, format, exif, icc) {
        Ok(bytes) => Ok(EncodedPhoto {
            bytes,
            format,
            metadata_preserved: true,
        }),
        Err(e) => {
            warn!("Metadata-preserving encode failed ({}); using defaults", e);
            Ok(EncodedPhoto {
                bytes: encode_default(photo, format)?,
                format,
                metadata_preserved: false,
            })
        }
    }
}

/// High-quality encode with EXIF and ICC attached
pub fn encode_preserving(
    photo: &RgbaImage,
    format: OutputFormat,
    exif: Option<&[u8]>,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(photo.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, BATCH_JPEG_QUALITY);
            if let Some(icc) = icc {
                encoder
                    .set_icc_profile(icc.to_vec())
                    .map_err(ImageError::Unsupported)?;
            }
            encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
            if let Some(exif) = exif {
                bytes = insert_jpeg_exif(&bytes, exif)?;
            }
        }
        OutputFormat::Png => {
            let mut encoder = PngEncoder::new(&mut bytes);
            if let Some(icc) = icc {
                encoder
                    .set_icc_profile(icc.to_vec())
                    .map_err(ImageError::Unsupported)?;
            }
            encoder.write_image(
                photo.as_raw(),
                photo.width(),
                photo.height(),
                ExtendedColorType::Rgba8,
            )?;
            if let Some(exif) = exif {
                bytes = insert_png_exif(&bytes, exif)?;
            }
        }
    }
    Ok(bytes)
}

/// Encoder defaults, no metadata
pub fn encode_default(photo: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(photo.clone()).to_rgb8();
            JpegEncoder::new(&mut bytes).encode_image(&rgb)?;
        }
        OutputFormat::Png => {
            PngEncoder::new(&mut bytes).write_image(
                photo.as_raw(),
                photo.width(),
                photo.height(),
                ExtendedColorType::Rgba8,
            )?;
        }
    }
    Ok(bytes)
}

/// Add an APP1 EXIF segment after SOI (and after a JFIF APP0 if present)
fn insert_jpeg_exif(jpeg: &[u8], exif: &[u8]) -> Result<Vec<u8>> {
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return Err(Error::General("JPEG stream lacks SOI marker".to_string()));
    }

    let mut payload = Vec::with_capacity(exif.len() + EXIF_HEADER.len());
    if !exif.starts_with(EXIF_HEADER) {
        payload.extend_from_slice(EXIF_HEADER);
    }
    payload.extend_from_slice(exif);

    let segment_len = payload.len() + 2;
    if segment_len > u16::MAX as usize {
        return Err(Error::General(format!(
            "EXIF block of {} bytes does not fit a JPEG APP1 segment",
            payload.len()
        )));
    }

    let mut insert_at = 2;
    if jpeg.len() >= 6 && jpeg[2] == 0xFF && jpeg[3] == 0xE0 {
        insert_at = 4 + u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
    }
    if insert_at > jpeg.len() {
        return Err(Error::General("Truncated JPEG APP0 segment".to_string()));
    }

    let mut out = Vec::with_capacity(jpeg.len() + segment_len + 2);
    out.extend_from_slice(&jpeg[..insert_at]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&(segment_len as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[insert_at..]);
    Ok(out)
}

/// Add an `eXIf` chunk right after IHDR
fn insert_png_exif(png: &[u8], exif: &[u8]) -> Result<Vec<u8>> {
    let insert_at = PNG_SIGNATURE_LEN + PNG_IHDR_CHUNK_LEN;
    if png.len() < insert_at || &png[12..16] != b"IHDR" {
        return Err(Error::General("PNG stream does not start with IHDR".to_string()));
    }

    let data = exif.strip_prefix(EXIF_HEADER).unwrap_or(exif);
    let length = u32::try_from(data.len())
        .map_err(|_| Error::General("EXIF block too large for a PNG chunk".to_string()))?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(b"eXIf");
    hasher.update(data);
    let crc = hasher.finalize();

    let mut out = Vec::with_capacity(png.len() + data.len() + 12);
    out.extend_from_slice(&png[..insert_at]);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(b"eXIf");
    out.extend_from_slice(data);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&png[insert_at..]);
    Ok(out)
}
