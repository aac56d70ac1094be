//! Batch watermarking
//!
//! Photos are processed one at a time, in input order. A photo that fails
//! is reported and skipped; the rest of the batch still completes.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use image::DynamicImage;
use log::{debug, info, warn};

use crate::archive::StoredZip;
use crate::error::{Error, Result};
use crate::layout::PageDimensions;
use crate::pdf::{PdfBuilder, Typeface};
use crate::photo::{encode_photo, OutputFormat, PhotoAsset};
use crate::watermark::{composite_once, WatermarkSpec};

/// Appended to each source stem
pub const OUTPUT_SUFFIX: &str = "_marcadagua";
/// File name of the single-document output
pub const DOCUMENT_NAME: &str = "imagens_marcadagua.pdf";
/// File name of the archive output
pub const ARCHIVE_NAME: &str = "imagens_marcadagua.zip";
/// Resolution used to size single-document pages
pub const DOCUMENT_DPI: f64 = 300.0;

/// One uploaded photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInput {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl BatchInput {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a photo from disk, named after its file name
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, std::fs::read(path)?))
    }
}

/// How processed photos are packaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMode {
    /// One PDF, one photo per page
    SingleDocument,
    /// One image file per input
    IndividualFiles,
    /// One ZIP holding an image file per input
    Archive,
}

impl OutputMode {
    pub fn id(self) -> &'static str {
        match self {
            OutputMode::SingleDocument => "single-document",
            OutputMode::IndividualFiles => "individual-files",
            OutputMode::Archive => "archive",
        }
    }
}

impl FromStr for OutputMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "single-document" | "pdf único" | "pdf" => Ok(OutputMode::SingleDocument),
            "individual-files" | "arquivos individuais" | "files" => Ok(OutputMode::IndividualFiles),
            "archive" | "zip" => Ok(OutputMode::Archive),
            _ => Err(Error::InvalidSetting {
                name: "mode",
                message: format!(
                    "'{}' is not one of single-document, individual-files, archive",
                    s
                ),
            }),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A produced file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// A photo that could not be processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub name: String,
    pub reason: String,
}

/// Everything a batch run produced
///
/// A photo that cannot be decoded or encoded is left out of the output and
/// listed in `failures` instead, so `files` (or the pages or archive
/// entries) may number fewer than the inputs.
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    pub files: Vec<OutputFile>,
    pub failures: Vec<BatchFailure>,
    /// Photos written by the plain encoder after the metadata-preserving
    /// encoder failed
    pub fallback_encodes: usize,
}

/// `{stem}_marcadagua.{ext}`
pub fn watermarked_name(source: &str, format: OutputFormat) -> String {
    let stem = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string());
    format!("{}{}.{}", stem, OUTPUT_SUFFIX, format.extension())
}

/// Give repeated names a numeric suffix so every entry stays addressable
fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let path = Path::new(&name);
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = path.extension().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}.{}", stem, n, ext);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Watermark every input and package the results per `mode`
///
/// `progress` is called with `(done, total)` after each photo.
pub fn process_batch(
    inputs: &[BatchInput],
    spec: &WatermarkSpec,
    mode: OutputMode,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<BatchOutput> {
    if inputs.is_empty() {
        return Err(Error::MissingInput("photos to watermark".to_string()));
    }

    let total = inputs.len();
    let mut output = BatchOutput::default();
    let mut document = match mode {
        OutputMode::SingleDocument => Some(PdfBuilder::new(Arc::new(Typeface::default()))?),
        _ => None,
    };
    let mut archive = match mode {
        OutputMode::Archive => Some(StoredZip::new()),
        _ => None,
    };
    let mut taken = HashSet::new();

    for (index, input) in inputs.iter().enumerate() {
        let result = if let Some(builder) = document.as_mut() {
            add_page(builder, input, spec)
        } else {
            encode_file(input, spec).and_then(|(mut file, fallback)| {
                if fallback {
                    output.fallback_encodes += 1;
                }
                file.name = unique_name(std::mem::take(&mut file.name), &mut taken);
                match archive.as_mut() {
                    Some(zip) => zip.add(&file.name, &file.bytes),
                    None => {
                        output.files.push(file);
                        Ok(())
                    }
                }
            })
        };

        if let Err(e) = result {
            warn!("Skipping {}: {}", input.name, e);
            output.failures.push(BatchFailure {
                name: input.name.clone(),
                reason: e.to_string(),
            });
        }

        let done = index + 1;
        debug!("{}/{} photos processed", done, total);
        progress(done, total);
    }

    if let Some(builder) = document {
        if builder.page_count() > 0 {
            output.files.push(OutputFile {
                name: DOCUMENT_NAME.to_string(),
                mime: "application/pdf",
                bytes: builder.finish()?,
            });
        }
    }
    if let Some(zip) = archive {
        if !zip.is_empty() {
            output.files.push(OutputFile {
                name: ARCHIVE_NAME.to_string(),
                mime: "application/zip",
                bytes: zip.finish()?,
            });
        }
    }

    info!(
        "Batch finished: {} file(s), {} failure(s), {} plain re-encode(s)",
        output.files.len(),
        output.failures.len(),
        output.fallback_encodes
    );
    Ok(output)
}

/// One page sized to the photo at [`DOCUMENT_DPI`]
fn add_page(builder: &mut PdfBuilder, input: &BatchInput, spec: &WatermarkSpec) -> Result<()> {
    let photo = PhotoAsset::decode(&input.bytes)?;
    let marked = DynamicImage::ImageRgba8(composite_once(&photo.image, spec));
    let flattened = DynamicImage::ImageRgb8(marked.to_rgb8());
    let image = builder.add_image(&flattened)?;

    let page = PageDimensions::from_pixels(image.width, image.height, DOCUMENT_DPI);
    let mut canvas = builder.begin_page(page);
    canvas.draw_image(&image, page.bounds());
    builder.finish_page(canvas)
}

/// Watermarked image file; the flag is set when metadata had to be dropped
fn encode_file(input: &BatchInput, spec: &WatermarkSpec) -> Result<(OutputFile, bool)> {
    let photo = PhotoAsset::decode(&input.bytes)?;
    let marked = composite_once(&photo.image, spec);
    let format = OutputFormat::from_file_name(&input.name);
    let encoded = encode_photo(&marked, format, photo.exif.as_deref(), photo.icc.as_deref())?;

    Ok((
        OutputFile {
            name: watermarked_name(&input.name, format),
            mime: format.mime(),
            bytes: encoded.bytes,
        },
        !encoded.metadata_preserved,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::inspect_pdf;
    use crate::watermark::{Anchor, Placement};
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn spec() -> WatermarkSpec {
        WatermarkSpec {
            image: Arc::new(RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]))),
            placement: Placement::Anchored(Anchor::Center),
            scale: 0.2,
            opacity: 0.6,
            margin: 2,
        }
    }

    fn photo(name: &str, width: u32, height: u32, format: ImageFormat) -> BatchInput {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 80, 120])))
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        BatchInput::new(name, bytes)
    }

    #[test]
    fn test_watermarked_name() {
        assert_eq!(watermarked_name("sala.JPEG", OutputFormat::Jpeg), "sala_marcadagua.jpg");
        assert_eq!(watermarked_name("fotos/varanda.png", OutputFormat::Png), "varanda_marcadagua.png");
        assert_eq!(watermarked_name("planta.webp", OutputFormat::Png), "planta_marcadagua.png");
    }

    #[test]
    fn test_output_mode_parsing() {
        assert_eq!("archive".parse::<OutputMode>().unwrap(), OutputMode::Archive);
        assert_eq!("ZIP".parse::<OutputMode>().unwrap(), OutputMode::Archive);
        assert_eq!(
            "PDF único".parse::<OutputMode>().unwrap(),
            OutputMode::SingleDocument
        );
        assert!("tarball".parse::<OutputMode>().is_err());
    }

    #[test]
    fn test_unique_names() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("a_marcadagua.jpg".into(), &mut taken), "a_marcadagua.jpg");
        assert_eq!(unique_name("a_marcadagua.jpg".into(), &mut taken), "a_marcadagua_2.jpg");
        assert_eq!(unique_name("a_marcadagua.jpg".into(), &mut taken), "a_marcadagua_3.jpg");
    }

    #[test]
    fn test_empty_batch_is_blocking() {
        let result = process_batch(&[], &spec(), OutputMode::Archive, &mut |_, _| {});
        assert!(matches!(result, Err(Error::MissingInput(_))));
    }

    #[test]
    fn test_individual_files_keep_format_family() {
        let inputs = vec![
            photo("sala.jpg", 40, 30, ImageFormat::Jpeg),
            photo("quarto.png", 30, 40, ImageFormat::Png),
        ];
        let output = process_batch(&inputs, &spec(), OutputMode::IndividualFiles, &mut |_, _| {}).unwrap();

        assert!(output.failures.is_empty());
        let names: Vec<&str> = output.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["sala_marcadagua.jpg", "quarto_marcadagua.png"]);
        assert_eq!(output.files[0].mime, "image/jpeg");

        let decoded = image::load_from_memory(&output.files[1].bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 40));
    }

    #[test]
    fn test_single_document_pages_sized_at_300_dpi() {
        let inputs = vec![
            photo("a.jpg", 300, 600, ImageFormat::Jpeg),
            photo("b.png", 600, 300, ImageFormat::Png),
        ];
        let output = process_batch(&inputs, &spec(), OutputMode::SingleDocument, &mut |_, _| {}).unwrap();
        assert_eq!(output.files.len(), 1);
        assert_eq!(output.files[0].name, DOCUMENT_NAME);

        let meta = inspect_pdf(&output.files[0].bytes).unwrap();
        assert_eq!(meta.page_count, 2);
        let (w, h) = meta.page_sizes[0];
        assert!((w - 72.0).abs() < 0.01 && (h - 144.0).abs() < 0.01);
    }

    #[test]
    fn test_bad_photo_does_not_stop_batch() {
        let inputs = vec![
            photo("a.jpg", 20, 20, ImageFormat::Jpeg),
            BatchInput::new("broken.jpg", b"not a jpeg".to_vec()),
            photo("c.jpg", 20, 20, ImageFormat::Jpeg),
        ];
        let mut calls = Vec::new();
        let output = process_batch(&inputs, &spec(), OutputMode::IndividualFiles, &mut |done, total| {
            calls.push((done, total))
        })
        .unwrap();

        assert_eq!(output.files.len(), 2);
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].name, "broken.jpg");
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    }
}
