//! PDF document assembly using lopdf
//!
//! [`PdfBuilder`] owns the lopdf document, the two font objects every page
//! shares, and the page tree. Pages are drawn on a [`PageCanvas`] and handed
//! back with [`PdfBuilder::finish_page`]. Output contains no timestamps or
//! random identifiers, so identical drawing produces identical bytes.

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::Result;
use crate::layout::PageDimensions;
use crate::pdf::canvas::{ImageRef, PageCanvas};
use crate::pdf::font::{Font, FontProgram, FontWeight, Typeface, FIRST_CHAR, LAST_CHAR};

/// JPEG quality used for photos placed on pages
pub const PAGE_JPEG_QUALITY: u8 = 95;

/// Incrementally built PDF document
pub struct PdfBuilder {
    document: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    fonts_id: ObjectId,
    typeface: Arc<Typeface>,
    title: Option<String>,
}

impl PdfBuilder {
    /// Start an empty document whose pages draw with `typeface`
    pub fn new(typeface: Arc<Typeface>) -> Result<Self> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();

        let regular_id = embed_font(&mut document, &typeface.regular)?;
        let bold_id = embed_font(&mut document, &typeface.bold)?;

        let mut fonts = Dictionary::new();
        fonts.set(FontWeight::Regular.resource_name(), Object::Reference(regular_id));
        fonts.set(FontWeight::Bold.resource_name(), Object::Reference(bold_id));
        let fonts_id = document.add_object(Object::Dictionary(fonts));

        Ok(Self {
            document,
            pages_id,
            page_ids: Vec::new(),
            fonts_id,
            typeface,
            title: None,
        })
    }

    /// Set the `/Title` entry of the document information dictionary
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn typeface(&self) -> &Arc<Typeface> {
        &self.typeface
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Embed a raster as an image XObject
    ///
    /// Opaque images are stored as JPEG (DCTDecode). Images with any
    /// non-opaque pixel are stored as RGB samples with a DeviceGray soft
    /// mask so their transparency survives.
    pub fn add_image(&mut self, image: &DynamicImage) -> Result<ImageRef> {
        let (width, height) = (image.width(), image.height());

        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", Object::Integer(width as i64));
        dict.set("Height", Object::Integer(height as i64));
        dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        dict.set("BitsPerComponent", Object::Integer(8));

        let stream = if has_transparency(image) {
            let rgba = image.to_rgba8();
            let mut rgb = Vec::with_capacity((width * height * 3) as usize);
            let mut alpha = Vec::with_capacity((width * height) as usize);
            for pixel in rgba.pixels() {
                rgb.extend_from_slice(&pixel.0[..3]);
                alpha.push(pixel.0[3]);
            }

            let mut mask_dict = Dictionary::new();
            mask_dict.set("Type", Object::Name(b"XObject".to_vec()));
            mask_dict.set("Subtype", Object::Name(b"Image".to_vec()));
            mask_dict.set("Width", Object::Integer(width as i64));
            mask_dict.set("Height", Object::Integer(height as i64));
            mask_dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
            mask_dict.set("BitsPerComponent", Object::Integer(8));
            let mask_id = self.document.add_object(Stream::new(mask_dict, alpha));

            dict.set("SMask", Object::Reference(mask_id));
            Stream::new(dict, rgb)
        } else {
            let rgb = image.to_rgb8();
            let mut jpeg = Vec::new();
            JpegEncoder::new_with_quality(&mut jpeg, PAGE_JPEG_QUALITY).encode_image(&rgb)?;
            dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
            // Already compressed
            Stream::new(dict, jpeg).with_compression(false)
        };

        let id = self.document.add_object(Object::Stream(stream));
        Ok(ImageRef { id, width, height })
    }

    /// Start drawing a new page of the given size
    pub fn begin_page(&self, page: PageDimensions) -> PageCanvas {
        PageCanvas::new(page, Arc::clone(&self.typeface))
    }

    /// Append a finished canvas as the next page
    pub fn finish_page(&mut self, canvas: PageCanvas) -> Result<()> {
        let page = canvas.page();
        let (operations, xobjects) = canvas.into_parts();

        let content = Content { operations }.encode()?;
        let content_id = self
            .document
            .add_object(Stream::new(Dictionary::new(), content));

        let mut resources = Dictionary::new();
        resources.set("Font", Object::Reference(self.fonts_id));
        if !xobjects.is_empty() {
            let mut xobject_dict = Dictionary::new();
            for (name, id) in xobjects {
                xobject_dict.set(name.into_bytes(), Object::Reference(id));
            }
            resources.set("XObject", Object::Dictionary(xobject_dict));
        }

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(self.pages_id));
        page_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page.width_pt()),
                Object::Real(page.height_pt()),
            ]),
        );
        page_dict.set("Contents", Object::Reference(content_id));
        page_dict.set("Resources", Object::Dictionary(resources));

        let page_id = self.document.add_object(Object::Dictionary(page_dict));
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Close the page tree and serialise the document
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let kids: Vec<Object> = self
            .page_ids
            .iter()
            .map(|id| Object::Reference(*id))
            .collect();

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(self.page_ids.len() as i64));
        pages.set("Kids", Object::Array(kids));
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(self.pages_id));
        let catalog_id = self.document.add_object(Object::Dictionary(catalog));

        let mut info = Dictionary::new();
        info.set(
            "Producer",
            Object::String(
                concat!("property-flyer ", env!("CARGO_PKG_VERSION")).as_bytes().to_vec(),
                StringFormat::Literal,
            ),
        );
        if let Some(title) = &self.title {
            info.set(
                "Title",
                Object::String(text_string(title), StringFormat::Literal),
            );
        }
        let info_id = self.document.add_object(Object::Dictionary(info));

        self.document.trailer.set("Root", Object::Reference(catalog_id));
        self.document.trailer.set("Info", Object::Reference(info_id));

        self.document.compress();

        let mut bytes = Vec::new();
        self.document.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// PDF text string: ASCII as-is, anything else as UTF-16BE with a BOM
fn text_string(text: &str) -> Vec<u8> {
    if text.is_ascii() {
        return text.as_bytes().to_vec();
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

fn has_transparency(image: &DynamicImage) -> bool {
    image.color().has_alpha() && image.to_rgba8().pixels().any(|p| p.0[3] < u8::MAX)
}

/// Add a simple WinAnsi font to the document, embedding TrueType programs
fn embed_font(doc: &mut Document, font: &Font) -> Result<ObjectId> {
    let widths: Vec<Object> = font.widths().iter().map(|w| Object::Real(*w)).collect();

    let mut font_dict = Dictionary::new();
    font_dict.set("Type", Object::Name(b"Font".to_vec()));
    font_dict.set("BaseFont", Object::Name(font.base_name().as_bytes().to_vec()));
    font_dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    font_dict.set("FirstChar", Object::Integer(FIRST_CHAR as i64));
    font_dict.set("LastChar", Object::Integer(LAST_CHAR as i64));
    font_dict.set("Widths", Object::Array(widths));

    match font.program() {
        FontProgram::Standard => {
            font_dict.set("Subtype", Object::Name(b"Type1".to_vec()));
        }
        FontProgram::TrueType { data, metrics } => {
            let mut font_stream_dict = Dictionary::new();
            font_stream_dict.set("Length1", Object::Integer(data.len() as i64));
            let font_stream_id =
                doc.add_object(Stream::new(font_stream_dict, data.as_ref().clone()));

            let mut descriptor = Dictionary::new();
            descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
            descriptor.set("FontName", Object::Name(font.base_name().as_bytes().to_vec()));
            descriptor.set("Flags", Object::Integer(32)); // Nonsymbolic
            descriptor.set(
                "FontBBox",
                Object::Array(metrics.bbox.iter().map(|v| Object::Real(*v)).collect()),
            );
            descriptor.set("ItalicAngle", Object::Integer(0));
            descriptor.set("Ascent", Object::Real(metrics.ascent));
            descriptor.set("Descent", Object::Real(metrics.descent));
            descriptor.set("CapHeight", Object::Real(metrics.cap_height));
            descriptor.set("StemV", Object::Integer(80));
            descriptor.set("FontFile2", Object::Reference(font_stream_id));
            let descriptor_id = doc.add_object(Object::Dictionary(descriptor));

            font_dict.set("Subtype", Object::Name(b"TrueType".to_vec()));
            font_dict.set("FontDescriptor", Object::Reference(descriptor_id));
        }
    }

    Ok(doc.add_object(Object::Dictionary(font_dict)))
}
