//! PDF construction module

pub mod canvas;
pub mod document;
pub mod font;
pub mod metadata;

// Re-export commonly used items
pub use canvas::{Color, ImageRef, PageCanvas, Paint};
pub use document::PdfBuilder;
pub use font::{Font, FontWeight, Typeface};
pub use metadata::{count_pages, extract_metadata, inspect_pdf, PdfMetadata};
