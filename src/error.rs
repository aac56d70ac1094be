//! Error types for the flyer generator

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the property flyer library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raster decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// A required input is absent; rendering cannot start
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Watermark anchor name outside the nine known positions
    #[error("Unknown watermark anchor: {0}")]
    UnknownAnchor(String),

    /// A form value outside its accepted range
    #[error("Invalid setting {name}: {message}")]
    InvalidSetting { name: &'static str, message: String },

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// Font error
    #[error("Font error: {0}")]
    Font(String),

    /// Archive could not be written
    #[error("Archive error: {0}")]
    Archive(String),

    /// General error
    #[error("{0}")]
    General(String),
}
