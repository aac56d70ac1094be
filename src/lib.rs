//! Property Flyer Library
//!
//! Generates real-estate flyer PDFs and watermarks batches of photos.
//! This library provides functionality to:
//! - Fit text to fixed boxes (single-line shrink, multi-line wrap and shrink)
//! - Composite a translucent watermark onto photos at nine anchors or tiled
//! - Fill page regions with photos using cover scaling and clipping
//! - Compose the expanded and quadrant flyer layouts
//! - Watermark photo batches into one PDF, separate files, or a ZIP archive
//!
//! # Example
//!
//! ```no_run
//! use property_flyer::config::{AssetConfig, AssetPaths, WatermarkSettings};
//! use property_flyer::flyer::{build_expanded_pdf, FlyerRequest, PropertyRecord};
//! use property_flyer::photo::PhotoAsset;
//!
//! let assets = AssetConfig::load(&AssetPaths::default());
//! let watermark = assets.watermark_spec(&WatermarkSettings::default())?;
//! let record = PropertyRecord {
//!     name: "Edifício Itagua".to_string(),
//!     neighborhood: "Aldeota".to_string(),
//!     price_text: "R$ 720.000,00".to_string(),
//!     ..Default::default()
//! };
//! let cover = PhotoAsset::decode_upright(&std::fs::read("capa.jpg")?)?;
//!
//! let request = FlyerRequest::new(&record, &cover).with_watermark(watermark.as_ref());
//! let pdf = build_expanded_pdf(&request, &assets)?;
//! std::fs::write("folheto.pdf", pdf)?;
//! # Ok::<(), property_flyer::Error>(())
//! ```

pub mod archive;
pub mod batch;
pub mod cache;
pub mod config;
pub mod cover;
pub mod error;
pub mod flyer;
pub mod layout;
pub mod pdf;
pub mod photo;
pub mod textfit;
pub mod watermark;

// Re-export commonly used items
pub use error::{Error, Result};
