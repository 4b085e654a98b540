//! Service layer for the diary pipeline.
//!
//! This module contains the business logic for:
//! - Content retrieval (`NotionClient`)
//! - Topic segmentation (`Segmenter`)
//! - Link enrichment (`LinkEnricher`)
//! - Image downloads and derivatives (`ImageStore`)

pub mod images;
pub mod linkcard;
pub mod notion;
pub mod segment;

pub use images::{DefaultImageTagger, ImageStore};
pub use linkcard::{LinkCache, LinkEnricher};
pub use notion::{ContentSource, NotionClient};
pub use segment::{ImageTagger, Segmenter};
