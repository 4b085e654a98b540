// src/models/mod.rs

//! Domain models for the diary pipeline.
//!
//! Raw API records live in `block`, the normalized diary model in `diary`,
//! and file-based settings in `config`.

mod block;
mod config;
mod diary;

// Re-export all public types
pub use block::{Block, ImageSource, Mention, Page, PageRef, Paginated, RichText, TextContent};
pub use config::{
    Config, DerivativeFormat, DerivativeSize, HttpConfig, ImageConfig, LinkCardConfig,
    LoggingConfig, NotionConfig, PathsConfig, SegmentConfig, ENV_API_KEY, ENV_DATABASE_ID,
};
pub use diary::{
    AUTO_INDEX_MIN_TOPICS, DerivativeSet, DiaryEntry, EligibleRow, IndexDirection, OgpRecord,
    Topic,
};
