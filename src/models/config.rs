//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable holding the Notion integration token.
pub const ENV_API_KEY: &str = "NOTION_API_KEY";

/// Environment variable holding the diary database id.
pub const ENV_DATABASE_ID: &str = "DATABASE_ID";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Content API access and database schema
    #[serde(default)]
    pub notion: NotionConfig,

    /// Outbound HTTP settings for link and image fetches
    #[serde(default)]
    pub http: HttpConfig,

    /// Cache and output locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Topic segmentation rules
    #[serde(default)]
    pub segment: SegmentConfig,

    /// Link card rendering
    #[serde(default)]
    pub linkcard: LinkCardConfig,

    /// Image derivative generation
    #[serde(default)]
    pub images: ImageConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Override secrets from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_API_KEY).ok(),
            std::env::var(ENV_DATABASE_ID).ok(),
        );
    }

    fn apply_overrides(&mut self, api_key: Option<String>, database_id: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.notion.api_key = key;
        }
        if let Some(id) = database_id.filter(|id| !id.trim().is_empty()) {
            self.notion.database_id = id;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.notion.timeout_secs == 0 {
            return Err(AppError::validation("notion.timeout_secs must be > 0"));
        }
        if !(1..=100).contains(&self.notion.page_size) {
            return Err(AppError::validation("notion.page_size must be in 1..=100"));
        }
        if self.segment.topic_heading.trim().is_empty() {
            return Err(AppError::validation("segment.topic_heading is empty"));
        }
        if self.segment.private_tag.trim().is_empty() {
            return Err(AppError::validation("segment.private_tag is empty"));
        }
        if self.images.sizes.is_empty() {
            return Err(AppError::validation("images.sizes must not be empty"));
        }
        if self.images.sizes.iter().any(|s| s.width == 0) {
            return Err(AppError::validation("images.sizes widths must be > 0"));
        }
        if !(1..=100).contains(&self.images.quality) {
            return Err(AppError::validation("images.quality must be in 1..=100"));
        }
        Ok(())
    }

    /// Check that the credentials needed for a live fetch are present.
    pub fn require_credentials(&self) -> Result<()> {
        if self.notion.api_key.trim().is_empty() {
            return Err(AppError::config(format!(
                "notion.api_key is empty (set {ENV_API_KEY})"
            )));
        }
        if self.notion.database_id.trim().is_empty() {
            return Err(AppError::config(format!(
                "notion.database_id is empty (set {ENV_DATABASE_ID})"
            )));
        }
        Ok(())
    }
}

/// Content API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// API root, without trailing slash
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Value of the `Notion-Version` header
    #[serde(default = "defaults::api_version")]
    pub api_version: String,

    /// Integration token (usually supplied through the environment)
    #[serde(default)]
    pub api_key: String,

    /// Diary database id (usually supplied through the environment)
    #[serde(default)]
    pub database_id: String,

    /// Items requested per page (the API caps this at 100)
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Timeout for API requests in seconds
    #[serde(default = "defaults::api_timeout")]
    pub timeout_secs: u64,

    /// Date property holding the entry date
    #[serde(default = "defaults::date_property")]
    pub date_property: String,

    /// Checkbox property marking a page as public
    #[serde(default = "defaults::public_property")]
    pub public_property: String,

    /// Select property holding the index direction
    #[serde(default = "defaults::index_property")]
    pub index_property: String,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::api_base(),
            api_version: defaults::api_version(),
            api_key: String::new(),
            database_id: String::new(),
            page_size: defaults::page_size(),
            timeout_secs: defaults::api_timeout(),
            date_property: defaults::date_property(),
            public_property: defaults::public_property(),
            index_property: defaults::index_property(),
        }
    }
}

/// HTTP client settings for link and image fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for outbound requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for snapshots and link caches
    #[serde(default = "defaults::cache_dir")]
    pub cache_dir: PathBuf,

    /// Directory for published artifacts (images, derivatives, json)
    #[serde(default = "defaults::output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: defaults::cache_dir(),
            output_dir: defaults::output_dir(),
        }
    }
}

impl PathsConfig {
    pub fn ogp_cache_path(&self) -> PathBuf {
        self.cache_dir.join("ogp.json")
    }

    pub fn embed_cache_path(&self) -> PathBuf {
        self.cache_dir.join("twitter.json")
    }

    pub fn enriched_data_path(&self) -> PathBuf {
        self.output_dir.join("json").join("diary.json")
    }

    pub fn search_data_path(&self) -> PathBuf {
        self.output_dir.join("json").join("search_data.json")
    }

    pub fn search_index_path(&self) -> PathBuf {
        self.output_dir.join("json").join("search_index.json")
    }
}

/// Segmentation rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Block type that opens a new topic
    #[serde(default = "defaults::topic_heading")]
    pub topic_heading: String,

    /// Hashtag that keeps a topic out of the published output
    #[serde(default = "defaults::private_tag")]
    pub private_tag: String,

    /// Topics edited more recently than this are held back
    #[serde(default = "defaults::grace_minutes")]
    pub grace_minutes: i64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            topic_heading: defaults::topic_heading(),
            private_tag: defaults::private_tag(),
            grace_minutes: defaults::grace_minutes(),
        }
    }
}

impl SegmentConfig {
    pub fn grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.grace_minutes)
    }
}

/// Link card settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCardConfig {
    /// Descriptions longer than this many characters are cut with `...`
    #[serde(default = "defaults::max_description_length")]
    pub max_description_length: usize,

    /// oEmbed endpoint for twitter.com / x.com links
    #[serde(default = "defaults::twitter_oembed")]
    pub twitter_oembed_endpoint: String,
}

impl Default for LinkCardConfig {
    fn default() -> Self {
        Self {
            max_description_length: defaults::max_description_length(),
            twitter_oembed_endpoint: defaults::twitter_oembed(),
        }
    }
}

/// Encoded format of image derivatives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DerivativeFormat {
    #[default]
    Avif,
    Jpeg,
}

impl DerivativeFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Jpeg => "jpg",
        }
    }
}

/// One derivative width.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DerivativeSize {
    /// Directory name and srcset key (e.g. "small")
    pub label: String,

    /// Maximum width and height in pixels
    pub width: u32,
}

/// Image derivative settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Encoder quality (1-100)
    #[serde(default = "defaults::quality")]
    pub quality: u8,

    #[serde(default)]
    pub format: DerivativeFormat,

    /// Target sizes, smallest first
    #[serde(default = "defaults::derivative_sizes")]
    pub sizes: Vec<DerivativeSize>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            quality: defaults::quality(),
            format: DerivativeFormat::default(),
            sizes: defaults::derivative_sizes(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::DerivativeSize;

    // Notion defaults
    pub fn api_base() -> String {
        "https://api.notion.com/v1".into()
    }
    pub fn api_version() -> String {
        "2022-06-28".into()
    }
    pub fn page_size() -> u32 {
        100
    }
    pub fn api_timeout() -> u64 {
        30
    }
    pub fn date_property() -> String {
        "日付".into()
    }
    pub fn public_property() -> String {
        "公開".into()
    }
    pub fn index_property() -> String {
        "インデックス".into()
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; diary-publisher/0.1)".into()
    }
    pub fn timeout() -> u64 {
        5
    }

    // Path defaults
    pub fn cache_dir() -> PathBuf {
        PathBuf::from("cache")
    }
    pub fn output_dir() -> PathBuf {
        PathBuf::from("output")
    }

    // Segmentation defaults
    pub fn topic_heading() -> String {
        "heading_3".into()
    }
    pub fn private_tag() -> String {
        "非公開".into()
    }
    pub fn grace_minutes() -> i64 {
        5
    }

    // Link card defaults
    pub fn max_description_length() -> usize {
        90
    }
    pub fn twitter_oembed() -> String {
        "https://publish.twitter.com/oembed".into()
    }

    // Image defaults
    pub fn quality() -> u8 {
        85
    }
    pub fn derivative_sizes() -> Vec<DerivativeSize> {
        vec![
            DerivativeSize {
                label: "small".into(),
                width: 380,
            },
            DerivativeSize {
                label: "medium".into(),
                width: 520,
            },
            DerivativeSize {
                label: "large".into(),
                width: 720,
            },
        ]
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_page() {
        let mut config = Config::default();
        config.notion.page_size = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_missing_sizes() {
        let mut config = Config::default();
        config.images.sizes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [segment]
            private_tag = "secret"

            [images]
            format = "jpeg"
            "#,
        )
        .unwrap();

        assert_eq!(config.segment.private_tag, "secret");
        assert_eq!(config.segment.topic_heading, "heading_3");
        assert_eq!(config.images.format, DerivativeFormat::Jpeg);
        assert_eq!(config.images.sizes.len(), 3);
        assert_eq!(config.notion.page_size, 100);
    }

    #[test]
    fn overrides_ignore_blank_values() {
        let mut config = Config::default();
        config.notion.database_id = "from-file".into();
        config.apply_overrides(Some("secret_token".into()), Some("  ".into()));

        assert_eq!(config.notion.api_key, "secret_token");
        assert_eq!(config.notion.database_id, "from-file");
        assert!(config.require_credentials().is_ok());
    }

    #[test]
    fn credentials_required_for_live_fetch() {
        assert!(Config::default().require_credentials().is_err());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(matches!(
            Config::load("/nonexistent/config.toml"),
            Err(AppError::Io(_))
        ));
    }
}
