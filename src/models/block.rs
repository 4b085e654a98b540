//! Raw records returned by the Notion API.
//!
//! These types stay close to the wire format. Only the fields the pipeline
//! reads are typed; everything else is kept as JSON and looked up on demand.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Paginated list envelope shared by the query and children endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A database row (a diary page).
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Page {
    /// `date.start` of a date property.
    pub fn date_start(&self, property: &str) -> Option<&str> {
        self.properties
            .get(property)?
            .get("date")?
            .get("start")?
            .as_str()
    }

    /// Value of a checkbox property (missing counts as unchecked).
    pub fn checkbox(&self, property: &str) -> bool {
        self.properties
            .get(property)
            .and_then(|p| p.get("checkbox"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Name of the selected option of a select property.
    pub fn select_name(&self, property: &str) -> Option<&str> {
        self.properties
            .get(property)?
            .get("select")?
            .get("name")?
            .as_str()
    }

    /// Plain text of the page's title property, whatever it is named.
    pub fn title(&self) -> Option<String> {
        let runs = self
            .properties
            .values()
            .find(|p| p.get("type").and_then(Value::as_str) == Some("title"))?
            .get("title")?
            .as_array()?;

        let title: String = runs.iter().filter_map(plain_text).collect();
        if title.trim().is_empty() {
            None
        } else {
            Some(title)
        }
    }
}

fn plain_text(run: &Value) -> Option<&str> {
    run.get("plain_text")
        .and_then(Value::as_str)
        .or_else(|| run.get("text")?.get("content")?.as_str())
}

/// A content block of a page.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub last_edited_time: DateTime<Utc>,

    /// Remaining fields, including the type-specific body keyed by `kind`
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// Where an image block's file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Hosted by a third party
    External(String),
    /// Hosted by Notion (signed, expiring URL)
    Hosted(String),
}

impl ImageSource {
    pub fn url(&self) -> &str {
        match self {
            Self::External(url) | Self::Hosted(url) => url,
        }
    }
}

impl Block {
    fn body(&self) -> Option<&Value> {
        self.payload.get(&self.kind)
    }

    /// Whether the block body carries a `rich_text` array.
    pub fn is_text_bearing(&self) -> bool {
        self.body()
            .and_then(|b| b.get("rich_text"))
            .is_some_and(Value::is_array)
    }

    /// Rich-text runs of the block. Runs that fail to parse are skipped.
    pub fn rich_text(&self) -> Vec<RichText> {
        let Some(runs) = self
            .body()
            .and_then(|b| b.get("rich_text"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        runs.iter()
            .filter_map(|run| match RichText::deserialize(run) {
                Ok(rt) => Some(rt),
                Err(e) => {
                    log::debug!("Skipping unreadable rich text in block {}: {}", self.id, e);
                    None
                }
            })
            .collect()
    }

    /// Source of an image block; `None` for other blocks and unknown sub-types.
    pub fn image_source(&self) -> Option<ImageSource> {
        if self.kind != "image" {
            return None;
        }
        let body = self.body()?;
        let url = |key: &str| {
            body.get(key)
                .and_then(|v| v.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        match body.get("type").and_then(Value::as_str)? {
            "external" => url("external").map(ImageSource::External),
            "file" => url("file").map(ImageSource::Hosted),
            _ => None,
        }
    }
}

/// One run of rich text.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichText {
    Text { text: TextContent },
    Mention { mention: Mention },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TextContent {
    pub content: String,
}

/// Inline reference to another object.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mention {
    Page { page: PageRef },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PageRef {
    pub id: String,
}
