//! Normalized diary data structures.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum topic count for an `Auto` entry to be indexed by search engines.
pub const AUTO_INDEX_MIN_TOPICS: usize = 4;

/// A titled unit of diary content bounded by heading blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    /// Heading text
    pub title: String,

    /// Id of the heading block that opened the topic
    pub block_id: String,

    /// Latest edit time of any block inside the topic
    pub last_edited_at: DateTime<Utc>,

    /// Rendered text fragments in source order
    #[serde(default)]
    pub content: Vec<String>,

    /// Hashtags without the leading `#`
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl Topic {
    /// Whether the topic carries the given hashtag.
    pub fn has_hashtag(&self, tag: &str) -> bool {
        self.hashtags.iter().any(|h| h == tag)
    }

    /// Content lines followed by hashtags, as compared by the diff.
    pub fn diff_lines(&self) -> Vec<String> {
        self.content
            .iter()
            .chain(self.hashtags.iter())
            .cloned()
            .collect()
    }
}

/// Search-engine indexing instruction for a diary page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexDirection {
    Index,
    NoIndex,
    #[default]
    Auto,
}

impl IndexDirection {
    /// Parse the select value used in the source database.
    ///
    /// Returns `None` for an empty selection; unknown names fall back to `Auto`.
    pub fn from_select(name: &str) -> Option<Self> {
        match name.trim() {
            "" => None,
            "INDEX" => Some(Self::Index),
            "NO_INDEX" | "NOINDEX" => Some(Self::NoIndex),
            "AUTO" => Some(Self::Auto),
            other => {
                log::debug!("Unknown index direction '{}', treating as AUTO", other);
                Some(Self::Auto)
            }
        }
    }
}

/// One diary page, keyed by its date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiaryEntry {
    /// ISO calendar date (YYYY-MM-DD)
    pub date: String,

    #[serde(default)]
    pub index_direction: IndexDirection,

    #[serde(default)]
    pub topics: Vec<Topic>,
}

impl DiaryEntry {
    /// Whether the rendered page should be indexable.
    pub fn should_index(&self) -> bool {
        match self.index_direction {
            IndexDirection::Index => true,
            IndexDirection::NoIndex => false,
            IndexDirection::Auto => self.topics.len() >= AUTO_INDEX_MIN_TOPICS,
        }
    }
}

/// A row of the source database that passed the eligibility filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleRow {
    pub page_id: String,
    pub date: String,
    pub index_direction: IndexDirection,
}

/// Re-encoded copies of one source image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivativeSet {
    /// Stable block id of the image
    pub image_id: String,

    /// Size label to path relative to the output directory
    pub sizes: BTreeMap<String, PathBuf>,
}

/// Open Graph metadata of a linked page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OgpRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(title: &str) -> Topic {
        Topic {
            title: title.to_string(),
            block_id: format!("block-{title}"),
            last_edited_at: DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            content: vec!["line".into()],
            hashtags: vec!["tag".into()],
        }
    }

    #[test]
    fn diff_lines_append_hashtags() {
        assert_eq!(topic("a").diff_lines(), vec!["line", "tag"]);
    }

    #[test]
    fn index_direction_from_select() {
        assert_eq!(IndexDirection::from_select("INDEX"), Some(IndexDirection::Index));
        assert_eq!(
            IndexDirection::from_select("NO_INDEX"),
            Some(IndexDirection::NoIndex)
        );
        assert_eq!(IndexDirection::from_select("whatever"), Some(IndexDirection::Auto));
        assert_eq!(IndexDirection::from_select(" "), None);
    }

    #[test]
    fn auto_indexing_needs_enough_topics() {
        let mut entry = DiaryEntry {
            date: "2025-01-01".into(),
            index_direction: IndexDirection::Auto,
            topics: vec![topic("a"), topic("b"), topic("c")],
        };
        assert!(!entry.should_index());

        entry.topics.push(topic("d"));
        assert!(entry.should_index());

        entry.index_direction = IndexDirection::NoIndex;
        assert!(!entry.should_index());
    }

    #[test]
    fn index_direction_serializes_like_source() {
        let json = serde_json::to_string(&IndexDirection::NoIndex).unwrap();
        assert_eq!(json, "\"NO_INDEX\"");
    }

    #[test]
    fn entry_json_round_trip() {
        let entry = DiaryEntry {
            date: "2025-01-02".into(),
            index_direction: IndexDirection::Index,
            topics: vec![topic("朝ごはん")],
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: DiaryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
