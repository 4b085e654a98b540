//! Search data generation for the static site.
//!
//! Produces one search item per topic and an inverted index mapping keywords
//! to item positions, so that the site can search without a backend.
//!
//! > Example index: `{"桜": [0, 4], "walk": [2]}`

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::models::{DiaryEntry, PathsConfig};
use crate::storage::write_json_file;

/// One searchable topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchItem {
    pub date: String,
    pub title: String,
    /// Content fragments joined by spaces, followed by `#tag` words
    pub content: String,
    /// Page of the entry, relative to the site root
    pub url: String,
}

/// Build one search item per topic, in entry order.
pub fn build_search_items(entries: &[DiaryEntry]) -> Vec<SearchItem> {
    entries
        .iter()
        .flat_map(|entry| {
            let url = format!("dates/{}.html", entry.date);
            entry.topics.iter().map(move |topic| {
                let hashtags: Vec<String> =
                    topic.hashtags.iter().map(|tag| format!("#{tag}")).collect();
                SearchItem {
                    date: entry.date.clone(),
                    title: topic.title.clone(),
                    content: format!("{} {}", topic.content.join(" "), hashtags.join(" ")),
                    url: url.clone(),
                }
            })
        })
        .collect()
}

/// Configuration for index generation.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Minimum token length in bytes (default: 2)
    pub min_token_length: usize,
    /// Maximum tokens per item (default: 200)
    pub max_tokens_per_item: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_token_length: 2,
            max_tokens_per_item: 200,
        }
    }
}

/// Inverted index over search items.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SearchIndex {
    /// Version for cache busting
    pub version: u32,
    /// Total number of indexed items
    pub item_count: usize,
    /// Total number of unique tokens
    pub token_count: usize,
    /// keyword -> positions in the item list
    pub index: BTreeMap<String, Vec<usize>>,
}

/// Builder for constructing a search index.
pub struct IndexBuilder {
    config: IndexConfig,
    index: BTreeMap<String, BTreeSet<usize>>,
    item_count: usize,
}

impl IndexBuilder {
    /// Create a new index builder with default configuration.
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    /// Create a new index builder with custom configuration.
    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            config,
            index: BTreeMap::new(),
            item_count: 0,
        }
    }

    /// Add the next item to the index.
    pub fn add_item(&mut self, item: &SearchItem) {
        let position = self.item_count;
        self.item_count += 1;

        let mut tokens = self.tokenize(&item.title);
        tokens.extend(self.tokenize(&item.content));
        tokens.truncate(self.config.max_tokens_per_item);

        for token in tokens {
            self.index.entry(token).or_default().insert(position);
        }
    }

    /// Build the final index.
    pub fn build(self) -> SearchIndex {
        let token_count = self.index.len();
        let index = self
            .index
            .into_iter()
            .map(|(token, positions)| (token, positions.into_iter().collect()))
            .collect();

        SearchIndex {
            version: 1,
            item_count: self.item_count,
            token_count,
            index,
        }
    }

    /// Tokenize a string into normalized keywords.
    ///
    /// Markup tags are dropped first. The length check counts bytes, so single
    /// CJK characters are kept.
    fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = strip_tags(text).to_lowercase();

        normalized
            .unicode_words()
            .filter(|word| word.len() >= self.config.min_token_length)
            .filter(|word| !is_stopword(word))
            .map(String::from)
            .collect()
    }
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace `<...>` tags (such as `<br>` and image markup) with spaces.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Check if a word is a common stopword (Japanese/English).
fn is_stopword(word: &str) -> bool {
    const STOPWORDS: &[&str] = &[
        // Japanese particles
        "の", "に", "は", "を", "た", "が", "で", "て", "と", "し", "れ", "さ", "も", "な",
        // English common words
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "have", "has", "had", "do",
        "does", "did", "will", "would", "could", "should", "can", "of", "to", "in", "for", "on",
        "with", "at", "by", "from", "as", "or", "and", "but", "if", "then", "so", "than",
        // Common URL/HTML artifacts
        "http", "https", "www", "com", "html",
    ];
    STOPWORDS.contains(&word)
}

/// Build a search index from a list of items.
pub fn build_search_index(items: &[SearchItem]) -> SearchIndex {
    let mut builder = IndexBuilder::new();
    for item in items {
        builder.add_item(item);
    }
    builder.build()
}

/// Write `search_data.json` and `search_index.json` for `entries`.
///
/// Returns the written index.
pub fn write_search_files(entries: &[DiaryEntry], paths: &PathsConfig) -> Result<SearchIndex> {
    let items = build_search_items(entries);
    let index = build_search_index(&items);

    write_json_file(&paths.search_data_path(), &items)?;
    write_json_file(&paths.search_index_path(), &index)?;
    log::info!(
        "Search data: {} items, {} tokens",
        index.item_count,
        index.token_count
    );

    Ok(index)
}
