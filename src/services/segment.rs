// src/services/segment.rs

//! Topic segmentation.
//!
//! Walks a page's blocks in document order and groups them into topics. A
//! topic opens at each heading of the configured level and collects the text,
//! images and hashtags that follow it until the next heading.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::error::Result;
use crate::models::{Block, ImageSource, Mention, RichText, SegmentConfig, Topic};
use crate::services::notion::ContentSource;

/// Turns an image block into markup for the topic content.
pub trait ImageTagger {
    /// Produce the tag for one image, keyed by its block id.
    fn image_tag(&mut self, image_id: &str, source: &ImageSource) -> String;
}

/// Content collected for an open topic.
///
/// Images stay unresolved until the topic is known to be public.
#[derive(Debug)]
enum Fragment {
    Text(String),
    Image { block_id: String, source: ImageSource },
}

/// The topic currently being accumulated.
#[derive(Debug)]
struct OpenTopic {
    title: String,
    block_id: String,
    last_edited_at: DateTime<Utc>,
    content: Vec<Fragment>,
    hashtags: Vec<String>,
}

impl OpenTopic {
    fn opened_by(block: &Block, title: String) -> Self {
        Self {
            title,
            block_id: block.id.clone(),
            last_edited_at: block.last_edited_time,
            content: Vec::new(),
            hashtags: Vec::new(),
        }
    }

    fn touch(&mut self, edited_at: DateTime<Utc>) {
        if edited_at > self.last_edited_at {
            self.last_edited_at = edited_at;
        }
    }

    /// Close the topic. Untitled and private topics are dropped before any
    /// image reaches the tagger.
    fn close(self, private_tag: &str, tagger: &mut dyn ImageTagger) -> Option<Topic> {
        if self.title.is_empty() {
            return None;
        }
        if self.hashtags.iter().any(|h| h == private_tag) {
            log::debug!("Dropping private topic '{}'", self.title);
            return None;
        }
        Some(Topic {
            title: self.title,
            block_id: self.block_id,
            last_edited_at: self.last_edited_at,
            content: self
                .content
                .into_iter()
                .map(|fragment| match fragment {
                    Fragment::Text(text) => text,
                    Fragment::Image { block_id, source } => tagger.image_tag(&block_id, &source),
                })
                .collect(),
            hashtags: self.hashtags,
        })
    }
}

/// Groups page blocks into topics.
pub struct Segmenter<'a, S: ContentSource + ?Sized> {
    source: &'a S,
    config: &'a SegmentConfig,
    hashtag: Regex,
}

impl<'a, S: ContentSource + ?Sized> Segmenter<'a, S> {
    /// Create a segmenter that resolves page mentions through `source`.
    pub fn new(source: &'a S, config: &'a SegmentConfig) -> Result<Self> {
        Ok(Self {
            source,
            config,
            hashtag: Regex::new(r"#(\S+)")?,
        })
    }

    /// Segment one page's blocks into topics.
    ///
    /// Blocks before the first heading are discarded.
    pub fn segment(&self, blocks: &[Block], tagger: &mut dyn ImageTagger) -> Vec<Topic> {
        let mut topics = Vec::new();
        let mut open: Option<OpenTopic> = None;

        for block in blocks {
            if block.kind == self.config.topic_heading {
                let title = self.block_text(block);
                if title.is_empty() {
                    continue;
                }
                let closed = open.take().and_then(|t| t.close(&self.config.private_tag, tagger));
                if let Some(topic) = closed {
                    topics.push(topic);
                }
                open = Some(OpenTopic::opened_by(block, title));
                continue;
            }

            let Some(current) = open.as_mut() else {
                continue;
            };
            current.touch(block.last_edited_time);

            if let Some(source) = block.image_source() {
                current.content.push(Fragment::Image {
                    block_id: block.id.clone(),
                    source,
                });
                continue;
            }

            if !block.is_text_bearing() {
                continue;
            }

            let text = self.block_text(block);
            if text.starts_with('#') {
                current.hashtags.extend(
                    self.hashtag
                        .captures_iter(&text)
                        .map(|caps| caps[1].to_string()),
                );
            } else if !text.is_empty() {
                current.content.push(Fragment::Text(text.replace('\n', "<br>")));
            }
        }

        if let Some(topic) = open.and_then(|t| t.close(&self.config.private_tag, tagger)) {
            topics.push(topic);
        }
        topics
    }

    /// Trimmed plain text of a block, with page mentions resolved.
    pub fn block_text(&self, block: &Block) -> String {
        let mut text = String::new();
        for run in block.rich_text() {
            match run {
                RichText::Text { text: t } => text.push_str(&t.content),
                RichText::Mention {
                    mention: Mention::Page { page },
                } => match self.source.page_title(&page.id) {
                    Ok(Some(title)) => {
                        text.push('[');
                        text.push_str(&title);
                        text.push(']');
                    }
                    Ok(None) => {
                        log::warn!("Mentioned page {} has no title, dropping", page.id);
                    }
                    Err(e) => {
                        log::warn!("Failed to resolve mention of page {}: {}", page.id, e);
                    }
                },
                RichText::Mention { .. } | RichText::Unsupported => {}
            }
        }
        text.trim().to_string()
    }
}

/// Drop topics edited within `grace` of `now`.
///
/// A topic edited exactly `grace` ago is still held back.
pub fn retain_settled(topics: Vec<Topic>, now: DateTime<Utc>, grace: Duration) -> Vec<Topic> {
    topics
        .into_iter()
        .filter(|topic| {
            let settled = now - topic.last_edited_at > grace;
            if !settled {
                log::info!(
                    "Holding back recently edited topic '{}' ({})",
                    topic.title,
                    topic.last_edited_at
                );
            }
            settled
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use serde_json::{Value, json};

    use super::*;
    use crate::error::AppError;
    use crate::models::Page;

    #[derive(Default)]
    struct StubSource {
        titles: HashMap<String, String>,
        lookups: RefCell<Vec<String>>,
    }

    impl ContentSource for StubSource {
        fn query_rows(&self, _database_id: &str) -> Result<Vec<Page>> {
            Ok(Vec::new())
        }

        fn block_children(&self, _block_id: &str) -> Result<Vec<Block>> {
            Ok(Vec::new())
        }

        fn page_title(&self, page_id: &str) -> Result<Option<String>> {
            self.lookups.borrow_mut().push(page_id.to_string());
            match page_id {
                "broken" => Err(AppError::Api {
                    status: 404,
                    body: "not found".into(),
                }),
                id => Ok(self.titles.get(id).cloned()),
            }
        }
    }

    #[derive(Default)]
    struct StubTagger {
        tagged: Vec<String>,
    }

    impl ImageTagger for StubTagger {
        fn image_tag(&mut self, image_id: &str, source: &ImageSource) -> String {
            self.tagged.push(image_id.to_string());
            format!("<img id={} src={}>", image_id, source.url())
        }
    }

    const EDITED: &str = "2025-03-01T10:00:00.000Z";

    fn text_block(id: &str, kind: &str, text: &str) -> Block {
        text_block_at(id, kind, text, EDITED)
    }

    fn text_block_at(id: &str, kind: &str, text: &str, edited: &str) -> Block {
        rich_block(
            id,
            kind,
            json!([{"type": "text", "text": {"content": text}}]),
            edited,
        )
    }

    fn rich_block(id: &str, kind: &str, runs: Value, edited: &str) -> Block {
        let mut value = json!({
            "id": id,
            "type": kind,
            "last_edited_time": edited,
        });
        value[kind] = json!({ "rich_text": runs });
        serde_json::from_value(value).unwrap()
    }

    fn heading(id: &str, text: &str) -> Block {
        text_block(id, "heading_3", text)
    }

    fn para(id: &str, text: &str) -> Block {
        text_block(id, "paragraph", text)
    }

    fn image(id: &str, url: &str) -> Block {
        serde_json::from_value(json!({
            "id": id,
            "type": "image",
            "last_edited_time": EDITED,
            "image": {"type": "external", "external": {"url": url}}
        }))
        .unwrap()
    }

    fn segment(blocks: &[Block]) -> Vec<Topic> {
        let source = StubSource::default();
        let config = SegmentConfig::default();
        let segmenter = Segmenter::new(&source, &config).unwrap();
        segmenter.segment(blocks, &mut StubTagger::default())
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn private_topic_is_dropped() {
        let blocks = vec![
            heading("h1", "A"),
            para("p1", "hello"),
            para("p2", "#tag1"),
            heading("h2", "B"),
            para("p3", "#非公開"),
        ];

        let topics = segment(&blocks);
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].title, "A");
        assert_eq!(topics[0].block_id, "h1");
        assert_eq!(topics[0].content, vec!["hello"]);
        assert_eq!(topics[0].hashtags, vec!["tag1"]);
    }

    #[test]
    fn private_topic_images_never_reach_tagger() {
        let blocks = vec![
            heading("h1", "Secret"),
            image("img-secret", "https://img.example/secret.png"),
            para("p1", "#非公開"),
            heading("h2", "Public"),
            image("img-public", "https://img.example/public.png"),
            para("p2", "after"),
        ];

        let source = StubSource::default();
        let config = SegmentConfig::default();
        let segmenter = Segmenter::new(&source, &config).unwrap();
        let mut tagger = StubTagger::default();
        let topics = segmenter.segment(&blocks, &mut tagger);

        assert_eq!(topics.len(), 1);
        assert_eq!(tagger.tagged, vec!["img-public"]);
        // Images keep their position among text fragments
        assert_eq!(
            topics[0].content,
            vec!["<img id=img-public src=https://img.example/public.png>", "after"]
        );
    }

    #[test]
    fn content_before_first_heading_is_discarded() {
        let blocks = vec![
            para("p0", "preamble"),
            image("i0", "https://img.example/early.png"),
            heading("h1", "Morning"),
            para("p1", "coffee"),
        ];

        let source = StubSource::default();
        let config = SegmentConfig::default();
        let segmenter = Segmenter::new(&source, &config).unwrap();
        let mut tagger = StubTagger::default();
        let topics = segmenter.segment(&blocks, &mut tagger);

        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].content, vec!["coffee"]);
        assert!(tagger.tagged.is_empty());
    }

    #[test]
    fn empty_heading_is_ignored() {
        let blocks = vec![
            heading("h1", "Lunch"),
            para("p1", "ramen"),
            heading("h2", "   "),
            para("p2", "gyoza"),
        ];

        let topics = segment(&blocks);
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].content, vec!["ramen", "gyoza"]);
    }

    #[test]
    fn hashtags_and_line_breaks() {
        let blocks = vec![
            heading("h1", "Walk"),
            para("p1", "line one\nline two"),
            para("p2", "  #park #spring  "),
            para("p3", ""),
            para("p4", "not #a tag line"),
        ];

        let topics = segment(&blocks);
        assert_eq!(
            topics[0].content,
            vec!["line one<br>line two", "not #a tag line"]
        );
        assert_eq!(topics[0].hashtags, vec!["park", "spring"]);
    }

    #[test]
    fn images_are_delegated_to_tagger() {
        let blocks = vec![heading("h1", "Photos"), image("i1", "https://img.example/a.png")];
        let topics = segment(&blocks);
        assert_eq!(
            topics[0].content,
            vec!["<img id=i1 src=https://img.example/a.png>"]
        );
    }

    #[test]
    fn last_edited_is_maximum_within_topic() {
        let blocks = vec![
            text_block_at("h1", "heading_3", "A", "2025-03-01T09:00:00Z"),
            text_block_at("p1", "paragraph", "x", "2025-03-01T11:00:00Z"),
            text_block_at("p2", "paragraph", "y", "2025-03-01T10:00:00Z"),
            text_block_at("h2", "heading_3", "B", "2025-03-01T08:00:00Z"),
        ];

        let topics = segment(&blocks);
        assert_eq!(topics[0].last_edited_at, at("2025-03-01T11:00:00Z"));
        assert_eq!(topics[1].last_edited_at, at("2025-03-01T08:00:00Z"));
    }

    #[test]
    fn mentions_resolve_to_page_titles() {
        let mut source = StubSource::default();
        source.titles.insert("p9".into(), "Trip log".into());
        let config = SegmentConfig::default();
        let segmenter = Segmenter::new(&source, &config).unwrap();

        let block = rich_block(
            "b1",
            "paragraph",
            json!([
                {"type": "text", "text": {"content": "see "}},
                {"type": "mention", "mention": {"type": "page", "page": {"id": "p9"}}},
                {"type": "mention", "mention": {"type": "page", "page": {"id": "broken"}}},
                {"type": "mention", "mention": {"type": "page", "page": {"id": "untitled"}}},
                {"type": "mention", "mention": {"type": "user", "user": {"id": "u1"}}}
            ]),
            EDITED,
        );

        assert_eq!(segmenter.block_text(&block), "see [Trip log]");
        assert_eq!(
            *source.lookups.borrow(),
            vec!["p9", "broken", "untitled"]
        );
    }

    #[test]
    fn recency_boundary() {
        let now = at("2025-03-01T12:00:00Z");
        let grace = Duration::minutes(5);
        let mut topics = segment(&[heading("h1", "edge"), heading("h2", "outside")]);
        topics[0].last_edited_at = now - grace;
        topics[1].last_edited_at = now - grace - Duration::seconds(1);

        let settled = retain_settled(topics, now, grace);
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].title, "outside");
    }
}
