// src/services/linkcard/ogp.rs

//! Open Graph scraping and link card markup.

use maud::html;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::OgpRecord;

/// Compiled selectors for the Open Graph tags we read.
#[derive(Debug, Clone)]
pub struct OgpParser {
    og_title: Selector,
    og_description: Selector,
    og_image: Selector,
    title: Selector,
}

impl OgpParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            og_title: parse_selector(r#"meta[property="og:title"]"#)?,
            og_description: parse_selector(r#"meta[property="og:description"]"#)?,
            og_image: parse_selector(r#"meta[property="og:image"]"#)?,
            title: parse_selector("title")?,
        })
    }

    /// Extract title, description and image from a page.
    ///
    /// The title falls back to `<title>` when `og:title` is absent.
    pub fn parse(&self, body: &str) -> OgpRecord {
        let document = Html::parse_document(body);
        let meta = |selector: &Selector| {
            document
                .select(selector)
                .find_map(|el| el.value().attr("content"))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let mut title = meta(&self.og_title);
        if title.is_empty() {
            title = document
                .select(&self.title)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
        }

        OgpRecord {
            title,
            description: meta(&self.og_description),
            image: meta(&self.og_image),
        }
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Cut `text` to `max_chars` characters, marking the cut with `...`.
pub fn truncate_description(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

/// Link card for a page with Open Graph metadata.
pub fn link_card(url: &str, record: &OgpRecord, max_description: usize) -> String {
    let description = truncate_description(&record.description, max_description);
    html! {
        div.link-card {
            a href=(url) target="_blank" {
                @if !record.image.is_empty() {
                    img src=(record.image) alt="";
                }
                div.text {
                    div.title { (record.title) }
                    div.description { (description) }
                    div.url { (url) }
                }
            }
        }
    }
    .into_string()
}
