// src/services/linkcard/embed.rs

//! Video and social embeds.

use maud::html;
use regex::Regex;
use serde_json::Value;

use crate::error::Result;

const YOUTUBE_EMBED: &str = "https://www.youtube.com/embed/";
const NICONICO_EMBED: &str = "https://embed.nicovideo.jp/watch/";
const YOUTUBE_ALLOW: &str =
    "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture";

/// Extracts video ids from watch URLs.
#[derive(Debug, Clone)]
pub struct VideoIds {
    youtube: Regex,
    niconico: Regex,
}

impl VideoIds {
    pub fn new() -> Result<Self> {
        Ok(Self {
            youtube: Regex::new(r"(?:v=|youtu\.be/)([\w\-]+)")?,
            niconico: Regex::new(r"/watch/([a-z0-9]+)")?,
        })
    }

    pub fn youtube<'u>(&self, url: &'u str) -> Option<&'u str> {
        capture(&self.youtube, url)
    }

    pub fn niconico<'u>(&self, url: &'u str) -> Option<&'u str> {
        capture(&self.niconico, url)
    }
}

fn capture<'u>(pattern: &Regex, url: &'u str) -> Option<&'u str> {
    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Plain link opening in a new tab.
pub fn plain_anchor(url: &str) -> String {
    html! {
        a href=(url) target="_blank" { (url) }
    }
    .into_string()
}

pub fn youtube_iframe(video_id: &str) -> String {
    html! {
        div.video-embed {
            iframe width="100%" height="315"
                src={ (YOUTUBE_EMBED) (video_id) }
                frameborder="0"
                allow=(YOUTUBE_ALLOW)
                allowfullscreen {}
        }
    }
    .into_string()
}

pub fn niconico_iframe(video_id: &str) -> String {
    html! {
        div.video-embed {
            iframe width="100%" height="315"
                src={ (NICONICO_EMBED) (video_id) }
                frameborder="0"
                allowfullscreen {}
        }
    }
    .into_string()
}

/// Markup from an oEmbed response, if it carries any.
pub fn oembed_html(response: &Value) -> Option<String> {
    response
        .get("html")
        .and_then(Value::as_str)
        .filter(|html| !html.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn youtube_ids() {
        let ids = VideoIds::new().unwrap();
        assert_eq!(
            ids.youtube("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(ids.youtube("https://youtu.be/abc-DEF_1"), Some("abc-DEF_1"));
        assert_eq!(ids.youtube("https://www.youtube.com/@channel"), None);
    }

    #[test]
    fn niconico_ids() {
        let ids = VideoIds::new().unwrap();
        assert_eq!(
            ids.niconico("https://www.nicovideo.jp/watch/sm9?ref=top"),
            Some("sm9")
        );
        assert_eq!(ids.niconico("https://www.nicovideo.jp/ranking"), None);
    }

    #[test]
    fn iframes_point_at_embed_hosts() {
        let html = youtube_iframe("abc");
        assert!(html.starts_with(r#"<div class="video-embed"><iframe"#));
        assert!(html.contains(r#"src="https://www.youtube.com/embed/abc""#));
        assert!(html.contains("allowfullscreen"));

        assert!(niconico_iframe("sm9").contains(r#"src="https://embed.nicovideo.jp/watch/sm9""#));
    }

    #[test]
    fn plain_anchor_escapes() {
        assert_eq!(
            plain_anchor("https://example.com/?a=1&b=2"),
            r#"<a href="https://example.com/?a=1&amp;b=2" target="_blank">https://example.com/?a=1&amp;b=2</a>"#
        );
    }

    #[test]
    fn oembed_html_requires_markup() {
        let ok = json!({"html": "<blockquote class=\"twitter-tweet\"></blockquote>"});
        assert_eq!(
            oembed_html(&ok).as_deref(),
            Some("<blockquote class=\"twitter-tweet\"></blockquote>")
        );
        assert_eq!(oembed_html(&json!({"type": "rich"})), None);
    }
}
