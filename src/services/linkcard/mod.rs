// src/services/linkcard/mod.rs

//! Link enrichment.
//!
//! Rewrites bare URLs in rendered text into richer markup:
//! - video links become iframes (no network)
//! - social links become oEmbed markup (cached in the embed cache)
//! - everything else becomes an Open Graph link card (cached in the OGP cache)
//!
//! Any failure falls back to a plain anchor. Failed lookups are not cached, so
//! they are retried on the next run.

mod cache;
mod embed;
mod ogp;

use regex::Regex;
use serde_json::Value;

use crate::error::Result;
use crate::models::{LinkCardConfig, OgpRecord, PathsConfig};
use crate::utils::http::Fetch;
use crate::utils::{get_domain, host_matches};

pub use cache::LinkCache;
pub use embed::{VideoIds, plain_anchor};
pub use ogp::{OgpParser, link_card, truncate_description};

const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "youtu.be"];
const NICONICO_HOSTS: &[&str] = &["nicovideo.jp"];
const SOCIAL_HOSTS: &[&str] = &["twitter.com", "x.com"];

/// How a URL is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    YouTube,
    Niconico,
    Social,
    Page,
}

/// Classify a URL by host. Unparseable URLs are treated as pages.
pub fn classify(url: &str) -> LinkKind {
    let Some(host) = get_domain(url) else {
        return LinkKind::Page;
    };
    let on = |hosts: &[&str]| hosts.iter().any(|d| host_matches(&host, d));

    if on(YOUTUBE_HOSTS) {
        LinkKind::YouTube
    } else if on(NICONICO_HOSTS) {
        LinkKind::Niconico
    } else if on(SOCIAL_HOSTS) {
        LinkKind::Social
    } else {
        LinkKind::Page
    }
}

/// Counters for one enrichment run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichStats {
    pub links: usize,
    pub videos: usize,
    pub embeds: usize,
    pub cards: usize,
    pub fallbacks: usize,
    pub fetches: usize,
}

/// Replaces URLs in text fragments with embeds and link cards.
pub struct LinkEnricher<F: Fetch> {
    fetcher: F,
    config: LinkCardConfig,
    url_pattern: Regex,
    videos: VideoIds,
    parser: OgpParser,
    ogp: LinkCache<OgpRecord>,
    embeds: LinkCache<Value>,
    stats: EnrichStats,
}

impl<F: Fetch> LinkEnricher<F> {
    /// Create an enricher with caches loaded from the configured paths.
    pub fn new(fetcher: F, config: &LinkCardConfig, paths: &PathsConfig) -> Result<Self> {
        Self::with_caches(
            fetcher,
            config,
            LinkCache::load(paths.ogp_cache_path()),
            LinkCache::load(paths.embed_cache_path()),
        )
    }

    /// Create an enricher over already loaded caches.
    pub fn with_caches(
        fetcher: F,
        config: &LinkCardConfig,
        ogp: LinkCache<OgpRecord>,
        embeds: LinkCache<Value>,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            config: config.clone(),
            url_pattern: Regex::new(r#"https?://[^\s<>"'\)\]]+"#)?,
            videos: VideoIds::new()?,
            parser: OgpParser::new()?,
            ogp,
            embeds,
            stats: EnrichStats::default(),
        })
    }

    /// Replace every URL in `fragment`.
    ///
    /// URLs that sit inside an attribute value (`="https://..."`) are left
    /// alone so that existing markup survives.
    pub fn enrich(&mut self, fragment: &str) -> String {
        let spans: Vec<(usize, usize)> = self
            .url_pattern
            .find_iter(fragment)
            .map(|m| (m.start(), m.end()))
            .collect();
        if spans.is_empty() {
            return fragment.to_string();
        }

        let mut out = String::with_capacity(fragment.len());
        let mut last = 0;
        for (start, end) in spans {
            out.push_str(&fragment[last..start]);
            let url = &fragment[start..end];
            if in_attribute(&fragment[..start]) {
                out.push_str(url);
            } else {
                out.push_str(&self.render(url));
            }
            last = end;
        }
        out.push_str(&fragment[last..]);
        out
    }

    /// Write both caches back to disk.
    pub fn persist(&mut self) -> Result<()> {
        self.ogp.persist()?;
        self.embeds.persist()?;
        Ok(())
    }

    pub fn stats(&self) -> EnrichStats {
        self.stats
    }

    pub fn ogp_cache(&self) -> &LinkCache<OgpRecord> {
        &self.ogp
    }

    pub fn embed_cache(&self) -> &LinkCache<Value> {
        &self.embeds
    }

    fn render(&mut self, url: &str) -> String {
        self.stats.links += 1;
        let rendered = match classify(url) {
            LinkKind::YouTube => {
                let iframe = self.videos.youtube(url).map(embed::youtube_iframe);
                self.count_video(iframe)
            }
            LinkKind::Niconico => {
                let iframe = self.videos.niconico(url).map(embed::niconico_iframe);
                self.count_video(iframe)
            }
            LinkKind::Social => self.social(url),
            LinkKind::Page => self.card(url),
        };

        rendered.unwrap_or_else(|| {
            self.stats.fallbacks += 1;
            plain_anchor(url)
        })
    }

    fn count_video(&mut self, iframe: Option<String>) -> Option<String> {
        if iframe.is_some() {
            self.stats.videos += 1;
        }
        iframe
    }

    fn social(&mut self, url: &str) -> Option<String> {
        if let Some(cached) = self.embeds.get(url) {
            let html = embed::oembed_html(cached);
            if html.is_some() {
                self.stats.embeds += 1;
            }
            return html;
        }

        let endpoint = match url::Url::parse_with_params(
            &self.config.twitter_oembed_endpoint,
            &[("url", url)],
        ) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                log::warn!("Bad oEmbed endpoint {}: {}", self.config.twitter_oembed_endpoint, e);
                return None;
            }
        };

        self.stats.fetches += 1;
        match self.fetcher.get_json(endpoint.as_str()) {
            Ok(response) => {
                let html = embed::oembed_html(&response);
                self.embeds.insert(url, response);
                if html.is_some() {
                    self.stats.embeds += 1;
                }
                html
            }
            Err(e) => {
                log::warn!("oEmbed lookup failed for {}: {}", url, e);
                None
            }
        }
    }

    fn card(&mut self, url: &str) -> Option<String> {
        let max = self.config.max_description_length;
        if let Some(record) = self.ogp.get(url) {
            self.stats.cards += 1;
            return Some(link_card(url, record, max));
        }

        self.stats.fetches += 1;
        match self.fetcher.get_text(url) {
            Ok(body) => {
                let record = self.parser.parse(&body);
                let card = link_card(url, &record, max);
                self.ogp.insert(url, record);
                self.stats.cards += 1;
                Some(card)
            }
            Err(e) => {
                log::warn!("OGP fetch failed for {}: {}", url, e);
                None
            }
        }
    }
}

/// Whether the text before a match ends inside an attribute value opener.
fn in_attribute(before: &str) -> bool {
    let trimmed = before.trim_end_matches(['"', '\'']);
    trimmed.len() < before.len() && trimmed.ends_with('=')
}
