// src/pipeline/enrich.rs

//! Presentation pass: link enrichment over a loaded snapshot.
//!
//! The stored snapshot keeps plain text. Enrichment runs on a copy when the
//! entries are prepared for rendering.

use crate::error::Result;
use crate::models::DiaryEntry;
use crate::services::linkcard::{EnrichStats, LinkEnricher};
use crate::utils::http::Fetch;

/// Replace URLs in every content fragment, then persist both link caches.
///
/// Titles and hashtags are left as they are.
pub fn enrich_entries<F: Fetch>(
    entries: &[DiaryEntry],
    enricher: &mut LinkEnricher<F>,
) -> Result<(Vec<DiaryEntry>, EnrichStats)> {
    let enriched = entries
        .iter()
        .map(|entry| {
            let mut entry = entry.clone();
            for topic in &mut entry.topics {
                for fragment in &mut topic.content {
                    *fragment = enricher.enrich(fragment);
                }
            }
            entry
        })
        .collect();

    enricher.persist()?;
    let stats = enricher.stats();
    log::info!(
        "Enriched {} links ({} cards, {} embeds, {} videos, {} plain)",
        stats.links,
        stats.cards,
        stats.embeds,
        stats.videos,
        stats.fallbacks
    );

    Ok((enriched, stats))
}
