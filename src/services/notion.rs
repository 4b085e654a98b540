// src/services/notion.rs

//! Notion API client.
//!
//! Fetches database rows, block children and page titles. List endpoints are
//! paginated; every page is collected before control returns to the caller.

use reqwest::Method;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{Block, EligibleRow, IndexDirection, NotionConfig, Page, Paginated};
use crate::utils::http::create_client_with_timeout;

/// Read access to the diary's source content.
pub trait ContentSource {
    /// All rows of a database, in API order.
    fn query_rows(&self, database_id: &str) -> Result<Vec<Page>>;

    /// All child blocks of a page or block, in document order.
    fn block_children(&self, block_id: &str) -> Result<Vec<Block>>;

    /// Title of a single page, if it has one.
    fn page_title(&self, page_id: &str) -> Result<Option<String>>;
}

/// [`ContentSource`] backed by the Notion REST API.
pub struct NotionClient {
    client: Client,
    config: NotionConfig,
}

impl NotionClient {
    /// Create a client for the configured API.
    pub fn new(config: &NotionConfig, user_agent: &str) -> Result<Self> {
        let client = create_client_with_timeout(user_agent, config.timeout_secs)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Send a request and return the body, failing on any non-success status.
    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<String> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", &self.config.api_version);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(AppError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    fn send_page<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Paginated<T>> {
        let text = self.send(method, url, body)?;
        serde_json::from_str(&text)
            .map_err(|e| AppError::pagination(format!("{url}: {e}")))
    }
}

impl ContentSource for NotionClient {
    fn query_rows(&self, database_id: &str) -> Result<Vec<Page>> {
        let url = self.url(&format!("databases/{database_id}/query"));
        collect_pages(|cursor| {
            let mut body = json!({ "page_size": self.config.page_size });
            if let Some(cursor) = cursor {
                body["start_cursor"] = Value::String(cursor.to_string());
            }
            log::debug!("Querying {} (cursor: {:?})", url, cursor);
            self.send_page(Method::POST, &url, Some(&body))
        })
    }

    fn block_children(&self, block_id: &str) -> Result<Vec<Block>> {
        let base = self.url(&format!("blocks/{block_id}/children"));
        collect_pages(|cursor| {
            let mut url = url::Url::parse(&base)?;
            url.query_pairs_mut()
                .append_pair("page_size", &self.config.page_size.to_string());
            if let Some(cursor) = cursor {
                url.query_pairs_mut().append_pair("start_cursor", cursor);
            }
            log::debug!("Fetching children {}", url);
            self.send_page(Method::GET, url.as_str(), None)
        })
    }

    fn page_title(&self, page_id: &str) -> Result<Option<String>> {
        let url = self.url(&format!("pages/{page_id}"));
        let text = self.send(Method::GET, &url, None)?;
        let page: Page = serde_json::from_str(&text)?;
        Ok(page.title())
    }
}

/// Follow continuation cursors until the API reports no more results.
///
/// `fetch` receives the cursor of the page to load (`None` for the first).
pub fn collect_pages<T, F>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<&str>) -> Result<Paginated<T>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = fetch(cursor.as_deref())?;
        items.extend(page.results);

        if !page.has_more {
            return Ok(items);
        }

        match page.next_cursor {
            Some(next) if !next.is_empty() => {
                if cursor.as_deref() == Some(next.as_str()) {
                    return Err(AppError::pagination(format!(
                        "cursor {next} returned twice"
                    )));
                }
                cursor = Some(next);
            }
            _ => {
                return Err(AppError::pagination(
                    "has_more is true but next_cursor is missing",
                ));
            }
        }
    }
}

/// Apply the publication filter to one database row.
///
/// A row qualifies only with a non-empty date, a checked public flag and a
/// selected index direction.
pub fn eligible_row(page: &Page, config: &NotionConfig) -> Option<EligibleRow> {
    let date = page
        .date_start(&config.date_property)
        .filter(|d| !d.trim().is_empty())?;
    if !page.checkbox(&config.public_property) {
        return None;
    }
    let index_direction = page
        .select_name(&config.index_property)
        .and_then(IndexDirection::from_select)?;

    Some(EligibleRow {
        page_id: page.id.clone(),
        date: date.to_string(),
        index_direction,
    })
}

/// Keep the rows that should be published, dropping the rest silently.
pub fn filter_rows(pages: &[Page], config: &NotionConfig) -> Vec<EligibleRow> {
    pages
        .iter()
        .filter_map(|page| {
            let row = eligible_row(page, config);
            if row.is_none() {
                log::debug!("Skipping row {} (not eligible for publication)", page.id);
            }
            row
        })
        .collect()
}
