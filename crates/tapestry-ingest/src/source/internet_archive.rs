//! Internet Archive
//!
//! Uses the scrape API over the `publicdomain` collection. Pagination is
//! an opaque cursor echoed back as a query parameter. The scrape index
//! carries item metadata but not per-item file listings (those live on
//! the metadata endpoint, one request per item), so items from this
//! source are persisted without files.

use chrono::NaiveDate;
use serde_json::Value;

use tapestry_common::NormalizedItem;

use super::{optional_str, required_str, IngestSource, MapError, MappedRecord, RunParams};
use crate::page::{PageCursor, PageRequest, SourcePage};

const SCRAPE_URL: &str = "https://archive.org/services/search/v1/scrape";
const FIELDS: &str = "identifier,title,description,creator,year,mediatype";
const DEFAULT_QUERY: &str = "collection:publicdomain";

pub struct InternetArchiveSource;

impl InternetArchiveSource {
    pub fn new() -> Self {
        Self
    }

    fn query(params: &RunParams) -> String {
        match &params.query {
            Some(q) => format!("{} AND title:({})", DEFAULT_QUERY, q),
            None => DEFAULT_QUERY.to_string(),
        }
    }
}

impl Default for InternetArchiveSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestSource for InternetArchiveSource {
    fn name(&self) -> &str {
        "Internet Archive"
    }

    fn media_type(&self) -> &str {
        "Text"
    }

    fn license(&self) -> &str {
        "Public Domain"
    }

    fn request_for(&self, cursor: &PageCursor, params: &RunParams) -> PageRequest {
        let query = Self::query(params);
        match cursor {
            PageCursor::Token(token) => PageRequest::get(format!(
                "{}?q={}&fields={}&cursor={}",
                SCRAPE_URL, query, FIELDS, token
            )),
            _ => PageRequest::get(format!("{}?q={}&fields={}", SCRAPE_URL, query, FIELDS)),
        }
    }

    fn parse_page(&self, body: &str) -> Result<SourcePage, MapError> {
        let envelope: Value = serde_json::from_str(body)?;
        let records = envelope
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| MapError::Envelope("scrape response has no `items` array".into()))?;
        let next = envelope
            .get("cursor")
            .and_then(Value::as_str)
            .map(|c| PageCursor::Token(c.to_string()));
        Ok(SourcePage::new(records, next))
    }

    fn map_record(&self, raw: &Value) -> Result<MappedRecord, MapError> {
        let identifier = required_str(raw, "identifier")?;

        // The scrape index serves `year` as either a number or a string.
        let publication_date = raw
            .get("year")
            .and_then(|y| {
                y.as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .or_else(|| y.as_str().and_then(|s| s.trim().parse().ok()))
            })
            .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1));

        let item = NormalizedItem {
            source_item_id: identifier.to_string(),
            title: optional_str(raw, "title").unwrap_or_else(|| "Untitled".to_string()),
            description: optional_str(raw, "description"),
            creator_override: optional_str(raw, "creator"),
            publication_date,
            source_url: format!("https://archive.org/details/{}", identifier),
            extra_info: raw.clone(),
        };

        Ok(MappedRecord {
            item,
            files: Vec::new(),
        })
    }
}
