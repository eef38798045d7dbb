//! Creative Commons / Openverse
//!
//! CC0 image search through the Openverse API (the successor to the CC
//! Catalog the service originally targeted). The envelope carries a full
//! `next` URL, or null on the last page.

use chrono::NaiveDate;
use serde_json::Value;

use tapestry_common::{NormalizedFile, NormalizedItem};

use super::{optional_str, required_str, IngestSource, MapError, MappedRecord, RunParams};
use crate::page::{PageCursor, PageRequest, SourcePage};

const SEARCH_URL: &str = "https://api.openverse.org/v1/images/";

pub struct CreativeCommonsSource;

impl CreativeCommonsSource {
    pub fn new() -> Self {
        Self
    }

    fn upload_date(raw: &Value) -> Option<NaiveDate> {
        let stamp = optional_str(raw, "upload_date")?;
        let date_part = stamp.split('T').next()?;
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }
}

impl Default for CreativeCommonsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestSource for CreativeCommonsSource {
    fn name(&self) -> &str {
        "Creative Commons Search"
    }

    fn media_type(&self) -> &str {
        "Image"
    }

    fn license(&self) -> &str {
        "CC0"
    }

    fn request_for(&self, cursor: &PageCursor, params: &RunParams) -> PageRequest {
        match cursor {
            PageCursor::Url(url) => PageRequest::get(url.clone()),
            _ => {
                let query = params
                    .query
                    .as_deref()
                    .map(|q| q.replace(' ', "+"))
                    .unwrap_or_else(|| "public+domain".to_string());
                PageRequest::get(format!("{}?q={}&license=cc0", SEARCH_URL, query))
            },
        }
    }

    fn parse_page(&self, body: &str) -> Result<SourcePage, MapError> {
        let envelope: Value = serde_json::from_str(body)?;
        let records = envelope
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| MapError::Envelope("response has no `results` array".into()))?;
        let next = envelope
            .get("next")
            .and_then(Value::as_str)
            .map(|url| PageCursor::Url(url.to_string()));
        Ok(SourcePage::new(records, next))
    }

    fn map_record(&self, raw: &Value) -> Result<MappedRecord, MapError> {
        // Some catalog records only carry a landing URL; accept it as the
        // identifier of last resort, as the upstream catalog does.
        let id = required_str(raw, "id")
            .or_else(|_| required_str(raw, "url"))
            .map_err(|_| MapError::MissingField("id"))?;
        let source_url = optional_str(raw, "foreign_landing_url")
            .or_else(|| optional_str(raw, "url"))
            .unwrap_or_else(|| id.to_string());

        let item = NormalizedItem {
            source_item_id: id.to_string(),
            title: optional_str(raw, "title").unwrap_or_else(|| "Untitled".to_string()),
            description: optional_str(raw, "description"),
            creator_override: optional_str(raw, "creator"),
            publication_date: Self::upload_date(raw),
            source_url,
            extra_info: raw.clone(),
        };

        let mut files = Vec::new();
        if let Some(url) = optional_str(raw, "url") {
            files.push(NormalizedFile {
                file_url: url,
                format: optional_str(raw, "filetype").map(|f| f.to_uppercase()),
                size: raw.get("filesize").and_then(Value::as_i64),
                notes: Some("Primary image".to_string()),
            });
        }

        Ok(MappedRecord { item, files })
    }
}
