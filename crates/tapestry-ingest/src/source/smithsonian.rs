//! Smithsonian Open Access
//!
//! EDAN search API. Requires an API key; the registry skips this source
//! when `SMITHSONIAN_API_KEY` is unset. Pagination is an opaque cursor
//! in `response.cursor`.

use chrono::NaiveDate;
use serde_json::Value;

use tapestry_common::{NormalizedFile, NormalizedItem};

use super::{optional_str, required_str, IngestSource, MapError, MappedRecord, RunParams};
use crate::page::{PageCursor, PageRequest, SourcePage};

const SEARCH_URL: &str = "https://edan.si.edu/openaccess/api/v1.0/search";

pub struct SmithsonianSource {
    api_key: String,
}

impl SmithsonianSource {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    fn year_date(raw: &Value) -> Option<NaiveDate> {
        let date = optional_str(raw, "date")?;
        let year = date.split('-').next()?.trim().parse::<i32>().ok()?;
        NaiveDate::from_ymd_opt(year, 1, 1)
    }
}

impl IngestSource for SmithsonianSource {
    fn name(&self) -> &str {
        "Smithsonian Open Access"
    }

    fn media_type(&self) -> &str {
        "Image"
    }

    fn license(&self) -> &str {
        "CC0"
    }

    fn request_for(&self, cursor: &PageCursor, params: &RunParams) -> PageRequest {
        let query = params
            .query
            .as_deref()
            .map(|q| q.replace(' ', "+"))
            .unwrap_or_else(|| "collection:national".to_string());
        match cursor {
            PageCursor::Token(token) => PageRequest::get(format!(
                "{}?q={}&cursor={}&api_key={}",
                SEARCH_URL, query, token, self.api_key
            )),
            _ => PageRequest::get(format!(
                "{}?q={}&api_key={}",
                SEARCH_URL, query, self.api_key
            )),
        }
    }

    fn parse_page(&self, body: &str) -> Result<SourcePage, MapError> {
        let envelope: Value = serde_json::from_str(body)?;
        let response = envelope
            .get("response")
            .ok_or_else(|| MapError::Envelope("missing `response` object".into()))?;
        let records = response
            .get("rows")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| MapError::Envelope("`response.rows` is not an array".into()))?;
        let next = response
            .get("cursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(|c| PageCursor::Token(c.to_string()));
        Ok(SourcePage::new(records, next))
    }

    fn map_record(&self, raw: &Value) -> Result<MappedRecord, MapError> {
        let id = required_str(raw, "id")?;

        let item = NormalizedItem {
            source_item_id: id.to_string(),
            title: optional_str(raw, "title").unwrap_or_else(|| "Untitled".to_string()),
            description: optional_str(raw, "description"),
            creator_override: optional_str(raw, "creator")
                .or_else(|| optional_str(raw, "physdesc")),
            publication_date: Self::year_date(raw),
            source_url: optional_str(raw, "view_url").unwrap_or_default(),
            extra_info: raw.clone(),
        };

        let files = raw
            .get("image")
            .and_then(|img| img.get("url"))
            .and_then(Value::as_str)
            .map(|url| {
                let format = raw
                    .get("image")
                    .and_then(|img| img.get("format"))
                    .and_then(Value::as_str)
                    .unwrap_or("JPEG");
                vec![NormalizedFile::new(url).with_format(format)]
            })
            .unwrap_or_default();

        Ok(MappedRecord { item, files })
    }
}
