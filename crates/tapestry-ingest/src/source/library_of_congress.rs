//! Library of Congress
//!
//! JSON search over loc.gov. The response's `pagination.next` is a full
//! URL for the following page; its absence ends the run.

use chrono::NaiveDate;
use serde_json::Value;

use tapestry_common::{NormalizedFile, NormalizedItem};

use super::{optional_str, required_str, IngestSource, MapError, MappedRecord, RunParams};
use crate::page::{PageCursor, PageRequest, SourcePage};

const SEARCH_URL: &str = "https://www.loc.gov/search/";
const DEFAULT_QUERY: &str = "public+domain";

pub struct LibraryOfCongressSource;

impl LibraryOfCongressSource {
    pub fn new() -> Self {
        Self
    }

    /// `creator` may be a single string or an array of names.
    fn creator(raw: &Value) -> Option<String> {
        match raw.get("creator") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Array(names)) => {
                let joined = names
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                (!joined.is_empty()).then_some(joined)
            },
            _ => None,
        }
    }

    /// Dates arrive as "1923-05-02", "1923", or with trailing qualifiers
    /// ("1923 to 1925"); take the leading token and pad partial dates.
    fn publication_date(raw: &Value) -> Option<NaiveDate> {
        let date = optional_str(raw, "date")?;
        let token = date.split_whitespace().next()?;
        NaiveDate::parse_from_str(token, "%Y-%m-%d")
            .ok()
            .or_else(|| {
                token
                    .parse::<i32>()
                    .ok()
                    .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
            })
    }
}

impl Default for LibraryOfCongressSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestSource for LibraryOfCongressSource {
    fn name(&self) -> &str {
        "Library of Congress"
    }

    fn media_type(&self) -> &str {
        "Mixed"
    }

    fn license(&self) -> &str {
        "Public Domain"
    }

    fn request_for(&self, cursor: &PageCursor, params: &RunParams) -> PageRequest {
        match cursor {
            PageCursor::Url(url) => PageRequest::get(url.clone()),
            _ => {
                let query = params
                    .query
                    .as_deref()
                    .map(|q| q.replace(' ', "+"))
                    .unwrap_or_else(|| DEFAULT_QUERY.to_string());
                PageRequest::get(format!(
                    "{}?q={}&fo=json&at=results,pagination",
                    SEARCH_URL, query
                ))
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
            .get("pagination")
            .and_then(|p| p.get("next"))
            .and_then(Value::as_str)
            .map(|url| PageCursor::Url(url.to_string()));
        Ok(SourcePage::new(records, next))
    }

    fn map_record(&self, raw: &Value) -> Result<MappedRecord, MapError> {
        let id = required_str(raw, "id")?;

        let item = NormalizedItem {
            source_item_id: id.to_string(),
            title: optional_str(raw, "title").unwrap_or_else(|| "Untitled".to_string()),
            description: optional_str(raw, "description"),
            creator_override: Self::creator(raw),
            publication_date: Self::publication_date(raw),
            source_url: optional_str(raw, "url").unwrap_or_else(|| id.to_string()),
            extra_info: raw.clone(),
        };

        let files = raw
            .get("image_url")
            .and_then(Value::as_array)
            .map(|urls| {
                urls.iter()
                    .filter_map(Value::as_str)
                    .map(NormalizedFile::new)
                    .collect()
            })
            .unwrap_or_default();

        Ok(MappedRecord { item, files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = r#"{
        "results": [
            {
                "id": "http://www.loc.gov/item/2021667925/",
                "title": "Panoramic view",
                "creator": ["Smith, Jane", "Doe, John"],
                "date": "1923-05-02",
                "url": "https://www.loc.gov/item/2021667925/",
                "image_url": ["https://tile.loc.gov/image1.jpg"]
            }
        ],
        "pagination": {"current": 1, "next": "https://www.loc.gov/search/?q=public+domain&sp=2&fo=json"}
    }"#;

    #[test]
    fn test_parse_page_uses_next_url() {
        let source = LibraryOfCongressSource::new();
        let page = source.parse_page(PAGE).unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(
            page.next,
            Some(PageCursor::Url(
                "https://www.loc.gov/search/?q=public+domain&sp=2&fo=json".into()
            ))
        );
    }

    #[test]
    fn test_parse_last_page() {
        let source = LibraryOfCongressSource::new();
        let page = source
            .parse_page(r#"{"results": [], "pagination": {"current": 9, "next": null}}"#)
            .unwrap();
        assert!(page.records.is_empty());
        assert!(page.next.is_none());
    }

    #[test]
    fn test_map_record() {
        let source = LibraryOfCongressSource::new();
        let page = source.parse_page(PAGE).unwrap();
        let mapped = source.map_record(&page.records[0]).unwrap();

        assert_eq!(
            mapped.item.source_item_id,
            "http://www.loc.gov/item/2021667925/"
        );
        assert_eq!(
            mapped.item.creator_override.as_deref(),
            Some("Smith, Jane, Doe, John")
        );
        assert_eq!(
            mapped.item.publication_date,
            NaiveDate::from_ymd_opt(1923, 5, 2)
        );
        assert_eq!(mapped.files.len(), 1);
    }

    #[test]
    fn test_year_only_date() {
        assert_eq!(
            LibraryOfCongressSource::publication_date(&json!({"date": "1923 to 1925"})),
            NaiveDate::from_ymd_opt(1923, 1, 1)
        );
        assert!(LibraryOfCongressSource::publication_date(&json!({"date": "circa"})).is_none());
    }

    #[test]
    fn test_next_url_cursor_is_used_verbatim() {
        let source = LibraryOfCongressSource::new();
        let req = source.request_for(
            &PageCursor::Url("https://www.loc.gov/search/?sp=2".into()),
            &RunParams::default(),
        );
        assert_eq!(req.url, "https://www.loc.gov/search/?sp=2");
    }
}
