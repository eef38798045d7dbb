//! Wikimedia Commons
//!
//! Walks `Category:Public domain` files through the action API's
//! generator form, so every page already carries `imageinfo` (URL plus
//! extended metadata) and no per-record follow-up request is needed.
//! Continuation is the `gcmcontinue` token.

use serde_json::Value;

use tapestry_common::{NormalizedFile, NormalizedItem};

use super::{optional_str, required_str, IngestSource, MapError, MappedRecord, RunParams};
use crate::page::{PageCursor, PageRequest, SourcePage};

const API_URL: &str = "https://commons.wikimedia.org/w/api.php";
const PAGE_SIZE: u32 = 50;

pub struct WikimediaCommonsSource;

impl WikimediaCommonsSource {
    pub fn new() -> Self {
        Self
    }

    fn base_url(params: &RunParams) -> String {
        let category = match &params.query {
            Some(q) => format!("Category:{}", q.replace(' ', "_")),
            None => "Category:Public_domain".to_string(),
        };
        format!(
            "{}?action=query&generator=categorymembers&gcmtitle={}&gcmtype=file&gcmlimit={}\
             &prop=imageinfo&iiprop=url|extmetadata&format=json&origin=*",
            API_URL, category, PAGE_SIZE
        )
    }

    /// extmetadata values arrive as `{"value": ..., "source": ...}`.
    fn ext_value(raw: &Value, key: &str) -> Option<String> {
        raw.get("imageinfo")
            .and_then(Value::as_array)
            .and_then(|infos| infos.first())
            .and_then(|info| info.get("extmetadata"))
            .and_then(|meta| meta.get(key))
            .and_then(|entry| entry.get("value"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn image_url(raw: &Value) -> Option<String> {
        raw.get("imageinfo")
            .and_then(Value::as_array)
            .and_then(|infos| infos.first())
            .and_then(|info| info.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

impl Default for WikimediaCommonsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestSource for WikimediaCommonsSource {
    fn name(&self) -> &str {
        "Wikimedia Commons"
    }

    fn media_type(&self) -> &str {
        "Image"
    }

    fn license(&self) -> &str {
        "Public Domain"
    }

    fn request_for(&self, cursor: &PageCursor, params: &RunParams) -> PageRequest {
        let base = Self::base_url(params);
        match cursor {
            PageCursor::Token(token) => {
                PageRequest::get(format!("{}&gcmcontinue={}", base, token))
            },
            _ => PageRequest::get(base),
        }
    }

    fn parse_page(&self, body: &str) -> Result<SourcePage, MapError> {
        let envelope: Value = serde_json::from_str(body)?;

        // `query.pages` is an object keyed by page id; a category with no
        // members omits `query` entirely.
        let records = match envelope.get("query").and_then(|q| q.get("pages")) {
            Some(Value::Object(pages)) => pages.values().cloned().collect(),
            Some(_) => {
                return Err(MapError::Envelope("`query.pages` is not an object".into()))
            },
            None => Vec::new(),
        };

        let next = envelope
            .get("continue")
            .and_then(|c| c.get("gcmcontinue"))
            .and_then(Value::as_str)
            .map(|t| PageCursor::Token(t.to_string()));

        Ok(SourcePage::new(records, next))
    }

    fn map_record(&self, raw: &Value) -> Result<MappedRecord, MapError> {
        let file_title = required_str(raw, "title")?;
        let display_title = file_title.strip_prefix("File:").unwrap_or(file_title);

        let item = NormalizedItem {
            source_item_id: file_title.to_string(),
            title: display_title.to_string(),
            description: Self::ext_value(raw, "ImageDescription"),
            creator_override: Self::ext_value(raw, "Artist"),
            publication_date: None,
            source_url: format!(
                "https://commons.wikimedia.org/wiki/{}",
                file_title.replace(' ', "_")
            ),
            extra_info: raw.clone(),
        };

        let files = Self::image_url(raw)
            .map(|url| {
                let format = url
                    .rsplit('.')
                    .next()
                    .map(str::to_uppercase)
                    .or_else(|| optional_str(raw, "format"));
                vec![NormalizedFile {
                    file_url: url,
                    format,
                    size: None,
                    notes: None,
                }]
            })
            .unwrap_or_default();

        Ok(MappedRecord { item, files })
    }
}
