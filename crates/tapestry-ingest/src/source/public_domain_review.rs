//! Public Domain Review
//!
//! HTML source: scrapes the featured articles off the homepage. A single
//! page, no pagination.
//!
//! The provider exposes no stable identifier, so the article URL stands
//! in as `source_item_id`. That is an ID-quality risk: a moved article
//! splits history and a reused URL merges two records.

use scraper::{Html, Selector};
use serde_json::{json, Value};

use tapestry_common::{NormalizedFile, NormalizedItem};

use super::{optional_str, required_str, IngestSource, MapError, MappedRecord, RunParams};
use crate::page::{PageCursor, PageRequest, SourcePage};

const HOMEPAGE_URL: &str = "https://publicdomainreview.org/";

pub struct PublicDomainReviewSource;

impl PublicDomainReviewSource {
    pub fn new() -> Self {
        Self
    }

    fn selector(css: &str) -> Result<Selector, MapError> {
        Selector::parse(css)
            .map_err(|e| MapError::Envelope(format!("bad selector `{}`: {:?}", css, e)))
    }
}

impl Default for PublicDomainReviewSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestSource for PublicDomainReviewSource {
    fn name(&self) -> &str {
        "Public Domain Review"
    }

    fn media_type(&self) -> &str {
        "Text"
    }

    fn license(&self) -> &str {
        "Public Domain"
    }

    fn request_for(&self, _cursor: &PageCursor, _params: &RunParams) -> PageRequest {
        PageRequest::get(HOMEPAGE_URL)
    }

    /// Lift each featured article into a synthetic JSON record so the
    /// mapping step stays uniform with the JSON sources.
    fn parse_page(&self, body: &str) -> Result<SourcePage, MapError> {
        let document = Html::parse_document(body);
        let article_sel = Self::selector(".featured-articles article")?;
        let title_sel = Self::selector("h2")?;
        let link_sel = Self::selector("a")?;
        let summary_sel = Self::selector("p.summary")?;
        let image_sel = Self::selector("img")?;

        let mut records = Vec::new();
        for article in document.select(&article_sel) {
            let title = article
                .select(&title_sel)
                .next()
                .map(|h| h.text().collect::<String>().trim().to_string());
            let link = article
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string);
            let summary = article
                .select(&summary_sel)
                .next()
                .map(|p| p.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty());
            let image = article
                .select(&image_sel)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(str::to_string);

            records.push(json!({
                "title": title,
                "link": link,
                "summary": summary,
                "image": image,
            }));
        }

        // Homepage scrape is one page; no continuation.
        Ok(SourcePage::last(records))
    }

    fn map_record(&self, raw: &Value) -> Result<MappedRecord, MapError> {
        let link = required_str(raw, "link")?;
        let link = if link.starts_with("http") {
            link.to_string()
        } else {
            format!("{}{}", HOMEPAGE_URL.trim_end_matches('/'), link)
        };

        let item = NormalizedItem {
            // Article URL as identifier; the provider has no native id.
            source_item_id: link.clone(),
            title: optional_str(raw, "title").unwrap_or_else(|| "Untitled".to_string()),
            description: optional_str(raw, "summary"),
            creator_override: None,
            publication_date: None,
            source_url: link,
            extra_info: raw.clone(),
        };

        let files = optional_str(raw, "image")
            .map(|url| {
                vec![NormalizedFile::new(url)
                    .with_format("JPEG")
                    .with_notes("Article thumbnail")]
            })
            .unwrap_or_default();

        Ok(MappedRecord { item, files })
    }
}
