//! Pagination shapes
//!
//! Providers paginate with opaque cursors, numbered pages, or full next
//! URLs. `PageCursor` covers all three behind one ephemeral token; the
//! pipeline never interprets a cursor, it only threads it back to the
//! source and compares it for progress.

use serde_json::Value;

/// Continuation token for the next page of a source.
///
/// Equality is what the pipeline uses to detect a stuck provider: a
/// response whose next cursor equals the cursor just fetched terminates
/// the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// The source's defined starting point.
    Start,
    /// Opaque continuation token (Internet Archive, Smithsonian,
    /// Wikimedia `gcmcontinue`).
    Token(String),
    /// Numbered page.
    Page(u32),
    /// Full next-page URL supplied by the provider.
    Url(String),
}

impl std::fmt::Display for PageCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageCursor::Start => write!(f, "start"),
            PageCursor::Token(t) => write!(f, "token:{}", t),
            PageCursor::Page(n) => write!(f, "page:{}", n),
            PageCursor::Url(u) => write!(f, "url:{}", u),
        }
    }
}

/// HTTP method for a page request. Most providers are GET; a few search
/// APIs take POST bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// One page request as produced by a source for a given cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<Value>,
}

impl PageRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            body: Some(body),
        }
    }
}

/// A parsed page: the raw records it carried and the continuation, if
/// the provider supplied one.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub records: Vec<Value>,
    pub next: Option<PageCursor>,
}

impl SourcePage {
    pub fn new(records: Vec<Value>, next: Option<PageCursor>) -> Self {
        Self { records, next }
    }

    /// Final page: records but nothing after them.
    pub fn last(records: Vec<Value>) -> Self {
        Self {
            records,
            next: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_equality() {
        assert_eq!(PageCursor::Token("c2".into()), PageCursor::Token("c2".into()));
        assert_ne!(PageCursor::Token("c2".into()), PageCursor::Token("c3".into()));
        assert_ne!(PageCursor::Start, PageCursor::Page(1));
        assert_eq!(PageCursor::Page(4), PageCursor::Page(4));
    }

    #[test]
    fn test_request_constructors() {
        let get = PageRequest::get("https://example.org/search");
        assert_eq!(get.method, HttpMethod::Get);
        assert!(get.body.is_none());

        let post = PageRequest::post(
            "https://example.org/search",
            serde_json::json!({"q": "public domain"}),
        );
        assert_eq!(post.method, HttpMethod::Post);
        assert!(post.body.is_some());
    }
}
