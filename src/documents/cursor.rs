//! Cursor over the paginated `/documents/` listing
//!
//! The server returns `next`/`previous` as absolute URLs built from its own
//! origin, which can differ from ours. `PageLink` is the only form a link is
//! stored in: origin and API base path stripped, path and query kept. The
//! session client prefixes the API base itself, so an absolute link handed to
//! it would be requested twice-prefixed.

use std::fmt;
use std::sync::Arc;

use reqwest::Url;
use thiserror::Error;
use tracing::{debug, warn};

use super::filters::DocumentFilters;
use crate::models::{DocumentRecord, ListingEnvelope, ListingPage};
use crate::session::{ApiError, RequestOptions, SessionClient};

const DOCUMENTS_PATH: &str = "/documents/";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unusable pagination link {0:?}")]
pub struct PageLinkError(pub String);

/// API-relative continuation link (`/documents/?cursor=abc`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageLink(String);

impl PageLink {
    /// Normalize a link taken from a listing response.
    ///
    /// Accepts absolute URLs on any origin as well as already-relative paths.
    /// The API base path (`/api`) is removed when the path starts with it.
    pub fn normalize(raw: &str, api_base: &Url) -> Result<Self, PageLinkError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PageLinkError(raw.to_string()));
        }

        let (path, query) = match Url::parse(raw) {
            Ok(url) => {
                if url.cannot_be_a_base() {
                    return Err(PageLinkError(raw.to_string()));
                }
                (url.path().to_string(), url.query().map(str::to_string))
            }
            Err(_) if raw.starts_with('/') => match raw.split_once('?') {
                Some((path, query)) => (path.to_string(), Some(query.to_string())),
                None => (raw.to_string(), None),
            },
            Err(_) => return Err(PageLinkError(raw.to_string())),
        };

        let base_path = api_base.path().trim_end_matches('/');
        let relative = if !base_path.is_empty() && path.starts_with(base_path) {
            let rest = &path[base_path.len()..];
            // Only strip on a segment boundary ("/api" must not eat "/apix")
            if rest.is_empty() || rest.starts_with('/') {
                rest.to_string()
            } else {
                path.clone()
            }
        } else {
            path.clone()
        };
        let relative = if relative.starts_with('/') {
            relative
        } else {
            format!("/{}", relative)
        };

        Ok(match query {
            Some(query) if !query.is_empty() => Self(format!("{}?{}", relative, query)),
            _ => Self(relative),
        })
    }

    pub fn as_path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First-page link for a set of filters
pub fn first_page_link(filters: &DocumentFilters, api_base: &Url) -> PageLink {
    let pairs = filters.query_pairs();
    if pairs.is_empty() {
        return PageLink(DOCUMENTS_PATH.to_string());
    }

    let mut url = api_base.clone();
    url.set_path(&format!(
        "{}{}",
        api_base.path().trim_end_matches('/'),
        DOCUMENTS_PATH
    ));
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));

    PageLink::normalize(url.as_str(), api_base)
        .unwrap_or_else(|_| PageLink(DOCUMENTS_PATH.to_string()))
}

/// Stateful walker over the document listing.
///
/// Holds exactly one page: every successful load replaces the display set.
pub struct PageCursor {
    client: Arc<SessionClient>,
    filters: DocumentFilters,
    documents: Vec<DocumentRecord>,
    next: Option<PageLink>,
    previous: Option<PageLink>,
    count: u64,
}

impl PageCursor {
    pub fn new(client: Arc<SessionClient>) -> Self {
        Self::with_filters(client, DocumentFilters::default())
    }

    pub fn with_filters(client: Arc<SessionClient>, filters: DocumentFilters) -> Self {
        Self {
            client,
            filters,
            documents: Vec::new(),
            next: None,
            previous: None,
            count: 0,
        }
    }

    pub fn filters(&self) -> &DocumentFilters {
        &self.filters
    }

    /// Replace the active filters. Pagination restarts from the first page.
    pub fn set_filters(&mut self, filters: DocumentFilters) {
        self.filters = filters;
        self.next = None;
        self.previous = None;
    }

    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn next_link(&self) -> Option<&PageLink> {
        self.next.as_ref()
    }

    pub fn previous_link(&self) -> Option<&PageLink> {
        self.previous.as_ref()
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    /// Load a page. With no link, the first page for the active filters.
    pub async fn load(
        &mut self,
        link: Option<&PageLink>,
    ) -> Result<ListingPage<DocumentRecord>, ApiError> {
        let api_base = self.client.config().api_base_url.clone();
        let link = match link {
            Some(link) => link.clone(),
            None => first_page_link(&self.filters, &api_base),
        };
        debug!(path = %link, "Loading documents page");

        match self.fetch(&link).await {
            Ok(page) => {
                self.next = normalize_optional(page.next.as_deref(), &api_base);
                self.previous = normalize_optional(page.previous.as_deref(), &api_base);
                self.count = page.count;
                self.documents = page.results.clone();
                debug!(
                    count = page.count,
                    shown = page.results.len(),
                    has_next = self.next.is_some(),
                    "Documents page loaded"
                );
                Ok(page)
            }
            Err(e) => {
                self.documents.clear();
                self.next = None;
                self.previous = None;
                self.count = 0;
                Err(e)
            }
        }
    }

    /// Follow the stored `next` link; `Ok(None)` on the last page
    pub async fn load_next(&mut self) -> Result<Option<ListingPage<DocumentRecord>>, ApiError> {
        match self.next.clone() {
            Some(link) => self.load(Some(&link)).await.map(Some),
            None => Ok(None),
        }
    }

    /// Follow the stored `previous` link; `Ok(None)` on the first page
    pub async fn load_previous(&mut self) -> Result<Option<ListingPage<DocumentRecord>>, ApiError> {
        match self.previous.clone() {
            Some(link) => self.load(Some(&link)).await.map(Some),
            None => Ok(None),
        }
    }

    async fn fetch(&self, link: &PageLink) -> Result<ListingPage<DocumentRecord>, ApiError> {
        let response = self
            .client
            .request(link.as_path(), RequestOptions::get())
            .await?;
        if !response.is_success() {
            return Err(ApiError::from_response(&response, "Failed to fetch documents"));
        }
        let envelope: ListingEnvelope<DocumentRecord> = response
            .json()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(envelope.into())
    }
}

fn normalize_optional(raw: Option<&str>, api_base: &Url) -> Option<PageLink> {
    let raw = raw?;
    match PageLink::normalize(raw, api_base) {
        Ok(link) => Some(link),
        Err(e) => {
            warn!(error = %e, "Dropping unusable pagination link");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::models::SessionTokens;
    use crate::session::testing::{CountingInvalidator, FakeTransport};
    use crate::session::MemoryTokenStore;
    use chrono::NaiveDate;
    use serde_json::json;

    fn base() -> Url {
        Url::parse("http://localhost:8000/api").unwrap()
    }

    fn document(id: i64, truck: &str) -> serde_json::Value {
        json!({
            "id": id,
            "truck_number": truck,
            "date": "2025-05-01",
            "created_at": "2025-05-02T08:30:00Z",
            "images": []
        })
    }

    fn cursor_with(transport: Arc<FakeTransport>) -> PageCursor {
        let client = SessionClient::with_transport(
            ClientConfig::default(),
            transport,
            Arc::new(MemoryTokenStore::with_tokens(SessionTokens::new("A", "R"))),
            Arc::new(CountingInvalidator::default()),
        );
        PageCursor::new(Arc::new(client))
    }

    #[test]
    fn test_normalize_strips_origin_and_base_path() {
        let link = PageLink::normalize("http://localhost:8000/api/documents/?cursor=abc", &base()).unwrap();
        assert_eq!(link.as_path(), "/documents/?cursor=abc");

        let other_origin =
            PageLink::normalize("https://api.internal:9443/api/documents/?page=3", &base()).unwrap();
        assert_eq!(other_origin.as_path(), "/documents/?page=3");

        let relative = PageLink::normalize("/api/documents/?page=2", &base()).unwrap();
        assert_eq!(relative.as_path(), "/documents/?page=2");

        let already = PageLink::normalize("/documents/?page=2", &base()).unwrap();
        assert_eq!(already.as_path(), "/documents/?page=2");
    }

    #[test]
    fn test_normalize_respects_segment_boundary_and_rejects_garbage() {
        let link = PageLink::normalize("http://localhost:8000/apix/documents/", &base()).unwrap();
        assert_eq!(link.as_path(), "/apix/documents/");

        assert!(PageLink::normalize("", &base()).is_err());
        assert!(PageLink::normalize("page=2", &base()).is_err());
        assert!(PageLink::normalize("mailto:ops@example.com", &base()).is_err());
    }

    #[test]
    fn test_first_page_link_encodes_filters() {
        assert_eq!(first_page_link(&DocumentFilters::new(), &base()).as_path(), "/documents/");

        let filters = DocumentFilters::new()
            .with_truck_number("MH 12")
            .with_date_range(
                NaiveDate::from_ymd_opt(2025, 4, 1),
                NaiveDate::from_ymd_opt(2026, 3, 31),
            );
        assert_eq!(
            first_page_link(&filters, &base()).as_path(),
            "/documents/?truck_number=MH+12&date_from=2025-04-01&date_to=2026-03-31"
        );
    }

    #[tokio::test]
    async fn test_next_link_is_requested_relative() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_json(
            200,
            json!({
                "count": 3,
                "next": "http://localhost:8000/api/documents/?cursor=abc",
                "previous": null,
                "results": [document(1, "MH12AB1234"), document(2, "MH12AB9999")]
            }),
        );
        transport.push_json(
            200,
            json!({
                "count": 3,
                "next": null,
                "previous": "http://localhost:8000/api/documents/",
                "results": [document(3, "KA01XY0001")]
            }),
        );
        let mut cursor = cursor_with(transport.clone());

        let first = cursor.load(None).await.unwrap();
        assert_eq!(first.results.len(), 2);
        assert!(cursor.has_next());
        assert!(!cursor.has_previous());

        let second = cursor.load_next().await.unwrap().unwrap();
        assert_eq!(second.results.len(), 1);

        let sent = transport.requests();
        assert_eq!(sent[1].url, "http://localhost:8000/api/documents/?cursor=abc");
        assert!(!sent[1].url.contains("/api/api/"));

        // Replaced, not appended
        assert_eq!(cursor.documents().len(), 1);
        assert_eq!(cursor.documents()[0].id, 3);
        assert_eq!(cursor.count(), 3);
        assert!(!cursor.has_next());
        assert_eq!(cursor.previous_link().unwrap().as_path(), "/documents/");
        assert!(cursor.load_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bare_array_is_single_page() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_json(200, json!([document(1, "A"), document(2, "B")]));
        let mut cursor = cursor_with(transport);

        let page = cursor.load(None).await.unwrap();
        assert_eq!(page.count, 2);
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
        assert!(!cursor.has_next());
    }

    #[tokio::test]
    async fn test_failed_load_clears_display_set() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_json(
            200,
            json!({"count": 1, "next": null, "previous": null, "results": [document(1, "A")]}),
        );
        transport.push_json(500, json!({"error": "database unavailable"}));
        transport.push_json(502, json!("<html>"));
        let mut cursor = cursor_with(transport);

        cursor.load(None).await.unwrap();
        assert_eq!(cursor.documents().len(), 1);

        let err = cursor.load(None).await.unwrap_err();
        assert_eq!(err.to_string(), "database unavailable");
        assert!(cursor.documents().is_empty());

        let err = cursor.load(None).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch documents");
    }

    #[tokio::test]
    async fn test_filters_are_sent_and_reset_pagination() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_json(
            200,
            json!({"count": 40, "next": "http://localhost:8000/api/documents/?page=2", "previous": null, "results": []}),
        );
        transport.push_json(200, json!({"count": 0, "next": null, "previous": null, "results": []}));
        let mut cursor = cursor_with(transport.clone());

        cursor.load(None).await.unwrap();
        assert!(cursor.has_next());

        cursor.set_filters(DocumentFilters::new().with_truck_number("KA01"));
        assert!(!cursor.has_next());
        cursor.load(None).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[1].url, "http://localhost:8000/api/documents/?truck_number=KA01");
    }
}
