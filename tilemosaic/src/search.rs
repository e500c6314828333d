//! Paginated STAC item search.
//!
//! Footprints for a mosaic can come straight from a STAC API `/search`
//! endpoint. Results arrive in pages; the server reports how many items
//! matched (`context.matched`/`context.found`, sat-api's `meta.found` or
//! `numberMatched`) and the client keeps requesting until it has them all or
//! hits the caller's item cap. Pages are followed through `next` links when
//! the server sends them, otherwise through a `page` counter in the body.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::builder::{footprints_from_values, BuildError, Footprint};
use crate::http::{AsyncHttpClient, HttpError};

/// Default page size requested from the server.
pub const DEFAULT_STAC_LIMIT: usize = 500;

/// Errors from a paginated search.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Server claimed fewer matches than it already delivered
    #[error("Server reported {matched} matched items but returned {received}")]
    ProtocolViolation { matched: u64, received: u64 },

    /// Response was not a search page
    #[error("Invalid search response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    /// An item could not be turned into a footprint
    #[error(transparent)]
    Footprint(#[from] BuildError),
}

/// Paging knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Items requested per page
    pub limit: usize,
    /// Stop after this many items, truncating the last page
    pub max_items: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_STAC_LIMIT,
            max_items: None,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct Context {
    #[serde(default, alias = "found")]
    matched: Option<u64>,
}

/// sat-api page metadata.
#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    found: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Link {
    rel: String,
    href: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    body: Option<Map<String, Value>>,
    #[serde(default)]
    merge: bool,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    features: Vec<Value>,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    context: Option<Context>,
    #[serde(default)]
    meta: Option<Meta>,
    #[serde(default, rename = "numberMatched")]
    number_matched: Option<u64>,
}

impl SearchPage {
    fn matched(&self) -> Option<u64> {
        self.context
            .as_ref()
            .and_then(|c| c.matched)
            .or_else(|| self.meta.as_ref().and_then(|m| m.found))
            .or(self.number_matched)
    }
}

enum NextRequest {
    Post { url: String, body: Map<String, Value> },
    Get { url: String },
}

impl NextRequest {
    fn url(&self) -> &str {
        match self {
            NextRequest::Post { url, .. } | NextRequest::Get { url } => url,
        }
    }
}

/// Runs a search and returns every collected item as raw GeoJSON.
pub async fn search_items<C: AsyncHttpClient>(
    client: &C,
    url: &str,
    query: Map<String, Value>,
    options: &SearchOptions,
) -> Result<Vec<Value>, SearchError> {
    let mut base = query;
    base.entry("limit").or_insert_with(|| Value::from(options.limit));
    let mut request = NextRequest::Post {
        url: url.to_string(),
        body: base.clone(),
    };
    let mut page_number = 1u64;
    let mut items: Vec<Value> = Vec::new();
    let mut requests = 0usize;

    loop {
        let bytes = match &request {
            NextRequest::Post { url, body } => {
                let json = Value::Object(body.clone()).to_string();
                client.post_json(url, &json).await?
            }
            NextRequest::Get { url } => client.get(url).await?,
        };
        requests += 1;

        let page: SearchPage =
            serde_json::from_slice(&bytes).map_err(|e| SearchError::InvalidResponse {
                url: request.url().to_string(),
                reason: e.to_string(),
            })?;
        let returned = page.features.len();
        let matched = page.matched();
        items.extend(page.features);
        let received = items.len() as u64;
        debug!(
            url = request.url(),
            page = page_number,
            returned,
            received,
            matched = ?matched,
            "Search page received"
        );

        if let Some(matched) = matched {
            if matched < received {
                return Err(SearchError::ProtocolViolation { matched, received });
            }
        }
        if let Some(max) = options.max_items {
            if items.len() >= max {
                items.truncate(max);
                break;
            }
        }
        if returned == 0 {
            break;
        }

        let next = page.links.into_iter().find(|l| l.rel == "next");
        match (&next, matched) {
            (_, Some(matched)) if received >= matched => break,
            (None, None) => break,
            _ => {}
        }

        page_number += 1;
        request = match next {
            Some(link) => follow_link(link, &request),
            None => {
                let mut body = base.clone();
                body.insert("page".to_string(), Value::from(page_number));
                NextRequest::Post {
                    url: url.to_string(),
                    body,
                }
            }
        };
    }

    info!(url, items = items.len(), requests, "Search complete");
    Ok(items)
}

fn follow_link(link: Link, previous: &NextRequest) -> NextRequest {
    let is_post = link
        .method
        .as_deref()
        .map(|m| m.eq_ignore_ascii_case("POST"))
        .unwrap_or(link.body.is_some());
    if !is_post {
        return NextRequest::Get { url: link.href };
    }

    let body = match (link.body, previous) {
        (Some(next), NextRequest::Post { body, .. }) if link.merge => {
            let mut merged = body.clone();
            merged.extend(next);
            merged
        }
        (Some(next), _) => next,
        (None, NextRequest::Post { body, .. }) => body.clone(),
        (None, NextRequest::Get { .. }) => Map::new(),
    };
    NextRequest::Post {
        url: link.href,
        body,
    }
}

/// Runs a search and converts the items into footprints.
///
/// Items keep their STAC `id`, so `Accessor::Id` names them in the index.
pub async fn search_footprints<C: AsyncHttpClient>(
    client: &C,
    url: &str,
    query: Map<String, Value>,
    options: &SearchOptions,
) -> Result<Vec<Footprint>, SearchError> {
    let items = search_items(client, url, query, options).await?;
    Ok(footprints_from_values(items)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::SequenceHttpClient;
    use serde_json::json;

    fn item(id: &str) -> Value {
        json!({
            "type": "Feature",
            "id": id,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]
            },
            "properties": {}
        })
    }

    fn page(ids: &[&str], extra: Value) -> Result<Vec<u8>, HttpError> {
        let mut page = json!({
            "type": "FeatureCollection",
            "features": ids.iter().map(|id| item(id)).collect::<Vec<_>>(),
        });
        if let (Value::Object(map), Value::Object(extra)) = (&mut page, extra) {
            map.extend(extra);
        }
        Ok(page.to_string().into_bytes())
    }

    fn query() -> Map<String, Value> {
        let mut q = Map::new();
        q.insert("collections".to_string(), json!(["sentinel"]));
        q
    }

    #[tokio::test]
    async fn test_follows_merge_link_until_complete() {
        let client = SequenceHttpClient::new(vec![
            page(
                &["a", "b"],
                json!({
                    "context": {"page": 1, "limit": 2, "matched": 3, "returned": 2},
                    "links": [{"rel": "next", "href": "http://stac/search", "method": "POST",
                               "body": {"token": "next:b"}, "merge": true}]
                }),
            ),
            page(&["c"], json!({"context": {"page": 2, "matched": 3, "returned": 1}})),
        ]);

        let items = search_items(&client, "http://stac/search", query(), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 3);

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        let second: Value = serde_json::from_str(requests[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(second["token"], "next:b");
        assert_eq!(second["collections"], json!(["sentinel"]));
        assert_eq!(second["limit"], 500);
    }

    #[tokio::test]
    async fn test_replace_link_body() {
        let client = SequenceHttpClient::new(vec![
            page(
                &["a"],
                json!({
                    "numberMatched": 2,
                    "links": [{"rel": "next", "href": "http://stac/search?p=2", "method": "POST",
                               "body": {"token": "t2"}}]
                }),
            ),
            page(&["b"], json!({"numberMatched": 2})),
        ]);

        search_items(&client, "http://stac/search", query(), &SearchOptions::default())
            .await
            .unwrap();
        let requests = client.requests();
        assert_eq!(requests[1].url, "http://stac/search?p=2");
        let second: Value = serde_json::from_str(requests[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(second, json!({"token": "t2"}));
    }

    #[tokio::test]
    async fn test_page_counter_without_links() {
        let client = SequenceHttpClient::new(vec![
            page(&["a"], json!({"context": {"page": 1, "found": 2}})),
            page(&["b"], json!({"context": {"page": 2, "found": 2}})),
        ]);

        let items = search_items(&client, "http://stac/search", query(), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        let second: Value =
            serde_json::from_str(client.requests()[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(second["page"], 2);
    }

    #[tokio::test]
    async fn test_max_items_truncates() {
        let client = SequenceHttpClient::new(vec![page(
            &["a", "b", "c"],
            json!({"context": {"matched": 10}, "links": [{"rel": "next", "href": "http://x"}]}),
        )]);

        let options = SearchOptions::default().with_max_items(2);
        let items = search_items(&client, "http://stac/search", query(), &options)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_matched_below_received_is_violation() {
        let client = SequenceHttpClient::new(vec![page(
            &["a", "b"],
            json!({"context": {"matched": 1}}),
        )]);

        let err = search_items(&client, "http://stac/search", query(), &SearchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SearchError::ProtocolViolation {
                matched: 1,
                received: 2
            }
        );
    }

    #[tokio::test]
    async fn test_number_matched_without_links_pages_by_counter() {
        let client = SequenceHttpClient::new(vec![
            page(&["a"], json!({"numberMatched": 2})),
            page(&["b"], json!({"numberMatched": 2})),
        ]);
        let items = search_items(&client, "http://stac/search", query(), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        let first: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        let second: Value = serde_json::from_str(requests[1].body.as_deref().unwrap()).unwrap();
        assert!(first.get("page").is_none());
        assert_eq!(second["page"], 2);
        assert_eq!(second["collections"], json!(["sentinel"]));
    }

    #[tokio::test]
    async fn test_sat_api_meta_found() {
        let client = SequenceHttpClient::new(vec![
            page(&["a"], json!({"meta": {"page": 1, "limit": 1, "found": 2, "returned": 1}})),
            page(&["b"], json!({"meta": {"page": 2, "limit": 1, "found": 2, "returned": 1}})),
        ]);
        let items = search_items(&client, "http://stac/search", query(), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_page_stops() {
        let client = SequenceHttpClient::new(vec![
            page(&["a"], json!({"numberMatched": 5})),
            page(&[], json!({"numberMatched": 5})),
        ]);
        let items = search_items(&client, "http://stac/search", query(), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_without_total_or_link_stops_after_one_page() {
        let client = SequenceHttpClient::new(vec![page(&["a"], json!({}))]);
        let items = search_items(&client, "http://stac/search", query(), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_query_limit_is_kept() {
        let client = SequenceHttpClient::new(vec![page(&["a"], json!({"numberMatched": 1}))]);
        let mut q = query();
        q.insert("limit".to_string(), json!(50));
        search_items(&client, "http://stac/search", q, &SearchOptions::default())
            .await
            .unwrap();
        let first: Value =
            serde_json::from_str(client.requests()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(first["limit"], 50);
    }

    #[tokio::test]
    async fn test_footprints_keep_item_ids() {
        let client = SequenceHttpClient::new(vec![page(&["scene-1"], json!({}))]);
        let fps = search_footprints(&client, "http://stac/search", query(), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(fps[0].id.as_deref(), Some("scene-1"));
    }
}
