//! STAC catalog backend.
//!
//! Two search modes:
//! - collection search, `GET {base}/collections` with free-text `q`
//! - item search, `POST {base}/search` with a JSON body
//!
//! Keywords are OR'd into one free-text expression, so a STAC query is
//! always a single request.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::backend::CatalogBackend;
use crate::config::StacMode;
use crate::error::BackendError;
use crate::http;
use crate::types::{BackendQuery, Source, TemporalInterval};

/// A STAC-style catalog.
pub struct StacBackend {
    name: String,
    base_url: String,
    mode: StacMode,
    collections: Vec<String>,
    token: Option<String>,
    client: reqwest::Client,
}

impl StacBackend {
    /// A collection-search backend.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            mode: StacMode::Collections,
            collections: Vec::new(),
            token: None,
            client,
        }
    }

    /// Switch to item search, optionally restricted to `collections`.
    pub fn with_mode(mut self, mode: StacMode, collections: Vec<String>) -> Self {
        self.mode = mode;
        self.collections = collections;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Query-string parameters for collection search.
    pub(crate) fn collection_params(query: &BackendQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", query.limit.to_string())];
        if let Some(q) = free_text(&query.keywords) {
            params.push(("q", q));
        }
        if let Some(bbox) = query.bbox {
            params.push(("bbox", bbox.to_string()));
        }
        if let Some(datetime) = datetime_param(&query.interval) {
            params.push(("datetime", datetime));
        }
        params
    }

    /// JSON body for item search.
    pub(crate) fn item_search_body(&self, query: &BackendQuery) -> Value {
        let mut body = Map::new();
        body.insert("limit".into(), json!(query.limit));
        if !self.collections.is_empty() {
            body.insert("collections".into(), json!(self.collections));
        }
        if let Some(bbox) = query.bbox {
            body.insert("bbox".into(), json!(bbox.as_array()));
        }
        if let Some(datetime) = datetime_param(&query.interval) {
            body.insert("datetime".into(), json!(datetime));
        }
        if let Some(q) = free_text(&query.keywords) {
            body.insert("q".into(), json!(q));
        }
        Value::Object(body)
    }

    async fn search_collections(&self, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        let request = self
            .client
            .get(self.url("collections"))
            .query(&Self::collection_params(query))
            .header("Accept", "application/json");
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(http::map_transport_error)?;
        let body = http::read_json(response).await?;
        array_field(&body, "collections")
    }

    async fn search_items(&self, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        let request = self
            .client
            .post(self.url("search"))
            .json(&self.item_search_body(query))
            .header("Accept", "application/geo+json");
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(http::map_transport_error)?;
        let body = http::read_json(response).await?;
        array_field(&body, "features")
    }
}

#[async_trait]
impl CatalogBackend for StacBackend {
    fn id(&self) -> &str {
        &self.name
    }

    fn source(&self) -> Source {
        Source::Stac
    }

    fn base_url(&self) -> Option<&str> {
        Some(&self.base_url)
    }

    async fn search(&self, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        tracing::trace!(backend = %self.name, mode = ?self.mode, keywords = ?query.keywords, "STAC search");
        let items = match self.mode {
            StacMode::Collections => self.search_collections(query).await?,
            StacMode::Items => self.search_items(query).await?,
        };
        tracing::debug!(backend = %self.name, count = items.len(), "STAC items received");
        Ok(items)
    }
}

fn array_field(body: &Value, field: &str) -> Result<Vec<Value>, BackendError> {
    body.get(field)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| BackendError::Parse(format!("STAC response has no `{field}` array")))
}

/// Keywords OR'd into one free-text expression.
fn free_text(keywords: &[String]) -> Option<String> {
    if keywords.is_empty() {
        return None;
    }
    Some(
        keywords
            .iter()
            .map(|k| if k.contains(' ') { format!("\"{k}\"") } else { k.clone() })
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

/// STAC `datetime` value: an RFC 3339 range with `..` for an open bound.
/// `None` for an unbounded interval.
pub fn datetime_param(interval: &TemporalInterval) -> Option<String> {
    if interval.is_unbounded() {
        return None;
    }
    let start = interval
        .start
        .map_or_else(|| "..".to_string(), |d| format!("{}T00:00:00Z", d.format("%Y-%m-%d")));
    let end = interval
        .end
        .map_or_else(|| "..".to_string(), |d| format!("{}T23:59:59Z", d.format("%Y-%m-%d")));
    Some(format!("{start}/{end}"))
}
