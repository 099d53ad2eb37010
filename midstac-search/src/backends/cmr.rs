//! CMR metadata-repository backend.
//!
//! Searches collections through the UMM-JSON endpoint at
//! `{base}/search/collections.umm_json`. CMR's `keyword` parameter takes a
//! single phrase, so each keyword is sent as its own request and the item
//! lists are concatenated in keyword order.

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::CatalogBackend;
use crate::error::BackendError;
use crate::http;
use crate::types::{BackendQuery, Source, TemporalInterval};

/// Keyword sent when a query has none.
const MATCH_ALL: &str = "*";

/// A CMR-style metadata repository.
pub struct CmrBackend {
    name: String,
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl CmrBackend {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            token: None,
            client,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/search/collections.umm_json",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Query-string parameters for one keyword.
    pub(crate) fn query_params(keyword: &str, query: &BackendQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("keyword", keyword.to_string()),
            ("page_size", query.limit.to_string()),
        ];
        if let Some(bbox) = query.bbox {
            params.push(("bounding_box", bbox.to_string()));
        }
        if let Some(temporal) = temporal_param(&query.interval) {
            params.push(("temporal[]", temporal));
        }
        params
    }

    async fn search_keyword(
        &self,
        keyword: &str,
        query: &BackendQuery,
    ) -> Result<Vec<Value>, BackendError> {
        tracing::trace!(backend = %self.name, keyword, "CMR collection search");

        let mut request = self
            .client
            .get(self.endpoint())
            .query(&Self::query_params(keyword, query))
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(http::map_transport_error)?;
        let body = http::read_json(response).await?;
        match body.get("items").and_then(Value::as_array) {
            Some(items) => Ok(items.clone()),
            None => Err(BackendError::Parse(
                "CMR response has no `items` array".into(),
            )),
        }
    }
}

#[async_trait]
impl CatalogBackend for CmrBackend {
    fn id(&self) -> &str {
        &self.name
    }

    fn source(&self) -> Source {
        Source::Cmr
    }

    fn base_url(&self) -> Option<&str> {
        Some(&self.base_url)
    }

    async fn search(&self, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        let match_all = [MATCH_ALL.to_string()];
        let keywords: &[String] = if query.keywords.is_empty() {
            &match_all
        } else {
            &query.keywords
        };

        let mut items = Vec::new();
        for keyword in keywords {
            items.extend(self.search_keyword(keyword, query).await?);
        }
        tracing::debug!(backend = %self.name, count = items.len(), "CMR items received");
        Ok(items)
    }
}

/// CMR `temporal[]` value: `start,end` with an empty side for an open bound.
/// `None` for an unbounded interval.
pub fn temporal_param(interval: &TemporalInterval) -> Option<String> {
    if interval.is_unbounded() {
        return None;
    }
    let start = interval
        .start
        .map(|d| format!("{}T00:00:00Z", d.format("%Y-%m-%d")))
        .unwrap_or_default();
    let end = interval
        .end
        .map(|d| format!("{}T23:59:59Z", d.format("%Y-%m-%d")))
        .unwrap_or_default();
    Some(format!("{start},{end}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn client() -> reqwest::Client {
        http::build_client(Duration::from_secs(5), "midstac/test").expect("client")
    }

    fn query(keywords: &[&str]) -> BackendQuery {
        BackendQuery {
            backend: "cmr".into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            bbox: BoundingBox::new(-124.5, 32.5, -114.0, 42.0),
            interval: TemporalInterval::closed(date(2020, 1, 1), date(2021, 12, 31))
                .expect("valid"),
            limit: 10,
        }
    }

    fn umm_item(id: &str) -> Value {
        json!({"meta": {"concept-id": id}, "umm": {"EntryTitle": format!("Title {id}")}})
    }

    #[test]
    fn temporal_param_formats() {
        let closed = TemporalInterval::closed(date(2020, 1, 1), date(2021, 12, 31)).expect("valid");
        assert_eq!(
            temporal_param(&closed).as_deref(),
            Some("2020-01-01T00:00:00Z,2021-12-31T23:59:59Z")
        );
        let open_end = TemporalInterval::new(Some(date(2020, 1, 1)), None).expect("valid");
        assert_eq!(temporal_param(&open_end).as_deref(), Some("2020-01-01T00:00:00Z,"));
        assert_eq!(temporal_param(&TemporalInterval::unbounded()), None);
    }

    #[test]
    fn query_params_include_bbox_and_temporal() {
        let params = CmrBackend::query_params("Landsat", &query(&["Landsat"]));
        assert!(params.contains(&("keyword", "Landsat".into())));
        assert!(params.contains(&("page_size", "10".into())));
        assert!(params.contains(&("bounding_box", "-124.5,32.5,-114,42".into())));
        assert!(params
            .iter()
            .any(|(k, v)| *k == "temporal[]" && v.starts_with("2020-01-01")));
    }

    #[tokio::test]
    async fn sends_one_request_per_keyword_and_concatenates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/collections.umm_json"))
            .and(query_param("keyword", "Landsat"))
            .and(query_param("bounding_box", "-124.5,32.5,-114,42"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"hits": 1, "items": [umm_item("C1-LP")]})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/collections.umm_json"))
            .and(query_param("keyword", "MODIS"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"hits": 2, "items": [umm_item("C2-LP"), umm_item("C3-LP")]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = CmrBackend::new("cmr", server.uri(), client());
        let items = backend.search(&query(&["Landsat", "MODIS"])).await.expect("search");
        let ids: Vec<&str> = items
            .iter()
            .filter_map(|i| i.pointer("/meta/concept-id").and_then(Value::as_str))
            .collect();
        assert_eq!(ids, vec!["C1-LP", "C2-LP", "C3-LP"]);
    }

    #[tokio::test]
    async fn empty_keywords_use_wildcard() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/collections.umm_json"))
            .and(query_param("keyword", "*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let backend = CmrBackend::new("cmr", server.uri(), client());
        let items = backend.search(&query(&[])).await.expect("search");
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn bearer_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/collections.umm_json"))
            .and(header("Authorization", "Bearer edl-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [umm_item("C9")]})))
            .expect(1)
            .mount(&server)
            .await;

        let backend =
            CmrBackend::new("cmr", server.uri(), client()).with_token(Some("edl-token".into()));
        let items = backend.search(&query(&["GEDI"])).await.expect("search");
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"errors": ["Token is expired"]})),
            )
            .mount(&server)
            .await;

        let backend = CmrBackend::new("cmr", server.uri(), client());
        let err = backend.search(&query(&["GEDI"])).await.unwrap_err();
        assert_eq!(err, BackendError::Auth("HTTP 401: Token is expired".into()));
    }

    #[tokio::test]
    async fn missing_items_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"feed": {}})))
            .mount(&server)
            .await;

        let backend = CmrBackend::new("cmr", server.uri(), client());
        let err = backend.search(&query(&["GEDI"])).await.unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[tokio::test]
    #[ignore = "requires network access to cmr.earthdata.nasa.gov"]
    async fn live_nasa_cmr_search() {
        let backend = CmrBackend::new("cmr", crate::config::NASA_CMR_URL, client());
        let items = backend.search(&query(&["Landsat"])).await.expect("live search");
        assert!(!items.is_empty());
    }
}
