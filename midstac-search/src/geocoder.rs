//! Place-name resolution.
//!
//! The dispatcher resolves an extracted place name through the [`Geocoder`]
//! capability. [`GeoapifyGeocoder`] is the HTTP adapter for the Geoapify
//! forward-geocoding API.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::GeocoderConfig;
use crate::error::{BackendError, SearchError};
use crate::http;
use crate::types::{BoundingBox, GeoPoint};

/// What a place name resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeocodeResult {
    BoundingBox(BoundingBox),
    Point(GeoPoint),
}

impl GeocodeResult {
    /// The spatial restriction to query with. A point becomes a degenerate box.
    pub fn to_bbox(&self) -> BoundingBox {
        match self {
            Self::BoundingBox(bbox) => *bbox,
            Self::Point(point) => BoundingBox::from_point(*point),
        }
    }
}

/// Resolves a place name to a location.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// # Errors
    ///
    /// Returns [`BackendError`] if the lookup fails or nothing matches.
    async fn geocode(&self, location: &str) -> Result<GeocodeResult, BackendError>;
}

/// Geoapify forward geocoding (`/v1/geocode/search`).
pub struct GeoapifyGeocoder {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeoapifyGeocoder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Build a geocoder from configuration, or `None` if geocoding is
    /// disabled or no API key is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the configuration is invalid.
    pub fn from_config(
        config: &GeocoderConfig,
        user_agent: &str,
    ) -> Result<Option<Self>, SearchError> {
        config.validate()?;
        let Some(api_key) = config.api_key.as_deref().filter(|_| config.is_active()) else {
            return Ok(None);
        };
        let client = http::build_client(config.timeout(), user_agent)?;
        Ok(Some(Self::new(config.base_url.clone(), api_key, client)))
    }
}

#[async_trait]
impl Geocoder for GeoapifyGeocoder {
    async fn geocode(&self, location: &str) -> Result<GeocodeResult, BackendError> {
        tracing::trace!(location, "geocoding");
        let url = format!("{}/v1/geocode/search", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[("text", location), ("limit", "1"), ("apiKey", self.api_key.as_str())])
            .send()
            .await
            .map_err(http::map_transport_error)?;
        let body = http::read_json(response).await?;
        parse_feature_collection(&body, location)
    }
}

/// First feature's `bbox`, else its point.
fn parse_feature_collection(body: &Value, location: &str) -> Result<GeocodeResult, BackendError> {
    let features = body
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| BackendError::Parse("geocoder response has no `features` array".into()))?;
    let feature = features
        .first()
        .ok_or_else(|| BackendError::InvalidQuery(format!("no match for {location:?}")))?;

    let bbox = feature
        .get("bbox")
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_f64).collect::<Vec<_>>())
        .and_then(|values| BoundingBox::from_slice(&values));
    if let Some(bbox) = bbox {
        return Ok(GeocodeResult::BoundingBox(bbox));
    }

    let props = feature.get("properties");
    let coord = |key: &str| props.and_then(|p| p.get(key)).and_then(Value::as_f64);
    match (coord("lat"), coord("lon")) {
        (Some(lat), Some(lon)) => GeoPoint::new(lat, lon)
            .map(GeocodeResult::Point)
            .ok_or_else(|| BackendError::Parse(format!("geocoder returned out-of-range point {lat},{lon}"))),
        _ => Err(BackendError::Parse(
            "geocoder feature has neither bbox nor lat/lon".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> reqwest::Client {
        http::build_client(Duration::from_secs(5), "midstac/test").expect("client")
    }

    #[test]
    fn point_becomes_degenerate_bbox() {
        let point = GeoPoint::new(10.0, 20.0).expect("valid");
        assert_eq!(
            GeocodeResult::Point(point).to_bbox().as_array(),
            [20.0, 10.0, 20.0, 10.0]
        );
    }

    #[test]
    fn parse_prefers_bbox() {
        let body = json!({"features": [{
            "bbox": [-124.48, 32.53, -114.13, 42.01],
            "properties": {"lat": 36.7, "lon": -119.4}
        }]});
        let result = parse_feature_collection(&body, "California").expect("parse");
        assert_eq!(
            result,
            GeocodeResult::BoundingBox(BoundingBox::new(-124.48, 32.53, -114.13, 42.01).expect("valid"))
        );
    }

    #[test]
    fn parse_falls_back_to_point() {
        let body = json!({"features": [{"properties": {"lat": 48.85, "lon": 2.35}}]});
        let result = parse_feature_collection(&body, "Paris").expect("parse");
        assert_eq!(result, GeocodeResult::Point(GeoPoint::new(48.85, 2.35).expect("valid")));
    }

    #[test]
    fn parse_no_features_is_error() {
        let err = parse_feature_collection(&json!({"features": []}), "Atlantis").unwrap_err();
        assert!(matches!(err, BackendError::InvalidQuery(_)));
        let err = parse_feature_collection(&json!({}), "Atlantis").unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[test]
    fn from_config_inactive_without_key() {
        let geocoder = GeoapifyGeocoder::from_config(&GeocoderConfig::default(), "midstac/test")
            .expect("valid config");
        assert!(geocoder.is_none());
    }

    #[tokio::test]
    async fn geocode_sends_text_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/geocode/search"))
            .and(query_param("text", "Gulf of Mexico"))
            .and(query_param("apiKey", "geo-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "FeatureCollection",
                "features": [{"bbox": [-98.0, 18.0, -80.0, 31.0], "properties": {}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = GeocoderConfig {
            base_url: server.uri(),
            api_key: Some("geo-key".into()),
            ..Default::default()
        };
        let geocoder = GeoapifyGeocoder::from_config(&config, "midstac/test")
            .expect("valid config")
            .expect("active");
        let result = geocoder.geocode("Gulf of Mexico").await.expect("geocode");
        assert_eq!(result.to_bbox().as_array(), [-98.0, 18.0, -80.0, 31.0]);
    }

    #[tokio::test]
    async fn invalid_key_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid apiKey"})))
            .mount(&server)
            .await;

        let geocoder = GeoapifyGeocoder::new(server.uri(), "bad", client());
        let err = geocoder.geocode("Paris").await.unwrap_err();
        assert_eq!(err, BackendError::Auth("HTTP 401: Invalid apiKey".into()));
    }
}
