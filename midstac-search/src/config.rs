//! Extractor, dispatcher and geocoder configuration with sensible defaults.
//!
//! All configuration is passed explicitly into constructors; nothing here
//! reads the environment. Every section deserializes with `#[serde(default)]`
//! so partial TOML files work.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::SearchError;
use crate::extractor::periods::NamedPeriod;
use crate::types::Source;

/// Well-known STAC catalog endpoints, addressable by name.
pub const STAC_CATALOGS: &[(&str, &str)] = &[
    ("nasa", "https://cmr.earthdata.nasa.gov/stac"),
    ("earth_search", "https://earth-search.aws.element84.com/v1"),
    (
        "planetary_computer",
        "https://planetarycomputer.microsoft.com/api/stac/v1",
    ),
    ("maap", "https://stac.maap-project.org"),
];

/// Default NASA CMR search endpoint.
pub const NASA_CMR_URL: &str = "https://cmr.earthdata.nasa.gov";

/// Look up a well-known STAC catalog URL by name.
pub fn well_known_catalog(name: &str) -> Option<&'static str> {
    STAC_CATALOGS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, url)| *url)
}

/// How a STAC backend searches its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StacMode {
    /// Collection search (`GET /collections`).
    #[default]
    Collections,
    /// Item search (`POST /search`).
    Items,
}

/// How multiple disjoint temporal intervals are sent to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalPolicy {
    /// One query per interval, results concatenated in interval order.
    #[default]
    PerInterval,
    /// A single query over the envelope of all intervals.
    Union,
}

/// One configured catalog backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// A CMR-style metadata repository.
    Cmr {
        name: String,
        base_url: String,
        /// Bearer token sent as `Authorization: Bearer <token>`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    /// A STAC-style catalog.
    Stac {
        name: String,
        base_url: String,
        #[serde(default)]
        mode: StacMode,
        /// Collections to restrict item search to. Ignored in collection mode.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        collections: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
}

impl BackendConfig {
    /// The public NASA CMR endpoint.
    pub fn nasa_cmr() -> Self {
        Self::Cmr {
            name: "cmr".into(),
            base_url: NASA_CMR_URL.into(),
            token: None,
        }
    }

    /// A STAC collection-search backend for `base_url`.
    pub fn stac(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::Stac {
            name: name.into(),
            base_url: base_url.into(),
            mode: StacMode::Collections,
            collections: Vec::new(),
            token: None,
        }
    }

    /// A STAC backend for one of the [`STAC_CATALOGS`], named `stac:<name>`.
    pub fn well_known_stac(name: &str) -> Option<Self> {
        well_known_catalog(name).map(|url| Self::stac(format!("stac:{name}"), url))
    }

    /// The backend identifier used in reports and logs.
    pub fn name(&self) -> &str {
        match self {
            Self::Cmr { name, .. } | Self::Stac { name, .. } => name,
        }
    }

    /// The kind of records this backend produces.
    pub fn source(&self) -> Source {
        match self {
            Self::Cmr { .. } => Source::Cmr,
            Self::Stac { .. } => Source::Stac,
        }
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        match self {
            Self::Cmr { base_url, .. } | Self::Stac { base_url, .. } => base_url,
        }
    }
}

/// Configuration for the query dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Backends queried concurrently on every dispatch.
    pub backends: Vec<BackendConfig>,
    /// Maximum number of records kept per source.
    pub per_source_limit: usize,
    /// Time budget of one backend task, in seconds.
    pub backend_timeout_seconds: u64,
    /// Deadline for the whole dispatch, in seconds. Must be at least the
    /// backend timeout.
    pub dispatch_timeout_seconds: u64,
    /// Multi-interval query policy.
    pub interval_policy: IntervalPolicy,
    /// Custom User-Agent. If `None`, `midstac/<version>` is sent.
    pub user_agent: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            backends: vec![
                BackendConfig::nasa_cmr(),
                BackendConfig::stac("stac:maap", "https://stac.maap-project.org"),
            ],
            per_source_limit: 10,
            backend_timeout_seconds: 20,
            dispatch_timeout_seconds: 45,
            interval_policy: IntervalPolicy::PerInterval,
            user_agent: None,
        }
    }
}

impl DispatchConfig {
    /// Per-backend time budget.
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_seconds)
    }

    /// Global dispatch deadline.
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_seconds)
    }

    /// The User-Agent header value to send.
    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("midstac/{}", env!("CARGO_PKG_VERSION")))
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `per_source_limit` must be greater than 0
    /// - both timeouts must be greater than 0
    /// - `dispatch_timeout_seconds` must be >= `backend_timeout_seconds`
    /// - `backends` must not be empty, names must be unique and every
    ///   `base_url` must be an http(s) URL
    pub fn validate(&self) -> Result<(), SearchError> {
        self.validate_budget()?;
        if self.backends.is_empty() {
            return Err(SearchError::Config(
                "at least one backend must be configured".into(),
            ));
        }
        for (i, backend) in self.backends.iter().enumerate() {
            if backend.name().trim().is_empty() {
                return Err(SearchError::Config(format!("backend #{i} has an empty name")));
            }
            if self.backends[..i].iter().any(|b| b.name() == backend.name()) {
                return Err(SearchError::Config(format!(
                    "duplicate backend name `{}`",
                    backend.name()
                )));
            }
            validate_http_url(backend.base_url())
                .map_err(|e| SearchError::Config(format!("backend `{}`: {e}", backend.name())))?;
        }
        Ok(())
    }

    /// Checks the limit and timeouts only, for dispatchers built from
    /// injected backends.
    pub fn validate_budget(&self) -> Result<(), SearchError> {
        if self.per_source_limit == 0 {
            return Err(SearchError::Config(
                "per_source_limit must be greater than 0".into(),
            ));
        }
        if self.backend_timeout_seconds == 0 {
            return Err(SearchError::Config(
                "backend_timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.dispatch_timeout_seconds < self.backend_timeout_seconds {
            return Err(SearchError::Config(
                "dispatch_timeout_seconds must be >= backend_timeout_seconds".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the spatiotemporal extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Result limit used when the request does not ask for one.
    pub default_limit: usize,
    /// Named periods added to the built-in table. An entry whose name matches
    /// a built-in replaces it.
    pub extra_periods: Vec<NamedPeriod>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            extra_periods: Vec::new(),
        }
    }
}

impl ExtractorConfig {
    /// Checks `default_limit > 0` and that every extra period is well formed.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.default_limit == 0 {
            return Err(SearchError::Config(
                "default_limit must be greater than 0".into(),
            ));
        }
        for period in &self.extra_periods {
            period.validate().map_err(SearchError::Config)?;
        }
        Ok(())
    }
}

/// Configuration for the Geoapify geocoding adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Whether place names are geocoded at all.
    pub enabled: bool,
    pub base_url: String,
    /// Geoapify API key. Geocoding is skipped when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.geoapify.com".into(),
            api_key: None,
            timeout_seconds: 10,
        }
    }
}

impl GeocoderConfig {
    /// Returns `true` if geocoding is enabled and a key is configured.
    pub fn is_active(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Checks the URL and timeout when geocoding is active.
    pub fn validate(&self) -> Result<(), SearchError> {
        if !self.is_active() {
            return Ok(());
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "geocoder timeout_seconds must be greater than 0".into(),
            ));
        }
        validate_http_url(&self.base_url).map_err(|e| SearchError::Config(format!("geocoder: {e}")))
    }
}

fn validate_http_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid base_url {raw:?}: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("base_url {raw:?} must use http or https"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dispatch_config_has_sensible_values() {
        let config = DispatchConfig::default();
        assert_eq!(config.per_source_limit, 10);
        assert_eq!(config.backend_timeout_seconds, 20);
        assert_eq!(config.dispatch_timeout_seconds, 45);
        assert_eq!(config.interval_policy, IntervalPolicy::PerInterval);
        assert!(config.user_agent.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_backends_are_cmr_and_stac() {
        let config = DispatchConfig::default();
        let sources: Vec<Source> = config.backends.iter().map(BackendConfig::source).collect();
        assert_eq!(sources, vec![Source::Cmr, Source::Stac]);
        assert_eq!(config.backends[0].name(), "cmr");
    }

    #[test]
    fn zero_limit_rejected() {
        let config = DispatchConfig {
            per_source_limit: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("per_source_limit"));
    }

    #[test]
    fn zero_backend_timeout_rejected() {
        let config = DispatchConfig {
            backend_timeout_seconds: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backend_timeout_seconds"));
    }

    #[test]
    fn dispatch_deadline_shorter_than_backend_timeout_rejected() {
        let config = DispatchConfig {
            backend_timeout_seconds: 30,
            dispatch_timeout_seconds: 10,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dispatch_timeout_seconds"));
    }

    #[test]
    fn empty_backends_rejected() {
        let config = DispatchConfig {
            backends: vec![],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backend"));
    }

    #[test]
    fn duplicate_backend_names_rejected() {
        let config = DispatchConfig {
            backends: vec![
                BackendConfig::stac("dup", "https://a.example"),
                BackendConfig::stac("dup", "https://b.example"),
            ],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn non_http_url_rejected() {
        let config = DispatchConfig {
            backends: vec![BackendConfig::stac("local", "file:///tmp/catalog")],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn well_known_catalogs_resolve() {
        assert_eq!(
            well_known_catalog("earth_search"),
            Some("https://earth-search.aws.element84.com/v1")
        );
        assert!(well_known_catalog("nope").is_none());
        let backend = BackendConfig::well_known_stac("planetary_computer").expect("known");
        assert_eq!(backend.name(), "stac:planetary_computer");
        assert_eq!(backend.source(), Source::Stac);
    }

    #[test]
    fn backend_config_deserializes_tagged() {
        let json = r#"[
            {"kind": "cmr", "name": "cmr", "base_url": "https://cmr.example", "token": "t"},
            {"kind": "stac", "name": "es", "base_url": "https://es.example", "mode": "items",
             "collections": ["sentinel-2-l2a"]}
        ]"#;
        let backends: Vec<BackendConfig> = serde_json::from_str(json).expect("deserialize");
        assert_eq!(backends[0].source(), Source::Cmr);
        match &backends[1] {
            BackendConfig::Stac {
                mode, collections, ..
            } => {
                assert_eq!(*mode, StacMode::Items);
                assert_eq!(collections, &vec!["sentinel-2-l2a".to_string()]);
            }
            other => panic!("expected stac backend, got {other:?}"),
        }
    }

    #[test]
    fn user_agent_defaults_to_crate_version() {
        let config = DispatchConfig::default();
        assert!(config.user_agent().starts_with("midstac/"));
        let custom = DispatchConfig {
            user_agent: Some("CustomBot/1.0".into()),
            ..Default::default()
        };
        assert_eq!(custom.user_agent(), "CustomBot/1.0");
    }

    #[test]
    fn extractor_config_zero_limit_rejected() {
        let config = ExtractorConfig {
            default_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(ExtractorConfig::default().validate().is_ok());
    }

    #[test]
    fn geocoder_inactive_without_key() {
        let config = GeocoderConfig::default();
        assert!(!config.is_active());
        assert!(config.validate().is_ok());

        let keyed = GeocoderConfig {
            api_key: Some("key".into()),
            ..Default::default()
        };
        assert!(keyed.is_active());

        let disabled = GeocoderConfig {
            enabled: false,
            ..keyed
        };
        assert!(!disabled.is_active());
    }
}
