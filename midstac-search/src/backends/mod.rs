//! Catalog backend adapters.
//!
//! Each module provides a struct implementing [`CatalogBackend`] for one
//! backend kind. [`build_backends`] turns configuration into adapters;
//! [`search_metadata_repository`] and [`search_catalog`] run a single
//! normalized query against one backend without a dispatcher.

pub mod cmr;
pub mod stac;

pub use cmr::CmrBackend;
pub use stac::StacBackend;

use std::sync::Arc;

use crate::backend::CatalogBackend;
use crate::config::{well_known_catalog, BackendConfig, DispatchConfig, NASA_CMR_URL};
use crate::dispatcher::normalize::normalize_batch;
use crate::error::BackendError;
use crate::http;
use crate::types::{BackendQuery, BoundingBox, ResultRecord, TemporalInterval};

/// Build the adapter for one configured backend.
pub fn build_backend(config: &BackendConfig, client: reqwest::Client) -> Arc<dyn CatalogBackend> {
    match config {
        BackendConfig::Cmr {
            name,
            base_url,
            token,
        } => Arc::new(CmrBackend::new(name.clone(), base_url.clone(), client).with_token(token.clone())),
        BackendConfig::Stac {
            name,
            base_url,
            mode,
            collections,
            token,
        } => Arc::new(
            StacBackend::new(name.clone(), base_url.clone(), client)
                .with_mode(*mode, collections.clone())
                .with_token(token.clone()),
        ),
    }
}

/// Build adapters for every configured backend, sharing one HTTP client.
pub fn build_backends(
    configs: &[BackendConfig],
    client: &reqwest::Client,
) -> Vec<Arc<dyn CatalogBackend>> {
    configs
        .iter()
        .map(|config| build_backend(config, client.clone()))
        .collect()
}

fn default_client() -> Result<reqwest::Client, BackendError> {
    let config = DispatchConfig::default();
    http::build_client(config.backend_timeout(), &config.user_agent())
        .map_err(|e| BackendError::Http(e.to_string()))
}

async fn run_single(
    backend: &dyn CatalogBackend,
    keywords: &[String],
    bbox: Option<BoundingBox>,
    interval: TemporalInterval,
    limit: usize,
) -> Result<Vec<ResultRecord>, BackendError> {
    let query = BackendQuery {
        backend: backend.id().to_string(),
        keywords: keywords.to_vec(),
        bbox,
        interval,
        limit,
    };
    let items = backend.search(&query).await?;
    let (mut records, skipped) = normalize_batch(&items, backend.source(), backend.base_url());
    if skipped > 0 {
        tracing::warn!(backend = backend.id(), skipped, "skipped unmappable items");
    }
    records.truncate(limit);
    Ok(records)
}

/// Query the public NASA CMR once and return normalized records.
///
/// # Errors
///
/// Returns [`BackendError`] if the request fails.
pub async fn search_metadata_repository(
    keywords: &[String],
    bbox: Option<BoundingBox>,
    interval: TemporalInterval,
    limit: usize,
) -> Result<Vec<ResultRecord>, BackendError> {
    let backend = CmrBackend::new("cmr", NASA_CMR_URL, default_client()?);
    run_single(&backend, keywords, bbox, interval, limit).await
}

/// Query one STAC catalog with collection search and return normalized
/// records.
///
/// `catalog_ref` is either a well-known catalog name (`maap`,
/// `earth_search`, ...) or an http(s) base URL.
///
/// # Errors
///
/// Returns [`BackendError::InvalidQuery`] for an unknown catalog name, or any
/// error the catalog request produces.
pub async fn search_catalog(
    catalog_ref: &str,
    keywords: &[String],
    bbox: Option<BoundingBox>,
    interval: TemporalInterval,
    limit: usize,
) -> Result<Vec<ResultRecord>, BackendError> {
    let (name, base_url) = match well_known_catalog(catalog_ref) {
        Some(url) => (format!("stac:{catalog_ref}"), url.to_string()),
        None if catalog_ref.starts_with("http://") || catalog_ref.starts_with("https://") => {
            (catalog_ref.to_string(), catalog_ref.to_string())
        }
        None => {
            return Err(BackendError::InvalidQuery(format!(
                "unknown STAC catalog `{catalog_ref}`"
            )))
        }
    };
    let backend = StacBackend::new(name, base_url, default_client()?);
    run_single(&backend, keywords, bbox, interval, limit).await
}
