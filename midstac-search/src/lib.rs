//! # midstac-search
//!
//! Natural-language search over Earth-observation catalogs.
//!
//! A free-text request is turned into typed [`SpatiotemporalParams`] by the
//! [`SpatiotemporalExtractor`], then fanned out concurrently by the
//! [`Dispatcher`] to every configured catalog backend (NASA CMR and STAC
//! APIs). Backend items are normalized into [`ResultRecord`]s and merged
//! into a source-grouped [`ResultSet`], each source capped at the
//! per-source limit.
//!
//! ## Design
//!
//! - Extraction is pure pattern matching against an injected [`Clock`]
//! - Backends sit behind the [`CatalogBackend`] capability; place names are
//!   resolved through the [`Geocoder`] capability
//! - One task per backend, each under its own timeout, plus a global
//!   dispatch deadline
//! - Graceful degradation: a failing backend contributes an empty, annotated
//!   entry in [`ResultSet::reports`] and never fails the request
//!
//! ## Security
//!
//! - Credentials come from configuration only and never appear in errors
//! - Raw queries are logged only at trace level

pub mod backend;
pub mod backends;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod geocoder;
pub mod http;
pub mod types;

pub use backend::CatalogBackend;
pub use backends::{search_catalog, search_metadata_repository, CmrBackend, StacBackend};
pub use config::{
    BackendConfig, DispatchConfig, ExtractorConfig, GeocoderConfig, IntervalPolicy, StacMode,
};
pub use dispatcher::Dispatcher;
pub use error::{BackendError, ExtractionError, MergeError, Result, SearchError};
pub use extractor::{Clock, FixedClock, SpatiotemporalExtractor, SystemClock};
pub use geocoder::{GeoapifyGeocoder, GeocodeResult, Geocoder};
pub use types::{
    BackendReport, BackendStatus, BoundingBox, GeoPoint, Link, ResultRecord, ResultSet, Source,
    SpatiotemporalParams, TemporalInterval,
};

/// Extract parameters from `text` and dispatch them to every backend.
///
/// The extracted `limit` bounds every source together with the dispatcher's
/// per-source limit.
///
/// # Errors
///
/// Returns [`SearchError::Extraction`] for empty or keyword-less input, in
/// which case no backend is contacted. Backend failures never surface here;
/// they are reported in [`ResultSet::reports`].
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> midstac_search::Result<()> {
/// use midstac_search::{Dispatcher, DispatchConfig, GeocoderConfig, SpatiotemporalExtractor, SystemClock};
///
/// let extractor = SpatiotemporalExtractor::default();
/// let dispatcher = Dispatcher::from_config(&DispatchConfig::default(), &GeocoderConfig::default())?;
/// let results = midstac_search::handle_query(
///     "Find Landsat data over California from 2020 to 2021",
///     &extractor,
///     &dispatcher,
///     &SystemClock,
/// )
/// .await?;
/// for record in &results.records {
///     println!("[{}] {}: {}", record.source, record.id, record.title);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn handle_query(
    text: &str,
    extractor: &SpatiotemporalExtractor,
    dispatcher: &Dispatcher,
    clock: &dyn Clock,
) -> Result<ResultSet> {
    let params = extractor.extract(text, clock)?;
    tracing::trace!(?params, "extracted");
    dispatcher.dispatch(&params, params.limit).await
}
