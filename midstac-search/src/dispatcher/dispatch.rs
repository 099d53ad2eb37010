//! Concurrent fan-out of one request to every configured backend.
//!
//! # Pipeline
//!
//! The dispatch deadline starts when [`Dispatcher::dispatch`] is called and
//! bounds every step below, geocoding included.
//!
//! 1. Resolve the spatial restriction once: explicit bbox, else the point,
//!    else the geocoded place name, else unrestricted
//! 2. Derive the temporal queries from the interval policy
//! 3. Start one task per backend, each under the backend timeout
//! 4. Collect completions until all are done or the dispatch deadline passes;
//!    each task writes only its own slot
//! 5. Mark unfinished backends as timed out and merge into a [`ResultSet`]

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;

use super::merge::{merge, BackendOutcome};
use crate::backend::CatalogBackend;
use crate::backends::build_backends;
use crate::config::{DispatchConfig, GeocoderConfig, IntervalPolicy};
use crate::error::{BackendError, SearchError};
use crate::geocoder::{GeoapifyGeocoder, Geocoder};
use crate::http;
use crate::types::{
    BackendQuery, BackendStatus, BoundingBox, ResultSet, Source, SpatiotemporalParams,
    TemporalInterval,
};

/// Fans queries out to catalog backends and merges what comes back.
pub struct Dispatcher {
    backends: Vec<Arc<dyn CatalogBackend>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    geocoder_timeout: Duration,
    per_source_limit: usize,
    backend_timeout: Duration,
    dispatch_timeout: Duration,
    interval_policy: IntervalPolicy,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("backends", &self.backends.iter().map(|b| b.id()).collect::<Vec<_>>())
            .field("geocoder", &self.geocoder.is_some())
            .field("per_source_limit", &self.per_source_limit)
            .field("backend_timeout", &self.backend_timeout)
            .field("dispatch_timeout", &self.dispatch_timeout)
            .field("interval_policy", &self.interval_policy)
            .finish()
    }
}

impl Dispatcher {
    /// Build a dispatcher over already constructed backends.
    ///
    /// Only the limit, timeouts and interval policy of `config` are used;
    /// its `backends` list is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `backends` is empty, two backends
    /// share an id, or the limit or timeouts are invalid.
    pub fn new(
        config: &DispatchConfig,
        backends: Vec<Arc<dyn CatalogBackend>>,
    ) -> Result<Self, SearchError> {
        config.validate_budget()?;
        if backends.is_empty() {
            return Err(SearchError::Config(
                "at least one backend must be configured".into(),
            ));
        }
        for (i, backend) in backends.iter().enumerate() {
            if backends[..i].iter().any(|b| b.id() == backend.id()) {
                return Err(SearchError::Config(format!(
                    "duplicate backend name `{}`",
                    backend.id()
                )));
            }
        }
        Ok(Self {
            backends,
            geocoder: None,
            geocoder_timeout: GeocoderConfig::default().timeout(),
            per_source_limit: config.per_source_limit,
            backend_timeout: config.backend_timeout(),
            dispatch_timeout: config.dispatch_timeout(),
            interval_policy: config.interval_policy,
        })
    }

    /// Resolve place names through `geocoder`, bounded by `timeout`.
    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>, timeout: Duration) -> Self {
        self.geocoder = Some(geocoder);
        self.geocoder_timeout = timeout;
        self
    }

    /// Build a dispatcher with HTTP adapters for every configured backend
    /// and, if active, the Geoapify geocoder.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if either configuration is invalid.
    pub fn from_config(
        dispatch: &DispatchConfig,
        geocoder: &GeocoderConfig,
    ) -> Result<Self, SearchError> {
        dispatch.validate()?;
        let user_agent = dispatch.user_agent();
        let client = http::build_client(dispatch.backend_timeout(), &user_agent)?;
        let mut dispatcher = Self::new(dispatch, build_backends(&dispatch.backends, &client))?;
        if let Some(adapter) = GeoapifyGeocoder::from_config(geocoder, &user_agent)? {
            dispatcher = dispatcher.with_geocoder(Arc::new(adapter), geocoder.timeout());
        }
        Ok(dispatcher)
    }

    /// Backend ids and kinds, in configured order.
    pub fn backends(&self) -> Vec<(&str, Source)> {
        self.backends.iter().map(|b| (b.id(), b.source())).collect()
    }

    /// The configured per-source cap.
    pub fn per_source_limit(&self) -> usize {
        self.per_source_limit
    }

    /// Query every backend concurrently and merge the results.
    ///
    /// Each source keeps at most `min(limit, per_source_limit)` records.
    /// Backend failures never fail the dispatch; they are reported per
    /// backend in the returned [`ResultSet`]. The whole call, geocoding
    /// included, finishes within the dispatch timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `limit` is zero.
    pub async fn dispatch(
        &self,
        params: &SpatiotemporalParams,
        limit: usize,
    ) -> Result<ResultSet, SearchError> {
        if limit == 0 {
            return Err(SearchError::Config("limit must be greater than 0".into()));
        }
        let deadline = tokio::time::Instant::now() + self.dispatch_timeout;
        let cap = limit.min(self.per_source_limit);
        let bbox = self.resolve_bbox(params, deadline).await;
        let intervals = self.query_intervals(&params.intervals);

        tracing::info!(
            backends = self.backends.len(),
            keywords = ?params.keywords,
            bbox = ?bbox,
            intervals = intervals.len(),
            cap,
            "dispatching"
        );

        let mut pending: FuturesUnordered<_> = self
            .backends
            .iter()
            .enumerate()
            .map(|(index, backend)| {
                let backend = Arc::clone(backend);
                let keywords = params.keywords.clone();
                let intervals = intervals.clone();
                let budget = self.backend_timeout;
                async move {
                    let result = tokio::time::timeout(
                        budget,
                        query_backend(backend.as_ref(), &keywords, bbox, &intervals, cap),
                    )
                    .await;
                    (index, outcome_of(backend.as_ref(), result, budget))
                }
            })
            .collect();

        let mut slots: Vec<Option<BackendOutcome>> = (0..self.backends.len()).map(|_| None).collect();
        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((index, outcome))) => slots[index] = Some(outcome),
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        pending = pending.len(),
                        "dispatch deadline elapsed, cancelling pending backends"
                    );
                    break;
                }
            }
        }
        drop(pending);

        let outcomes: Vec<BackendOutcome> = slots
            .into_iter()
            .zip(&self.backends)
            .map(|(slot, backend)| {
                slot.unwrap_or_else(|| {
                    BackendOutcome::failed(backend.id(), backend.source(), BackendStatus::TimedOut)
                })
            })
            .collect();

        let mut set = merge(outcomes, cap);
        set.bbox = bbox;
        tracing::info!(
            records = set.records.len(),
            failed = set.failures().count(),
            "dispatch complete"
        );
        Ok(set)
    }

    /// Geocoding stops at the earlier of its own timeout and `deadline`.
    async fn resolve_bbox(
        &self,
        params: &SpatiotemporalParams,
        deadline: tokio::time::Instant,
    ) -> Option<BoundingBox> {
        if let Some(bbox) = params.bbox {
            return Some(bbox);
        }
        if let Some(point) = params.point {
            return Some(BoundingBox::from_point(point));
        }
        let location = params.location.as_deref()?;
        let Some(geocoder) = &self.geocoder else {
            tracing::debug!(location, "no geocoder configured, querying without spatial restriction");
            return None;
        };
        let until = deadline.min(tokio::time::Instant::now() + self.geocoder_timeout);
        match tokio::time::timeout_at(until, geocoder.geocode(location)).await {
            Ok(Ok(result)) => {
                let bbox = result.to_bbox();
                tracing::debug!(location, %bbox, "geocoded");
                Some(bbox)
            }
            Ok(Err(err)) => {
                tracing::warn!(location, error = %err, "geocoding failed, querying without spatial restriction");
                None
            }
            Err(_) => {
                tracing::warn!(location, "geocoding timed out, querying without spatial restriction");
                None
            }
        }
    }

    /// One interval per query under `PerInterval`, the envelope under
    /// `Union`, and a single unbounded interval when there are none.
    fn query_intervals(&self, intervals: &[TemporalInterval]) -> Vec<TemporalInterval> {
        if intervals.is_empty() {
            return vec![TemporalInterval::unbounded()];
        }
        match self.interval_policy {
            IntervalPolicy::PerInterval => intervals.to_vec(),
            IntervalPolicy::Union => TemporalInterval::envelope(intervals).into_iter().collect(),
        }
    }
}

/// Items from the interval queries that succeeded, and how many failed.
type IntervalBatch = (Vec<Value>, usize);

/// Run one backend's interval queries concurrently, concatenating items in
/// interval order. Failed intervals are dropped and counted; the backend
/// fails only when every interval does, with the first error.
async fn query_backend(
    backend: &dyn CatalogBackend,
    keywords: &[String],
    bbox: Option<BoundingBox>,
    intervals: &[TemporalInterval],
    limit: usize,
) -> Result<IntervalBatch, BackendError> {
    let queries: Vec<BackendQuery> = intervals
        .iter()
        .map(|interval| BackendQuery {
            backend: backend.id().to_string(),
            keywords: keywords.to_vec(),
            bbox,
            interval: *interval,
            limit,
        })
        .collect();
    let results = futures::future::join_all(queries.iter().map(|query| backend.search(query))).await;

    let mut items = Vec::new();
    let mut failed = 0;
    let mut first_error = None;
    for (query, result) in queries.iter().zip(results) {
        match result {
            Ok(batch) => items.extend(batch),
            Err(err) => {
                tracing::warn!(
                    backend = backend.id(),
                    interval = ?query.interval,
                    error = %err,
                    "interval query failed"
                );
                failed += 1;
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) if failed == queries.len() => Err(err),
        _ => Ok((items, failed)),
    }
}

fn outcome_of(
    backend: &dyn CatalogBackend,
    result: Result<Result<IntervalBatch, BackendError>, tokio::time::error::Elapsed>,
    budget: Duration,
) -> BackendOutcome {
    match result {
        Ok(Ok((items, failed))) => {
            tracing::debug!(
                backend = backend.id(),
                count = items.len(),
                failed_queries = failed,
                "backend returned items"
            );
            BackendOutcome::ok(backend.id(), backend.source(), items)
                .with_failed_queries(failed)
                .with_catalog_url(backend.base_url())
        }
        Ok(Err(BackendError::Timeout(reason))) => {
            tracing::warn!(backend = backend.id(), %reason, "backend timed out");
            BackendOutcome::failed(backend.id(), backend.source(), BackendStatus::TimedOut)
        }
        Ok(Err(err)) => {
            tracing::warn!(backend = backend.id(), error = %err, "backend query failed");
            BackendOutcome::failed(
                backend.id(),
                backend.source(),
                BackendStatus::Errored(err.to_string()),
            )
        }
        Err(_) => {
            tracing::warn!(backend = backend.id(), ?budget, "backend exceeded its time budget");
            BackendOutcome::failed(backend.id(), backend.source(), BackendStatus::TimedOut)
        }
    }
}
