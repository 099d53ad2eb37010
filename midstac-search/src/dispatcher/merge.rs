//! Source-grouped merge of per-backend outcomes.
//!
//! Records are bucketed by [`Source`] in canonical order. Within a bucket they
//! keep configured backend order, then each backend's own order. Duplicate
//! ids inside a bucket keep their first occurrence, and each bucket is cut to
//! the per-source limit. There is no cross-backend re-ranking.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use super::normalize::normalize_batch;
use crate::types::{BackendReport, BackendStatus, ResultRecord, ResultSet, Source};

/// What one backend task produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendOutcome {
    pub backend: String,
    pub source: Source,
    pub status: BackendStatus,
    /// Raw items, in backend order. Empty unless `status` is ok.
    pub items: Vec<Value>,
    /// Interval queries that failed while others succeeded.
    pub failed_queries: usize,
    /// Backend base URL, for fallback links.
    pub catalog_url: Option<String>,
}

impl BackendOutcome {
    pub fn ok(backend: impl Into<String>, source: Source, items: Vec<Value>) -> Self {
        Self {
            backend: backend.into(),
            source,
            status: BackendStatus::Ok,
            items,
            failed_queries: 0,
            catalog_url: None,
        }
    }

    pub fn with_failed_queries(mut self, failed: usize) -> Self {
        self.failed_queries = failed;
        self
    }

    pub fn with_catalog_url(mut self, url: Option<&str>) -> Self {
        self.catalog_url = url.map(String::from);
        self
    }

    /// A failed backend; its contribution is empty.
    pub fn failed(backend: impl Into<String>, source: Source, status: BackendStatus) -> Self {
        Self {
            backend: backend.into(),
            source,
            status,
            items: Vec::new(),
            failed_queries: 0,
            catalog_url: None,
        }
    }
}

/// Merge outcomes (in configured backend order) into a [`ResultSet`].
pub fn merge(outcomes: Vec<BackendOutcome>, per_source_limit: usize) -> ResultSet {
    let mut buckets: BTreeMap<Source, Vec<ResultRecord>> = BTreeMap::new();
    let mut reports = Vec::with_capacity(outcomes.len());

    for outcome in outcomes {
        let (records, skipped) =
            normalize_batch(&outcome.items, outcome.source, outcome.catalog_url.as_deref());
        if skipped > 0 {
            tracing::warn!(backend = %outcome.backend, skipped, "skipped unmappable items");
        }
        reports.push(BackendReport {
            backend: outcome.backend,
            source: outcome.source,
            status: outcome.status,
            records: records.len(),
            skipped,
            failed_queries: outcome.failed_queries,
        });
        buckets.entry(outcome.source).or_default().extend(records);
    }

    let mut records = Vec::new();
    for (source, bucket) in buckets {
        let mut seen = HashSet::new();
        let before = bucket.len();
        let kept: Vec<ResultRecord> = bucket
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .take(per_source_limit)
            .collect();
        tracing::debug!(%source, before, kept = kept.len(), "bucket merged");
        records.extend(kept);
    }

    ResultSet {
        records,
        reports,
        bbox: None,
    }
}
