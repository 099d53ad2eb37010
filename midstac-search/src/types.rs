//! Core types: extracted parameters, backend queries and the merged result set.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An axis-aligned longitude/latitude rectangle.
///
/// Invariant: `lon_min <= lon_max`, `lat_min <= lat_max`, longitudes within
/// `[-180, 180]` and latitudes within `[-90, 90]`. Construct through
/// [`BoundingBox::new`] to have the invariant checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    /// The whole globe.
    pub const GLOBAL: BoundingBox = BoundingBox {
        lon_min: -180.0,
        lat_min: -90.0,
        lon_max: 180.0,
        lat_max: 90.0,
    };

    /// Build a bounding box, returning `None` if the invariant does not hold.
    pub fn new(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Option<Self> {
        let lon_ok = |v: f64| (-180.0..=180.0).contains(&v);
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        if !(lon_ok(lon_min) && lon_ok(lon_max) && lat_ok(lat_min) && lat_ok(lat_max)) {
            return None;
        }
        if lon_min > lon_max || lat_min > lat_max {
            return None;
        }
        Some(Self {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        })
    }

    /// Build a bounding box from a `[lon_min, lat_min, lon_max, lat_max]` slice.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [a, b, c, d] => Self::new(*a, *b, *c, *d),
            _ => None,
        }
    }

    /// A degenerate box covering exactly one point.
    pub fn from_point(point: GeoPoint) -> Self {
        Self {
            lon_min: point.lon,
            lat_min: point.lat,
            lon_max: point.lon,
            lat_max: point.lat,
        }
    }

    /// Returns the four values in `lon_min, lat_min, lon_max, lat_max` order.
    pub fn as_array(&self) -> [f64; 4] {
        [self.lon_min, self.lat_min, self.lon_max, self.lat_max]
    }
}

impl fmt::Display for BoundingBox {
    /// Comma-separated `lon_min,lat_min,lon_max,lat_max`, the form both CMR
    /// and STAC accept in query strings.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.lon_min, self.lat_min, self.lon_max, self.lat_max
        )
    }
}

/// A single latitude/longitude position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Build a point, returning `None` outside the valid lat/lon ranges.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
            Some(Self { lat, lon })
        } else {
            None
        }
    }
}

/// A date range; either bound may be open.
///
/// Invariant: if both bounds are present, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalInterval {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl TemporalInterval {
    /// Build an interval, returning `None` if `start > end`.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<Self> {
        match (start, end) {
            (Some(s), Some(e)) if s > e => None,
            _ => Some(Self { start, end }),
        }
    }

    /// A closed interval `[start, end]`, `None` if `start > end`.
    pub fn closed(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        Self::new(Some(start), Some(end))
    }

    /// The interval with both bounds open.
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Returns `true` if neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// The smallest interval containing every interval in `intervals`.
    ///
    /// An open bound on any member makes that side of the envelope open.
    /// Returns `None` for an empty slice.
    pub fn envelope(intervals: &[TemporalInterval]) -> Option<Self> {
        let first = intervals.first()?;
        let mut start = first.start;
        let mut end = first.end;
        for interval in &intervals[1..] {
            start = match (start, interval.start) {
                (Some(a), Some(b)) => Some(a.min(b)),
                _ => None,
            };
            end = match (end, interval.end) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            };
        }
        Some(Self { start, end })
    }
}

/// Search parameters extracted from one free-text request.
///
/// Created once per request by the
/// [`SpatiotemporalExtractor`](crate::extractor::SpatiotemporalExtractor) and
/// not modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatiotemporalParams {
    /// The request text, trimmed.
    pub query: String,
    /// Keyword phrases in the order they appear.
    pub keywords: Vec<String>,
    /// A place name to be resolved by the geocoder.
    pub location: Option<String>,
    /// An explicit bounding box taken verbatim from the request.
    pub bbox: Option<BoundingBox>,
    /// An explicit coordinate pair taken from the request.
    pub point: Option<GeoPoint>,
    /// Disjoint temporal intervals; empty means unbounded time.
    pub intervals: Vec<TemporalInterval>,
    /// Requested number of results per source.
    pub limit: usize,
}

/// The kind of catalog a record came from.
///
/// Variant order is the canonical bucket order of a [`ResultSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    /// A CMR-style metadata repository.
    Cmr,
    /// A STAC-style catalog.
    Stac,
}

impl Source {
    /// Returns the display name of this source.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cmr => "CMR",
            Self::Stac => "STAC",
        }
    }

    /// Returns all sources in canonical order.
    pub fn all() -> &'static [Source] {
        &[Self::Cmr, Self::Stac]
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One query sent to one backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendQuery {
    /// Identifier of the backend this query is for.
    pub backend: String,
    /// Keyword phrases; an empty list means "match anything".
    pub keywords: Vec<String>,
    /// Spatial restriction; `None` means unrestricted.
    pub bbox: Option<BoundingBox>,
    /// Temporal restriction.
    pub interval: TemporalInterval,
    /// Maximum number of items to request.
    pub limit: usize,
}

/// A hyperlink attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub rel: String,
}

/// A backend-agnostic search result.
///
/// Missing optional fields are empty strings, never absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub source: Source,
    pub id: String,
    pub title: String,
    pub description: String,
    /// Primary link for the record (DOI, landing page or catalog URL).
    pub link: String,
    /// Every valid http(s) link the backend returned for the item.
    pub links: Vec<Link>,
}

/// Outcome of one backend task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum BackendStatus {
    Ok,
    TimedOut,
    Errored(String),
}

impl BackendStatus {
    /// Returns `true` for [`BackendStatus::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Errored(reason) => write!(f, "errored: {reason}"),
        }
    }
}

/// Per-backend annotation carried by a [`ResultSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendReport {
    pub backend: String,
    pub source: Source,
    pub status: BackendStatus,
    /// Records the backend contributed after normalization, before truncation.
    pub records: usize,
    /// Items skipped because they could not be normalized.
    pub skipped: usize,
    /// Interval queries that failed while the backend's others succeeded.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub failed_queries: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Merged, source-grouped dispatch output.
///
/// Records are ordered by [`Source`] bucket, each bucket holding at most the
/// per-source limit in backend relevance order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub records: Vec<ResultRecord>,
    /// One report per configured backend, in configuration order.
    pub reports: Vec<BackendReport>,
    /// The spatial restriction the backends were queried with.
    pub bbox: Option<BoundingBox>,
}

impl ResultSet {
    /// Records belonging to `source`, in order.
    pub fn records_for(&self, source: Source) -> Vec<&ResultRecord> {
        self.records.iter().filter(|r| r.source == source).collect()
    }

    /// Sources that contributed at least one record, in canonical order.
    pub fn sources(&self) -> Vec<Source> {
        Source::all()
            .iter()
            .copied()
            .filter(|s| self.records.iter().any(|r| r.source == *s))
            .collect()
    }

    /// Reports of backends that timed out or errored.
    pub fn failures(&self) -> impl Iterator<Item = &BackendReport> {
        self.reports.iter().filter(|r| !r.status.is_ok())
    }

    /// Reports of backends that answered but lost some interval queries.
    pub fn partial_failures(&self) -> impl Iterator<Item = &BackendReport> {
        self.reports
            .iter()
            .filter(|r| r.status.is_ok() && r.failed_queries > 0)
    }

    /// Returns `true` if no backend contributed a record.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
