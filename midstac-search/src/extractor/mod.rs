//! Spatiotemporal extraction from free-text requests.
//!
//! Extraction runs in fixed phases over a working copy of the request:
//! coordinate rules (bbox, point), then temporal rules, then the place-name
//! rule, then the result-limit rule, then keyword extraction over whatever is
//! left. Each phase masks the text it
//! consumed so later phases never see it twice. Within a phase the first
//! rule that matches wins.
//!
//! Nothing here performs I/O. The current date comes from a [`Clock`] so that
//! relative expressions ("last 10 years") are deterministic under test.

pub mod keywords;
pub mod location;
pub mod periods;
pub mod temporal;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

use crate::config::ExtractorConfig;
use crate::error::ExtractionError;
use crate::types::{SpatiotemporalParams, TemporalInterval};
use location::{Location, LocationRule};
use periods::NamedPeriodTable;
use temporal::{TemporalContext, TemporalRule};

/// Replacement for consumed text. It is a single byte, so offsets stay
/// valid, and it is neither whitespace nor a word character.
const MASK: char = '\u{1F}';

/// Source of "today" for relative date expressions.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The system clock, in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock stuck on one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// A rule match: the resolved value and the byte span it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit<T> {
    pub value: T,
    pub span: Range<usize>,
}

/// The request text with consumed spans blanked out.
#[derive(Debug, Clone)]
struct MaskedText {
    text: String,
}

impl MaskedText {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    fn as_str(&self) -> &str {
        &self.text
    }

    fn mask(&mut self, span: Range<usize>) {
        let (Some(head), Some(tail)) = (self.text.get(..span.start), self.text.get(span.end..))
        else {
            return;
        };
        let blank: String = std::iter::repeat(MASK).take(span.end - span.start).collect();
        self.text = format!("{head}{blank}{tail}");
    }
}

fn limit_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| {
        [
            r"(?i)\b(?:top|first|limit(?:\s+to)?|max(?:imum)?(?:\s+of)?)\s+(\d{1,4})\b",
            r"(?i)\b(\d{1,4})\s+(?:results?|records?|items?|datasets?|collections?|granules?|scenes?)\b",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Find a result-limit phrase ("top 5", "20 results").
///
/// A limit of zero still consumes the phrase but yields `None`.
fn find_limit(text: &str) -> Option<Hit<Option<usize>>> {
    limit_patterns().iter().find_map(|pattern| {
        let caps = pattern.captures(text)?;
        let whole = caps.get(0)?;
        let value = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .filter(|n| *n > 0);
        Some(Hit {
            value,
            span: whole.range(),
        })
    })
}

/// Sort intervals by start and merge any that overlap, so the result is
/// disjoint and chronological.
fn coalesce(mut intervals: Vec<TemporalInterval>) -> Vec<TemporalInterval> {
    intervals.sort_by(|a, b| match (a.start, b.start) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    });
    let mut merged: Vec<TemporalInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        if let Some(last) = merged.last_mut() {
            let overlaps = match (last.end, interval.start) {
                (None, _) | (_, None) => true,
                (Some(end), Some(start)) => start <= end,
            };
            if overlaps {
                last.end = match (last.end, interval.end) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    _ => None,
                };
                continue;
            }
        }
        merged.push(interval);
    }
    merged
}

/// Turns free text into [`SpatiotemporalParams`].
#[derive(Debug, Clone)]
pub struct SpatiotemporalExtractor {
    default_limit: usize,
    periods: NamedPeriodTable,
}

impl SpatiotemporalExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            default_limit: config.default_limit.max(1),
            periods: NamedPeriodTable::with_extra(&config.extra_periods),
        }
    }

    /// The limit used when a request does not name one.
    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// The named-period table in use.
    pub fn periods(&self) -> &NamedPeriodTable {
        &self.periods
    }

    /// Extract search parameters from `text`.
    ///
    /// # Errors
    ///
    /// [`ExtractionError::EmptyInput`] for blank input and
    /// [`ExtractionError::NoKeywords`] when the text has no letter or digit.
    pub fn extract(
        &self,
        text: &str,
        clock: &dyn Clock,
    ) -> Result<SpatiotemporalParams, ExtractionError> {
        let query = text.trim();
        if query.is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        if !query.chars().any(char::is_alphanumeric) {
            return Err(ExtractionError::NoKeywords(query.to_string()));
        }

        let mut masked = MaskedText::new(query);
        let mut params = SpatiotemporalParams {
            query: query.to_string(),
            keywords: Vec::new(),
            location: None,
            bbox: None,
            point: None,
            intervals: Vec::new(),
            limit: self.default_limit,
        };

        'coordinates: for rule in LocationRule::COORDINATES {
            while let Some(hit) = rule.apply(masked.as_str()) {
                masked.mask(hit.span);
                match hit.value {
                    Location::BBox(bbox) => {
                        params.bbox = Some(bbox);
                        break 'coordinates;
                    }
                    Location::Point(point) => {
                        params.point = Some(point);
                        break 'coordinates;
                    }
                    Location::Invalid(raw) => {
                        tracing::warn!(rule = rule.name(), text = %raw, "ignoring out-of-range coordinates");
                    }
                    Location::Place(_) => break 'coordinates,
                }
            }
        }

        let ctx = TemporalContext {
            today: clock.today(),
            periods: &self.periods,
        };
        for rule in TemporalRule::ORDERED {
            if let Some(hit) = rule.apply(masked.as_str(), &ctx) {
                tracing::debug!(rule = rule.name(), intervals = hit.value.len(), "temporal match");
                params.intervals = coalesce(hit.value);
                masked.mask(hit.span);
                break;
            }
        }

        // The place phrase is always consumed; explicit coordinates still win.
        if let Some(hit) = LocationRule::PlaceName.apply(masked.as_str()) {
            masked.mask(hit.span);
            if let Location::Place(name) = hit.value {
                if params.bbox.is_none() && params.point.is_none() {
                    params.location = Some(name);
                } else {
                    tracing::debug!(place = %name, "explicit coordinates take precedence over place name");
                }
            }
        }

        if let Some(hit) = find_limit(masked.as_str()) {
            if let Some(limit) = hit.value {
                params.limit = limit;
            }
            masked.mask(hit.span);
        }

        params.keywords = keywords::extract_keywords(masked.as_str());
        if params.keywords.is_empty() {
            params.keywords.push(query.to_string());
        }

        tracing::debug!(
            keywords = ?params.keywords,
            location = ?params.location,
            bbox = ?params.bbox,
            point = ?params.point,
            intervals = params.intervals.len(),
            limit = params.limit,
            "extracted search parameters"
        );
        Ok(params)
    }
}

impl Default for SpatiotemporalExtractor {
    fn default() -> Self {
        Self::new(&ExtractorConfig::default())
    }
}

/// Extract with the default configuration.
pub fn extract(text: &str, clock: &dyn Clock) -> Result<SpatiotemporalParams, ExtractionError> {
    SpatiotemporalExtractor::default().extract(text, clock)
}
