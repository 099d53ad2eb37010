//! Spatial expression rules: explicit bounding boxes, coordinate pairs and
//! capitalised place names after a spatial preposition.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::Hit;
use crate::types::{BoundingBox, GeoPoint};

const NUM: &str = r"[-+]?\d{1,3}(?:\.\d+)?";

/// Words that look like place names but name a time.
const NON_PLACE_WORDS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep",
    "sept", "oct", "nov", "dec", "monday", "tuesday", "wednesday", "thursday", "friday",
    "saturday", "sunday", "spring", "summer", "autumn", "fall", "winter", "today", "yesterday",
];

/// What a location rule found.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// An explicit bounding box.
    BBox(BoundingBox),
    /// An explicit coordinate pair.
    Point(GeoPoint),
    /// A place name to geocode.
    Place(String),
    /// Something shaped like a bbox or point whose values are out of range or
    /// inverted. Carries the matched text.
    Invalid(String),
}

/// One class of spatial expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationRule {
    /// `bbox: -10, 35, 5, 45` or a bracketed four-number list.
    BBox,
    /// `lat 37.7, lon -122.4`, `37.7N 122.4W` or a bare decimal pair.
    Point,
    /// `over California`, `in the Gulf of Mexico`.
    PlaceName,
}

impl LocationRule {
    /// Coordinate rules in precedence order. They run before any temporal
    /// rule so that digits of a coordinate are never read as a year.
    pub const COORDINATES: &'static [LocationRule] = &[Self::BBox, Self::Point];

    pub fn name(&self) -> &'static str {
        match self {
            Self::BBox => "bbox",
            Self::Point => "point",
            Self::PlaceName => "place_name",
        }
    }

    /// Apply this rule to `text`, returning the first match.
    pub fn apply(&self, text: &str) -> Option<Hit<Location>> {
        match self {
            Self::BBox => bbox_patterns()
                .iter()
                .find_map(|p| p.captures(text))
                .and_then(|caps| bbox_hit(&caps)),
            Self::Point => point_hit(text),
            Self::PlaceName => place_hit(text),
        }
    }
}

fn compile(sources: Vec<String>) -> Vec<Regex> {
    sources.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

fn bbox_sources() -> Vec<String> {
    let four = format!(r"({NUM})\s*,\s*({NUM})\s*,\s*({NUM})\s*,\s*({NUM})");
    vec![
        format!(r"(?i)\b(?:bbox|bounding\s+box|bounds?)\s*[:=]?\s*[\[(]?\s*{four}\s*[\])]?"),
        format!(r"\[\s*{four}\s*\]"),
    ]
}

fn point_sources() -> Vec<String> {
    vec![
        format!(
            r"(?i)\b(?:lat|latitude)\s*[:=]?\s*(?P<lat>{NUM})\s*[,;]?\s*(?:lon|lng|long|longitude)\s*[:=]?\s*(?P<lon>{NUM})"
        ),
        format!(
            r"(?i)\b(?:lon|lng|long|longitude)\s*[:=]?\s*(?P<lon>{NUM})\s*[,;]?\s*(?:lat|latitude)\s*[:=]?\s*(?P<lat>{NUM})"
        ),
        r"(?i)\b(?P<lat>\d{1,2}(?:\.\d+)?)\s*°?\s*(?P<ns>[NS])\s*,?\s*(?P<lon>\d{1,3}(?:\.\d+)?)\s*°?\s*(?P<ew>[EW])\b"
            .to_string(),
        format!(r"(?:^|[\s(\[])(?P<lat>{NUM})\s*,\s*(?P<lon>{NUM})(?:$|[\s)\]])"),
    ]
}

fn place_source() -> String {
    let word = r"\p{Lu}[\p{L}\p{M}'\-]*";
    format!(
        r"\b(?i:in|over|at|near|around|across|within)\s+(?:(?i:the)\s+)?({word}(?:\s+(?:(?:of|de|del|da|do|la|le|du)\s+)?{word})*)"
    )
}

fn bbox_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| compile(bbox_sources()))
}

fn point_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| compile(point_sources()))
}

fn place_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(&place_source()).ok()).as_ref()
}

fn number(caps: &Captures<'_>, name: &str) -> Option<f64> {
    caps.name(name)?.as_str().parse().ok()
}

fn bbox_hit(caps: &Captures<'_>) -> Option<Hit<Location>> {
    let whole = caps.get(0)?;
    let values: Vec<f64> = (1..=4)
        .filter_map(|i| caps.get(i)?.as_str().parse().ok())
        .collect();
    let value = match BoundingBox::from_slice(&values) {
        Some(bbox) => Location::BBox(bbox),
        None => Location::Invalid(whole.as_str().to_string()),
    };
    Some(Hit {
        value,
        span: whole.range(),
    })
}

fn point_hit(text: &str) -> Option<Hit<Location>> {
    for (i, pattern) in point_patterns().iter().enumerate() {
        let bare_pair = i == point_patterns().len() - 1;
        for caps in pattern.captures_iter(text) {
            let (Some(lat_m), Some(lon_m)) = (caps.name("lat"), caps.name("lon")) else {
                continue;
            };
            // A bare pair needs a decimal point so "5, 10" is not read as a position.
            if bare_pair && !(lat_m.as_str().contains('.') || lon_m.as_str().contains('.')) {
                continue;
            }
            let (Some(mut lat), Some(mut lon)) = (number(&caps, "lat"), number(&caps, "lon")) else {
                continue;
            };
            if caps.name("ns").is_some_and(|m| m.as_str().eq_ignore_ascii_case("s")) {
                lat = -lat;
            }
            if caps.name("ew").is_some_and(|m| m.as_str().eq_ignore_ascii_case("w")) {
                lon = -lon;
            }
            let span = if bare_pair {
                lat_m.start()..lon_m.end()
            } else {
                let whole = caps.get(0)?;
                whole.range()
            };
            let value = match GeoPoint::new(lat, lon) {
                Some(point) => Location::Point(point),
                None => Location::Invalid(text[span.clone()].to_string()),
            };
            return Some(Hit { value, span });
        }
    }
    None
}

fn place_hit(text: &str) -> Option<Hit<Location>> {
    let pattern = place_pattern()?;
    for caps in pattern.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        // Cut the name at the first word that names a time ("in June", "over Summer").
        let mut end = name.start();
        for (offset, word) in word_spans(name.as_str()) {
            if is_non_place(word) {
                break;
            }
            end = name.start() + offset + word.len();
        }
        if end == name.start() {
            continue;
        }
        let place = trim_connectors(&text[name.start()..end]);
        if place.is_empty() {
            continue;
        }
        let span_end = name.start() + place.len();
        return Some(Hit {
            value: Location::Place(place.to_string()),
            span: whole.start()..span_end,
        });
    }
    None
}

fn word_spans(s: &str) -> impl Iterator<Item = (usize, &str)> {
    s.split_whitespace()
        .map(move |w| (w.as_ptr() as usize - s.as_ptr() as usize, w))
}

fn is_non_place(word: &str) -> bool {
    let lower = word.to_lowercase();
    NON_PLACE_WORDS.contains(&lower.as_str())
}

/// Drop a dangling lowercase connector left by truncation ("Gulf of").
fn trim_connectors(s: &str) -> &str {
    let mut out = s.trim_end();
    loop {
        let Some((head, last)) = out.rsplit_once(char::is_whitespace) else {
            return out;
        };
        if last.chars().next().is_some_and(char::is_lowercase) {
            out = head.trim_end();
        } else {
            return out;
        }
    }
}
