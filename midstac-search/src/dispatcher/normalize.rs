//! Mapping from backend-native items to [`ResultRecord`].
//!
//! Order-preserving: [`normalize_batch`] keeps the backend's item order and
//! only drops items that cannot be mapped.

use serde_json::Value;
use url::Url;

use crate::config::NASA_CMR_URL;
use crate::error::MergeError;
use crate::types::{Link, ResultRecord, Source};

/// Longest description kept, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

const DOI_RESOLVER: &str = "https://doi.org/";

/// Map one raw item from a backend of kind `source`.
///
/// Missing optional fields become empty strings.
///
/// # Errors
///
/// [`MergeError::NotAnObject`] if the item is not a JSON object and
/// [`MergeError::MissingField`] if it has no usable identifier.
pub fn normalize(raw: &Value, source: Source) -> Result<ResultRecord, MergeError> {
    normalize_from(raw, source, None)
}

/// Like [`normalize`], with CMR concept-page fallback links built on
/// `catalog_url` instead of the public NASA CMR.
///
/// # Errors
///
/// As for [`normalize`].
pub fn normalize_from(
    raw: &Value,
    source: Source,
    catalog_url: Option<&str>,
) -> Result<ResultRecord, MergeError> {
    if !raw.is_object() {
        return Err(MergeError::NotAnObject);
    }
    match source {
        Source::Cmr => normalize_cmr(raw, catalog_url.unwrap_or(NASA_CMR_URL)),
        Source::Stac => normalize_stac(raw),
    }
}

/// Normalize a backend's whole response, returning the records in order and
/// the number of items skipped. `catalog_url` is the backend's base URL.
pub fn normalize_batch(
    items: &[Value],
    source: Source,
    catalog_url: Option<&str>,
) -> (Vec<ResultRecord>, usize) {
    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for (index, item) in items.iter().enumerate() {
        match normalize_from(item, source, catalog_url) {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::debug!(%source, index, error = %err, "skipping item");
                skipped += 1;
            }
        }
    }
    (records, skipped)
}

fn normalize_cmr(raw: &Value, catalog_url: &str) -> Result<ResultRecord, MergeError> {
    let id = str_at(raw, &["/meta/concept-id"]).ok_or(MergeError::MissingField("meta.concept-id"))?;
    let title = str_at(raw, &["/umm/EntryTitle", "/umm/ShortName"]).unwrap_or_default();
    let description = truncate(str_at(raw, &["/umm/Abstract"]).unwrap_or_default());

    let links: Vec<Link> = raw
        .pointer("/umm/RelatedUrls")
        .and_then(Value::as_array)
        .map(|urls| {
            urls.iter()
                .filter_map(|u| {
                    let url = u.get("URL").and_then(Value::as_str)?;
                    let rel = u.get("Type").and_then(Value::as_str).unwrap_or("related");
                    make_link(url, rel)
                })
                .collect()
        })
        .unwrap_or_default();

    let link = str_at(raw, &["/umm/DOI/DOI"])
        .and_then(|doi| doi_url(&doi))
        .or_else(|| {
            links
                .iter()
                .find(|l| l.rel.eq_ignore_ascii_case("DATA SET LANDING PAGE"))
                .map(|l| l.url.clone())
        })
        .or_else(|| links.first().map(|l| l.url.clone()))
        .unwrap_or_else(|| {
            format!("{}/search/concepts/{id}.html", catalog_url.trim_end_matches('/'))
        });

    Ok(ResultRecord {
        source: Source::Cmr,
        id,
        title,
        description,
        link,
        links,
    })
}

fn normalize_stac(raw: &Value) -> Result<ResultRecord, MergeError> {
    let id = str_at(raw, &["/id"]).ok_or(MergeError::MissingField("id"))?;
    let title = str_at(raw, &["/title", "/properties/title"]).unwrap_or_default();
    let description =
        truncate(str_at(raw, &["/description", "/properties/description"]).unwrap_or_default());

    let links: Vec<Link> = raw
        .get("links")
        .and_then(Value::as_array)
        .map(|links| {
            links
                .iter()
                .filter_map(|l| {
                    let href = l.get("href").and_then(Value::as_str)?;
                    let rel = l.get("rel").and_then(Value::as_str).unwrap_or("related");
                    make_link(href, rel)
                })
                .collect()
        })
        .unwrap_or_default();

    let link = raw
        .get("sci:doi")
        .or_else(|| raw.pointer("/properties/sci:doi"))
        .and_then(Value::as_str)
        .and_then(doi_url)
        .or_else(|| links.iter().find(|l| l.rel == "self").map(|l| l.url.clone()))
        .or_else(|| links.first().map(|l| l.url.clone()))
        .unwrap_or_default();

    Ok(ResultRecord {
        source: Source::Stac,
        id,
        title,
        description,
        link,
        links,
    })
}

/// First non-empty string found at any of `pointers`, trimmed.
fn str_at(raw: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| raw.pointer(p).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_DESCRIPTION_CHARS {
        text
    } else {
        text.chars().take(MAX_DESCRIPTION_CHARS).collect()
    }
}

/// Returns `true` for absolute http(s) URLs with a host.
pub fn is_valid_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

fn make_link(url: &str, rel: &str) -> Option<Link> {
    let url = url.trim();
    is_valid_url(url).then(|| Link {
        url: url.to_string(),
        rel: rel.to_string(),
    })
}

fn doi_url(doi: &str) -> Option<String> {
    let doi = doi.trim();
    if doi.is_empty() || doi.eq_ignore_ascii_case("unavailable") {
        return None;
    }
    if is_valid_url(doi) {
        return Some(doi.to_string());
    }
    Some(format!("{DOI_RESOLVER}{}", doi.trim_start_matches("doi:")))
}
