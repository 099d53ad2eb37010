//! # midstac
//!
//! Command line front end for natural-language search across
//! Earth-observation catalogs. Extraction, dispatch and the catalog adapters
//! live in [`midstac_search`]; this crate adds the TOML configuration file,
//! logging setup and result presentation.

pub mod config;
pub mod error;
pub mod render;

pub use config::{LoggingConfig, MidstacConfig};
pub use error::{MidstacError, Result};

use midstac_search::{Dispatcher, ResultSet, SpatiotemporalExtractor, SystemClock};

/// Build the extractor and dispatcher described by `config`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn build_pipeline(config: &MidstacConfig) -> Result<(SpatiotemporalExtractor, Dispatcher)> {
    config.validate()?;
    let extractor = SpatiotemporalExtractor::new(&config.extractor);
    let dispatcher = Dispatcher::from_config(&config.dispatch, &config.geocoder)?;
    Ok((extractor, dispatcher))
}

/// Run one request through the configured pipeline, overriding the
/// extracted result limit with `limit` when given.
///
/// # Errors
///
/// Returns an error for invalid configuration or unusable request text.
pub async fn search(config: &MidstacConfig, text: &str, limit: Option<usize>) -> Result<ResultSet> {
    let (extractor, dispatcher) = build_pipeline(config)?;
    let Some(limit) = limit else {
        return Ok(midstac_search::handle_query(text, &extractor, &dispatcher, &SystemClock).await?);
    };
    let params = extractor
        .extract(text, &SystemClock)
        .map_err(midstac_search::SearchError::from)?;
    Ok(dispatcher.dispatch(&params, limit).await?)
}
