//! Integration tests for the extract → dispatch → merge pipeline.
//!
//! Catalogs are simulated either with in-process mock backends or with
//! wiremock servers speaking the CMR and STAC wire formats. No test here
//! touches the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use midstac_search::types::BackendQuery;
use midstac_search::{
    handle_query, BackendConfig, BackendError, BackendStatus, CatalogBackend, DispatchConfig,
    Dispatcher, ExtractionError, FixedClock, GeocoderConfig, SearchError, Source,
    SpatiotemporalExtractor, TemporalInterval,
};

const CALIFORNIA_QUERY: &str = "Find Landsat data over California from 2020 to 2021";

fn clock() -> FixedClock {
    FixedClock(NaiveDate::from_ymd_opt(2025, 11, 2).expect("valid date"))
}

/// Mock backend returning a fixed reply.
struct StaticBackend {
    id: &'static str,
    source: Source,
    reply: Result<Vec<Value>, BackendError>,
}

#[async_trait]
impl CatalogBackend for StaticBackend {
    fn id(&self) -> &str {
        self.id
    }

    fn source(&self) -> Source {
        self.source
    }

    async fn search(&self, _query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        self.reply.clone()
    }
}

fn backend(
    id: &'static str,
    source: Source,
    reply: Result<Vec<Value>, BackendError>,
) -> Arc<dyn CatalogBackend> {
    Arc::new(StaticBackend { id, source, reply })
}

fn stac_items(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({"id": format!("stac-{i}"), "title": format!("Collection {i}")}))
        .collect()
}

fn cmr_items(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "meta": {"concept-id": format!("C{i}-LPCLOUD")},
                "umm": {"EntryTitle": format!("Landsat collection {i}"), "Abstract": "Surface reflectance."}
            })
        })
        .collect()
}

fn dispatcher(backends: Vec<Arc<dyn CatalogBackend>>) -> Dispatcher {
    Dispatcher::new(&DispatchConfig::default(), backends).expect("dispatcher")
}

#[tokio::test]
async fn failing_backend_is_annotated_not_fatal() {
    let dispatcher = dispatcher(vec![
        backend(
            "cmr",
            Source::Cmr,
            Err(BackendError::Auth("HTTP 401: Token expired".into())),
        ),
        backend("stac:maap", Source::Stac, Ok(stac_items(3))),
    ]);

    let set = handle_query(
        CALIFORNIA_QUERY,
        &SpatiotemporalExtractor::default(),
        &dispatcher,
        &clock(),
    )
    .await
    .expect("partial failure is not an error");

    assert_eq!(set.records_for(Source::Stac).len(), 3);
    assert!(set.records_for(Source::Cmr).is_empty());
    let failures: Vec<_> = set.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].backend, "cmr");
    match &failures[0].status {
        BackendStatus::Errored(reason) => assert!(reason.contains("authentication failed")),
        other => panic!("expected errored status, got {other:?}"),
    }
}

#[tokio::test]
async fn every_source_respects_per_source_limit() {
    let dispatcher = dispatcher(vec![
        backend("cmr", Source::Cmr, Ok(cmr_items(25))),
        backend("stac:maap", Source::Stac, Ok(stac_items(7))),
        backend("stac:es", Source::Stac, Ok(stac_items(14))),
    ]);

    let params = SpatiotemporalExtractor::default()
        .extract("sea surface temperature top 50", &clock())
        .expect("extract");
    assert_eq!(params.limit, 50);

    let set = dispatcher.dispatch(&params, params.limit).await.expect("dispatch");
    for source in Source::all() {
        assert!(set.records_for(*source).len() <= 10);
    }
    assert_eq!(set.records_for(Source::Cmr).len(), 10);
    // Both STAC catalogs share one bucket: 14 distinct ids, cut to 10.
    assert_eq!(set.records_for(Source::Stac).len(), 10);
}

#[tokio::test]
async fn two_empty_backends_give_empty_result() {
    let dispatcher = dispatcher(vec![
        backend("cmr", Source::Cmr, Ok(vec![])),
        backend("stac:maap", Source::Stac, Ok(vec![])),
    ]);
    let set = handle_query(
        "ocean color",
        &SpatiotemporalExtractor::default(),
        &dispatcher,
        &clock(),
    )
    .await
    .expect("dispatch");
    assert!(set.is_empty());
    assert_eq!(set.failures().count(), 0);
}

#[tokio::test]
async fn empty_input_is_rejected_before_dispatch() {
    let dispatcher = dispatcher(vec![backend(
        "cmr",
        Source::Cmr,
        Err(BackendError::Http("must not be called".into())),
    )]);
    let err = handle_query("", &SpatiotemporalExtractor::default(), &dispatcher, &clock())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::Extraction(ExtractionError::EmptyInput)
    ));
}

#[tokio::test]
async fn end_to_end_against_mock_catalogs() {
    let cmr = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/collections.umm_json"))
        .and(query_param("keyword", "Landsat"))
        .and(query_param("page_size", "10"))
        .and(query_param(
            "temporal[]",
            "2020-01-01T00:00:00Z,2021-12-31T23:59:59Z",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": 12,
            "items": cmr_items(12)
        })))
        .expect(1)
        .mount(&cmr)
        .await;

    let stac = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .and(query_param("q", "Landsat"))
        .and(query_param(
            "datetime",
            "2020-01-01T00:00:00Z/2021-12-31T23:59:59Z",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collections": stac_items(4)
        })))
        .expect(1)
        .mount(&stac)
        .await;

    let config = DispatchConfig {
        backends: vec![
            BackendConfig::Cmr {
                name: "cmr".into(),
                base_url: cmr.uri(),
                token: None,
            },
            BackendConfig::stac("stac:mock", stac.uri()),
        ],
        backend_timeout_seconds: 5,
        dispatch_timeout_seconds: 10,
        ..Default::default()
    };
    let dispatcher =
        Dispatcher::from_config(&config, &GeocoderConfig::default()).expect("dispatcher");

    let extractor = SpatiotemporalExtractor::default();
    let params = extractor.extract(CALIFORNIA_QUERY, &clock()).expect("extract");
    assert_eq!(params.keywords, vec!["Landsat"]);
    assert_eq!(params.location.as_deref(), Some("California"));
    assert_eq!(
        params.intervals,
        vec![TemporalInterval::closed(
            NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid"),
            NaiveDate::from_ymd_opt(2021, 12, 31).expect("valid"),
        )
        .expect("valid")]
    );

    let set = handle_query(CALIFORNIA_QUERY, &extractor, &dispatcher, &clock())
        .await
        .expect("handle_query");

    // No geocoder configured: the place name does not restrict the query.
    assert_eq!(set.bbox, None);
    assert_eq!(set.records_for(Source::Cmr).len(), 10);
    assert_eq!(set.records_for(Source::Stac).len(), 4);
    assert!(set
        .records
        .iter()
        .take(10)
        .all(|r| r.source == Source::Cmr));
    assert_eq!(set.sources(), vec![Source::Cmr, Source::Stac]);
    assert_eq!(set.failures().count(), 0);
    // Records without DOI or links point at the configured CMR, not the public one.
    assert_eq!(
        set.records[0].link,
        format!("{}/search/concepts/C0-LPCLOUD.html", cmr.uri())
    );
}

#[tokio::test]
async fn geocoded_place_restricts_every_backend() {
    let geocoder = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/geocode/search"))
        .and(query_param("text", "Gulf of Mexico"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [{"bbox": [-98.0, 18.0, -80.5, 31.0], "properties": {}}]
        })))
        .expect(1)
        .mount(&geocoder)
        .await;

    let stac = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .and(query_param("bbox", "-98,18,-80.5,31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collections": stac_items(2)
        })))
        // One request per summer.
        .expect(10)
        .mount(&stac)
        .await;

    let config = DispatchConfig {
        backends: vec![BackendConfig::stac("stac:mock", stac.uri())],
        backend_timeout_seconds: 5,
        dispatch_timeout_seconds: 10,
        ..Default::default()
    };
    let geocoder_config = GeocoderConfig {
        base_url: geocoder.uri(),
        api_key: Some("test-key".into()),
        ..Default::default()
    };
    let dispatcher = Dispatcher::from_config(&config, &geocoder_config).expect("dispatcher");

    let set = handle_query(
        "sea surface temperature in the Gulf of Mexico over the last 10 summers",
        &SpatiotemporalExtractor::default(),
        &dispatcher,
        &clock(),
    )
    .await
    .expect("handle_query");

    assert_eq!(
        set.bbox.map(|b| b.as_array()),
        Some([-98.0, 18.0, -80.5, 31.0])
    );
    // Same two ids every summer, kept once.
    assert_eq!(set.records.len(), 2);
}

#[tokio::test]
async fn unreachable_catalog_times_out_without_blocking_others() {
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"collections": []}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&slow)
        .await;

    let fast = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collections": stac_items(1)
        })))
        .mount(&fast)
        .await;

    let config = DispatchConfig {
        backends: vec![
            BackendConfig::stac("stac:slow", slow.uri()),
            BackendConfig::stac("stac:fast", fast.uri()),
        ],
        backend_timeout_seconds: 1,
        dispatch_timeout_seconds: 2,
        ..Default::default()
    };
    let dispatcher =
        Dispatcher::from_config(&config, &GeocoderConfig::default()).expect("dispatcher");

    let params = SpatiotemporalExtractor::default()
        .extract("biomass", &clock())
        .expect("extract");
    let set = dispatcher.dispatch(&params, 10).await.expect("dispatch");

    assert_eq!(set.reports[0].status, BackendStatus::TimedOut);
    assert_eq!(set.reports[1].status, BackendStatus::Ok);
    assert_eq!(set.records.len(), 1);
}
