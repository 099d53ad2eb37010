//! Capability trait for catalog backends.
//!
//! The dispatcher depends only on [`CatalogBackend`]. Each backend kind (CMR,
//! STAC) provides one adapter in [`crate::backends`]; tests plug in mocks.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::{BackendQuery, Source};

/// A searchable geospatial catalog.
///
/// Implementors translate a [`BackendQuery`] into the catalog's native
/// request, and return the catalog's native items untouched, in the
/// catalog's own relevance order. Normalization happens in the dispatcher.
///
/// All implementations must be `Send + Sync` so that backends can be queried
/// concurrently from one dispatcher.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Unique identifier, used in reports and logs.
    fn id(&self) -> &str;

    /// The kind of records this backend produces.
    fn source(&self) -> Source;

    /// Catalog root URL, used for fallback record links.
    fn base_url(&self) -> Option<&str> {
        None
    }

    /// Run one query.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the request fails, the catalog rejects it
    /// or the response does not have the expected shape.
    async fn search(&self, query: &BackendQuery) -> Result<Vec<serde_json::Value>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TemporalInterval;
    use serde_json::json;
    use std::sync::Arc;

    /// A mock backend for testing trait bounds and async execution.
    struct MockBackend {
        items: Vec<serde_json::Value>,
    }

    #[async_trait]
    impl CatalogBackend for MockBackend {
        fn id(&self) -> &str {
            "mock"
        }

        fn source(&self) -> Source {
            Source::Stac
        }

        async fn search(&self, query: &BackendQuery) -> Result<Vec<serde_json::Value>, BackendError> {
            if self.items.is_empty() {
                return Err(BackendError::Http("mock backend failure".into()));
            }
            Ok(self.items.iter().take(query.limit).cloned().collect())
        }
    }

    fn query(limit: usize) -> BackendQuery {
        BackendQuery {
            backend: "mock".into(),
            keywords: vec!["landsat".into()],
            bbox: None,
            interval: TemporalInterval::unbounded(),
            limit,
        }
    }

    #[test]
    fn trait_object_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn CatalogBackend>();
    }

    #[tokio::test]
    async fn dyn_backend_returns_items() {
        let backend: Arc<dyn CatalogBackend> = Arc::new(MockBackend {
            items: vec![json!({"id": "a"}), json!({"id": "b"}), json!({"id": "c"})],
        });
        let items = backend.search(&query(2)).await.expect("should succeed");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "a");
        assert_eq!(backend.id(), "mock");
        assert_eq!(backend.source(), Source::Stac);
    }

    #[tokio::test]
    async fn dyn_backend_propagates_errors() {
        let backend: Arc<dyn CatalogBackend> = Arc::new(MockBackend { items: vec![] });
        let err = backend.search(&query(10)).await.unwrap_err();
        assert!(err.to_string().contains("mock backend failure"));
    }
}
