use std::sync::{Arc, PoisonError, RwLock};

use super::types::SearchRequest;

/// Holds the current query descriptor.
///
/// The console edits the descriptor (filters, paging, sort) while the poller
/// only reads it at issue time, so clones share the same descriptor.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    request: Arc<RwLock<SearchRequest>>,
}

impl QueryBuilder {
    pub fn new(request: SearchRequest) -> Self {
        Self {
            request: Arc::new(RwLock::new(request)),
        }
    }

    /// Snapshot of the descriptor to issue right now
    pub fn search_request(&self) -> SearchRequest {
        self.request
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_search_request(&self, request: SearchRequest) {
        *self.request.write().unwrap_or_else(PoisonError::into_inner) = request;
    }

    pub fn set_query(&self, query: impl Into<String>) {
        self.request
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .query = query.into();
    }
}
