use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sort direction understood by the search backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SortField {
    pub sort_field: String,
    pub sort_order: SortOrder,
}

/// Query descriptor sent to the search backend.
/// The poller treats it as opaque and only forwards it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub indices: Vec<String>,
    pub query: String,
    pub from: u64,
    pub size: u64,
    #[serde(default)]
    pub sort: Vec<SortField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet_fields: Option<Vec<String>>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            indices: Vec::new(),
            query: "*".to_string(),
            from: 0,
            size: 25,
            sort: vec![SortField {
                sort_field: "timestamp".to_string(),
                sort_order: SortOrder::Desc,
            }],
            fields: None,
            facet_fields: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: String,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub source: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub total: u64,
    #[serde(default)]
    pub results: Vec<SearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet_counts: Option<HashMap<String, HashMap<String, u64>>>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Search backend timed out")]
    Timeout,
    #[error("Search backend returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_decode() {
            SearchError::Parse(e.to_string())
        } else {
            SearchError::Network(e.to_string())
        }
    }
}
