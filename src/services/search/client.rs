use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::types::{SearchError, SearchRequest, SearchResponse};

/// Anything that can run a search descriptor and yield exactly one
/// response or one failure per call.
#[async_trait]
pub trait QuerySource: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError>;
}

/// Search REST API client
pub struct HttpSearchClient {
    client: Client,
    base_url: String,
}

impl HttpSearchClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn search_url(&self) -> String {
        format!("{}/api/v1/search/search", self.base_url)
    }
}

#[async_trait]
impl QuerySource for HttpSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let response = self
            .client
            .post(self.search_url())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))
    }
}
