use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::api::{ApiClient, RequestContext, RequestOptions};
use crate::models::{FetchPage, FetchParams};
use crate::query::QueryParams;
use crate::result::ApiResult;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("request failed with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("{0}")]
    Other(String),
}

/// Fetch function behind a selection field.
#[async_trait]
pub trait OptionSource<T>: Send + Sync {
    async fn fetch_options(&self, params: FetchParams) -> Result<FetchPage<T>, SourceError>;
}

/// Accepts a page either bare or wrapped in a `data` field
#[derive(Deserialize)]
#[serde(untagged)]
enum PageBody<T> {
    Bare(FetchPage<T>),
    Wrapped { data: FetchPage<T> },
}

/// Option source backed by a paginated GET endpoint.
pub struct RemoteOptionSource {
    client: Arc<ApiClient>,
    endpoint: String,
    context: RequestContext,
    options: RequestOptions,
}

impl RemoteOptionSource {
    pub fn new(client: Arc<ApiClient>, endpoint: impl Into<String>, context: RequestContext) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            context,
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    fn endpoint_for(&self, params: &FetchParams) -> String {
        let query: QueryParams = params.to_pairs().into_iter().collect();
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.endpoint, separator, query.to_query_string())
    }
}

#[async_trait]
impl<T> OptionSource<T> for RemoteOptionSource
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch_options(&self, params: FetchParams) -> Result<FetchPage<T>, SourceError> {
        let endpoint = self.endpoint_for(&params);
        match self
            .client
            .get(&endpoint, &self.context, &self.options)
            .await
        {
            ApiResult::Success(success) => serde_json::from_value::<PageBody<T>>(success.data)
                .map(|body| match body {
                    PageBody::Bare(page) | PageBody::Wrapped { data: page } => page,
                })
                .map_err(|e| SourceError::Other(format!("Malformed option page: {}", e))),
            ApiResult::Failure(failure) => Err(SourceError::Api {
                status: failure.status,
                message: failure.error,
            }),
        }
    }
}
