//! Request envelope: one outbound call in, one [`ApiResult`] out.

use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT_LANGUAGE, AUTHORIZATION, CACHE_CONTROL,
    CONTENT_TYPE,
};
use reqwest::multipart::Form;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::messages::{GenericMessage, MessageCatalog};
use crate::result::{
    ApiFailure, ApiResult, ApiSuccess, TRANSPORT_ERROR_CODE, UNEXPECTED_RESPONSE_CODE,
};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_AUTH_PATH_PREFIX: &str = "/auth";
pub const DEFAULT_LOCALE: &str = "en";
pub const CACHE_TAGS_HEADER: &str = "x-cache-tags";

const SUCCESS_MESSAGE: &str = "Success";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Endpoints under this prefix are exempt from 401 interception
    pub auth_path_prefix: String,
    pub messages: MessageCatalog,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auth_path_prefix: DEFAULT_AUTH_PATH_PREFIX.to_string(),
            messages: MessageCatalog::default(),
        }
    }
}

/// Locale and session token for the current user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub locale: String,
    pub token: Option<String>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            token: None,
        }
    }
}

impl RequestContext {
    pub fn new(locale: impl Into<String>, token: Option<String>) -> Self {
        Self {
            locale: locale.into(),
            token,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request payload. Multipart forms are handed to the transport untouched.
#[derive(Debug)]
pub enum RequestBody {
    Json(Value),
    Multipart(Form),
}

impl RequestBody {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Json)
    }

    fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

/// Caching directive forwarded to the transport as `Cache-Control`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDirective {
    NoStore,
    NoCache,
    ForceCache,
    Revalidate(u64),
}

impl CacheDirective {
    fn header_value(&self) -> String {
        match self {
            Self::NoStore => "no-store".to_string(),
            Self::NoCache => "no-cache".to_string(),
            Self::ForceCache => "max-stale".to_string(),
            Self::Revalidate(secs) => format!("max-age={}", secs),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Omit the bearer token and let 401 responses through unchanged
    pub skip_auth: bool,
    /// Extra headers; an explicit `Authorization` or `Accept-Language` here wins
    pub headers: Vec<(String, String)>,
    pub cache: Option<CacheDirective>,
    pub tags: Vec<String>,
}

impl RequestOptions {
    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn cache(mut self, cache: CacheDirective) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
    #[error("Invalid base URL: {0}")]
    BaseUrl(String),
}

pub struct ApiClient {
    http: Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
            return Err(ClientError::BaseUrl(config.base_url));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        debug!(
            "Initializing API client: url={}, timeout={}s",
            config.base_url, config.timeout_secs
        );

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute a request and classify whatever comes back.
    ///
    /// Never fails: transport errors become a `Failure` with status 500.
    pub async fn execute(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<RequestBody>,
        ctx: &RequestContext,
        options: &RequestOptions,
    ) -> ApiResult<Value> {
        let url = self.url(endpoint);
        let multipart = body.as_ref().is_some_and(RequestBody::is_multipart);
        let headers = build_headers(ctx, options, multipart);

        debug!("{:?} {}", method, url);

        let mut request = self.http.request(method.into(), &url).headers(headers);
        request = match body {
            Some(RequestBody::Json(value)) => request.body(value.to_string()),
            Some(RequestBody::Multipart(form)) => request.multipart(form),
            None => request,
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return self.transport_failure(&url, e),
        };

        let status = response.status().as_u16();
        let intercept_unauthorized = !options.skip_auth && !self.is_auth_path(endpoint);

        if status == 401 && intercept_unauthorized {
            warn!("Unauthorized response from {}", url);
            return ApiResult::Failure(ApiFailure::new(
                self.config.messages.text(GenericMessage::Unauthorized),
                401,
            ));
        }

        match response.bytes().await {
            Ok(bytes) => classify_response(status, &bytes, &self.config.messages),
            Err(e) => self.transport_failure(&url, e),
        }
    }

    /// Like [`ApiClient::execute`], with the success body deserialized into `T`
    pub async fn execute_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<RequestBody>,
        ctx: &RequestContext,
        options: &RequestOptions,
    ) -> ApiResult<T> {
        match self.execute(endpoint, method, body, ctx, options).await {
            ApiResult::Success(success) => match serde_json::from_value::<T>(success.data) {
                Ok(data) => ApiResult::Success(ApiSuccess {
                    data,
                    meta: success.meta,
                    message: success.message,
                    status: success.status,
                }),
                Err(e) => {
                    warn!("Response from {} did not match expected shape: {}", endpoint, e);
                    ApiResult::Failure(
                        ApiFailure::new(
                            self.config.messages.text(GenericMessage::Unexpected),
                            success.status,
                        )
                        .with_code(UNEXPECTED_RESPONSE_CODE)
                        .with_details(json!(e.to_string())),
                    )
                }
            },
            ApiResult::Failure(failure) => ApiResult::Failure(failure),
        }
    }

    pub async fn get(
        &self,
        endpoint: &str,
        ctx: &RequestContext,
        options: &RequestOptions,
    ) -> ApiResult<Value> {
        self.execute(endpoint, Method::Get, None, ctx, options).await
    }

    pub async fn post(
        &self,
        endpoint: &str,
        body: RequestBody,
        ctx: &RequestContext,
        options: &RequestOptions,
    ) -> ApiResult<Value> {
        self.execute(endpoint, Method::Post, Some(body), ctx, options)
            .await
    }

    pub async fn put(
        &self,
        endpoint: &str,
        body: RequestBody,
        ctx: &RequestContext,
        options: &RequestOptions,
    ) -> ApiResult<Value> {
        self.execute(endpoint, Method::Put, Some(body), ctx, options)
            .await
    }

    pub async fn patch(
        &self,
        endpoint: &str,
        body: RequestBody,
        ctx: &RequestContext,
        options: &RequestOptions,
    ) -> ApiResult<Value> {
        self.execute(endpoint, Method::Patch, Some(body), ctx, options)
            .await
    }

    pub async fn delete(
        &self,
        endpoint: &str,
        ctx: &RequestContext,
        options: &RequestOptions,
    ) -> ApiResult<Value> {
        self.execute(endpoint, Method::Delete, None, ctx, options)
            .await
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn is_auth_path(&self, endpoint: &str) -> bool {
        let prefix = self.config.auth_path_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return false;
        }
        let path = endpoint
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or(endpoint);
        let path = format!("/{}", path.trim_start_matches('/'));
        path == prefix || path.starts_with(&format!("{}/", prefix))
    }

    fn transport_failure(&self, url: &str, error: reqwest::Error) -> ApiResult<Value> {
        warn!("Request to {} failed: {}", url, error);
        let message = error.to_string();
        let message = if message.is_empty() {
            self.config.messages.text(GenericMessage::Network)
        } else {
            message
        };
        ApiResult::Failure(ApiFailure::new(message, 500).with_code(TRANSPORT_ERROR_CODE))
    }
}

fn build_headers(ctx: &RequestContext, options: &RequestOptions, multipart: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if !multipart {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    if !options.skip_auth {
        if let Some(token) = ctx.token.as_deref().filter(|t| !t.is_empty()) {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Session token contains invalid header characters, skipping"),
            }
        }
    }

    match HeaderValue::from_str(&ctx.locale) {
        Ok(value) => {
            headers.insert(ACCEPT_LANGUAGE, value);
        }
        Err(_) => warn!("Invalid locale {:?}, skipping Accept-Language", ctx.locale),
    }

    if let Some(cache) = options.cache {
        if let Ok(value) = HeaderValue::from_str(&cache.header_value()) {
            headers.insert(CACHE_CONTROL, value);
        }
    }

    if !options.tags.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&options.tags.join(",")) {
            headers.insert(HeaderName::from_static(CACHE_TAGS_HEADER), value);
        }
    }

    for (name, value) in &options.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("Skipping invalid header {:?}", name),
        }
    }

    headers
}

/// Turn a received status and body into an [`ApiResult`].
///
/// 401 interception happens before this, since it depends on the endpoint.
pub fn classify_response(status: u16, body: &[u8], messages: &MessageCatalog) -> ApiResult<Value> {
    let ok = (200..300).contains(&status);

    if body.is_empty() || status == 204 {
        if ok {
            return ApiResult::Success(ApiSuccess {
                data: json!({}),
                meta: None,
                message: SUCCESS_MESSAGE.to_string(),
                status,
            });
        }
        // An empty error body is still a failure for its status, never an
        // empty success; only 2xx statuses take the empty-success path.
        return ApiResult::Failure(ApiFailure::new(
            messages.text(GenericMessage::for_status(status)),
            status,
        ));
    }

    let parsed: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) if ok => {
            warn!("Could not parse OK response body: {}", e);
            return ApiResult::Failure(
                ApiFailure::new(messages.text(GenericMessage::Unexpected), status)
                    .with_code(UNEXPECTED_RESPONSE_CODE),
            );
        }
        Err(_) => {
            return ApiResult::Failure(ApiFailure::new(
                messages.text(GenericMessage::for_status(status)),
                status,
            ));
        }
    };

    if !ok {
        return ApiResult::Failure(extract_failure(status, &parsed, messages));
    }

    let meta = parsed.get("meta").filter(|m| !m.is_null()).cloned();
    let message = parsed
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(SUCCESS_MESSAGE)
        .to_string();

    ApiResult::Success(ApiSuccess {
        data: parsed,
        meta,
        message,
        status,
    })
}

fn extract_failure(status: u16, body: &Value, messages: &MessageCatalog) -> ApiFailure {
    let nested = body.get("error").filter(|e| e.is_object());

    let error = nested
        .and_then(|e| join_message(e.get("message")))
        .or_else(|| join_message(body.get("message")))
        .or_else(|| {
            body.get("error")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| messages.text(GenericMessage::for_status(status)));

    let field = |name: &str| {
        nested
            .and_then(|e| e.get(name))
            .or_else(|| body.get(name))
            .filter(|v| !v.is_null())
            .cloned()
    };

    ApiFailure {
        error,
        status,
        code: field("code").map(|code| match code {
            Value::String(s) => s,
            other => other.to_string(),
        }),
        details: field("details"),
        data: field("data"),
        validation_errors: field("validationErrors"),
    }
}

fn join_message(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(parts) => {
            let parts: Vec<String> = parts
                .iter()
                .filter_map(|p| match p {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" | "))
            }
        }
        _ => None,
    }
}
