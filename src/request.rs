//! Per-request configuration: headers, query parameters, expected statuses
//! and the request body.

use crate::{Error, Result};
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use url::Url;

pub(crate) const CONTENT_TYPE_TEXT: &str = "text/plain";
pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";
pub(crate) const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Produces a fresh transport body for one send attempt.
pub type BodyFactory = Arc<dyn Fn() -> reqwest::Body + Send + Sync>;

/// The payload of a request.
///
/// Every variant can be turned into a new transport body any number of
/// times, so a request that is retried after a `Retry-After` response sends
/// the same bytes again.
#[derive(Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A raw string, sent byte for byte.
    Text(String),
    /// A value already serialized to JSON.
    Json(Bytes),
    /// Raw bytes.
    Bytes(Bytes),
    /// A streamed body of known length. `factory` is called once per attempt.
    Stream {
        /// Number of bytes the stream yields; sent as `Content-Length`.
        length: u64,
        /// Builds the body for each attempt.
        factory: BodyFactory,
    },
}

impl RequestBody {
    /// Serializes `value` to JSON.
    ///
    /// # Errors
    ///
    /// Returns an `Unspecified` error if serialization fails.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(value).map_err(|e| {
            Error::unspecified("failed marshalling the request body").with_cause(e)
        })?;
        Ok(RequestBody::Json(Bytes::from(bytes)))
    }

    /// Creates a streamed body of `length` bytes.
    pub fn stream<F>(length: u64, factory: F) -> Self
    where
        F: Fn() -> reqwest::Body + Send + Sync + 'static,
    {
        RequestBody::Stream {
            length,
            factory: Arc::new(factory),
        }
    }

    /// Returns `true` if there is nothing to send.
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Text(text) => text.is_empty(),
            RequestBody::Json(bytes) | RequestBody::Bytes(bytes) => bytes.is_empty(),
            RequestBody::Stream { length, .. } => *length == 0,
        }
    }

    /// The number of bytes that will be sent.
    pub fn len(&self) -> u64 {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Text(text) => text.len() as u64,
            RequestBody::Json(bytes) | RequestBody::Bytes(bytes) => bytes.len() as u64,
            RequestBody::Stream { length, .. } => *length,
        }
    }

    /// Builds a new transport body for one attempt.
    pub(crate) fn to_transport(&self) -> Option<reqwest::Body> {
        if self.is_empty() {
            return None;
        }
        match self {
            RequestBody::Empty => None,
            RequestBody::Text(text) => Some(reqwest::Body::from(text.clone())),
            RequestBody::Json(bytes) | RequestBody::Bytes(bytes) => {
                Some(reqwest::Body::from(bytes.clone()))
            }
            RequestBody::Stream { factory, .. } => Some(factory()),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            RequestBody::Json(bytes) => f.debug_tuple("Json").field(bytes).finish(),
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            RequestBody::Stream { length, .. } => {
                f.debug_struct("Stream").field("length", length).finish()
            }
        }
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(bytes))
    }
}

/// Configuration for a single request.
///
/// # Examples
///
/// ```
/// use courier::RequestData;
/// use http::StatusCode;
///
/// # fn example() -> Result<(), courier::Error> {
/// let request = RequestData::new()
///     .with_header("X-Auth-Token", "secret")?
///     .with_query_param("limit", "10")
///     .expect_status(StatusCode::CREATED)
///     .with_json(&serde_json::json!({ "name": "x" }))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestData {
    /// Additional headers for this request.
    pub headers: HeaderMap,

    /// Query parameters, appended to the URL in order.
    pub query_params: Vec<(String, String)>,

    /// Statuses that count as success. Empty means `200 OK` only.
    pub expected_status: Vec<StatusCode>,

    /// The request payload.
    pub body: RequestBody,
}

impl RequestData {
    /// Creates an empty `RequestData`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref()).map_err(|e| {
            Error::unspecified(format!("Invalid header name: {}", name.as_ref())).with_cause(e)
        })?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::unspecified("Invalid header value").with_cause(e))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Adds multiple query parameters to the request.
    pub fn with_query_params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query_params.extend(params);
        self
    }

    /// Adds `status` to the set of statuses treated as success.
    pub fn expect_status(mut self, status: StatusCode) -> Self {
        self.expected_status.push(status);
        self
    }

    /// Replaces the set of statuses treated as success.
    pub fn with_expected_status(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.expected_status = statuses.into_iter().collect();
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` to JSON and uses it as the request body.
    ///
    /// # Errors
    ///
    /// Returns an `Unspecified` error if serialization fails.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = RequestBody::json(value)?;
        Ok(self)
    }

    /// Returns `true` if `status` is one of the expected statuses.
    pub fn accepts(&self, status: StatusCode) -> bool {
        if self.expected_status.is_empty() {
            status == StatusCode::OK
        } else {
            self.expected_status.contains(&status)
        }
    }

    /// Resolves `url` against `base` and appends the query parameters.
    pub(crate) fn resolve_url(&self, base: Option<&Url>, url: &str) -> Result<Url> {
        let parsed = match base {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        let mut url = parsed.map_err(|e| {
            Error::unspecified(format!("failed creating the request {}", url)).with_cause(e)
        })?;
        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// Merges client and request headers, then fills in `Content-Type`, `Accept`
/// and `User-Agent` where neither set them.
pub(crate) fn build_headers(
    defaults: &HeaderMap,
    extra: &HeaderMap,
    content_type: &'static str,
    agent: &HeaderValue,
) -> HeaderMap {
    let mut headers = defaults.clone();
    headers.extend(extra.clone());

    let content_type = HeaderValue::from_static(content_type);
    headers
        .entry(CONTENT_TYPE)
        .or_insert_with(|| content_type.clone());
    headers.entry(ACCEPT).or_insert(content_type);
    headers.entry(USER_AGENT).or_insert_with(|| agent.clone());
    headers
}

/// Adds `Authorization: Bearer <token>` unless an authorization header is
/// already present or the token is empty.
pub(crate) fn apply_bearer_token(headers: &mut HeaderMap, token: Option<&str>) -> Result<()> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Ok(());
    };
    if headers.contains_key(AUTHORIZATION) {
        return Ok(());
    }
    let mut value = HeaderValue::try_from(format!("Bearer {}", token))
        .map_err(|e| Error::unspecified("Invalid authorization token").with_cause(e))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> HeaderValue {
        HeaderValue::from_static("courier-test")
    }

    #[test]
    fn test_empty_expected_status_means_ok() {
        let request = RequestData::new();
        assert!(request.accepts(StatusCode::OK));
        assert!(!request.accepts(StatusCode::CREATED));
    }

    #[test]
    fn test_explicit_expected_status() {
        let request = RequestData::new()
            .expect_status(StatusCode::CREATED)
            .expect_status(StatusCode::ACCEPTED);
        assert!(request.accepts(StatusCode::CREATED));
        assert!(request.accepts(StatusCode::ACCEPTED));
        assert!(!request.accepts(StatusCode::OK));
    }

    #[test]
    fn test_build_headers_fills_defaults() {
        let headers = build_headers(
            &HeaderMap::new(),
            &HeaderMap::new(),
            CONTENT_TYPE_JSON,
            &agent(),
        );
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers[USER_AGENT], "courier-test");
    }

    #[test]
    fn test_build_headers_caller_values_win() {
        let mut extra = HeaderMap::new();
        extra.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
        extra.insert("x-auth-token", HeaderValue::from_static("secret"));

        let mut defaults = HeaderMap::new();
        defaults.insert(USER_AGENT, HeaderValue::from_static("custom-agent"));

        let headers = build_headers(&defaults, &extra, CONTENT_TYPE_OCTET_STREAM, &agent());
        assert_eq!(headers[CONTENT_TYPE], "image/png");
        assert_eq!(headers[ACCEPT], "application/octet-stream");
        assert_eq!(headers[USER_AGENT], "custom-agent");
        assert_eq!(headers["x-auth-token"], "secret");
    }

    #[test]
    fn test_resolve_url_appends_params_in_order() {
        let request = RequestData::new()
            .with_query_param("b", "2")
            .with_query_param("a", "one two");
        let url = request
            .resolve_url(None, "http://localhost/items?x=0")
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost/items?x=0&b=2&a=one+two");
    }

    #[test]
    fn test_resolve_url_joins_base() {
        let base = Url::parse("http://localhost:8080/api/").unwrap();
        let url = RequestData::new()
            .resolve_url(Some(&base), "items/1")
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/items/1");
    }

    #[test]
    fn test_resolve_url_rejects_garbage() {
        let err = RequestData::new()
            .resolve_url(None, "not a url")
            .unwrap_err();
        assert!(err.to_string().contains("failed creating the request not a url"));
    }

    #[test]
    fn test_bearer_token_applied_once() {
        let mut headers = HeaderMap::new();
        apply_bearer_token(&mut headers, Some("abc")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");

        apply_bearer_token(&mut headers, Some("other")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_empty_bearer_token_ignored() {
        let mut headers = HeaderMap::new();
        apply_bearer_token(&mut headers, Some("")).unwrap();
        apply_bearer_token(&mut headers, None).unwrap();
        assert!(!headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_text_body_is_verbatim() {
        let body = RequestBody::from("not { json");
        assert_eq!(body.len(), 10);
        assert!(matches!(body, RequestBody::Text(ref t) if t == "not { json"));
    }

    #[test]
    fn test_json_body_serializes() {
        let body = RequestBody::json(&serde_json::json!({"name": "x"})).unwrap();
        match body {
            RequestBody::Json(bytes) => assert_eq!(&bytes[..], br#"{"name":"x"}"#),
            other => panic!("expected Json body, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_body_has_no_transport() {
        assert!(RequestBody::Empty.to_transport().is_none());
        assert!(RequestBody::Text(String::new()).to_transport().is_none());
        assert!(RequestBody::from(vec![1u8, 2, 3]).to_transport().is_some());
    }
}
