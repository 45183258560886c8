//! Successful responses.
//!
//! [`Response`] wraps whatever the request produced (decoded JSON, raw bytes,
//! or a live [`ResponseStream`]) along with the status, headers, latency and
//! number of attempts it took.

use crate::{Error, Result};
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A wrapper around a successful HTTP response.
///
/// # Type Parameters
///
/// * `T` - The type of the response data
///
/// # Examples
///
/// ```no_run
/// use courier::{Client, RequestData};
/// use http::Method;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Item {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), courier::Error> {
/// let client = Client::new("inventory/1.0")?;
///
/// let response = client
///     .json_request::<Item>(Method::GET, "https://api.example.com/items/1", &RequestData::new())
///     .await?;
///
/// if let Some(item) = &response.data {
///     println!("Item {}: {}", item.id, item.name);
/// }
/// println!("Status: {}", response.status);
/// println!("Request took {:?}", response.latency);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The response data.
    pub data: T,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The total latency of the request, including any `Retry-After` waits.
    pub latency: Duration,

    /// The number of attempts made to complete this request.
    ///
    /// This will be `1` unless the server asked the client to back off.
    pub attempts: usize,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data to a different type using the provided function.
    ///
    /// # Examples
    ///
    /// ```
    /// # use courier::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     42,
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the request had to be sent more than once.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a reference to a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use courier::Response;
    /// # use http::{HeaderMap, StatusCode, HeaderValue};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response::new((), StatusCode::OK, headers, Duration::ZERO, 1);
    ///
    /// assert_eq!(response.header("content-type"), Some("application/json"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// The still-open body of a binary response.
///
/// Nothing has been read when the caller receives it. Dropping the stream
/// releases the underlying connection, so there is nothing to close
/// explicitly.
#[derive(Debug)]
pub struct ResponseStream {
    url: String,
    status: StatusCode,
    inner: reqwest::Response,
}

impl ResponseStream {
    pub(crate) fn new(url: impl Into<String>, inner: reqwest::Response) -> Self {
        Self {
            url: url.into(),
            status: inner.status(),
            inner,
        }
    }

    /// The declared length of the body, if the server sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.inner.content_length()
    }

    /// Reads the next chunk of the body, or `None` at the end.
    ///
    /// # Errors
    ///
    /// Returns an `Unspecified` error if the transport fails mid-body.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        self.inner
            .chunk()
            .await
            .map_err(|e| read_error(&self.url, self.status, e))
    }

    /// Reads the rest of the body into memory.
    ///
    /// # Errors
    ///
    /// Returns an `Unspecified` error if the body cannot be read.
    pub async fn bytes(self) -> Result<Bytes> {
        let Self { url, status, inner } = self;
        inner.bytes().await.map_err(|e| read_error(&url, status, e))
    }

    /// Reads the rest of the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an `Unspecified` error if the body cannot be read.
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads the rest of the body and decodes it as JSON.
    ///
    /// Returns `None` for an empty body.
    ///
    /// # Errors
    ///
    /// Returns an `Unspecified` error naming the raw body if decoding fails.
    pub async fn json<T: DeserializeOwned>(self) -> Result<Option<T>> {
        let status = self.status;
        let bytes = self.bytes().await?;
        decode_json(&bytes, status)
    }

    /// Converts the body into a stream of chunks.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> {
        let Self { url, status, inner } = self;
        inner
            .bytes_stream()
            .map_err(move |e| read_error(&url, status, e))
    }
}

pub(crate) fn read_error(url: &str, status: StatusCode, e: reqwest::Error) -> Error {
    Error::unspecified(format!("failed reading the response body from {}", url))
        .with_status(status)
        .with_cause(e)
}

/// Decodes a JSON body; an empty body decodes to `None`.
pub(crate) fn decode_json<T: DeserializeOwned>(body: &[u8], status: StatusCode) -> Result<Option<T>> {
    if body.is_empty() {
        return Ok(None);
    }
    match serde_json::from_slice(body) {
        Ok(data) => Ok(Some(data)),
        Err(e) => {
            let raw = String::from_utf8_lossy(body);
            tracing::error!(
                error = %e,
                raw_response = %raw,
                "Failed to deserialize response"
            );
            Err(
                Error::unspecified(format!("failed unmarshaling the response body: {}", raw))
                    .with_status(status)
                    .with_cause(e),
            )
        }
    }
}
