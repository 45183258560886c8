//! Error types for HTTP API calls.
//!
//! Callers get a single [`Error`] type back from every request. Each error
//! carries a semantic [`ErrorCode`] that business logic can branch on
//! (`NotFound`, `Unauthorised`, ...), a human readable message, and an
//! optional cause. Causes form a chain: an outer `Unspecified` error that
//! wraps a `NotFound` still reports `NotFound` from [`Error::code`].
//!
//! Non-2xx responses that did not match the expected statuses are described
//! by [`HttpStatusError`], which keeps the URL, status, headers and the
//! message extracted from the response body. It always travels inside an
//! [`Error`] as its cause.

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

/// A boxed, thread-safe error used as the cause of an [`Error`].
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The semantic kind of an [`Error`].
///
/// These are the distinctions callers actually make in business logic;
/// everything else is `Unspecified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Catch-all. Also used for transport, parsing and retry exhaustion failures.
    Unspecified,
    /// The resource does not exist (HTTP 404).
    NotFound,
    /// The resource already exists (HTTP 400 with an "already exists" body).
    DuplicateValue,
    /// The operation timed out.
    Timeout,
    /// The caller is not allowed to access the resource (HTTP 401 and 403).
    Unauthorised,
}

impl ErrorCode {
    /// Returns the code name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unspecified => "Unspecified",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::DuplicateValue => "DuplicateValue",
            ErrorCode::Timeout => "Timeout",
            ErrorCode::Unauthorised => "Unauthorised",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error type returned by every [`Client`](crate::Client) request.
///
/// Rendering includes the cause chain:
///
/// ```
/// use courier::{Error, ErrorCode};
///
/// let inner = Error::not_found("item 42", "");
/// let outer = Error::unspecified("lookup failed").with_cause(inner);
///
/// assert_eq!(outer.to_string(), "lookup failed\ncaused by: Not found: item 42");
/// assert_eq!(outer.code(), ErrorCode::NotFound);
/// ```
#[derive(thiserror::Error, Debug)]
#[error("{message}{}", render_cause(.cause))]
pub struct Error {
    code: ErrorCode,
    message: String,
    status: Option<StatusCode>,
    #[source]
    cause: Option<BoxError>,
}

fn render_cause(cause: &Option<BoxError>) -> String {
    match cause {
        Some(cause) => format!("\ncaused by: {}", cause),
        None => String::new(),
    }
}

fn message_or_default(message: String, prefix: &str, context: impl fmt::Display) -> String {
    if message.is_empty() {
        format!("{}: {}", prefix, context)
    } else {
        message
    }
}

/// Returns `err` as a taxonomy [`Error`] if that is its concrete type.
pub fn as_taxonomy_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a Error> {
    err.downcast_ref::<Error>()
}

impl Error {
    /// Creates an error with the given code and message and no cause.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            cause: None,
        }
    }

    /// Creates an `Unspecified` error.
    pub fn unspecified(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unspecified, message)
    }

    /// Creates a `NotFound` error.
    ///
    /// An empty `message` falls back to `"Not found: <context>"`.
    pub fn not_found(context: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::NotFound,
            message_or_default(message.into(), "Not found", context),
        )
    }

    /// Creates a `DuplicateValue` error.
    ///
    /// An empty `message` falls back to `"Duplicate: <context>"`.
    pub fn duplicate_value(context: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DuplicateValue,
            message_or_default(message.into(), "Duplicate", context),
        )
    }

    /// Creates a `Timeout` error.
    ///
    /// An empty `message` falls back to `"Timeout: <context>"`.
    pub fn timeout(context: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Timeout,
            message_or_default(message.into(), "Timeout", context),
        )
    }

    /// Creates an `Unauthorised` error.
    ///
    /// An empty `message` falls back to `"Unauthorised: <context>"`.
    pub fn unauthorised(context: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Unauthorised,
            message_or_default(message.into(), "Unauthorised", context),
        )
    }

    /// Attaches the error that caused this one.
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Records the HTTP status that was observed when this error was produced.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the message of this error, without its cause.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the wrapped cause, if any.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Returns the first code other than `Unspecified` found along the cause
    /// chain, starting with this error.
    pub fn code(&self) -> ErrorCode {
        self.taxonomy_chain()
            .map(|err| err.code)
            .find(|code| *code != ErrorCode::Unspecified)
            .unwrap_or(ErrorCode::Unspecified)
    }

    /// Returns `true` if this error, or the taxonomy error it directly wraps,
    /// resolves to `code`.
    pub fn is_caused_by(&self, code: ErrorCode) -> bool {
        if self.code() == code {
            return true;
        }
        self.cause
            .as_deref()
            .and_then(|cause| as_taxonomy_error(cause))
            .is_some_and(|cause| cause.code() == code)
    }

    /// Returns `true` if this error resolves to [`ErrorCode::NotFound`].
    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }

    /// Returns `true` if this error resolves to [`ErrorCode::Unauthorised`].
    pub fn is_unauthorised(&self) -> bool {
        self.code() == ErrorCode::Unauthorised
    }

    /// Returns `true` if this error resolves to [`ErrorCode::DuplicateValue`].
    pub fn is_duplicate_value(&self) -> bool {
        self.code() == ErrorCode::DuplicateValue
    }

    /// Returns `true` if this error resolves to [`ErrorCode::Timeout`].
    pub fn is_timeout(&self) -> bool {
        self.code() == ErrorCode::Timeout
    }

    /// Returns the HTTP status observed for the failed request, if any.
    ///
    /// This is the status recorded on the nearest error in the chain, or the
    /// status of a wrapped [`HttpStatusError`].
    pub fn status(&self) -> Option<StatusCode> {
        self.chain().find_map(|err| {
            if let Some(err) = as_taxonomy_error(err) {
                err.status
            } else {
                err.downcast_ref::<HttpStatusError>().map(|err| err.status)
            }
        })
    }

    /// Returns the [`HttpStatusError`] in the cause chain, if any.
    pub fn http_status_error(&self) -> Option<&HttpStatusError> {
        self.chain()
            .find_map(|err| err.downcast_ref::<HttpStatusError>())
    }

    fn chain(&self) -> impl Iterator<Item = &(dyn StdError + 'static)> {
        std::iter::successors(Some(self as &(dyn StdError + 'static)), |&err| err.source())
    }

    fn taxonomy_chain(&self) -> impl Iterator<Item = &Error> {
        self.chain().filter_map(as_taxonomy_error)
    }
}

/// The response status was not one of those expected.
///
/// `message` is the diagnostic extracted from the response body: the rendered
/// [`ErrorResponse`] when the server sent a JSON error envelope, otherwise the
/// raw body text.
#[derive(thiserror::Error, Debug, Clone)]
#[error(
    "request ({url}) returned unexpected status: {}; error info: {message}",
    .status.as_u16()
)]
pub struct HttpStatusError {
    url: String,
    status: StatusCode,
    headers: HeaderMap,
    message: String,
}

impl HttpStatusError {
    /// Creates a new `HttpStatusError`.
    pub fn new(
        url: impl Into<String>,
        status: StatusCode,
        headers: HeaderMap,
        message: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            status,
            headers,
            message: message.into(),
        }
    }

    /// The URL of the failed request.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The status the server responded with.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The diagnostic message extracted from the response body.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<HttpStatusError> for Error {
    fn from(err: HttpStatusError) -> Self {
        let status = err.status;
        Error::unspecified(format!("HTTP request to {} failed", err.url))
            .with_status(status)
            .with_cause(err)
    }
}

/// The error payload servers send inside an [`ErrorEnvelope`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable description.
    #[serde(default)]
    pub message: String,
    /// Numeric error code, usually the HTTP status.
    #[serde(default)]
    pub code: i64,
    /// Short title, e.g. `"Not Found"`.
    #[serde(default)]
    pub title: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed: {} {}: {}", self.code, self.title, self.message)
    }
}

/// Wire shape of a JSON error body: `{"error": {"message", "code", "title"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The wrapped error details.
    pub error: ErrorResponse,
}

/// A specialized `Result` type for HTTP API calls.
///
/// This is a convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_cause() {
        let err = Error::unspecified("something broke");
        assert_eq!(err.to_string(), "something broke");
        assert!(err.cause().is_none());
    }

    #[test]
    fn test_render_with_cause() {
        let err = Error::unspecified("outer").with_cause(Error::unspecified("inner"));
        assert_eq!(err.to_string(), "outer\ncaused by: inner");
        assert!(err.cause().is_some());
    }

    #[test]
    fn test_default_messages_use_context() {
        assert_eq!(Error::not_found("item", "").to_string(), "Not found: item");
        assert_eq!(
            Error::duplicate_value("name", "").to_string(),
            "Duplicate: name"
        );
        assert_eq!(Error::timeout(5, "").to_string(), "Timeout: 5");
        assert_eq!(
            Error::unauthorised("/admin", "").to_string(),
            "Unauthorised: /admin"
        );
    }

    #[test]
    fn test_explicit_message_wins_over_context() {
        let err = Error::not_found("item", "no item with id 7");
        assert_eq!(err.to_string(), "no item with id 7");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_code_walks_cause_chain() {
        let err = Error::unspecified("outer")
            .with_cause(Error::unspecified("middle").with_cause(Error::timeout("op", "")));
        assert_eq!(err.code(), ErrorCode::Timeout);
        assert!(err.is_timeout());
    }

    #[test]
    fn test_outer_code_takes_precedence() {
        let err = Error::unauthorised("x", "").with_cause(Error::not_found("y", ""));
        assert_eq!(err.code(), ErrorCode::Unauthorised);
    }

    #[test]
    fn test_code_defaults_to_unspecified() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = Error::unspecified("outer").with_cause(io);
        assert_eq!(err.code(), ErrorCode::Unspecified);
    }

    #[test]
    fn test_is_caused_by() {
        let err = Error::unspecified("outer").with_cause(Error::duplicate_value("k", ""));
        assert!(err.is_caused_by(ErrorCode::DuplicateValue));
        assert!(!err.is_caused_by(ErrorCode::NotFound));
    }

    #[test]
    fn test_is_caused_by_sees_past_typed_outer_error() {
        let err = Error::unauthorised("http://localhost/items", "")
            .with_cause(Error::not_found("http://localhost/items/1", ""));
        assert_eq!(err.code(), ErrorCode::Unauthorised);
        assert!(err.is_caused_by(ErrorCode::NotFound));
        assert!(err.is_caused_by(ErrorCode::Unauthorised));
        assert!(!err.is_caused_by(ErrorCode::Timeout));
    }

    #[test]
    fn test_http_status_error_rendering() {
        let err = HttpStatusError::new(
            "http://localhost/items",
            StatusCode::BAD_REQUEST,
            HeaderMap::new(),
            "bad input",
        );
        assert_eq!(
            err.to_string(),
            "request (http://localhost/items) returned unexpected status: 400; error info: bad input"
        );
    }

    #[test]
    fn test_http_status_error_converts_to_unspecified() {
        let err: Error = HttpStatusError::new(
            "http://localhost/items",
            StatusCode::CONFLICT,
            HeaderMap::new(),
            "conflict",
        )
        .into();

        assert_eq!(err.code(), ErrorCode::Unspecified);
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(
            err.http_status_error().map(|e| e.message()),
            Some("conflict")
        );
        assert!(err.to_string().contains("409"));
    }

    #[test]
    fn test_status_found_through_wrapping() {
        let inner: Error = HttpStatusError::new(
            "http://localhost/x",
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            "",
        )
        .into();
        let err = Error::not_found("x", "").with_cause(inner);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_error_response_display() {
        let resp = ErrorResponse {
            message: "no such item".to_string(),
            code: 404,
            title: "Not Found".to_string(),
        };
        assert_eq!(resp.to_string(), "Failed: 404 Not Found: no such item");
    }

    #[test]
    fn test_error_envelope_decoding_defaults_missing_fields() {
        let envelope: ErrorEnvelope =
            serde_json::from_str(r#"{"error": {"message": "boom"}}"#).unwrap();
        assert_eq!(envelope.error.message, "boom");
        assert_eq!(envelope.error.code, 0);
        assert!(envelope.error.title.is_empty());
    }

    #[test]
    fn test_code_display() {
        assert_eq!(ErrorCode::DuplicateValue.to_string(), "DuplicateValue");
        assert_eq!(ErrorCode::Unauthorised.to_string(), "Unauthorised");
    }
}
