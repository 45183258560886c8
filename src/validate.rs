//! Status validation and error classification.
//!
//! A response whose status is not in the expected set is turned into an
//! [`Error`]. The body is read first so the server's diagnostic can be
//! included; then the status picks the error code:
//!
//! | Status      | Code                                         |
//! |-------------|----------------------------------------------|
//! | 404         | `NotFound`                                   |
//! | 401, 403    | `Unauthorised`                               |
//! | 400         | `DuplicateValue` if the body says "already exists" |
//! | anything else | `Unspecified` wrapping the [`HttpStatusError`] |

use crate::error::{ErrorEnvelope, HttpStatusError};
use crate::request::{RequestData, CONTENT_TYPE_JSON};
use crate::{Error, Result};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};

const DUPLICATE_MARKER: &str = "already exists";

/// Passes `response` through if its status is expected, otherwise consumes
/// it and returns the classified error.
///
/// The body of an accepted response is left unread.
pub(crate) async fn check_status(
    url: &str,
    response: reqwest::Response,
    request: &RequestData,
) -> Result<reqwest::Response> {
    let status = response.status();
    if request.accepts(status) {
        return Ok(response);
    }

    let headers = response.headers().clone();
    let body = response.bytes().await.unwrap_or_default();

    if status.is_client_error() {
        tracing::error!(
            status = status.as_u16(),
            url = %url,
            response = %String::from_utf8_lossy(&body),
            "Client error (4xx)"
        );
    } else if status.is_server_error() {
        tracing::warn!(
            status = status.as_u16(),
            url = %url,
            response = %String::from_utf8_lossy(&body),
            "Server error (5xx)"
        );
    } else {
        tracing::debug!(status = status.as_u16(), url = %url, "Unexpected status");
    }

    Err(classify_failure(url, status, headers, &body))
}

/// Builds the error for a response with an unexpected status.
pub fn classify_failure(url: &str, status: StatusCode, headers: HeaderMap, body: &[u8]) -> Error {
    let raw = String::from_utf8_lossy(body);
    let message = if is_json(&headers) {
        match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => envelope.error.to_string(),
            Err(_) => raw.to_string(),
        }
    } else {
        raw.to_string()
    };

    let http_error = HttpStatusError::new(url, status, headers, message);

    match status.as_u16() {
        404 => {
            Error::not_found(url, format!("Resource at {} not found", url))
                .with_status(status)
                .with_cause(http_error)
        }
        401 | 403 => {
            Error::unauthorised(url, format!("Unauthorised URL {}", url))
                .with_status(status)
                .with_cause(http_error)
        }
        400 if raw.contains(DUPLICATE_MARKER) => {
            Error::duplicate_value(url, raw.into_owned())
                .with_status(status)
                .with_cause(http_error)
        }
        _ => http_error.into(),
    }
}

/// Returns `true` if the `Content-Type` is JSON, ignoring parameters.
fn is_json(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case(CONTENT_TYPE_JSON)
        || essence.to_ascii_lowercase().ends_with("+json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use http::HeaderValue;

    const URL: &str = "http://localhost/items/99";

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn test_404_is_not_found_with_server_message() {
        let body = br#"{"error":{"message":"no such item","code":404,"title":"Not Found"}}"#;
        let err = classify_failure(URL, StatusCode::NOT_FOUND, json_headers(), body);

        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        let rendered = err.to_string();
        assert!(rendered.contains("no such item"), "{}", rendered);
        assert!(rendered.contains(URL));
        assert!(rendered.contains("404"));
        assert_eq!(
            err.http_status_error().map(|e| e.message()),
            Some("Failed: 404 Not Found: no such item")
        );
    }

    #[test]
    fn test_404_ignores_body_content() {
        let err = classify_failure(URL, StatusCode::NOT_FOUND, HeaderMap::new(), b"");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_401_and_403_are_unauthorised() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = classify_failure(URL, status, HeaderMap::new(), b"nope");
            assert_eq!(err.code(), ErrorCode::Unauthorised);
            assert!(err.to_string().contains("Unauthorised URL"));
        }
    }

    #[test]
    fn test_400_already_exists_is_duplicate() {
        let body = b"server named web-1 already exists";
        let err = classify_failure(URL, StatusCode::BAD_REQUEST, HeaderMap::new(), body);
        assert_eq!(err.code(), ErrorCode::DuplicateValue);
        assert_eq!(err.message(), "server named web-1 already exists");
    }

    #[test]
    fn test_duplicate_match_is_case_sensitive() {
        let err = classify_failure(URL, StatusCode::BAD_REQUEST, HeaderMap::new(), b"Already Exists");
        assert_eq!(err.code(), ErrorCode::Unspecified);
    }

    #[test]
    fn test_400_without_marker_is_untyped() {
        let err = classify_failure(URL, StatusCode::BAD_REQUEST, HeaderMap::new(), b"bad input");
        assert_eq!(err.code(), ErrorCode::Unspecified);
        let http_error = err.http_status_error().unwrap();
        assert_eq!(http_error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(http_error.message(), "bad input");
        assert_eq!(http_error.url(), URL);
    }

    #[test]
    fn test_invalid_json_falls_back_to_raw_body() {
        let err = classify_failure(
            URL,
            StatusCode::INTERNAL_SERVER_ERROR,
            json_headers(),
            b"{not json",
        );
        assert_eq!(err.http_status_error().unwrap().message(), "{not json");
    }

    #[test]
    fn test_json_envelope_ignored_without_json_content_type() {
        let body = br#"{"error":{"message":"m","code":500,"title":"t"}}"#;
        let err = classify_failure(URL, StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), body);
        assert_eq!(
            err.http_status_error().unwrap().message(),
            String::from_utf8_lossy(body)
        );
    }

    #[test]
    fn test_json_content_type_with_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("Application/JSON; charset=utf-8"),
        );
        assert!(is_json(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/problem+json"));
        assert!(is_json(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        assert!(!is_json(&headers));
    }

    #[test]
    fn test_headers_are_preserved() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        let err = classify_failure(URL, StatusCode::CONFLICT, headers, b"");
        assert_eq!(
            err.http_status_error().unwrap().headers()["x-request-id"],
            "abc"
        );
    }
}
