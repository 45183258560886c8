//! Retry policy for overloaded servers.
//!
//! A server that is shedding load answers `413 Payload Too Large` with a
//! `Retry-After` header. The client waits the indicated time and tries again,
//! up to [`RetryConfig::max_send_attempts`] attempts in total. No other
//! response is retried.

use http::HeaderMap;
use std::time::{Duration, SystemTime};

/// The number of times to try sending a request before giving up.
pub const DEFAULT_MAX_SEND_ATTEMPTS: usize = 3;

/// The longest a single `Retry-After` wait may last.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

/// Configuration for overload retries.
///
/// # Examples
///
/// ```
/// use courier::retry::RetryConfig;
/// use std::time::Duration;
///
/// let config = RetryConfig::builder()
///     .max_send_attempts(5)
///     .max_wait(Duration::from_secs(30))
///     .build();
/// assert_eq!(config.max_send_attempts, 5);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_send_attempts: usize,

    /// Upper bound on a server-supplied `Retry-After` delay.
    pub max_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_send_attempts: DEFAULT_MAX_SEND_ATTEMPTS,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl RetryConfig {
    /// Creates a new builder for configuring retries.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// A configuration that sends every request exactly once.
    pub fn no_retries() -> Self {
        Self {
            max_send_attempts: 1,
            ..Default::default()
        }
    }
}

/// Builder for `RetryConfig`.
#[derive(Default)]
pub struct RetryConfigBuilder {
    max_send_attempts: Option<usize>,
    max_wait: Option<Duration>,
}

impl RetryConfigBuilder {
    /// Sets the total number of attempts.
    pub fn max_send_attempts(mut self, attempts: usize) -> Self {
        self.max_send_attempts = Some(attempts);
        self
    }

    /// Sets the maximum wait between attempts.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Builds the `RetryConfig`.
    pub fn build(self) -> RetryConfig {
        let default = RetryConfig::default();
        RetryConfig {
            max_send_attempts: self.max_send_attempts.unwrap_or(default.max_send_attempts),
            max_wait: self.max_wait.unwrap_or(default.max_wait),
        }
    }
}

/// The `Retry-After` header could not be understood.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid Retry-After value {value:?}")]
pub struct InvalidRetryAfter {
    value: String,
}

/// Returns the raw `Retry-After` header, if present and non-empty.
pub(crate) fn retry_after_header(headers: &HeaderMap) -> Option<&http::HeaderValue> {
    headers
        .get(http::header::RETRY_AFTER)
        .filter(|value| !value.is_empty())
}

/// A parsed `Retry-After` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfter {
    /// A delay given in seconds. A zero delay means the server will not
    /// accept the request again.
    Seconds(Duration),
    /// A delay computed from an HTTP date; zero once the date has passed.
    Date(Duration),
}

impl RetryAfter {
    /// How long to wait before the next attempt.
    pub fn delay(&self) -> Duration {
        match *self {
            RetryAfter::Seconds(delay) | RetryAfter::Date(delay) => delay,
        }
    }

    /// Returns `true` for a literal zero-second delay.
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, RetryAfter::Seconds(delay) if delay.is_zero())
    }
}

/// Parses a `Retry-After` value.
///
/// Accepts delay-seconds, including fractional values such as `"0.5"`, and
/// HTTP dates. Values too large for a `Duration` saturate; positive values
/// below a nanosecond round up to one.
pub fn parse_retry_after(value: &http::HeaderValue) -> Result<RetryAfter, InvalidRetryAfter> {
    let invalid = || InvalidRetryAfter {
        value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
    };
    let text = value.to_str().map_err(|_| invalid())?.trim();

    if let Ok(seconds) = text.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(invalid());
        }
        if seconds == 0.0 {
            return Ok(RetryAfter::Seconds(Duration::ZERO));
        }
        let delay = Duration::try_from_secs_f64(seconds)
            .unwrap_or(Duration::MAX)
            .max(Duration::from_nanos(1));
        return Ok(RetryAfter::Seconds(delay));
    }

    let date = httpdate::parse_http_date(text).map_err(|_| invalid())?;
    Ok(RetryAfter::Date(
        date.duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_parse_retry_after_seconds() {
        let delay = parse_retry_after(&HeaderValue::from_static("60"));
        assert_eq!(delay, Ok(RetryAfter::Seconds(Duration::from_secs(60))));
    }

    #[test]
    fn test_parse_retry_after_fractional_seconds() {
        let delay = parse_retry_after(&HeaderValue::from_static("0.25"));
        assert_eq!(delay, Ok(RetryAfter::Seconds(Duration::from_millis(250))));
    }

    #[test]
    fn test_parse_retry_after_zero_is_resource_limit() {
        let parsed = parse_retry_after(&HeaderValue::from_static("0")).unwrap();
        assert_eq!(parsed, RetryAfter::Seconds(Duration::ZERO));
        assert!(parsed.is_resource_limit());
    }

    #[test]
    fn test_parse_retry_after_huge_value_saturates() {
        let parsed = parse_retry_after(&HeaderValue::from_static("1e30")).unwrap();
        assert_eq!(parsed.delay(), Duration::MAX);
        assert!(!parsed.is_resource_limit());
    }

    #[test]
    fn test_parse_retry_after_tiny_value_rounds_up() {
        let parsed = parse_retry_after(&HeaderValue::from_static("1e-10")).unwrap();
        assert_eq!(parsed.delay(), Duration::from_nanos(1));
        assert!(!parsed.is_resource_limit());
    }

    #[test]
    fn test_parse_retry_after_rejects_garbage() {
        assert!(parse_retry_after(&HeaderValue::from_static("soon")).is_err());
        assert!(parse_retry_after(&HeaderValue::from_static("-1")).is_err());
        assert!(parse_retry_after(&HeaderValue::from_static("NaN")).is_err());
        assert!(parse_retry_after(&HeaderValue::from_static("inf")).is_err());
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let future = SystemTime::now() + Duration::from_secs(120);
        let header = HeaderValue::from_str(&httpdate::fmt_http_date(future)).unwrap();

        let parsed = parse_retry_after(&header).unwrap();
        assert!(matches!(parsed, RetryAfter::Date(_)));
        let delay = parsed.delay();
        // HTTP dates have whole-second resolution.
        assert!(
            delay >= Duration::from_secs(118) && delay <= Duration::from_secs(120),
            "Delay should be about 120 seconds, got {:?}",
            delay
        );
    }

    #[test]
    fn test_parse_retry_after_past_date_is_not_resource_limit() {
        let header = HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        let parsed = parse_retry_after(&header).unwrap();
        assert_eq!(parsed, RetryAfter::Date(Duration::ZERO));
        assert!(!parsed.is_resource_limit());
    }

    #[test]
    fn test_retry_after_header_ignores_empty() {
        let mut headers = HeaderMap::new();
        assert!(retry_after_header(&headers).is_none());

        headers.insert("retry-after", HeaderValue::from_static(""));
        assert!(retry_after_header(&headers).is_none());

        headers.insert("retry-after", HeaderValue::from_static("2"));
        assert!(retry_after_header(&headers).is_some());
    }

    #[test]
    fn test_builder_defaults() {
        let config = RetryConfig::builder().build();
        assert_eq!(config.max_send_attempts, DEFAULT_MAX_SEND_ATTEMPTS);
        assert_eq!(config.max_wait, DEFAULT_MAX_WAIT);
        assert_eq!(RetryConfig::no_retries().max_send_attempts, 1);
    }
}
