//! HTTP client with overload retries and typed errors.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure and create clients.
//!
//! Every request goes through the same pipeline:
//!
//! 1. headers are merged and the body is prepared by one of the entry points
//!    ([`Client::plain_request`], [`Client::json_request`],
//!    [`Client::binary_request`]);
//! 2. the request is sent, and re-sent while the server answers
//!    `413` with a `Retry-After` header;
//! 3. the final status is checked against the expected statuses and
//!    unexpected ones are turned into an [`Error`].

use crate::{
    request::{
        apply_bearer_token, build_headers, RequestBody, RequestData, CONTENT_TYPE_JSON,
        CONTENT_TYPE_OCTET_STREAM, CONTENT_TYPE_TEXT,
    },
    response::{decode_json, read_error, ResponseStream},
    retry::{parse_retry_after, retry_after_header, RetryConfig},
    validate::check_status,
    Error, Response, Result,
};
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// An HTTP client for JSON, plain-text and binary APIs.
///
/// The client is designed to be reused across multiple requests and is cheap
/// to clone. It holds only immutable configuration; everything specific to a
/// request lives in the [`RequestData`] passed to each call.
///
/// # Examples
///
/// ```no_run
/// use courier::{Client, RequestData};
/// use http::{Method, StatusCode};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct NewItem {
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct Item {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), courier::Error> {
/// let client = Client::new("inventory-sync/1.0")?;
///
/// let request = RequestData::new()
///     .expect_status(StatusCode::CREATED)
///     .with_json(&NewItem { name: "x".to_string() })?;
///
/// let created = client
///     .json_request::<Item>(Method::POST, "https://api.example.com/items", &request)
///     .await?;
///
/// if let Some(item) = created.data {
///     println!("Created item {} ({})", item.id, item.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    agent: HeaderValue,
    base_url: Option<Url>,
    default_headers: HeaderMap,
    retry_config: RetryConfig,
    timeout: Option<Duration>,
}

/// A response whose status matched, with the body still unread.
struct Accepted {
    response: reqwest::Response,
    url: Url,
    latency: Duration,
    attempts: usize,
}

impl Client {
    /// Creates a client that identifies itself with `agent_name` as its
    /// `User-Agent`, using the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `agent_name` is not a valid header value.
    pub fn new(agent_name: impl Into<String>) -> Result<Self> {
        Self::builder().agent_name(agent_name).build()
    }

    /// Creates a new `ClientBuilder` for configuring a client.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use courier::Client;
    ///
    /// # fn example() -> Result<(), courier::Error> {
    /// let client = Client::builder()
    ///     .agent_name("my-app/1.0")
    ///     .base_url("https://api.example.com/v2/")?
    ///     .max_send_attempts(5)
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The `User-Agent` sent with every request.
    pub fn agent_name(&self) -> &str {
        self.inner.agent.to_str().unwrap_or_default()
    }

    /// The total number of attempts made for a request the server keeps
    /// asking to retry.
    pub fn max_send_attempts(&self) -> usize {
        self.inner.retry_config.max_send_attempts
    }

    /// Sends a `text/plain` request and returns the raw response body.
    ///
    /// A [`RequestBody::Text`] body is sent verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent, the status is not
    /// expected, or the body cannot be read.
    pub async fn plain_request(
        &self,
        method: Method,
        url: &str,
        request: &RequestData,
    ) -> Result<Response<Bytes>> {
        let accepted = self
            .send_request(method, url, request, CONTENT_TYPE_TEXT, None)
            .await?;
        let status = accepted.response.status();
        let headers = accepted.response.headers().clone();
        let body = accepted
            .response
            .bytes()
            .await
            .map_err(|e| read_error(accepted.url.as_str(), status, e))?;

        Ok(Response::new(
            body,
            status,
            headers,
            accepted.latency,
            accepted.attempts,
        ))
    }

    /// Sends an `application/json` request and decodes the response body.
    ///
    /// The response data is `None` when the server sent an empty body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent, the status is not
    /// expected, or the body cannot be read or decoded. A decoding error
    /// includes the raw body.
    pub async fn json_request<Res>(
        &self,
        method: Method,
        url: &str,
        request: &RequestData,
    ) -> Result<Response<Option<Res>>>
    where
        Res: DeserializeOwned,
    {
        let accepted = self
            .send_request(method, url, request, CONTENT_TYPE_JSON, None)
            .await?;
        let status = accepted.response.status();
        let headers = accepted.response.headers().clone();
        let body = accepted
            .response
            .bytes()
            .await
            .map_err(|e| read_error(accepted.url.as_str(), status, e))?;
        let data = decode_json(&body, status)?;

        Ok(Response::new(
            data,
            status,
            headers,
            accepted.latency,
            accepted.attempts,
        ))
    }

    /// Sends an `application/json` request and discards the response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the status is not
    /// expected.
    pub async fn json_exec(
        &self,
        method: Method,
        url: &str,
        request: &RequestData,
    ) -> Result<Response<()>> {
        let accepted = self
            .send_request(method, url, request, CONTENT_TYPE_JSON, None)
            .await?;

        Ok(Response::new(
            (),
            accepted.response.status(),
            accepted.response.headers().clone(),
            accepted.latency,
            accepted.attempts,
        ))
    }

    /// Sends an `application/octet-stream` request and hands back the live
    /// response body.
    ///
    /// A non-empty `token` is sent as `Authorization: Bearer <token>` unless
    /// `request` already carries an `Authorization` header. To decode a JSON
    /// reply, call [`ResponseStream::json`] on the returned data.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the status is not
    /// expected.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use courier::{Client, RequestBody, RequestData};
    /// use http::{Method, StatusCode};
    ///
    /// # async fn example() -> Result<(), courier::Error> {
    /// let client = Client::new("uploader/1.0")?;
    ///
    /// let request = RequestData::new()
    ///     .expect_status(StatusCode::CREATED)
    ///     .with_body(RequestBody::from(vec![0u8; 1024]));
    /// client
    ///     .binary_request(Method::PUT, "https://objects.example.com/c/blob", Some("token"), &request)
    ///     .await?;
    ///
    /// let download = client
    ///     .binary_request(Method::GET, "https://objects.example.com/c/blob", Some("token"), &RequestData::new())
    ///     .await?;
    /// let bytes = download.data.bytes().await?;
    /// println!("Downloaded {} bytes", bytes.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn binary_request(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
        request: &RequestData,
    ) -> Result<Response<ResponseStream>> {
        let accepted = self
            .send_request(method, url, request, CONTENT_TYPE_OCTET_STREAM, token)
            .await?;
        let status = accepted.response.status();
        let headers = accepted.response.headers().clone();

        Ok(Response::new(
            ResponseStream::new(accepted.url.as_str(), accepted.response),
            status,
            headers,
            accepted.latency,
            accepted.attempts,
        ))
    }

    /// Makes a JSON GET request expecting `200 OK`.
    pub async fn get<Res>(&self, url: &str) -> Result<Response<Option<Res>>>
    where
        Res: DeserializeOwned,
    {
        self.json_request(Method::GET, url, &RequestData::new())
            .await
    }

    /// Makes a JSON POST request expecting `200 OK` or `201 Created`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use courier::Client;
    /// use serde::{Deserialize, Serialize};
    ///
    /// #[derive(Serialize)]
    /// struct NewItem { name: String }
    ///
    /// #[derive(Deserialize)]
    /// struct Item { id: u64, name: String }
    ///
    /// # async fn example() -> Result<(), courier::Error> {
    /// let client = Client::builder()
    ///     .agent_name("my-app/1.0")
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let request = NewItem { name: "x".to_string() };
    /// let item = client.post::<_, Item>("/items", &request).await?;
    /// println!("Created: {:?}", item.data.map(|i| i.id));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn post<Req, Res>(&self, url: &str, body: &Req) -> Result<Response<Option<Res>>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let request = RequestData::new()
            .with_expected_status([StatusCode::OK, StatusCode::CREATED])
            .with_json(body)?;
        self.json_request(Method::POST, url, &request).await
    }

    /// Makes a JSON PUT request expecting `200 OK`, `201 Created` or
    /// `204 No Content`.
    pub async fn put<Req, Res>(&self, url: &str, body: &Req) -> Result<Response<Option<Res>>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let request = RequestData::new()
            .with_expected_status([StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT])
            .with_json(body)?;
        self.json_request(Method::PUT, url, &request).await
    }

    /// Makes a DELETE request expecting `200 OK`, `202 Accepted` or
    /// `204 No Content`. The response body is discarded.
    pub async fn delete(&self, url: &str) -> Result<Response<()>> {
        let request = RequestData::new().with_expected_status([
            StatusCode::OK,
            StatusCode::ACCEPTED,
            StatusCode::NO_CONTENT,
        ]);
        self.json_exec(Method::DELETE, url, &request).await
    }

    /// Builds headers, sends the request with overload retries and checks
    /// the final status.
    async fn send_request(
        &self,
        method: Method,
        url: &str,
        request: &RequestData,
        content_type: &'static str,
        token: Option<&str>,
    ) -> Result<Accepted> {
        let url = request.resolve_url(self.inner.base_url.as_ref(), url)?;

        let mut headers = build_headers(
            &self.inner.default_headers,
            &request.headers,
            content_type,
            &self.inner.agent,
        );
        apply_bearer_token(&mut headers, token)?;
        if let RequestBody::Stream { length, .. } = &request.body {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(*length));
        }

        let start_time = Instant::now();
        let (response, attempts) = self
            .send_rate_limited(&method, &url, &headers, &request.body)
            .await?;
        let response = check_status(url.as_str(), response, request).await?;

        Ok(Accepted {
            response,
            url,
            latency: start_time.elapsed(),
            attempts,
        })
    }

    /// Sends the request, waiting and re-sending while the server answers
    /// `413` with a `Retry-After` header.
    ///
    /// Any other response, whatever its status, is returned as-is together
    /// with the number of attempts made.
    async fn send_rate_limited(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: &RequestBody,
    ) -> Result<(reqwest::Response, usize)> {
        let max_attempts = self.inner.retry_config.max_send_attempts;

        for attempt in 1..=max_attempts {
            tracing::debug!(
                method = %method,
                url = %url,
                attempt = attempt,
                "Executing HTTP request"
            );

            let mut builder = self
                .inner
                .http_client
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(timeout) = self.inner.timeout {
                builder = builder.timeout(timeout);
            }
            // Each attempt gets a fresh body; a consumed stream cannot be replayed.
            if let Some(body) = body.to_transport() {
                builder = builder.body(body);
            }

            let sent_at = Instant::now();
            let response = builder
                .send()
                .await
                .map_err(|e| transport_error(url, e))?;

            tracing::info!(
                status = response.status().as_u16(),
                latency_ms = sent_at.elapsed().as_millis(),
                attempt = attempt,
                "Received HTTP response"
            );

            if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
                return Ok((response, attempt));
            }
            let Some(retry_after) = retry_after_header(response.headers()).cloned() else {
                return Ok((response, attempt));
            };
            drop(response);

            let retry_after = parse_retry_after(&retry_after).map_err(|e| {
                Error::unspecified(format!("Invalid Retry-After header {}", url))
                    .with_status(StatusCode::PAYLOAD_TOO_LARGE)
                    .with_cause(e)
            })?;
            if retry_after.is_resource_limit() {
                return Err(
                    Error::unspecified(format!("Resource limit exceeded at URL {}", url))
                        .with_status(StatusCode::PAYLOAD_TOO_LARGE),
                );
            }
            if attempt == max_attempts {
                break;
            }

            // An elapsed date means retry now.
            let delay = retry_after.delay().min(self.inner.retry_config.max_wait);
            tracing::warn!(
                delay_ms = delay.as_millis(),
                attempt = attempt,
                url = %url,
                "Too many requests - waiting before retry"
            );
            tokio::time::sleep(delay).await;
        }

        Err(Error::unspecified(format!(
            "Maximum number of attempts ({}) reached sending request to {}",
            max_attempts, url
        ))
        .with_status(StatusCode::PAYLOAD_TOO_LARGE))
    }
}

fn transport_error(url: &Url, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::timeout(url, format!("request to {} timed out", url)).with_cause(e)
    } else {
        Error::unspecified(format!("failed executing the request {}", url)).with_cause(e)
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use courier::{retry::RetryConfig, ClientBuilder};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), courier::Error> {
/// let client = ClientBuilder::new()
///     .agent_name("my-app/1.0")
///     .timeout(Duration::from_secs(30))
///     .retry_config(
///         RetryConfig::builder()
///             .max_send_attempts(5)
///             .max_wait(Duration::from_secs(60))
///             .build(),
///     )
///     .default_header("X-Auth-Token", "secret")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    agent_name: Option<String>,
    base_url: Option<Url>,
    default_headers: HeaderMap,
    retry_config: RetryConfig,
    timeout: Option<Duration>,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            agent_name: None,
            base_url: None,
            default_headers: HeaderMap::new(),
            retry_config: RetryConfig::default(),
            timeout: None,
            http_client: None,
        }
    }

    /// Sets the `User-Agent` sent with every request.
    ///
    /// Defaults to `courier/<version>`.
    pub fn agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    /// Sets a base URL that relative request URLs are resolved against.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref()).map_err(|e| {
            Error::unspecified(format!("Invalid base URL: {}", url.as_ref())).with_cause(e)
        })?;
        self.base_url = Some(url);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// Headers set on an individual request replace defaults of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::unspecified("Invalid header name").with_cause(e))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::unspecified("Invalid header value").with_cause(e))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the total number of attempts for requests the server asks to retry.
    ///
    /// Defaults to 3.
    pub fn max_send_attempts(mut self, attempts: usize) -> Self {
        self.retry_config.max_send_attempts = attempts;
        self
    }

    /// Sets the retry configuration.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Sets a timeout for each attempt.
    ///
    /// A request that times out fails with a `Timeout` error.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Uses a pre-configured `reqwest::Client` as the transport.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent name is not a valid header value, if
    /// `max_send_attempts` is zero, or if the transport cannot be built.
    pub fn build(self) -> Result<Client> {
        if self.retry_config.max_send_attempts == 0 {
            return Err(Error::unspecified(
                "Invalid configuration: max send attempts must be at least 1",
            ));
        }

        let agent_name = self
            .agent_name
            .unwrap_or_else(|| format!("courier/{}", env!("CARGO_PKG_VERSION")));
        let agent = HeaderValue::try_from(agent_name.as_str()).map_err(|e| {
            Error::unspecified(format!("Invalid agent name: {}", agent_name)).with_cause(e)
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder().build().map_err(|e| {
                Error::unspecified("Failed to build HTTP client").with_cause(e)
            })?,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                agent,
                base_url: self.base_url,
                default_headers: self.default_headers,
                retry_config: self.retry_config,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
