//! # Courier - an HTTP client wrapper for JSON and binary APIs
//!
//! Courier standardizes how services talk to HTTP APIs: it sends JSON,
//! plain-text and binary requests, checks the response status against what
//! the caller expects, and turns failures into a small set of typed errors
//! that business logic can act on.
//!
//! ## Quick Start
//!
//! ```no_run
//! use courier::{Client, RequestData};
//! use http::{Method, StatusCode};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct NewItem {
//!     name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Item {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), courier::Error> {
//!     let client = Client::new("inventory-sync/1.0")?;
//!
//!     let request = RequestData::new()
//!         .with_header("X-Auth-Token", "secret")?
//!         .expect_status(StatusCode::CREATED)
//!         .with_json(&NewItem { name: "x".to_string() })?;
//!
//!     let created = client
//!         .json_request::<Item>(Method::POST, "https://api.example.com/items", &request)
//!         .await?;
//!     println!("Status: {}", created.status);
//!     if let Some(item) = created.data {
//!         println!("Created item {}: {}", item.id, item.name);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is an [`Error`] with an [`ErrorCode`]. Unexpected statuses
//! are classified: 404 is `NotFound`, 401 and 403 are `Unauthorised`, and a
//! 400 whose body says "already exists" is `DuplicateValue`. The code is
//! resolved through the whole cause chain.
//!
//! ```no_run
//! use courier::{Client, ErrorCode};
//!
//! # async fn example() -> Result<(), courier::Error> {
//! # let client = Client::new("example")?;
//! match client.get::<serde_json::Value>("https://api.example.com/items/99").await {
//!     Ok(response) => println!("Found: {:?}", response.data),
//!     Err(e) if e.code() == ErrorCode::NotFound => println!("No such item"),
//!     Err(e) => {
//!         eprintln!("Request failed with status {:?}: {}", e.status(), e);
//!         if let Some(http) = e.http_status_error() {
//!             eprintln!("Server said: {}", http.message());
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Overload Retries
//!
//! When a server answers `413 Payload Too Large` with a `Retry-After` header,
//! the client waits the indicated time and sends the request again, up to
//! three attempts by default. Nothing else is retried.
//!
//! ```no_run
//! use courier::{retry::RetryConfig, Client};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), courier::Error> {
//! let client = Client::builder()
//!     .agent_name("batch-loader/2.1")
//!     .retry_config(
//!         RetryConfig::builder()
//!             .max_send_attempts(5)
//!             .max_wait(Duration::from_secs(60))
//!             .build(),
//!     )
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod request;
mod response;
pub mod retry;
mod validate;

pub use client::{Client, ClientBuilder};
pub use error::{
    as_taxonomy_error, BoxError, Error, ErrorCode, ErrorEnvelope, ErrorResponse, HttpStatusError,
    Result,
};
pub use request::{BodyFactory, RequestBody, RequestData};
pub use response::{Response, ResponseStream};
pub use validate::classify_failure;
