//! Example of streaming a binary upload and download.
//!
//! The upload body is produced by a factory so it can be sent again if the
//! server asks the client to back off.
//!
//! Run with: `cargo run --example binary_upload`

use bytes::Bytes;
use courier::{Client, Error, RequestBody, RequestData};
use futures_util::StreamExt;
use http::{Method, StatusCode};

const CHUNK: &[u8] = b"courier binary demo\n";
const CHUNKS: usize = 64;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("courier=debug,binary_upload=info")
        .init();

    let client = Client::builder()
        .agent_name("courier-demo/0.1")
        .max_send_attempts(5)
        .build()?;

    let token = std::env::var("OBJECT_STORE_TOKEN").ok();
    let url = std::env::var("OBJECT_URL")
        .unwrap_or_else(|_| "https://httpbin.org/anything/blob".to_string());

    let body = RequestBody::stream((CHUNK.len() * CHUNKS) as u64, || {
        let chunks = (0..CHUNKS).map(|_| Ok::<_, std::io::Error>(Bytes::from_static(CHUNK)));
        reqwest::Body::wrap_stream(futures_util::stream::iter(chunks))
    });
    let request = RequestData::new()
        .with_expected_status([StatusCode::OK, StatusCode::CREATED])
        .with_body(body);

    println!("=== Upload ===");
    let uploaded = client
        .binary_request(Method::PUT, &url, token.as_deref(), &request)
        .await?;
    println!(
        "Status: {}, attempts: {}, latency: {:?}",
        uploaded.status, uploaded.attempts, uploaded.latency
    );

    println!("\n=== Download ===");
    let download = client
        .binary_request(Method::GET, &url, token.as_deref(), &RequestData::new())
        .await?;
    let mut stream = std::pin::pin!(download.data.into_stream());
    let mut total = 0;
    while let Some(chunk) = stream.next().await {
        total += chunk?.len();
    }
    println!("Downloaded {} bytes", total);

    Ok(())
}
