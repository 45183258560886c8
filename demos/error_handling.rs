//! Example of reacting to classified errors.
//!
//! Run with: `cargo run --example error_handling`

use courier::{Client, ErrorCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct User {
    id: u32,
    name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("courier=info,error_handling=info")
        .init();

    let client = match Client::builder()
        .agent_name("courier-demo/0.1")
        .base_url("https://jsonplaceholder.typicode.com")
        .and_then(|builder| builder.build())
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to build client: {}", e);
            return;
        }
    };

    for path in ["/users/1", "/users/99999", "/not-a-route"] {
        println!("=== GET {} ===", path);
        match client.get::<User>(path).await {
            Ok(response) => println!("Found: {:?}", response.data),
            Err(e) => match e.code() {
                ErrorCode::NotFound => println!("Not found (status {:?})", e.status()),
                ErrorCode::Unauthorised => println!("Check your credentials"),
                ErrorCode::DuplicateValue => println!("Already exists: {}", e.message()),
                ErrorCode::Timeout => println!("Timed out, try again later"),
                ErrorCode::Unspecified => {
                    println!("Request failed: {}", e);
                    if let Some(http) = e.http_status_error() {
                        println!("Server said ({}): {}", http.status(), http.message());
                    }
                }
            },
        }
    }

    println!("\n=== Transport failure ===");
    match client.get::<User>("http://127.0.0.1:1/users/1").await {
        Ok(_) => println!("Unexpectedly succeeded"),
        Err(e) => println!("[{}] {}", e.code(), e),
    }
}
