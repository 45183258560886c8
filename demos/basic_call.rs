//! Basic example of JSON GET and POST requests.
//!
//! Run with: `cargo run --example basic_call`

use courier::{Client, Error, RequestData};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("courier=debug,basic_call=info")
        .init();

    let client = Client::builder()
        .agent_name("courier-demo/0.1")
        .base_url("https://jsonplaceholder.typicode.com")?
        .build()?;

    println!("=== GET ===");
    let response = client.get::<Post>("/posts/1").await?;
    if let Some(post) = &response.data {
        println!("Post {}: {}", post.id, post.title);
    }
    println!("Status: {}, latency: {:?}", response.status, response.latency);

    println!("\n=== GET with query parameters ===");
    let request = RequestData::new().with_query_param("userId", "1");
    let posts = client
        .json_request::<Vec<Post>>(Method::GET, "/posts", &request)
        .await?;
    println!("User 1 has {} posts", posts.data.map_or(0, |p| p.len()));

    println!("\n=== POST ===");
    let request = RequestData::new()
        .expect_status(StatusCode::CREATED)
        .with_json(&NewPost {
            title: "Courier".to_string(),
            body: "Sent with courier".to_string(),
            user_id: 1,
        })?;
    let created = client
        .json_request::<Post>(Method::POST, "/posts", &request)
        .await?;
    println!("Created: {:?}", created.data.map(|p| p.id));

    println!("\n=== DELETE ===");
    let deleted = client.delete("/posts/1").await?;
    println!("Delete status: {}", deleted.status);

    Ok(())
}
