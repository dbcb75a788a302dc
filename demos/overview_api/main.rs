//! Overview API example
//!
//! This example demonstrates:
//! - Seeding an in-memory document store with topics and tags
//! - Serving the generic collection endpoints and the topic overview
//! - Filtering, search, sorting, projection and pagination from the query string

use observers::core::query::Document;
use observers::prelude::*;
use tracing_subscriber::EnvFilter;

fn object(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

async fn populate_test_data(store: &InMemoryDocumentStore) -> Result<()> {
    for (id, name) in [("road", "road"), ("light", "lighting"), ("park", "park")] {
        store
            .insert("tags", object(json!({"_id": id, "name": name})))
            .await?;
    }

    let topics = [
        json!({"title": "Pot hole on Main St", "description": "Deep hole next to the bakery", "category": "road", "reportCount": 12, "slug": "pot-hole-main-st", "tags": ["road"]}),
        json!({"title": "Broken street lamp", "description": "Dark corner near the park entrance", "category": "lighting", "reportCount": 3, "slug": "broken-street-lamp", "tags": ["light", "park"]}),
        json!({"title": "Overflowing bins", "description": "Not emptied for two weeks", "category": "waste", "reportCount": 7, "slug": "overflowing-bins", "tags": ["park"]}),
    ];
    for topic in topics {
        store.insert("topics", object(topic)).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,observers=debug")),
        )
        .init();

    let config = match std::env::var("OBSERVERS_CONFIG") {
        Ok(path) => ObserversConfig::from_yaml_file(&path)?,
        Err(_) => ObserversConfig::default_config(),
    };

    let store = config
        .collections
        .iter()
        .fold(InMemoryDocumentStore::new(), |store, c| {
            store.with_collection(c.name.clone())
        });
    populate_test_data(&store).await?;

    println!("🚀 Observers overview API");
    println!("\n🌐 Server running on http://127.0.0.1:3000");
    println!("\n📚 Routes:");
    println!("    GET    /overview?tags=road|park&search=lamp");
    println!("    GET    /api/v1/{{collection}}?category=road&reportCount[gte]=5&sort=-reportCount");
    println!("    POST   /api/v1/{{collection}}");
    println!("    GET    /api/v1/{{collection}}/{{id}}");
    println!("    PATCH  /api/v1/{{collection}}/{{id}}");
    println!("    DELETE /api/v1/{{collection}}/{{id}}");

    ServerBuilder::new()
        .with_store(store)
        .with_config(config)
        .with_permissive_cors()
        .serve("127.0.0.1:3000")
        .await
}
