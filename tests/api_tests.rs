//! REST round-trip tests over the in-memory store
//!
//! JSON -> HTTP request -> handler -> translator -> DocumentStore -> JSON

use axum::http::StatusCode;
use axum_test::TestServer;
use observers::prelude::*;
use observers::core::query::Document;

fn object(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => panic!("fixture must be an object"),
    }
}

async fn seeded_store() -> InMemoryDocumentStore {
    let store = InMemoryDocumentStore::new()
        .with_collection("topics")
        .with_collection("tags")
        .with_collection("reports")
        .with_collection("votes")
        .with_collection("users");

    for (id, name) in [("tag-red", "Red"), ("tag-blue", "blue"), ("tag-green", "green")] {
        store
            .insert("tags", object(json!({"_id": id, "name": name})))
            .await
            .unwrap();
    }

    store
        .insert("votes", object(json!({"_id": "vote-1", "value": 1})))
        .await
        .unwrap();
    store
        .insert("reports", object(json!({"_id": "rep-1", "text": "Car tyre burst", "votes": ["vote-1"]})))
        .await
        .unwrap();

    let topics = [
        json!({"_id": "t1", "title": "Pot hole on Main St", "description": "Deep and wide", "category": "road", "reportCount": 12, "slug": "pot-hole", "createdAt": "2024-03-01T10:00:00Z", "tags": ["tag-red"], "reports": ["rep-1"]}),
        json!({"_id": "t2", "title": "Broken street lamp", "description": "Dark corner near the park", "category": "lighting", "reportCount": 3, "slug": "broken-lamp", "createdAt": "2024-03-04T10:00:00Z", "tags": ["tag-blue", "tag-green"]}),
        json!({"_id": "t3", "title": "Graffiti", "description": "School wall, pothole nearby", "category": "vandalism", "reportCount": 7, "slug": "graffiti", "createdAt": "2024-03-02T10:00:00Z", "tags": ["tag-green"]}),
        json!({"_id": "t4", "title": "Flooded underpass", "description": "Every time it rains", "category": "road", "reportCount": 25, "slug": "flooded-underpass", "createdAt": "2024-03-03T10:00:00Z", "tags": []}),
    ];
    for topic in topics {
        store.insert("topics", object(topic)).await.unwrap();
    }

    store
}

async fn make_server() -> TestServer {
    let app = ServerBuilder::new()
        .with_store(seeded_store().await)
        .with_config(ObserversConfig::default_config())
        .build()
        .unwrap();
    TestServer::new(app)
}

fn ids(body: &Value) -> Vec<String> {
    body["data"]["data"]
        .as_array()
        .expect("data.data is an array")
        .iter()
        .filter_map(|d| d["_id"].as_str().map(str::to_string))
        .collect()
}

// ==============================================================
// List
// ==============================================================

#[tokio::test]
async fn test_list_envelope_and_default_sort() {
    let server = make_server().await;

    let response = server.get("/api/v1/topics").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["results"], 4);
    // newest first
    assert_eq!(ids(&body), vec!["t2", "t4", "t3", "t1"]);
}

#[tokio::test]
async fn test_list_hides_version_field_by_default() {
    let server = make_server().await;

    let body: Value = server.get("/api/v1/topics").await.json();
    let first = &body["data"]["data"][0];
    assert!(first.get("__v").is_none());
    assert!(first.get("title").is_some());
}

#[tokio::test]
async fn test_list_equality_filter() {
    let server = make_server().await;

    let body: Value = server
        .get("/api/v1/topics?category=road&sort=title")
        .await
        .json();
    assert_eq!(ids(&body), vec!["t4", "t1"]);
}

#[tokio::test]
async fn test_list_range_filter() {
    let server = make_server().await;

    let body: Value = server
        .get("/api/v1/topics?reportCount%5Bgte%5D=7&reportCount%5Blt%5D=25&sort=reportCount")
        .await
        .json();
    assert_eq!(ids(&body), vec!["t3", "t1"]);
}

#[tokio::test]
async fn test_list_repeated_key_is_membership() {
    let server = make_server().await;

    let body: Value = server
        .get("/api/v1/topics?category=lighting&category=vandalism&sort=title")
        .await
        .json();
    assert_eq!(ids(&body), vec!["t2", "t3"]);
}

#[tokio::test]
async fn test_list_unknown_operator_is_ignored() {
    let server = make_server().await;

    let body: Value = server
        .get("/api/v1/topics?reportCount%5B%24where%5D=1")
        .await
        .json();
    assert_eq!(body["results"], 4);
}

#[tokio::test]
async fn test_list_search_matches_title_or_description() {
    let server = make_server().await;

    let body: Value = server
        .get("/api/v1/topics?search=POT+HOLE&sort=title")
        .await
        .json();
    assert_eq!(ids(&body), vec!["t1"]);

    let body: Value = server
        .get("/api/v1/topics?search=pothole")
        .await
        .json();
    assert_eq!(ids(&body), vec!["t3"]);
}

#[tokio::test]
async fn test_list_search_is_literal() {
    let server = make_server().await;

    let body: Value = server.get("/api/v1/topics?search=.%2A").await.json();
    assert_eq!(body["results"], 0);
}

#[tokio::test]
async fn test_list_projection() {
    let server = make_server().await;

    let body: Value = server
        .get("/api/v1/topics?fields=title,slug&sort=slug")
        .await
        .json();
    let first = body["data"]["data"][0].as_object().unwrap();
    let mut keys: Vec<&str> = first.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["_id", "slug", "title"]);
}

#[tokio::test]
async fn test_list_pagination() {
    let server = make_server().await;

    let body: Value = server
        .get("/api/v1/topics?sort=reportCount&page=2&limit=2")
        .await
        .json();
    assert_eq!(ids(&body), vec!["t1", "t4"]);

    let body: Value = server
        .get("/api/v1/topics?page=3&limit=2")
        .await
        .json();
    assert_eq!(body["results"], 0);
}

#[tokio::test]
async fn test_list_malformed_pagination_falls_back() {
    let server = make_server().await;

    let response = server.get("/api/v1/topics?page=abc&limit=-4").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["results"], 4);
}

#[tokio::test]
async fn test_list_populates_topic_tags() {
    let server = make_server().await;

    let body: Value = server.get("/api/v1/topics?sort=title").await.json();
    let broken_lamp = &body["data"]["data"][0];
    assert_eq!(broken_lamp["_id"], "t2");
    assert_eq!(broken_lamp["tags"][0]["name"], "blue");
}

#[tokio::test]
async fn test_list_unknown_collection() {
    let server = make_server().await;

    let response = server.get("/api/v1/widgets").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["status"], "fail");
    assert_eq!(body["code"], "UNKNOWN_COLLECTION");
}

// ==============================================================
// Single documents
// ==============================================================

#[tokio::test]
async fn test_get_document() {
    let server = make_server().await;

    let response = server.get("/api/v1/topics/t3").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["data"]["title"], "Graffiti");

    let response = server.get("/api/v1/topics/nope").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_document_populates_references() {
    let server = make_server().await;

    let body: Value = server.get("/api/v1/topics/t1").await.json();
    let topic = &body["data"]["data"];
    assert_eq!(topic["tags"][0]["name"], "Red");
    assert_eq!(topic["reports"][0]["text"], "Car tyre burst");
    assert!(topic.get("__v").is_none());
}

#[tokio::test]
async fn test_populated_tags_hide_version_field() {
    let server = make_server().await;

    let body: Value = server.get("/api/v1/topics?sort=title").await.json();
    let tag = &body["data"]["data"][0]["tags"][0];
    assert_eq!(tag["name"], "blue");
    assert!(tag.get("__v").is_none());
}

#[tokio::test]
async fn test_create_update_delete_document() {
    let server = make_server().await;

    let response = server
        .post("/api/v1/reports")
        .json(&json!({"text": "Still broken", "topic": "t2"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    let id = created["data"]["data"]["_id"]
        .as_str()
        .expect("id assigned")
        .to_string();

    let response = server
        .patch(&format!("/api/v1/reports/{}", id))
        .json(&json!({"text": "Fixed"}))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["data"]["data"]["text"], "Fixed");
    assert_eq!(updated["data"]["data"]["topic"], "t2");

    server
        .delete(&format!("/api/v1/reports/{}", id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .delete(&format!("/api/v1/reports/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_rejects_non_object() {
    let server = make_server().await;

    let response = server.post("/api/v1/reports").json(&json!([1, 2, 3])).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// ==============================================================
// Overview
// ==============================================================

#[tokio::test]
async fn test_overview_without_tags() {
    let server = make_server().await;

    let response = server.get("/overview").await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["topics"].as_array().map(Vec::len), Some(4));
    assert_eq!(body["tags"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["nomatch"], false);

    let popular = body["mostPopularTopics"].as_array().unwrap();
    assert_eq!(popular[0]["_id"], "t4");
    assert!(popular[0].get("description").is_none());
}

#[tokio::test]
async fn test_overview_tag_intersection() {
    let server = make_server().await;

    let body: Value = server.get("/overview?tags=RED%7Cblue").await.json();
    let titles: Vec<&str> = body["topics"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["_id"].as_str())
        .collect();
    assert_eq!(titles, vec!["t2", "t1"]);

    let body: Value = server
        .get("/overview?tags=nothing&tags=green")
        .await
        .json();
    assert_eq!(body["topics"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_overview_tags_with_field_selection() {
    let server = make_server().await;

    let response = server.get("/overview?tags=red&fields=title,slug").await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["nomatch"], false);
    let topics = body["topics"].as_array().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["_id"], "t1");
    assert_eq!(topics[0]["slug"], "pot-hole");
    assert!(topics[0].get("description").is_none());

    let body: Value = server
        .get("/overview?tags=red&fields=-tags,-description")
        .await
        .json();
    assert_eq!(body["topics"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_overview_no_match() {
    let server = make_server().await;

    let body: Value = server.get("/overview?tags=yellow").await.json();
    assert_eq!(body["nomatch"], true);
    assert_eq!(body["topics"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_overview_tag_filter_runs_after_pagination() {
    let server = make_server().await;

    // Page 1 of size 1 holds only the newest topic (t2, blue/green).
    // The red topic on a later page is not pulled in.
    let body: Value = server.get("/overview?tags=red&limit=1").await.json();
    assert_eq!(body["nomatch"], true);
}

// ==============================================================
// Topic by slug
// ==============================================================

#[tokio::test]
async fn test_topic_by_slug_populates_nested_references() {
    let server = make_server().await;

    let response = server.get("/topics/pot-hole").await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["status"], "success");
    assert_eq!(body["topic"]["_id"], "t1");
    assert_eq!(body["topic"]["tags"][0]["name"], "Red");
    assert_eq!(body["topic"]["reports"][0]["votes"][0]["value"], 1);
    assert_eq!(body["tags"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_topic_by_unknown_slug() {
    let server = make_server().await;

    let response = server.get("/topics/no-such-topic").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "DOCUMENT_NOT_FOUND");
}

#[tokio::test]
async fn test_health() {
    let server = make_server().await;
    server.get("/health").await.assert_status_ok();
}
