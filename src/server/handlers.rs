//! HTTP handlers for collection endpoints and the topic overview
//!
//! All collection handlers are generic: the collection name comes from the
//! path and must be declared in the [`ObserversConfig`].

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::ObserversConfig;
use crate::core::error::{ObserversError, ObserversResult, StoreError};
use crate::core::extractors::Params;
use crate::core::filter::{Condition, FilterExpression};
use crate::core::params::RawParameters;
use crate::core::query::{Document, ItemResponse, ListResponse, Pagination, QueryDescriptor};
use crate::core::store::{DocumentStore, ID_FIELD};
use crate::core::tags::{TAGS_KEY, TagFilter};
use crate::core::translator::QueryTranslator;

/// Collection holding topics
pub const TOPICS: &str = "topics";

/// Collection holding tags
pub const TAGS: &str = "tags";

/// Human-readable unique key of a topic
pub const SLUG_FIELD: &str = "slug";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<ObserversConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: Arc<ObserversConfig>) -> Self {
        Self { store, config }
    }

    /// Translator and base query of a configured collection
    fn query_parts(&self, collection: &str) -> ObserversResult<(QueryTranslator, QueryDescriptor)> {
        let translator = self.config.translator_for(collection);
        let base = self.config.base_query(collection);
        match (translator, base) {
            (Some(translator), Some(base)) => Ok((translator, base)),
            _ => Err(StoreError::UnknownCollection(collection.to_string()).into()),
        }
    }

    /// First document whose `field` equals `value`, populated and without the version field
    async fn find_one(&self, collection: &str, field: &str, value: &str) -> ObserversResult<Option<Value>> {
        let (translator, base) = self.query_parts(collection)?;
        let mut filter = FilterExpression::new();
        filter.insert(
            field,
            Condition::Equals {
                value: value.to_string(),
            },
        );
        let query = translator
            .limit_fields(base, &RawParameters::new())
            .with_filter(filter)
            .with_pagination(Pagination::new(1, 1));
        Ok(self.store.find(&query).await?.into_iter().next())
    }

    fn ensure_collection(&self, collection: &str) -> ObserversResult<()> {
        match self.config.collection(collection) {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownCollection(collection.to_string()).into()),
        }
    }
}

/// GET /api/v1/{collection}
///
/// Query params: `?category=road&price[gte]=10&search=hole&sort=-title&fields=title,slug&page=2&limit=20`
pub async fn list_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Params(raw): Params,
) -> ObserversResult<Json<ListResponse<Value>>> {
    let (translator, base) = state.query_parts(&collection)?;
    let query = translator.translate(base, &raw);
    let data = state.store.find(&query).await?;
    Ok(Json(ListResponse::success(data)))
}

/// GET /api/v1/{collection}/{id}
pub async fn get_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ObserversResult<Json<ItemResponse<Value>>> {
    match state.find_one(&collection, ID_FIELD, &id).await? {
        Some(doc) => Ok(Json(ItemResponse::success(doc))),
        None => Err(StoreError::NotFound { collection, id }.into()),
    }
}

/// POST /api/v1/{collection}
pub async fn create_document(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> ObserversResult<impl IntoResponse> {
    state.ensure_collection(&collection)?;
    let document = into_document(body)?;
    let created = state.store.insert(&collection, document).await?;
    tracing::info!(collection = %collection, id = %created["_id"], "Document created");
    Ok((StatusCode::CREATED, Json(ItemResponse::success(created))))
}

/// PATCH /api/v1/{collection}/{id}
pub async fn update_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ObserversResult<Json<ItemResponse<Value>>> {
    state.ensure_collection(&collection)?;
    let changes = into_document(body)?;
    match state.store.update(&collection, &id, changes).await? {
        Some(doc) => Ok(Json(ItemResponse::success(doc))),
        None => Err(StoreError::NotFound { collection, id }.into()),
    }
}

/// DELETE /api/v1/{collection}/{id}
pub async fn delete_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ObserversResult<StatusCode> {
    state.ensure_collection(&collection)?;
    if state.store.delete(&collection, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StoreError::NotFound { collection, id }.into())
    }
}

fn into_document(body: Value) -> ObserversResult<Document> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(ObserversError::Request(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Response of the topic overview
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewResponse {
    pub status: String,
    pub topics: Vec<Value>,
    pub tags: Vec<Value>,
    pub most_popular_topics: Vec<Value>,
    pub nomatch: bool,
}

/// Parameters of the "most popular topics" side list
fn most_popular_params() -> RawParameters {
    RawParameters::new()
        .with("limit", "5")
        .with("sort", "-reportCount")
        .with("fields", "title,category,createdAt,reportCount,slug")
}

/// GET /overview
///
/// Topic listing with search, tag population and the tag post-filter
/// (`?tags=red|blue&tags=green`), plus every tag and the most reported topics.
pub async fn overview(
    State(state): State<AppState>,
    Params(mut raw): Params,
) -> ObserversResult<Json<OverviewResponse>> {
    let tag_filter = TagFilter::take_from(&mut raw);

    let (translator, base) = state.query_parts(TOPICS)?;
    let mut query = translator.translate(base, &raw);
    if tag_filter.is_some() {
        // The post-filter reads the populated tags
        query.projection = query.projection.retaining(TAGS_KEY);
    }
    let fetched = state.store.find(&query).await?;

    // Runs on the already paginated page, see `TagFilter`
    let topics = match &tag_filter {
        Some(filter) => filter.retain(fetched),
        None => fetched,
    };

    state.ensure_collection(TAGS)?;
    let tags = state.store.find(&QueryDescriptor::new(TAGS)).await?;

    let most_popular = translator.translate(QueryDescriptor::new(TOPICS), &most_popular_params());
    let most_popular_topics = state.store.find(&most_popular).await?;

    Ok(Json(OverviewResponse {
        status: "success".to_string(),
        nomatch: topics.is_empty(),
        topics,
        tags,
        most_popular_topics,
    }))
}

/// Response of the single topic page
#[derive(Debug, Serialize)]
pub struct TopicResponse {
    pub status: String,
    pub topic: Value,
    pub tags: Vec<Value>,
}

/// GET /topics/{slug}
///
/// One topic looked up by slug, with its configured references populated
/// (tags, reports and their votes), plus every tag.
pub async fn topic_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ObserversResult<Json<TopicResponse>> {
    let Some(topic) = state.find_one(TOPICS, SLUG_FIELD, &slug).await? else {
        return Err(StoreError::NotFound {
            collection: TOPICS.to_string(),
            id: slug,
        }
        .into());
    };

    state.ensure_collection(TAGS)?;
    let tags = state.store.find(&QueryDescriptor::new(TAGS)).await?;

    Ok(Json(TopicResponse {
        status: "success".to_string(),
        topic,
        tags,
    }))
}
