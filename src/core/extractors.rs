//! Axum extractors for list requests
//!
//! `axum::extract::Query` deserializes into a fixed struct, which loses
//! repeated keys and bracketed operator keys. [`Params`] keeps the whole query
//! string as [`RawParameters`] instead.

use crate::core::params::RawParameters;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

/// Extractor for the raw, untyped query parameters of a request
///
/// Never rejects: a request without a query string yields an empty map.
///
/// # Example
///
/// ```rust,ignore
/// async fn list(Params(raw): Params) -> Json<Value> {
///     let query = translator.translate(QueryDescriptor::new("topics"), &raw);
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Params(pub RawParameters);

impl<S> FromRequestParts<S> for Params
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .uri
            .query()
            .map(RawParameters::from_query_str)
            .unwrap_or_default();
        Ok(Params(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(uri: &str) -> RawParameters {
        let (mut parts, _) = Request::builder()
            .uri(uri)
            .body(())
            .expect("valid request")
            .into_parts();
        let Params(raw) = Params::from_request_parts(&mut parts, &())
            .await
            .expect("infallible");
        raw
    }

    #[tokio::test]
    async fn test_extracts_query_string() {
        let raw = extract("/api/v1/topics?category=road&price%5Bgte%5D=10&tags=a&tags=b").await;
        assert_eq!(raw.get_str("category"), Some("road"));
        assert!(raw.get("price").is_some());
        assert_eq!(raw.get("tags").map(|v| v.values().len()), Some(2));
    }

    #[tokio::test]
    async fn test_no_query_string() {
        let raw = extract("/api/v1/topics").await;
        assert!(raw.is_empty());
    }
}
