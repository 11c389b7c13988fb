use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use tower::ServiceExt;

use kiosk::catalog::{MemoryCatalog, ProductStore};
use kiosk::embedding::{HashingEmbedder, TextEmbedder};
use kiosk::error::{KioskError, Result};
use kiosk::hybrid::{HybridRetriever, HybridSearchConfig};
use kiosk::keyword_index::{InvertedKeywordIndex, KeywordIndex};
use kiosk::product::{KeywordDocument, Product, ScoredId};
use kiosk::server::{AppState, SEARCH_FAILURE_MESSAGE, router};
use kiosk::vector_index::{DistanceMetric, FlatIndexConfig, FlatVectorIndex, VectorIndex};

const DIMENSION: usize = 128;

struct QuotaExhausted;

#[async_trait]
impl TextEmbedder for QuotaExhausted {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(KioskError::embedding("429 quota exhausted for key sk-live-123"))
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Keyword index that always reports an id the catalog has never seen.
struct GhostKeywordIndex;

#[async_trait]
impl KeywordIndex for GhostKeywordIndex {
    async fn query_keyword(&self, _text: &str, _k: usize) -> Result<Vec<ScoredId>> {
        Ok(vec![ScoredId::new("ghost", 3.0)])
    }

    async fn upsert(&self, _documents: Vec<KeywordDocument>) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _ids: &[String]) -> Result<()> {
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        Ok(())
    }
}

fn products() -> Vec<Product> {
    vec![
        Product::new("a", "Dark Down Jacket", "warm winter coat", 149.0, "dark_down_jacket.png"),
        Product::new("b", "Red Sneakers", "running shoes", 89.0, "red_sneakers.png"),
        Product::new("c", "Wool Scarf", "soft and warm", 25.0, "wool_scarf.png"),
    ]
}

async fn app_with(
    embedder: Arc<dyn TextEmbedder>,
    keyword_index: Option<Arc<dyn KeywordIndex>>,
) -> axum::Router {
    let indexer = HashingEmbedder::new(DIMENSION).unwrap();
    let vectors = Arc::new(FlatVectorIndex::new(FlatIndexConfig {
        dimension: DIMENSION,
        metric: DistanceMetric::Cosine,
    }));
    let keywords: Arc<dyn KeywordIndex> = Arc::new(InvertedKeywordIndex::default());
    let catalog = Arc::new(MemoryCatalog::new());
    for product in products() {
        let vector = indexer.embed(&product.search_text()).await.unwrap();
        vectors.upsert(vec![product.embedding_record(vector)]).await.unwrap();
        keywords.upsert(vec![product.keyword_document()]).await.unwrap();
        catalog.insert(vec![product]).await.unwrap();
    }

    let keyword_index = keyword_index.unwrap_or(keywords);
    let retriever = HybridRetriever::new(
        embedder,
        vectors,
        keyword_index,
        catalog,
        HybridSearchConfig::default(),
    )
    .unwrap();
    router(AppState::new(Arc::new(retriever)))
}

async fn app() -> axum::Router {
    app_with(Arc::new(HashingEmbedder::new(DIMENSION).unwrap()), None).await
}

async fn get(app: axum::Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_search_returns_ranked_products() {
    let response = get(app().await, "/search?query=warm%20coat").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    let results = body.as_array().unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= 3);
    // The only product containing both words leads.
    assert_eq!(results[0]["id"], "a");
    assert_eq!(results[0]["name"], "Dark Down Jacket");
    assert_eq!(results[0]["imageId"], "dark_down_jacket.png");
    assert_eq!(results[0]["price"], 149.0);
}

#[tokio::test]
async fn test_query_is_trimmed() {
    let padded = json(get(app().await, "/search?query=%20%20warm%20coat%20").await).await;
    let plain = json(get(app().await, "/search?query=warm%20coat").await).await;
    assert_eq!(padded, plain);
}

#[tokio::test]
async fn test_missing_query_is_rejected() {
    let response = get(app().await, "/search").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json(response).await,
        serde_json::json!({"error": "validation", "reason": "missing"})
    );
}

#[tokio::test]
async fn test_blank_query_is_rejected() {
    for uri in ["/search?query=", "/search?query=%20%20%20"] {
        let response = get(app().await, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json(response).await["reason"], "empty");
    }
}

#[tokio::test]
async fn test_repeated_query_is_wrong_type() {
    let response = get(app().await, "/search?query=coat&query=shoes").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["reason"], "wrong_type");
}

#[tokio::test]
async fn test_unrelated_params_are_ignored() {
    let response = get(app().await, "/search?query=shoes&page=2").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_embedding_failure_is_opaque_500() {
    let app = app_with(Arc::new(QuotaExhausted), None).await;
    let response = get(app, "/search?query=warm%20coat").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json(response).await;
    assert_eq!(
        body,
        serde_json::json!({"error": "embedding", "message": SEARCH_FAILURE_MESSAGE})
    );
    assert!(!body.to_string().contains("sk-live"));
}

#[tokio::test]
async fn test_unknown_indexed_id_is_fusion_500() {
    let app = app_with(
        Arc::new(HashingEmbedder::new(DIMENSION).unwrap()),
        Some(Arc::new(GhostKeywordIndex)),
    )
    .await;
    let response = get(app, "/search?query=warm%20coat").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(response).await["error"], "fusion");
}

#[tokio::test]
async fn test_healthz() {
    let response = get(app().await, "/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);
}
