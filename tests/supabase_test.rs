use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use serde_json::{Value, json};

use kiosk::catalog::ProductStore;
use kiosk::config::{EmbeddingConfig, KioskConfig, StoreConfig};
use kiosk::error::SearchStage;
use kiosk::keyword_index::KeywordIndex;
use kiosk::product::Product;
use kiosk::supabase::{
    SupabaseClient, SupabaseConfig, SupabaseKeywordIndex, SupabaseProductStore,
    SupabaseVectorIndex,
};
use kiosk::vector_index::VectorIndex;

const KEY: &str = "anon-test-key";

/// One request as seen by the mock PostgREST server.
#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    params: Vec<(String, String)>,
    headers: HeaderMap,
    body: Value,
}

impl Recorded {
    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Log = Arc<Mutex<Vec<Recorded>>>;

async fn postgrest(
    State(log): State<Log>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let id_filter = params
        .iter()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.clone());
    log.lock().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        params,
        headers: headers.clone(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let returning = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("return=representation"));

    match (method, path.as_str()) {
        // Only row "a" exists in the embedding table.
        (Method::PATCH, "/rest/v1/product_embedding") if returning => {
            if id_filter.as_deref() == Some("eq.a") {
                Json(json!([{"id": "a"}])).into_response()
            } else {
                Json(json!([])).into_response()
            }
        }
        (Method::POST, "/rest/v1/rpc/match_products") => Json(json!([
            {"id": "b", "similarity": 0.9},
            {"id": "a", "similarity": 0.8}
        ]))
        .into_response(),
        (Method::POST, "/rest/v1/rpc/kw_match_products") => {
            Json(json!([{"id": "a", "rank": 0.25}])).into_response()
        }
        (Method::POST, "/rest/v1/rpc/broken") => {
            (StatusCode::INTERNAL_SERVER_ERROR, "relation does not exist").into_response()
        }
        (Method::GET | Method::HEAD, "/rest/v1/products") => {
            let counting = headers
                .get("prefer")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("count=exact"));
            if counting {
                ([("content-range", "0-1/2")], Json(json!([]))).into_response()
            } else {
                // Rows come back in table order, not request order.
                Json(json!([
                    {"id": "b", "name": "Red Sneakers", "description": "running shoes",
                     "price": 89.0, "imageId": "red_sneakers.png"},
                    {"id": "a", "name": "Dark Down Jacket", "description": "warm winter coat",
                     "price": 149.0, "imageId": "dark_down_jacket.png"}
                ]))
                .into_response()
            }
        }
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn mock_server() -> (SocketAddr, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().fallback(postgrest).with_state(log.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, log)
}

fn config(addr: SocketAddr) -> SupabaseConfig {
    SupabaseConfig {
        url: format!("http://{addr}/"),
        anon_key: KEY.to_string(),
        ..Default::default()
    }
}

fn requests_to(log: &Log, path: &str) -> Vec<Recorded> {
    log.lock()
        .iter()
        .filter(|r| r.path == path)
        .cloned()
        .collect()
}

fn jacket() -> Product {
    Product::new("a", "Dark Down Jacket", "warm winter coat", 149.0, "dark_down_jacket.png")
}

#[tokio::test]
async fn test_hybrid_search_over_postgrest() {
    let (addr, log) = mock_server().await;
    let kiosk = KioskConfig {
        embedding: EmbeddingConfig::Hashing { dimension: 8 },
        store: StoreConfig::Supabase(config(addr)),
        ..Default::default()
    };
    let services = kiosk.build().await.unwrap();

    // b leads on similarity, a only on keywords: 0.6 beats 0.4.
    let products = services.retriever.search("Warm  coat").await.unwrap();
    let ids: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(products[1], jacket());

    let vector = requests_to(&log, "/rest/v1/rpc/match_products");
    assert_eq!(vector.len(), 1);
    assert_eq!(vector[0].body["match_count"], 3);
    assert_eq!(vector[0].body["query_embedding"].as_array().unwrap().len(), 8);
    assert_eq!(vector[0].header("apikey"), Some(KEY));
    assert_eq!(
        vector[0].header("authorization"),
        Some(format!("Bearer {KEY}").as_str())
    );

    let keyword = requests_to(&log, "/rest/v1/rpc/kw_match_products");
    assert_eq!(
        keyword[0].body,
        json!({"query_text": "warm & coat", "match_count": 10})
    );

    let reads = requests_to(&log, "/rest/v1/products");
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].param("id"), Some(r#"in.("b","a")"#));
    assert_eq!(reads[0].param("select"), Some("*"));
}

#[tokio::test]
async fn test_rpc_failure_is_attributed_to_its_stage() {
    let (addr, _log) = mock_server().await;
    let client = SupabaseClient::new(&config(addr)).unwrap();
    let index = SupabaseKeywordIndex::new(client, "product_embedding", "broken");

    let err = index.query_keyword("warm coat", 10).await.unwrap_err();
    assert_eq!(err.stage(), SearchStage::KeywordIndex);
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_keyword_query_without_terms_skips_the_rpc() {
    let (addr, log) = mock_server().await;
    let client = SupabaseClient::new(&config(addr)).unwrap();
    let index = SupabaseKeywordIndex::new(client, "product_embedding", "kw_match_products");

    assert!(index.query_keyword("?!", 10).await.unwrap().is_empty());
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn test_get_many_keeps_request_order() {
    let (addr, _log) = mock_server().await;
    let client = SupabaseClient::new(&config(addr)).unwrap();
    let store = SupabaseProductStore::new(client, "products");

    let found = store
        .get_many(&["a".to_string(), "zzz".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(found[0].as_ref().map(|p| p.id.as_str()), Some("a"));
    assert!(found[1].is_none());
    assert_eq!(found[2].as_ref().map(|p| p.id.as_str()), Some("b"));
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_write_requests() {
    let (addr, log) = mock_server().await;
    let client = SupabaseClient::new(&config(addr)).unwrap();
    let vectors = SupabaseVectorIndex::new(
        client.clone(),
        "product_embedding",
        "match_products",
        2,
    );
    let keywords =
        SupabaseKeywordIndex::new(client.clone(), "product_embedding", "kw_match_products");
    let store = SupabaseProductStore::new(client, "products");

    let product = jacket();
    store.insert(vec![product.clone()]).await.unwrap();
    vectors
        .upsert(vec![product.embedding_record(vec![0.6, 0.8])])
        .await
        .unwrap();
    keywords
        .upsert(vec![product.keyword_document()])
        .await
        .unwrap();

    let log_snapshot = log.lock().clone();
    let [insert, embed, fts] = log_snapshot.as_slice() else {
        panic!("expected three writes, got {log_snapshot:?}");
    };

    assert_eq!(insert.method, Method::POST);
    assert_eq!(insert.path, "/rest/v1/products");
    assert!(insert.header("prefer").unwrap().contains("resolution=merge-duplicates"));
    assert_eq!(insert.body[0]["imageId"], "dark_down_jacket.png");

    assert_eq!(embed.path, "/rest/v1/product_embedding");
    assert_eq!(
        embed.body,
        json!([{
            "id": "a",
            "content": "Dark Down Jacket: warm winter coat",
            "metadata": serde_json::to_value(&product).unwrap(),
            "embedding": [0.6, 0.8]
        }])
    );

    assert_eq!(fts.method, Method::PATCH);
    assert_eq!(fts.param("id"), Some("eq.a"));
    assert_eq!(fts.param("select"), Some("id"));
    assert!(fts.header("prefer").unwrap().contains("return=representation"));
    assert_eq!(
        fts.body,
        json!({"fts_text": "Dark Down Jacket: warm winter coat"})
    );
}

#[tokio::test]
async fn test_delete_requests_filter_every_row() {
    let (addr, log) = mock_server().await;
    let client = SupabaseClient::new(&config(addr)).unwrap();
    let vectors =
        SupabaseVectorIndex::new(client.clone(), "product_embedding", "match_products", 2);
    let keywords =
        SupabaseKeywordIndex::new(client.clone(), "product_embedding", "kw_match_products");

    vectors.delete_all().await.unwrap();
    keywords.delete_all().await.unwrap();

    let log = log.lock();
    assert_eq!(log[0].method, Method::DELETE);
    assert_eq!(log[0].param("id"), Some("not.is.null"));
    assert_eq!(log[1].method, Method::PATCH);
    assert_eq!(log[1].param("id"), Some("not.is.null"));
    assert_eq!(log[1].body, json!({"fts_text": null}));
}

#[tokio::test]
async fn test_keyword_write_without_embedding_row_fails() {
    let (addr, _log) = mock_server().await;
    let client = SupabaseClient::new(&config(addr)).unwrap();
    let keywords = SupabaseKeywordIndex::new(client, "product_embedding", "kw_match_products");

    let mut orphan = jacket();
    orphan.id = "zzz".to_string();
    let err = keywords
        .upsert(vec![orphan.keyword_document()])
        .await
        .unwrap_err();
    assert_eq!(err.stage(), SearchStage::KeywordIndex);
    assert!(err.to_string().contains("zzz"));
}

#[tokio::test]
async fn test_delete_by_id_requests() {
    let (addr, log) = mock_server().await;
    let client = SupabaseClient::new(&config(addr)).unwrap();
    let vectors =
        SupabaseVectorIndex::new(client.clone(), "product_embedding", "match_products", 2);
    let keywords =
        SupabaseKeywordIndex::new(client.clone(), "product_embedding", "kw_match_products");
    let store = SupabaseProductStore::new(client, "products");

    let ids = vec!["a".to_string()];
    keywords.delete(&ids).await.unwrap();
    vectors.delete(&ids).await.unwrap();
    store.delete(&ids).await.unwrap();
    store.delete(&[]).await.unwrap();

    let log = log.lock();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].method, Method::PATCH);
    assert_eq!(log[0].param("id"), Some(r#"in.("a")"#));
    assert_eq!(log[0].body, json!({"fts_text": null}));
    assert_eq!(log[1].method, Method::DELETE);
    assert_eq!(log[1].path, "/rest/v1/product_embedding");
    assert_eq!(log[1].param("id"), Some(r#"in.("a")"#));
    assert_eq!(log[2].method, Method::DELETE);
    assert_eq!(log[2].path, "/rest/v1/products");
}

#[tokio::test]
async fn test_vector_dimension_checked_before_request() {
    let (addr, log) = mock_server().await;
    let client = SupabaseClient::new(&config(addr)).unwrap();
    let vectors = SupabaseVectorIndex::new(client, "product_embedding", "match_products", 4);

    assert!(vectors.query_similar(&[1.0, 0.0], 3).await.is_err());
    assert!(log.lock().is_empty());
}
