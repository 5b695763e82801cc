//! Typesense adapter against a wiremock server.
//!
//! Run with: `cargo test --test typesense`

mod common;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{catalogue, Product, ProductStore};
use magnify::commands::{sync_index_settings, SyncOutcome};
use magnify::{
    CollectionSettings, EngineError, SearchEngine, SearchEngineExt, SearchKey, Searchable,
    SortDirection, TypesenseConfig, TypesenseEngine,
};

fn config(server: &MockServer) -> TypesenseConfig {
    let mut config = TypesenseConfig::new(server.uri(), "xyz");
    let mut settings = CollectionSettings {
        query_by: Some("name".into()),
        ..Default::default()
    };
    settings.schema.insert(
        "fields".into(),
        json!([
            { "name": "name", "type": "string" },
            { "name": "color", "type": "string", "facet": true },
            { "name": "price", "type": "float" },
        ]),
    );
    config.collection_settings.insert("products".into(), settings);
    config
}

async fn mount_existing_collection(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/collections/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "products" })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_provisioning_tolerates_concurrent_create() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/products"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections"))
        .and(body_partial_json(json!({ "name": "products" })))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "A collection with name `products` already exists.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = TypesenseEngine::new(config(&server)).unwrap();
    engine.ensure_collection("products").await.unwrap();
    // memoised, no further requests
    engine.ensure_collection("products").await.unwrap();
}

#[tokio::test]
async fn test_existing_collection_is_not_created() {
    let server = MockServer::start().await;
    mount_existing_collection(&server).await;
    Mock::given(method("POST"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/products/documents/import"))
        .and(query_param("action", "upsert"))
        .and(header("x-typesense-api-key", "xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"success\":true}\n{\"success\":true}"))
        .expect(1)
        .mount(&server)
        .await;

    let engine = TypesenseEngine::new(config(&server)).unwrap();
    engine.index(&catalogue(2)).await.unwrap();
}

#[tokio::test]
async fn test_missing_schema_is_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/orders"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let engine = TypesenseEngine::new(config(&server)).unwrap();
    let err = engine.ensure_collection("orders").await.unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[tokio::test]
async fn test_partial_import_failure_reports_documents() {
    let server = MockServer::start().await;
    mount_existing_collection(&server).await;
    Mock::given(method("POST"))
        .and(path("/collections/products/documents/import"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"success\":true}\n\
             {\"success\":false,\"error\":\"Field `price` must be a float.\",\"document\":\"{}\"}\n\
             {\"success\":true}",
        ))
        .mount(&server)
        .await;

    let engine = TypesenseEngine::new(config(&server)).unwrap();
    let err = engine.index(&catalogue(3)).await.unwrap_err();

    match err {
        EngineError::Indexing { backend, operation, failures, .. } => {
            assert_eq!(backend, "typesense");
            assert_eq!(operation, "index");
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].key, Some(SearchKey::from(2)));
            assert!(failures[0].message.contains("price"));
        }
        other => panic!("Expected Indexing error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scenario_query_parameters() {
    let server = MockServer::start().await;
    mount_existing_collection(&server).await;
    Mock::given(method("GET"))
        .and(path("/collections/products/documents/search"))
        .and(query_param("q", "shoes"))
        .and(query_param("query_by", "name"))
        .and(query_param("filter_by", "color:=[`red`, `blue`]"))
        .and(query_param("sort_by", "price:asc"))
        .and(query_param("per_page", "10"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "found": 3,
            "hits": [
                { "document": { "id": "5" } },
                { "document": { "id": "2" } },
                { "document": { "id": "9" } },
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = TypesenseEngine::new(config(&server)).unwrap();
    let records = Product::search("shoes")
        .where_in("color", ["red", "blue"])
        .order_by("price", SortDirection::Asc)
        .take(10)
        .get(&engine, &ProductStore::new(catalogue(10)))
        .await
        .unwrap();

    let ids: Vec<i64> = records.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![5, 2, 9]);
}

#[tokio::test]
async fn test_grouped_hits_keep_group_order() {
    let server = MockServer::start().await;
    mount_existing_collection(&server).await;
    Mock::given(method("GET"))
        .and(path("/collections/products/documents/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "found": 3,
            "grouped_hits": [
                { "group_key": ["red"], "hits": [{ "document": { "id": "8" } }, { "document": { "id": "4" } }] },
                { "group_key": ["blue"], "hits": [{ "document": { "id": "3" } }] },
            ],
        })))
        .mount(&server)
        .await;

    let engine = TypesenseEngine::new(config(&server)).unwrap();
    let page = Product::search("shoe")
        .paginate(&engine, &ProductStore::new(catalogue(10)), 1, 10)
        .await
        .unwrap();

    let ids: Vec<i64> = page.records.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![8, 4, 3]);
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn test_delete_tolerates_missing_documents() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/collections/products/documents/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/collections/products/documents/2"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = TypesenseEngine::new(config(&server)).unwrap();
    engine.remove(&catalogue(2)).await.unwrap();
}

#[tokio::test]
async fn test_delete_encodes_keys_as_one_segment() {
    let server = MockServer::start().await;
    for encoded in ["AB%2F12", "x%3Fy", "q%231"] {
        Mock::given(method("DELETE"))
            .and(path(format!("/collections/products/documents/{}", encoded)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
    }

    let engine = TypesenseEngine::new(config(&server)).unwrap();
    let keys = [SearchKey::from("AB/12"), SearchKey::from("x?y"), SearchKey::from("q#1")];
    engine.delete("products", &keys).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.url.query().is_none()));
}

#[tokio::test]
async fn test_oversized_limit_makes_no_call() {
    let server = MockServer::start().await;
    mount_existing_collection(&server).await;
    Mock::given(method("GET"))
        .and(path("/collections/products/documents/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "found": 0, "hits": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let engine = TypesenseEngine::new(config(&server)).unwrap();
    let store = ProductStore::new(catalogue(3));

    let err = Product::search("shoe").take(500).get(&engine, &store).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidQuery(_)), "got {:?}", err);

    let err = Product::search("shoe")
        .paginate(&engine, &store, 1, 251)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidQuery(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_flush_truncates_collection() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/collections/products/documents"))
        .and(query_param("truncate", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "num_deleted": 4 })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = TypesenseEngine::new(config(&server)).unwrap();
    engine.flush("products").await.unwrap();
}

#[tokio::test]
async fn test_search_without_query_by_is_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = TypesenseEngine::new(TypesenseConfig::new(server.uri(), "xyz")).unwrap();
    let err = Product::search("shoe")
        .get(&engine, &ProductStore::new(Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[tokio::test]
async fn test_settings_sync_unsupported() {
    let server = MockServer::start().await;
    let engine = TypesenseEngine::new(config(&server)).unwrap();
    let outcome = sync_index_settings(&engine).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Unsupported { backend: "typesense" });
}
