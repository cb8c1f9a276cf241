//! Integration tests for the aicat-cs HTTP API

mod common;

use aicat_common::db::{EntityStore, NewDataset, NewPublication};
use aicat_cs::connectors::{
    ConnectorRegistry, ExampleDatasetConnector, HuggingFaceDatasetConnector, NodeName,
};
use aicat_cs::{build_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

/// Test helper: app over a fresh store with the given connectors
async fn create_test_app(registry: ConnectorRegistry) -> (Router, EntityStore, tempfile::TempDir) {
    let (dir, store) = temp_store().await;
    let state = AppState::new(catalog_with(store.clone(), registry));
    (build_router(state, ""), store, dir)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn seed(store: &EntityStore) {
    let mut publication = NewPublication::new(
        "AMLB: an AutoML Benchmark",
        "https://arxiv.org/abs/2207.12560",
    );
    publication.datasets = vec![0, 1];
    store
        .insert_all(
            &[
                NewDataset::new("dset1", "openml", "1"),
                NewDataset::new("dset1", "other_node", "1"),
                NewDataset::new("dset2", "other_node", "2"),
            ],
            &[publication],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _store, _dir) = create_test_app(ConnectorRegistry::default()).await;

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "aicat-cs");
    assert!(json["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_get_nodes() {
    let (app, _store, _dir) = create_test_app(ConnectorRegistry::default()).await;

    let (status, json) = send(&app, "GET", "/nodes", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!(["example", "openml", "huggingface"]));
}

#[tokio::test]
async fn test_list_datasets_returns_exactly_four_fields() {
    let (app, store, _dir) = create_test_app(ConnectorRegistry::default()).await;
    seed(&store).await;

    let (status, json) = send(&app, "GET", "/datasets", None).await;

    assert_eq!(status, StatusCode::OK);
    let datasets = json.as_array().unwrap();
    assert_eq!(datasets.len(), 3);
    for dataset in datasets {
        let object = dataset.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["id", "name", "node", "node_specific_identifier"]);
    }
    assert_eq!(datasets[2]["name"], "dset2");
}

#[tokio::test]
async fn test_list_datasets_pagination() {
    let (app, store, _dir) = create_test_app(ConnectorRegistry::default()).await;
    seed(&store).await;

    let (_, json) = send(&app, "GET", "/datasets?offset=1&limit=1", None).await;
    let datasets = json.as_array().unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0]["node"], "other_node");
    assert_eq!(datasets[0]["node_specific_identifier"], "1");
}

#[tokio::test]
async fn test_list_datasets_of_node() {
    let (app, store, _dir) = create_test_app(ConnectorRegistry::default()).await;
    seed(&store).await;

    let (status, json) = send(&app, "GET", "/nodes/openml/datasets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, json) = send(&app, "GET", "/nodes/unexisting_node/datasets", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "Node 'unexisting_node' not recognized.");
}

#[tokio::test]
async fn test_lookup_cache_hit() {
    let registry =
        ConnectorRegistry::default().with_dataset_connector(Arc::new(ExampleDatasetConnector));
    let (app, store, _dir) = create_test_app(registry).await;

    let (status, fetched) = send(&app, "GET", "/nodes/example/datasets/42769", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(store.find_dataset("example", "42769").await.unwrap().is_some());

    // Served from the catalog now, same shape as the first answer
    let (status, cached) = send(&app, "GET", "/nodes/example/datasets/42769", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cached, fetched);
    assert_eq!(cached["identifier"], "42769");
    assert_eq!(cached["distribution"]["encodingFormat"], "application/json");
    assert!(cached.get("node_specific_identifier").is_none());
    assert_eq!(store.list_datasets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_lookup_fetches_from_huggingface() {
    let base = spawn_upstream(huggingface_router()).await;
    let huggingface = HuggingFaceDatasetConnector::new(&base, Duration::from_secs(5)).unwrap();
    let registry = ConnectorRegistry::default().with_dataset_connector(Arc::new(huggingface));
    let (app, store, _dir) = create_test_app(registry).await;

    let (status, json) = send(
        &app,
        "GET",
        "/nodes/huggingface/datasets/rotten_tomatoes%7Cdefault%7Ctrain",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "rotten_tomatoes config:default split:train");
    assert!(json.get("description").is_none());
    assert_eq!(json["distribution"]["contentUrl"], HF_PARQUET_TRAIN);
    assert_eq!(json["distribution"]["encodingFormat"], "parquet");
    assert_eq!(json["size"]["value"], 8530);
    assert_eq!(json["includedInDataCatalog"]["name"], "HuggingFace");
    assert_eq!(json["identifier"], "rotten_tomatoes|default|train");

    assert!(store
        .find_dataset("huggingface", "rotten_tomatoes|default|train")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_lookup_upstream_error_passed_through() {
    let base = spawn_upstream(huggingface_router()).await;
    let huggingface = HuggingFaceDatasetConnector::new(&base, Duration::from_secs(5)).unwrap();
    let registry = ConnectorRegistry::default().with_dataset_connector(Arc::new(huggingface));
    let (app, _store, _dir) = create_test_app(registry).await;

    let (status, json) = send(
        &app,
        "GET",
        "/nodes/huggingface/datasets/gated%7Cdefault%7Ctrain",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(json["error"]["code"], "UPSTREAM_ERROR");
    assert_eq!(
        json["error"]["message"],
        format!("Error while fetching splits from HuggingFace: '{}'", HF_GATED)
    );
}

#[tokio::test]
async fn test_lookup_dataset_unknown_to_huggingface() {
    let base = spawn_upstream(huggingface_router()).await;
    let huggingface = HuggingFaceDatasetConnector::new(&base, Duration::from_secs(5)).unwrap();
    let registry = ConnectorRegistry::default().with_dataset_connector(Arc::new(huggingface));
    let (app, _store, _dir) = create_test_app(registry).await;

    let (status, json) = send(
        &app,
        "GET",
        "/nodes/huggingface/datasets/no_such_dataset%7Cdefault%7Ctrain",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
    assert_eq!(
        json["error"]["message"],
        format!("Error while fetching splits from HuggingFace: '{}'", HF_MISSING)
    );
}

#[tokio::test]
async fn test_lookup_not_found_locally() {
    let registry =
        ConnectorRegistry::default().with_dataset_connector(Arc::new(ExampleDatasetConnector));
    let (app, _store, _dir) = create_test_app(registry).await;

    let (status, json) = send(&app, "GET", "/nodes/example/datasets/unknown", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json["error"]["message"],
        "Dataset 'unknown' of 'example' not found in the database."
    );
}

#[tokio::test]
async fn test_lookup_unknown_node() {
    let (app, _store, _dir) = create_test_app(ConnectorRegistry::default()).await;

    let (status, json) = send(&app, "GET", "/nodes/unexisting_node/datasets/1", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "Node 'unexisting_node' not recognized.");
}

#[tokio::test]
async fn test_get_dataset_enriched() {
    let registry =
        ConnectorRegistry::default().with_dataset_connector(Arc::new(ExampleDatasetConnector));
    let (app, store, _dir) = create_test_app(registry).await;
    let dataset = store
        .register_dataset(&NewDataset::new("Higgs", "example", "42769"))
        .await
        .unwrap();

    let (status, json) = send(&app, "GET", &format!("/datasets/{}", dataset.id), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Higgs");
    assert_eq!(json["distribution"]["contentUrl"], "example.url");
    assert_eq!(json["includedInDataCatalog"]["name"], "openml");
}

#[tokio::test]
async fn test_get_dataset_missing_and_malformed_id() {
    let (app, _store, _dir) = create_test_app(ConnectorRegistry::default()).await;

    let (status, json) = send(&app, "GET", "/datasets/4", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["message"], "Dataset '4' not found in the database.");

    let (status, json) = send(&app, "GET", "/datasets/abc", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["message"], "Dataset 'abc' not found in the database.");
}

#[tokio::test]
async fn test_post_dataset_and_conflict() {
    let (app, store, _dir) = create_test_app(ConnectorRegistry::default()).await;
    seed(&store).await;

    let body = json!({"name": "dset2", "node": "openml", "node_specific_identifier": "2"});
    let (status, json) = send(&app, "POST", "/datasets", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], 4);
    assert_eq!(json["name"], "dset2");

    let duplicate = json!({"name": "other", "node": "openml", "node_specific_identifier": "1"});
    let (status, json) = send(&app, "POST", "/datasets", Some(duplicate)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json["error"]["message"],
        "There already exists a dataset with the same node and node_specific_identifier, with id=1."
    );
}

#[tokio::test]
async fn test_post_dataset_too_long_name() {
    let (app, _store, _dir) = create_test_app(ConnectorRegistry::default()).await;

    let body = json!({"name": "a".repeat(151), "node": "openml", "node_specific_identifier": "2"});
    let (status, json) = send(&app, "POST", "/datasets", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_post_dataset_missing_field_rejected() {
    let (app, _store, _dir) = create_test_app(ConnectorRegistry::default()).await;

    let (status, _) = send(&app, "POST", "/datasets", Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_put_and_delete_dataset() {
    let (app, store, _dir) = create_test_app(ConnectorRegistry::default()).await;
    seed(&store).await;

    let body = json!({"name": "renamed", "node": "openml", "node_specific_identifier": "1"});
    let (status, json) = send(&app, "PUT", "/datasets/1", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "renamed");

    let (status, _) = send(&app, "PUT", "/datasets/99", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/datasets/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.list_datasets().await.unwrap().len(), 2);

    // Links go with the dataset
    let publication = &store.list_publications(0, 10).await.unwrap()[0];
    assert_eq!(store.datasets_of_publication(publication.id).await.unwrap().len(), 1);

    let (status, json) = send(&app, "DELETE", "/datasets/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["message"], "Dataset '1' not found in the database.");
}

#[tokio::test]
async fn test_publications_of_dataset() {
    let (app, store, _dir) = create_test_app(ConnectorRegistry::default()).await;
    seed(&store).await;

    let (status, json) = send(&app, "GET", "/datasets/1/publications", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["title"], "AMLB: an AutoML Benchmark");

    let (_, json) = send(&app, "GET", "/datasets/3/publications", None).await;
    assert_eq!(json, json!([]));

    let (status, _) = send(&app, "GET", "/datasets/9/publications", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_link_and_unlink_endpoints() {
    let (app, store, _dir) = create_test_app(ConnectorRegistry::default()).await;
    seed(&store).await;

    let (status, json) = send(&app, "POST", "/datasets/3/publications/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, json) = send(&app, "POST", "/datasets/3/publications/1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["message"], "Dataset 3 is already linked to publication 1.");

    let (status, json) = send(&app, "DELETE", "/datasets/3/publications/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));

    let (status, json) = send(&app, "DELETE", "/datasets/3/publications/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["message"], "Dataset 3 is not linked to publication 1.");

    let (status, json) = send(&app, "POST", "/datasets/3/publications/7", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["message"], "Publication '7' not found in the database.");
}

#[tokio::test]
async fn test_publication_crud() {
    let (app, store, _dir) = create_test_app(ConnectorRegistry::default()).await;
    seed(&store).await;

    let (status, json) = send(&app, "GET", "/publications/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "AMLB: an AutoML Benchmark");
    assert_eq!(json["datasets"].as_array().unwrap().len(), 2);

    let body = json!({"title": "Iris", "url": "https://example.org/iris"});
    let (status, json) = send(&app, "POST", "/publications", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], 2);
    assert_eq!(json["datasets"], json!([]));

    let (status, _) = send(&app, "POST", "/publications", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let update = json!({"title": "Iris revisited", "url": "https://example.org/iris"});
    let (status, json) = send(&app, "PUT", "/publications/2", Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "Iris revisited");

    let (_, json) = send(&app, "GET", "/publications", None).await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (status, _) = send(&app, "DELETE", "/publications/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(store.publications_of_dataset(1).await.unwrap().is_empty());

    let (status, json) = send(&app, "GET", "/publications/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["message"], "Publication '1' not found in the database.");
}

#[tokio::test]
async fn test_url_prefix() {
    let (_dir, store) = temp_store().await;
    let app = build_router(
        AppState::new(catalog_with(store, ConnectorRegistry::default())),
        "/aiod",
    );

    let (status, _) = send(&app, "GET", "/aiod/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
