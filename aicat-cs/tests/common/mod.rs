//! Shared test helpers: temporary stores, fake registries, scripted connectors

#![allow(dead_code)]

use aicat_common::config::LinkRules;
use aicat_common::db::{connect_to_database, EntityStore, NewDataset};
use aicat_cs::connectors::{
    ConnectorError, ConnectorRegistry, ConnectorResult, DatasetConnector, DatasetMeta, NodeName,
    RecordStream,
};
use aicat_cs::Catalog;
use async_trait::async_trait;
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Store on a fresh SQLite file; keep the TempDir alive for the test
pub async fn temp_store() -> (tempfile::TempDir, EntityStore) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}/aiod", dir.path().display());
    let pool = connect_to_database(&url, true, false)
        .await
        .expect("Failed to create test database");
    (dir, EntityStore::new(pool))
}

pub fn catalog_with(store: EntityStore, registry: ConnectorRegistry) -> Catalog {
    Catalog::new(store, registry, LinkRules::default())
}

/// Serve `router` on an ephemeral local port; returns its base URL
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake upstream");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub const OPENML_UNKNOWN: &str = "Unknown dataset";

fn openml_error(status: StatusCode, code: &str, message: &str) -> axum::response::Response {
    (
        status,
        Json(json!({"error": {"code": code, "message": message}})),
    )
        .into_response()
}

fn openml_datasets() -> Vec<Value> {
    vec![
        json!({"did": 3, "name": "kr-vs-kp", "version": 1, "status": "active", "format": "ARFF"}),
        json!({"did": 31, "name": "credit-g", "version": 1, "status": "active", "format": "ARFF"}),
        json!({"did": 61, "name": "iris", "version": 1, "status": "active", "format": "ARFF"}),
    ]
}

/// OpenML JSON API: dataset 1 is fully described, 2 has no qualities,
/// 3 makes the server fail, everything else is unknown
pub fn openml_router() -> Router {
    Router::new()
        .route(
            "/data/list",
            get(|| async { Json(json!({"data": {"dataset": openml_datasets()}})) }),
        )
        .route(
            "/data/list/limit/:n",
            get(|Path(n): Path<usize>| async move {
                let datasets: Vec<Value> = openml_datasets().into_iter().take(n).collect();
                Json(json!({"data": {"dataset": datasets}}))
            }),
        )
        .route(
            "/data/:id",
            get(|Path(id): Path<String>| async move {
                match id.as_str() {
                    "1" | "2" => Json(json!({
                        "data_set_description": {
                            "id": id,
                            "name": "anneal",
                            "version": "1",
                            "description": "**Author**: Unknown. Donated by David Sterling and Wray Buntine",
                            "format": "ARFF",
                            "upload_date": "2014-04-06T23:19:24",
                            "language": "English",
                            "url": "https://api.openml.org/data/v1/download/1/anneal.arff",
                            "default_target_attribute": "class",
                            "status": "active"
                        }
                    }))
                    .into_response(),
                    "3" => (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response(),
                    _ => openml_error(StatusCode::PRECONDITION_FAILED, "111", OPENML_UNKNOWN),
                }
            }),
        )
        .route(
            "/data/qualities/:id",
            get(|Path(id): Path<String>| async move {
                match id.as_str() {
                    "1" => Json(json!({
                        "data_qualities": {
                            "quality": [
                                {"name": "NumberOfClasses", "value": "5.0"},
                                {"name": "NumberOfFeatures", "value": "39.0"},
                                {"name": "NumberOfInstances", "value": "898.0"},
                                {"name": "MajorityClassSize", "value": null}
                            ]
                        }
                    }))
                    .into_response(),
                    _ => openml_error(
                        StatusCode::PRECONDITION_FAILED,
                        "362",
                        "No qualities found",
                    ),
                }
            }),
        )
}

pub const HF_PARQUET_TRAIN: &str = "https://huggingface.co/datasets/rotten_tomatoes/resolve/refs%2Fconvert%2Fparquet/default/rotten_tomatoes-train.parquet";

pub const HF_GATED: &str = "The dataset does not exist, or is not accessible without \
    authentication (private or gated). Please retry with authentication.";

pub const HF_MISSING: &str = "The dataset does not exist on the Hub.";

fn hf_splits(dataset: &str) -> Option<Value> {
    match dataset {
        "rotten_tomatoes" => Some(json!({
            "splits": [
                {"dataset": "rotten_tomatoes", "config": "default", "split": "train", "num_bytes": 1074810, "num_examples": 8530},
                {"dataset": "rotten_tomatoes", "config": "default", "split": "validation", "num_bytes": 134679, "num_examples": 1066},
                {"dataset": "rotten_tomatoes", "config": "default", "split": "test", "num_bytes": 135972, "num_examples": 1066}
            ]
        })),
        "acronym_identification" => Some(json!({
            "splits": [
                {"dataset": "acronym_identification", "config": "default", "split": "train", "num_examples": 14006},
                {"dataset": "acronym_identification", "config": "default", "split": "test", "num_examples": 1750}
            ]
        })),
        "Helsinki-NLP/tatoeba_mt" => Some(json!({
            "splits": [
                {"dataset": "Helsinki-NLP/tatoeba_mt", "config": "eng-fra", "split": "train", "num_examples": 100}
            ]
        })),
        "squad" => Some(json!({
            "splits": [
                {"dataset": "squad", "config": "plain_text", "split": "train"}
            ]
        })),
        _ => None,
    }
}

/// HuggingFace datasets-server: `/valid`, `/splits` and `/parquet`
pub fn huggingface_router() -> Router {
    Router::new()
        .route(
            "/valid",
            get(|| async {
                Json(json!({"valid": ["rotten_tomatoes", "acronym_identification", "Helsinki-NLP/tatoeba_mt"]}))
            }),
        )
        .route(
            "/splits",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let dataset = params.get("dataset").cloned().unwrap_or_default();
                if dataset == "no_such_dataset" {
                    return (StatusCode::NOT_FOUND, Json(json!({"error": HF_MISSING}))).into_response();
                }
                match hf_splits(&dataset) {
                    Some(body) => Json(body).into_response(),
                    None => (StatusCode::PRECONDITION_FAILED, Json(json!({"error": HF_GATED})))
                        .into_response(),
                }
            }),
        )
        .route(
            "/parquet",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                match params.get("dataset").map(String::as_str) {
                    Some("rotten_tomatoes") => Json(json!({
                        "parquet_files": [
                            {"dataset": "rotten_tomatoes", "config": "default", "split": "train", "url": HF_PARQUET_TRAIN, "filename": "rotten_tomatoes-train.parquet", "size": 698845},
                            {"dataset": "rotten_tomatoes", "config": "default", "split": "validation", "url": "https://huggingface.co/datasets/rotten_tomatoes/resolve/refs%2Fconvert%2Fparquet/default/rotten_tomatoes-validation.parquet", "filename": "rotten_tomatoes-validation.parquet", "size": 90001}
                        ]
                    }))
                    .into_response(),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "Parquet conversion failed"})))
                        .into_response(),
                }
            }),
        )
}

/// Dataset connector that must never be called
pub struct UnreachableConnector(pub NodeName);

#[async_trait]
impl DatasetConnector for UnreachableConnector {
    fn node(&self) -> NodeName {
        self.0
    }

    fn fetch_all(&self, _limit: Option<usize>) -> RecordStream<'_, NewDataset> {
        panic!("fetch_all called on {}", self.0)
    }

    async fn fetch_single(&self, identifier: &str) -> ConnectorResult<DatasetMeta> {
        panic!("fetch_single({}) called on {}", identifier, self.0)
    }
}

/// Dataset connector yielding some records, then failing
pub struct FailingConnector {
    pub node: NodeName,
    pub good_records: usize,
}

#[async_trait]
impl DatasetConnector for FailingConnector {
    fn node(&self) -> NodeName {
        self.node
    }

    fn fetch_all(&self, _limit: Option<usize>) -> RecordStream<'_, NewDataset> {
        let node = self.node.as_str();
        let good = (0..self.good_records)
            .map(move |i| Ok(NewDataset::new(format!("dataset-{}", i), node, i.to_string())));
        let failure = std::iter::once(Err(ConnectorError::Upstream {
            status: Some(503),
            message: "Error while fetching data from OpenML: 'Service unavailable'".to_string(),
        }));
        stream::iter(good.chain(failure)).boxed()
    }

    async fn fetch_single(&self, _identifier: &str) -> ConnectorResult<DatasetMeta> {
        Err(ConnectorError::Upstream {
            status: Some(503),
            message: "Error while fetching data from OpenML: 'Service unavailable'".to_string(),
        })
    }
}

/// Wraps a connector and counts `fetch_single` calls
pub struct CountingConnector {
    pub inner: Arc<dyn DatasetConnector>,
    pub calls: Arc<AtomicUsize>,
}

impl CountingConnector {
    pub fn new(inner: Arc<dyn DatasetConnector>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl DatasetConnector for CountingConnector {
    fn node(&self) -> NodeName {
        self.inner.node()
    }

    fn fetch_all(&self, limit: Option<usize>) -> RecordStream<'_, NewDataset> {
        self.inner.fetch_all(limit)
    }

    async fn fetch_single(&self, identifier: &str) -> ConnectorResult<DatasetMeta> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_single(identifier).await
    }
}
