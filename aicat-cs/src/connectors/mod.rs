//! Connectors: adapters fetching records from one external node
//!
//! Every node that offers datasets implements [`DatasetConnector`]; every
//! node that offers publications implements [`PublicationConnector`].
//! Registry-specific fields are dropped at this boundary, only the shared
//! dataset/publication attributes travel further.

pub mod example;
pub mod http;
pub mod huggingface;
pub mod openml;

use aicat_common::config::ConnectorsConfig;
use aicat_common::db::{NewDataset, NewPublication};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use example::{ExampleDatasetConnector, ExamplePublicationConnector};
pub use huggingface::HuggingFaceDatasetConnector;
pub use openml::OpenMlDatasetConnector;

/// Connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The registry reports the identifier as unknown. Carries the
    /// upstream message when the registry gave one.
    #[error("{}", .0.as_deref().unwrap_or("Record not found in the external registry"))]
    NotFound(Option<String>),

    /// Transport or format failure; message preserved for diagnostics
    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },

    /// Identifier cannot be valid for this node
    #[error("{0}")]
    InvalidIdentifier(String),
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Lazy sequence of fetched records; each `fetch_all` call starts afresh
pub type RecordStream<'a, T> = BoxStream<'a, ConnectorResult<T>>;

/// Known external nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeName {
    Example,
    OpenMl,
    HuggingFace,
}

impl NodeName {
    pub const ALL: [NodeName; 3] = [NodeName::Example, NodeName::OpenMl, NodeName::HuggingFace];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeName::Example => "example",
            NodeName::OpenMl => "openml",
            NodeName::HuggingFace => "huggingface",
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeName::ALL
            .into_iter()
            .find(|node| node.as_str() == s)
            .ok_or_else(|| format!("Node '{}' not recognized.", s))
    }
}

impl Serialize for NodeName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Complete metadata of one dataset as reported by its node
/// (schema.org `Dataset` shape)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    pub identifier: String,
    pub distribution: DataDownload,
    pub size: QuantitativeValue,
    pub is_accessible_for_free: bool,
    pub included_in_data_catalog: DataCatalog,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataDownload {
    pub content_url: String,
    pub encoding_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantitativeValue {
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCatalog {
    pub name: String,
}

/// Fetches dataset records from one node
#[async_trait]
pub trait DatasetConnector: Send + Sync {
    /// Node this connector talks to
    fn node(&self) -> NodeName;

    /// Basic information of all datasets, at most `limit` records
    fn fetch_all(&self, limit: Option<usize>) -> RecordStream<'_, NewDataset>;

    /// Complete metadata of one dataset by its node-specific identifier,
    /// bypassing any bulk listing
    async fn fetch_single(&self, identifier: &str) -> ConnectorResult<DatasetMeta>;
}

/// Fetches publication records from one node
pub trait PublicationConnector: Send + Sync {
    /// Node this connector talks to
    fn node(&self) -> NodeName;

    /// All publications, at most `limit` records
    fn fetch_all(&self, limit: Option<usize>) -> RecordStream<'_, NewPublication>;
}

/// Connectors available to the catalog, keyed by node
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    datasets: HashMap<NodeName, Arc<dyn DatasetConnector>>,
    publications: HashMap<NodeName, Arc<dyn PublicationConnector>>,
}

impl ConnectorRegistry {
    /// Registry holding every built-in connector
    pub fn from_config(config: &ConnectorsConfig) -> ConnectorResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);

        Ok(Self::default()
            .with_dataset_connector(Arc::new(ExampleDatasetConnector))
            .with_dataset_connector(Arc::new(OpenMlDatasetConnector::new(
                &config.openml_base_url,
                timeout,
            )?))
            .with_dataset_connector(Arc::new(HuggingFaceDatasetConnector::new(
                &config.huggingface_base_url,
                timeout,
            )?))
            .with_publication_connector(Arc::new(ExamplePublicationConnector)))
    }

    /// Add (or replace) the dataset connector of its node
    pub fn with_dataset_connector(mut self, connector: Arc<dyn DatasetConnector>) -> Self {
        self.datasets.insert(connector.node(), connector);
        self
    }

    /// Add (or replace) the publication connector of its node
    pub fn with_publication_connector(mut self, connector: Arc<dyn PublicationConnector>) -> Self {
        self.publications.insert(connector.node(), connector);
        self
    }

    pub fn dataset_connector(&self, node: NodeName) -> Option<Arc<dyn DatasetConnector>> {
        self.datasets.get(&node).cloned()
    }

    pub fn publication_connector(&self, node: NodeName) -> Option<Arc<dyn PublicationConnector>> {
        self.publications.get(&node).cloned()
    }

    /// Nodes with a dataset connector, in stable order
    pub fn dataset_nodes(&self) -> Vec<NodeName> {
        let mut nodes: Vec<NodeName> = self.datasets.keys().copied().collect();
        nodes.sort();
        nodes
    }
}
