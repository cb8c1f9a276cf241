//! Catalog service
//!
//! Orchestrates connectors, the linker and the entity store: bulk
//! population, on-demand lookup of single datasets (store first, then the
//! node's registry) and the curation operations behind the HTTP API.

use crate::connectors::{
    ConnectorError, ConnectorRegistry, DatasetConnector, DatasetMeta, NodeName,
    PublicationConnector,
};
use crate::linker;
use aicat_common::config::LinkRules;
use aicat_common::db::{
    DatasetDescription, EntityStore, NewDataset, NewPublication, Publication,
    PublicationWithDatasets, DATASET_IDENTIFIER_MAX, DATASET_NAME_MAX,
};
use futures::TryStreamExt;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    NotFound(String),

    /// Upstream registry failure; `status` is the registry's HTTP status
    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },

    #[error("{0}")]
    UnknownNode(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(#[source] aicat_common::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl From<aicat_common::Error> for CatalogError {
    fn from(err: aicat_common::Error) -> Self {
        match err {
            aicat_common::Error::NotFound(msg) => CatalogError::NotFound(msg),
            aicat_common::Error::Conflict(msg) => CatalogError::Conflict(msg),
            aicat_common::Error::InvalidInput(msg) => CatalogError::InvalidInput(msg),
            other => CatalogError::Store(other),
        }
    }
}

impl From<ConnectorError> for CatalogError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::NotFound(msg) => CatalogError::NotFound(
                msg.unwrap_or_else(|| "Record not found in the external registry".to_string()),
            ),
            ConnectorError::Upstream { status, message } => {
                CatalogError::Upstream { status, message }
            }
            ConnectorError::InvalidIdentifier(msg) => CatalogError::InvalidInput(msg),
        }
    }
}

fn dataset_not_found(id: i64) -> CatalogError {
    CatalogError::NotFound(format!("Dataset '{}' not found in the database.", id))
}

fn publication_not_found(id: i64) -> CatalogError {
    CatalogError::NotFound(format!("Publication '{}' not found in the database.", id))
}

/// Connectors and limits for one population run
pub struct PopulateRequest {
    pub dataset_connectors: Vec<Arc<dyn DatasetConnector>>,
    pub publication_connectors: Vec<Arc<dyn PublicationConnector>>,
    pub dataset_limit: Option<usize>,
    pub publication_limit: Option<usize>,
    /// Skip the run when the store already holds any data
    pub only_if_empty: bool,
}

impl Default for PopulateRequest {
    fn default() -> Self {
        Self {
            dataset_connectors: Vec::new(),
            publication_connectors: Vec::new(),
            dataset_limit: None,
            publication_limit: None,
            only_if_empty: true,
        }
    }
}

/// Outcome of a population run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PopulateReport {
    /// Newly stored datasets
    pub datasets: u64,
    /// Newly stored publications
    pub publications: u64,
    /// Newly stored links
    pub links: u64,
    /// True when the run was skipped because the store held data
    pub skipped: bool,
}

/// Result of an on-demand dataset lookup
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetLookup {
    /// Already in the catalog; no registry was contacted
    Cached(DatasetDescription),
    /// Fetched from the node's registry (and stored)
    Fetched(DatasetMeta),
}

#[derive(Clone)]
pub struct Catalog {
    store: EntityStore,
    connectors: ConnectorRegistry,
    rules: Arc<LinkRules>,
}

impl Catalog {
    pub fn new(store: EntityStore, connectors: ConnectorRegistry, rules: LinkRules) -> Self {
        Self {
            store,
            connectors,
            rules: Arc::new(rules),
        }
    }

    /// Fetch everything, link, then store in one transaction
    ///
    /// Every connector is drained before the first write, so a failing
    /// connector leaves the store untouched.
    pub async fn populate(&self, request: PopulateRequest) -> CatalogResult<PopulateReport> {
        let mut datasets: Vec<NewDataset> = Vec::new();
        for connector in &request.dataset_connectors {
            let fetched: Vec<NewDataset> = connector
                .fetch_all(request.dataset_limit)
                .try_collect()
                .await?;
            info!(node = %connector.node(), count = fetched.len(), "Fetched datasets");
            datasets.extend(fetched);
        }

        let mut publications: Vec<NewPublication> = Vec::new();
        for connector in &request.publication_connectors {
            let fetched: Vec<NewPublication> = connector
                .fetch_all(request.publication_limit)
                .try_collect()
                .await?;
            info!(node = %connector.node(), count = fetched.len(), "Fetched publications");
            publications.extend(fetched);
        }

        let (datasets, publications) = linker::link(datasets, publications, &self.rules);
        debug!(
            linked = publications.iter().filter(|p| !p.datasets.is_empty()).count(),
            "Applied link rules"
        );

        if request.only_if_empty && self.store.has_any_data().await? {
            info!("Database already populated, skipping population");
            return Ok(PopulateReport {
                skipped: true,
                ..PopulateReport::default()
            });
        }

        let summary = self.store.insert_all(&datasets, &publications).await?;
        info!(
            datasets = summary.datasets,
            publications = summary.publications,
            links = summary.links,
            "Population complete"
        );

        Ok(PopulateReport {
            datasets: summary.datasets,
            publications: summary.publications,
            links: summary.links,
            skipped: false,
        })
    }

    /// Look a dataset up by natural key, store first
    ///
    /// On a miss the node's registry is asked directly and the result is
    /// written back, so the next lookup is a cache hit. Identifiers too long
    /// to store are rejected without contacting the registry.
    pub async fn get_dataset(
        &self,
        node: &str,
        node_specific_identifier: &str,
    ) -> CatalogResult<DatasetLookup> {
        if let Some(dataset) = self.store.find_dataset(node, node_specific_identifier).await? {
            debug!(node, identifier = node_specific_identifier, "Dataset found in store");
            return Ok(DatasetLookup::Cached(dataset));
        }

        let connector = self.dataset_connector(node)?;
        // Must fit the catalog column for write-back
        if node_specific_identifier.chars().count() > DATASET_IDENTIFIER_MAX {
            return Err(CatalogError::InvalidInput(format!(
                "node_specific_identifier must have at most {} characters",
                DATASET_IDENTIFIER_MAX
            )));
        }
        let meta = connector
            .fetch_single(node_specific_identifier)
            .await
            .map_err(|e| match e {
                ConnectorError::NotFound(None) => CatalogError::NotFound(format!(
                    "Dataset '{}' of '{}' not found in the database.",
                    node_specific_identifier, node
                )),
                other => other.into(),
            })?;

        // Registry names can exceed the column width
        let name: String = meta.name.chars().take(DATASET_NAME_MAX).collect();
        let stored = self
            .store
            .insert_dataset_if_absent(&NewDataset::new(name, node, node_specific_identifier))
            .await?;
        info!(id = stored.id, node, identifier = node_specific_identifier, "Stored dataset fetched on demand");

        Ok(DatasetLookup::Fetched(meta))
    }

    /// Stored dataset enriched with its registry's metadata
    pub async fn describe_dataset(&self, id: i64) -> CatalogResult<DatasetMeta> {
        let dataset = self
            .store
            .get_dataset(id)
            .await?
            .ok_or_else(|| dataset_not_found(id))?;

        let connector = self.dataset_connector(&dataset.node)?;
        let meta = connector
            .fetch_single(&dataset.node_specific_identifier)
            .await
            .map_err(|e| match e {
                ConnectorError::NotFound(None) => CatalogError::NotFound(format!(
                    "Dataset '{}' of '{}' not found in the database.",
                    dataset.node_specific_identifier, dataset.node
                )),
                other => other.into(),
            })?;

        Ok(meta)
    }

    pub async fn list_datasets(&self) -> CatalogResult<Vec<DatasetDescription>> {
        Ok(self.store.list_datasets().await?)
    }

    pub async fn list_datasets_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> CatalogResult<Vec<DatasetDescription>> {
        Ok(self.store.list_datasets_page(offset, limit).await?)
    }

    pub async fn list_datasets_of_node(
        &self,
        node: &str,
        offset: i64,
        limit: i64,
    ) -> CatalogResult<Vec<DatasetDescription>> {
        let node = parse_node(node)?;
        Ok(self
            .store
            .list_datasets_of_node(node.as_str(), offset, limit)
            .await?)
    }

    /// All known node names
    pub fn nodes(&self) -> Vec<NodeName> {
        NodeName::ALL.to_vec()
    }

    pub async fn register_dataset(&self, dataset: &NewDataset) -> CatalogResult<DatasetDescription> {
        let stored = self.store.register_dataset(dataset).await?;
        info!(id = stored.id, node = %stored.node, "Registered dataset");
        Ok(stored)
    }

    pub async fn update_dataset(
        &self,
        id: i64,
        dataset: &NewDataset,
    ) -> CatalogResult<DatasetDescription> {
        self.store
            .update_dataset(id, dataset)
            .await?
            .ok_or_else(|| dataset_not_found(id))
    }

    pub async fn delete_dataset(&self, id: i64) -> CatalogResult<()> {
        if !self.store.delete_dataset(id).await? {
            return Err(dataset_not_found(id));
        }
        info!(id, "Deleted dataset");
        Ok(())
    }

    pub async fn list_publications(&self, offset: i64, limit: i64) -> CatalogResult<Vec<Publication>> {
        Ok(self.store.list_publications(offset, limit).await?)
    }

    pub async fn get_publication(&self, id: i64) -> CatalogResult<PublicationWithDatasets> {
        let publication = self
            .store
            .get_publication(id)
            .await?
            .ok_or_else(|| publication_not_found(id))?;
        let datasets = self.store.datasets_of_publication(id).await?;

        Ok(PublicationWithDatasets {
            publication,
            datasets,
        })
    }

    pub async fn register_publication(
        &self,
        publication: &NewPublication,
    ) -> CatalogResult<PublicationWithDatasets> {
        let stored = self.store.register_publication(publication).await?;
        info!(id = stored.id, "Registered publication");
        Ok(PublicationWithDatasets {
            publication: stored,
            datasets: Vec::new(),
        })
    }

    pub async fn update_publication(
        &self,
        id: i64,
        publication: &NewPublication,
    ) -> CatalogResult<PublicationWithDatasets> {
        self.store
            .update_publication(id, publication)
            .await?
            .ok_or_else(|| publication_not_found(id))?;
        self.get_publication(id).await
    }

    pub async fn delete_publication(&self, id: i64) -> CatalogResult<()> {
        if !self.store.delete_publication(id).await? {
            return Err(publication_not_found(id));
        }
        info!(id, "Deleted publication");
        Ok(())
    }

    pub async fn publications_of_dataset(&self, dataset_id: i64) -> CatalogResult<Vec<Publication>> {
        self.require_dataset(dataset_id).await?;
        Ok(self.store.publications_of_dataset(dataset_id).await?)
    }

    /// Link a stored dataset to a stored publication; returns the
    /// dataset's publications afterwards
    pub async fn link(&self, dataset_id: i64, publication_id: i64) -> CatalogResult<Vec<Publication>> {
        self.require_dataset(dataset_id).await?;
        self.require_publication(publication_id).await?;

        if !self.store.link(dataset_id, publication_id).await? {
            return Err(CatalogError::Conflict(format!(
                "Dataset {} is already linked to publication {}.",
                dataset_id, publication_id
            )));
        }
        info!(dataset_id, publication_id, "Linked dataset to publication");
        Ok(self.store.publications_of_dataset(dataset_id).await?)
    }

    pub async fn unlink(&self, dataset_id: i64, publication_id: i64) -> CatalogResult<Vec<Publication>> {
        self.require_dataset(dataset_id).await?;
        self.require_publication(publication_id).await?;

        if !self.store.unlink(dataset_id, publication_id).await? {
            return Err(CatalogError::NotFound(format!(
                "Dataset {} is not linked to publication {}.",
                dataset_id, publication_id
            )));
        }
        info!(dataset_id, publication_id, "Unlinked dataset from publication");
        Ok(self.store.publications_of_dataset(dataset_id).await?)
    }

    fn dataset_connector(&self, node: &str) -> CatalogResult<Arc<dyn DatasetConnector>> {
        let parsed = parse_node(node)?;
        self.connectors.dataset_connector(parsed).ok_or_else(|| {
            CatalogError::UnknownNode(format!(
                "No dataset connector for node '{}' available. Possible values: {}",
                node,
                self.connectors
                    .dataset_nodes()
                    .iter()
                    .map(|n| format!("`{}`", n))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    async fn require_dataset(&self, id: i64) -> CatalogResult<DatasetDescription> {
        self.store
            .get_dataset(id)
            .await?
            .ok_or_else(|| dataset_not_found(id))
    }

    async fn require_publication(&self, id: i64) -> CatalogResult<Publication> {
        self.store
            .get_publication(id)
            .await?
            .ok_or_else(|| publication_not_found(id))
    }
}

fn parse_node(node: &str) -> CatalogResult<NodeName> {
    node.parse::<NodeName>().map_err(CatalogError::UnknownNode)
}
