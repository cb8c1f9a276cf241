//! Database models
//!
//! `New*` types are records that have not been stored yet (no surrogate id).
//! Links between a batch of new publications and new datasets are held as
//! indices into the dataset batch and turned into rows at insert time.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DATASET_NAME_MAX: usize = 150;
pub const DATASET_NODE_MAX: usize = 30;
pub const DATASET_IDENTIFIER_MAX: usize = 250;
pub const PUBLICATION_TITLE_MAX: usize = 250;
pub const PUBLICATION_URL_MAX: usize = 250;

/// Stored dataset description; exactly the four exposed fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DatasetDescription {
    pub id: i64,
    pub name: String,
    pub node: String,
    pub node_specific_identifier: String,
}

/// Dataset description not yet stored
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewDataset {
    pub name: String,
    pub node: String,
    pub node_specific_identifier: String,
}

impl NewDataset {
    pub fn new(
        name: impl Into<String>,
        node: impl Into<String>,
        node_specific_identifier: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            node: node.into(),
            node_specific_identifier: node_specific_identifier.into(),
        }
    }

    /// Check column length limits
    pub fn validate(&self) -> Result<()> {
        check_len("name", &self.name, DATASET_NAME_MAX)?;
        check_len("node", &self.node, DATASET_NODE_MAX)?;
        check_len(
            "node_specific_identifier",
            &self.node_specific_identifier,
            DATASET_IDENTIFIER_MAX,
        )
    }
}

/// Stored publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Publication {
    pub id: i64,
    pub title: String,
    pub url: String,
}

/// Publication together with the datasets linked to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicationWithDatasets {
    #[serde(flatten)]
    pub publication: Publication,
    pub datasets: Vec<DatasetDescription>,
}

/// Publication not yet stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPublication {
    pub title: String,
    pub url: String,
    /// Indices into the dataset batch inserted alongside this publication
    #[serde(skip)]
    pub datasets: Vec<usize>,
}

impl NewPublication {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            datasets: Vec::new(),
        }
    }

    /// Check column length limits
    pub fn validate(&self) -> Result<()> {
        check_len("title", &self.title, PUBLICATION_TITLE_MAX)?;
        check_len("url", &self.url, PUBLICATION_URL_MAX)
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::InvalidInput(format!(
            "{} must have at most {} characters",
            field, max
        )));
    }
    Ok(())
}
