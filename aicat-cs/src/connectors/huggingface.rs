//! HuggingFace dataset connector
//!
//! One catalog record per (dataset, config, split). HuggingFace names may
//! contain a namespace ("Helsinki-NLP/tatoeba_mt"); since `/` cannot travel
//! in a path segment, identifiers join all parts with `|`:
//! `[namespace|]name|config|split`.

use super::http::{HttpFailure, HttpSource};
use super::{
    ConnectorError, ConnectorResult, DataCatalog, DataDownload, DatasetConnector, DatasetMeta,
    NodeName, QuantitativeValue, RecordStream,
};
use aicat_common::db::NewDataset;
use async_stream::try_stream;
use async_trait::async_trait;
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const ID_DELIMITER: char = '|';

const VALID_ERROR: &str = "Error while fetching all data from HuggingFace";
const SPLITS_ERROR: &str = "Error while fetching splits from HuggingFace";
const PARQUET_ERROR: &str = "Error while fetching parquet data from HuggingFace";

const IDENTIFIER_FORMAT: &str = "The identifier for huggingface data should be formatted as \
    'namespace|name_dataset|config|split', or 'name_dataset|config|split' if the dataset does \
    not have a namespace. Examples: 'Helsinki-NLP|tatoeba_mt|eng-fra|train' or \
    'rotten_tomatoes|default|validation'";

#[derive(Debug, Deserialize)]
struct ValidResponse {
    valid: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SplitsResponse {
    splits: Vec<SplitEntry>,
}

#[derive(Debug, Deserialize)]
struct SplitEntry {
    config: String,
    split: String,
    num_examples: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ParquetResponse {
    parquet_files: Vec<ParquetFile>,
}

#[derive(Debug, Deserialize)]
struct ParquetFile {
    config: String,
    split: String,
    url: String,
}

/// `{"error": "..."}`
fn huggingface_error_message(body: &Value) -> Option<String> {
    body.get("error")?.as_str().map(str::to_string)
}

/// Parsed `[namespace|]name|config|split`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIdentifier {
    /// Full dataset name, namespace joined with `/`
    pub dataset: String,
    pub config: String,
    pub split: String,
}

impl SplitIdentifier {
    pub fn parse(identifier: &str) -> ConnectorResult<Self> {
        let parts: Vec<&str> = identifier.split(ID_DELIMITER).collect();
        if !(3..=4).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
            return Err(ConnectorError::InvalidIdentifier(IDENTIFIER_FORMAT.to_string()));
        }

        let (name_parts, rest) = parts.split_at(parts.len() - 2);
        Ok(Self {
            dataset: name_parts.join("/"),
            config: rest[0].to_string(),
            split: rest[1].to_string(),
        })
    }

    pub fn identifier(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.dataset.replace('/', "|"),
            ID_DELIMITER,
            self.config,
            ID_DELIMITER,
            self.split
        )
    }

    /// "<short name> config:<config> split:<split>"
    pub fn display_name(&self) -> String {
        let short = self.dataset.rsplit('/').next().unwrap_or(&self.dataset);
        format!("{} config:{} split:{}", short, self.config, self.split)
    }
}

pub struct HuggingFaceDatasetConnector {
    http: HttpSource,
}

impl HuggingFaceDatasetConnector {
    pub fn new(base_url: &str, timeout: Duration) -> ConnectorResult<Self> {
        Ok(Self {
            http: HttpSource::new(base_url, timeout, huggingface_error_message)?,
        })
    }

    async fn splits(&self, dataset: &str) -> Result<Vec<SplitEntry>, HttpFailure> {
        let response: SplitsResponse = self
            .http
            .get_json("/splits", &[("dataset", dataset)])
            .await?;
        Ok(response.splits)
    }

    fn list(&self, limit: Option<usize>) -> impl Stream<Item = ConnectorResult<NewDataset>> + Send + '_ {
        try_stream! {
            let limit = limit.unwrap_or(usize::MAX);
            let mut yielded = 0usize;

            if limit > 0 {
                let valid: ValidResponse = self
                    .http
                    .get_json("/valid", &[])
                    .await
                    .map_err(|f| f.into_upstream(VALID_ERROR))?;
                debug!(count = valid.valid.len(), "Fetched valid HuggingFace datasets");

                'names: for dataset in valid.valid {
                    if dataset.contains(ID_DELIMITER) {
                        Err::<(), _>(ConnectorError::InvalidIdentifier(format!(
                            "The huggingface name '{}' contains a '{}', which we use as delimiter.",
                            dataset, ID_DELIMITER
                        )))?;
                    }

                    let entries = self
                        .splits(&dataset)
                        .await
                        .map_err(|f| f.into_upstream(SPLITS_ERROR))?;
                    for entry in entries {
                        let id = SplitIdentifier {
                            dataset: dataset.clone(),
                            config: entry.config,
                            split: entry.split,
                        };
                        yield NewDataset::new(id.display_name(), NodeName::HuggingFace.as_str(), id.identifier());

                        yielded += 1;
                        if yielded >= limit {
                            break 'names;
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl DatasetConnector for HuggingFaceDatasetConnector {
    fn node(&self) -> NodeName {
        NodeName::HuggingFace
    }

    fn fetch_all(&self, limit: Option<usize>) -> RecordStream<'_, NewDataset> {
        Box::pin(self.list(limit))
    }

    async fn fetch_single(&self, identifier: &str) -> ConnectorResult<DatasetMeta> {
        let id = SplitIdentifier::parse(identifier)?;

        // The datasets-server answers 404 for a dataset unknown to the Hub
        let mut splits: Vec<SplitEntry> = self
            .splits(&id.dataset)
            .await
            .map_err(|f| match f.status {
                Some(404) => f.into_not_found(SPLITS_ERROR),
                _ => f.into_upstream(SPLITS_ERROR),
            })?
            .into_iter()
            .filter(|s| s.config == id.config && s.split == id.split)
            .collect();
        if splits.len() != 1 {
            return Err(ConnectorError::NotFound(Some(format!(
                "HuggingFace's split endpoint does not contain config='{}', split='{}' for \
                 dataset {} (or returns multiple).",
                id.config, id.split, id.dataset
            ))));
        }
        let split = splits.remove(0);
        let num_examples = split.num_examples.ok_or_else(|| ConnectorError::Upstream {
            status: None,
            message: format!("{}: 'num_examples missing'", SPLITS_ERROR),
        })?;

        let response: ParquetResponse = self
            .http
            .get_json("/parquet", &[("dataset", id.dataset.as_str())])
            .await
            .map_err(|f| f.into_upstream(PARQUET_ERROR))?;
        let mut files: Vec<ParquetFile> = response
            .parquet_files
            .into_iter()
            .filter(|f| f.config == id.config && f.split == id.split)
            .collect();
        if files.len() != 1 {
            return Err(ConnectorError::NotFound(Some(format!(
                "HuggingFace's parquet endpoint does not contain config='{}', split='{}' for \
                 dataset {} (or returns multiple).",
                id.config, id.split, id.dataset
            ))));
        }
        let file = files.remove(0);

        Ok(DatasetMeta {
            name: id.display_name(),
            description: None,
            url: None,
            date_created: None,
            identifier: identifier.to_string(),
            distribution: DataDownload {
                content_url: file.url,
                encoding_format: "parquet".to_string(),
            },
            size: QuantitativeValue {
                value: num_examples,
            },
            is_accessible_for_free: true,
            included_in_data_catalog: DataCatalog {
                name: "HuggingFace".to_string(),
            },
            in_language: None,
        })
    }
}
