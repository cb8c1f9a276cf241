//! OpenML dataset connector
//!
//! Talks to the OpenML JSON API (`/api/v1/json`). A dataset's metadata is
//! spread over two resources: the description and its computed qualities.

use super::http::HttpSource;
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
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const DATA_ERROR: &str = "Error while fetching data from OpenML";
const QUALITIES_ERROR: &str = "Error while fetching data qualities from OpenML";
const UNKNOWN_DATASET: &str = "Unknown dataset";

#[derive(Debug, Deserialize)]
struct OpenMlList {
    data: OpenMlListData,
}

#[derive(Debug, Deserialize)]
struct OpenMlListData {
    dataset: Vec<OpenMlListEntry>,
}

#[derive(Debug, Deserialize)]
struct OpenMlListEntry {
    did: Value,
    name: String,
}

#[derive(Debug, Deserialize)]
struct OpenMlDescriptionResponse {
    data_set_description: OpenMlDescription,
}

#[derive(Debug, Deserialize)]
struct OpenMlDescription {
    name: String,
    description: Option<String>,
    upload_date: Option<String>,
    url: String,
    format: String,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenMlQualitiesResponse {
    data_qualities: OpenMlQualities,
}

#[derive(Debug, Deserialize)]
struct OpenMlQualities {
    quality: Vec<OpenMlQuality>,
}

#[derive(Debug, Deserialize)]
struct OpenMlQuality {
    name: String,
    value: Value,
}

/// `{"error": {"code": "...", "message": "..."}}`
fn openml_error_message(body: &Value) -> Option<String> {
    body.get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// OpenML sends counts as float strings ("898.0"); only integral values are accepted
fn as_int(value: &Value) -> Result<i64, String> {
    let as_float = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("The input should be a number, but was: {}", value))?;

    if as_float.fract() != 0.0 || !as_float.is_finite() {
        return Err(format!(
            "The input should be an integer, but was a float: {}",
            value
        ));
    }
    Ok(as_float as i64)
}

fn did_to_string(did: &Value) -> String {
    match did {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct OpenMlDatasetConnector {
    http: HttpSource,
}

impl OpenMlDatasetConnector {
    pub fn new(base_url: &str, timeout: Duration) -> ConnectorResult<Self> {
        Ok(Self {
            http: HttpSource::new(base_url, timeout, openml_error_message)?,
        })
    }

    fn list(&self, limit: Option<usize>) -> impl Stream<Item = ConnectorResult<NewDataset>> + Send + '_ {
        try_stream! {
            let path = match limit {
                Some(n) => format!("/data/list/limit/{}", n),
                None => "/data/list".to_string(),
            };
            let list: OpenMlList = self
                .http
                .get_json(&path, &[])
                .await
                .map_err(|f| f.into_upstream(DATA_ERROR))?;

            debug!(count = list.data.dataset.len(), "Fetched OpenML dataset list");
            for entry in list.data.dataset.into_iter().take(limit.unwrap_or(usize::MAX)) {
                yield NewDataset::new(entry.name, NodeName::OpenMl.as_str(), did_to_string(&entry.did));
            }
        }
    }

    /// Description lookup; the 412 "Unknown dataset" reply means not found
    async fn description(&self, identifier: &str) -> ConnectorResult<OpenMlDescription> {
        let path = format!("/data/{}", identifier);
        match self.http.get_json::<OpenMlDescriptionResponse>(&path, &[]).await {
            Ok(response) => Ok(response.data_set_description),
            Err(failure) if failure.status == Some(412) && failure.detail == UNKNOWN_DATASET => {
                Err(failure.into_not_found(DATA_ERROR))
            }
            Err(failure) => Err(failure.into_upstream(DATA_ERROR)),
        }
    }

    async fn qualities(&self, identifier: &str) -> ConnectorResult<HashMap<String, Value>> {
        let path = format!("/data/qualities/{}", identifier);
        let response: OpenMlQualitiesResponse = self
            .http
            .get_json(&path, &[])
            .await
            .map_err(|f| f.into_upstream(QUALITIES_ERROR))?;

        Ok(response
            .data_qualities
            .quality
            .into_iter()
            .map(|q| (q.name, q.value))
            .collect())
    }
}

#[async_trait]
impl DatasetConnector for OpenMlDatasetConnector {
    fn node(&self) -> NodeName {
        NodeName::OpenMl
    }

    fn fetch_all(&self, limit: Option<usize>) -> RecordStream<'_, NewDataset> {
        Box::pin(self.list(limit))
    }

    async fn fetch_single(&self, identifier: &str) -> ConnectorResult<DatasetMeta> {
        if identifier.is_empty() || !identifier.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConnectorError::InvalidIdentifier(format!(
                "OpenML identifiers are numeric, got '{}'",
                identifier
            )));
        }

        let description = self.description(identifier).await?;
        let qualities = self.qualities(identifier).await?;

        let instances = qualities
            .get("NumberOfInstances")
            .ok_or_else(|| ConnectorError::Upstream {
                status: None,
                message: format!("{}: 'NumberOfInstances missing'", QUALITIES_ERROR),
            })?;
        let size = as_int(instances).map_err(|e| ConnectorError::Upstream {
            status: None,
            message: format!("{}: '{}'", QUALITIES_ERROR, e),
        })?;

        Ok(DatasetMeta {
            name: description.name,
            description: description.description,
            url: Some(format!("{}/data/{}", self.http.base_url(), identifier)),
            date_created: description.upload_date,
            identifier: identifier.to_string(),
            distribution: DataDownload {
                content_url: description.url,
                encoding_format: description.format,
            },
            size: QuantitativeValue { value: size },
            is_accessible_for_free: true,
            included_in_data_catalog: DataCatalog {
                name: "OpenML".to_string(),
            },
            in_language: description.language,
        })
    }
}
