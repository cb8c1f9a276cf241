//! Example connectors serving a fixed, offline record set

use super::{
    ConnectorError, ConnectorResult, DataCatalog, DataDownload, DatasetConnector, DatasetMeta,
    NodeName, PublicationConnector, QuantitativeValue, RecordStream,
};
use aicat_common::db::{NewDataset, NewPublication};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};

fn example_datasets() -> Vec<NewDataset> {
    vec![
        NewDataset::new("Higgs", "openml", "42769"),
        NewDataset::new("porto-seguro", "openml", "42742"),
        NewDataset::new(
            "rotten_tomatoes config:default split:train",
            "huggingface",
            "rotten_tomatoes|default|train",
        ),
        NewDataset::new(
            "rotten_tomatoes config:default split:validation",
            "huggingface",
            "rotten_tomatoes|default|validation",
        ),
        NewDataset::new(
            "rotten_tomatoes config:default split:test",
            "huggingface",
            "rotten_tomatoes|default|test",
        ),
    ]
}

fn example_publications() -> Vec<NewPublication> {
    vec![
        NewPublication::new("AMLB: an AutoML Benchmark", "https://arxiv.org/abs/2207.12560"),
        NewPublication::new(
            "Searching for exotic particles in high-energy physics with deep learning",
            "https://www.nature.com/articles/ncomms5308",
        ),
    ]
}

fn capped<T: Send + 'static>(records: Vec<T>, limit: Option<usize>) -> RecordStream<'static, T> {
    let limit = limit.unwrap_or(records.len());
    stream::iter(records.into_iter().take(limit).map(Ok)).boxed()
}

/// Example datasets, mirroring records of the real registries
pub struct ExampleDatasetConnector;

#[async_trait]
impl DatasetConnector for ExampleDatasetConnector {
    fn node(&self) -> NodeName {
        NodeName::Example
    }

    fn fetch_all(&self, limit: Option<usize>) -> RecordStream<'_, NewDataset> {
        capped(example_datasets(), limit)
    }

    async fn fetch_single(&self, identifier: &str) -> ConnectorResult<DatasetMeta> {
        let dataset = example_datasets()
            .into_iter()
            .find(|d| d.node_specific_identifier == identifier)
            .ok_or(ConnectorError::NotFound(None))?;

        Ok(DatasetMeta {
            name: dataset.name,
            description: None,
            url: None,
            date_created: None,
            identifier: dataset.node_specific_identifier,
            distribution: DataDownload {
                content_url: "example.url".to_string(),
                encoding_format: "application/json".to_string(),
            },
            size: QuantitativeValue { value: 1000 },
            is_accessible_for_free: true,
            included_in_data_catalog: DataCatalog { name: dataset.node },
            in_language: None,
        })
    }
}

/// Example publications; their titles match the default link rules
pub struct ExamplePublicationConnector;

impl PublicationConnector for ExamplePublicationConnector {
    fn node(&self) -> NodeName {
        NodeName::Example
    }

    fn fetch_all(&self, limit: Option<usize>) -> RecordStream<'_, NewPublication> {
        capped(example_publications(), limit)
    }
}
