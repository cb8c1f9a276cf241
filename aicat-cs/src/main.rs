//! aicat-cs (Catalog Service) - AI asset metadata catalog
//!
//! Optionally populates the catalog from the requested nodes at startup,
//! then serves the catalog API.

use aicat_common::config::{CatalogConfig, CONFIG_ENV_VAR};
use aicat_common::db::{connect_to_database, EntityStore, RebuildMode};
use aicat_cs::connectors::{ConnectorRegistry, NodeName};
use aicat_cs::{build_router, AppState, Catalog, PopulateRequest};
use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RebuildDb {
    /// Connect to an existing database
    No,
    /// Create the database if it does not exist yet
    OnlyIfEmpty,
    /// Drop and recreate the database; all data is lost
    Always,
}

impl From<RebuildDb> for RebuildMode {
    fn from(value: RebuildDb) -> Self {
        match value {
            RebuildDb::No => RebuildMode::No,
            RebuildDb::OnlyIfEmpty => RebuildMode::OnlyIfEmpty,
            RebuildDb::Always => RebuildMode::Always,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "aicat-cs")]
#[command(about = "Metadata catalog of AI datasets and publications")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Prefix for all routes, e.g. "/aiod"
    #[arg(long)]
    url_prefix: Option<String>,

    /// Database handling at startup
    #[arg(long, value_enum, default_value_t = RebuildDb::OnlyIfEmpty)]
    rebuild_db: RebuildDb,

    /// Nodes to fetch datasets from at startup (only into an empty database)
    #[arg(long, num_args = 1..)]
    populate_datasets: Vec<NodeName>,

    /// Nodes to fetch publications from at startup (only into an empty database)
    #[arg(long, num_args = 1..)]
    populate_publications: Vec<NodeName>,

    /// Cap on datasets fetched per node, for development
    #[arg(long)]
    limit_number_of_datasets: Option<usize>,

    /// Cap on publications fetched per node, for development
    #[arg(long)]
    limit_number_of_publications: Option<usize>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = CatalogConfig::resolve(args.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting aicat Catalog Service (aicat-cs) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let registry = ConnectorRegistry::from_config(&config.connectors)?;

    let dataset_connectors = args
        .populate_datasets
        .iter()
        .map(|&node| {
            registry
                .dataset_connector(node)
                .ok_or_else(|| anyhow!("No dataset connector for node '{}'", node))
        })
        .collect::<Result<Vec<_>>>()?;
    let publication_connectors = args
        .populate_publications
        .iter()
        .map(|&node| {
            registry
                .publication_connector(node)
                .ok_or_else(|| anyhow!("No publication connector for node '{}'", node))
        })
        .collect::<Result<Vec<_>>>()?;

    let (create, delete_first) = RebuildMode::from(args.rebuild_db).flags();
    let pool = connect_to_database(&config.database.url, create, delete_first).await?;
    info!("✓ Connected to database {}", config.database.url);

    let catalog = Catalog::new(EntityStore::new(pool), registry, config.linking.clone());

    if !dataset_connectors.is_empty() || !publication_connectors.is_empty() {
        let report = catalog
            .populate(PopulateRequest {
                dataset_connectors,
                publication_connectors,
                dataset_limit: args.limit_number_of_datasets,
                publication_limit: args.limit_number_of_publications,
                only_if_empty: true,
            })
            .await?;
        info!(
            datasets = report.datasets,
            publications = report.publications,
            skipped = report.skipped,
            "Population finished"
        );
    }

    let url_prefix = args.url_prefix.unwrap_or(config.server.url_prefix);
    let app = build_router(AppState::new(catalog), &url_prefix);

    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", config.server.host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("aicat-cs listening on http://{}{}", addr, url_prefix);
    info!("Health check: http://{}{}/health", addr, url_prefix);

    axum::serve(listener, app).await?;

    Ok(())
}
