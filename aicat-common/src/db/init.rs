//! Database connection and schema initialization
//!
//! The connection string names a server (a directory) and a database (a
//! file stem inside it): `sqlite://<server-dir>/<database>` opens
//! `<server-dir>/<database>.db`. The schema is created automatically when
//! the target database has zero tables.

use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

const URL_SCHEME: &str = "sqlite://";

/// Connection string split into server directory and database name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseUrl {
    pub server: PathBuf,
    pub database: String,
}

impl DatabaseUrl {
    /// Split `sqlite://<server>/<database>` at the last `/`
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url.strip_prefix(URL_SCHEME).ok_or_else(|| {
            Error::Config(format!(
                "Unsupported database url '{}': expected {}<server>/<database>",
                url, URL_SCHEME
            ))
        })?;

        let (server, database) = match rest.rsplit_once('/') {
            Some(("", database)) => ("/", database),
            Some((server, database)) => (server, database),
            None => (".", rest),
        };

        if database.is_empty() {
            return Err(Error::Config(format!("Database url '{}' has no database name", url)));
        }

        Ok(Self {
            server: PathBuf::from(server),
            database: database.to_string(),
        })
    }

    /// Path of the SQLite file backing this database
    pub fn file_path(&self) -> PathBuf {
        if self.database.ends_with(".db") {
            self.server.join(&self.database)
        } else {
            self.server.join(format!("{}.db", self.database))
        }
    }
}

/// How the catalog treats an existing database at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildMode {
    /// Open an existing database only
    No,
    /// Create the database if it is missing
    OnlyIfEmpty,
    /// Drop and recreate the database (all data lost)
    Always,
}

impl RebuildMode {
    /// `(create_if_not_exists, delete_first)` flags for [`connect_to_database`]
    pub fn flags(self) -> (bool, bool) {
        match self {
            RebuildMode::No => (false, false),
            RebuildMode::OnlyIfEmpty => (true, false),
            RebuildMode::Always => (true, true),
        }
    }
}

/// Connect to the catalog database, optionally creating or recreating it.
///
/// `delete_first` removes the database before creating it again. ALL data
/// in that database is lost permanently.
pub async fn connect_to_database(
    url: &str,
    create_if_not_exists: bool,
    delete_first: bool,
) -> Result<SqlitePool> {
    let target = DatabaseUrl::parse(url)?;
    let db_path = target.file_path();

    if delete_first {
        for suffix in ["", "-wal", "-shm"] {
            let path = PathBuf::from(format!("{}{}", db_path.display(), suffix));
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        warn!("Dropped database {}", db_path.display());
    }

    let create = delete_first || create_if_not_exists;
    if !create && !db_path.exists() {
        return Err(Error::Config(format!("Database not found: {}", db_path.display())));
    }
    if create {
        std::fs::create_dir_all(&target.server)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(create)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("Opened database: {}", db_path.display());

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_one(&pool)
    .await?;

    if tables == 0 {
        create_schema(&pool).await?;
        info!("Created catalog schema (datasets, publications, dataset_publication)");
    }

    Ok(pool)
}

/// Create all catalog tables
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_datasets_table(pool).await?;
    create_publications_table(pool).await?;
    create_dataset_publication_table(pool).await?;
    Ok(())
}

async fn create_datasets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS datasets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL CHECK (length(name) <= 150),
            node TEXT NOT NULL CHECK (length(node) <= 30),
            node_specific_identifier TEXT NOT NULL
                CHECK (length(node_specific_identifier) <= 250),
            CONSTRAINT dataset_unique_node_node_specific_identifier
                UNIQUE (node, node_specific_identifier)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_publications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL CHECK (length(title) <= 250),
            url TEXT NOT NULL CHECK (length(url) <= 250),
            CONSTRAINT publications_unique_title_url UNIQUE (title, url)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Association table; rows vanish with either referenced entity
async fn create_dataset_publication_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dataset_publication (
            publication_id INTEGER NOT NULL REFERENCES publications(id) ON DELETE CASCADE,
            dataset_id INTEGER NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
            PRIMARY KEY (publication_id, dataset_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_dataset_publication_dataset ON dataset_publication(dataset_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
