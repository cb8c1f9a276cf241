//! Entity store: relational persistence for datasets, publications and
//! their links
//!
//! (node, node_specific_identifier) is the natural key of a dataset.
//! Inserts resolve a natural-key collision to the row already stored, so
//! repeated ingestion and racing write-backs never create duplicates.

use crate::db::models::{DatasetDescription, NewDataset, NewPublication, Publication};
use crate::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

/// Row counts written by [`EntityStore::insert_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub datasets: u64,
    pub publications: u64,
    pub links: u64,
}

/// SQLite-backed entity store
#[derive(Clone)]
pub struct EntityStore {
    pool: SqlitePool,
}

impl EntityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// True if at least one dataset or publication row exists
    pub async fn has_any_data(&self) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM datasets) OR EXISTS(SELECT 1 FROM publications)",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    /// Exact-match lookup on the natural key
    pub async fn find_dataset(
        &self,
        node: &str,
        node_specific_identifier: &str,
    ) -> Result<Option<DatasetDescription>> {
        let dataset = sqlx::query_as::<_, DatasetDescription>(
            r#"
            SELECT id, name, node, node_specific_identifier
            FROM datasets
            WHERE node = ? AND node_specific_identifier = ?
            "#,
        )
        .bind(node)
        .bind(node_specific_identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(dataset)
    }

    /// Lookup by surrogate id
    pub async fn get_dataset(&self, id: i64) -> Result<Option<DatasetDescription>> {
        let dataset = sqlx::query_as::<_, DatasetDescription>(
            "SELECT id, name, node, node_specific_identifier FROM datasets WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(dataset)
    }

    /// All datasets in insertion order
    pub async fn list_datasets(&self) -> Result<Vec<DatasetDescription>> {
        let datasets = sqlx::query_as::<_, DatasetDescription>(
            "SELECT id, name, node, node_specific_identifier FROM datasets ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(datasets)
    }

    /// One page of datasets in insertion order
    pub async fn list_datasets_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DatasetDescription>> {
        let datasets = sqlx::query_as::<_, DatasetDescription>(
            r#"
            SELECT id, name, node, node_specific_identifier
            FROM datasets
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(datasets)
    }

    /// One page of the datasets originating from `node`
    pub async fn list_datasets_of_node(
        &self,
        node: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DatasetDescription>> {
        let datasets = sqlx::query_as::<_, DatasetDescription>(
            r#"
            SELECT id, name, node, node_specific_identifier
            FROM datasets
            WHERE node = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(node)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(datasets)
    }

    /// Bulk insert in a single transaction.
    ///
    /// Link rows are derived from `NewPublication::datasets`, which index
    /// into `datasets`. Either every row is committed or none is.
    pub async fn insert_all(
        &self,
        datasets: &[NewDataset],
        publications: &[NewPublication],
    ) -> Result<InsertSummary> {
        let mut summary = InsertSummary::default();
        let mut tx = self.pool.begin().await?;

        let mut dataset_ids = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            let (id, inserted) = insert_dataset_row(&mut *tx, dataset).await?;
            if inserted {
                summary.datasets += 1;
            }
            dataset_ids.push(id);
        }

        for publication in publications {
            let (publication_id, inserted) = insert_publication_row(&mut *tx, publication).await?;
            if inserted {
                summary.publications += 1;
            }

            for &index in &publication.datasets {
                let dataset_id = *dataset_ids.get(index).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "Publication '{}' links dataset #{} outside a batch of {}",
                        publication.title,
                        index,
                        datasets.len()
                    ))
                })?;
                summary.links += insert_link_row(&mut *tx, dataset_id, publication_id).await?;
            }
        }

        tx.commit().await?;

        debug!(
            datasets = summary.datasets,
            publications = summary.publications,
            links = summary.links,
            "Committed bulk insert"
        );

        Ok(summary)
    }

    /// Insert one dataset unless its natural key is already stored, then
    /// return the stored row. A concurrent identical insert resolves to the
    /// same row.
    pub async fn insert_dataset_if_absent(&self, dataset: &NewDataset) -> Result<DatasetDescription> {
        let mut conn = self.pool.acquire().await?;
        let (id, _) = insert_dataset_row(&mut *conn, dataset).await?;
        drop(conn);

        self.get_dataset(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("dataset {}", id)))
    }

    /// Register a single dataset; the natural key must be free
    pub async fn register_dataset(&self, dataset: &NewDataset) -> Result<DatasetDescription> {
        dataset.validate()?;

        let result = sqlx::query(
            "INSERT INTO datasets (name, node, node_specific_identifier) VALUES (?, ?, ?)",
        )
        .bind(&dataset.name)
        .bind(&dataset.node)
        .bind(&dataset.node_specific_identifier)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                let id = done.last_insert_rowid();
                self.get_dataset(id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("dataset {}", id)))
            }
            Err(e) if is_unique_violation(&e) => Err(self.dataset_conflict(dataset).await?),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace all fields of a dataset; `None` when the id is unknown
    pub async fn update_dataset(
        &self,
        id: i64,
        dataset: &NewDataset,
    ) -> Result<Option<DatasetDescription>> {
        dataset.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE datasets
            SET name = ?, node = ?, node_specific_identifier = ?
            WHERE id = ?
            "#,
        )
        .bind(&dataset.name)
        .bind(&dataset.node)
        .bind(&dataset.node_specific_identifier)
        .bind(id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(None),
            Ok(_) => self.get_dataset(id).await,
            Err(e) if is_unique_violation(&e) => Err(self.dataset_conflict(dataset).await?),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a dataset and its links; false when the id is unknown
    pub async fn delete_dataset(&self, id: i64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM datasets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(done.rows_affected() > 0)
    }

    pub async fn get_publication(&self, id: i64) -> Result<Option<Publication>> {
        let publication = sqlx::query_as::<_, Publication>(
            "SELECT id, title, url FROM publications WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(publication)
    }

    /// One page of publications in insertion order
    pub async fn list_publications(&self, offset: i64, limit: i64) -> Result<Vec<Publication>> {
        let publications = sqlx::query_as::<_, Publication>(
            "SELECT id, title, url FROM publications ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(publications)
    }

    /// Register a single publication; (title, url) must be free
    pub async fn register_publication(&self, publication: &NewPublication) -> Result<Publication> {
        publication.validate()?;

        let result = sqlx::query("INSERT INTO publications (title, url) VALUES (?, ?)")
            .bind(&publication.title)
            .bind(&publication.url)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => {
                let id = done.last_insert_rowid();
                self.get_publication(id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("publication {}", id)))
            }
            Err(e) if is_unique_violation(&e) => Err(self.publication_conflict(publication).await?),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace title and url; `None` when the id is unknown
    pub async fn update_publication(
        &self,
        id: i64,
        publication: &NewPublication,
    ) -> Result<Option<Publication>> {
        publication.validate()?;

        let result = sqlx::query("UPDATE publications SET title = ?, url = ? WHERE id = ?")
            .bind(&publication.title)
            .bind(&publication.url)
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(None),
            Ok(_) => self.get_publication(id).await,
            Err(e) if is_unique_violation(&e) => Err(self.publication_conflict(publication).await?),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a publication and its links; false when the id is unknown
    pub async fn delete_publication(&self, id: i64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM publications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(done.rows_affected() > 0)
    }

    /// Publications linked to a dataset, by id
    pub async fn publications_of_dataset(&self, dataset_id: i64) -> Result<Vec<Publication>> {
        let publications = sqlx::query_as::<_, Publication>(
            r#"
            SELECT p.id, p.title, p.url
            FROM publications p
            JOIN dataset_publication dp ON dp.publication_id = p.id
            WHERE dp.dataset_id = ?
            ORDER BY p.id
            "#,
        )
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(publications)
    }

    /// Datasets linked to a publication, by id
    pub async fn datasets_of_publication(
        &self,
        publication_id: i64,
    ) -> Result<Vec<DatasetDescription>> {
        let datasets = sqlx::query_as::<_, DatasetDescription>(
            r#"
            SELECT d.id, d.name, d.node, d.node_specific_identifier
            FROM datasets d
            JOIN dataset_publication dp ON dp.dataset_id = d.id
            WHERE dp.publication_id = ?
            ORDER BY d.id
            "#,
        )
        .bind(publication_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(datasets)
    }

    /// Link two stored rows; false when already linked
    pub async fn link(&self, dataset_id: i64, publication_id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        let inserted = insert_link_row(&mut *conn, dataset_id, publication_id).await?;
        Ok(inserted > 0)
    }

    /// Remove a link; false when the rows were not linked
    pub async fn unlink(&self, dataset_id: i64, publication_id: i64) -> Result<bool> {
        let done = sqlx::query(
            "DELETE FROM dataset_publication WHERE dataset_id = ? AND publication_id = ?",
        )
        .bind(dataset_id)
        .bind(publication_id)
        .execute(&self.pool)
        .await?;

        Ok(done.rows_affected() > 0)
    }

    async fn dataset_conflict(&self, dataset: &NewDataset) -> Result<Error> {
        let existing = self
            .find_dataset(&dataset.node, &dataset.node_specific_identifier)
            .await?;
        let id = existing.map(|d| d.id.to_string()).unwrap_or_else(|| "?".to_string());
        Ok(Error::Conflict(format!(
            "There already exists a dataset with the same node and node_specific_identifier, with id={}.",
            id
        )))
    }

    async fn publication_conflict(&self, publication: &NewPublication) -> Result<Error> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM publications WHERE title = ? AND url = ?")
                .bind(&publication.title)
                .bind(&publication.url)
                .fetch_optional(&self.pool)
                .await?;
        let id = id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string());
        Ok(Error::Conflict(format!(
            "There already exists a publication with the same title and url, with id={}.",
            id
        )))
    }
}

/// Insert unless the natural key exists; returns (id, newly inserted)
async fn insert_dataset_row(
    conn: &mut SqliteConnection,
    dataset: &NewDataset,
) -> Result<(i64, bool)> {
    dataset.validate()?;

    let done = sqlx::query(
        r#"
        INSERT INTO datasets (name, node, node_specific_identifier)
        VALUES (?, ?, ?)
        ON CONFLICT(node, node_specific_identifier) DO NOTHING
        "#,
    )
    .bind(&dataset.name)
    .bind(&dataset.node)
    .bind(&dataset.node_specific_identifier)
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar(
        "SELECT id FROM datasets WHERE node = ? AND node_specific_identifier = ?",
    )
    .bind(&dataset.node)
    .bind(&dataset.node_specific_identifier)
    .fetch_one(&mut *conn)
    .await?;

    Ok((id, done.rows_affected() > 0))
}

/// Insert unless (title, url) exists; returns (id, newly inserted)
async fn insert_publication_row(
    conn: &mut SqliteConnection,
    publication: &NewPublication,
) -> Result<(i64, bool)> {
    publication.validate()?;

    let done = sqlx::query(
        r#"
        INSERT INTO publications (title, url)
        VALUES (?, ?)
        ON CONFLICT(title, url) DO NOTHING
        "#,
    )
    .bind(&publication.title)
    .bind(&publication.url)
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM publications WHERE title = ? AND url = ?")
        .bind(&publication.title)
        .bind(&publication.url)
        .fetch_one(&mut *conn)
        .await?;

    Ok((id, done.rows_affected() > 0))
}

async fn insert_link_row(
    conn: &mut SqliteConnection,
    dataset_id: i64,
    publication_id: i64,
) -> Result<u64> {
    let done = sqlx::query(
        "INSERT OR IGNORE INTO dataset_publication (publication_id, dataset_id) VALUES (?, ?)",
    )
    .bind(publication_id)
    .bind(dataset_id)
    .execute(&mut *conn)
    .await?;

    Ok(done.rows_affected())
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}
