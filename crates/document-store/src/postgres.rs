use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use crate::{
    DocumentEnvelope, DocumentId, DocumentQuery, DocumentStoreError, Result, SortOrder, Version,
    store::{DocumentStore, DocumentWrite, validate_writes},
};

const COLUMNS: &str = "id, collection, version, created_at, updated_at, body";

/// PostgreSQL-backed document store implementation.
///
/// Documents live in a single `documents` table keyed by `(collection, id)`
/// with the body stored as JSONB.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<DocumentEnvelope> {
        Ok(DocumentEnvelope {
            id: DocumentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            collection: row.try_get("collection")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
            body: row.try_get("body")?,
        })
    }

    /// Appends the WHERE clause for a query, numbering parameters from 1.
    fn where_clause(sql: &mut String, query: &DocumentQuery) -> usize {
        let mut param_count = 1;
        sql.push_str(" WHERE collection = $1");

        for _ in &query.equals {
            sql.push_str(&format!(
                " AND body #> ${}::text[] = ${}",
                param_count + 1,
                param_count + 2
            ));
            param_count += 2;
        }
        for _ in &query.missing {
            param_count += 1;
            sql.push_str(&format!(
                " AND (body #> ${param_count}::text[] IS NULL OR body #> ${param_count}::text[] = 'null'::jsonb)"
            ));
        }

        param_count
    }

    /// Binds the WHERE clause parameters in the order `where_clause` numbered them.
    fn bind_where<'q>(
        mut sqlx_query: Query<'q, Postgres, PgArguments>,
        query: &'q DocumentQuery,
    ) -> Query<'q, Postgres, PgArguments> {
        sqlx_query = sqlx_query.bind(query.collection.as_str());
        for filter in &query.equals {
            sqlx_query = sqlx_query
                .bind(DocumentQuery::path_segments(&filter.path))
                .bind(&filter.value);
        }
        for path in &query.missing {
            sqlx_query = sqlx_query.bind(DocumentQuery::path_segments(path));
        }
        sqlx_query
    }

    async fn conflict_or_missing(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        document: &DocumentEnvelope,
        expected: Version,
    ) -> DocumentStoreError {
        let actual: std::result::Result<Option<i64>, sqlx::Error> =
            sqlx::query_scalar("SELECT version FROM documents WHERE collection = $1 AND id = $2")
                .bind(&document.collection)
                .bind(document.id.as_uuid())
                .fetch_optional(&mut **tx)
                .await;

        match actual {
            Ok(Some(actual)) => {
                metrics::counter!("document_store_conflicts_total").increment(1);
                DocumentStoreError::ConcurrencyConflict {
                    collection: document.collection.clone(),
                    id: document.id,
                    expected,
                    actual: Version::new(actual),
                }
            }
            Ok(None) => DocumentStoreError::NotFound {
                collection: document.collection.clone(),
                id: document.id,
            },
            Err(e) => DocumentStoreError::Database(e),
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn commit(&self, writes: Vec<DocumentWrite>) -> Result<Vec<DocumentEnvelope>> {
        validate_writes(&writes)?;

        // Dropping the transaction on any error path rolls the whole batch back
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut committed = Vec::with_capacity(writes.len());

        for write in writes {
            match write {
                DocumentWrite::Insert(mut document) => {
                    sqlx::query(
                        r#"
                        INSERT INTO documents (collection, id, version, created_at, updated_at, body)
                        VALUES ($1, $2, 1, $3, $3, $4)
                        "#,
                    )
                    .bind(&document.collection)
                    .bind(document.id.as_uuid())
                    .bind(now)
                    .bind(&document.body)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        if let sqlx::Error::Database(ref db_err) = e
                            && db_err.is_unique_violation()
                        {
                            return match db_err.constraint() {
                                Some("documents_pkey") => DocumentStoreError::AlreadyExists {
                                    collection: document.collection.clone(),
                                    id: document.id,
                                },
                                constraint => DocumentStoreError::UniqueViolation {
                                    collection: document.collection.clone(),
                                    constraint: constraint.unwrap_or("unknown").to_string(),
                                },
                            };
                        }
                        DocumentStoreError::Database(e)
                    })?;

                    document.version = Version::first();
                    document.created_at = now;
                    document.updated_at = now;
                    committed.push(document);
                }
                DocumentWrite::Update {
                    mut document,
                    expected_version,
                } => {
                    let row: Option<PgRow> = sqlx::query(
                        r#"
                        UPDATE documents
                        SET version = version + 1, updated_at = $4, body = $5
                        WHERE collection = $1 AND id = $2 AND version = $3
                        RETURNING version, created_at
                        "#,
                    )
                    .bind(&document.collection)
                    .bind(document.id.as_uuid())
                    .bind(expected_version.as_i64())
                    .bind(now)
                    .bind(&document.body)
                    .fetch_optional(&mut *tx)
                    .await?;

                    let Some(row) = row else {
                        return Err(
                            Self::conflict_or_missing(&mut tx, &document, expected_version).await,
                        );
                    };

                    document.version = Version::new(row.try_get("version")?);
                    document.created_at = row.try_get("created_at")?;
                    document.updated_at = now;
                    committed.push(document);
                }
            }
        }

        tx.commit().await?;
        tracing::debug!(writes = committed.len(), "document batch committed");
        Ok(committed)
    }

    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<DocumentEnvelope>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = $2"
        ))
        .bind(collection)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<DocumentEnvelope>> {
        let mut sql = format!("SELECT {COLUMNS} FROM documents");
        let param_count = Self::where_clause(&mut sql, &query);

        match query.sort {
            SortOrder::NewestFirst => sql.push_str(" ORDER BY created_at DESC, seq DESC"),
            SortOrder::OldestFirst => sql.push_str(" ORDER BY created_at ASC, seq ASC"),
        }
        if query.limit.is_some() {
            sql.push_str(&format!(" LIMIT ${}", param_count + 1));
        }
        if query.offset.is_some() {
            let n = param_count + 1 + usize::from(query.limit.is_some());
            sql.push_str(&format!(" OFFSET ${n}"));
        }

        let mut sqlx_query = Self::bind_where(sqlx::query(&sql), &query);
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn count(&self, query: DocumentQuery) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) AS total FROM documents");
        Self::where_clause(&mut sql, &query);

        let row = Self::bind_where(sqlx::query(&sql), &query)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total as u64)
    }
}
