//! PostgreSQL implementation of the short URL repository.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::domain::entities::{DeleteOutcome, NewShortUrl, OwnerId, Saved, ShortUrl};
use crate::domain::repositories::{Operation, ShortUrlRepository, StoreError, StoreResult};
use crate::utils::db_error::is_unique_violation_on;
use crate::utils::uid_codec::{UidCodec, UidStrategy};

/// Upper bound for a single repository call, transaction included.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

const OWNER_URL_CONSTRAINT: &str = "short_url_owner_url_key";

/// Timestamp code draws per record before the `uid` constraint decides.
const MAX_CODE_DRAWS: usize = 64;

#[derive(Debug, sqlx::FromRow)]
struct ShortUrlRow {
    id: i64,
    uid: Option<String>,
    url: String,
    owner_id: Uuid,
    deleted: bool,
}

impl From<ShortUrlRow> for ShortUrl {
    fn from(row: ShortUrlRow) -> Self {
        ShortUrl {
            id: row.id,
            code: row.uid.unwrap_or_default(),
            original_url: row.url,
            owner_id: row.owner_id,
            deleted: row.deleted,
        }
    }
}

/// PostgreSQL repository for short URL records.
///
/// Dedup relies on the `(owner_id, url)` unique constraint. A record is created
/// in one transaction: insert the row, read back the assigned id, derive the
/// code and store it. Any failing step rolls the transaction back.
pub struct PgRepository {
    pool: PgPool,
    codec: Arc<UidCodec>,
}

impl PgRepository {
    /// Creates a repository with an existing connection pool.
    pub fn new(pool: PgPool, codec: Arc<UidCodec>) -> Self {
        Self { pool, codec }
    }

    /// Connects to `dsn` and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database is unreachable or a migration fails.
    pub async fn connect(dsn: &str, codec: Arc<UidCodec>) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(QUERY_TIMEOUT)
            .connect(dsn)
            .await
            .map_err(|e| map_sqlx_error(Operation::Ping, e))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::storage(Operation::Save, e))?;

        Ok(Self::new(pool, codec))
    }

    async fn insert_in(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: i64,
        new_url: NewShortUrl,
    ) -> StoreResult<ShortUrl> {
        let code = self.free_code(tx, id).await?;

        sqlx::query("UPDATE short_url SET uid = $1 WHERE id = $2")
            .bind(&code)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error(Operation::Save, e))?;

        Ok(ShortUrl::new(id, code, new_url.original_url, new_url.owner_id))
    }

    /// Draws a code for `id`. Timestamp codes already stored are drawn again;
    /// a sequential clash is left to the `uid` constraint.
    async fn free_code(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: i64,
    ) -> StoreResult<String> {
        let draw = || {
            self.codec
                .code_for(id)
                .map_err(|e| StoreError::storage(Operation::Save, e))
        };

        if self.codec.strategy() == UidStrategy::Sequential {
            return draw();
        }

        let mut code = draw()?;
        for _ in 1..MAX_CODE_DRAWS {
            let taken = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM short_url WHERE uid = $1)",
            )
            .bind(&code)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error(Operation::Save, e))?;

            if !taken {
                break;
            }
            debug!("Code '{}' is already taken", code);
            code = draw()?;
        }

        Ok(code)
    }
}

fn map_sqlx_error(op: Operation, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout { op },
        other => StoreError::storage(op, other),
    }
}

async fn bounded<T>(op: Operation, fut: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
    tokio::time::timeout(QUERY_TIMEOUT, fut)
        .await
        .map_err(|_| StoreError::Timeout { op })?
}

const SELECT_COLUMNS: &str = "SELECT id, uid, url, owner_id, deleted FROM short_url";

#[async_trait]
impl ShortUrlRepository for PgRepository {
    async fn find_by_code(&self, code: &str) -> StoreResult<Option<ShortUrl>> {
        bounded(Operation::Find, async {
            let row = sqlx::query_as::<_, ShortUrlRow>(&format!("{SELECT_COLUMNS} WHERE uid = $1"))
                .bind(code)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(Operation::Find, e))?;

            Ok(row.map(ShortUrl::from))
        })
        .await
    }

    async fn find_all_by_owner(&self, owner_id: &OwnerId) -> StoreResult<Vec<ShortUrl>> {
        bounded(Operation::Find, async {
            let rows = sqlx::query_as::<_, ShortUrlRow>(&format!(
                "{SELECT_COLUMNS} WHERE owner_id = $1 ORDER BY id"
            ))
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(Operation::Find, e))?;

            Ok(rows.into_iter().map(ShortUrl::from).collect())
        })
        .await
    }

    async fn find_all_by_owner_and_codes(
        &self,
        owner_id: &OwnerId,
        codes: &[String],
    ) -> StoreResult<Vec<ShortUrl>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        bounded(Operation::Find, async {
            let rows = sqlx::query_as::<_, ShortUrlRow>(&format!(
                "{SELECT_COLUMNS} WHERE owner_id = $1 AND uid = ANY($2) ORDER BY id"
            ))
            .bind(owner_id)
            .bind(codes.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(Operation::Find, e))?;

            Ok(rows.into_iter().map(ShortUrl::from).collect())
        })
        .await
    }

    async fn save(&self, new_url: NewShortUrl) -> StoreResult<Saved> {
        bounded(Operation::Save, async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(Operation::Save, e))?;

            let inserted = sqlx::query_scalar::<_, i64>(
                "INSERT INTO short_url (url, owner_id) VALUES ($1, $2) RETURNING id",
            )
            .bind(&new_url.original_url)
            .bind(new_url.owner_id)
            .fetch_one(&mut *tx)
            .await;

            let id = match inserted {
                Ok(id) => id,
                Err(e) if is_unique_violation_on(&e, OWNER_URL_CONSTRAINT) => {
                    tx.rollback()
                        .await
                        .map_err(|e| map_sqlx_error(Operation::Save, e))?;

                    let existing = sqlx::query_as::<_, ShortUrlRow>(&format!(
                        "{SELECT_COLUMNS} WHERE owner_id = $1 AND url = $2"
                    ))
                    .bind(new_url.owner_id)
                    .bind(&new_url.original_url)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| map_sqlx_error(Operation::Save, e))?;

                    return Ok(Saved::Duplicate(existing.into()));
                }
                Err(e) => return Err(map_sqlx_error(Operation::Save, e)),
            };

            let record = self.insert_in(&mut tx, id, new_url).await?;

            tx.commit()
                .await
                .map_err(|e| map_sqlx_error(Operation::Save, e))?;

            Ok(Saved::Created(record))
        })
        .await
    }

    async fn batch_save(&self, new_urls: Vec<NewShortUrl>) -> StoreResult<Vec<Saved>> {
        bounded(Operation::Save, async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(Operation::Save, e))?;

            let mut results = Vec::with_capacity(new_urls.len());

            for new_url in new_urls {
                let inserted = sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO short_url (url, owner_id) VALUES ($1, $2)
                    ON CONFLICT (owner_id, url) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(&new_url.original_url)
                .bind(new_url.owner_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(Operation::Save, e))?;

                match inserted {
                    Some(id) => {
                        let record = self.insert_in(&mut tx, id, new_url).await?;
                        results.push(Saved::Created(record));
                    }
                    None => {
                        let existing = sqlx::query_as::<_, ShortUrlRow>(&format!(
                            "{SELECT_COLUMNS} WHERE owner_id = $1 AND url = $2"
                        ))
                        .bind(new_url.owner_id)
                        .bind(&new_url.original_url)
                        .fetch_one(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error(Operation::Save, e))?;

                        results.push(Saved::Duplicate(existing.into()));
                    }
                }
            }

            tx.commit()
                .await
                .map_err(|e| map_sqlx_error(Operation::Save, e))?;

            Ok(results)
        })
        .await
    }

    async fn batch_soft_delete(&self, records: &[ShortUrl]) -> StoreResult<DeleteOutcome> {
        if records.is_empty() {
            return Ok(DeleteOutcome::NothingToDelete);
        }

        let ids: Vec<i64> = records.iter().map(|record| record.id).collect();

        bounded(Operation::Delete, async {
            let result = sqlx::query(
                "UPDATE short_url SET deleted = TRUE WHERE id = ANY($1) AND deleted = FALSE",
            )
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(Operation::Delete, e))?;

            Ok(DeleteOutcome::Deleted(result.rows_affected() as usize))
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        bounded(Operation::Ping, async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(Operation::Ping, e))?;
            Ok(())
        })
        .await
    }
}
