use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, migrate::Migrator, postgres::PgPoolOptions};
use url::Url;

use crate::error::StoreError;
use crate::shortid::ShortId;
use crate::store::{NewUrl, OwnerId, UrlRecord, UrlStore};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const RECORD_COLUMNS: &str =
    "short_id, original_url, owner_id, click_count, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct UrlRow {
    short_id: String,
    original_url: String,
    owner_id: Option<String>,
    click_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UrlRow> for UrlRecord {
    type Error = StoreError;

    fn try_from(row: UrlRow) -> Result<Self, Self::Error> {
        let short_id = ShortId::try_from(row.short_id)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let original_url = Url::parse(&row.original_url).map_err(|e| {
            StoreError::Corrupt(format!("original_url of {short_id}: {e}"))
        })?;
        let click_count = u64::try_from(row.click_count).map_err(|_| {
            StoreError::Corrupt(format!("negative click_count for {short_id}"))
        })?;

        Ok(UrlRecord {
            short_id,
            original_url,
            owner_id: row.owner_id.and_then(OwnerId::new),
            click_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn try_from_database_url(
        db_url: &str,
        pool_size: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let pool = create_connection_pool(db_url, pool_size, acquire_timeout).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl UrlStore for PgStore {
    async fn insert_url(&self, new: NewUrl) -> Result<UrlRecord, StoreError> {
        let sql = format!(
            "INSERT INTO urls (short_id, original_url, owner_id) \
             VALUES ($1, $2, $3) \
             RETURNING {RECORD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UrlRow>(&sql)
            .bind(new.short_id.as_str())
            .bind(new.original_url.as_str())
            .bind(new.owner_id.as_ref().map(OwnerId::as_str))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    StoreError::Conflict(new.short_id.to_string())
                }
                other => StoreError::from(other),
            })?;

        UrlRecord::try_from(row)
    }

    async fn find_by_short_id(&self, id: &ShortId) -> Result<Option<UrlRecord>, StoreError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM urls WHERE short_id = $1");
        let row = sqlx::query_as::<_, UrlRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(UrlRecord::try_from).transpose()
    }

    async fn increment_click_count(&self, id: &ShortId) -> Result<bool, StoreError> {
        // Single statement: the row lock makes concurrent increments serialize.
        let res = sqlx::query(
            r#"
            UPDATE urls
            SET click_count = click_count + 1,
                updated_at = now()
            WHERE short_id = $1
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    async fn count_by_owner(&self, owner: &OwnerId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM urls WHERE owner_id = $1")
            .bind(owner.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn list_by_owner(
        &self,
        owner: &OwnerId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<UrlRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM urls \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, UrlRow>(&sql)
            .bind(owner.as_str())
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(UrlRecord::try_from).collect()
    }
}

async fn create_connection_pool(
    url: &str,
    pool_size: u32,
    acquire_timeout: Duration,
) -> sqlx::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(pool_size)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
}
