//! Refresh token tracking storage for PostgreSQL.

use larder_auth::types::RefreshTokenRecord;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgConnection;
use time::OffsetDateTime;

use crate::{PgPool, StorageError, StorageResult};

/// Raw tracking row in column order.
pub(crate) type TrackingRow = (
    String,
    String,
    Option<String>,
    bool,
    Option<OffsetDateTime>,
    OffsetDateTime,
    OffsetDateTime,
    Option<String>,
    Option<String>,
);

pub(crate) const TRACKING_COLUMNS: &str =
    "jti, user_id, parent_jti, used, used_at, created_at, expires_at, ip_address, user_agent";

pub(crate) fn record_from_row(row: TrackingRow) -> RefreshTokenRecord {
    let (jti, user_id, parent_jti, used, used_at, created_at, expires_at, client_ip, user_agent) =
        row;
    RefreshTokenRecord {
        jti,
        user_id,
        parent_jti,
        used,
        used_at,
        created_at,
        expires_at,
        client_ip,
        user_agent,
    }
}

/// Insert a tracking record on an existing connection or transaction.
pub(crate) async fn insert_record(
    conn: &mut PgConnection,
    record: &RefreshTokenRecord,
) -> StorageResult<()> {
    query(
        r#"
        INSERT INTO refresh_token_tracking
            (jti, user_id, parent_jti, used, used_at, created_at, expires_at, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(&record.jti)
    .bind(&record.user_id)
    .bind(&record.parent_jti)
    .bind(record.used)
    .bind(record.used_at)
    .bind(record.created_at)
    .bind(record.expires_at)
    .bind(&record.client_ip)
    .bind(&record.user_agent)
    .execute(conn)
    .await
    .map_err(|e| {
        if let sqlx_core::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return StorageError::conflict(format!(
                "refresh token '{}' is already tracked",
                record.jti
            ));
        }
        StorageError::from(e)
    })?;

    Ok(())
}

// =============================================================================
// Tracking Storage
// =============================================================================

/// Refresh token tracking operations on a borrowed pool.
pub struct TrackingStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> TrackingStorage<'a> {
    /// Create a new tracking storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new tracking record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the `jti` is already tracked, or a
    /// database error if the insert fails.
    pub async fn create(&self, record: &RefreshTokenRecord) -> StorageResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_record(&mut conn, record).await
    }

    /// Find a record by `jti`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_jti(&self, jti: &str) -> StorageResult<Option<RefreshTokenRecord>> {
        let sql = format!("SELECT {TRACKING_COLUMNS} FROM refresh_token_tracking WHERE jti = $1");
        let row: Option<TrackingRow> = query_as(&sql).bind(jti).fetch_optional(self.pool).await?;

        Ok(row.map(record_from_row))
    }

    /// Mark a record consumed if, and only if, it is still unused.
    ///
    /// This is a single conditional `UPDATE`; of any number of concurrent
    /// callers for the same `jti`, exactly one sees `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn mark_used_if_unused(
        &self,
        jti: &str,
        used_at: OffsetDateTime,
    ) -> StorageResult<bool> {
        let result = query(
            r#"
            UPDATE refresh_token_tracking
            SET used = true,
                used_at = $2
            WHERE jti = $1
              AND used = false
            "#,
        )
        .bind(jti)
        .bind(used_at)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// List a user's unused, unexpired records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_active_for_user(
        &self,
        user_id: &str,
        now: OffsetDateTime,
    ) -> StorageResult<Vec<RefreshTokenRecord>> {
        let sql = format!(
            r#"
            SELECT {TRACKING_COLUMNS}
            FROM refresh_token_tracking
            WHERE user_id = $1
              AND used = false
              AND expires_at >= $2
            ORDER BY created_at DESC
            "#
        );
        let rows: Vec<TrackingRow> = query_as(&sql)
            .bind(user_id)
            .bind(now)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(record_from_row).collect())
    }

    /// Delete records with `expires_at < now`.
    ///
    /// # Returns
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_expired(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = query("DELETE FROM refresh_token_tracking WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Count all records and the active subset at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn counts(&self, now: OffsetDateTime) -> StorageResult<(i64, i64)> {
        let counts: (i64, i64) = query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE used = false AND expires_at >= $1)
            FROM refresh_token_tracking
            "#,
        )
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        Ok(counts)
    }
}
