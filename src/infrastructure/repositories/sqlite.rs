use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Pool, Row, Sqlite};
use uuid::Uuid;

use crate::domain::{
    models::{Broadcast, BroadcastContact, BroadcastStatus, ContactStatus, MessagePayload},
    repositories::{BroadcastRepository, ContactRepository, ContactStatusCounts},
    value_objects::SmartPauseWindow,
};

pub type SqlitePool = Pool<Sqlite>;

/// Opens (creating if missing) the embedded database and ensures the schema.
pub async fn connect(path: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    init_schema(&pool).await?;
    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS broadcasts (
            id TEXT PRIMARY KEY,
            name TEXT,
            message TEXT NOT NULL,
            is_typing INTEGER NOT NULL DEFAULT 0,
            validate_numbers INTEGER NOT NULL DEFAULT 0,
            scheduled_at TEXT,
            smart_pause_start TEXT,
            smart_pause_end TEXT,
            status TEXT NOT NULL,
            delay_min_ms INTEGER NOT NULL,
            delay_max_ms INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS broadcast_contacts (
            id TEXT PRIMARY KEY,
            broadcast_id TEXT NOT NULL REFERENCES broadcasts(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            number TEXT NOT NULL,
            name TEXT,
            status TEXT NOT NULL,
            error TEXT,
            scheduled_at TEXT,
            send_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // batch-pending queries filter on both columns
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_broadcast_contacts_broadcast_status
        ON broadcast_contacts (broadcast_id, status)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct SqliteBroadcastRepository {
    pool: SqlitePool,
}

impl SqliteBroadcastRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BroadcastRepository for SqliteBroadcastRepository {
    async fn insert(&self, broadcast: &Broadcast) -> anyhow::Result<()> {
        let message = serde_json::to_string(&broadcast.message)?;
        sqlx::query(
            r#"
            INSERT INTO broadcasts (
                id, name, message, is_typing, validate_numbers, scheduled_at,
                smart_pause_start, smart_pause_end, status,
                delay_min_ms, delay_max_ms, created_at, updated_at
            ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?)
            "#,
        )
        .bind(broadcast.id.to_string())
        .bind(&broadcast.name)
        .bind(message)
        .bind(broadcast.is_typing as i64)
        .bind(broadcast.validate_numbers as i64)
        .bind(broadcast.scheduled_at)
        .bind(broadcast.smart_pause.map(|w| w.start.to_string()))
        .bind(broadcast.smart_pause.map(|w| w.end.to_string()))
        .bind(broadcast.status.as_str())
        .bind(broadcast.delay_min_ms as i64)
        .bind(broadcast.delay_max_ms as i64)
        .bind(broadcast.created_at)
        .bind(broadcast.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Broadcast>> {
        let record = sqlx::query_as::<_, BroadcastRecord>(
            r#"SELECT * FROM broadcasts WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        record.map(Broadcast::try_from).transpose()
    }

    async fn update_status(&self, id: Uuid, status: BroadcastStatus) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE broadcasts SET status = ?, updated_at = ? WHERE id = ?"#)
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: BroadcastStatus,
        to: BroadcastStatus,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"UPDATE broadcasts SET status = ?, updated_at = ? WHERE id = ? AND status = ?"#,
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_dispatchable(&self) -> anyhow::Result<Vec<Broadcast>> {
        let records = sqlx::query_as::<_, BroadcastRecord>(
            r#"
            SELECT * FROM broadcasts
            WHERE status IN ('pending', 'running')
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        records.into_iter().map(Broadcast::try_from).collect()
    }

    async fn find_most_recent(&self) -> anyhow::Result<Option<Broadcast>> {
        let record = sqlx::query_as::<_, BroadcastRecord>(
            r#"SELECT * FROM broadcasts ORDER BY created_at DESC LIMIT 1"#,
        )
        .fetch_optional(&self.pool)
        .await?;
        record.map(Broadcast::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM broadcasts WHERE id = ?"#)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteContactRepository {
    pool: SqlitePool,
}

impl SqliteContactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactRepository for SqliteContactRepository {
    async fn insert_batch(&self, batch: &[BroadcastContact]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for contact in batch {
            sqlx::query(
                r#"
                INSERT INTO broadcast_contacts (
                    id, broadcast_id, position, number, name, status, error,
                    scheduled_at, send_at, created_at, updated_at
                ) VALUES (?,?,?,?,?,?,?,?,?,?,?)
                "#,
            )
            .bind(contact.id.to_string())
            .bind(contact.broadcast_id.to_string())
            .bind(contact.position as i64)
            .bind(&contact.number)
            .bind(&contact.name)
            .bind(contact.status.as_str())
            .bind(&contact.error)
            .bind(contact.scheduled_at)
            .bind(contact.send_at)
            .bind(contact.created_at)
            .bind(contact.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<BroadcastContact>> {
        let record = sqlx::query_as::<_, ContactRecord>(
            r#"SELECT * FROM broadcast_contacts WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        record.map(BroadcastContact::try_from).transpose()
    }

    async fn pending_batch(
        &self,
        broadcast_id: Uuid,
        limit: u32,
    ) -> anyhow::Result<Vec<BroadcastContact>> {
        let records = sqlx::query_as::<_, ContactRecord>(
            r#"
            SELECT * FROM broadcast_contacts
            WHERE broadcast_id = ? AND status = 'pending'
            ORDER BY position ASC
            LIMIT ?
            "#,
        )
        .bind(broadcast_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        records.into_iter().map(BroadcastContact::try_from).collect()
    }

    async fn claim_running(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE broadcast_contacts
            SET status = 'running', updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_success(&self, id: Uuid, send_at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE broadcast_contacts
            SET status = 'success', error = NULL, send_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(send_at)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE broadcast_contacts
            SET status = 'failed', error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(reason)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_pending(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE broadcast_contacts
            SET status = 'pending', error = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset_orphaned_running(&self) -> anyhow::Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            UPDATE broadcast_contacts
            SET status = 'pending', updated_at = ?
            WHERE status = 'running'
            RETURNING broadcast_id
            "#,
        )
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;

        let mut affected = Vec::new();
        for row in rows {
            let raw: String = row.try_get("broadcast_id")?;
            let broadcast_id = Uuid::parse_str(&raw)?;
            if !affected.contains(&broadcast_id) {
                affected.push(broadcast_id);
            }
        }
        Ok(affected)
    }

    async fn reset_failed(&self, broadcast_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE broadcast_contacts
            SET status = 'pending', error = NULL, updated_at = ?
            WHERE broadcast_id = ? AND status = 'failed'
            "#,
        )
        .bind(Utc::now())
        .bind(broadcast_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn has_unfinished(&self, broadcast_id: Uuid) -> anyhow::Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS unfinished FROM broadcast_contacts
            WHERE broadcast_id = ? AND status IN ('pending', 'running')
            "#,
        )
        .bind(broadcast_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        let unfinished: i64 = row.try_get("unfinished")?;
        Ok(unfinished > 0)
    }

    async fn list_by_broadcast(
        &self,
        broadcast_id: Uuid,
    ) -> anyhow::Result<Vec<BroadcastContact>> {
        let records = sqlx::query_as::<_, ContactRecord>(
            r#"
            SELECT * FROM broadcast_contacts
            WHERE broadcast_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(broadcast_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        records.into_iter().map(BroadcastContact::try_from).collect()
    }

    async fn status_counts(&self, broadcast_id: Uuid) -> anyhow::Result<ContactStatusCounts> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS total FROM broadcast_contacts
            WHERE broadcast_id = ?
            GROUP BY status
            "#,
        )
        .bind(broadcast_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut counts = ContactStatusCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let total: i64 = row.try_get("total")?;
            match ContactStatus::from_str(&status) {
                Some(ContactStatus::Pending) => counts.pending = total as u64,
                Some(ContactStatus::Running) => counts.running = total as u64,
                Some(ContactStatus::Success) => counts.success = total as u64,
                Some(ContactStatus::Failed) => counts.failed = total as u64,
                None => anyhow::bail!("unknown contact status {status}"),
            }
        }
        Ok(counts)
    }

    async fn count_by_status(
        &self,
        broadcast_id: Uuid,
        status: ContactStatus,
    ) -> anyhow::Result<u64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total FROM broadcast_contacts
            WHERE broadcast_id = ? AND status = ?
            "#,
        )
        .bind(broadcast_id.to_string())
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total as u64)
    }
}

#[derive(FromRow)]
struct BroadcastRecord {
    id: String,
    name: Option<String>,
    message: String,
    is_typing: i64,
    validate_numbers: i64,
    scheduled_at: Option<DateTime<Utc>>,
    smart_pause_start: Option<String>,
    smart_pause_end: Option<String>,
    status: String,
    delay_min_ms: i64,
    delay_max_ms: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BroadcastRecord> for Broadcast {
    type Error = anyhow::Error;

    fn try_from(value: BroadcastRecord) -> Result<Self, Self::Error> {
        let status = BroadcastStatus::from_str(&value.status)
            .ok_or_else(|| anyhow::anyhow!("unknown broadcast status {}", value.status))?;
        let message: MessagePayload = serde_json::from_str(&value.message)?;
        let smart_pause = match (value.smart_pause_start, value.smart_pause_end) {
            (Some(start), Some(end)) => Some(SmartPauseWindow::new(
                start.parse::<NaiveTime>()?,
                end.parse::<NaiveTime>()?,
            )),
            _ => None,
        };
        Ok(Self {
            id: Uuid::parse_str(&value.id)?,
            name: value.name,
            message,
            is_typing: value.is_typing != 0,
            validate_numbers: value.validate_numbers != 0,
            scheduled_at: value.scheduled_at,
            smart_pause,
            status,
            delay_min_ms: value.delay_min_ms as u64,
            delay_max_ms: value.delay_max_ms as u64,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ContactRecord {
    id: String,
    broadcast_id: String,
    position: i64,
    number: String,
    name: Option<String>,
    status: String,
    error: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
    send_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContactRecord> for BroadcastContact {
    type Error = anyhow::Error;

    fn try_from(value: ContactRecord) -> Result<Self, Self::Error> {
        let status = ContactStatus::from_str(&value.status)
            .ok_or_else(|| anyhow::anyhow!("unknown contact status {}", value.status))?;
        Ok(Self {
            id: Uuid::parse_str(&value.id)?,
            broadcast_id: Uuid::parse_str(&value.broadcast_id)?,
            position: value.position as u32,
            number: value.number,
            name: value.name,
            status,
            error: value.error,
            scheduled_at: value.scheduled_at,
            send_at: value.send_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}
