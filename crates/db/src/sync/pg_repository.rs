use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::sync::models::{RunStatus, SyncDirection, SyncLease, SyncRun};
use crate::sync::repositories::{SyncLeaseRepository, SyncRunRepository};
use canopy_common::error::{CanopyError, CanopyResult};

const RUN_COLUMNS: &str = "id, site_id, direction, status, started_at, duration_ms, \
     locations_found, rooms_created, rooms_updated, rooms_matched, rooms_orphaned, \
     rooms_pushed, error_message";

const LEASE_COLUMNS: &str = "id, site_id, source, status, locked_at, last_synced_at, \
     error_message, created_at, updated_at";

#[derive(Clone)]
pub struct PgSyncRepository {
    pool: PgPool,
}

impl PgSyncRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_run_row(row: PgRow) -> CanopyResult<SyncRun> {
        let direction_raw: String = row.get("direction");
        let status_raw: String = row.get("status");

        Ok(SyncRun {
            id: row.get("id"),
            site_id: row.get("site_id"),
            direction: SyncDirection::from_str(&direction_raw).map_err(CanopyError::Internal)?,
            status: RunStatus::from_str(&status_raw).map_err(CanopyError::Internal)?,
            started_at: row.get("started_at"),
            duration_ms: row.get("duration_ms"),
            locations_found: row.get("locations_found"),
            rooms_created: row.get("rooms_created"),
            rooms_updated: row.get("rooms_updated"),
            rooms_matched: row.get("rooms_matched"),
            rooms_orphaned: row.get("rooms_orphaned"),
            rooms_pushed: row.get("rooms_pushed"),
            error_message: row.get("error_message"),
        })
    }

    fn map_lease_row(row: PgRow) -> CanopyResult<SyncLease> {
        Ok(SyncLease {
            id: row.get("id"),
            site_id: row.get("site_id"),
            source: row.get("source"),
            status: row.get("status"),
            locked_at: row.get("locked_at"),
            last_synced_at: row.get("last_synced_at"),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl SyncRunRepository for PgSyncRepository {
    async fn record_run(&self, run: SyncRun) -> CanopyResult<SyncRun> {
        let row = sqlx::query(&format!(
            "insert into sync_runs
               (id, site_id, direction, status, started_at, duration_ms,
                locations_found, rooms_created, rooms_updated, rooms_matched,
                rooms_orphaned, rooms_pushed, error_message)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             returning {RUN_COLUMNS}"
        ))
        .bind(run.id)
        .bind(run.site_id)
        .bind(run.direction.as_str())
        .bind(run.status.as_str())
        .bind(run.started_at)
        .bind(run.duration_ms)
        .bind(run.locations_found)
        .bind(run.rooms_created)
        .bind(run.rooms_updated)
        .bind(run.rooms_matched)
        .bind(run.rooms_orphaned)
        .bind(run.rooms_pushed)
        .bind(&run.error_message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CanopyError::Database(e.to_string()))?;

        Self::map_run_row(row)
    }

    async fn list_recent(&self, site_id: Uuid, limit: i64) -> CanopyResult<Vec<SyncRun>> {
        let rows = sqlx::query(&format!(
            "select {RUN_COLUMNS} from sync_runs
             where site_id = $1
             order by started_at desc
             limit $2"
        ))
        .bind(site_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CanopyError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_run_row).collect()
    }
}

#[async_trait]
impl SyncLeaseRepository for PgSyncRepository {
    async fn get_or_create(&self, site_id: Uuid, source: &str) -> CanopyResult<SyncLease> {
        let row = sqlx::query(&format!(
            "insert into sync_leases (id, site_id, source)
             values ($1, $2, $3)
             on conflict (site_id, source) do update set updated_at = now()
             returning {LEASE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(site_id)
        .bind(source)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CanopyError::Database(e.to_string()))?;

        Self::map_lease_row(row)
    }

    async fn acquire(
        &self,
        site_id: Uuid,
        source: &str,
        stale_after_secs: u64,
    ) -> CanopyResult<Option<SyncLease>> {
        let now = Utc::now();
        let stale_before = now - Duration::seconds(stale_after_secs as i64);

        let row = sqlx::query(&format!(
            "update sync_leases
             set status = 'running', locked_at = $1, error_message = null, updated_at = $1
             where site_id = $2 and source = $3
               and (status != 'running' or locked_at is null or locked_at < $4)
             returning {LEASE_COLUMNS}"
        ))
        .bind(now)
        .bind(site_id)
        .bind(source)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CanopyError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::map_lease_row(r)?)),
            None => Ok(None),
        }
    }

    async fn release_completed(&self, id: Uuid) -> CanopyResult<SyncLease> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "update sync_leases
             set status = 'idle', locked_at = null, last_synced_at = $1,
                 error_message = null, updated_at = $1
             where id = $2
             returning {LEASE_COLUMNS}"
        ))
        .bind(now)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CanopyError::Database(e.to_string()))?;

        Self::map_lease_row(row)
    }

    async fn release_failed(&self, id: Uuid, error_message: &str) -> CanopyResult<SyncLease> {
        let row = sqlx::query(&format!(
            "update sync_leases
             set status = 'failed', locked_at = null, error_message = $1, updated_at = $2
             where id = $3
             returning {LEASE_COLUMNS}"
        ))
        .bind(error_message)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CanopyError::Database(e.to_string()))?;

        Self::map_lease_row(row)
    }
}
