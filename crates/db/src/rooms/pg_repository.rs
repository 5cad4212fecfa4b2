use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::rooms::models::{Room, RoomSyncUpdate, SyncStatus};
use crate::rooms::repositories::RoomRepository;
use canopy_common::error::{CanopyError, CanopyResult};

const ROOM_COLUMNS: &str = "id, site_id, name, external_location_id, external_location_name, \
     sync_status, sync_error_detail, created_by_internal, active, last_synced_at, \
     created_at, updated_at";

#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Unique-index violations surface as `Conflict` so callers can tell a
    /// double-linked external id apart from an outage.
    fn map_sqlx(e: sqlx::Error) -> CanopyError {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CanopyError::Conflict(db.message().to_string())
            }
            _ => CanopyError::Database(e.to_string()),
        }
    }

    fn map_row(row: PgRow) -> CanopyResult<Room> {
        let status_raw: String = row.get("sync_status");
        let sync_status = SyncStatus::from_str(&status_raw).map_err(CanopyError::Internal)?;

        Ok(Room {
            id: row.get("id"),
            site_id: row.get("site_id"),
            name: row.get("name"),
            external_location_id: row.get("external_location_id"),
            external_location_name: row.get("external_location_name"),
            sync_status,
            sync_error_detail: row.get("sync_error_detail"),
            created_by_internal: row.get("created_by_internal"),
            active: row.get("active"),
            last_synced_at: row.get("last_synced_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn list_active(&self, site_id: Uuid) -> CanopyResult<Vec<Room>> {
        let rows = sqlx::query(&format!(
            "select {ROOM_COLUMNS} from rooms
             where site_id = $1 and active = true
             order by created_at asc"
        ))
        .bind(site_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CanopyError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn insert(&self, room: Room) -> CanopyResult<Room> {
        let row = sqlx::query(&format!(
            "insert into rooms
               (id, site_id, name, external_location_id, external_location_name,
                sync_status, sync_error_detail, created_by_internal, active,
                last_synced_at, created_at, updated_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             returning {ROOM_COLUMNS}"
        ))
        .bind(room.id)
        .bind(room.site_id)
        .bind(&room.name)
        .bind(room.external_location_id)
        .bind(&room.external_location_name)
        .bind(room.sync_status.as_str())
        .bind(&room.sync_error_detail)
        .bind(room.created_by_internal)
        .bind(room.active)
        .bind(room.last_synced_at)
        .bind(room.created_at)
        .bind(room.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_sqlx)?;

        Self::map_row(row)
    }

    async fn update_sync_fields(&self, id: Uuid, update: RoomSyncUpdate) -> CanopyResult<Room> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("update rooms set updated_at = ");
        qb.push_bind(Utc::now());

        if let Some(name) = update.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(external_id) = update.external_location_id {
            qb.push(", external_location_id = ").push_bind(external_id);
        }
        if let Some(external_name) = update.external_location_name {
            qb.push(", external_location_name = ").push_bind(external_name);
        }
        if let Some(status) = update.sync_status {
            qb.push(", sync_status = ").push_bind(status.as_str());
        }
        if let Some(detail) = update.sync_error_detail {
            qb.push(", sync_error_detail = ").push_bind(detail);
        }
        if let Some(created_by_internal) = update.created_by_internal {
            qb.push(", created_by_internal = ").push_bind(created_by_internal);
        }
        if let Some(last_synced_at) = update.last_synced_at {
            qb.push(", last_synced_at = ").push_bind(last_synced_at);
        }

        qb.push(" where id = ").push_bind(id);
        qb.push(format!(" returning {ROOM_COLUMNS}"));

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_sqlx)?;

        match row {
            Some(r) => Self::map_row(r),
            None => Err(CanopyError::NotFound(format!("room {id}"))),
        }
    }
}
