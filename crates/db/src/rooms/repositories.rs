use async_trait::async_trait;
use uuid::Uuid;

use crate::rooms::models::{Room, RoomSyncUpdate};
use canopy_common::error::CanopyResult;

#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// All active rooms for one site, oldest first.
    async fn list_active(&self, site_id: Uuid) -> CanopyResult<Vec<Room>>;

    async fn insert(&self, room: Room) -> CanopyResult<Room>;

    /// Apply a partial update of the sync-owned columns. `NotFound` if the
    /// room does not exist.
    async fn update_sync_fields(&self, id: Uuid, update: RoomSyncUpdate) -> CanopyResult<Room>;
}
