use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use canopy_common::CanopyError;
use canopy_db::rooms::models::{Room, RoomSyncUpdate, SyncStatus};
use canopy_db::rooms::repositories::RoomRepository;
use canopy_db::sync::models::{RunStatus, SyncDirection, SyncRun};
use canopy_db::sync::repositories::{SyncLeaseRepository, SyncRunRepository};
use canopy_reconcile::{dedup_locations, push_candidates, DiffItem, DiffKind, ExternalLocation};

use crate::tracking::{LocationType, TrackingClient};

/// Lease source name for room sync. One lease row per (site, source).
pub const SYNC_SOURCE: &str = "metrc_locations";

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Another run holds the site lease and it has not gone stale yet.
    #[error("a room sync for this site is already running")]
    AlreadyRunning,

    #[error("location pull failed: {0}")]
    LocationPull(String),

    #[error("repository error: {0}")]
    Repository(#[from] CanopyError),
}

/// Outcome of one push attempt, kept for the result report.
#[derive(Debug, Clone, Serialize)]
pub struct PushResultItem {
    pub room_id: Uuid,
    pub room_name: String,
    pub external_location_id: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub locations_found: usize,
    pub rooms_created: usize,
    pub rooms_updated: usize,
    pub rooms_matched: usize,
    pub rooms_orphaned: usize,
    pub rooms_pushed: usize,
    pub items: Vec<DiffItem>,
    pub push_items: Vec<PushResultItem>,
    pub errors: Vec<String>,
    pub duration_ms: i64,
}

impl SyncResult {
    /// `success` if nothing failed, `partial` if some items landed and some
    /// failed, `failed` if errors were the only outcome.
    pub fn run_status(&self) -> RunStatus {
        let successes = self.rooms_created
            + self.rooms_updated
            + self.rooms_matched
            + self.rooms_orphaned
            + self.rooms_pushed;
        if self.errors.is_empty() {
            RunStatus::Success
        } else if successes > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }
}

/// Reconciles the rooms registry of one site against its Metrc locations.
///
/// `sync` runs pull then push under a per-site lease:
///   1. pull — list upstream locations and converge local rooms onto them
///      (link by id, link by name, create missing, orphan vanished);
///   2. push — create upstream locations for internal-only rooms, then link
///      each one via a name lookup, since the create endpoint returns no id.
///
/// Item-level failures are collected into the result and never stop the run;
/// only failures that make the whole picture unreliable (lease, initial pull,
/// initial room listing) abort it.
pub struct RoomSyncer<C, R, S> {
    site_id: Uuid,
    license_number: String,
    client: C,
    room_repo: R,
    sync_repo: S,
    lease_timeout_secs: u64,
}

impl<C, R, S> RoomSyncer<C, R, S>
where
    C: TrackingClient,
    R: RoomRepository,
    S: SyncRunRepository + SyncLeaseRepository,
{
    pub fn new(
        site_id: Uuid,
        license_number: String,
        client: C,
        room_repo: R,
        sync_repo: S,
        lease_timeout_secs: u64,
    ) -> Self {
        Self {
            site_id,
            license_number,
            client,
            room_repo,
            sync_repo,
            lease_timeout_secs,
        }
    }

    pub async fn sync(&self) -> Result<SyncResult, SyncError> {
        let started_at = Utc::now();
        let timer = Instant::now();

        self.sync_repo
            .get_or_create(self.site_id, SYNC_SOURCE)
            .await?;
        let lease = self
            .sync_repo
            .acquire(self.site_id, SYNC_SOURCE, self.lease_timeout_secs)
            .await?
            .ok_or(SyncError::AlreadyRunning)?;

        tracing::info!(site_id = %self.site_id, source = SYNC_SOURCE, "room sync started");

        let mut result = SyncResult::default();

        let locations = match self.client.list_locations(&self.license_number).await {
            Ok(locations) => dedup_locations(locations),
            Err(e) => {
                let message = format!("location pull failed: {e}");
                self.abort_run(lease.id, started_at, &timer, 0, &message)
                    .await;
                return Err(SyncError::LocationPull(e.to_string()));
            }
        };
        result.locations_found = locations.len();

        let rooms = match self.room_repo.list_active(self.site_id).await {
            Ok(rooms) => rooms,
            Err(e) => {
                let message = format!("room listing failed: {e}");
                self.abort_run(lease.id, started_at, &timer, locations.len(), &message)
                    .await;
                return Err(SyncError::Repository(e));
            }
        };

        self.pull_phase(&locations, &rooms, &mut result).await;
        let push_ran = self.push_phase(&mut result).await;

        if let Err(e) = self.sync_repo.release_completed(lease.id).await {
            tracing::error!(error = %e, "failed to release sync lease");
            result.errors.push(format!("failed to release sync lease: {e}"));
        }

        result.duration_ms = timer.elapsed().as_millis() as i64;
        let direction = if push_ran {
            SyncDirection::Bidirectional
        } else {
            SyncDirection::Pull
        };
        self.record_run(direction, started_at, &result).await;

        tracing::info!(
            site_id = %self.site_id,
            locations_found = result.locations_found,
            rooms_created = result.rooms_created,
            rooms_updated = result.rooms_updated,
            rooms_matched = result.rooms_matched,
            rooms_orphaned = result.rooms_orphaned,
            rooms_pushed = result.rooms_pushed,
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "room sync finished"
        );

        Ok(result)
    }

    async fn pull_phase(
        &self,
        locations: &[ExternalLocation],
        rooms: &[Room],
        result: &mut SyncResult,
    ) {
        let plan = canopy_reconcile::plan(locations, rooms);
        result.rooms_matched = plan.matched_count;

        let now = Utc::now();
        for item in &plan.items {
            match item.kind {
                DiffKind::Matched => {}
                DiffKind::Created => self.apply_created(item, now, result).await,
                DiffKind::Updated => self.apply_updated(item, now, result).await,
                DiffKind::Orphaned => self.apply_orphaned(item, result).await,
            }
        }

        tracing::info!(
            site_id = %self.site_id,
            locations = locations.len(),
            rooms = rooms.len(),
            matched = plan.matched_count,
            created = result.rooms_created,
            updated = result.rooms_updated,
            orphaned = result.rooms_orphaned,
            "pull phase applied"
        );

        result.items = plan.items;
    }

    async fn apply_created(&self, item: &DiffItem, now: DateTime<Utc>, result: &mut SyncResult) {
        let (external_id, external_name) = match (item.external_id, item.external_name.as_deref())
        {
            (Some(id), Some(name)) => (id, name),
            _ => {
                result
                    .errors
                    .push("diff item for create is missing external fields".to_string());
                return;
            }
        };

        let room = Room {
            id: Uuid::new_v4(),
            site_id: self.site_id,
            name: external_name.to_string(),
            external_location_id: Some(external_id),
            external_location_name: Some(external_name.to_string()),
            sync_status: SyncStatus::Synced,
            sync_error_detail: None,
            created_by_internal: false,
            active: true,
            last_synced_at: Some(now),
            created_at: now,
            updated_at: now,
        };

        match self.room_repo.insert(room).await {
            Ok(_) => result.rooms_created += 1,
            Err(e) => {
                tracing::warn!(external_id, external_name, error = %e, "failed to create room");
                result
                    .errors
                    .push(format!("create room for location {external_id} '{external_name}': {e}"));
            }
        }
    }

    async fn apply_updated(&self, item: &DiffItem, now: DateTime<Utc>, result: &mut SyncResult) {
        let (room_id, external_id, external_name) =
            match (item.room_id, item.external_id, item.external_name.as_deref()) {
                (Some(room_id), Some(id), Some(name)) => (room_id, id, name),
                _ => {
                    result
                        .errors
                        .push("diff item for update is missing fields".to_string());
                    return;
                }
            };

        // Upstream owns the name: converge the room onto the external record.
        let update = RoomSyncUpdate {
            name: Some(external_name.to_string()),
            external_location_id: Some(external_id),
            external_location_name: Some(external_name.to_string()),
            sync_status: Some(SyncStatus::Synced),
            sync_error_detail: Some(None),
            created_by_internal: None,
            last_synced_at: Some(now),
        };

        match self.room_repo.update_sync_fields(room_id, update).await {
            Ok(_) => result.rooms_updated += 1,
            Err(e) => {
                tracing::warn!(room_id = %room_id, external_id, error = %e, "failed to update room");
                result
                    .errors
                    .push(format!("update room {room_id} from location {external_id}: {e}"));
            }
        }
    }

    async fn apply_orphaned(&self, item: &DiffItem, result: &mut SyncResult) {
        let room_id = match item.room_id {
            Some(room_id) => room_id,
            None => {
                result
                    .errors
                    .push("diff item for orphan is missing a room id".to_string());
                return;
            }
        };

        // The external link is kept so a reappearing record re-links by id.
        let update = RoomSyncUpdate {
            sync_status: Some(SyncStatus::OutOfSync),
            sync_error_detail: Some(Some(item.reason.to_string())),
            ..Default::default()
        };

        match self.room_repo.update_sync_fields(room_id, update).await {
            Ok(_) => result.rooms_orphaned += 1,
            Err(e) => {
                tracing::warn!(room_id = %room_id, error = %e, "failed to flag orphaned room");
                result
                    .errors
                    .push(format!("flag orphaned room {room_id}: {e}"));
            }
        }
    }

    /// Returns true when the push side actually ran, i.e. there was at least
    /// one candidate after the post-pull re-read.
    async fn push_phase(&self, result: &mut SyncResult) -> bool {
        // Re-read both sides so rooms linked during the pull are not pushed
        // back up as duplicates.
        let locations = match self.client.list_locations(&self.license_number).await {
            Ok(locations) => dedup_locations(locations),
            Err(e) => {
                tracing::warn!(error = %e, "push phase aborted: location re-fetch failed");
                result
                    .errors
                    .push(format!("push phase aborted: location re-fetch failed: {e}"));
                return false;
            }
        };
        let rooms = match self.room_repo.list_active(self.site_id).await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::warn!(error = %e, "push phase aborted: room re-fetch failed");
                result
                    .errors
                    .push(format!("push phase aborted: room re-fetch failed: {e}"));
                return false;
            }
        };

        let candidates = push_candidates(&locations, &rooms);
        if candidates.is_empty() {
            tracing::debug!(site_id = %self.site_id, "no rooms to push");
            return false;
        }

        let location_type = match self.default_location_type().await {
            Ok(location_type) => location_type,
            Err(message) => {
                tracing::warn!(error = %message, "push phase aborted");
                result.errors.push(format!("push phase aborted: {message}"));
                return true;
            }
        };

        tracing::info!(
            site_id = %self.site_id,
            candidates = candidates.len(),
            location_type = %location_type.name,
            "push phase started"
        );

        let mut pushed_names: HashSet<String> = HashSet::new();
        for room in candidates {
            // One create attempt per name per run. A second room with the same
            // name stays unlinked and is reconsidered on the next run.
            if !pushed_names.insert(room.name.clone()) {
                tracing::warn!(
                    room_id = %room.id,
                    name = %room.name,
                    "skipping push: name already pushed in this run"
                );
                continue;
            }

            match self.push_room(&room, &location_type).await {
                Ok(external_id) => {
                    result.rooms_pushed += 1;
                    result.push_items.push(PushResultItem {
                        room_id: room.id,
                        room_name: room.name.clone(),
                        external_location_id: Some(external_id),
                        error: None,
                    });
                }
                Err(message) => {
                    tracing::warn!(room_id = %room.id, name = %room.name, error = %message, "failed to push room");
                    result
                        .errors
                        .push(format!("push room '{}' failed: {message}", room.name));
                    result.push_items.push(PushResultItem {
                        room_id: room.id,
                        room_name: room.name.clone(),
                        external_location_id: None,
                        error: Some(message),
                    });
                }
            }
        }

        true
    }

    /// Create the location upstream, resolve the id it was assigned by
    /// re-reading the active list, then link the room to it. A failure leaves
    /// the room untouched for the next run.
    async fn push_room(&self, room: &Room, location_type: &LocationType) -> Result<i64, String> {
        self.client
            .create_location(
                &self.license_number,
                &room.name,
                location_type.id,
                &location_type.name,
            )
            .await
            .map_err(|e| format!("create failed: {e}"))?;

        let created = self
            .client
            .find_location_by_name(&self.license_number, &room.name)
            .await
            .map_err(|e| format!("lookup after create failed: {e}"))?
            .ok_or_else(|| "created location did not appear in the active list".to_string())?;

        let update = RoomSyncUpdate {
            name: None,
            external_location_id: Some(created.id),
            external_location_name: Some(created.name.clone()),
            sync_status: Some(SyncStatus::Synced),
            sync_error_detail: Some(None),
            created_by_internal: Some(true),
            last_synced_at: Some(Utc::now()),
        };
        self.room_repo
            .update_sync_fields(room.id, update)
            .await
            .map_err(|e| format!("link write failed: {e}"))?;

        Ok(created.id)
    }

    /// Location type for pushed rooms: prefer a type whose name contains
    /// "default" or "general", otherwise the first one listed.
    async fn default_location_type(&self) -> Result<LocationType, String> {
        let types = self
            .client
            .list_location_types()
            .await
            .map_err(|e| format!("location type listing failed: {e}"))?;

        types
            .iter()
            .find(|t| {
                let name = t.name.to_lowercase();
                name.contains("default") || name.contains("general")
            })
            .or_else(|| types.first())
            .cloned()
            .ok_or_else(|| "tracking system reports no location types".to_string())
    }

    /// Record a failed run and release the lease after a fatal early error.
    async fn abort_run(
        &self,
        lease_id: Uuid,
        started_at: DateTime<Utc>,
        timer: &Instant,
        locations_found: usize,
        message: &str,
    ) {
        tracing::error!(site_id = %self.site_id, error = message, "room sync aborted");

        let run = SyncRun {
            id: Uuid::new_v4(),
            site_id: self.site_id,
            direction: SyncDirection::Pull,
            status: RunStatus::Failed,
            started_at,
            duration_ms: timer.elapsed().as_millis() as i64,
            locations_found: locations_found as i64,
            rooms_created: 0,
            rooms_updated: 0,
            rooms_matched: 0,
            rooms_orphaned: 0,
            rooms_pushed: 0,
            error_message: Some(message.to_string()),
        };
        if let Err(e) = self.sync_repo.record_run(run).await {
            tracing::error!(error = %e, "failed to record sync run");
        }

        if let Err(e) = self.sync_repo.release_failed(lease_id, message).await {
            tracing::error!(error = %e, "failed to release sync lease");
        }
    }

    async fn record_run(&self, direction: SyncDirection, started_at: DateTime<Utc>, result: &SyncResult) {
        let run = SyncRun {
            id: Uuid::new_v4(),
            site_id: self.site_id,
            direction,
            status: result.run_status(),
            started_at,
            duration_ms: result.duration_ms,
            locations_found: result.locations_found as i64,
            rooms_created: result.rooms_created as i64,
            rooms_updated: result.rooms_updated as i64,
            rooms_matched: result.rooms_matched as i64,
            rooms_orphaned: result.rooms_orphaned as i64,
            rooms_pushed: result.rooms_pushed as i64,
            error_message: if result.errors.is_empty() {
                None
            } else {
                Some(result.errors.join("; "))
            },
        };

        // Audit write failures are logged, never propagated.
        if let Err(e) = self.sync_repo.record_run(run).await {
            tracing::error!(error = %e, "failed to record sync run");
        }
    }
}
