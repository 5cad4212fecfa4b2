use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use canopy_db::rooms::models::{Room, SyncStatus};

/// Read-only snapshot of one location in the regulatory tracking system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalLocation {
    pub id: i64,
    pub name: String,
    pub location_type_id: i64,
    pub location_type_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// External and internal agree; nothing to write.
    Matched,
    /// No internal counterpart; a room must be instantiated from the
    /// external record.
    Created,
    /// An internal room must be written: first-time link, upstream rename,
    /// or a reappeared external record.
    Updated,
    /// A previously linked external record vanished from the pull.
    Orphaned,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Orphaned => "orphaned",
        }
    }
}

/// One classification decision from the pull-phase diff.
#[derive(Debug, Clone, Serialize)]
pub struct DiffItem {
    pub kind: DiffKind,
    pub external_id: Option<i64>,
    pub external_name: Option<String>,
    pub room_id: Option<Uuid>,
    pub room_name: Option<String>,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncPlan {
    pub items: Vec<DiffItem>,
    pub matched_count: usize,
    pub orphaned_count: usize,
}

/// Drop upstream duplicates sharing an external id, keeping the first
/// occurrence. Sandbox licenses reused across configurations are known to
/// replay the same records; this is upstream-data noise, not an error.
pub fn dedup_locations(locations: Vec<ExternalLocation>) -> Vec<ExternalLocation> {
    let mut seen = HashSet::new();
    locations.into_iter().filter(|l| seen.insert(l.id)).collect()
}

/// Classify every external location against the site's rooms, then flag
/// orphans. Pure: no clock, no I/O. Callers dedup the external set first.
///
/// Per external location the highest-priority rule wins and each room is
/// claimable at most once: id match, then exact-name match among unclaimed
/// unlinked rooms (earliest-created wins a tie), else `created`. Rooms in
/// `sync_error` are claimed by their id so no duplicate gets created, but are
/// never scheduled for a write — clearing that state is a manual action.
pub fn plan(locations: &[ExternalLocation], rooms: &[Room]) -> SyncPlan {
    let mut items = Vec::with_capacity(locations.len());
    let mut claimed: HashSet<Uuid> = HashSet::new();
    let mut matched_count = 0;
    let mut orphaned_count = 0;

    let by_external_id: HashMap<i64, &Room> = rooms
        .iter()
        .filter_map(|r| r.external_location_id.map(|id| (id, r)))
        .collect();

    for location in locations {
        if let Some(room) = by_external_id.get(&location.id) {
            claimed.insert(room.id);

            if room.sync_status == SyncStatus::SyncError {
                matched_count += 1;
                items.push(DiffItem {
                    kind: DiffKind::Matched,
                    external_id: Some(location.id),
                    external_name: Some(location.name.clone()),
                    room_id: Some(room.id),
                    room_name: Some(room.name.clone()),
                    reason: "left for manual retry",
                });
            } else if needs_refresh(room, location) {
                items.push(DiffItem {
                    kind: DiffKind::Updated,
                    external_id: Some(location.id),
                    external_name: Some(location.name.clone()),
                    room_id: Some(room.id),
                    room_name: Some(room.name.clone()),
                    reason: refresh_reason(room, location),
                });
            } else {
                matched_count += 1;
                items.push(DiffItem {
                    kind: DiffKind::Matched,
                    external_id: Some(location.id),
                    external_name: Some(location.name.clone()),
                    room_id: Some(room.id),
                    room_name: Some(room.name.clone()),
                    reason: "external id match",
                });
            }
            continue;
        }

        let name_match = rooms
            .iter()
            .filter(|r| !claimed.contains(&r.id))
            .filter(|r| !r.is_linked())
            .filter(|r| linkable(r.sync_status))
            .filter(|r| r.name == location.name)
            .min_by_key(|r| r.created_at);

        match name_match {
            Some(room) => {
                claimed.insert(room.id);
                items.push(DiffItem {
                    kind: DiffKind::Updated,
                    external_id: Some(location.id),
                    external_name: Some(location.name.clone()),
                    room_id: Some(room.id),
                    room_name: Some(room.name.clone()),
                    reason: "linked by name",
                });
            }
            None => {
                items.push(DiffItem {
                    kind: DiffKind::Created,
                    external_id: Some(location.id),
                    external_name: Some(location.name.clone()),
                    room_id: None,
                    room_name: None,
                    reason: "no internal counterpart",
                });
            }
        }
    }

    for room in rooms {
        if room.is_linked()
            && !claimed.contains(&room.id)
            && room.sync_status.can_transition_to(SyncStatus::OutOfSync)
        {
            orphaned_count += 1;
            items.push(DiffItem {
                kind: DiffKind::Orphaned,
                external_id: room.external_location_id,
                external_name: room.external_location_name.clone(),
                room_id: Some(room.id),
                room_name: Some(room.name.clone()),
                reason: "external record no longer exists",
            });
        }
    }

    SyncPlan {
        items,
        matched_count,
        orphaned_count,
    }
}

/// Rooms to create upstream: active, unlinked, pushable, and not shadowing a
/// name the external system already has (the pull should have matched those).
/// Evaluated against post-pull re-fetched state; ordered oldest first so a
/// name tie resolves the same way the pull-phase tie-break does.
pub fn push_candidates(locations: &[ExternalLocation], rooms: &[Room]) -> Vec<Room> {
    let external_names: HashSet<&str> = locations.iter().map(|l| l.name.as_str()).collect();

    let mut candidates: Vec<Room> = rooms
        .iter()
        .filter(|r| r.active)
        .filter(|r| !r.is_linked())
        .filter(|r| linkable(r.sync_status))
        .filter(|r| !external_names.contains(r.name.as_str()))
        .cloned()
        .collect();

    candidates.sort_by_key(|r| r.created_at);
    candidates
}

fn linkable(status: SyncStatus) -> bool {
    status != SyncStatus::SyncError && status.can_transition_to(SyncStatus::Synced)
}

fn needs_refresh(room: &Room, location: &ExternalLocation) -> bool {
    room.sync_status != SyncStatus::Synced
        || room.name != location.name
        || room.external_location_name.as_deref() != Some(location.name.as_str())
}

fn refresh_reason(room: &Room, location: &ExternalLocation) -> &'static str {
    if room.sync_status == SyncStatus::OutOfSync {
        "external record reappeared"
    } else if room.external_location_name.as_deref() != Some(location.name.as_str()) {
        "name changed upstream"
    } else if room.name != location.name {
        "internal name diverged"
    } else {
        "sync state refreshed"
    }
}
