use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-room regulatory sync lifecycle.
///
/// A room starts `not_synced`. The sync engine moves it to `synced` when a
/// pull or push establishes (or re-confirms) its external link, and to
/// `out_of_sync` when a previously linked external record vanishes from a
/// pull. `pending_sync` is set by an operator queueing a room for push;
/// `sync_error` is set by the calling layer for credential/config-level
/// failures and is only ever cleared by a manual retry, never by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NotSynced,
    PendingSync,
    Synced,
    OutOfSync,
    SyncError,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSynced => "not_synced",
            Self::PendingSync => "pending_sync",
            Self::Synced => "synced",
            Self::OutOfSync => "out_of_sync",
            Self::SyncError => "sync_error",
        }
    }

    /// Whether the lifecycle admits moving from `self` to `next`.
    ///
    /// Edges out of `sync_error` are manual-retry paths: they are legal for
    /// the calling layer but the engine itself never takes them, so engine
    /// code pairs this check with an explicit `sync_error` exclusion.
    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        use SyncStatus::*;
        matches!(
            (self, next),
            (NotSynced, PendingSync)
                | (NotSynced, Synced)
                | (NotSynced, SyncError)
                | (PendingSync, Synced)
                | (PendingSync, SyncError)
                | (Synced, Synced)
                | (Synced, OutOfSync)
                | (OutOfSync, Synced)
                | (SyncError, Synced)
                | (SyncError, SyncError)
        )
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::NotSynced
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "not_synced" => Ok(Self::NotSynced),
            "pending_sync" => Ok(Self::PendingSync),
            "synced" => Ok(Self::Synced),
            "out_of_sync" => Ok(Self::OutOfSync),
            "sync_error" => Ok(Self::SyncError),
            _ => Err(format!("unknown sync status: {value}")),
        }
    }
}

/// Internal registry record for one physical operating location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub site_id: Uuid,
    pub name: String,
    /// Regulatory tracking system id. Unique per site when present; preserved
    /// across orphaning so a reappearing external record re-links by id.
    pub external_location_id: Option<i64>,
    /// External name as of the last successful sync.
    pub external_location_name: Option<String>,
    pub sync_status: SyncStatus,
    pub sync_error_detail: Option<String>,
    /// True when the room originated inside the platform and was pushed out,
    /// false when it was created from a pull.
    pub created_by_internal: bool,
    pub active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn is_linked(&self) -> bool {
        self.external_location_id.is_some()
    }
}

/// Partial update of a room's sync-owned fields. `None` leaves a column
/// untouched; for `sync_error_detail` the inner option is the stored value,
/// so `Some(None)` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomSyncUpdate {
    pub name: Option<String>,
    pub external_location_id: Option<i64>,
    pub external_location_name: Option<String>,
    pub sync_status: Option<SyncStatus>,
    pub sync_error_detail: Option<Option<String>>,
    pub created_by_internal: Option<bool>,
    pub last_synced_at: Option<DateTime<Utc>>,
}
