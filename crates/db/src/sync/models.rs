use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Pull,
    Push,
    Bidirectional,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Push => "push",
            Self::Bidirectional => "bidirectional",
        }
    }
}

impl FromStr for SyncDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pull" => Ok(Self::Pull),
            "push" => Ok(Self::Push),
            "bidirectional" => Ok(Self::Bidirectional),
            _ => Err(format!("unknown sync direction: {value}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown run status: {value}")),
        }
    }
}

/// Append-only audit record for one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub site_id: Uuid,
    pub direction: SyncDirection,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub locations_found: i64,
    pub rooms_created: i64,
    pub rooms_updated: i64,
    pub rooms_matched: i64,
    pub rooms_orphaned: i64,
    pub rooms_pushed: i64,
    /// Concatenation of all non-fatal item errors, if any.
    pub error_message: Option<String>,
}

/// Persisted per-site "sync in progress" flag. One row per (site, source);
/// a held lease older than the stale timeout may be taken over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLease {
    pub id: Uuid,
    pub site_id: Uuid,
    pub source: String,
    pub status: String,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_round_trips_through_str() {
        for direction in [
            SyncDirection::Pull,
            SyncDirection::Push,
            SyncDirection::Bidirectional,
        ] {
            assert_eq!(SyncDirection::from_str(direction.as_str()), Ok(direction));
        }
    }

    #[test]
    fn run_status_round_trips_through_str() {
        for status in [RunStatus::Success, RunStatus::Partial, RunStatus::Failed] {
            assert_eq!(RunStatus::from_str(status.as_str()), Ok(status));
        }
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!(SyncDirection::from_str("sideways").is_err());
        assert!(RunStatus::from_str("ok").is_err());
    }
}
