use async_trait::async_trait;
use uuid::Uuid;

use crate::sync::models::{SyncLease, SyncRun};
use canopy_common::error::CanopyResult;

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Append one run record. Records are never mutated afterwards; a failed
    /// append is the caller's to log, not to fail the run over.
    async fn record_run(&self, run: SyncRun) -> CanopyResult<SyncRun>;

    /// Most recent runs for a site, newest first.
    async fn list_recent(&self, site_id: Uuid, limit: i64) -> CanopyResult<Vec<SyncRun>>;
}

#[async_trait]
pub trait SyncLeaseRepository: Send + Sync {
    /// Get or create the lease row for a (site, source) pair.
    async fn get_or_create(&self, site_id: Uuid, source: &str) -> CanopyResult<SyncLease>;

    /// Atomically claim the lease. Returns `None` when a live run already
    /// holds it; a lease held longer than `stale_after_secs` is treated as
    /// abandoned and taken over.
    async fn acquire(
        &self,
        site_id: Uuid,
        source: &str,
        stale_after_secs: u64,
    ) -> CanopyResult<Option<SyncLease>>;

    /// Release after a completed run, updating `last_synced_at`.
    async fn release_completed(&self, id: Uuid) -> CanopyResult<SyncLease>;

    /// Release after a fatal failure, recording the error.
    async fn release_failed(&self, id: Uuid, error_message: &str) -> CanopyResult<SyncLease>;
}
