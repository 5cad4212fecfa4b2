mod engine;
mod metrc;
mod tracking;

use canopy_config::{init_tracing, AppConfig};
use canopy_db::rooms::pg_repository::PgRoomRepository;
use canopy_db::sync::pg_repository::PgSyncRepository;
use canopy_db::sync::repositories::SyncRunRepository;

use crate::engine::RoomSyncer;
use crate::metrc::client::{MetrcClient, MetrcClientConfig};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = AppConfig::from_env().expect("configuration error (fail-fast)");
    init_tracing(&config.log_level);

    tracing::info!(service = "canopy-sync", "starting");

    let pool = canopy_db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .expect("failed to connect to database");

    // Default site_id — in production this comes from the sites table or a
    // multi-tenant loop
    let site_id: uuid::Uuid = std::env::var("SITE_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(uuid::Uuid::new_v4);

    // Metrc connector (optional — only runs if METRC env vars are set)
    // Fails fast on a half-configured key pair or a missing license number
    match MetrcClientConfig::from_env() {
        Ok(Some(metrc_config)) => {
            let license_number = std::env::var("METRC_LICENSE_NUMBER")
                .expect("METRC_LICENSE_NUMBER must be set when Metrc keys are configured");

            tracing::info!(
                base_url = %metrc_config.base_url,
                license = %license_number,
                "metrc client configured, starting room sync"
            );

            let client = MetrcClient::new(metrc_config).expect("failed to create metrc client");
            let room_repo = PgRoomRepository::new(pool.clone());
            let sync_repo = PgSyncRepository::new(pool.clone());

            log_previous_run(&sync_repo, site_id).await;

            let syncer = RoomSyncer::new(
                site_id,
                license_number,
                client,
                room_repo,
                sync_repo,
                config.lease_timeout_secs,
            );

            match syncer.sync().await {
                Ok(result) => {
                    tracing::info!(
                        status = result.run_status().as_str(),
                        locations_found = result.locations_found,
                        rooms_created = result.rooms_created,
                        rooms_updated = result.rooms_updated,
                        rooms_matched = result.rooms_matched,
                        rooms_orphaned = result.rooms_orphaned,
                        rooms_pushed = result.rooms_pushed,
                        duration_ms = result.duration_ms,
                        "room sync completed"
                    );
                    for error in &result.errors {
                        tracing::warn!(error = %error, "room sync item error");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "room sync failed");
                }
            }
        }
        Ok(None) => {
            tracing::info!("no metrc credentials found, skipping room sync");
        }
        Err(e) => {
            panic!("metrc configuration error (fail-fast): {e}");
        }
    }

    tracing::info!("sync service finished");
}

async fn log_previous_run(sync_repo: &PgSyncRepository, site_id: uuid::Uuid) {
    match sync_repo.list_recent(site_id, 1).await {
        Ok(runs) => match runs.first() {
            Some(run) => {
                tracing::info!(
                    status = run.status.as_str(),
                    direction = run.direction.as_str(),
                    started_at = %run.started_at,
                    "previous sync run"
                );
            }
            None => tracing::debug!("no previous sync runs for this site"),
        },
        Err(e) => tracing::warn!(error = %e, "could not load previous sync runs"),
    }
}
