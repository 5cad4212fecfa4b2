use async_trait::async_trait;

use canopy_reconcile::ExternalLocation;

/// A location type as reported by the tracking system.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationType {
    pub id: i64,
    pub name: String,
}

pub type TrackingResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// The slice of the regulatory tracking API that room sync needs.
///
/// The upstream API is poll-only: there are no webhooks, and the create
/// endpoint acknowledges without returning the new record, so a freshly
/// created location has to be re-discovered by name.
#[async_trait]
pub trait TrackingClient: Send + Sync {
    /// All active locations under the given license.
    async fn list_locations(&self, license_number: &str) -> TrackingResult<Vec<ExternalLocation>>;

    /// Location types are license-independent upstream.
    async fn list_location_types(&self) -> TrackingResult<Vec<LocationType>>;

    /// Create a location upstream. Callers must follow up with
    /// `find_location_by_name` to learn the assigned id.
    async fn create_location(
        &self,
        license_number: &str,
        name: &str,
        location_type_id: i64,
        location_type_name: &str,
    ) -> TrackingResult<()>;

    /// Exact-name lookup among active locations.
    async fn find_location_by_name(
        &self,
        license_number: &str,
        name: &str,
    ) -> TrackingResult<Option<ExternalLocation>>;
}
