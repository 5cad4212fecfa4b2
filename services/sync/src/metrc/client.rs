use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use canopy_reconcile::ExternalLocation;

use crate::tracking::{LocationType, TrackingClient, TrackingResult};

use super::models::{CreateLocationRequest, MetrcLocation, MetrcLocationType};

#[derive(Debug, Clone)]
pub struct MetrcClientConfig {
    pub base_url: String,
    pub vendor_api_key: String,
    pub user_api_key: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl MetrcClientConfig {
    /// Load Metrc config from environment.
    ///
    /// Returns `Ok(None)` if Metrc is not configured (neither API key set).
    /// Returns `Err` if exactly one of the two keys is set — Metrc auth always
    /// needs the vendor/user key pair, so a half-configured environment is a
    /// fail-fast condition, not a skip.
    pub fn from_env() -> Result<Option<Self>, String> {
        let vendor = std::env::var("METRC_VENDOR_API_KEY").ok();
        let user = std::env::var("METRC_USER_API_KEY").ok();

        let (vendor_api_key, user_api_key) = match (vendor, user) {
            (Some(vendor), Some(user)) => (vendor, user),
            (None, None) => return Ok(None),
            (Some(_), None) => {
                return Err(
                    "METRC_VENDOR_API_KEY is set but METRC_USER_API_KEY is missing".to_string(),
                )
            }
            (None, Some(_)) => {
                return Err(
                    "METRC_USER_API_KEY is set but METRC_VENDOR_API_KEY is missing".to_string(),
                )
            }
        };

        // Metrc hosts one API per state; the sandbox mirrors that layout.
        let base_url = match std::env::var("METRC_BASE_URL").ok() {
            Some(url) => url,
            None => {
                let state = std::env::var("METRC_STATE_CODE")
                    .map(|v| v.to_lowercase())
                    .unwrap_or_else(|_| "ca".to_string());
                let sandbox = std::env::var("METRC_SANDBOX")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false);
                if sandbox {
                    format!("https://sandbox-api-{state}.metrc.com")
                } else {
                    format!("https://api-{state}.metrc.com")
                }
            }
        };

        let max_retries = std::env::var("METRC_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let timeout_secs = std::env::var("METRC_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Some(Self {
            base_url,
            vendor_api_key,
            user_api_key,
            max_retries,
            timeout_secs,
        }))
    }
}

#[derive(Clone)]
pub struct MetrcClient {
    client: Client,
    config: MetrcClientConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum MetrcClientError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl MetrcClient {
    pub fn new(config: MetrcClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// For testing: create a client pointing at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub async fn active_locations(
        &self,
        license_number: &str,
    ) -> Result<Vec<MetrcLocation>, MetrcClientError> {
        let url = format!(
            "{}/locations/v1/active?licenseNumber={}",
            self.config.base_url, license_number
        );
        self.get_with_retry(&url).await
    }

    pub async fn location_types(&self) -> Result<Vec<MetrcLocationType>, MetrcClientError> {
        let url = format!("{}/locations/v1/types", self.config.base_url);
        self.get_with_retry(&url).await
    }

    /// Submit a create batch. Metrc acknowledges with an empty 200 and never
    /// returns the new ids. Creates are not retried: a timed-out request may
    /// still have landed upstream, and replaying it would mint duplicates.
    pub async fn create_locations(
        &self,
        license_number: &str,
        batch: &[CreateLocationRequest],
    ) -> Result<(), MetrcClientError> {
        let url = format!(
            "{}/locations/v1/create?licenseNumber={}",
            self.config.base_url, license_number
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.vendor_api_key, Some(&self.config.user_api_key))
            .json(batch)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MetrcClientError::HttpError { status, body })
    }

    async fn get_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, MetrcClientError> {
        let mut last_error = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff_secs = std::cmp::min(1u64 << attempt, 30);
                tracing::warn!(attempt, backoff_secs, "retrying after backoff");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            }

            let response = match self
                .client
                .get(url)
                .basic_auth(&self.config.vendor_api_key, Some(&self.config.user_api_key))
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Err(MetrcClientError::RequestError(e));
                }
            };

            let status = response.status();

            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(MetrcClientError::RequestError);
            }

            // Honor Retry-After header for 429
            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(retry_after) = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    let wait = std::cmp::min(retry_after, 60);
                    tracing::warn!(wait, "rate-limited, waiting Retry-After");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                last_error = "429 Too Many Requests".to_string();
                continue;
            }

            // Retry on 5xx
            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                continue;
            }

            // Fail fast on 4xx (except 429 handled above)
            let body = response.text().await.unwrap_or_default();
            return Err(MetrcClientError::HttpError { status, body });
        }

        Err(MetrcClientError::MaxRetriesExceeded {
            attempts: self.config.max_retries + 1,
            last_error,
        })
    }
}

#[async_trait]
impl TrackingClient for MetrcClient {
    async fn list_locations(&self, license_number: &str) -> TrackingResult<Vec<ExternalLocation>> {
        let locations = self.active_locations(license_number).await?;
        Ok(locations.into_iter().map(ExternalLocation::from).collect())
    }

    async fn list_location_types(&self) -> TrackingResult<Vec<LocationType>> {
        let types = self.location_types().await?;
        Ok(types.into_iter().map(LocationType::from).collect())
    }

    async fn create_location(
        &self,
        license_number: &str,
        name: &str,
        location_type_id: i64,
        location_type_name: &str,
    ) -> TrackingResult<()> {
        let batch = [CreateLocationRequest {
            name: name.to_string(),
            location_type_id,
            location_type_name: location_type_name.to_string(),
        }];
        self.create_locations(license_number, &batch).await?;
        Ok(())
    }

    async fn find_location_by_name(
        &self,
        license_number: &str,
        name: &str,
    ) -> TrackingResult<Option<ExternalLocation>> {
        // Metrc has no lookup endpoint; filter the active list client-side.
        let locations = self.active_locations(license_number).await?;
        Ok(locations
            .into_iter()
            .find(|l| l.name == name)
            .map(ExternalLocation::from))
    }
}
