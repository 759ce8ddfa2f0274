use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Persistence backend in use.
    pub storage: String,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(storage: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            storage: storage.into(),
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(storage: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            storage: storage.into(),
        }
    }
}
