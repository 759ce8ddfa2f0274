/// OpenAPI documentation generation.
pub mod documentation;
/// Periodic expiry of stale games.
pub mod expiry;
/// Command execution against the authoritative game records.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Per-game Server-Sent Events streams.
pub mod sse_service;
/// Storage backend connection supervisor.
pub mod storage_supervisor;
