//! Request and response types for the F1 statistics API.

use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Row count of one table
#[derive(Debug, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

/// Store statistics response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub tables: Vec<TableCount>,
    pub foreign_key_violations: usize,
}

/// Response for a background import
#[derive(Debug, Serialize)]
pub struct ImportAcceptedResponse {
    pub status: String,
    pub message: String,
}

/// Query parameters for the season race list
#[derive(Debug, Deserialize)]
pub struct RacesQuery {
    pub year: i64,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
