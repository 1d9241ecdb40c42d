//! Full-state snapshot and dashboard models.

use serde::Serialize;

use super::{Rental, Station, User};

/// Everything the client needs to render, in one payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastore {
    pub schema_version: i32,
    pub generated_at: String,
    pub revision_id: i64,
    pub users: Vec<User>,
    pub stations: Vec<Station>,
    pub rentals: Vec<Rental>,
}

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}

/// Aggregate figures for the admin dashboard.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: usize,
    pub total_stations: usize,
    pub total_bicycles: usize,
    pub active_rentals: usize,
    pub completed_rentals: usize,
    /// Sum of prices over completed rentals
    pub total_revenue: f64,
}
