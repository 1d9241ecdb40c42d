//! Rental record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a rental.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Active,
    Completed,
    Cancelled,
}

/// Billing plan chosen when the rental starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DurationPlan {
    Hourly,
    Daily,
    PayAsYouGo,
}

impl DurationPlan {
    /// Whether the full price is charged up front.
    pub fn is_prepaid(&self) -> bool {
        !matches!(self, DurationPlan::PayAsYouGo)
    }
}

/// A single rental in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rental {
    pub id: String,
    pub user_id: String,
    pub bike_id: String,
    /// Station key (`name_location`)
    pub station: String,
    /// Slot actually allocated, which may differ from the one requested
    pub slot_number: u32,
    pub requested_slot_number: u32,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: RentalStatus,
    pub duration: DurationPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<u32>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_slot_number: Option<u32>,
}

impl Rental {
    pub fn is_active(&self) -> bool {
        self.status == RentalStatus::Active
    }
}

/// Request body for starting a rental.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRentalRequest {
    pub user_id: String,
    pub station: String,
    pub slot_number: u32,
    pub duration: DurationPlan,
    #[serde(default)]
    pub hours: Option<u32>,
}

/// Request body for returning a bike.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRentalRequest {
    pub user_id: String,
    pub slot_number: u32,
}

/// Query parameters for listing rentals.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub status: Option<RentalStatus>,
}

/// Outcome of a completed return.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnReceipt {
    pub rental: Rental,
    /// Amount charged at return time (zero for prepaid plans)
    pub charge: f64,
    pub elapsed_hours: f64,
    /// User's balance after the return
    pub credits: f64,
}
