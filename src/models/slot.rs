//! Dock slot model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Note shown on slots held back for incoming returns.
pub const NOTE_RESERVED_FOR_RETURNS: &str = "Reserved for bike returns";
pub const NOTE_BIKE_RENTED: &str = "Bike rented";
pub const NOTE_BIKE_RETURNED: &str = "Bike returned";

/// Operational status of a slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SlotStatus {
    Active,
    InMaintenance,
    Reserved,
    Occupied,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Active => "active",
            SlotStatus::InMaintenance => "in-maintenance",
            SlotStatus::Reserved => "reserved",
            SlotStatus::Occupied => "occupied",
        }
    }
}

/// Sub-state carried next to the status.
///
/// Allocation decisions read this tag, never the free-text `notes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SlotTag {
    #[default]
    None,
    ReservedForReturn,
    JustReturned,
    Rented,
    Maintenance {
        reason: String,
    },
}

/// A numbered dock at a station.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    pub slot_number: u32,
    pub status: SlotStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tag: SlotTag,
    pub last_updated: DateTime<Utc>,
}

impl Slot {
    pub fn slot_id(slot_number: u32) -> String {
        format!("slot-{}", slot_number)
    }

    /// Overwrite status, notes and tag in one step, stamping `last_updated`.
    pub fn mark(&mut self, status: SlotStatus, notes: &str, tag: SlotTag, now: DateTime<Utc>) {
        self.status = status;
        self.notes = notes.to_string();
        self.tag = tag;
        self.last_updated = now;
    }

    pub fn holds_returned_bike(&self) -> bool {
        self.tag == SlotTag::JustReturned
    }
}

/// Request body for changing a slot's status by hand.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSlotRequest {
    pub status: SlotStatus,
    #[serde(default)]
    pub notes: String,
}

/// Query parameters for the hard reset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSlotsRequest {
    #[serde(default)]
    pub count: Option<u32>,
}
