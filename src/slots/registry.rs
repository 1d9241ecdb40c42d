//! Per-station slot registry: default layout, gap filling, manual edits and hard reset.

use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::{Slot, SlotStatus, SlotTag, NOTE_RESERVED_FOR_RETURNS};

/// Number of docks every station has.
pub const SLOTS_PER_STATION: u32 = 10;

/// Slots numbered from here up are held back for returns.
pub const FIRST_RETURN_SLOT: u32 = 9;

pub fn is_return_slot(slot_number: u32) -> bool {
    slot_number >= FIRST_RETURN_SLOT
}

/// Fresh slot in its default state.
pub fn default_slot(slot_number: u32, now: DateTime<Utc>) -> Slot {
    let (status, notes, tag) = if is_return_slot(slot_number) {
        (
            SlotStatus::Reserved,
            NOTE_RESERVED_FOR_RETURNS,
            SlotTag::ReservedForReturn,
        )
    } else {
        (SlotStatus::Active, "", SlotTag::None)
    };

    Slot {
        id: Slot::slot_id(slot_number),
        slot_number,
        status,
        notes: notes.to_string(),
        tag,
        last_updated: now,
    }
}

pub fn default_slots(now: DateTime<Utc>) -> Vec<Slot> {
    (1..=SLOTS_PER_STATION)
        .map(|n| default_slot(n, now))
        .collect()
}

/// Bring a stored slot array back to exactly one slot per number, in order.
///
/// Missing numbers get default slots; duplicates and out-of-range numbers are
/// dropped. Slots that are already present keep their state. The flag reports
/// whether the array differs from what was stored.
pub fn ensure_initialized(existing: Vec<Slot>, now: DateTime<Utc>) -> (Vec<Slot>, bool) {
    let stored_numbers: Vec<u32> = existing.iter().map(|s| s.slot_number).collect();
    let mut by_number: Vec<Option<Slot>> = vec![None; SLOTS_PER_STATION as usize];

    for slot in existing {
        if slot.slot_number == 0 || slot.slot_number > SLOTS_PER_STATION {
            tracing::warn!(
                slot_number = slot.slot_number,
                "Dropping slot outside 1..={}",
                SLOTS_PER_STATION
            );
            continue;
        }
        let entry = &mut by_number[(slot.slot_number - 1) as usize];
        if entry.is_some() {
            tracing::warn!(slot_number = slot.slot_number, "Dropping duplicate slot");
            continue;
        }
        *entry = Some(slot);
    }

    let slots: Vec<Slot> = by_number
        .into_iter()
        .zip(1..=SLOTS_PER_STATION)
        .map(|(slot, n)| slot.unwrap_or_else(|| default_slot(n, now)))
        .collect();

    let changed = stored_numbers != (1..=SLOTS_PER_STATION).collect::<Vec<_>>();
    (slots, changed)
}

/// Sub-state implied by a status set by hand.
pub fn tag_for_status(slot_number: u32, status: SlotStatus, notes: &str) -> SlotTag {
    match status {
        SlotStatus::InMaintenance => SlotTag::Maintenance {
            reason: notes.to_string(),
        },
        SlotStatus::Reserved if is_return_slot(slot_number) => SlotTag::ReservedForReturn,
        SlotStatus::Occupied => SlotTag::Rented,
        SlotStatus::Reserved | SlotStatus::Active => SlotTag::None,
    }
}

/// Set one slot's status and notes.
pub fn set_slot_status(
    slots: &mut [Slot],
    slot_id: &str,
    status: SlotStatus,
    notes: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let slot = slots
        .iter_mut()
        .find(|s| s.id == slot_id)
        .ok_or_else(|| AppError::NotFound(format!("Slot {} not found", slot_id)))?;

    let tag = tag_for_status(slot.slot_number, status, notes);
    slot.mark(status, notes, tag, now);
    Ok(())
}

/// Regenerate the default layout, discarding all slot state.
pub fn reset_to_fixed_count(count: u32, now: DateTime<Utc>) -> Result<Vec<Slot>, AppError> {
    if count != SLOTS_PER_STATION {
        return Err(AppError::Validation(format!(
            "Stations have exactly {} slots",
            SLOTS_PER_STATION
        )));
    }
    Ok(default_slots(now))
}
