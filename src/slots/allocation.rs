//! Slot allocation for rents and returns.
//!
//! Slots 1-8 are the rentable pool and slots 9-10 are held back so a returning
//! rider always finds a free dock. Requests for a return slot are silently moved
//! to the first rentable slot, and when both return slots fill up the older
//! returned bike is moved into the rentable pool.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::registry::{is_return_slot, FIRST_RETURN_SLOT, SLOTS_PER_STATION};
use crate::errors::AppError;
use crate::models::{
    Slot, SlotStatus, SlotTag, NOTE_BIKE_RENTED, NOTE_BIKE_RETURNED, NOTE_RESERVED_FOR_RETURNS,
};

/// Result of a rent allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub requested: u32,
    pub allocated: u32,
}

impl Allocation {
    pub fn was_substituted(&self) -> bool {
        self.requested != self.allocated
    }
}

/// Where a returned bike ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnPlacement {
    pub slot_number: u32,
    /// Slot the bike was rented from, freed because the bike came back elsewhere
    pub released: Option<u32>,
    /// Rentable slot that received the bike moved out of slot 9
    pub moved_to: Option<u32>,
}

/// Force the return pool back to `reserved`.
///
/// Slots holding a returned bike are skipped; reconciliation owns those.
/// Returns whether any slot was touched.
pub fn normalize_return_slots(slots: &mut [Slot], now: DateTime<Utc>) -> bool {
    let mut changed = false;
    for slot in slots
        .iter_mut()
        .filter(|s| is_return_slot(s.slot_number) && !s.holds_returned_bike())
    {
        if slot.status != SlotStatus::Reserved
            || slot.tag != SlotTag::ReservedForReturn
            || slot.notes != NOTE_RESERVED_FOR_RETURNS
        {
            slot.mark(
                SlotStatus::Reserved,
                NOTE_RESERVED_FOR_RETURNS,
                SlotTag::ReservedForReturn,
                now,
            );
            changed = true;
        }
    }
    changed
}

fn is_rentable(slot: &Slot) -> bool {
    !is_return_slot(slot.slot_number)
        && slot.status == SlotStatus::Active
        && slot.tag != SlotTag::ReservedForReturn
}

/// Pick and occupy the slot a new rental takes.
pub fn allocate_for_rent(
    slots: &mut [Slot],
    requested: u32,
    now: DateTime<Utc>,
) -> Result<Allocation, AppError> {
    if requested == 0 || requested > SLOTS_PER_STATION {
        return Err(AppError::Validation(format!(
            "Slot {} does not exist; choose 1-{}",
            requested, SLOTS_PER_STATION
        )));
    }

    normalize_return_slots(slots, now);

    let index = if is_return_slot(requested) {
        slots.iter().position(is_rentable).ok_or_else(|| {
            AppError::NoAvailableSlots(
                "No available slots: slots 9 and 10 are reserved for returns".to_string(),
            )
        })?
    } else {
        let index = slots
            .iter()
            .position(|s| s.slot_number == requested)
            .ok_or_else(|| AppError::Validation(format!("Slot {} does not exist", requested)))?;
        if !is_rentable(&slots[index]) {
            return Err(AppError::Validation(format!(
                "Slot {} is not available ({})",
                requested,
                slots[index].status.as_str()
            )));
        }
        index
    };

    let slot = &mut slots[index];
    slot.mark(SlotStatus::Occupied, NOTE_BIKE_RENTED, SlotTag::Rented, now);

    Ok(Allocation {
        requested,
        allocated: slot.slot_number,
    })
}

/// Dock a returned bike into `chosen`.
///
/// `rented_from` is the slot the rental occupied; it is freed when the bike
/// comes back somewhere else, unless another active rental in `held` has
/// since taken it.
pub fn accept_return(
    slots: &mut [Slot],
    chosen: u32,
    rented_from: u32,
    held: &[u32],
    now: DateTime<Utc>,
) -> Result<ReturnPlacement, AppError> {
    let index = slots
        .iter()
        .position(|s| s.slot_number == chosen)
        .ok_or_else(|| AppError::Validation(format!("Slot {} does not exist", chosen)))?;

    let slot = &slots[index];
    if slot.status == SlotStatus::InMaintenance {
        return Err(AppError::Validation(format!(
            "Slot {} is under maintenance",
            chosen
        )));
    }
    if is_return_slot(chosen) && slot.holds_returned_bike() {
        return Err(AppError::Validation(format!(
            "Slot {} already holds a returned bike",
            chosen
        )));
    }

    slots[index].mark(
        SlotStatus::Active,
        NOTE_BIKE_RETURNED,
        SlotTag::JustReturned,
        now,
    );

    let mut released = None;
    if rented_from != chosen && !held.contains(&rented_from) {
        if let Some(origin) = slots
            .iter_mut()
            .find(|s| s.slot_number == rented_from && s.status == SlotStatus::Occupied)
        {
            origin.mark(SlotStatus::Active, "", SlotTag::None, now);
            released = Some(rented_from);
        }
    }

    let moved_to = manage_return_slot_availability(slots, now);

    Ok(ReturnPlacement {
        slot_number: chosen,
        released,
        moved_to,
    })
}

/// Keep one return slot free.
///
/// When every return slot holds a returned bike, the bike in the first one is
/// moved to the first rentable slot that is not itself holding a returned bike.
/// Returns the slot it was moved to.
pub fn manage_return_slot_availability(slots: &mut [Slot], now: DateTime<Utc>) -> Option<u32> {
    let return_pool: Vec<&Slot> = slots
        .iter()
        .filter(|s| is_return_slot(s.slot_number))
        .collect();
    let all_full = !return_pool.is_empty() && return_pool.iter().all(|s| s.holds_returned_bike());
    if !all_full {
        return None;
    }

    let Some(target) = slots.iter().position(|s| {
        !is_return_slot(s.slot_number)
            && s.status == SlotStatus::Active
            && !s.holds_returned_bike()
    }) else {
        tracing::warn!("Both return slots are full and no rentable slot can take a bike");
        return None;
    };
    let source = slots
        .iter()
        .position(|s| s.slot_number == FIRST_RETURN_SLOT)?;

    let notes = format!("{} (moved from slot {})", NOTE_BIKE_RETURNED, FIRST_RETURN_SLOT);
    slots[target].mark(SlotStatus::Active, &notes, SlotTag::JustReturned, now);
    slots[source].mark(
        SlotStatus::Reserved,
        NOTE_RESERVED_FOR_RETURNS,
        SlotTag::ReservedForReturn,
        now,
    );

    let moved_to = slots[target].slot_number;
    tracing::info!(moved_to, "Moved returned bike out of slot {}", FIRST_RETURN_SLOT);
    Some(moved_to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::registry::default_slots;

    fn now() -> DateTime<Utc> {
        "2024-05-01T08:00:00Z".parse().unwrap()
    }

    fn occupy(slots: &mut [Slot], numbers: impl IntoIterator<Item = u32>) {
        for n in numbers {
            slots[(n - 1) as usize].mark(
                SlotStatus::Occupied,
                NOTE_BIKE_RENTED,
                SlotTag::Rented,
                now(),
            );
        }
    }

    #[test]
    fn test_rent_requested_slot() {
        let mut slots = default_slots(now());

        let allocation = allocate_for_rent(&mut slots, 3, now()).unwrap();

        assert_eq!(allocation.allocated, 3);
        assert!(!allocation.was_substituted());
        assert_eq!(slots[2].status, SlotStatus::Occupied);
        assert_eq!(slots[2].notes, NOTE_BIKE_RENTED);
        assert_eq!(slots[2].tag, SlotTag::Rented);
    }

    #[test]
    fn test_return_slot_request_is_substituted() {
        for requested in [9, 10] {
            let mut slots = default_slots(now());
            occupy(&mut slots, [1, 2]);

            let allocation = allocate_for_rent(&mut slots, requested, now()).unwrap();

            assert!(allocation.allocated <= 8);
            assert_eq!(allocation.allocated, 3);
            assert!(allocation.was_substituted());
            assert_eq!(slots[(requested - 1) as usize].status, SlotStatus::Reserved);
        }
    }

    #[test]
    fn test_return_slot_request_fails_when_pool_is_full() {
        let mut slots = default_slots(now());
        occupy(&mut slots, 1..=8);

        let err = allocate_for_rent(&mut slots, 9, now()).unwrap_err();

        assert!(matches!(err, AppError::NoAvailableSlots(_)));
        assert!(slots[..8].iter().all(|s| s.status == SlotStatus::Occupied));
    }

    #[test]
    fn test_substitution_skips_maintenance() {
        let mut slots = default_slots(now());
        slots[0].mark(
            SlotStatus::InMaintenance,
            "Broken",
            SlotTag::Maintenance {
                reason: "Broken".to_string(),
            },
            now(),
        );

        let allocation = allocate_for_rent(&mut slots, 10, now()).unwrap();
        assert_eq!(allocation.allocated, 2);
    }

    #[test]
    fn test_rent_unavailable_slot_is_rejected() {
        let mut slots = default_slots(now());
        occupy(&mut slots, [4]);

        let err = allocate_for_rent(&mut slots, 4, now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = allocate_for_rent(&mut slots, 11, now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_normalize_heals_return_pool() {
        let mut slots = default_slots(now());
        slots[8].mark(SlotStatus::Active, "", SlotTag::None, now());
        slots[9].mark(
            SlotStatus::Active,
            NOTE_BIKE_RETURNED,
            SlotTag::JustReturned,
            now(),
        );

        assert!(normalize_return_slots(&mut slots, now()));
        assert_eq!(slots[8].status, SlotStatus::Reserved);
        assert_eq!(slots[8].tag, SlotTag::ReservedForReturn);
        // A docked returned bike is left in place.
        assert!(slots[9].holds_returned_bike());

        assert!(!normalize_return_slots(&mut slots, now()));
    }

    #[test]
    fn test_return_into_rented_slot() {
        let mut slots = default_slots(now());
        occupy(&mut slots, [2]);

        let placement = accept_return(&mut slots, 2, 2, &[], now()).unwrap();

        assert_eq!(placement.released, None);
        assert_eq!(placement.moved_to, None);
        assert_eq!(slots[1].status, SlotStatus::Active);
        assert_eq!(slots[1].notes, NOTE_BIKE_RETURNED);
    }

    #[test]
    fn test_return_elsewhere_releases_origin() {
        let mut slots = default_slots(now());
        occupy(&mut slots, [2]);

        let placement = accept_return(&mut slots, 9, 2, &[], now()).unwrap();

        assert_eq!(placement.released, Some(2));
        assert_eq!(slots[1].status, SlotStatus::Active);
        assert_eq!(slots[1].tag, SlotTag::None);
        assert_eq!(slots[8].status, SlotStatus::Active);
        assert!(slots[8].holds_returned_bike());
    }

    #[test]
    fn test_second_return_moves_slot_nine_bike() {
        let mut slots = default_slots(now());
        occupy(&mut slots, [1, 2, 5]);
        slots[8].mark(
            SlotStatus::Active,
            NOTE_BIKE_RETURNED,
            SlotTag::JustReturned,
            now(),
        );

        let placement = accept_return(&mut slots, 10, 5, &[], now()).unwrap();

        // Slot 5 was released first, but slot 3 comes earlier in the scan.
        assert_eq!(placement.moved_to, Some(3));
        assert!(slots[2].holds_returned_bike());
        assert_eq!(slots[8].status, SlotStatus::Reserved);
        assert_eq!(slots[8].tag, SlotTag::ReservedForReturn);
        assert_eq!(slots[8].notes, NOTE_RESERVED_FOR_RETURNS);
        assert!(slots[9].holds_returned_bike());
    }

    #[test]
    fn test_reconciliation_without_target_leaves_slots() {
        let mut slots = default_slots(now());
        occupy(&mut slots, 1..=8);
        for i in [8, 9] {
            slots[i].mark(
                SlotStatus::Active,
                NOTE_BIKE_RETURNED,
                SlotTag::JustReturned,
                now(),
            );
        }

        assert_eq!(manage_return_slot_availability(&mut slots, now()), None);
        assert!(slots[8].holds_returned_bike());
    }

    #[test]
    fn test_return_rejections() {
        let mut slots = default_slots(now());
        slots[3].mark(
            SlotStatus::InMaintenance,
            "Broken",
            SlotTag::Maintenance {
                reason: "Broken".to_string(),
            },
            now(),
        );
        slots[9].mark(
            SlotStatus::Active,
            NOTE_BIKE_RETURNED,
            SlotTag::JustReturned,
            now(),
        );

        assert!(matches!(
            accept_return(&mut slots, 4, 1, &[], now()),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            accept_return(&mut slots, 10, 1, &[], now()),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            accept_return(&mut slots, 12, 1, &[], now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_origin_taken_by_later_rental_is_kept() {
        let mut slots = default_slots(now());
        allocate_for_rent(&mut slots, 1, now()).unwrap();
        allocate_for_rent(&mut slots, 2, now()).unwrap();
        // The second rider docks into slot 1, which is then rented again.
        accept_return(&mut slots, 1, 2, &[1], now()).unwrap();
        allocate_for_rent(&mut slots, 1, now()).unwrap();

        let placement = accept_return(&mut slots, 3, 1, &[1], now()).unwrap();

        assert_eq!(placement.released, None);
        assert_eq!(slots[0].status, SlotStatus::Occupied);
        assert_eq!(slots[0].tag, SlotTag::Rented);
        assert!(matches!(
            allocate_for_rent(&mut slots, 1, now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_return_into_docked_rentable_slot_is_accepted() {
        let mut slots = default_slots(now());
        occupy(&mut slots, [2]);

        let placement = accept_return(&mut slots, 5, 2, &[], now()).unwrap();

        assert_eq!(placement.slot_number, 5);
        assert!(slots[4].holds_returned_bike());
        assert_eq!(slots[1].status, SlotStatus::Active);
    }
}
