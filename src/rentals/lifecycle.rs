//! Starting and returning rentals.
//!
//! Both operations work on collections already loaded in memory; the caller
//! persists them together once the operation succeeds.

use chrono::{DateTime, Utc};

use super::ledger::Ledger;
use crate::errors::AppError;
use crate::models::{
    DurationPlan, Rental, RentalStatus, ReturnReceipt, Slot, StartRentalRequest, Station, User,
};
use crate::slots::{accept_return, allocate_for_rent};

/// Hourly plans need at least this balance regardless of price.
pub const MIN_HOURLY_CREDITS: f64 = 25.0;
pub const MAX_HOURLY_HOURS: u32 = 24;

/// Up-front price of a plan at a station.
pub fn quote(station: &Station, plan: DurationPlan, hours: Option<u32>) -> Result<f64, AppError> {
    match plan {
        DurationPlan::Daily => Ok(station.daily_rate),
        DurationPlan::Hourly => {
            let hours = hours.ok_or_else(|| {
                AppError::Validation("Hours are required for hourly rentals".to_string())
            })?;
            if !(1..=MAX_HOURLY_HOURS).contains(&hours) {
                return Err(AppError::Validation(format!(
                    "Hours must be between 1 and {}",
                    MAX_HOURLY_HOURS
                )));
            }
            Ok(station.hourly_rate * f64::from(hours))
        }
        DurationPlan::PayAsYouGo => Ok(0.0),
    }
}

pub fn check_credits(plan: DurationPlan, price: f64, credits: f64) -> Result<(), AppError> {
    let required = match plan {
        DurationPlan::Hourly => price.max(MIN_HOURLY_CREDITS),
        DurationPlan::Daily => price,
        DurationPlan::PayAsYouGo => return Ok(()),
    };
    if credits < required {
        return Err(AppError::InsufficientCredits {
            required,
            available: credits,
        });
    }
    Ok(())
}

pub fn elapsed_hours(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - start).num_milliseconds().max(0);
    millis as f64 / 3_600_000.0
}

/// Usage charge for pay-as-you-go: every started hour is billed, at least one.
pub fn usage_charge(elapsed_hours: f64, hourly_rate: f64) -> f64 {
    elapsed_hours.ceil().max(1.0) * hourly_rate
}

/// Validate, allocate a slot and append an active rental.
pub fn start_rental(
    ledger: &mut Ledger,
    slots: &mut [Slot],
    user: &User,
    station: &Station,
    request: &StartRentalRequest,
    now: DateTime<Utc>,
) -> Result<Rental, AppError> {
    if let Some(active) = ledger.active_for_user(&user.id) {
        return Err(AppError::ActiveRentalExists {
            rental_id: active.id.clone(),
        });
    }

    let price = quote(station, request.duration, request.hours)?;
    check_credits(request.duration, price, ledger.credits_for(user))?;

    let allocation = allocate_for_rent(slots, request.slot_number, now)?;
    if allocation.was_substituted() {
        tracing::info!(
            requested = allocation.requested,
            allocated = allocation.allocated,
            station = %station.key,
            "Return slot requested, substituted a rentable slot"
        );
    }

    let rental = Rental {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        bike_id: station.bike_id.clone(),
        station: station.key.clone(),
        slot_number: allocation.allocated,
        requested_slot_number: allocation.requested,
        start_time: now,
        end_time: None,
        status: RentalStatus::Active,
        duration: request.duration,
        hours: match request.duration {
            DurationPlan::Hourly => request.hours,
            _ => None,
        },
        price,
        return_slot_number: None,
    };
    ledger.append(rental.clone());
    Ok(rental)
}

/// Complete an active rental, docking the bike into `chosen_slot`.
///
/// `hourly_rate` prices pay-as-you-go usage; prepaid plans are not charged again.
pub fn return_rental(
    ledger: &mut Ledger,
    slots: &mut [Slot],
    user: &User,
    rental_id: &str,
    chosen_slot: u32,
    hourly_rate: f64,
    now: DateTime<Utc>,
) -> Result<ReturnReceipt, AppError> {
    let rental = ledger
        .find(rental_id)
        .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", rental_id)))?;
    if rental.user_id != user.id {
        return Err(AppError::Validation(format!(
            "Rental {} does not belong to user {}",
            rental_id, user.id
        )));
    }
    if !rental.is_active() {
        return Err(AppError::Validation(format!(
            "Rental {} is not active",
            rental_id
        )));
    }

    let elapsed = elapsed_hours(rental.start_time, now);
    let charge = if rental.duration.is_prepaid() {
        0.0
    } else {
        usage_charge(elapsed, hourly_rate)
    };

    let held = ledger.held_slots(&rental.station, rental_id);
    let placement = accept_return(slots, chosen_slot, rental.slot_number, &held, now)?;

    let rental = ledger
        .find_mut(rental_id)
        .ok_or_else(|| AppError::Internal(format!("Rental {} vanished", rental_id)))?;
    rental.status = RentalStatus::Completed;
    rental.end_time = Some(now);
    rental.return_slot_number = Some(placement.slot_number);
    rental.price += charge;
    let rental = rental.clone();

    Ok(ReturnReceipt {
        rental,
        charge,
        elapsed_hours: elapsed,
        credits: ledger.credits_for(user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::models::{Role, SlotStatus};
    use crate::slots::default_slots;

    fn now() -> DateTime<Utc> {
        "2024-05-01T08:00:00Z".parse().unwrap()
    }

    fn station() -> Station {
        Station {
            key: "Station 1_Kathmandu".to_string(),
            name: "Station 1".to_string(),
            location: "Kathmandu".to_string(),
            hourly_rate: 25.0,
            daily_rate: 150.0,
            bicycle_count: 3,
            bike_id: "b1".to_string(),
        }
    }

    fn user(initial_credits: f64) -> User {
        User {
            id: "u1".to_string(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            mobile: None,
            role: Role::User,
            initial_credits,
            credits: 0.0,
        }
    }

    fn request(slot_number: u32, duration: DurationPlan, hours: Option<u32>) -> StartRentalRequest {
        StartRentalRequest {
            user_id: "u1".to_string(),
            station: station().key,
            slot_number,
            duration,
            hours,
        }
    }

    #[test]
    fn test_quote_per_plan() {
        assert_eq!(quote(&station(), DurationPlan::Daily, None).unwrap(), 150.0);
        assert_eq!(
            quote(&station(), DurationPlan::Hourly, Some(3)).unwrap(),
            75.0
        );
        assert_eq!(quote(&station(), DurationPlan::PayAsYouGo, None).unwrap(), 0.0);
        assert!(quote(&station(), DurationPlan::Hourly, Some(0)).is_err());
        assert!(quote(&station(), DurationPlan::Hourly, Some(25)).is_err());
        assert!(quote(&station(), DurationPlan::Hourly, None).is_err());
    }

    #[test]
    fn test_hourly_below_minimum_is_rejected() {
        let mut ledger = Ledger::default();
        let mut slots = default_slots(now());

        let err = start_rental(
            &mut ledger,
            &mut slots,
            &user(20.0),
            &station(),
            &request(1, DurationPlan::Hourly, Some(1)),
            now(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            AppError::InsufficientCredits {
                required: 25.0,
                available: 20.0
            }
        );
        assert!(ledger.rentals().is_empty());
        assert_eq!(slots[0].status, SlotStatus::Active);
    }

    #[test]
    fn test_hourly_price_above_balance_is_rejected() {
        let mut ledger = Ledger::default();
        let mut slots = default_slots(now());

        let err = start_rental(
            &mut ledger,
            &mut slots,
            &user(60.0),
            &station(),
            &request(1, DurationPlan::Hourly, Some(3)),
            now(),
        )
        .unwrap_err();

        assert!(matches!(err, AppError::InsufficientCredits { required, .. } if required == 75.0));
    }

    #[test]
    fn test_pay_as_you_go_skips_credit_check() {
        let mut ledger = Ledger::default();
        let mut slots = default_slots(now());

        let rental = start_rental(
            &mut ledger,
            &mut slots,
            &user(0.0),
            &station(),
            &request(9, DurationPlan::PayAsYouGo, None),
            now(),
        )
        .unwrap();

        assert_eq!(rental.price, 0.0);
        assert_eq!(rental.slot_number, 1);
        assert_eq!(rental.requested_slot_number, 9);
        assert_eq!(rental.hours, None);
        assert_eq!(slots[0].status, SlotStatus::Occupied);
    }

    #[test]
    fn test_one_active_rental_per_user() {
        let mut ledger = Ledger::default();
        let mut slots = default_slots(now());
        let rider = user(500.0);

        let first = start_rental(
            &mut ledger,
            &mut slots,
            &rider,
            &station(),
            &request(1, DurationPlan::Daily, None),
            now(),
        )
        .unwrap();
        assert_eq!(ledger.credits_for(&rider), 350.0);

        let err = start_rental(
            &mut ledger,
            &mut slots,
            &rider,
            &station(),
            &request(2, DurationPlan::Daily, None),
            now(),
        )
        .unwrap_err();

        assert_eq!(err, AppError::ActiveRentalExists { rental_id: first.id });
        assert_eq!(ledger.rentals().len(), 1);
        assert_eq!(slots[1].status, SlotStatus::Active);
    }

    #[test]
    fn test_pay_as_you_go_return_charges_started_hours() {
        let mut ledger = Ledger::default();
        let mut slots = default_slots(now());
        let rider = user(100.0);

        let rental = start_rental(
            &mut ledger,
            &mut slots,
            &rider,
            &station(),
            &request(2, DurationPlan::PayAsYouGo, None),
            now(),
        )
        .unwrap();

        let later = now() + Duration::minutes(144);
        let receipt =
            return_rental(&mut ledger, &mut slots, &rider, &rental.id, 2, 25.0, later).unwrap();

        assert!((receipt.elapsed_hours - 2.4).abs() < 1e-9);
        assert_eq!(receipt.charge, 75.0);
        assert_eq!(receipt.rental.price, 75.0);
        assert_eq!(receipt.rental.status, RentalStatus::Completed);
        assert_eq!(receipt.rental.end_time, Some(later));
        assert_eq!(receipt.rental.return_slot_number, Some(2));
        assert_eq!(receipt.credits, 25.0);
        assert!(ledger.active_for_user("u1").is_none());
    }

    #[test]
    fn test_prepaid_return_is_not_charged_again() {
        let mut ledger = Ledger::default();
        let mut slots = default_slots(now());
        let rider = user(100.0);

        let rental = start_rental(
            &mut ledger,
            &mut slots,
            &rider,
            &station(),
            &request(1, DurationPlan::Hourly, Some(2)),
            now(),
        )
        .unwrap();

        let later = now() + Duration::hours(5);
        let receipt =
            return_rental(&mut ledger, &mut slots, &rider, &rental.id, 9, 25.0, later).unwrap();

        assert_eq!(receipt.charge, 0.0);
        assert_eq!(receipt.rental.price, 50.0);
        assert_eq!(receipt.credits, 50.0);
        assert_eq!(slots[0].status, SlotStatus::Active);
        assert!(slots[8].holds_returned_bike());
    }

    #[test]
    fn test_return_rejections() {
        let mut ledger = Ledger::default();
        let mut slots = default_slots(now());
        let rider = user(100.0);
        let rental = start_rental(
            &mut ledger,
            &mut slots,
            &rider,
            &station(),
            &request(1, DurationPlan::PayAsYouGo, None),
            now(),
        )
        .unwrap();

        let mut stranger = user(100.0);
        stranger.id = "u2".to_string();
        assert!(matches!(
            return_rental(&mut ledger, &mut slots, &stranger, &rental.id, 1, 25.0, now()),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            return_rental(&mut ledger, &mut slots, &rider, "missing", 1, 25.0, now()),
            Err(AppError::NotFound(_))
        ));

        return_rental(&mut ledger, &mut slots, &rider, &rental.id, 1, 25.0, now()).unwrap();
        assert!(matches!(
            return_rental(&mut ledger, &mut slots, &rider, &rental.id, 1, 25.0, now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_return_keeps_origin_slot_rented_by_someone_else() {
        let mut ledger = Ledger::default();
        let mut slots = default_slots(now());
        let riders: Vec<User> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| {
                let mut rider = user(500.0);
                rider.id = id.to_string();
                rider
            })
            .collect();
        let rent = |ledger: &mut Ledger, slots: &mut [Slot], rider: &User, slot: u32| {
            let mut req = request(slot, DurationPlan::Daily, None);
            req.user_id = rider.id.clone();
            start_rental(ledger, slots, rider, &station(), &req, now())
        };

        let a = rent(&mut ledger, &mut slots, &riders[0], 1).unwrap();
        let b = rent(&mut ledger, &mut slots, &riders[1], 2).unwrap();
        return_rental(&mut ledger, &mut slots, &riders[1], &b.id, 1, 25.0, now()).unwrap();
        let c = rent(&mut ledger, &mut slots, &riders[2], 1).unwrap();
        assert_eq!(c.slot_number, 1);

        return_rental(&mut ledger, &mut slots, &riders[0], &a.id, 3, 25.0, now()).unwrap();

        assert_eq!(slots[0].status, SlotStatus::Occupied);
        assert!(matches!(
            rent(&mut ledger, &mut slots, &riders[3], 1),
            Err(AppError::Validation(_))
        ));
        assert!(ledger.active_for_user("c").is_some());
    }

    #[test]
    fn test_usage_charge_minimum_one_hour() {
        assert_eq!(usage_charge(0.0, 25.0), 25.0);
        assert_eq!(usage_charge(1.0, 25.0), 25.0);
        assert_eq!(usage_charge(1.01, 25.0), 50.0);
        assert_eq!(elapsed_hours(now(), now() - Duration::hours(1)), 0.0);
    }
}
