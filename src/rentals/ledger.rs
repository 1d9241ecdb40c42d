//! In-memory view over the `rentals` collection.

use crate::models::{Rental, RentalStatus, User};

/// Append-only rental history; only a rental's status fields change in place.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    rentals: Vec<Rental>,
}

impl Ledger {
    pub fn new(rentals: Vec<Rental>) -> Self {
        Self { rentals }
    }

    pub fn rentals(&self) -> &[Rental] {
        &self.rentals
    }

    pub fn into_rentals(self) -> Vec<Rental> {
        self.rentals
    }

    pub fn find(&self, id: &str) -> Option<&Rental> {
        self.rentals.iter().find(|r| r.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Rental> {
        self.rentals.iter_mut().find(|r| r.id == id)
    }

    pub fn append(&mut self, rental: Rental) {
        self.rentals.push(rental);
    }

    pub fn for_user<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Rental> + 'a {
        self.rentals.iter().filter(move |r| r.user_id == user_id)
    }

    pub fn active_for_user<'a>(&'a self, user_id: &'a str) -> Option<&'a Rental> {
        self.for_user(user_id).find(|r| r.is_active())
    }

    /// Slots at `station` held by active rentals other than `except_id`.
    pub fn held_slots(&self, station: &str, except_id: &str) -> Vec<u32> {
        self.rentals
            .iter()
            .filter(|r| r.is_active() && r.station == station && r.id != except_id)
            .map(|r| r.slot_number)
            .collect()
    }

    /// Total charged to a user; cancelled rentals cost nothing.
    pub fn spend_for_user(&self, user_id: &str) -> f64 {
        self.for_user(user_id)
            .filter(|r| r.status != RentalStatus::Cancelled)
            .map(|r| r.price)
            .sum()
    }

    pub fn credits_for(&self, user: &User) -> f64 {
        user.initial_credits - self.spend_for_user(&user.id)
    }

    /// Fill in the derived `credits` field.
    pub fn with_credits(&self, mut user: User) -> User {
        user.credits = self.credits_for(&user);
        user
    }
}
