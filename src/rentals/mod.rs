//! Rental ledger and the rent/return lifecycle built on top of it.

mod ledger;
mod lifecycle;

pub use ledger::*;
pub use lifecycle::*;
