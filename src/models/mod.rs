//! Data models for the rental backend.
//!
//! Field names serialize in camelCase to match the stored JSON collections.

mod datastore;
mod rental;
mod slot;
mod station;
mod user;

pub use datastore::*;
pub use rental::*;
pub use slot::*;
pub use station::*;
pub use user::*;
