//! Domain records shared by the LightBnB data-access layer.
//!
//! Everything here is plain data: rows as they come back from the
//! database, and the payloads callers hand in for inserts.

pub mod error;
pub mod property;
pub mod reservation;
pub mod user;

// Re-export the core types to provide a clean public API.
pub use error::CoreError;
pub use property::{NewProperty, Property, PropertyListing, PropertyReview};
pub use reservation::{Reservation, ReservationListing};
pub use user::{NewUser, User};
