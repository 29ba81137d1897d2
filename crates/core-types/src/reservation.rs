use crate::property::Property;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `reservations` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i32,
    pub guest_id: i32,
    pub property_id: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Reservation {
    /// Number of nights between check-in and check-out.
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

/// A guest's reservation joined with the booked property and that
/// property's average review rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationListing {
    pub reservation: Reservation,
    pub property: Property,
    pub average_rating: Decimal,
}

impl ReservationListing {
    /// Total price of the stay in cents.
    pub fn total_cost(&self) -> i64 {
        self.reservation.nights() * i64::from(self.property.cost_per_night)
    }
}
