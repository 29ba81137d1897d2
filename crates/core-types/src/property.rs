use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `properties` table.
///
/// `cost_per_night` is held in cents. The descriptive fields are carried
/// through untouched; this layer never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Property {
    #[serde(default)]
    pub id: i32,
    pub owner_id: i32,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_photo_url: String,
    #[serde(default)]
    pub cover_photo_url: String,
    pub cost_per_night: i32,
    #[serde(default)]
    pub parking_spaces: i32,
    #[serde(default)]
    pub number_of_bathrooms: i32,
    #[serde(default)]
    pub number_of_bedrooms: i32,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub post_code: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A property together with the mean of its review ratings.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PropertyListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub property: Property,
    pub average_rating: Decimal,
}

/// A row from the `property_reviews` table. Only read for aggregation.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PropertyReview {
    pub id: i32,
    pub guest_id: i32,
    pub property_id: i32,
    pub reservation_id: i32,
    pub rating: i16,
    #[serde(default)]
    pub message: Option<String>,
}

/// Everything needed to create a listing. The id is assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProperty {
    pub owner_id: i32,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_photo_url: String,
    #[serde(default)]
    pub cover_photo_url: String,
    pub cost_per_night: i32,
    #[serde(default)]
    pub parking_spaces: i32,
    #[serde(default)]
    pub number_of_bathrooms: i32,
    #[serde(default)]
    pub number_of_bedrooms: i32,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub post_code: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl NewProperty {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("title".into(), "must not be empty".into()));
        }
        if self.cost_per_night < 0 {
            return Err(CoreError::InvalidInput(
                "cost_per_night".into(),
                format!("must not be negative, got {}", self.cost_per_night),
            ));
        }
        Ok(())
    }

    pub fn into_property(self, id: i32) -> Property {
        Property {
            id,
            owner_id: self.owner_id,
            title: self.title,
            description: self.description,
            thumbnail_photo_url: self.thumbnail_photo_url,
            cover_photo_url: self.cover_photo_url,
            cost_per_night: self.cost_per_night,
            parking_spaces: self.parking_spaces,
            number_of_bathrooms: self.number_of_bathrooms,
            number_of_bedrooms: self.number_of_bedrooms,
            country: self.country,
            street: self.street,
            city: self.city,
            province: self.province,
            post_code: self.post_code,
            active: self.active,
        }
    }
}
