//! An in-memory store seeded from the static JSON data files.
//!
//! `FixtureStore` implements every repository trait without a database. It
//! applies the same join and filter rules as the SQL path, so it doubles as
//! the test backend. `add_property` here assigns `count + 1` as the new id,
//! refuses it if that id is already taken, and only touches memory.

use crate::query::PropertyFilter;
use crate::repository::{
    check_limit, checked, PropertyRepository, ReservationRepository, UserRepository,
};
use crate::{DbError, Lookup};
use async_trait::async_trait;
use core_types::{
    NewProperty, NewUser, Property, PropertyListing, PropertyReview, Reservation,
    ReservationListing, User,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::RwLock;

const USERS_FILE: &str = "users.json";
const PROPERTIES_FILE: &str = "properties.json";
const RESERVATIONS_FILE: &str = "reservations.json";
const REVIEWS_FILE: &str = "property_reviews.json";

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    properties: BTreeMap<i32, Property>,
    reservations: Vec<Reservation>,
    reviews: Vec<PropertyReview>,
}

impl Tables {
    /// Mean review rating, or `None` when the property has no reviews.
    fn average_rating(&self, property_id: i32) -> Option<Decimal> {
        let ratings: Vec<Decimal> = self
            .reviews
            .iter()
            .filter(|review| review.property_id == property_id)
            .map(|review| Decimal::from(review.rating))
            .collect();
        if ratings.is_empty() {
            return None;
        }
        let count = Decimal::from(ratings.len() as u64);
        Some(ratings.into_iter().sum::<Decimal>() / count)
    }
}

#[derive(Debug)]
pub struct FixtureStore {
    tables: RwLock<Tables>,
}

impl FixtureStore {
    pub fn from_records(
        users: Vec<User>,
        properties: Vec<Property>,
        reservations: Vec<Reservation>,
        reviews: Vec<PropertyReview>,
    ) -> Self {
        let tables = Tables {
            users: users.into_iter().map(|user| (user.id, user)).collect(),
            properties: properties.into_iter().map(|p| (p.id, p)).collect(),
            reservations,
            reviews,
        };
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Loads `users.json` and `properties.json` from `dir`, plus
    /// `reservations.json` and `property_reviews.json` when present.
    ///
    /// Users and properties are objects keyed by id (`{"1": {...}}`); the key
    /// becomes the record's id. Reservations and reviews are plain arrays.
    pub async fn load(dir: &Path) -> Result<Self, DbError> {
        let users: Vec<User> = read_keyed(&dir.join(USERS_FILE))
            .await?
            .into_iter()
            .map(|(id, mut user): (i32, User)| {
                user.id = id;
                user
            })
            .collect();
        let properties: Vec<Property> = read_keyed(&dir.join(PROPERTIES_FILE))
            .await?
            .into_iter()
            .map(|(id, mut property): (i32, Property)| {
                property.id = id;
                property
            })
            .collect();
        let reservations = read_optional(&dir.join(RESERVATIONS_FILE)).await?;
        let reviews = read_optional(&dir.join(REVIEWS_FILE)).await?;

        tracing::info!(
            users = users.len(),
            properties = properties.len(),
            reservations = reservations.len(),
            reviews = reviews.len(),
            dir = %dir.display(),
            "Loaded fixtures"
        );
        Ok(Self::from_records(users, properties, reservations, reviews))
    }

    pub async fn property_count(&self) -> usize {
        self.tables.read().await.properties.len()
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DbError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| DbError::Fixture {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| DbError::FixtureJson {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_keyed<T: DeserializeOwned>(path: &Path) -> Result<Vec<(i32, T)>, DbError> {
    let records: HashMap<String, T> = read_json(path).await?;
    records
        .into_iter()
        .map(|(key, record)| {
            key.parse::<i32>()
                .map(|id| (id, record))
                .map_err(|_| DbError::FixtureKey {
                    path: path.to_path_buf(),
                    key,
                })
        })
        .collect()
}

async fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DbError> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|source| DbError::Fixture {
            path: path.to_path_buf(),
            source,
        })?;
    if !exists {
        tracing::debug!(path = %path.display(), "Optional fixture absent");
        return Ok(Vec::new());
    }
    read_json(path).await
}

fn matches_filter(filter: &PropertyFilter, property: &Property, average_rating: Decimal) -> bool {
    if let Some(city) = filter.city_term() {
        if !property.city.to_lowercase().contains(&city.to_lowercase()) {
            return false;
        }
    }
    if let Some(owner) = filter.owner() {
        if property.owner_id != owner {
            return false;
        }
    }
    let cost = i64::from(property.cost_per_night);
    if filter.price_floor_cents().is_some_and(|floor| cost < floor) {
        return false;
    }
    if filter.price_ceiling_cents().is_some_and(|ceiling| cost > ceiling) {
        return false;
    }
    filter
        .rating_floor()
        .is_none_or(|floor| average_rating >= floor)
}

fn take(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

#[async_trait]
impl UserRepository for FixtureStore {
    async fn get_user_with_email(&self, email: &str) -> Result<Lookup<User>, DbError> {
        let tables = self.tables.read().await;
        let user = tables.users.values().find(|user| user.email == email).cloned();
        Ok(user.into())
    }

    async fn get_user_with_id(&self, id: i32) -> Result<Lookup<User>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).cloned().into())
    }

    async fn add_user(&self, user: NewUser) -> Result<User, DbError> {
        checked("add_user", user.validate())?;
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|existing| existing.email == user.email) {
            let err = DbError::UniqueViolation {
                constraint: "users_email_key".to_string(),
            };
            tracing::error!(operation = "add_user", error = %err, "Fixture insert failed");
            return Err(err);
        }

        let id = tables.users.keys().next_back().map_or(1, |last| last + 1);
        let user = user.into_user(id);
        tables.users.insert(id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl ReservationRepository for FixtureStore {
    async fn get_all_reservations(
        &self,
        guest_id: i32,
        limit: i64,
    ) -> Result<Vec<ReservationListing>, DbError> {
        check_limit("get_all_reservations", limit)?;
        let tables = self.tables.read().await;

        let mut listings: Vec<ReservationListing> = tables
            .reservations
            .iter()
            .filter(|reservation| reservation.guest_id == guest_id)
            .filter_map(|reservation| {
                let property = tables.properties.get(&reservation.property_id)?;
                let average_rating = tables.average_rating(property.id)?;
                Some(ReservationListing {
                    reservation: reservation.clone(),
                    property: property.clone(),
                    average_rating,
                })
            })
            .collect();

        listings.sort_by_key(|listing| listing.reservation.start_date);
        listings.truncate(take(limit));
        Ok(listings)
    }
}

#[async_trait]
impl PropertyRepository for FixtureStore {
    async fn get_all_properties(
        &self,
        filter: &PropertyFilter,
        limit: i64,
    ) -> Result<Vec<PropertyListing>, DbError> {
        check_limit("get_all_properties", limit)?;
        let tables = self.tables.read().await;

        let mut listings: Vec<PropertyListing> = tables
            .properties
            .values()
            .filter_map(|property| {
                let average_rating = tables.average_rating(property.id)?;
                matches_filter(filter, property, average_rating).then(|| PropertyListing {
                    property: property.clone(),
                    average_rating,
                })
            })
            .collect();

        listings.sort_by_key(|listing| listing.property.cost_per_night);
        listings.truncate(take(limit));
        Ok(listings)
    }

    async fn add_property(&self, property: NewProperty) -> Result<Property, DbError> {
        checked("add_property", property.validate())?;
        let mut tables = self.tables.write().await;

        let id = i32::try_from(tables.properties.len() + 1).unwrap_or(i32::MAX);
        if tables.properties.contains_key(&id) {
            let err = DbError::UniqueViolation {
                constraint: "properties_pkey".to_string(),
            };
            tracing::error!(
                operation = "add_property",
                property_id = id,
                error = %err,
                "Fixture insert failed"
            );
            return Err(err);
        }
        let property = property.into_property(id);
        tables.properties.insert(id, property.clone());
        tracing::info!(property_id = id, "Added property to in-memory fixtures");
        Ok(property)
    }
}
