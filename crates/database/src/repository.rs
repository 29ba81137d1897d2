use crate::query::{PropertyFilter, PropertyQuery, SqlParam};
use crate::{DbError, Lookup};
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{
    CoreError, NewProperty, NewUser, Property, PropertyListing, Reservation, ReservationListing,
    User,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::FromRow;

/// Reads and inserts users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Exact, case-sensitive match on the stored email.
    async fn get_user_with_email(&self, email: &str) -> Result<Lookup<User>, DbError>;

    async fn get_user_with_id(&self, id: i32) -> Result<Lookup<User>, DbError>;

    /// Inserts a user and returns it with its assigned id. Uniqueness of the
    /// email is left to the store.
    async fn add_user(&self, user: NewUser) -> Result<User, DbError>;
}

/// Reads a guest's reservations.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Up to `limit` reservations for the guest, earliest start date first,
    /// each joined with its property and that property's average rating.
    /// Properties without reviews drop out of the join.
    async fn get_all_reservations(
        &self,
        guest_id: i32,
        limit: i64,
    ) -> Result<Vec<ReservationListing>, DbError>;
}

/// Searches and creates property listings.
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    /// Up to `limit` listings matching the filter, cheapest first.
    async fn get_all_properties(
        &self,
        filter: &PropertyFilter,
        limit: i64,
    ) -> Result<Vec<PropertyListing>, DbError>;

    async fn add_property(&self, property: NewProperty) -> Result<Property, DbError>;
}

/// Logs input that is rejected before it reaches the store.
pub(crate) fn checked(
    operation: &'static str,
    result: Result<(), CoreError>,
) -> Result<(), DbError> {
    result.map_err(|e| {
        let err = DbError::from(e);
        tracing::error!(operation, error = %err, "Rejected invalid input");
        err
    })
}

pub(crate) fn check_limit(operation: &'static str, limit: i64) -> Result<(), DbError> {
    let result = if limit < 0 {
        Err(CoreError::InvalidInput(
            "limit".into(),
            format!("must not be negative, got {limit}"),
        ))
    } else {
        Ok(())
    };
    checked(operation, result)
}

/// Converts and logs a failed query. Each failure is logged once, here.
fn logged<T>(operation: &'static str, result: Result<T, sqlx::Error>) -> Result<T, DbError> {
    result.map_err(|e| {
        let err = DbError::from(e);
        tracing::error!(operation, error = %err, "Database query failed");
        err
    })
}

/// The `DbRepository` is the PostgreSQL implementation of every repository
/// trait. It holds a clone of the shared pool handed to it at construction.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

/// One row of the reservations query. The reservation's own id is aliased
/// because `properties.*` already brings an `id` column.
#[derive(FromRow)]
struct ReservationRow {
    reservation_id: i32,
    guest_id: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[sqlx(flatten)]
    property: Property,
    average_rating: Decimal,
}

impl From<ReservationRow> for ReservationListing {
    fn from(row: ReservationRow) -> Self {
        ReservationListing {
            reservation: Reservation {
                id: row.reservation_id,
                guest_id: row.guest_id,
                property_id: row.property.id,
                start_date: row.start_date,
                end_date: row.end_date,
            },
            property: row.property,
            average_rating: row.average_rating,
        }
    }
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for DbRepository {
    async fn get_user_with_email(&self, email: &str) -> Result<Lookup<User>, DbError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await;
        Ok(logged("get_user_with_email", user)?.into())
    }

    async fn get_user_with_id(&self, id: i32) -> Result<Lookup<User>, DbError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        Ok(logged("get_user_with_id", user)?.into())
    }

    async fn add_user(&self, user: NewUser) -> Result<User, DbError> {
        checked("add_user", user.validate())?;
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, password, email)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.password)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await;

        let inserted = logged("add_user", inserted)?;
        tracing::info!(user_id = inserted.id, "Added user");
        Ok(inserted)
    }
}

#[async_trait]
impl ReservationRepository for DbRepository {
    async fn get_all_reservations(
        &self,
        guest_id: i32,
        limit: i64,
    ) -> Result<Vec<ReservationListing>, DbError> {
        check_limit("get_all_reservations", limit)?;
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT
                reservations.id AS reservation_id,
                reservations.guest_id,
                reservations.start_date,
                reservations.end_date,
                properties.*,
                avg(property_reviews.rating) AS average_rating
            FROM properties
            JOIN reservations ON properties.id = reservations.property_id
            JOIN property_reviews ON properties.id = property_reviews.property_id
            WHERE reservations.guest_id = $1
            GROUP BY properties.id, reservations.id
            ORDER BY reservations.start_date
            LIMIT $2
            "#,
        )
        .bind(guest_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;

        let rows = logged("get_all_reservations", rows)?;
        Ok(rows.into_iter().map(ReservationListing::from).collect())
    }
}

#[async_trait]
impl PropertyRepository for DbRepository {
    async fn get_all_properties(
        &self,
        filter: &PropertyFilter,
        limit: i64,
    ) -> Result<Vec<PropertyListing>, DbError> {
        check_limit("get_all_properties", limit)?;
        let built = PropertyQuery::build(filter, limit);
        tracing::debug!(sql = %built.sql, params = ?built.params, "Property search");

        let mut query = sqlx::query_as::<_, PropertyListing>(&built.sql);
        for param in built.params {
            query = match param {
                SqlParam::Text(value) => query.bind(value),
                SqlParam::Int(value) => query.bind(value),
                SqlParam::BigInt(value) => query.bind(value),
                SqlParam::Decimal(value) => query.bind(value),
            };
        }

        logged("get_all_properties", query.fetch_all(&self.pool).await)
    }

    async fn add_property(&self, property: NewProperty) -> Result<Property, DbError> {
        checked("add_property", property.validate())?;
        let inserted = sqlx::query_as::<_, Property>(
            r#"
            INSERT INTO properties (
                owner_id, title, description, thumbnail_photo_url, cover_photo_url,
                cost_per_night, parking_spaces, number_of_bathrooms, number_of_bedrooms,
                country, street, city, province, post_code, active
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15
            )
            RETURNING *
            "#,
        )
        .bind(property.owner_id)
        .bind(&property.title)
        .bind(property.description.as_deref())
        .bind(&property.thumbnail_photo_url)
        .bind(&property.cover_photo_url)
        .bind(property.cost_per_night)
        .bind(property.parking_spaces)
        .bind(property.number_of_bathrooms)
        .bind(property.number_of_bedrooms)
        .bind(&property.country)
        .bind(&property.street)
        .bind(&property.city)
        .bind(&property.province)
        .bind(&property.post_code)
        .bind(property.active)
        .fetch_one(&self.pool)
        .await;

        let inserted = logged("add_property", inserted)?;
        tracing::info!(property_id = inserted.id, owner_id = inserted.owner_id, "Added property");
        Ok(inserted)
    }
}

// These run against a database loaded with the LightBnB schema and seeds:
// DATABASE_URL=postgres://... cargo test -p database -- --ignored
#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn repository() -> DbRepository {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = PgPool::connect(&url).await.expect("pool creation failed");
        DbRepository::new(pool)
    }

    #[test]
    fn negative_limit_is_rejected() {
        assert!(matches!(
            check_limit("get_all_properties", -1),
            Err(DbError::InvalidInput(_))
        ));
        assert!(check_limit("get_all_properties", 0).is_ok());
    }

    #[test]
    fn invalid_records_become_invalid_input() {
        let rejected = checked(
            "add_user",
            Err(CoreError::InvalidInput("email".into(), "must not be empty".into())),
        );
        assert!(matches!(rejected, Err(DbError::InvalidInput(_))));
        assert!(checked("add_user", Ok(())).is_ok());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn unknown_email_is_not_found() {
        let repo = repository().await;
        let user = repo.get_user_with_email("nobody@nowhere.invalid").await.unwrap();
        assert_eq!(user, Lookup::NotFound);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn added_user_reads_back_by_id() {
        let repo = repository().await;
        let email = format!("guest-{}@example.com", std::process::id());
        let added = repo
            .add_user(NewUser::new("Round Trip", email.clone(), "password"))
            .await
            .unwrap();

        let found = repo.get_user_with_id(added.id).await.unwrap().into_option().unwrap();
        assert_eq!(found.name, "Round Trip");
        assert_eq!(found.email, email);
        assert_eq!(found.password, "password");

        let duplicate = repo.add_user(NewUser::new("Again", email, "password")).await;
        assert!(matches!(duplicate, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reservations_respect_limit_and_order() {
        let repo = repository().await;
        let listings = repo.get_all_reservations(1, 3).await.unwrap();
        assert!(listings.len() <= 3);
        assert!(listings
            .windows(2)
            .all(|pair| pair[0].reservation.start_date <= pair[1].reservation.start_date));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn price_window_filters_and_orders() {
        let repo = repository().await;
        let filter = PropertyFilter {
            minimum_price_per_night: Some(50),
            maximum_price_per_night: Some(150),
            ..PropertyFilter::default()
        };
        let listings = repo.get_all_properties(&filter, 5).await.unwrap();
        assert!(listings.len() <= 5);
        assert!(listings
            .iter()
            .all(|l| (5000..=15000).contains(&l.property.cost_per_night)));
        assert!(listings
            .windows(2)
            .all(|pair| pair[0].property.cost_per_night <= pair[1].property.cost_per_night));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn city_search_is_case_insensitive() {
        let repo = repository().await;
        let filter = PropertyFilter {
            city: Some("van".to_string()),
            ..PropertyFilter::default()
        };
        let listings = repo.get_all_properties(&filter, 20).await.unwrap();
        assert!(listings
            .iter()
            .all(|l| l.property.city.to_lowercase().contains("van")));

        let upper = PropertyFilter {
            city: Some("VAN".to_string()),
            ..PropertyFilter::default()
        };
        assert_eq!(repo.get_all_properties(&upper, 20).await.unwrap(), listings);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn added_property_returns_every_column() {
        let repo = repository().await;
        // every column gets a distinct value so a misordered bind shows up
        let property = NewProperty {
            owner_id: 1,
            title: "Column Check".to_string(),
            description: Some("description".to_string()),
            thumbnail_photo_url: "https://example.com/thumb.jpg".to_string(),
            cover_photo_url: "https://example.com/cover.jpg".to_string(),
            cost_per_night: 12345,
            parking_spaces: 2,
            number_of_bathrooms: 3,
            number_of_bedrooms: 4,
            country: "Canada".to_string(),
            street: "536 Namsub Highway".to_string(),
            city: "Sotboske".to_string(),
            province: "Quebec".to_string(),
            post_code: "28142".to_string(),
            active: false,
        };

        let inserted = repo.add_property(property.clone()).await.unwrap();
        assert!(inserted.id > 0);
        assert_eq!(inserted, property.into_property(inserted.id));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn property_for_unknown_owner_is_a_foreign_key_violation() {
        let repo = repository().await;
        let property = NewProperty {
            owner_id: i32::MAX,
            title: "Orphan".to_string(),
            description: None,
            thumbnail_photo_url: String::new(),
            cover_photo_url: String::new(),
            cost_per_night: 100,
            parking_spaces: 0,
            number_of_bathrooms: 1,
            number_of_bedrooms: 1,
            country: String::new(),
            street: String::new(),
            city: "Nowhere".to_string(),
            province: String::new(),
            post_code: String::new(),
            active: true,
        };
        let result = repo.add_property(property).await;
        assert!(matches!(result, Err(DbError::ForeignKeyViolation { .. })));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn rating_floor_applies_to_average() {
        let repo = repository().await;
        let filter = PropertyFilter {
            minimum_rating: Some(dec!(4)),
            ..PropertyFilter::default()
        };
        let listings = repo.get_all_properties(&filter, 10).await.unwrap();
        assert!(listings.iter().all(|l| l.average_rating >= dec!(4)));
    }
}
