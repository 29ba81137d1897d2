//! # LightBnB Database Crate
//!
//! This crate is the application's data-access layer over PostgreSQL. It
//! reads and writes users, reservations and property listings.
//!
//! ## Architectural Principles
//!
//! - **Injected pool:** `DbRepository` receives a `PgPool` at construction.
//!   There is no global connection; clone the pool to share it.
//! - **Traits at the seam:** callers depend on `UserRepository`,
//!   `ReservationRepository` and `PropertyRepository`. `FixtureStore` is an
//!   in-memory implementation seeded from JSON, used for offline runs and tests.
//! - **Typed outcomes:** single-record reads return `Lookup<T>`, so "not found"
//!   is never confused with a failure. Failures are `DbError`.
//!
//! ## Public API
//!
//! - `connect`: The async function to establish the database connection pool.
//! - `PropertyQuery`: Renders the filtered property search statement.
//! - `DbRepository` / `FixtureStore`: The two repository implementations.
//! - `DbError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod fixtures;
pub mod lookup;
pub mod query;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, connect_options};
pub use error::DbError;
pub use fixtures::FixtureStore;
pub use lookup::Lookup;
pub use query::{PropertyFilter, PropertyQuery, SqlParam, DEFAULT_LIMIT};
pub use repository::{DbRepository, PropertyRepository, ReservationRepository, UserRepository};
