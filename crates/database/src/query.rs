//! Property search statement builder.
//!
//! The search statement is assembled from an ordered list of predicates.
//! Only filters that are actually set contribute a predicate, and every
//! placeholder number comes from the statement's own parameter list, so
//! `$n` always lines up with the n-th bound value.

use rust_decimal::Decimal;

/// Number of rows returned when the caller does not ask for a limit.
pub const DEFAULT_LIMIT: i64 = 10;

const SEARCH_BASE: &str = "SELECT properties.*, avg(property_reviews.rating) AS average_rating
FROM properties
JOIN property_reviews ON properties.id = property_reviews.property_id";

/// Optional search options for property listings. All of them combine.
///
/// Prices are whole currency units; the store keeps cents. Blank cities and
/// zero-valued numbers are treated as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFilter {
    pub city: Option<String>,
    pub owner_id: Option<i32>,
    pub minimum_price_per_night: Option<u32>,
    pub maximum_price_per_night: Option<u32>,
    pub minimum_rating: Option<Decimal>,
}

impl PropertyFilter {
    pub fn city_term(&self) -> Option<&str> {
        self.city.as_deref().map(str::trim).filter(|city| !city.is_empty())
    }

    pub fn owner(&self) -> Option<i32> {
        self.owner_id.filter(|id| *id != 0)
    }

    pub fn price_floor_cents(&self) -> Option<i64> {
        to_cents(self.minimum_price_per_night)
    }

    pub fn price_ceiling_cents(&self) -> Option<i64> {
        to_cents(self.maximum_price_per_night)
    }

    pub fn rating_floor(&self) -> Option<Decimal> {
        self.minimum_rating.filter(|rating| !rating.is_zero())
    }

    /// The `WHERE` predicates in evaluation order: city, owner, minimum
    /// price, maximum price.
    fn predicates(&self) -> Vec<Predicate> {
        let candidates = [
            self.city_term().map(|city| Predicate {
                column: "city",
                operator: Operator::ILike,
                value: SqlParam::Text(format!("%{city}%")),
            }),
            self.owner().map(|owner| Predicate {
                column: "owner_id",
                operator: Operator::Eq,
                value: SqlParam::Int(owner),
            }),
            self.price_floor_cents().map(|cents| Predicate {
                column: "cost_per_night",
                operator: Operator::Gte,
                value: SqlParam::BigInt(cents),
            }),
            self.price_ceiling_cents().map(|cents| Predicate {
                column: "cost_per_night",
                operator: Operator::Lte,
                value: SqlParam::BigInt(cents),
            }),
        ];
        candidates.into_iter().flatten().collect()
    }
}

fn to_cents(units: Option<u32>) -> Option<i64> {
    units.filter(|units| *units != 0).map(|units| i64::from(units) * 100)
}

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i32),
    BigInt(i64),
    Decimal(Decimal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Gte,
    Lte,
    ILike,
}

impl Operator {
    fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::ILike => "ILIKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Predicate {
    column: &'static str,
    operator: Operator,
    value: SqlParam,
}

/// A rendered statement and its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl PropertyQuery {
    /// Builds the filtered, rating-aggregated search statement.
    pub fn build(filter: &PropertyFilter, limit: i64) -> Self {
        let mut query = PropertyQuery {
            sql: SEARCH_BASE.to_string(),
            params: Vec::new(),
        };

        for (position, predicate) in filter.predicates().into_iter().enumerate() {
            let keyword = if position == 0 { "WHERE" } else { "AND" };
            let placeholder = query.bind(predicate.value);
            query.sql.push_str(&format!(
                "\n{keyword} {} {} {placeholder}",
                predicate.column,
                predicate.operator.as_sql()
            ));
        }

        query.sql.push_str("\nGROUP BY properties.id");

        if let Some(rating) = filter.rating_floor() {
            let placeholder = query.bind(SqlParam::Decimal(rating));
            query
                .sql
                .push_str(&format!("\nHAVING avg(property_reviews.rating) >= {placeholder}"));
        }

        let placeholder = query.bind(SqlParam::BigInt(limit));
        query
            .sql
            .push_str(&format!("\nORDER BY cost_per_night\nLIMIT {placeholder}"));

        query
    }

    /// Records a parameter and returns the placeholder that refers to it.
    fn bind(&mut self, value: SqlParam) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn no_filters_only_binds_the_limit() {
        let query = PropertyQuery::build(&PropertyFilter::default(), DEFAULT_LIMIT);

        assert!(!query.sql.contains("WHERE"));
        assert!(!query.sql.contains("HAVING"));
        assert!(query.sql.ends_with("GROUP BY properties.id\nORDER BY cost_per_night\nLIMIT $1"));
        assert_eq!(query.params, vec![SqlParam::BigInt(10)]);
    }

    #[test]
    fn every_filter_numbers_placeholders_in_order() {
        let filter = PropertyFilter {
            city: Some("Vancouver".to_string()),
            owner_id: Some(4),
            minimum_price_per_night: Some(50),
            maximum_price_per_night: Some(150),
            minimum_rating: Some(dec!(4)),
        };
        let query = PropertyQuery::build(&filter, 5);

        let expected = format!(
            "{SEARCH_BASE}
WHERE city ILIKE $1
AND owner_id = $2
AND cost_per_night >= $3
AND cost_per_night <= $4
GROUP BY properties.id
HAVING avg(property_reviews.rating) >= $5
ORDER BY cost_per_night
LIMIT $6"
        );
        assert_eq!(query.sql, expected);
        assert_eq!(
            query.params,
            vec![
                SqlParam::Text("%Vancouver%".to_string()),
                SqlParam::Int(4),
                SqlParam::BigInt(5000),
                SqlParam::BigInt(15000),
                SqlParam::Decimal(dec!(4)),
                SqlParam::BigInt(5),
            ]
        );
    }

    #[test]
    fn numbering_is_dense_over_present_filters() {
        let filter = PropertyFilter {
            owner_id: Some(2),
            maximum_price_per_night: Some(300),
            ..PropertyFilter::default()
        };
        let query = PropertyQuery::build(&filter, DEFAULT_LIMIT);

        assert!(query.sql.contains("\nWHERE owner_id = $1\nAND cost_per_night <= $2\n"));
        assert!(query.sql.ends_with("LIMIT $3"));
        assert_eq!(
            query.params,
            vec![SqlParam::Int(2), SqlParam::BigInt(30000), SqlParam::BigInt(10)]
        );
    }

    #[test]
    fn first_present_filter_opens_where_even_if_not_city() {
        let filter = PropertyFilter {
            minimum_price_per_night: Some(80),
            ..PropertyFilter::default()
        };
        let query = PropertyQuery::build(&filter, DEFAULT_LIMIT);
        assert!(query.sql.contains("\nWHERE cost_per_night >= $1\n"));
        assert!(!query.sql.contains("AND"));
    }

    #[test]
    fn rating_alone_uses_having_without_where() {
        let filter = PropertyFilter {
            minimum_rating: Some(dec!(4.5)),
            ..PropertyFilter::default()
        };
        let query = PropertyQuery::build(&filter, 3);

        assert!(!query.sql.contains("WHERE"));
        assert!(query.sql.contains(
            "GROUP BY properties.id\nHAVING avg(property_reviews.rating) >= $1\nORDER BY"
        ));
        assert_eq!(query.params, vec![SqlParam::Decimal(dec!(4.5)), SqlParam::BigInt(3)]);
    }

    #[test]
    fn blank_and_zero_values_count_as_unset() {
        let filter = PropertyFilter {
            city: Some("   ".to_string()),
            owner_id: Some(0),
            minimum_price_per_night: Some(0),
            maximum_price_per_night: None,
            minimum_rating: Some(Decimal::ZERO),
        };
        let query = PropertyQuery::build(&filter, DEFAULT_LIMIT);
        assert_eq!(query, PropertyQuery::build(&PropertyFilter::default(), DEFAULT_LIMIT));
    }

    #[test]
    fn city_is_trimmed_and_wrapped_in_wildcards() {
        let filter = PropertyFilter {
            city: Some(" van ".to_string()),
            ..PropertyFilter::default()
        };
        let query = PropertyQuery::build(&filter, DEFAULT_LIMIT);
        assert_eq!(query.params[0], SqlParam::Text("%van%".to_string()));
    }
}
