use serde::Serialize;

/// The outcome of a single-record read.
///
/// Absence is an ordinary answer, not an error. Paired with
/// `Result<Lookup<T>, DbError>` a caller sees three distinct cases: found,
/// not found, and failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_serializes_as_null() {
        let missing: Lookup<i32> = Lookup::NotFound;
        assert_eq!(serde_json::to_string(&missing).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Lookup::Found(3)).unwrap(), "3");
    }

    #[test]
    fn option_converts_both_ways() {
        let found: Lookup<i32> = Some(2).into();
        assert!(found.is_found());
        assert_eq!(found.into_option(), Some(2));
        assert_eq!(Lookup::<i32>::from(None).into_option(), None);
    }
}
