use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `users` table.
///
/// The password is stored exactly as supplied. It is accepted when reading
/// fixtures but never written back out.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: i32,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

/// The fields required to insert a user. The id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// Rejects blank names and emails before they reach the database.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidInput("name".into(), "must not be empty".into()));
        }
        if self.email.trim().is_empty() {
            return Err(CoreError::InvalidInput("email".into(), "must not be empty".into()));
        }
        Ok(())
    }

    /// Builds the stored record once an id has been assigned.
    pub fn into_user(self, id: i32) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            password: self.password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_email_is_rejected() {
        let user = NewUser::new("Devin Sanders", "  ", "password");
        assert_eq!(
            user.validate(),
            Err(CoreError::InvalidInput("email".into(), "must not be empty".into()))
        );
    }

    #[test]
    fn password_is_not_serialized() {
        let user = NewUser::new("Devin Sanders", "tristanjacobs@gmail.com", "hunter2").into_user(1);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["email"], "tristanjacobs@gmail.com");
    }
}
