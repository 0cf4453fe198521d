use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named group of users sharing one grocery list and currency setting.
///
/// Owned by its creator. The document store keys families by a
/// server-assigned id; `owner_id` links back to the creating user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: String,
    pub name: String,
    /// ISO 4217 currency code used for price display (e.g., "USD")
    pub currency: String,
    pub owner_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Family {
    pub fn new(
        name: impl Into<String>,
        currency: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            currency: currency.into(),
            owner_id: owner_id.into(),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.currency)
    }
}
