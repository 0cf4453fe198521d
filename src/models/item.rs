//! Grocery items on a family's shared list.
//!
//! Items belong to exactly one family and live for the duration of a
//! shopping cycle: created on add, toggled or re-quantified while
//! shopping, deleted on removal. There is no soft-delete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit of measurement for a grocery item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Pcs,
    Kg,
    G,
    Ltr,
    Ml,
    Pack,
    Dozen,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Pcs => "pcs",
            Unit::Kg => "kg",
            Unit::G => "g",
            Unit::Ltr => "ltr",
            Unit::Ml => "ml",
            Unit::Pack => "pack",
            Unit::Dozen => "dozen",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pcs" => Ok(Unit::Pcs),
            "kg" => Ok(Unit::Kg),
            "g" => Ok(Unit::G),
            "ltr" => Ok(Unit::Ltr),
            "ml" => Ok(Unit::Ml),
            "pack" => Ok(Unit::Pack),
            "dozen" => Ok(Unit::Dozen),
            other => Err(format!("unknown unit '{}'", other)),
        }
    }
}

/// A single item on a family's grocery list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroceryItem {
    pub id: String,
    pub family_id: String,
    pub name: String,
    /// Quantity in `unit`, always >= 0
    pub quantity: f64,
    pub unit: Unit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Estimated unit price in the family's currency, >= 0 when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default)]
    pub checked: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl GroceryItem {
    pub fn new(family_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            family_id: family_id.into(),
            name: name.into(),
            quantity: 1.0,
            unit: Unit::Pcs,
            brand: None,
            price: None,
            checked: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_quantity(mut self, quantity: f64, unit: Unit) -> Self {
        self.quantity = quantity;
        self.unit = unit;
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }
}

impl fmt::Display for GroceryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let check = if self.checked { "[x]" } else { "[ ]" };
        write!(f, "{} {:<20} {} {}", check, self.name, self.quantity, self.unit)?;
        if let Some(brand) = &self.brand {
            write!(f, "  ({})", brand)?;
        }
        if let Some(price) = self.price {
            write!(f, "  {:.2}", price)?;
        }
        Ok(())
    }
}
