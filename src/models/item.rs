//! Inventory item model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Availability of an item, derived from its available counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Available,
    Exhausted,
}

impl ItemStatus {
    pub fn from_available(available: i32) -> Self {
        if available > 0 {
            ItemStatus::Available
        } else {
            ItemStatus::Exhausted
        }
    }
}

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub location_id: i32,
    pub total_stock: i32,
    pub available: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            name: row.name,
            description: row.description,
            location_id: row.location_id,
            total_stock: row.total_stock,
            available: row.available,
            status: ItemStatus::from_available(row.available),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Inventory line with its stock counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Item {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Classroom holding the item
    pub location_id: i32,
    /// Units owned
    pub total_stock: i32,
    /// Units not currently on loan
    pub available: i32,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Units currently reserved by approved or postponed loans
    pub fn on_loan(&self) -> i32 {
        self.total_stock - self.available
    }
}

/// Create item request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItem {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    pub location_id: i32,
    #[validate(range(min = 0, message = "Total stock cannot be negative"))]
    pub total_stock: i32,
}

/// Change the number of units owned
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResizeStock {
    #[validate(range(min = 0, message = "Total stock cannot be negative"))]
    pub total_stock: i32,
}

/// Item query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ItemQuery {
    /// Only items held in this classroom
    pub location_id: Option<i32>,
    /// Case-insensitive name search
    pub q: Option<String>,
}
