//! Items repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::ItemStore;
use crate::{
    error::{AppError, AppResult},
    models::item::{CreateItem, Item, ItemQuery, ItemRow},
};

const ITEM_COLUMNS: &str =
    "id, name, description, location_id, total_stock, available, created_at, updated_at";

#[derive(Clone)]
pub struct ItemsRepository {
    pool: Pool<Postgres>,
}

impl ItemsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemStore for ItemsRepository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create an item with every unit available
    async fn create_item(&self, data: &CreateItem) -> AppResult<Item> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO items (name, description, location_id, total_stock, available, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4, $5, $5)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.location_id)
        .bind(data.total_stock)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// Get item by ID
    async fn get_item(&self, id: i32) -> AppResult<Item> {
        sqlx::query_as::<_, ItemRow>(&format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Item::from)
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    /// List items, optionally by classroom and name
    async fn list_items(&self, query: &ItemQuery) -> AppResult<Vec<Item>> {
        let pattern = query.q.as_ref().map(|q| format!("%{}%", q));

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {}
            FROM items
            WHERE ($1::int IS NULL OR location_id = $1)
              AND ($2::text IS NULL OR name ILIKE $2)
            ORDER BY name
            "#,
            ITEM_COLUMNS
        ))
        .bind(query.location_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn reserve_stock(&self, id: i32, qty: i32) -> AppResult<Option<Item>> {
        // Check and decrement in one statement: the row lock taken by the
        // UPDATE serializes concurrent reservations on the same item.
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            UPDATE items
            SET available = available - $2, updated_at = NOW()
            WHERE id = $1 AND available >= $2
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(id)
        .bind(qty)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.into())),
            None => {
                // Distinguish a missing item from a short one
                self.get_item(id).await?;
                Ok(None)
            }
        }
    }

    async fn release_stock(&self, id: i32, qty: i32) -> AppResult<Item> {
        sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            UPDATE items
            SET available = LEAST(available + $2, total_stock), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(id)
        .bind(qty)
        .fetch_optional(&self.pool)
        .await?
        .map(Item::from)
        .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    async fn resize_stock(&self, id: i32, new_total: i32) -> AppResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            UPDATE items
            SET available = $2 - (total_stock - available),
                total_stock = $2,
                updated_at = NOW()
            WHERE id = $1 AND $2 >= total_stock - available
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(id)
        .bind(new_total)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.into())),
            None => {
                self.get_item(id).await?;
                Ok(None)
            }
        }
    }
}
