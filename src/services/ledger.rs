//! Inventory ledger: the only writer of item stock counters

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::item::Item,
    repository::ItemStore,
};

#[derive(Clone)]
pub struct InventoryLedger {
    items: Arc<dyn ItemStore>,
}

fn ensure_positive(qty: i32) -> AppResult<()> {
    if qty < 1 {
        return Err(AppError::Validation(format!(
            "Quantity must be at least 1 (got {})",
            qty
        )));
    }
    Ok(())
}

impl InventoryLedger {
    pub fn new(items: Arc<dyn ItemStore>) -> Self {
        Self { items }
    }

    /// Take `qty` units out of the item's available stock.
    ///
    /// Fails with `InsufficientStock`, leaving the item untouched, when fewer
    /// than `qty` units are available at the moment of the reservation.
    pub async fn reserve(&self, item_id: i32, qty: i32) -> AppResult<Item> {
        ensure_positive(qty)?;

        match self.items.reserve_stock(item_id, qty).await? {
            Some(item) => {
                tracing::debug!(
                    item_id,
                    qty,
                    available = item.available,
                    "Reserved stock"
                );
                Ok(item)
            }
            None => {
                let item = self.items.get_item(item_id).await?;
                Err(AppError::InsufficientStock(format!(
                    "Item {} has {} unit(s) available, {} requested",
                    item_id, item.available, qty
                )))
            }
        }
    }

    /// Give `qty` units back to the item, never exceeding its total stock
    pub async fn release(&self, item_id: i32, qty: i32) -> AppResult<Item> {
        ensure_positive(qty)?;

        let item = self.items.release_stock(item_id, qty).await?;
        tracing::debug!(
            item_id,
            qty,
            available = item.available,
            "Released stock"
        );
        Ok(item)
    }

    /// Change the number of units the item owns.
    ///
    /// Units currently on loan stay reserved, so the new total cannot be
    /// lower than them.
    pub async fn resize(&self, item_id: i32, new_total: i32) -> AppResult<Item> {
        if new_total < 0 {
            return Err(AppError::Validation(
                "Total stock cannot be negative".to_string(),
            ));
        }

        match self.items.resize_stock(item_id, new_total).await? {
            Some(item) => {
                tracing::info!(
                    item_id,
                    total_stock = item.total_stock,
                    available = item.available,
                    "Resized item stock"
                );
                Ok(item)
            }
            None => {
                let item = self.items.get_item(item_id).await?;
                Err(AppError::Validation(format!(
                    "Cannot lower total stock of item {} to {}: {} unit(s) are on loan",
                    item_id,
                    new_total,
                    item.on_loan()
                )))
            }
        }
    }
}
