//! Inventory item service

use validator::Validate;

use super::ledger::InventoryLedger;
use crate::{
    error::AppResult,
    models::{
        item::{CreateItem, Item, ItemQuery, ResizeStock},
        user::Caller,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct ItemsService {
    repository: Repository,
    ledger: InventoryLedger,
}

impl ItemsService {
    pub fn new(repository: Repository, ledger: InventoryLedger) -> Self {
        Self { repository, ledger }
    }

    /// Whether the record store answers
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.items.ping().await
    }

    pub async fn list_items(&self, query: &ItemQuery) -> AppResult<Vec<Item>> {
        self.repository.items.list_items(query).await
    }

    pub async fn get_item(&self, id: i32) -> AppResult<Item> {
        self.repository.items.get_item(id).await
    }

    /// Register a new inventory line with all units available
    pub async fn create_item(&self, caller: &Caller, data: CreateItem) -> AppResult<Item> {
        caller.require_admin()?;
        data.validate()?;

        let item = self.repository.items.create_item(&data).await?;
        tracing::info!(item_id = item.id, total_stock = item.total_stock, "Item created");
        Ok(item)
    }

    pub async fn resize_stock(&self, caller: &Caller, id: i32, data: ResizeStock) -> AppResult<Item> {
        caller.require_admin()?;
        data.validate()?;

        self.ledger.resize(id, data.total_stock).await
    }
}
