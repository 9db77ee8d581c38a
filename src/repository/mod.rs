//! Repository layer: record store traits and their backends
//!
//! The loan core only talks to the traits below. PostgreSQL backends live
//! in `items`, `loans` and `users`; `memory` holds a process-local store.

pub mod items;
pub mod loans;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        item::{CreateItem, Item, ItemQuery},
        loan::{Loan, LoanChange, LoanFilter, LoanState, NewLoan},
        user::User,
    },
};

/// Item records and their stock counters.
///
/// The three stock methods are the only writers of `available` and
/// `total_stock`; each must be atomic with respect to the item it touches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Cheap round trip proving the backing store answers
    async fn ping(&self) -> AppResult<()>;

    async fn create_item(&self, data: &CreateItem) -> AppResult<Item>;

    async fn get_item(&self, id: i32) -> AppResult<Item>;

    async fn list_items(&self, query: &ItemQuery) -> AppResult<Vec<Item>>;

    /// Subtract `qty` from `available` if at least `qty` units are available.
    /// Returns `Ok(None)` without mutating anything otherwise.
    async fn reserve_stock(&self, id: i32, qty: i32) -> AppResult<Option<Item>>;

    /// Add `qty` back to `available`, capped at `total_stock`.
    async fn release_stock(&self, id: i32, qty: i32) -> AppResult<Item>;

    /// Set `total_stock` to `new_total`, keeping the on-loan units reserved.
    /// Returns `Ok(None)` when `new_total` is below the units on loan.
    async fn resize_stock(&self, id: i32, new_total: i32) -> AppResult<Option<Item>>;
}

/// Loan records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn insert_loan(&self, loan: &NewLoan) -> AppResult<Loan>;

    async fn get_loan(&self, id: i32) -> AppResult<Loan>;

    /// Matching loans, newest request first
    async fn list_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>>;

    /// Apply `change` only if the stored row is in one of `sources`.
    /// Returns the updated row, or `Ok(None)` when the loan is gone or has
    /// moved to a state the transition does not accept.
    async fn commit_transition(
        &self,
        id: i32,
        sources: &[LoanState],
        change: &LoanChange,
    ) -> AppResult<Option<Loan>>;

    /// Delete the loan only if it is in one of `deletable`.
    /// Returns `Ok(false)` when it is not.
    async fn delete_loan(&self, id: i32, deletable: &[LoanState]) -> AppResult<bool>;
}

/// Read access to users for notifications
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: i32) -> AppResult<User>;

    async fn list_admins(&self) -> AppResult<Vec<User>>;
}

/// Handles to every record store
#[derive(Clone)]
pub struct Repository {
    pub items: Arc<dyn ItemStore>,
    pub loans: Arc<dyn LoanStore>,
    pub users: Arc<dyn UserStore>,
}

impl Repository {
    /// Repository backed by PostgreSQL
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            items: Arc::new(items::ItemsRepository::new(pool.clone())),
            loans: Arc::new(loans::LoansRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool)),
        }
    }

    /// Repository backed by a process-local store
    pub fn memory(store: memory::MemoryRepository) -> Self {
        let store = Arc::new(store);
        Self {
            items: store.clone(),
            loans: store.clone(),
            users: store,
        }
    }
}
