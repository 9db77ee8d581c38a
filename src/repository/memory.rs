//! Process-local record store
//!
//! Every item row sits behind its own mutex, so stock operations on one
//! item serialize while different items proceed independently. Locks are
//! never held across an await point.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc, Mutex, MutexGuard, RwLock,
};

use async_trait::async_trait;
use chrono::Utc;

use super::{ItemStore, LoanStore, UserStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        item::{CreateItem, Item, ItemQuery, ItemRow},
        loan::{Loan, LoanChange, LoanFilter, LoanState, NewLoan},
        user::{Role, User},
    },
};

#[derive(Default)]
pub struct MemoryRepository {
    next_id: AtomicI32,
    items: RwLock<HashMap<i32, Arc<Mutex<ItemRow>>>>,
    loans: Mutex<HashMap<i32, Loan>>,
    users: RwLock<HashMap<i32, User>>,
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("in-memory store lock poisoned".to_string())
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register a user (identity is managed outside the loan core)
    pub fn insert_user(&self, name: &str, email: &str, role: Role) -> AppResult<User> {
        let user = User {
            id: self.next_id(),
            name: name.to_string(),
            email: email.to_string(),
            role,
        };
        self.users
            .write()
            .map_err(poisoned)?
            .insert(user.id, user.clone());
        Ok(user)
    }

    fn item_cell(&self, id: i32) -> AppResult<Arc<Mutex<ItemRow>>> {
        self.items
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    /// Lock one item row and apply `f` to it
    fn with_item<T>(&self, id: i32, f: impl FnOnce(&mut ItemRow) -> T) -> AppResult<T> {
        let cell = self.item_cell(id)?;
        let mut row: MutexGuard<'_, ItemRow> = cell.lock().map_err(poisoned)?;
        Ok(f(&mut row))
    }
}

#[async_trait]
impl ItemStore for MemoryRepository {
    async fn ping(&self) -> AppResult<()> {
        self.items.read().map_err(poisoned)?;
        Ok(())
    }

    async fn create_item(&self, data: &CreateItem) -> AppResult<Item> {
        let now = Utc::now();
        let row = ItemRow {
            id: self.next_id(),
            name: data.name.clone(),
            description: data.description.clone(),
            location_id: data.location_id,
            total_stock: data.total_stock,
            available: data.total_stock,
            created_at: now,
            updated_at: now,
        };
        self.items
            .write()
            .map_err(poisoned)?
            .insert(row.id, Arc::new(Mutex::new(row.clone())));
        Ok(row.into())
    }

    async fn get_item(&self, id: i32) -> AppResult<Item> {
        self.with_item(id, |row| Item::from(row.clone()))
    }

    async fn list_items(&self, query: &ItemQuery) -> AppResult<Vec<Item>> {
        let cells: Vec<_> = self.items.read().map_err(poisoned)?.values().cloned().collect();
        let needle = query.q.as_ref().map(|q| q.to_lowercase());

        let mut items = Vec::new();
        for cell in cells {
            let row = cell.lock().map_err(poisoned)?.clone();
            if query.location_id.is_some_and(|id| id != row.location_id) {
                continue;
            }
            if let Some(needle) = &needle {
                if !row.name.to_lowercase().contains(needle) {
                    continue;
                }
            }
            items.push(Item::from(row));
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn reserve_stock(&self, id: i32, qty: i32) -> AppResult<Option<Item>> {
        self.with_item(id, |row| {
            if row.available < qty {
                return None;
            }
            row.available -= qty;
            row.updated_at = Utc::now();
            Some(Item::from(row.clone()))
        })
    }

    async fn release_stock(&self, id: i32, qty: i32) -> AppResult<Item> {
        self.with_item(id, |row| {
            row.available = (row.available + qty).min(row.total_stock);
            row.updated_at = Utc::now();
            Item::from(row.clone())
        })
    }

    async fn resize_stock(&self, id: i32, new_total: i32) -> AppResult<Option<Item>> {
        self.with_item(id, |row| {
            let on_loan = row.total_stock - row.available;
            if new_total < on_loan {
                return None;
            }
            row.total_stock = new_total;
            row.available = new_total - on_loan;
            row.updated_at = Utc::now();
            Some(Item::from(row.clone()))
        })
    }
}

#[async_trait]
impl LoanStore for MemoryRepository {
    async fn insert_loan(&self, loan: &NewLoan) -> AppResult<Loan> {
        let loan = Loan {
            id: self.next_id(),
            requester_id: loan.requester_id,
            item_id: loan.item_id,
            location_id: loan.location_id,
            requested_quantity: loan.requested_quantity,
            state: LoanState::Pending,
            requested_at: loan.requested_at,
            approved_at: None,
            due_at: None,
            returned_at: None,
        };
        self.loans
            .lock()
            .map_err(poisoned)?
            .insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn get_loan(&self, id: i32) -> AppResult<Loan> {
        self.loans
            .lock()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn list_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .loans
            .lock()
            .map_err(poisoned)?
            .values()
            .filter(|loan| filter.matches(loan))
            .cloned()
            .collect();
        loans.sort_by(|a, b| {
            b.requested_at
                .cmp(&a.requested_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(loans)
    }

    async fn commit_transition(
        &self,
        id: i32,
        sources: &[LoanState],
        change: &LoanChange,
    ) -> AppResult<Option<Loan>> {
        let mut loans = self.loans.lock().map_err(poisoned)?;
        match loans.get_mut(&id) {
            Some(stored) if sources.contains(&stored.state) => {
                change.apply(stored);
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_loan(&self, id: i32, deletable: &[LoanState]) -> AppResult<bool> {
        let mut loans = self.loans.lock().map_err(poisoned)?;
        match loans.get(&id) {
            Some(loan) if deletable.contains(&loan.state) => {
                loans.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl UserStore for MemoryRepository {
    async fn get_user(&self, id: i32) -> AppResult<User> {
        self.users
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn list_admins(&self) -> AppResult<Vec<User>> {
        let mut admins: Vec<User> = self
            .users
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|user| user.role == Role::Admin)
            .cloned()
            .collect();
        admins.sort_by_key(|user| user.id);
        Ok(admins)
    }
}
