//! Business logic services

pub mod email;
pub mod items;
pub mod ledger;
pub mod loans;
pub mod notifications;
pub mod reminders;
pub mod state_machine;

use crate::repository::Repository;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub items: items::ItemsService,
    pub loans: loans::LoansService,
    pub notifier: notifications::Notifier,
}

impl Services {
    /// Wire the ledger, state machine and services over one repository
    pub fn new(repository: Repository, notifier: notifications::Notifier) -> Self {
        let ledger = ledger::InventoryLedger::new(repository.items.clone());
        let machine = state_machine::LoanStateMachine::new(
            repository.loans.clone(),
            ledger.clone(),
            notifier.clone(),
        );

        Self {
            items: items::ItemsService::new(repository.clone(), ledger),
            loans: loans::LoansService::new(repository, machine, notifier.clone()),
            notifier,
        }
    }
}
