//! Loan management service
//!
//! Public operation surface for loans. Every operation checks the caller's
//! capability once and delegates to the state machine, which publishes the
//! matching notification event once a transition is committed.

use chrono::{DateTime, Duration, Utc};
use validator::Validate;

use super::{
    notifications::{LoanEventKind, Notifier},
    state_machine::LoanStateMachine,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{CreateLoan, Loan, LoanFilter, LoanQuery, LoanState, NewLoan},
        user::{Caller, Role},
    },
    repository::Repository,
};

/// What an operation requires of its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capability {
    /// Ask to borrow items
    Request,
    /// Decide on, close and delete loans
    Administer,
}

fn authorize(caller: &Caller, capability: Capability) -> AppResult<()> {
    let allowed = match capability {
        Capability::Request => caller.role == Role::Requester,
        Capability::Administer => caller.is_admin(),
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role {} cannot {}",
            caller.role,
            match capability {
                Capability::Request => "request loans",
                Capability::Administer => "manage loans",
            }
        )))
    }
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    machine: LoanStateMachine,
    notifier: Notifier,
}

impl LoansService {
    pub fn new(repository: Repository, machine: LoanStateMachine, notifier: Notifier) -> Self {
        Self {
            repository,
            machine,
            notifier,
        }
    }

    /// Create a pending loan request.
    ///
    /// The quantity is checked against the item's total stock only; current
    /// availability is checked when the loan is approved.
    pub async fn create_loan(&self, caller: &Caller, request: CreateLoan) -> AppResult<Loan> {
        authorize(caller, Capability::Request)?;
        request.validate()?;

        let item = self.repository.items.get_item(request.item_id).await?;
        if request.requested_quantity > item.total_stock {
            return Err(AppError::Validation(format!(
                "Requested quantity {} exceeds the {} unit(s) owned of item {}",
                request.requested_quantity, item.total_stock, item.id
            )));
        }

        let loan = self
            .repository
            .loans
            .insert_loan(&NewLoan {
                requester_id: caller.user_id,
                item_id: request.item_id,
                location_id: request.location_id,
                requested_quantity: request.requested_quantity,
                requested_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            loan_id = loan.id,
            requester_id = loan.requester_id,
            item_id = loan.item_id,
            qty = loan.requested_quantity,
            "Loan requested"
        );
        self.notifier.publish(LoanEventKind::LoanCreated, &loan);
        Ok(loan)
    }

    pub async fn approve_loan(
        &self,
        caller: &Caller,
        loan_id: i32,
        due_at: Option<DateTime<Utc>>,
    ) -> AppResult<Loan> {
        authorize(caller, Capability::Administer)?;
        let loan = self.repository.loans.get_loan(loan_id).await?;

        self.machine.approve(loan, due_at).await.map_err(|e| {
            tracing::warn!(loan_id, "Approval refused: {}", e);
            e
        })
    }

    pub async fn reject_loan(&self, caller: &Caller, loan_id: i32) -> AppResult<Loan> {
        authorize(caller, Capability::Administer)?;
        let loan = self.repository.loans.get_loan(loan_id).await?;

        self.machine.reject(loan).await
    }

    pub async fn return_loan(&self, caller: &Caller, loan_id: i32) -> AppResult<Loan> {
        authorize(caller, Capability::Administer)?;
        let loan = self.repository.loans.get_loan(loan_id).await?;

        self.machine.return_loan(loan).await
    }

    pub async fn delay_loan(
        &self,
        caller: &Caller,
        loan_id: i32,
        new_due_at: Option<DateTime<Utc>>,
    ) -> AppResult<Loan> {
        authorize(caller, Capability::Administer)?;
        let loan = self.repository.loans.get_loan(loan_id).await?;

        self.machine.postpone(loan, new_due_at).await
    }

    /// Delete a pending or rejected loan
    pub async fn delete_loan(&self, caller: &Caller, loan_id: i32) -> AppResult<()> {
        authorize(caller, Capability::Administer)?;
        let loan = self.repository.loans.get_loan(loan_id).await?;

        self.machine.delete(&loan).await
    }

    /// All loans for admins, the caller's own loans otherwise
    pub async fn list_loans(&self, caller: &Caller, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        let filter = LoanFilter {
            requester_id: (!caller.is_admin()).then_some(caller.user_id),
            state: query.state,
            ..Default::default()
        };
        self.repository.loans.list_loans(&filter).await
    }

    pub async fn get_loan(&self, caller: &Caller, loan_id: i32) -> AppResult<Loan> {
        let loan = self.repository.loans.get_loan(loan_id).await?;
        if !caller.can_view(loan.requester_id) {
            return Err(AppError::Forbidden(format!(
                "Loan {} belongs to another user",
                loan_id
            )));
        }
        Ok(loan)
    }

    /// Approved loans due between `now` and `now + window`
    pub async fn due_soon(&self, now: DateTime<Utc>, window: Duration) -> AppResult<Vec<Loan>> {
        self.repository
            .loans
            .list_loans(&LoanFilter {
                state: Some(LoanState::Approved),
                due_from: Some(now),
                due_to: Some(now + window),
                ..Default::default()
            })
            .await
    }
}
