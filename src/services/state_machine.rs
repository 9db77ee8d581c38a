//! Loan state machine
//!
//! Each call validates and executes exactly one transition. Loan rows are
//! written with a conditional commit: the stored state must still be one the
//! operation accepts, so two racing transitions on the same loan cannot both
//! win. A successful transition publishes its event before returning.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{
    ledger::InventoryLedger,
    notifications::{LoanEventKind, Notifier},
};
use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanChange, LoanOperation},
    repository::LoanStore,
};

#[derive(Clone)]
pub struct LoanStateMachine {
    loans: Arc<dyn LoanStore>,
    ledger: InventoryLedger,
    notifier: Notifier,
}

/// Run a stock-touching transition to completion even if the caller goes away
async fn detached<F, T>(transition: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(transition)
        .await
        .map_err(|e| AppError::Internal(format!("Loan transition task failed: {}", e)))?
}

fn change_for(op: LoanOperation) -> AppResult<LoanChange> {
    op.target()
        .map(LoanChange::new)
        .ok_or_else(|| AppError::Internal(format!("{} has no target state", op)))
}

impl LoanStateMachine {
    pub fn new(loans: Arc<dyn LoanStore>, ledger: InventoryLedger, notifier: Notifier) -> Self {
        Self {
            loans,
            ledger,
            notifier,
        }
    }

    /// Pending -> Approved, reserving the requested quantity
    pub async fn approve(&self, loan: Loan, due_at: Option<DateTime<Utc>>) -> AppResult<Loan> {
        loan.state.check(LoanOperation::Approve)?;
        let due_at = due_at.ok_or_else(|| {
            AppError::Validation("A due date is required to approve a loan".to_string())
        })?;

        let machine = self.clone();
        detached(async move { machine.reserve_then_commit(loan, due_at).await }).await
    }

    async fn reserve_then_commit(&self, loan: Loan, due_at: DateTime<Utc>) -> AppResult<Loan> {
        // Stock first: the loan is never marked approved before the units are held.
        self.ledger
            .reserve(loan.item_id, loan.requested_quantity)
            .await?;

        let change = LoanChange {
            approved_at: Some(Utc::now()),
            due_at: Some(due_at),
            ..change_for(LoanOperation::Approve)?
        };

        let approved = match self.commit(&loan, LoanOperation::Approve, &change).await {
            Ok(approved) => approved,
            Err(err) => {
                tracing::warn!(
                    loan_id = loan.id,
                    item_id = loan.item_id,
                    "Approval commit failed, releasing reservation: {}",
                    err
                );
                if let Err(release_err) = self
                    .ledger
                    .release(loan.item_id, loan.requested_quantity)
                    .await
                {
                    tracing::error!(
                        loan_id = loan.id,
                        item_id = loan.item_id,
                        qty = loan.requested_quantity,
                        "Compensating release failed, stock needs reconciliation: {}",
                        release_err
                    );
                }
                return Err(err);
            }
        };

        tracing::info!(
            loan_id = approved.id,
            item_id = approved.item_id,
            qty = approved.requested_quantity,
            "Loan approved"
        );
        self.notifier.publish(LoanEventKind::LoanApproved, &approved);
        Ok(approved)
    }

    /// Pending -> Rejected
    pub async fn reject(&self, loan: Loan) -> AppResult<Loan> {
        loan.state.check(LoanOperation::Reject)?;

        let change = change_for(LoanOperation::Reject)?;
        let rejected = self.commit(&loan, LoanOperation::Reject, &change).await?;

        tracing::info!(loan_id = rejected.id, "Loan rejected");
        self.notifier.publish(LoanEventKind::LoanRejected, &rejected);
        Ok(rejected)
    }

    /// Approved | Postponed -> Returned, releasing the reserved quantity
    pub async fn return_loan(&self, loan: Loan) -> AppResult<Loan> {
        loan.state.check(LoanOperation::Return)?;

        let machine = self.clone();
        detached(async move { machine.commit_then_release(loan).await }).await
    }

    async fn commit_then_release(&self, loan: Loan) -> AppResult<Loan> {
        let change = LoanChange {
            returned_at: Some(Utc::now()),
            ..change_for(LoanOperation::Return)?
        };

        // State first: if this fails nothing was released.
        let returned = self.commit(&loan, LoanOperation::Return, &change).await?;

        if let Err(err) = self
            .ledger
            .release(returned.item_id, returned.requested_quantity)
            .await
        {
            tracing::error!(
                loan_id = returned.id,
                item_id = returned.item_id,
                qty = returned.requested_quantity,
                "Loan marked returned but stock release failed: {}",
                err
            );
            return Err(err);
        }

        tracing::info!(
            loan_id = returned.id,
            item_id = returned.item_id,
            qty = returned.requested_quantity,
            "Loan returned"
        );
        self.notifier.publish(LoanEventKind::LoanReturned, &returned);
        Ok(returned)
    }

    /// Approved | Postponed -> Postponed with a new due date
    pub async fn postpone(&self, loan: Loan, new_due_at: Option<DateTime<Utc>>) -> AppResult<Loan> {
        loan.state.check(LoanOperation::Postpone)?;
        let new_due_at = new_due_at.ok_or_else(|| {
            AppError::Validation("A new due date is required to postpone a loan".to_string())
        })?;

        let change = LoanChange {
            due_at: Some(new_due_at),
            ..change_for(LoanOperation::Postpone)?
        };
        let postponed = self.commit(&loan, LoanOperation::Postpone, &change).await?;

        tracing::info!(loan_id = postponed.id, due_at = %new_due_at, "Loan postponed");
        self.notifier.publish(LoanEventKind::LoanPostponed, &postponed);
        Ok(postponed)
    }

    /// Remove a loan that never held stock
    pub async fn delete(&self, loan: &Loan) -> AppResult<()> {
        loan.state.check(LoanOperation::Delete)?;

        if !self
            .loans
            .delete_loan(loan.id, LoanOperation::Delete.sources())
            .await?
        {
            return Err(AppError::IllegalTransition(format!(
                "Loan {} changed state and can no longer be deleted",
                loan.id
            )));
        }

        tracing::info!(loan_id = loan.id, "Loan deleted");
        Ok(())
    }

    /// Write `change` if the stored loan is still in a state `op` accepts
    async fn commit(&self, loan: &Loan, op: LoanOperation, change: &LoanChange) -> AppResult<Loan> {
        self.loans
            .commit_transition(loan.id, op.sources(), change)
            .await?
            .ok_or_else(|| {
                AppError::IllegalTransition(format!(
                    "Loan {} changed state, cannot {} it",
                    loan.id, op
                ))
            })
    }
}
