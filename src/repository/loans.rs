//! Loans repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::LoanStore;
use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanChange, LoanFilter, LoanState, NewLoan},
};

const LOAN_COLUMNS: &str = "id, requester_id, item_id, location_id, requested_quantity, state, \
                            requested_at, approved_at, due_at, returned_at";

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanStore for LoansRepository {
    /// Create a new pending loan
    async fn insert_loan(&self, loan: &NewLoan) -> AppResult<Loan> {
        let row = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (requester_id, item_id, location_id, requested_quantity, state, requested_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(loan.requester_id)
        .bind(loan.item_id)
        .bind(loan.location_id)
        .bind(loan.requested_quantity)
        .bind(LoanState::Pending)
        .bind(loan.requested_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Get loan by ID
    async fn get_loan(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(&format!("SELECT {} FROM loans WHERE id = $1", LOAN_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn list_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            r#"
            SELECT {}
            FROM loans
            WHERE ($1::int IS NULL OR requester_id = $1)
              AND ($2::varchar IS NULL OR state = $2)
              AND ($3::timestamptz IS NULL OR due_at >= $3)
              AND ($4::timestamptz IS NULL OR due_at <= $4)
            ORDER BY requested_at DESC, id DESC
            "#,
            LOAN_COLUMNS
        ))
        .bind(filter.requester_id)
        .bind(filter.state)
        .bind(filter.due_from)
        .bind(filter.due_to)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn commit_transition(
        &self,
        id: i32,
        sources: &[LoanState],
        change: &LoanChange,
    ) -> AppResult<Option<Loan>> {
        let states: Vec<&str> = sources.iter().map(LoanState::as_str).collect();

        let row = sqlx::query_as::<_, Loan>(&format!(
            r#"
            UPDATE loans
            SET state = $2,
                approved_at = COALESCE($3, approved_at),
                due_at = COALESCE($4, due_at),
                returned_at = COALESCE($5, returned_at)
            WHERE id = $1 AND state = ANY($6)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(id)
        .bind(change.state)
        .bind(change.approved_at)
        .bind(change.due_at)
        .bind(change.returned_at)
        .bind(states)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete_loan(&self, id: i32, deletable: &[LoanState]) -> AppResult<bool> {
        let states: Vec<&str> = deletable.iter().map(LoanState::as_str).collect();

        let result = sqlx::query("DELETE FROM loans WHERE id = $1 AND state = ANY($2)")
            .bind(id)
            .bind(states)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
