//! Loan model, lifecycle states and transition rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{item::Item, user::User};
use crate::error::{AppError, AppResult};

/// Lifecycle state of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanState {
    Pending,
    Approved,
    Rejected,
    Returned,
    Postponed,
}

impl LoanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::Pending => "pending",
            LoanState::Approved => "approved",
            LoanState::Rejected => "rejected",
            LoanState::Returned => "returned",
            LoanState::Postponed => "postponed",
        }
    }

    /// Fails with `IllegalTransition` unless `op` may be applied in this state
    pub fn check(self, op: LoanOperation) -> AppResult<()> {
        if op.sources().contains(&self) {
            Ok(())
        } else {
            Err(AppError::IllegalTransition(format!(
                "cannot {} a {} loan",
                op, self
            )))
        }
    }
}

impl std::fmt::Display for LoanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(LoanState::Pending),
            "approved" => Ok(LoanState::Approved),
            "rejected" => Ok(LoanState::Rejected),
            "returned" => Ok(LoanState::Returned),
            "postponed" => Ok(LoanState::Postponed),
            _ => Err(format!("Invalid loan state: {}", s)),
        }
    }
}

// SQLx conversion for LoanState (stored as VARCHAR)
impl sqlx::Type<Postgres> for LoanState {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for LoanState {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanState {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Operations that move a loan through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanOperation {
    Approve,
    Reject,
    Return,
    Postpone,
    Delete,
}

impl LoanOperation {
    /// States from which the operation is legal
    pub fn sources(self) -> &'static [LoanState] {
        match self {
            LoanOperation::Approve | LoanOperation::Reject => &[LoanState::Pending],
            LoanOperation::Return | LoanOperation::Postpone => {
                &[LoanState::Approved, LoanState::Postponed]
            }
            LoanOperation::Delete => &[LoanState::Pending, LoanState::Rejected],
        }
    }

    /// Resulting state, `None` when the loan is removed
    pub fn target(self) -> Option<LoanState> {
        match self {
            LoanOperation::Approve => Some(LoanState::Approved),
            LoanOperation::Reject => Some(LoanState::Rejected),
            LoanOperation::Return => Some(LoanState::Returned),
            LoanOperation::Postpone => Some(LoanState::Postponed),
            LoanOperation::Delete => None,
        }
    }
}

impl std::fmt::Display for LoanOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self {
            LoanOperation::Approve => "approve",
            LoanOperation::Reject => "reject",
            LoanOperation::Return => "return",
            LoanOperation::Postpone => "postpone",
            LoanOperation::Delete => "delete",
        };
        write!(f, "{}", verb)
    }
}

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub requester_id: i32,
    pub item_id: i32,
    /// Classroom the units are delivered to
    pub location_id: i32,
    pub requested_quantity: i32,
    pub state: LoanState,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    /// Expected return date
    pub due_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
}

/// Fields written by one transition; `None` keeps the stored value
#[derive(Debug, Clone, PartialEq)]
pub struct LoanChange {
    pub state: LoanState,
    pub approved_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl LoanChange {
    pub fn new(state: LoanState) -> Self {
        Self {
            state,
            approved_at: None,
            due_at: None,
            returned_at: None,
        }
    }

    pub fn apply(&self, loan: &mut Loan) {
        loan.state = self.state;
        if self.approved_at.is_some() {
            loan.approved_at = self.approved_at;
        }
        if self.due_at.is_some() {
            loan.due_at = self.due_at;
        }
        if self.returned_at.is_some() {
            loan.returned_at = self.returned_at;
        }
    }
}

/// Fields of a loan about to be inserted
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub requester_id: i32,
    pub item_id: i32,
    pub location_id: i32,
    pub requested_quantity: i32,
    pub requested_at: DateTime<Utc>,
}

/// Loan with the records a notification needs
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    pub loan: Loan,
    pub item: Item,
    pub requester: User,
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    pub item_id: i32,
    pub location_id: i32,
    #[validate(range(min = 1, message = "Requested quantity must be at least 1"))]
    pub requested_quantity: i32,
}

/// Approve loan request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveLoan {
    /// Expected return date (ISO 8601)
    pub due_at: Option<DateTime<Utc>>,
}

/// Delay loan request
#[derive(Debug, Deserialize, ToSchema)]
pub struct DelayLoan {
    /// New expected return date (ISO 8601)
    pub new_due_at: Option<DateTime<Utc>>,
}

/// Loan query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    /// Only loans in this state
    pub state: Option<LoanState>,
}

/// Store-level loan filter
#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    pub requester_id: Option<i32>,
    pub state: Option<LoanState>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
}

impl LoanFilter {
    pub fn matches(&self, loan: &Loan) -> bool {
        if self.requester_id.is_some_and(|id| id != loan.requester_id) {
            return false;
        }
        if self.state.is_some_and(|state| state != loan.state) {
            return false;
        }
        if let Some(from) = self.due_from {
            if !loan.due_at.is_some_and(|due| due >= from) {
                return false;
            }
        }
        if let Some(to) = self.due_to {
            if !loan.due_at.is_some_and(|due| due <= to) {
                return false;
            }
        }
        true
    }
}
