//! Data models for the inventory loans server

pub mod item;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use item::{Item, ItemStatus};
pub use loan::{Loan, LoanDetails, LoanOperation, LoanState};
pub use user::{Caller, Role, User};
