//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::loan::{ApproveLoan, CreateLoan, DelayLoan, Loan, LoanQuery},
    AppState,
};

use super::AuthenticatedUser;

/// List loans (all for admins, own loans otherwise)
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans, newest first", body = Vec<Loan>)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list_loans(&caller, &query).await?;
    Ok(Json(loans))
}

/// Request a loan
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan requested", body = Loan),
        (status = 400, description = "Invalid quantity"),
        (status = 403, description = "Caller cannot request loans"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state.services.loans.create_loan(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Get a loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan", body = Loan),
        (status = 403, description = "Loan belongs to another user"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get_loan(&caller, loan_id).await?;
    Ok(Json(loan))
}

/// Approve a pending loan, reserving its units
#[utoipa::path(
    post,
    path = "/loans/{id}/approve",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = ApproveLoan,
    responses(
        (status = 200, description = "Loan approved", body = Loan),
        (status = 400, description = "Missing due date"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan not pending or insufficient stock")
    )
)]
pub async fn approve_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<ApproveLoan>,
) -> AppResult<Json<Loan>> {
    let loan = state
        .services
        .loans
        .approve_loan(&caller, loan_id, request.due_at)
        .await?;
    Ok(Json(loan))
}

/// Reject a pending loan
#[utoipa::path(
    post,
    path = "/loans/{id}/reject",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan rejected", body = Loan),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan not pending")
    )
)]
pub async fn reject_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.reject_loan(&caller, loan_id).await?;
    Ok(Json(loan))
}

/// Register the return of a loan, releasing its units
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan returned", body = Loan),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan not on loan")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.return_loan(&caller, loan_id).await?;
    Ok(Json(loan))
}

/// Postpone the due date of a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/delay",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = DelayLoan,
    responses(
        (status = 200, description = "Loan postponed", body = Loan),
        (status = 400, description = "Missing new due date"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan not on loan")
    )
)]
pub async fn delay_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<DelayLoan>,
) -> AppResult<Json<Loan>> {
    let loan = state
        .services
        .loans
        .delay_loan(&caller, loan_id, request.new_due_at)
        .await?;
    Ok(Json(loan))
}

/// Delete a pending or rejected loan
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 204, description = "Loan deleted"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan holds stock or is closed")
    )
)]
pub async fn delete_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.loans.delete_loan(&caller, loan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
