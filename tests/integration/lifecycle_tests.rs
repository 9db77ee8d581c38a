//! Loan lifecycle through the service layer

use chrono::{Duration, Utc};
use tokio_test::{assert_err, assert_ok};

use inventory_loans::{
    models::{
        item::{ItemStatus, ResizeStock},
        loan::{CreateLoan, LoanQuery, LoanState},
    },
    services::notifications::LoanEventKind,
    AppError,
};

use crate::common::{in_days, Harness};

#[tokio::test]
async fn test_full_lifecycle_restores_stock() {
    let h = Harness::new();
    let item = h.item("Projector", 10).await;
    assert_eq!(item.available, 10);
    assert_eq!(item.status, ItemStatus::Available);

    let loan = h.request(&item, 4).await;
    assert_eq!(loan.state, LoanState::Pending);
    assert_eq!(loan.requester_id, h.requester.user_id);
    assert_eq!(h.stock(&item).await.available, 10);

    let due = in_days(7);
    let approved = assert_ok!(h.services.loans.approve_loan(&h.admin, loan.id, Some(due)).await);
    assert_eq!(approved.state, LoanState::Approved);
    assert_eq!(approved.due_at, Some(due));
    assert!(approved.approved_at.is_some());
    assert_eq!(h.stock(&item).await.available, 6);

    let postponed = assert_ok!(
        h.services
            .loans
            .delay_loan(&h.admin, loan.id, Some(in_days(14)))
            .await
    );
    assert_eq!(postponed.state, LoanState::Postponed);
    assert_eq!(h.stock(&item).await.available, 6);

    let returned = assert_ok!(h.services.loans.return_loan(&h.admin, loan.id).await);
    assert_eq!(returned.state, LoanState::Returned);
    assert!(returned.returned_at.is_some());

    let stock = h.stock(&item).await;
    assert_eq!(stock.available, 10);
    assert_eq!(stock.total_stock, 10);
}

#[tokio::test]
async fn test_approval_beyond_availability_leaves_loan_pending() {
    let h = Harness::new();
    let item = h.item("Tablet", 5).await;

    let first = h.request(&item, 4).await;
    let second = h.request(&item, 3).await;

    assert_ok!(h.services.loans.approve_loan(&h.admin, first.id, Some(in_days(3))).await);

    let err = assert_err!(
        h.services
            .loans
            .approve_loan(&h.admin, second.id, Some(in_days(3)))
            .await
    );
    assert!(matches!(err, AppError::InsufficientStock(_)));

    let stored = h.services.loans.get_loan(&h.admin, second.id).await.unwrap();
    assert_eq!(stored.state, LoanState::Pending);
    assert_eq!(h.stock(&item).await.available, 1);
}

#[tokio::test]
async fn test_exhausted_item_status() {
    let h = Harness::new();
    let item = h.item("Microscope", 2).await;
    let loan = h.request(&item, 2).await;

    h.services
        .loans
        .approve_loan(&h.admin, loan.id, Some(in_days(1)))
        .await
        .unwrap();

    let stock = h.stock(&item).await;
    assert_eq!(stock.available, 0);
    assert_eq!(stock.status, ItemStatus::Exhausted);

    h.services.loans.return_loan(&h.admin, loan.id).await.unwrap();
    assert_eq!(h.stock(&item).await.status, ItemStatus::Available);
}

#[tokio::test]
async fn test_request_larger_than_total_stock_is_refused() {
    let h = Harness::new();
    let item = h.item("Camera", 3).await;

    let result = h
        .services
        .loans
        .create_loan(
            &h.requester,
            CreateLoan {
                item_id: item.id,
                location_id: 1,
                requested_quantity: 4,
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let zero = h
        .services
        .loans
        .create_loan(
            &h.requester,
            CreateLoan {
                item_id: item.id,
                location_id: 1,
                requested_quantity: 0,
            },
        )
        .await;
    assert!(matches!(zero, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_request_for_unknown_item() {
    let h = Harness::new();
    let result = h
        .services
        .loans
        .create_loan(
            &h.requester,
            CreateLoan {
                item_id: 999,
                location_id: 1,
                requested_quantity: 1,
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_second_reject_is_illegal() {
    let h = Harness::new();
    let item = h.item("Laptop", 3).await;
    let loan = h.request(&item, 1).await;

    let rejected = h.services.loans.reject_loan(&h.admin, loan.id).await.unwrap();
    assert_eq!(rejected.state, LoanState::Rejected);

    let err = assert_err!(h.services.loans.reject_loan(&h.admin, loan.id).await);
    assert!(matches!(err, AppError::IllegalTransition(_)));

    let err = assert_err!(
        h.services
            .loans
            .approve_loan(&h.admin, loan.id, Some(in_days(2)))
            .await
    );
    assert!(matches!(err, AppError::IllegalTransition(_)));
    assert_eq!(h.stock(&item).await.available, 3);
}

#[tokio::test]
async fn test_return_twice_releases_once() {
    let h = Harness::new();
    let item = h.item("Speaker", 4).await;
    let loan = h.request(&item, 2).await;

    h.services
        .loans
        .approve_loan(&h.admin, loan.id, Some(in_days(2)))
        .await
        .unwrap();
    h.services.loans.return_loan(&h.admin, loan.id).await.unwrap();

    let err = assert_err!(h.services.loans.return_loan(&h.admin, loan.id).await);
    assert!(matches!(err, AppError::IllegalTransition(_)));
    assert_eq!(h.stock(&item).await.available, 4);
}

#[tokio::test]
async fn test_approve_requires_due_date() {
    let h = Harness::new();
    let item = h.item("Whiteboard", 1).await;
    let loan = h.request(&item, 1).await;

    let err = assert_err!(h.services.loans.approve_loan(&h.admin, loan.id, None).await);
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.stock(&item).await.available, 1);
}

#[tokio::test]
async fn test_delete_rules() {
    let h = Harness::new();
    let item = h.item("Globe", 5).await;

    let pending = h.request(&item, 1).await;
    assert_ok!(h.services.loans.delete_loan(&h.admin, pending.id).await);
    let gone = h.services.loans.get_loan(&h.admin, pending.id).await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));

    let rejected = h.request(&item, 1).await;
    h.services.loans.reject_loan(&h.admin, rejected.id).await.unwrap();
    assert_ok!(h.services.loans.delete_loan(&h.admin, rejected.id).await);

    let approved = h.request(&item, 2).await;
    h.services
        .loans
        .approve_loan(&h.admin, approved.id, Some(in_days(1)))
        .await
        .unwrap();
    let err = assert_err!(h.services.loans.delete_loan(&h.admin, approved.id).await);
    assert!(matches!(err, AppError::IllegalTransition(_)));

    h.services.loans.return_loan(&h.admin, approved.id).await.unwrap();
    let err = assert_err!(h.services.loans.delete_loan(&h.admin, approved.id).await);
    assert!(matches!(err, AppError::IllegalTransition(_)));
    assert_eq!(h.stock(&item).await.available, 5);
}

#[tokio::test]
async fn test_requester_cannot_administer() {
    let h = Harness::new();
    let item = h.item("Tripod", 2).await;
    let loan = h.request(&item, 1).await;

    let err = assert_err!(
        h.services
            .loans
            .approve_loan(&h.requester, loan.id, Some(in_days(1)))
            .await
    );
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = assert_err!(h.services.loans.delete_loan(&h.requester, loan.id).await);
    assert!(matches!(err, AppError::Forbidden(_)));

    let resize = h
        .services
        .items
        .resize_stock(&h.requester, item.id, ResizeStock { total_stock: 10 })
        .await;
    assert!(matches!(resize, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_other_requester_cannot_view_loan() {
    let h = Harness::new();
    let item = h.item("Easel", 2).await;
    let loan = h.request(&item, 1).await;

    assert_ok!(h.services.loans.get_loan(&h.requester, loan.id).await);
    assert_ok!(h.services.loans.get_loan(&h.admin, loan.id).await);
    let err = assert_err!(h.services.loans.get_loan(&h.other, loan.id).await);
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_list_scoping_and_state_filter() {
    let h = Harness::new();
    let item = h.item("Keyboard", 10).await;

    let first = h.request(&item, 1).await;
    let second = h.request(&item, 1).await;
    h.services
        .loans
        .approve_loan(&h.admin, second.id, Some(in_days(1)))
        .await
        .unwrap();

    let all = h
        .services
        .loans
        .list_loans(&h.admin, &LoanQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let pending = h
        .services
        .loans
        .list_loans(
            &h.admin,
            &LoanQuery {
                state: Some(LoanState::Pending),
            },
        )
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, first.id);

    let own = h
        .services
        .loans
        .list_loans(&h.requester, &LoanQuery::default())
        .await
        .unwrap();
    assert_eq!(own.len(), 2);

    let none = h
        .services
        .loans
        .list_loans(&h.other, &LoanQuery::default())
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_resize_keeps_loaned_units() {
    let h = Harness::new();
    let item = h.item("Chair", 10).await;
    let loan = h.request(&item, 4).await;
    h.services
        .loans
        .approve_loan(&h.admin, loan.id, Some(in_days(1)))
        .await
        .unwrap();

    let grown = h
        .services
        .items
        .resize_stock(&h.admin, item.id, ResizeStock { total_stock: 12 })
        .await
        .unwrap();
    assert_eq!(grown.total_stock, 12);
    assert_eq!(grown.available, 8);

    let err = assert_err!(
        h.services
            .items
            .resize_stock(&h.admin, item.id, ResizeStock { total_stock: 3 })
            .await
    );
    assert!(matches!(err, AppError::Validation(_)));

    h.services.loans.return_loan(&h.admin, loan.id).await.unwrap();
    assert_eq!(h.stock(&item).await.available, 12);
}

#[tokio::test]
async fn test_transitions_publish_events() {
    let mut h = Harness::new();
    let item = h.item("Printer", 2).await;
    let loan = h.request(&item, 1).await;

    h.services
        .loans
        .approve_loan(&h.admin, loan.id, Some(in_days(1)))
        .await
        .unwrap();
    h.services.loans.return_loan(&h.admin, loan.id).await.unwrap();
    // Refused transitions publish nothing
    let _ = h.services.loans.reject_loan(&h.admin, loan.id).await;

    let mut kinds = Vec::new();
    while let Ok(event) = h.events.try_recv() {
        assert_eq!(event.loan.id, loan.id);
        kinds.push(event.kind);
    }
    assert_eq!(
        kinds,
        vec![
            LoanEventKind::LoanCreated,
            LoanEventKind::LoanApproved,
            LoanEventKind::LoanReturned,
        ]
    );
}

#[tokio::test]
async fn test_due_soon_window() {
    let h = Harness::new();
    let item = h.item("Ladder", 5).await;

    let soon = h.request(&item, 1).await;
    let later = h.request(&item, 1).await;
    let postponed = h.request(&item, 1).await;

    let now = Utc::now();
    for (loan, due) in [
        (&soon, now + Duration::hours(12)),
        (&later, now + Duration::days(5)),
        (&postponed, now + Duration::hours(6)),
    ] {
        h.services
            .loans
            .approve_loan(&h.admin, loan.id, Some(due))
            .await
            .unwrap();
    }
    h.services
        .loans
        .delay_loan(&h.admin, postponed.id, Some(now + Duration::hours(20)))
        .await
        .unwrap();

    let due = h
        .services
        .loans
        .due_soon(now, Duration::hours(24))
        .await
        .unwrap();
    let ids: Vec<i32> = due.iter().map(|loan| loan.id).collect();
    assert_eq!(ids, vec![soon.id]);
}
