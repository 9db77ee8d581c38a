//! Outbound loan notifications
//!
//! Transitions publish a `LoanEvent` onto a bounded channel and return
//! immediately. A separate worker task drains the channel, loads the item
//! and users involved, and hands the result to a `NotificationSink`.
//! Nothing on this path can fail or slow down the transition that
//! produced the event.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    error::AppResult,
    models::{
        loan::{Loan, LoanDetails},
        user::User,
    },
    repository::Repository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoanEventKind {
    LoanCreated,
    LoanApproved,
    LoanRejected,
    LoanReturned,
    LoanPostponed,
    LoanReminder,
}

#[derive(Debug, Clone)]
pub struct LoanEvent {
    pub kind: LoanEventKind,
    pub loan: Loan,
}

/// A populated event ready for delivery
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: LoanEventKind,
    pub details: LoanDetails,
    pub recipients: Vec<User>,
}

/// Delivery backend for notifications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> AppResult<()>;
}

/// Sink that only writes notifications to the log
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> AppResult<()> {
        for recipient in &notification.recipients {
            tracing::info!(
                kind = ?notification.kind,
                loan_id = notification.details.loan.id,
                to = %recipient.email,
                "Notification (not sent, email disabled)"
            );
        }
        Ok(())
    }
}

/// Publishing half of the notification queue
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<LoanEvent>,
}

impl Notifier {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LoanEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue an event without waiting; a full or closed queue drops it
    pub fn publish(&self, kind: LoanEventKind, loan: &Loan) {
        let event = LoanEvent {
            kind,
            loan: loan.clone(),
        };
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!(?kind, loan_id = loan.id, "Dropping notification: {}", e);
        }
    }
}

pub struct NotificationWorker {
    rx: mpsc::Receiver<LoanEvent>,
    repository: Repository,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationWorker {
    pub fn new(
        rx: mpsc::Receiver<LoanEvent>,
        repository: Repository,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            rx,
            repository,
            sink,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Deliver events until every `Notifier` has been dropped
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            self.handle(event).await;
        }
        tracing::debug!("Notification queue closed");
    }

    async fn handle(&self, event: LoanEvent) {
        let kind = event.kind;
        let loan_id = event.loan.id;

        let notification = match self.populate(event).await {
            Ok(notification) => notification,
            Err(e) => {
                tracing::warn!(?kind, loan_id, "Cannot build notification: {}", e);
                return;
            }
        };

        if let Err(e) = self.sink.deliver(&notification).await {
            tracing::warn!(?kind, loan_id, "Notification delivery failed: {}", e);
        }
    }

    async fn populate(&self, event: LoanEvent) -> AppResult<Notification> {
        let item = self.repository.items.get_item(event.loan.item_id).await?;
        let requester = self
            .repository
            .users
            .get_user(event.loan.requester_id)
            .await?;

        // New requests go to the approvers, everything else to the requester
        let recipients = match event.kind {
            LoanEventKind::LoanCreated => self.repository.users.list_admins().await?,
            _ => vec![requester.clone()],
        };

        Ok(Notification {
            kind: event.kind,
            details: LoanDetails {
                loan: event.loan,
                item,
                requester,
            },
            recipients,
        })
    }
}
