//! Email delivery of loan notifications

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use super::notifications::{LoanEventKind, Notification, NotificationSink};
use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::user::User,
};

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

/// Subject and plain text body of one email
#[derive(Debug, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

fn format_date(date: Option<chrono::DateTime<chrono::Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Build the email `recipient` receives for `notification`
pub fn render(notification: &Notification, recipient: &User) -> RenderedEmail {
    let details = &notification.details;
    let loan = &details.loan;
    let item = &details.item.name;
    let qty = loan.requested_quantity;

    let (subject, body) = match notification.kind {
        LoanEventKind::LoanCreated => (
            "New loan request awaiting approval".to_string(),
            format!(
                "Hello {},\n\n{} <{}> requested {} unit(s) of \"{}\" for location {} on {}.\n\
                 Please review the request in the pending loans panel.",
                recipient.name,
                details.requester.name,
                details.requester.email,
                qty,
                item,
                loan.location_id,
                format_date(Some(loan.requested_at)),
            ),
        ),
        LoanEventKind::LoanApproved => (
            "Loan approved".to_string(),
            format!(
                "Hello {}, your loan of {} unit(s) of \"{}\" was approved. \
                 Please return it before {}.",
                recipient.name,
                qty,
                item,
                format_date(loan.due_at),
            ),
        ),
        LoanEventKind::LoanRejected => (
            "Loan rejected".to_string(),
            format!(
                "Hello {}, your request for {} unit(s) of \"{}\" was rejected.",
                recipient.name, qty, item,
            ),
        ),
        LoanEventKind::LoanReturned => (
            "Loan returned".to_string(),
            format!(
                "Hello {}, we registered the return of \"{}\" ({}). Thank you!",
                recipient.name, item, qty,
            ),
        ),
        LoanEventKind::LoanPostponed => (
            "Loan due date postponed".to_string(),
            format!(
                "Hello {}, the expected return date of \"{}\" was moved to {}.",
                recipient.name,
                item,
                format_date(loan.due_at),
            ),
        ),
        LoanEventKind::LoanReminder => (
            "Loan return reminder".to_string(),
            format!(
                "Hello {}, remember to return \"{}\" before {}.",
                recipient.name,
                item,
                format_date(loan.due_at),
            ),
        ),
    };

    RenderedEmail { subject, body }
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, to: &str, email: RenderedEmail) -> AppResult<Message> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("Inventory");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn mailer(&self) -> AppResult<SmtpTransport> {
        let mailer_builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer_builder = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer_builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer_builder
        };

        Ok(mailer_builder.build())
    }

    /// One message per recipient; unusable addresses are logged and skipped
    fn build_messages(&self, notification: &Notification) -> Vec<Message> {
        notification
            .recipients
            .iter()
            .filter_map(|recipient| {
                self.build_message(&recipient.email, render(notification, recipient))
                    .map_err(|e| {
                        tracing::warn!(
                            kind = ?notification.kind,
                            user_id = recipient.id,
                            "Skipping recipient: {}",
                            e
                        );
                    })
                    .ok()
            })
            .collect()
    }
}

/// Send every message, returning how many were accepted by the transport
fn send_all<T>(transport: &T, messages: &[Message]) -> usize
where
    T: Transport,
    T::Error: std::fmt::Display,
{
    messages
        .iter()
        .filter(|message| match transport.send(message) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(to = ?message.envelope().to(), "Failed to send email: {}", e);
                false
            }
        })
        .count()
}

#[async_trait]
impl NotificationSink for EmailService {
    /// Fails only when no recipient could be reached
    async fn deliver(&self, notification: &Notification) -> AppResult<()> {
        if notification.recipients.is_empty() {
            return Ok(());
        }

        let messages = self.build_messages(notification);
        if messages.is_empty() {
            return Err(AppError::Internal(
                "No recipient has a usable email address".to_string(),
            ));
        }
        let mailer = self.mailer()?;

        // SmtpTransport is blocking
        let sent = tokio::task::spawn_blocking(move || send_all(&mailer, &messages))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?;

        if sent == 0 {
            return Err(AppError::Internal(format!(
                "Failed to email all {} recipient(s)",
                notification.recipients.len()
            )));
        }
        Ok(())
    }
}
