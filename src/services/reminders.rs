//! Periodic due-date reminders

use chrono::{DateTime, Duration, Utc};
use config::ConfigError;
use tokio::task::JoinHandle;

use super::{
    loans::LoansService,
    notifications::{LoanEventKind, Notifier},
};
use crate::{config::RemindersConfig, error::AppResult};

pub struct ReminderScheduler {
    loans: LoansService,
    notifier: Notifier,
    interval: std::time::Duration,
    lookahead: Duration,
}

impl ReminderScheduler {
    pub fn new(
        loans: LoansService,
        notifier: Notifier,
        config: &RemindersConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            loans,
            notifier,
            interval: config.interval()?,
            lookahead: config.lookahead()?,
        })
    }

    /// Scan on a fixed interval, starting immediately
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once(Utc::now()).await {
                    tracing::error!("Reminder scan failed: {}", e);
                }
            }
        })
    }

    /// Queue a reminder for every approved loan due within the lookahead window
    pub async fn run_once(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let loans = self.loans.due_soon(now, self.lookahead).await?;
        for loan in &loans {
            self.notifier.publish(LoanEventKind::LoanReminder, loan);
        }
        tracing::info!(count = loans.len(), "Queued loan reminders");
        Ok(loans.len())
    }
}
