//! Post-commit notifications.
//!
//! Notifications are dispatched only after the financial state change they
//! describe has been committed, on their own task. A failing notifier is
//! logged and otherwise ignored.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{Budget, Money, Transaction, UserContact};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError>;

    async fn send_transaction_alert(
        &self,
        user: &UserContact,
        transaction: &Transaction,
    ) -> Result<(), NotifyError>;

    async fn send_budget_threshold_alert(
        &self,
        user: &UserContact,
        budget: &Budget,
        percent_used: u32,
    ) -> Result<(), NotifyError>;
}

/// Notifier used when no delivery channel is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_email(&self, to: &str, subject: &str, _html: &str) -> Result<(), NotifyError> {
        info!(to, subject, "email notification");
        Ok(())
    }

    async fn send_transaction_alert(
        &self,
        user: &UserContact,
        transaction: &Transaction,
    ) -> Result<(), NotifyError> {
        info!(
            user_id = %user.user_id,
            reference = %transaction.reference,
            status = transaction.status.as_str(),
            amount = %Money::new(transaction.amount_minor),
            "transaction alert"
        );
        Ok(())
    }

    async fn send_budget_threshold_alert(
        &self,
        user: &UserContact,
        budget: &Budget,
        percent_used: u32,
    ) -> Result<(), NotifyError> {
        info!(
            user_id = %user.user_id,
            budget_id = %budget.id,
            percent_used,
            "budget threshold alert"
        );
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub enum Notification {
    Email {
        to: String,
        subject: String,
        html: String,
    },
    TransactionAlert {
        user: UserContact,
        transaction: Transaction,
    },
    BudgetThreshold {
        user: UserContact,
        budget: Budget,
        percent_used: u32,
    },
}

impl Notification {
    pub fn email(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self::Email {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Email { .. } => "email",
            Self::TransactionAlert { .. } => "transaction_alert",
            Self::BudgetThreshold { .. } => "budget_threshold",
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub(crate) fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub(crate) fn dispatch(&self, notification: Notification) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let label = notification.label();
            let result = match &notification {
                Notification::Email { to, subject, html } => {
                    notifier.send_email(to, subject, html).await
                }
                Notification::TransactionAlert { user, transaction } => {
                    notifier.send_transaction_alert(user, transaction).await
                }
                Notification::BudgetThreshold {
                    user,
                    budget,
                    percent_used,
                } => {
                    notifier
                        .send_budget_threshold_alert(user, budget, *percent_used)
                        .await
                }
            };
            if let Err(err) = result {
                warn!(kind = label, error = %err, "notification delivery failed");
            }
        })
    }
}
