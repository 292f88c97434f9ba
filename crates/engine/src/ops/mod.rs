use std::{fmt, future::Future, sync::Arc, time::Duration};

use sea_orm::{DatabaseConnection, prelude::*};
use serde::Serialize;
use tracing::warn;

use crate::{
    EngineError, LogNotifier, Notification, Notifier, PaymentGateway, ResultEngine, Transaction,
    UserContact,
    gateway::{GatewayError, bounded},
    locks::UserLocks,
    notify::NotificationDispatcher,
    users,
};

mod beneficiaries;
mod bills;
mod budgets;
mod jobs;
mod ledger;
mod reconcile;
mod recurring;
mod spend;
mod transfers;
mod wallets;

pub use budgets::BudgetUsage;
pub use jobs::{AutoPayReport, JobFailure, RecurringReport, SettlementSummary};
pub use ledger::{CategorySpend, TransactionListFilter, UserSummary};
pub use reconcile::{Finalization, WebhookOutcome};
pub use spend::SpendReceipt;

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// A committed ledger entry together with the wallet balance after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerReceipt {
    pub transaction: Transaction,
    pub balance: i64,
}

struct WebhookSecret(Vec<u8>);

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(..)")
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    gateway: Arc<dyn PaymentGateway>,
    notifications: NotificationDispatcher,
    locks: UserLocks,
    gateway_timeout: Duration,
    webhook_secret: WebhookSecret,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    async fn gateway_call<T, F>(&self, op: &str, call: F) -> ResultEngine<T>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        bounded(self.gateway_timeout, op, call)
            .await
            .map_err(|err| {
                warn!(op, error = %err, "payment gateway call failed");
                EngineError::from(err)
            })
    }

    async fn user_contact(&self, user_id: &str) -> ResultEngine<UserContact> {
        let user = users::Entity::find_by_id(user_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("user {user_id}")))?;
        Ok(UserContact::from(&user))
    }

    /// Queues a notification for `user_id`. Must only be called after the
    /// state change it reports has been committed.
    async fn notify<F>(&self, user_id: &str, build: F)
    where
        F: FnOnce(UserContact) -> Notification,
    {
        match self.user_contact(user_id).await {
            Ok(contact) => {
                self.notifications.dispatch(build(contact));
            }
            Err(err) => warn!(user_id, error = %err, "notification skipped"),
        }
    }
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn require_positive(amount_minor: i64) -> ResultEngine<()> {
    if amount_minor <= 0 {
        return Err(EngineError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    gateway: Option<Arc<dyn PaymentGateway>>,
    notifier: Option<Arc<dyn Notifier>>,
    gateway_timeout: Option<Duration>,
    webhook_secret: Vec<u8>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the required payment gateway client
    pub fn gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> EngineBuilder {
        self.gateway = Some(gateway);
        self
    }

    /// Where notifications go. Defaults to logging them.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> EngineBuilder {
        self.notifier = Some(notifier);
        self
    }

    /// Upper bound for every gateway call. Defaults to ten seconds.
    pub fn gateway_timeout(mut self, timeout: Duration) -> EngineBuilder {
        self.gateway_timeout = Some(timeout);
        self
    }

    /// Shared secret the gateway signs webhooks with
    pub fn webhook_secret(mut self, secret: impl Into<Vec<u8>>) -> EngineBuilder {
        self.webhook_secret = secret.into();
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let gateway = self.gateway.ok_or_else(|| {
            EngineError::InvalidInput("a payment gateway is required".to_string())
        })?;
        if self.webhook_secret.is_empty() {
            return Err(EngineError::InvalidInput(
                "webhook secret must not be empty".to_string(),
            ));
        }
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(LogNotifier) as Arc<dyn Notifier>);
        Ok(Engine {
            database: self.database,
            gateway,
            notifications: NotificationDispatcher::new(notifier),
            locks: UserLocks::default(),
            gateway_timeout: self.gateway_timeout.unwrap_or(DEFAULT_GATEWAY_TIMEOUT),
            webhook_secret: WebhookSecret(self.webhook_secret),
        })
    }
}
