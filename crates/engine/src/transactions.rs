//! Ledger entries.
//!
//! A `Transaction` is created when a money movement is initiated and is
//! finalized at most once: `pending -> success` or `pending -> failed`.
//! `reference` is the global idempotency key shared with the gateway.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
        }
    }

    /// `true` for kinds that add money to the wallet.
    pub fn is_credit(self) -> bool {
        matches!(self, Self::Income | Self::Deposit)
    }

    /// Wallet delta produced by a transaction of this kind.
    pub fn wallet_delta(self, amount_minor: i64) -> i64 {
        if self.is_credit() {
            amount_minor
        } else {
            -amount_minor
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "transfer" => Ok(Self::Transfer),
            other => Err(EngineError::InvalidInput(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::InvalidInput(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub reference: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount_minor: i64,
    pub category_id: Option<String>,
    pub description: Option<String>,
    /// Whether this entry's wallet effect is currently reflected in the
    /// balance. Successes always have it, failures never do; a pending
    /// transfer has it because the debit is taken when the payout is
    /// initiated.
    pub wallet_applied: bool,
    pub transfer_ref: Option<String>,
    pub bill_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(
        user_id: impl Into<String>,
        reference: impl Into<String>,
        kind: TransactionKind,
        amount_minor: i64,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            reference: reference.into(),
            kind,
            status: TransactionStatus::Pending,
            amount_minor,
            category_id: None,
            description: None,
            wallet_applied: false,
            transfer_ref: None,
            bill_id: None,
            occurred_at,
            finalized_at: None,
        })
    }

    /// Marks the entry as already settled, with its wallet effect applied.
    #[must_use]
    pub fn settled(mut self) -> Self {
        self.status = TransactionStatus::Success;
        self.wallet_applied = true;
        self.finalized_at = Some(self.occurred_at);
        self
    }

    #[must_use]
    pub fn category(mut self, category_id: Option<String>) -> Self {
        self.category_id = category_id;
        self
    }

    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    #[must_use]
    pub fn bill(mut self, bill_id: Option<String>) -> Self {
        self.bill_id = bill_id;
        self
    }
}

/// Generates a fresh reference for operations the engine originates.
pub fn new_reference(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    #[sea_orm(unique)]
    pub reference: String,
    pub kind: String,
    pub status: String,
    pub amount_minor: i64,
    pub category_id: Option<String>,
    pub description: Option<String>,
    pub wallet_applied: bool,
    pub transfer_ref: Option<String>,
    pub bill_id: Option<String>,
    pub occurred_at: DateTimeUtc,
    pub finalized_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.clone()),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            reference: ActiveValue::Set(tx.reference.clone()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            category_id: ActiveValue::Set(tx.category_id.clone()),
            description: ActiveValue::Set(tx.description.clone()),
            wallet_applied: ActiveValue::Set(tx.wallet_applied),
            transfer_ref: ActiveValue::Set(tx.transfer_ref.clone()),
            bill_id: ActiveValue::Set(tx.bill_id.clone()),
            occurred_at: ActiveValue::Set(tx.occurred_at),
            finalized_at: ActiveValue::Set(tx.finalized_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            reference: model.reference,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            status: TransactionStatus::try_from(model.status.as_str())?,
            amount_minor: model.amount_minor,
            category_id: model.category_id,
            description: model.description,
            wallet_applied: model.wallet_applied,
            transfer_ref: model.transfer_ref,
            bill_id: model.bill_id,
            occurred_at: model.occurred_at,
            finalized_at: model.finalized_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn rejects_non_positive_amounts() {
        let at = Utc.timestamp_opt(0, 0).unwrap();
        let err = Transaction::new("u", "r", TransactionKind::Expense, 0, at).unwrap_err();
        assert_eq!(err.kind(), "invalid_amount");
    }

    #[test]
    fn settled_marks_wallet_effect_applied() {
        let at = Utc.timestamp_opt(0, 0).unwrap();
        let tx = Transaction::new("u", "r", TransactionKind::Income, 10, at)
            .unwrap()
            .settled();
        assert_eq!(tx.status, TransactionStatus::Success);
        assert!(tx.wallet_applied);
        assert_eq!(tx.finalized_at, Some(at));
    }

    #[test]
    fn wallet_delta_sign_follows_kind() {
        assert_eq!(TransactionKind::Deposit.wallet_delta(5), 5);
        assert_eq!(TransactionKind::Transfer.wallet_delta(5), -5);
        assert_eq!(TransactionKind::Withdrawal.wallet_delta(5), -5);
    }
}
