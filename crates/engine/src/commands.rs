//! Command structs for engine operations.
//!
//! These types group parameters for write operations (spend, bills,
//! payouts, charges), keeping call sites readable and avoiding long
//! argument lists.

use chrono::{DateTime, Utc};

use crate::{PayoutAccount, TransactionKind};

/// A debit against a category budget: expense creation and wallet "pay".
#[derive(Clone, Debug)]
pub struct SpendCmd {
    pub user_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub description: Option<String>,
    /// Caller-supplied idempotency key. Generated when absent.
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl SpendCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        category_id: impl Into<String>,
        amount_minor: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            category_id: category_id.into(),
            amount_minor,
            description: None,
            reference: None,
            occurred_at,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Create a bill.
#[derive(Clone, Debug)]
pub struct BillCmd {
    pub user_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub auto_pay: bool,
    pub beneficiary_id: Option<String>,
    pub recipient: Option<PayoutAccount>,
}

impl BillCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        category_id: impl Into<String>,
        amount_minor: i64,
        description: impl Into<String>,
        due_date: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            category_id: category_id.into(),
            amount_minor,
            description: description.into(),
            due_date,
            auto_pay: false,
            beneficiary_id: None,
            recipient: None,
        }
    }

    #[must_use]
    pub fn auto_pay(mut self, auto_pay: bool) -> Self {
        self.auto_pay = auto_pay;
        self
    }

    #[must_use]
    pub fn beneficiary(mut self, beneficiary_id: impl Into<String>) -> Self {
        self.beneficiary_id = Some(beneficiary_id.into());
        self
    }

    #[must_use]
    pub fn recipient(mut self, recipient: PayoutAccount) -> Self {
        self.recipient = Some(recipient);
        self
    }
}

/// Pay a bill through a gateway payout.
///
/// The destination is taken from, in order: `beneficiary_id`, `recipient`,
/// the bill's beneficiary, the bill's own recipient details.
#[derive(Clone, Debug)]
pub struct TransferPayCmd {
    pub user_id: String,
    pub bill_id: String,
    pub beneficiary_id: Option<String>,
    pub recipient: Option<PayoutAccount>,
}

impl TransferPayCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, bill_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            bill_id: bill_id.into(),
            beneficiary_id: None,
            recipient: None,
        }
    }

    #[must_use]
    pub fn beneficiary(mut self, beneficiary_id: impl Into<String>) -> Self {
        self.beneficiary_id = Some(beneficiary_id.into());
        self
    }

    #[must_use]
    pub fn recipient(mut self, recipient: PayoutAccount) -> Self {
        self.recipient = Some(recipient);
        self
    }
}

/// Move money out of the wallet to the user's bank account.
#[derive(Clone, Debug)]
pub struct WithdrawCmd {
    pub user_id: String,
    pub amount_minor: i64,
    /// Replaces the payout account on file when present.
    pub payout_account: Option<PayoutAccount>,
}

impl WithdrawCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, amount_minor: i64) -> Self {
        Self {
            user_id: user_id.into(),
            amount_minor,
            payout_account: None,
        }
    }

    #[must_use]
    pub fn payout_account(mut self, account: PayoutAccount) -> Self {
        self.payout_account = Some(account);
        self
    }
}

/// Start a gateway charge that credits the wallet once confirmed.
#[derive(Clone, Debug)]
pub struct ChargeCmd {
    pub user_id: String,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub category_id: Option<String>,
    pub description: Option<String>,
}

impl ChargeCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, kind: TransactionKind, amount_minor: i64) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            amount_minor,
            category_id: None,
            description: None,
        }
    }

    #[must_use]
    pub fn category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
