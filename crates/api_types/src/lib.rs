//! Request and response bodies of the REST API.
//!
//! Amounts are major-unit decimal strings (`"12.50"`). Parsing and
//! formatting happen in the server; the engine only sees minor units.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable error kind (`insufficient_funds`, ...).
    pub kind: String,
    pub error: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Bank account a payout is sent to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayoutAccount {
    pub account_number: String,
    pub bank_code: String,
    pub bank_name: Option<String>,
}

pub mod user {
    use super::*;

    /// The user id itself comes from the authenticated identity header.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserRegister {
        pub email: String,
        pub name: Option<String>,
        /// Gateway subaccount that should receive the user's deposits.
        pub external_account_ref: Option<String>,
    }
}

pub mod wallet {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Wallet {
        pub user_id: String,
        pub balance: String,
        pub external_account_ref: Option<String>,
        pub has_payout_account: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DepositNew {
        pub amount: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ChargeInitialized {
        pub authorization_url: String,
        pub reference: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ConfirmDeposit {
        pub reference: String,
    }

    /// Spend from the wallet against a category budget.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PaymentNew {
        pub category_id: String,
        pub amount: String,
        pub description: Option<String>,
        /// Client idempotency key.
        pub reference: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WithdrawNew {
        pub amount: String,
        /// Replaces the payout account on file.
        pub account: Option<PayoutAccount>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LedgerReceipt {
        pub transaction: super::transaction::TransactionView,
        pub balance: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SpendReceipt {
        pub transaction: super::transaction::TransactionView,
        pub balance: String,
        pub budget_remaining: String,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        Income,
        Expense,
        Deposit,
        Withdrawal,
        Transfer,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionStatus {
        Pending,
        Success,
        Failed,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub reference: String,
        pub kind: TransactionKind,
        pub status: TransactionStatus,
        pub amount: String,
        pub category_id: Option<String>,
        pub description: Option<String>,
        pub bill_id: Option<String>,
        pub transfer_ref: Option<String>,
        pub occurred_at: DateTime<Utc>,
        pub finalized_at: Option<DateTime<Utc>>,
    }

    /// Query string of `GET /transactions`. `from` is inclusive, `to` exclusive.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionList {
        pub kind: Option<TransactionKind>,
        pub status: Option<TransactionStatus>,
        pub min_amount: Option<String>,
        pub max_amount: Option<String>,
        pub from: Option<DateTime<FixedOffset>>,
        pub to: Option<DateTime<FixedOffset>>,
        pub limit: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub transactions: Vec<TransactionView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct IncomeNew {
        pub amount: String,
        pub description: Option<String>,
        /// Defaults to now.
        pub occurred_at: Option<DateTime<FixedOffset>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub category_id: String,
        pub amount: String,
        pub description: Option<String>,
        pub occurred_at: Option<DateTime<FixedOffset>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: String,
        pub category_id: String,
        pub amount: String,
        pub description: Option<String>,
        pub reference: String,
        pub occurred_at: DateTime<Utc>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseList {
        pub category_id: Option<String>,
    }
}

pub mod budget {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetNew {
        pub category_id: String,
        pub amount: String,
        pub start_date: DateTime<FixedOffset>,
        pub end_date: DateTime<FixedOffset>,
        /// Renews the budget every period when set.
        pub frequency: Option<Frequency>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetView {
        pub id: String,
        pub category_id: String,
        pub amount: String,
        pub start_date: DateTime<Utc>,
        pub end_date: DateTime<Utc>,
        pub recurring: bool,
        pub frequency: Option<Frequency>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetUsageView {
        pub budget: BudgetView,
        pub spent: String,
        pub remaining: String,
        pub percent_used: u32,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct BudgetSummaryQuery {
        pub category_id: Option<String>,
    }
}

pub mod bill {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum BillStatus {
        Pending,
        Paid,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum BillFilter {
        Pending,
        Overdue,
        Paid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BillNew {
        pub category_id: String,
        pub amount: String,
        pub description: String,
        pub due_date: DateTime<FixedOffset>,
        #[serde(default)]
        pub auto_pay: bool,
        pub beneficiary_id: Option<String>,
        pub recipient: Option<PayoutAccount>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct BillList {
        pub status: Option<BillFilter>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BillView {
        pub id: String,
        pub category_id: String,
        pub amount: String,
        pub description: String,
        pub due_date: DateTime<Utc>,
        pub status: BillStatus,
        pub overdue: bool,
        pub auto_pay: bool,
        pub paid_at: Option<DateTime<Utc>>,
        pub beneficiary_id: Option<String>,
        pub recipient: Option<PayoutAccount>,
        pub recipient_account_name: Option<String>,
    }

    /// Destination override for `POST /bills/{id}/pay-transfer`.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransferPay {
        pub beneficiary_id: Option<String>,
        pub recipient: Option<PayoutAccount>,
    }
}

pub mod beneficiary {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BeneficiaryNew {
        pub name: String,
        pub account: PayoutAccount,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BeneficiaryView {
        pub id: String,
        pub name: String,
        pub account: PayoutAccount,
        /// Holder name as resolved by the bank.
        pub account_name: String,
        pub created_at: DateTime<Utc>,
    }
}

pub mod recurring {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RecurringExpenseNew {
        pub category_id: String,
        pub amount: String,
        pub description: String,
        pub frequency: Frequency,
        pub start_date: DateTime<FixedOffset>,
        pub end_date: Option<DateTime<FixedOffset>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RecurringExpenseView {
        pub id: String,
        pub category_id: String,
        pub amount: String,
        pub description: String,
        pub frequency: Frequency,
        pub next_due_date: DateTime<Utc>,
        pub end_date: Option<DateTime<Utc>>,
        pub active: bool,
    }
}

pub mod summary {
    use super::*;
    use crate::budget::BudgetUsageView;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategorySpendView {
        pub category_id: String,
        pub spent: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SummaryView {
        pub income: String,
        pub expenses: String,
        pub balance: String,
        pub expenses_by_category: Vec<CategorySpendView>,
        pub budgets: Vec<BudgetUsageView>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bill_new_defaults_auto_pay_off() {
        let body = r#"{
            "category_id": "rent",
            "amount": "1500.00",
            "description": "March rent",
            "due_date": "2025-03-01T00:00:00+01:00"
        }"#;
        let bill: bill::BillNew = serde_json::from_str(body).unwrap();
        assert!(!bill.auto_pay);
        assert!(bill.recipient.is_none());
    }

    #[test]
    fn enums_use_snake_case() {
        let json = serde_json::to_string(&transaction::TransactionKind::Withdrawal).unwrap();
        assert_eq!(json, "\"withdrawal\"");
        let filter: bill::BillFilter = serde_json::from_str("\"overdue\"").unwrap();
        assert_eq!(filter, bill::BillFilter::Overdue);
    }
}
