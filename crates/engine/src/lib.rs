pub use beneficiaries::Beneficiary;
pub use bills::{Bill, BillFilter, BillStatus, PayoutAccount};
pub use budgets::Budget;
pub use commands::{BillCmd, ChargeCmd, SpendCmd, TransferPayCmd, WithdrawCmd};
pub use error::EngineError;
pub use expenses::Expense;
pub use frequency::Frequency;
pub use gateway::{
    ChargeMetadata, ChargeRequest, ChargeStatus, GatewayError, InitializedCharge, PaymentGateway,
    TransferReceipt, TransferRequest, VerifiedCharge,
};
pub use money::Money;
pub use notify::{LogNotifier, Notification, Notifier, NotifyError};
pub use ops::{
    AutoPayReport, BudgetUsage, CategorySpend, Engine, EngineBuilder, Finalization, JobFailure,
    LedgerReceipt, RecurringReport, SettlementSummary, SpendReceipt, TransactionListFilter,
    UserSummary, WebhookOutcome,
};
pub use recurring_expenses::RecurringExpense;
pub use transactions::{Transaction, TransactionKind, TransactionStatus, new_reference};
pub use users::UserContact;
pub use wallets::Wallet;
pub use webhook::{EventData, GatewayEvent, SIGNATURE_HEADER, sign_payload, verify_signature};

mod beneficiaries;
mod bill_reminders;
mod bills;
mod budget_alerts;
mod budgets;
mod commands;
mod error;
mod expenses;
mod frequency;
mod gateway;
mod locks;
mod money;
mod notify;
mod ops;
mod recurring_expenses;
mod transactions;
mod users;
mod wallets;
mod webhook;

pub type ResultEngine<T> = Result<T, EngineError>;
