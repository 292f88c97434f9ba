//! The module contains the errors the engine can throw.
//!
//! Authorization failures ([`NoActiveBudget`], [`BudgetExceeded`],
//! [`InsufficientFunds`]) never leave partial state behind: they are raised
//! before or inside the DB transaction that would have committed the spend.
//!
//!  [`NoActiveBudget`]: EngineError::NoActiveBudget
//!  [`BudgetExceeded`]: EngineError::BudgetExceeded
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No active budget: {0}")]
    NoActiveBudget(String),
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),
    #[error("Duplicate reference: {0}")]
    DuplicateReference(String),
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Recipient resolution failed: {0}")]
    RecipientResolutionFailed(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoActiveBudget(_) => "no_active_budget",
            Self::BudgetExceeded(_) => "budget_exceeded",
            Self::InsufficientFunds(_) => "insufficient_funds",
            Self::WalletNotFound(_) => "wallet_not_found",
            Self::DuplicateReference(_) => "duplicate_reference",
            Self::GatewayUnavailable(_) => "gateway_unavailable",
            Self::InvalidSignature => "invalid_signature",
            Self::RecipientResolutionFailed(_) => "recipient_resolution_failed",
            Self::TransactionNotFound(_) => "transaction_not_found",
            Self::KeyNotFound(_) => "not_found",
            Self::ExistingKey(_) => "conflict",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidState(_) => "invalid_state",
            Self::Database(_) => "internal",
        }
    }

    /// Errors worth retrying later: the outcome is unknown, not negative.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::GatewayUnavailable(_) | Self::Database(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            (Self::InvalidSignature, Self::InvalidSignature) => true,
            (a, b) => a.kind() == b.kind() && a.to_string() == b.to_string(),
        }
    }
}
