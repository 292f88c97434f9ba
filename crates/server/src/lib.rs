use api_types::ErrorBody;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::{EngineError, Money};

pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod beneficiaries;
mod bills;
mod budgets;
mod convert;
mod recurring;
mod server;
mod transactions;
mod user;
mod wallets;
mod webhook;

pub mod types {
    pub mod wallet {
        pub use api_types::wallet::{
            ChargeInitialized, ConfirmDeposit, DepositNew, LedgerReceipt, PaymentNew,
            SpendReceipt, Wallet, WithdrawNew,
        };
    }

    pub mod transaction {
        pub use api_types::transaction::{
            ExpenseNew, ExpenseView, IncomeNew, TransactionList, TransactionListResponse,
            TransactionView,
        };
    }

    pub mod budget {
        pub use api_types::budget::{BudgetNew, BudgetUsageView, BudgetView};
    }

    pub mod summary {
        pub use api_types::summary::{CategorySpendView, SummaryView};
    }

    pub mod bill {
        pub use api_types::bill::{BillFilter, BillNew, BillView, TransferPay};
    }

    pub mod beneficiary {
        pub use api_types::beneficiary::{BeneficiaryNew, BeneficiaryView};
    }

    pub mod recurring {
        pub use api_types::recurring::{RecurringExpenseNew, RecurringExpenseView};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_)
        | EngineError::WalletNotFound(_)
        | EngineError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) | EngineError::DuplicateReference(_) => StatusCode::CONFLICT,
        EngineError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::InvalidSignature => StatusCode::UNAUTHORIZED,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::NoActiveBudget(_)
        | EngineError::BudgetExceeded(_)
        | EngineError::InsufficientFunds(_)
        | EngineError::RecipientResolutionFailed(_)
        | EngineError::InvalidAmount(_)
        | EngineError::InvalidInput(_)
        | EngineError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, kind, error) = match self {
            // Nothing about the verification goes back to the caller.
            ServerError::Engine(EngineError::InvalidSignature) => {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            ServerError::Engine(err) => (
                status_for_engine_error(&err),
                err.kind().to_string(),
                message_for_engine_error(err),
            ),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, "bad_request".to_string(), err),
        };

        (status, Json(ErrorBody { kind, error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

/// Parses a major-unit amount that must be strictly positive.
fn parse_amount(value: &str) -> Result<i64, ServerError> {
    Ok(Money::parse_positive(value)?.minor())
}

fn format_amount(minor: i64) -> String {
    Money::new(minor).to_string()
}
