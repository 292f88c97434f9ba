//! Wallet API endpoints.

use api_types::wallet::{
    ChargeInitialized, ConfirmDeposit, DepositNew, LedgerReceipt, PaymentNew, SpendReceipt,
    Wallet, WithdrawNew,
};
use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::Utc;

use crate::{
    ServerError,
    convert::{account_from_api, transaction_view},
    format_amount, parse_amount,
    server::ServerState,
    user::CurrentUser,
};

pub(crate) fn wallet_body(wallet: engine::Wallet) -> Wallet {
    Wallet {
        has_payout_account: wallet.external_recipient_ref.is_some(),
        balance: format_amount(wallet.balance),
        user_id: wallet.user_id,
        external_account_ref: wallet.external_account_ref,
    }
}

pub(crate) fn ledger_receipt(receipt: engine::LedgerReceipt) -> LedgerReceipt {
    LedgerReceipt {
        transaction: transaction_view(receipt.transaction),
        balance: format_amount(receipt.balance),
    }
}

pub(crate) fn spend_receipt(receipt: engine::SpendReceipt) -> SpendReceipt {
    SpendReceipt {
        transaction: transaction_view(receipt.transaction),
        balance: format_amount(receipt.balance),
        budget_remaining: format_amount(receipt.budget_remaining),
    }
}

pub async fn get(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<Wallet>, ServerError> {
    let wallet = state.engine.wallet(&user_id).await?;
    Ok(Json(wallet_body(wallet)))
}

/// Starts a gateway charge. The wallet is credited once the charge is
/// confirmed by webhook or by `confirm_deposit`.
pub async fn deposit(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<DepositNew>,
) -> Result<(StatusCode, Json<ChargeInitialized>), ServerError> {
    let amount_minor = parse_amount(&payload.amount)?;
    let charge = state.engine.initiate_deposit(&user_id, amount_minor).await?;
    Ok((
        StatusCode::CREATED,
        Json(ChargeInitialized {
            authorization_url: charge.authorization_url,
            reference: charge.reference,
        }),
    ))
}

pub async fn confirm_deposit(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<ConfirmDeposit>,
) -> Result<Json<LedgerReceipt>, ServerError> {
    let transaction = state
        .engine
        .confirm_deposit(&user_id, payload.reference.trim())
        .await?;
    let balance = state.engine.balance(&user_id).await?;
    Ok(Json(ledger_receipt(engine::LedgerReceipt {
        transaction,
        balance,
    })))
}

pub async fn pay(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<PaymentNew>,
) -> Result<(StatusCode, Json<SpendReceipt>), ServerError> {
    let amount_minor = parse_amount(&payload.amount)?;
    let mut cmd = engine::SpendCmd::new(&user_id, payload.category_id, amount_minor, Utc::now());
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if let Some(reference) = payload.reference {
        cmd = cmd.reference(reference);
    }
    let receipt = state.engine.pay(cmd).await?;
    Ok((StatusCode::CREATED, Json(spend_receipt(receipt))))
}

pub async fn withdraw(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<WithdrawNew>,
) -> Result<(StatusCode, Json<LedgerReceipt>), ServerError> {
    let amount_minor = parse_amount(&payload.amount)?;
    let mut cmd = engine::WithdrawCmd::new(&user_id, amount_minor);
    if let Some(account) = payload.account {
        cmd = cmd.payout_account(account_from_api(account)?);
    }
    let receipt = state.engine.withdraw(cmd).await?;
    Ok((StatusCode::ACCEPTED, Json(ledger_receipt(receipt))))
}
