//! Bill endpoints.

use api_types::{
    bill::{BillFilter as ApiFilter, BillList, BillNew, BillView, TransferPay},
    wallet::{LedgerReceipt, SpendReceipt},
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{BillCmd, BillFilter, TransferPayCmd};

use crate::{
    ServerError,
    convert::{account_from_api, bill_view, utc},
    parse_amount,
    server::ServerState,
    user::CurrentUser,
    wallets::{ledger_receipt, spend_receipt},
};

fn filter_from_api(filter: ApiFilter) -> BillFilter {
    match filter {
        ApiFilter::Pending => BillFilter::Pending,
        ApiFilter::Overdue => BillFilter::Overdue,
        ApiFilter::Paid => BillFilter::Paid,
    }
}

pub async fn bill_new(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<BillNew>,
) -> Result<(StatusCode, Json<BillView>), ServerError> {
    let amount_minor = parse_amount(&payload.amount)?;
    let mut cmd = BillCmd::new(
        &user_id,
        payload.category_id.trim(),
        amount_minor,
        payload.description,
        utc(payload.due_date),
    )
    .auto_pay(payload.auto_pay);
    if let Some(beneficiary_id) = payload.beneficiary_id {
        cmd = cmd.beneficiary(beneficiary_id);
    }
    if let Some(recipient) = payload.recipient {
        cmd = cmd.recipient(account_from_api(recipient)?);
    }
    let bill = state.engine.create_bill(cmd).await?;
    Ok((StatusCode::CREATED, Json(bill_view(bill, Utc::now()))))
}

pub async fn list(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<BillList>,
) -> Result<Json<Vec<BillView>>, ServerError> {
    let now = Utc::now();
    let bills = state
        .engine
        .bills(&user_id, query.status.map(filter_from_api), now)
        .await?;
    Ok(Json(bills.into_iter().map(|b| bill_view(b, now)).collect()))
}

pub async fn get(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<BillView>, ServerError> {
    let bill = state.engine.bill(&user_id, &id).await?;
    Ok(Json(bill_view(bill, Utc::now())))
}

/// Pays the bill from the wallet balance.
pub async fn pay(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<SpendReceipt>, ServerError> {
    let receipt = state.engine.pay_bill(&user_id, &id, Utc::now()).await?;
    Ok(Json(spend_receipt(receipt)))
}

/// Pays the bill with a bank transfer. The debit is final only once the
/// gateway reports the transfer as successful.
pub async fn pay_transfer(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
    payload: Option<Json<TransferPay>>,
) -> Result<(StatusCode, Json<LedgerReceipt>), ServerError> {
    let mut cmd = TransferPayCmd::new(&user_id, id);
    if let Some(Json(payload)) = payload {
        if let Some(beneficiary_id) = payload.beneficiary_id {
            cmd = cmd.beneficiary(beneficiary_id);
        }
        if let Some(recipient) = payload.recipient {
            cmd = cmd.recipient(account_from_api(recipient)?);
        }
    }
    let receipt = state.engine.pay_bill_with_transfer(cmd).await?;
    Ok((StatusCode::ACCEPTED, Json(ledger_receipt(receipt))))
}
