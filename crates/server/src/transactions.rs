//! Ledger endpoints: income, expenses, the transaction list, lookups and
//! the overall summary.

use api_types::{
    transaction::{
        ExpenseList, ExpenseNew, ExpenseView, IncomeNew, TransactionList,
        TransactionListResponse, TransactionView,
    },
    summary::SummaryView,
    wallet::{LedgerReceipt, SpendReceipt},
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::TransactionListFilter;

use crate::{
    ServerError,
    convert::{
        expense_view, kind_from_api, status_from_api, summary_view, transaction_view, utc,
    },
    parse_amount,
    server::ServerState,
    user::CurrentUser,
    wallets::{ledger_receipt, spend_receipt},
};

pub async fn income_new(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<IncomeNew>,
) -> Result<(StatusCode, Json<LedgerReceipt>), ServerError> {
    let amount_minor = parse_amount(&payload.amount)?;
    let occurred_at = payload.occurred_at.map_or_else(Utc::now, utc);
    let receipt = state
        .engine
        .record_income(
            &user_id,
            amount_minor,
            payload.description.as_deref(),
            occurred_at,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ledger_receipt(receipt))))
}

pub async fn expense_new(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<SpendReceipt>), ServerError> {
    let amount_minor = parse_amount(&payload.amount)?;
    let occurred_at = payload.occurred_at.map_or_else(Utc::now, utc);
    let mut cmd = engine::SpendCmd::new(&user_id, payload.category_id, amount_minor, occurred_at);
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    let receipt = state.engine.create_expense(cmd).await?;
    Ok((StatusCode::CREATED, Json(spend_receipt(receipt))))
}

pub async fn expenses(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<ExpenseList>,
) -> Result<Json<Vec<ExpenseView>>, ServerError> {
    let expenses = state
        .engine
        .expenses(&user_id, query.category_id.as_deref())
        .await?;
    Ok(Json(expenses.into_iter().map(expense_view).collect()))
}

fn list_filter(query: TransactionList) -> Result<TransactionListFilter, ServerError> {
    Ok(TransactionListFilter {
        kind: query.kind.map(kind_from_api),
        status: query.status.map(status_from_api),
        min_amount_minor: query.min_amount.as_deref().map(parse_amount).transpose()?,
        max_amount_minor: query.max_amount.as_deref().map(parse_amount).transpose()?,
        from: query.from.map(utc),
        to: query.to.map(utc),
        limit: query.limit,
    })
}

pub async fn list(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<TransactionList>,
) -> Result<Json<TransactionListResponse>, ServerError> {
    let filter = list_filter(query)?;
    let transactions = state.engine.transactions(&user_id, &filter).await?;
    Ok(Json(TransactionListResponse {
        transactions: transactions.into_iter().map(transaction_view).collect(),
    }))
}

pub async fn get_detail(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(reference): Path<String>,
) -> Result<Json<TransactionView>, ServerError> {
    let transaction = state.engine.transaction(&user_id, &reference).await?;
    Ok(Json(transaction_view(transaction)))
}

/// Asks the gateway for the charge's outcome and finalizes it.
pub async fn verify(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(reference): Path<String>,
) -> Result<Json<TransactionView>, ServerError> {
    // Ownership check before any gateway traffic.
    state.engine.transaction(&user_id, &reference).await?;
    let transaction = state.engine.verify_and_finalize(&reference).await?;
    Ok(Json(transaction_view(transaction)))
}

pub async fn summary(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<SummaryView>, ServerError> {
    let summary = state.engine.summary(&user_id, Utc::now()).await?;
    Ok(Json(summary_view(summary)))
}
