//! Budget endpoints.

use api_types::budget::{BudgetNew, BudgetSummaryQuery, BudgetUsageView, BudgetView};
use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::Budget;

use crate::{
    ServerError,
    convert::{budget_view, frequency_from_api, usage_view, utc},
    parse_amount,
    server::ServerState,
    user::CurrentUser,
};

pub async fn budget_new(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<BudgetNew>,
) -> Result<(StatusCode, Json<BudgetView>), ServerError> {
    let amount_minor = parse_amount(&payload.amount)?;
    let mut budget = Budget::new(
        &user_id,
        payload.category_id.trim(),
        amount_minor,
        utc(payload.start_date),
        utc(payload.end_date),
    )?;
    if let Some(frequency) = payload.frequency {
        budget = budget.recurring(frequency_from_api(frequency));
    }
    let budget = state.engine.create_budget(budget).await?;
    Ok((StatusCode::CREATED, Json(budget_view(budget))))
}

pub async fn list(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<BudgetView>>, ServerError> {
    let budgets = state.engine.budgets(&user_id).await?;
    Ok(Json(budgets.into_iter().map(budget_view).collect()))
}

/// Usage of the budgets active right now.
pub async fn summary(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<BudgetSummaryQuery>,
) -> Result<Json<Vec<BudgetUsageView>>, ServerError> {
    let usage = state
        .engine
        .budget_summary(&user_id, query.category_id.as_deref(), Utc::now())
        .await?;
    Ok(Json(usage.into_iter().map(usage_view).collect()))
}
