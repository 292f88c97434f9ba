//! Recurring expense endpoints.

use api_types::recurring::{RecurringExpenseNew, RecurringExpenseView};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::RecurringExpense;

use crate::{
    ServerError,
    convert::{frequency_from_api, recurring_view, utc},
    parse_amount,
    server::ServerState,
    user::CurrentUser,
};

pub async fn recurring_new(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<RecurringExpenseNew>,
) -> Result<(StatusCode, Json<RecurringExpenseView>), ServerError> {
    let amount_minor = parse_amount(&payload.amount)?;
    let item = RecurringExpense::new(
        &user_id,
        payload.category_id.trim(),
        amount_minor,
        payload.description,
        frequency_from_api(payload.frequency),
        utc(payload.start_date),
    )?
    .until(payload.end_date.map(utc));
    let item = state.engine.create_recurring_expense(item).await?;
    Ok((StatusCode::CREATED, Json(recurring_view(item))))
}

pub async fn list(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<RecurringExpenseView>>, ServerError> {
    let items = state.engine.recurring_expenses(&user_id).await?;
    Ok(Json(items.into_iter().map(recurring_view).collect()))
}
