//! Saved payout destinations.

use api_types::beneficiary::{BeneficiaryNew, BeneficiaryView};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    ServerError,
    convert::{account_from_api, beneficiary_view},
    server::ServerState,
    user::CurrentUser,
};

pub async fn beneficiary_new(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<BeneficiaryNew>,
) -> Result<(StatusCode, Json<BeneficiaryView>), ServerError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ServerError::Generic("name must not be empty".to_string()));
    }
    let account = account_from_api(payload.account)?;
    let beneficiary = state
        .engine
        .create_beneficiary(&user_id, name, account)
        .await?;
    Ok((StatusCode::CREATED, Json(beneficiary_view(beneficiary))))
}

pub async fn list(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<BeneficiaryView>>, ServerError> {
    let beneficiaries = state.engine.beneficiaries(&user_id).await?;
    Ok(Json(
        beneficiaries.into_iter().map(beneficiary_view).collect(),
    ))
}

pub async fn get(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<BeneficiaryView>, ServerError> {
    let beneficiary = state.engine.beneficiary(&user_id, &id).await?;
    Ok(Json(beneficiary_view(beneficiary)))
}

pub async fn remove(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.engine.remove_beneficiary(&user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
