//! Caller identity and registration.

use api_types::{user::UserRegister, wallet::Wallet};
use axum::{Json, extract::State, http::StatusCode};
use axum_extra::TypedHeader;

use crate::{
    ServerError,
    server::{ServerState, UserIdHeader},
    wallets::wallet_body,
};

/// The authenticated user, inserted by the auth middleware.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub String);

/// Creates the caller's account and wallet. The id comes from the identity
/// header; the user does not exist yet so this route is not behind `auth`.
pub async fn register(
    TypedHeader(UserIdHeader(user_id)): TypedHeader<UserIdHeader>,
    State(state): State<ServerState>,
    Json(payload): Json<UserRegister>,
) -> Result<(StatusCode, Json<Wallet>), ServerError> {
    let wallet = state
        .engine
        .register_user(
            &user_id,
            &payload.email,
            payload.name.as_deref(),
            payload.external_account_ref,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(wallet_body(wallet))))
}
