use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as AxumError, Header},
};

use std::sync::Arc;

use crate::{
    beneficiaries, bills, budgets, recurring, transactions,
    user::{self, CurrentUser},
    wallets, webhook,
};
use engine::{Engine, EngineError};

static USER_ID_HEADER: axum::http::HeaderName = axum::http::HeaderName::from_static("x-user-id");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// `TypedHeader` for the caller identity.
///
/// Authentication happens upstream; requests reach us with the verified
/// user id in "x-user-id".
#[derive(Debug)]
pub struct UserIdHeader(pub String);

impl Header for UserIdHeader {
    fn name() -> &'static axum::http::HeaderName {
        &USER_ID_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(AxumError::invalid());
        }

        Ok(UserIdHeader(value.to_string()))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        match axum::http::HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-user-id header"),
        }
    }
}

async fn auth(
    TypedHeader(UserIdHeader(user_id)): TypedHeader<UserIdHeader>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    match state.engine.wallet(&user_id).await {
        Ok(_) => {}
        Err(EngineError::WalletNotFound(_)) => return Err(StatusCode::UNAUTHORIZED),
        Err(err) => {
            tracing::error!("failed to resolve user {user_id}: {err}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    request.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    let protected = Router::new()
        .route("/wallet", get(wallets::get))
        .route("/wallet/deposit", post(wallets::deposit))
        .route("/wallet/confirm-deposit", post(wallets::confirm_deposit))
        .route("/wallet/pay", post(wallets::pay))
        .route("/wallet/withdraw", post(wallets::withdraw))
        .route("/income", post(transactions::income_new))
        .route(
            "/expenses",
            get(transactions::expenses).post(transactions::expense_new),
        )
        .route("/transactions", get(transactions::list))
        .route("/summary", get(transactions::summary))
        .route("/transactions/{reference}", get(transactions::get_detail))
        .route("/transactions/{reference}/verify", post(transactions::verify))
        .route("/budgets", get(budgets::list).post(budgets::budget_new))
        .route("/budgets/summary", get(budgets::summary))
        .route("/bills", get(bills::list).post(bills::bill_new))
        .route("/bills/{id}", get(bills::get))
        .route("/bills/{id}/pay", post(bills::pay))
        .route("/bills/{id}/pay-transfer", post(bills::pay_transfer))
        .route(
            "/beneficiaries",
            get(beneficiaries::list).post(beneficiaries::beneficiary_new),
        )
        .route(
            "/beneficiaries/{id}",
            get(beneficiaries::get).delete(beneficiaries::remove),
        )
        .route(
            "/recurring-expenses",
            get(recurring::list).post(recurring::recurring_new),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth));

    Router::new()
        .merge(protected)
        .route("/register", post(user::register))
        .route("/webhooks/payment", post(webhook::receive))
        .route("/transactions/webhook", post(webhook::receive))
        .with_state(state)
}

pub async fn run(engine: Arc<Engine>, addr: &str) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {addr}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Arc<Engine>,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState { engine };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Arc<Engine>,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
