//! Gateway callbacks.
//!
//! The gateway retries anything that is not a 2xx, so only failures that a
//! retry can fix are reported as such. Rejected signatures get an empty 401.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use engine::{EngineError, SIGNATURE_HEADER, WebhookOutcome};

use crate::{ServerError, server::ServerState};

pub async fn receive(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.engine.handle_webhook(signature, &body).await {
        Ok(WebhookOutcome::Finalized(finalization)) => {
            tracing::info!(
                reference = %finalization.transaction.reference,
                status = finalization.transaction.status.as_str(),
                changed = finalization.changed,
                compensated = finalization.compensated,
                "webhook finalized transaction"
            );
            StatusCode::OK.into_response()
        }
        Ok(WebhookOutcome::Recorded(transaction)) => {
            tracing::info!(reference = %transaction.reference, "webhook recorded charge");
            StatusCode::OK.into_response()
        }
        Ok(WebhookOutcome::Ignored(reason)) => {
            tracing::debug!("webhook ignored: {reason}");
            StatusCode::OK.into_response()
        }
        Err(EngineError::InvalidSignature) => {
            tracing::warn!("webhook rejected: bad signature");
            ServerError::Engine(EngineError::InvalidSignature).into_response()
        }
        Err(err) if err.is_transient() => {
            tracing::error!("webhook processing failed, gateway will retry: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err @ EngineError::InvalidInput(_)) => {
            ServerError::Generic(err.to_string()).into_response()
        }
        Err(err) => {
            // Retrying cannot change the outcome.
            tracing::warn!("webhook not applied: {err}");
            StatusCode::OK.into_response()
        }
    }
}
