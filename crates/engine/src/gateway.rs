//! Contract of the external payment processor.
//!
//! The engine never talks HTTP itself: everything goes through a
//! [`PaymentGateway`] implementation injected at build time, and every call
//! is bounded by the engine's gateway timeout.

use std::{fmt::Debug, future::Future, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{EngineError, PayoutAccount};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0} timed out")]
    Timeout(String),
    #[error("gateway unreachable: {0}")]
    Unavailable(String),
    #[error("gateway rejected the request: {0}")]
    Rejected(String),
    #[error("could not resolve account: {0}")]
    Resolution(String),
}

impl From<GatewayError> for EngineError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Resolution(msg) => EngineError::RecipientResolutionFailed(msg),
            other => EngineError::GatewayUnavailable(format!("{other}, retry later")),
        }
    }
}

/// Metadata attached to a charge so the webhook can route it back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeMetadata {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChargeRequest {
    pub amount_minor: i64,
    pub payer_email: String,
    /// Subaccount that should receive the funds, when the wallet has one.
    pub account_ref: Option<String>,
    pub metadata: ChargeMetadata,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializedCharge {
    pub authorization_url: String,
    pub reference: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Success,
    Failed,
    /// Not settled yet (abandoned checkout, ongoing, ...).
    Pending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedCharge {
    pub status: ChargeStatus,
    pub amount_minor: i64,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    pub amount_minor: i64,
    pub recipient_ref: String,
    pub reference: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferReceipt {
    pub transfer_ref: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + Debug {
    async fn initialize_charge(
        &self,
        request: ChargeRequest,
    ) -> Result<InitializedCharge, GatewayError>;

    async fn verify_charge(&self, reference: &str) -> Result<VerifiedCharge, GatewayError>;

    async fn create_payout_recipient(
        &self,
        account: &PayoutAccount,
        name: &str,
    ) -> Result<String, GatewayError>;

    async fn initiate_transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TransferReceipt, GatewayError>;

    async fn resolve_account_name(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<String, GatewayError>;
}

/// Runs a gateway call with an upper bound on its duration.
pub(crate) async fn bounded<T, F>(limit: Duration, op: &str, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(op.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_turns_slow_calls_into_timeouts() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, GatewayError>(1)
        };
        let err = bounded(Duration::from_millis(10), "verify", slow)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Timeout("verify".to_string()));
    }

    #[test]
    fn resolution_errors_keep_their_kind() {
        let err: EngineError = GatewayError::Resolution("bad account".into()).into();
        assert_eq!(err.kind(), "recipient_resolution_failed");
        let err: EngineError = GatewayError::Timeout("transfer".into()).into();
        assert_eq!(err.kind(), "gateway_unavailable");
        assert!(err.to_string().contains("retry"));
    }
}
