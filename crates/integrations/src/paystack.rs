//! Paystack REST client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine::{
    ChargeRequest, ChargeStatus, GatewayError, InitializedCharge, PaymentGateway, PayoutAccount,
    TransferReceipt, TransferRequest, VerifiedCharge,
};
use reqwest::{RequestBuilder, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, warn};

use crate::{IntegrationError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";
const CURRENCY: &str = "NGN";

/// Every Paystack response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: i64,
    #[serde(default)]
    paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RecipientData {
    recipient_code: String,
}

#[derive(Debug, Deserialize)]
struct TransferData {
    transfer_code: String,
}

#[derive(Debug, Deserialize)]
struct ResolveData {
    account_name: String,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    amount: i64,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    subaccount: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bearer: Option<&'static str>,
    metadata: &'a engine::ChargeMetadata,
}

/// Maps Paystack's charge statuses onto the three the ledger knows about.
fn charge_status(status: &str) -> ChargeStatus {
    match status {
        "success" => ChargeStatus::Success,
        "failed" | "reversed" => ChargeStatus::Failed,
        _ => ChargeStatus::Pending,
    }
}

#[derive(Clone, Debug)]
pub struct PaystackClient {
    base_url: Url,
    secret_key: String,
    http: reqwest::Client,
}

impl PaystackClient {
    pub fn new(base_url: &str, secret_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let secret_key = secret_key.into();
        if secret_key.trim().is_empty() {
            return Err(IntegrationError::Missing("paystack.secret_key"));
        }
        // `Url::join` drops the last segment unless the base ends with '/'.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|err| IntegrationError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            secret_key,
            http,
        })
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|err| GatewayError::Rejected(format!("invalid endpoint {path}: {err}")))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        op: &str,
        request: RequestBuilder,
    ) -> std::result::Result<T, GatewayError> {
        let res = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|err| transport_error(op, err))?;

        let status = res.status();
        let envelope = res.json::<Envelope<T>>().await;
        match envelope {
            Ok(Envelope {
                status: true,
                data: Some(data),
                ..
            }) if status.is_success() => Ok(data),
            Ok(envelope) if status.is_server_error() => Err(GatewayError::Unavailable(format!(
                "{op}: {status} {}",
                envelope.message
            ))),
            Ok(envelope) => {
                warn!(op, %status, message = %envelope.message, "paystack rejected request");
                Err(GatewayError::Rejected(format!("{op}: {}", envelope.message)))
            }
            Err(err) if status.is_server_error() => {
                Err(GatewayError::Unavailable(format!("{op}: {status} ({err})")))
            }
            Err(err) => Err(GatewayError::Rejected(format!(
                "{op}: unexpected response {status} ({err})"
            ))),
        }
    }
}

fn transport_error(op: &str, err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(op.to_string())
    } else {
        GatewayError::Unavailable(format!("{op}: {err}"))
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize_charge(
        &self,
        request: ChargeRequest,
    ) -> std::result::Result<InitializedCharge, GatewayError> {
        let account_ref = request.account_ref.as_deref();
        let body = InitializeBody {
            amount: request.amount_minor,
            email: &request.payer_email,
            subaccount: account_ref,
            bearer: account_ref.map(|_| "subaccount"),
            metadata: &request.metadata,
        };
        let url = self.endpoint("transaction/initialize")?;
        let data: InitializeData = self
            .call("initialize_charge", self.http.post(url).json(&body))
            .await?;
        debug!(reference = %data.reference, "charge initialized");
        Ok(InitializedCharge {
            authorization_url: data.authorization_url,
            reference: data.reference,
        })
    }

    async fn verify_charge(&self, reference: &str) -> std::result::Result<VerifiedCharge, GatewayError> {
        let mut url = self.endpoint("transaction/verify/")?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::Rejected("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(reference);
        let data: VerifyData = self.call("verify_charge", self.http.get(url)).await?;
        Ok(VerifiedCharge {
            status: charge_status(&data.status),
            amount_minor: data.amount,
            paid_at: data.paid_at,
        })
    }

    async fn create_payout_recipient(
        &self,
        account: &PayoutAccount,
        name: &str,
    ) -> std::result::Result<String, GatewayError> {
        let body = json!({
            "type": "nuban",
            "name": name,
            "account_number": account.account_number,
            "bank_code": account.bank_code,
            "currency": CURRENCY,
        });
        let url = self.endpoint("transferrecipient")?;
        let data: RecipientData = self
            .call("create_payout_recipient", self.http.post(url).json(&body))
            .await?;
        Ok(data.recipient_code)
    }

    async fn initiate_transfer(
        &self,
        request: TransferRequest,
    ) -> std::result::Result<TransferReceipt, GatewayError> {
        let body = json!({
            "source": "balance",
            "amount": request.amount_minor,
            "recipient": request.recipient_ref,
            "reason": request.reason,
            "reference": request.reference,
        });
        let url = self.endpoint("transfer")?;
        let data: TransferData = self
            .call("initiate_transfer", self.http.post(url).json(&body))
            .await?;
        Ok(TransferReceipt {
            transfer_ref: data.transfer_code,
        })
    }

    async fn resolve_account_name(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> std::result::Result<String, GatewayError> {
        let url = self.endpoint("bank/resolve")?;
        let request = self
            .http
            .get(url)
            .query(&[("account_number", account_number), ("bank_code", bank_code)]);
        match self.call::<ResolveData>("resolve_account_name", request).await {
            Ok(data) => Ok(data.account_name),
            // Paystack answers 422 for accounts it cannot match.
            Err(GatewayError::Rejected(msg)) => Err(GatewayError::Resolution(msg)),
            Err(err) => Err(err),
        }
    }
}
