//! Gateway callbacks: signature verification and event parsing.
//!
//! The gateway signs the raw request body with HMAC-SHA512 keyed by the
//! shared secret and sends the hex digest in a header. Nothing in the body
//! is trusted before [`verify_signature`] succeeds.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;

use crate::{ChargeMetadata, EngineError, ResultEngine};

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Checks `signature_hex` against the HMAC-SHA512 of `body`. The comparison
/// is constant time.
pub fn verify_signature(secret: &[u8], body: &[u8], signature_hex: &str) -> ResultEngine<()> {
    let expected =
        hex::decode(signature_hex.trim()).map_err(|_| EngineError::InvalidSignature)?;
    let mut mac = HmacSha512::new_from_slice(secret).map_err(|_| EngineError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| EngineError::InvalidSignature)
}

/// Hex HMAC-SHA512 of `body`, as the gateway computes it.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> ResultEngine<String> {
    let mut mac = HmacSha512::new_from_slice(secret)
        .map_err(|err| EngineError::InvalidInput(format!("webhook secret: {err}")))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventData {
    pub reference: String,
    pub amount_minor: Option<i64>,
    pub status: Option<String>,
    pub metadata: ChargeMetadata,
}

/// A verified gateway callback, one variant per event the ledger reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    ChargeSucceeded(EventData),
    ChargeFailed(EventData),
    TransferSucceeded(EventData),
    TransferFailed(EventData),
    TransferReversed(EventData),
    Unknown(String),
}

#[derive(Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Deserialize)]
struct RawData {
    reference: Option<String>,
    #[serde(default, alias = "amountMinor", alias = "amount_minor")]
    amount: Option<i64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl GatewayEvent {
    pub fn parse(body: &[u8]) -> ResultEngine<Self> {
        let raw: RawEvent = serde_json::from_slice(body)
            .map_err(|err| EngineError::InvalidInput(format!("webhook payload: {err}")))?;

        let known = matches!(
            raw.event.as_str(),
            "charge.success"
                | "charge.failed"
                | "transfer.success"
                | "transfer.failed"
                | "transfer.reversed"
        );
        if !known {
            return Ok(Self::Unknown(raw.event));
        }

        let data = raw
            .data
            .ok_or_else(|| EngineError::InvalidInput("webhook payload without data".into()))?;
        let reference = data
            .reference
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| EngineError::InvalidInput("webhook payload without reference".into()))?;
        // Metadata is free-form on the gateway side and is sometimes sent as
        // an empty string.
        let metadata = serde_json::from_value(data.metadata).unwrap_or_default();
        let data = EventData {
            reference,
            amount_minor: data.amount,
            status: data.status,
            metadata,
        };

        Ok(match raw.event.as_str() {
            "charge.success" => Self::ChargeSucceeded(data),
            "charge.failed" => Self::ChargeFailed(data),
            "transfer.success" => Self::TransferSucceeded(data),
            "transfer.failed" => Self::TransferFailed(data),
            _ => Self::TransferReversed(data),
        })
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::ChargeSucceeded(d)
            | Self::ChargeFailed(d)
            | Self::TransferSucceeded(d)
            | Self::TransferFailed(d)
            | Self::TransferReversed(d) => Some(d.reference.as_str()),
            Self::Unknown(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ChargeSucceeded(_) => "charge.success",
            Self::ChargeFailed(_) => "charge.failed",
            Self::TransferSucceeded(_) => "transfer.success",
            Self::TransferFailed(_) => "transfer.failed",
            Self::TransferReversed(_) => "transfer.reversed",
            Self::Unknown(name) => name.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"sk_test_secret";

    #[test]
    fn accepts_a_matching_signature() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign_payload(SECRET, body).unwrap();
        assert_eq!(signature.len(), 128);
        assert!(verify_signature(SECRET, body, &signature).is_ok());
        assert!(verify_signature(SECRET, body, &signature.to_uppercase()).is_ok());
    }

    #[test]
    fn rejects_tampered_body_wrong_secret_and_garbage() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign_payload(SECRET, body).unwrap();
        let tampered = br#"{"event":"charge.success "}"#;
        assert_eq!(
            verify_signature(SECRET, tampered, &signature),
            Err(EngineError::InvalidSignature)
        );
        assert_eq!(
            verify_signature(b"other", body, &signature),
            Err(EngineError::InvalidSignature)
        );
        assert_eq!(
            verify_signature(SECRET, body, "not-hex"),
            Err(EngineError::InvalidSignature)
        );
    }

    #[test]
    fn parses_charge_success_with_metadata() {
        let body = br#"{
            "event": "charge.success",
            "data": {
                "reference": "dep_1",
                "amount": 5000,
                "status": "success",
                "metadata": {"user_id": "alice", "kind": "deposit"}
            }
        }"#;
        let event = GatewayEvent::parse(body).unwrap();
        let GatewayEvent::ChargeSucceeded(data) = event else {
            panic!("unexpected event");
        };
        assert_eq!(data.reference, "dep_1");
        assert_eq!(data.amount_minor, Some(5000));
        assert_eq!(data.metadata.user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn tolerates_string_metadata_and_amount_minor_alias() {
        let body = br#"{"event":"transfer.reversed","data":{"reference":"wd_1","amountMinor":70,"metadata":""}}"#;
        let event = GatewayEvent::parse(body).unwrap();
        assert_eq!(event.name(), "transfer.reversed");
        assert_eq!(event.reference(), Some("wd_1"));
        let GatewayEvent::TransferReversed(data) = event else {
            panic!("unexpected event");
        };
        assert_eq!(data.amount_minor, Some(70));
        assert_eq!(data.metadata, ChargeMetadata::default());
    }

    #[test]
    fn unknown_events_are_not_errors() {
        let event = GatewayEvent::parse(br#"{"event":"subscription.create","data":{}}"#).unwrap();
        assert_eq!(event, GatewayEvent::Unknown("subscription.create".to_string()));
    }

    #[test]
    fn known_event_without_reference_is_invalid() {
        let err = GatewayEvent::parse(br#"{"event":"charge.success","data":{}}"#).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
