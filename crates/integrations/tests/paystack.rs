use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use engine::{
    ChargeMetadata, ChargeRequest, ChargeStatus, GatewayError, PaymentGateway, PayoutAccount,
    TransferRequest,
};
use integrations::PaystackClient;
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Seen {
    bodies: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

fn record(seen: &Seen, headers: &HeaderMap, body: Value) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.auth.lock().unwrap().push(auth);
    seen.bodies.lock().unwrap().push(body);
}

async fn initialize(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record(&seen, &headers, body);
    Json(json!({
        "status": true,
        "message": "Authorization URL created",
        "data": {
            "authorization_url": "https://checkout.paystack.com/abc",
            "access_code": "abc",
            "reference": "ps_ref_1",
        },
    }))
}

async fn verify(Path(reference): Path<String>) -> (StatusCode, Json<Value>) {
    match reference.as_str() {
        "ps_ref_1" => (
            StatusCode::OK,
            Json(json!({
                "status": true,
                "message": "Verification successful",
                "data": { "status": "success", "amount": 5000, "paid_at": "2025-01-02T10:00:00Z" },
            })),
        ),
        "abandoned" => (
            StatusCode::OK,
            Json(json!({
                "status": true,
                "message": "Verification successful",
                "data": { "status": "abandoned", "amount": 5000, "paid_at": null },
            })),
        ),
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": false, "message": "try again" })),
        ),
    }
}

async fn recipient(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    record(&seen, &headers, body);
    Json(json!({ "status": true, "message": "ok", "data": { "recipient_code": "RCP_xyz" } }))
}

async fn transfer(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["amount"].as_i64() == Some(1) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": false, "message": "Insufficient balance" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "status": true, "message": "queued", "data": { "transfer_code": "TRF_abc", "status": "pending" } })),
    )
}

async fn resolve(Query(query): Query<Vec<(String, String)>>) -> (StatusCode, Json<Value>) {
    let number = query
        .iter()
        .find(|(k, _)| k == "account_number")
        .map(|(_, v)| v.as_str())
        .unwrap_or_default();
    if number == "0123456789" {
        (
            StatusCode::OK,
            Json(json!({ "status": true, "message": "resolved", "data": { "account_name": "ADA OBI" } })),
        )
    } else {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "status": false, "message": "Could not resolve account name" })),
        )
    }
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({ "status": true, "message": "late", "data": null }))
}

async fn fake_paystack() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/transaction/initialize", post(initialize))
        .route("/transaction/verify/{reference}", get(verify))
        .route("/transferrecipient", post(recipient))
        .route("/transfer", post(transfer))
        .route("/bank/resolve", get(resolve))
        .route("/slow/transaction/verify/{reference}", get(slow))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn client(base_url: &str) -> PaystackClient {
    PaystackClient::new(base_url, "sk_test_123", Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn initialize_sends_amount_in_minor_units_and_subaccount() {
    let (base, seen) = fake_paystack().await;
    let charge = client(&base)
        .initialize_charge(ChargeRequest {
            amount_minor: 5000,
            payer_email: "ada@example.com".to_string(),
            account_ref: Some("ACCT_1".to_string()),
            metadata: ChargeMetadata {
                user_id: Some("ada".to_string()),
                kind: Some("deposit".to_string()),
                category_id: None,
            },
        })
        .await
        .unwrap();

    assert_eq!(charge.reference, "ps_ref_1");
    let body = seen.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["amount"], 5000);
    assert_eq!(body["subaccount"], "ACCT_1");
    assert_eq!(body["bearer"], "subaccount");
    assert_eq!(body["metadata"]["user_id"], "ada");
    assert_eq!(seen.auth.lock().unwrap()[0], "Bearer sk_test_123");
}

#[tokio::test]
async fn verify_maps_statuses() {
    let (base, _) = fake_paystack().await;
    let client = client(&base);

    let paid = client.verify_charge("ps_ref_1").await.unwrap();
    assert_eq!(paid.status, ChargeStatus::Success);
    assert_eq!(paid.amount_minor, 5000);
    assert!(paid.paid_at.is_some());

    let abandoned = client.verify_charge("abandoned").await.unwrap();
    assert_eq!(abandoned.status, ChargeStatus::Pending);
}

#[tokio::test]
async fn server_errors_are_unavailable_not_rejected() {
    let (base, _) = fake_paystack().await;
    let err = client(&base).verify_charge("unknown").await.unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable(_)), "{err:?}");
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let (base, _) = fake_paystack().await;
    let err = client(&format!("{base}/slow"))
        .verify_charge("ps_ref_1")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn transfers_and_recipients() {
    let (base, seen) = fake_paystack().await;
    let client = client(&base);
    let account = PayoutAccount::new("0123456789", "058", None).unwrap();

    let recipient = client.create_payout_recipient(&account, "Ada Obi").await.unwrap();
    assert_eq!(recipient, "RCP_xyz");
    let body = seen.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["type"], "nuban");
    assert_eq!(body["bank_code"], "058");

    let receipt = client
        .initiate_transfer(TransferRequest {
            amount_minor: 2500,
            recipient_ref: recipient.clone(),
            reference: "wd_1".to_string(),
            reason: "withdrawal".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(receipt.transfer_ref, "TRF_abc");

    let err = client
        .initiate_transfer(TransferRequest {
            amount_minor: 1,
            recipient_ref: recipient,
            reference: "wd_2".to_string(),
            reason: "withdrawal".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Rejected(msg) if msg.contains("Insufficient balance")));
}

#[tokio::test]
async fn unresolvable_accounts_are_resolution_errors() {
    let (base, _) = fake_paystack().await;
    let client = client(&base);

    assert_eq!(
        client.resolve_account_name("0123456789", "058").await.unwrap(),
        "ADA OBI"
    );
    let err = client
        .resolve_account_name("0000000000", "058")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Resolution(_)), "{err:?}");
}
