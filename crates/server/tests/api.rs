use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::{
    ChargeRequest, ChargeStatus, Engine, GatewayError, InitializedCharge, PaymentGateway,
    PayoutAccount, SIGNATURE_HEADER, TransferReceipt, TransferRequest, VerifiedCharge,
    sign_payload,
};
use migration::MigratorTrait;
use server::{ServerState, router};

const SECRET: &[u8] = b"whsec_api_secret";

#[derive(Debug, Default)]
struct StubGateway {
    counter: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn initialize_charge(
        &self,
        _request: ChargeRequest,
    ) -> Result<InitializedCharge, GatewayError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(InitializedCharge {
            authorization_url: format!("https://checkout.test/ref_{n}"),
            reference: format!("ref_{n}"),
        })
    }

    async fn verify_charge(&self, _reference: &str) -> Result<VerifiedCharge, GatewayError> {
        Ok(VerifiedCharge {
            status: ChargeStatus::Pending,
            amount_minor: 0,
            paid_at: None,
        })
    }

    async fn create_payout_recipient(
        &self,
        account: &PayoutAccount,
        _name: &str,
    ) -> Result<String, GatewayError> {
        Ok(format!("RCP_{}", account.account_number))
    }

    async fn initiate_transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TransferReceipt, GatewayError> {
        Ok(TransferReceipt {
            transfer_ref: format!("TRF_{}", request.reference),
        })
    }

    async fn resolve_account_name(
        &self,
        _account_number: &str,
        _bank_code: &str,
    ) -> Result<String, GatewayError> {
        Ok("ADA OBI".to_string())
    }
}

async fn app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db)
        .gateway(Arc::new(StubGateway::default()))
        .webhook_secret(SECRET)
        .build()
        .await
        .unwrap();
    router(ServerState {
        engine: Arc::new(engine),
    })
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn webhook(app: &Router, body: &[u8], signature: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/payment")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_vec())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn register(app: &Router, user: &str) {
    let (status, _) = send(
        app,
        "POST",
        "/register",
        Some(user),
        Some(json!({ "email": format!("{user}@example.com"), "name": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

fn month_window() -> Value {
    let now = chrono::Utc::now();
    json!({
        "start": (now - chrono::TimeDelta::days(15)).to_rfc3339(),
        "end": (now + chrono::TimeDelta::days(15)).to_rfc3339(),
    })
}

#[tokio::test]
async fn unknown_or_missing_user_is_rejected() {
    let app = app().await;

    let (status, _) = send(&app, "GET", "/wallet", Some("ghost"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/wallet", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registered_user_sees_an_empty_wallet() {
    let app = app().await;
    register(&app, "alice").await;

    let (status, body) = send(&app, "GET", "/wallet", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], "0.00");
    assert_eq!(body["has_payout_account"], false);

    let (status, body) = send(
        &app,
        "POST",
        "/register",
        Some("alice"),
        Some(json!({ "email": "alice@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn payment_requires_budget_then_debits_wallet() {
    let app = app().await;
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/income",
        Some("alice"),
        Some(json!({ "amount": "100.00", "description": "salary" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balance"], "100.00");

    let payment = json!({ "category_id": "food", "amount": "40.00" });
    let (status, body) = send(&app, "POST", "/wallet/pay", Some("alice"), Some(payment.clone())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "no_active_budget");

    let window = month_window();
    let (status, _) = send(
        &app,
        "POST",
        "/budgets",
        Some("alice"),
        Some(json!({
            "category_id": "food",
            "amount": "50.00",
            "start_date": window["start"],
            "end_date": window["end"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", "/wallet/pay", Some("alice"), Some(payment.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balance"], "60.00");
    assert_eq!(body["budget_remaining"], "10.00");
    assert_eq!(body["transaction"]["kind"], "expense");

    let (status, body) = send(&app, "POST", "/wallet/pay", Some("alice"), Some(payment)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "budget_exceeded");

    let (status, body) = send(&app, "GET", "/budgets/summary", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["spent"], "40.00");
    assert_eq!(body[0]["percent_used"], 80);

    // An expense dated outside the current window is refused.
    let backdated = (chrono::Utc::now() - chrono::TimeDelta::days(60)).to_rfc3339();
    let (status, body) = send(
        &app,
        "POST",
        "/expenses",
        Some("alice"),
        Some(json!({ "category_id": "food", "amount": "5.00", "occurred_at": backdated })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "invalid_input");

    let (status, body) = send(&app, "GET", "/summary", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["income"], "100.00");
    assert_eq!(body["expenses"], "40.00");
    assert_eq!(body["balance"], "60.00");
    assert_eq!(body["expenses_by_category"][0]["category_id"], "food");
    assert_eq!(body["expenses_by_category"][0]["spent"], "40.00");
    assert_eq!(body["budgets"][0]["percent_used"], 80);
}

#[tokio::test]
async fn malformed_amounts_are_rejected() {
    let app = app().await;
    register(&app, "alice").await;

    for amount in ["0", "-5.00", "abc"] {
        let (status, body) = send(
            &app,
            "POST",
            "/income",
            Some("alice"),
            Some(json!({ "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "amount {amount}");
        assert_eq!(body["kind"], "invalid_amount");
    }
}

#[tokio::test]
async fn deposit_is_credited_once_by_signed_webhook() {
    let app = app().await;
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/wallet/deposit",
        Some("alice"),
        Some(json!({ "amount": "25.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let reference = body["reference"].as_str().unwrap().to_string();

    let payload = serde_json::to_vec(&json!({
        "event": "charge.success",
        "data": { "reference": reference, "amount": 2500, "status": "success" },
    }))
    .unwrap();

    let (status, body) = webhook(&app, &payload, Some("00ff")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.is_empty());
    let (status, _) = webhook(&app, &payload, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let signature = sign_payload(SECRET, &payload).unwrap();
    for _ in 0..2 {
        let (status, _) = webhook(&app, &payload, Some(&signature)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, wallet) = send(&app, "GET", "/wallet", Some("alice"), None).await;
    assert_eq!(wallet["balance"], "25.00");

    let (status, tx) = send(
        &app,
        "GET",
        &format!("/transactions/{reference}"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tx["status"], "success");
    assert_eq!(tx["kind"], "deposit");

    register(&app, "bob").await;
    let (status, _) = send(
        &app,
        "GET",
        &format!("/transactions/{reference}"),
        Some("bob"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_with_signed_garbage_is_a_bad_request() {
    let app = app().await;
    let payload = b"{not json".to_vec();
    let signature = sign_payload(SECRET, &payload).unwrap();

    let (status, _) = webhook(&app, &payload, Some(&signature)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_webhook_event_is_acknowledged() {
    let app = app().await;
    let payload = serde_json::to_vec(&json!({ "event": "subscription.create", "data": {} })).unwrap();
    let signature = sign_payload(SECRET, &payload).unwrap();

    let (status, _) = webhook(&app, &payload, Some(&signature)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn transaction_list_filters_by_kind_and_amount() {
    let app = app().await;
    register(&app, "alice").await;
    for amount in ["5.00", "50.00", "500.00"] {
        send(
            &app,
            "POST",
            "/income",
            Some("alice"),
            Some(json!({ "amount": amount })),
        )
        .await;
    }

    let (status, body) = send(
        &app,
        "GET",
        "/transactions?kind=income&min_amount=10.00&max_amount=100.00",
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["amount"], "50.00");
}

#[tokio::test]
async fn beneficiary_round_trip() {
    let app = app().await;
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/beneficiaries",
        Some("alice"),
        Some(json!({
            "name": "Landlord",
            "account": { "account_number": "0123456789", "bank_code": "058", "bank_name": null },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["account_name"], "ADA OBI");
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "DELETE", &format!("/beneficiaries/{id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, "GET", &format!("/beneficiaries/{id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}
