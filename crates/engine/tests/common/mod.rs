#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{
    Budget, ChargeRequest, ChargeStatus, Engine, GatewayError, InitializedCharge, Notifier,
    NotifyError, PaymentGateway, PayoutAccount, Transaction, TransactionListFilter,
    TransferReceipt, TransferRequest, UserContact, VerifiedCharge, sign_payload,
};
use migration::MigratorTrait;

pub const SECRET: &[u8] = b"whsec_test_secret";

/// Scripted gateway. Charges are pending until a verification is set.
#[derive(Debug, Default)]
pub struct MockGateway {
    counter: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub fail_transfers: AtomicBool,
    pub slow: AtomicBool,
    verifications: Mutex<HashMap<String, VerifiedCharge>>,
    pub transfers: Mutex<Vec<TransferRequest>>,
    pub charges: Mutex<Vec<ChargeRequest>>,
}

impl MockGateway {
    pub fn settle(&self, reference: &str, status: ChargeStatus, amount_minor: i64) {
        self.verifications.lock().unwrap().insert(
            reference.to_string(),
            VerifiedCharge {
                status,
                amount_minor,
                paid_at: Some(Utc::now()),
            },
        );
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }

    async fn maybe_stall(&self) {
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    fn next(&self) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initialize_charge(
        &self,
        request: ChargeRequest,
    ) -> Result<InitializedCharge, GatewayError> {
        self.maybe_stall().await;
        let n = self.next();
        self.charges.lock().unwrap().push(request);
        Ok(InitializedCharge {
            authorization_url: format!("https://checkout.test/chg_{n}"),
            reference: format!("chg_{n}"),
        })
    }

    async fn verify_charge(&self, reference: &str) -> Result<VerifiedCharge, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall().await;
        Ok(self
            .verifications
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .unwrap_or(VerifiedCharge {
                status: ChargeStatus::Pending,
                amount_minor: 0,
                paid_at: None,
            }))
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
        self.maybe_stall().await;
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("insufficient merchant balance".into()));
        }
        let n = self.next();
        self.transfers.lock().unwrap().push(request);
        Ok(TransferReceipt {
            transfer_ref: format!("TRF_{n}"),
        })
    }

    async fn resolve_account_name(
        &self,
        account_number: &str,
        _bank_code: &str,
    ) -> Result<String, GatewayError> {
        if account_number.starts_with("000") {
            return Err(GatewayError::Resolution("account not found".into()));
        }
        Ok("ADA OBI".to_string())
    }
}

/// Keeps every notification as a short line.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn lines(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Notifications run on their own task, give them a moment.
    pub async fn wait_for(&self, needle: &str) -> bool {
        for _ in 0..100 {
            if self.lines().iter().any(|line| line.contains(needle)) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, to: &str, subject: &str, _html: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(format!("email:{to}:{subject}"));
        Ok(())
    }

    async fn send_transaction_alert(
        &self,
        user: &UserContact,
        transaction: &Transaction,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(format!(
            "alert:{}:{}:{}",
            user.user_id,
            transaction.reference,
            transaction.status.as_str()
        ));
        Ok(())
    }

    async fn send_budget_threshold_alert(
        &self,
        user: &UserContact,
        budget: &Budget,
        percent_used: u32,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push(format!("budget:{}:{}:{percent_used}", user.user_id, budget.id));
        Ok(())
    }
}

pub struct Harness {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn harness() -> Harness {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let gateway = Arc::new(MockGateway::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Engine::builder()
        .database(db.clone())
        .gateway(gateway.clone())
        .notifier(notifier.clone())
        .gateway_timeout(Duration::from_millis(200))
        .webhook_secret(SECRET)
        .build()
        .await
        .unwrap();
    Harness {
        engine: Arc::new(engine),
        db,
        gateway,
        notifier,
    }
}

impl Harness {
    /// Registers `user_id` and funds the wallet through recorded income.
    pub async fn user_with_balance(&self, user_id: &str, balance: i64) {
        self.engine
            .register_user(user_id, &format!("{user_id}@example.com"), Some(user_id), None)
            .await
            .unwrap();
        if balance > 0 {
            self.engine
                .record_income(user_id, balance, Some("salary"), Utc::now())
                .await
                .unwrap();
        }
    }

    /// A budget active for the 30 days around now.
    pub async fn budget(&self, user_id: &str, category_id: &str, amount_minor: i64) -> Budget {
        let now = Utc::now();
        let budget = Budget::new(
            user_id,
            category_id,
            amount_minor,
            now - TimeDelta::days(30),
            now + TimeDelta::days(30),
        )
        .unwrap();
        self.engine.create_budget(budget).await.unwrap()
    }

    /// `balance == sum of the signed amounts of applied entries`. Transfers
    /// and withdrawals count from the moment they were debited, even while
    /// still pending at the gateway.
    pub async fn assert_balance_consistent(&self, user_id: &str) {
        let entries = self
            .engine
            .transactions(user_id, &TransactionListFilter::default())
            .await
            .unwrap();
        let applied: i64 = entries
            .iter()
            .filter(|t| t.wallet_applied)
            .map(|t| t.kind.wallet_delta(t.amount_minor))
            .sum();
        assert_eq!(self.engine.balance(user_id).await.unwrap(), applied);
    }
}

/// Serialized event plus the signature the gateway would send with it.
pub fn signed_event(event: &str, data: serde_json::Value) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(&serde_json::json!({ "event": event, "data": data })).unwrap();
    let signature = sign_payload(SECRET, &body).unwrap();
    (body, signature)
}

pub fn account(number: &str) -> PayoutAccount {
    PayoutAccount::new(number, "058", Some("GTBank".to_string())).unwrap()
}

pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc()
}
