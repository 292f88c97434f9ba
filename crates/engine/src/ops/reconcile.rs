//! Reconciliation of gateway outcomes with pending ledger entries.
//!
//! A ledger entry leaves `pending` exactly once. The transition is a
//! conditional update on `status = 'pending'`, so when a webhook and a
//! manual verify race on the same reference only one of them changes
//! anything; the other observes the terminal state. Wallet effects are
//! applied in the same DB transaction as the winning transition.

use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryFilter, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    ChargeCmd, ChargeMetadata, ChargeRequest, ChargeStatus, EngineError, EventData,
    GatewayEvent, InitializedCharge, Money, Notification, ResultEngine, Transaction,
    TransactionKind, TransactionStatus, expenses, transactions, verify_signature,
};

use super::{
    Engine,
    bills::reopen_bill,
    ledger::{find_by_reference, insert_transaction},
    normalize_optional_text, require_positive,
    wallets::{adjust_balance, load_wallet},
    with_tx,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Outcome {
    Succeeded,
    Failed,
}

/// Result of driving a reference to a terminal state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Finalization {
    pub transaction: Transaction,
    /// `false` when the reference was already terminal and nothing happened.
    pub changed: bool,
    /// `true` when a debit already taken was credited back.
    pub compensated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    Finalized(Finalization),
    /// A successful charge the ledger did not know about, recorded and credited.
    Recorded(Transaction),
    Ignored(String),
}

async fn apply_outcome<C: ConnectionTrait>(
    conn: &C,
    current: Transaction,
    outcome: Outcome,
) -> ResultEngine<Finalization> {
    let now = Utc::now();
    let (status, applied) = match outcome {
        Outcome::Succeeded => (TransactionStatus::Success, true),
        Outcome::Failed => (TransactionStatus::Failed, false),
    };
    let claimed = transactions::Entity::update_many()
        .col_expr(transactions::Column::Status, Expr::value(status.as_str()))
        .col_expr(transactions::Column::WalletApplied, Expr::value(applied))
        .col_expr(transactions::Column::FinalizedAt, Expr::value(Some(now)))
        .filter(transactions::Column::Reference.eq(current.reference.as_str()))
        .filter(transactions::Column::Status.eq(TransactionStatus::Pending.as_str()))
        .exec(conn)
        .await?;
    if claimed.rows_affected == 0 {
        let latest = find_by_reference(conn, &current.reference).await?;
        return Ok(Finalization {
            transaction: latest,
            changed: false,
            compensated: false,
        });
    }

    let delta = current.kind.wallet_delta(current.amount_minor);
    let mut compensated = false;
    match outcome {
        Outcome::Succeeded if !current.wallet_applied => {
            adjust_balance(conn, &current.user_id, delta).await?;
        }
        Outcome::Failed if current.wallet_applied => {
            adjust_balance(conn, &current.user_id, -delta).await?;
            expenses::Entity::delete_many()
                .filter(expenses::Column::Reference.eq(current.reference.as_str()))
                .exec(conn)
                .await?;
            if let Some(bill_id) = &current.bill_id {
                reopen_bill(conn, bill_id).await?;
            }
            compensated = true;
        }
        _ => {}
    }

    Ok(Finalization {
        transaction: Transaction {
            status,
            wallet_applied: applied,
            finalized_at: Some(now),
            ..current
        },
        changed: true,
        compensated,
    })
}

impl Engine {
    /// Moves `reference` out of `pending`. Idempotent: a terminal reference
    /// is returned unchanged.
    pub(super) async fn finalize(
        &self,
        reference: &str,
        outcome: Outcome,
    ) -> ResultEngine<Finalization> {
        let current = find_by_reference(&self.database, reference).await?;
        if current.status.is_terminal() {
            debug!(reference, status = current.status.as_str(), "already finalized");
            return Ok(Finalization {
                transaction: current,
                changed: false,
                compensated: false,
            });
        }

        let _guard = self.locks.lock(&current.user_id).await;
        let finalization = self.finalize_locked(reference, outcome).await?;
        if !finalization.changed {
            debug!(reference, "finalized concurrently");
            return Ok(finalization);
        }

        let transaction = &finalization.transaction;
        info!(
            user_id = %transaction.user_id,
            reference,
            kind = transaction.kind.as_str(),
            status = transaction.status.as_str(),
            compensated = finalization.compensated,
            "transaction finalized"
        );
        let alert = transaction.clone();
        self.notify(&transaction.user_id, move |user| {
            Notification::TransactionAlert {
                user,
                transaction: alert,
            }
        })
        .await;
        if finalization.compensated {
            let amount = Money::new(transaction.amount_minor);
            self.notify(&transaction.user_id, move |user| {
                Notification::email(
                    user.email,
                    "Your payment was reversed",
                    format!(
                        "<p>Hi {},</p><p>The payment {reference} of {amount} did not go through. \
                         The amount has been returned to your wallet.</p>",
                        user.name
                    ),
                )
            })
            .await;
        }
        Ok(finalization)
    }

    /// Same as [`Engine::finalize`] for callers already holding the user's lock.
    pub(super) async fn finalize_locked(
        &self,
        reference: &str,
        outcome: Outcome,
    ) -> ResultEngine<Finalization> {
        with_tx!(self, |db_tx| {
            let current = find_by_reference(&db_tx, reference).await?;
            if current.status.is_terminal() {
                Ok(Finalization {
                    transaction: current,
                    changed: false,
                    compensated: false,
                })
            } else {
                apply_outcome(&db_tx, current, outcome).await
            }
        })
    }

    /// Starts a wallet top-up at the gateway.
    pub async fn initiate_deposit(
        &self,
        user_id: &str,
        amount_minor: i64,
    ) -> ResultEngine<InitializedCharge> {
        self.initiate_charge(
            ChargeCmd::new(user_id, TransactionKind::Deposit, amount_minor)
                .description("Wallet deposit"),
        )
        .await
    }

    /// Starts a gateway charge and records it as a pending credit under the
    /// reference the gateway returned.
    pub async fn initiate_charge(&self, cmd: ChargeCmd) -> ResultEngine<InitializedCharge> {
        require_positive(cmd.amount_minor)?;
        if !cmd.kind.is_credit() {
            return Err(EngineError::InvalidInput(format!(
                "a charge cannot create a {} transaction",
                cmd.kind.as_str()
            )));
        }
        let contact = self.user_contact(&cmd.user_id).await?;
        let wallet = load_wallet(&self.database, &cmd.user_id).await?;

        let request = ChargeRequest {
            amount_minor: cmd.amount_minor,
            payer_email: contact.email,
            account_ref: wallet.external_account_ref,
            metadata: ChargeMetadata {
                user_id: Some(cmd.user_id.clone()),
                kind: Some(cmd.kind.as_str().to_string()),
                category_id: cmd.category_id.clone(),
            },
        };
        let charge = self
            .gateway_call("initialize_charge", self.gateway.initialize_charge(request))
            .await?;

        let transaction = Transaction::new(
            &cmd.user_id,
            charge.reference.clone(),
            cmd.kind,
            cmd.amount_minor,
            Utc::now(),
        )?
        .category(cmd.category_id)
        .description(normalize_optional_text(cmd.description.as_deref()));
        insert_transaction(&self.database, &transaction).await?;

        info!(
            user_id = %cmd.user_id,
            reference = %charge.reference,
            amount_minor = cmd.amount_minor,
            "charge initialized"
        );
        Ok(charge)
    }

    /// Asks the gateway for the outcome of a pending charge and finalizes it.
    ///
    /// A terminal reference is returned without calling the gateway. A
    /// timeout leaves the entry pending so it can be verified again later.
    pub async fn verify_and_finalize(&self, reference: &str) -> ResultEngine<Transaction> {
        let current = find_by_reference(&self.database, reference).await?;
        if current.status.is_terminal() {
            debug!(reference, "verify short-circuited, already final");
            return Ok(current);
        }
        if !current.kind.is_credit() {
            return Err(EngineError::InvalidState(format!(
                "{} {reference} is settled by gateway notifications",
                current.kind.as_str()
            )));
        }

        let verified = self
            .gateway_call("verify_charge", self.gateway.verify_charge(reference))
            .await?;
        match verified.status {
            ChargeStatus::Pending => {
                debug!(reference, "charge still pending at the gateway");
                Ok(current)
            }
            ChargeStatus::Success if verified.amount_minor != current.amount_minor => {
                warn!(
                    reference,
                    expected = current.amount_minor,
                    reported = verified.amount_minor,
                    "gateway amount mismatch, left pending"
                );
                Err(EngineError::InvalidState(format!(
                    "gateway reports {} for {reference}, expected {}",
                    Money::new(verified.amount_minor),
                    Money::new(current.amount_minor)
                )))
            }
            ChargeStatus::Success => Ok(self
                .finalize(reference, Outcome::Succeeded)
                .await?
                .transaction),
            ChargeStatus::Failed => Ok(self.finalize(reference, Outcome::Failed).await?.transaction),
        }
    }

    /// Client-driven confirmation of the user's own deposit.
    pub async fn confirm_deposit(&self, user_id: &str, reference: &str) -> ResultEngine<Transaction> {
        let current = find_by_reference(&self.database, reference).await?;
        if current.user_id != user_id {
            return Err(EngineError::TransactionNotFound(reference.to_string()));
        }
        self.verify_and_finalize(reference).await
    }

    /// Entry point for gateway callbacks. Nothing is read from `body` before
    /// the signature has been checked.
    pub async fn handle_webhook(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> ResultEngine<WebhookOutcome> {
        let Some(signature) = signature else {
            warn!("webhook without signature rejected");
            return Err(EngineError::InvalidSignature);
        };
        if let Err(err) = verify_signature(&self.webhook_secret.0, body, signature) {
            warn!("webhook with invalid signature rejected");
            return Err(err);
        }

        let event = GatewayEvent::parse(body)?;
        debug!(event = event.name(), reference = ?event.reference(), "webhook accepted");
        match event {
            GatewayEvent::ChargeSucceeded(data) => self.on_charge_succeeded(data).await,
            GatewayEvent::ChargeFailed(data) => {
                self.on_event(&data.reference, true, Outcome::Failed).await
            }
            GatewayEvent::TransferSucceeded(data) => {
                self.on_event(&data.reference, false, Outcome::Succeeded).await
            }
            GatewayEvent::TransferFailed(data) | GatewayEvent::TransferReversed(data) => {
                self.on_event(&data.reference, false, Outcome::Failed).await
            }
            GatewayEvent::Unknown(name) => Ok(WebhookOutcome::Ignored(format!(
                "unhandled event {name}"
            ))),
        }
    }

    async fn on_event(
        &self,
        reference: &str,
        charge: bool,
        outcome: Outcome,
    ) -> ResultEngine<WebhookOutcome> {
        let current = match find_by_reference(&self.database, reference).await {
            Ok(current) => current,
            Err(EngineError::TransactionNotFound(_)) => {
                warn!(reference, "webhook for unknown reference ignored");
                return Ok(WebhookOutcome::Ignored(format!("unknown reference {reference}")));
            }
            Err(err) => return Err(err),
        };
        if current.kind.is_credit() != charge {
            warn!(reference, kind = current.kind.as_str(), "webhook event does not match transaction kind");
            return Ok(WebhookOutcome::Ignored(format!(
                "event does not apply to {} {reference}",
                current.kind.as_str()
            )));
        }
        Ok(WebhookOutcome::Finalized(
            self.finalize(reference, outcome).await?,
        ))
    }

    async fn on_charge_succeeded(&self, data: EventData) -> ResultEngine<WebhookOutcome> {
        let current = match find_by_reference(&self.database, &data.reference).await {
            Ok(current) => current,
            Err(EngineError::TransactionNotFound(_)) => {
                return self.record_external_charge(data).await;
            }
            Err(err) => return Err(err),
        };
        if !current.status.is_terminal()
            && let Some(amount) = data.amount_minor
            && amount != current.amount_minor
        {
            warn!(
                reference = %data.reference,
                expected = current.amount_minor,
                reported = amount,
                "charge amount mismatch, left pending"
            );
            return Ok(WebhookOutcome::Ignored(format!(
                "amount mismatch for {}",
                data.reference
            )));
        }
        self.on_event(&data.reference, true, Outcome::Succeeded).await
    }

    /// A successful charge with no local record: credit the user named in
    /// the charge metadata, once per reference.
    async fn record_external_charge(&self, data: EventData) -> ResultEngine<WebhookOutcome> {
        let (Some(user_id), Some(amount_minor)) = (data.metadata.user_id.clone(), data.amount_minor)
        else {
            warn!(reference = %data.reference, "charge without user metadata ignored");
            return Ok(WebhookOutcome::Ignored(format!(
                "unknown reference {}",
                data.reference
            )));
        };
        if load_wallet(&self.database, &user_id).await.is_err() {
            warn!(reference = %data.reference, %user_id, "charge for unknown wallet ignored");
            return Ok(WebhookOutcome::Ignored(format!("unknown wallet {user_id}")));
        }
        let kind = match data.metadata.kind.as_deref() {
            Some("income") => TransactionKind::Income,
            _ => TransactionKind::Deposit,
        };
        let transaction = Transaction::new(&user_id, data.reference.clone(), kind, amount_minor, Utc::now())?
            .settled()
            .category(data.metadata.category_id.clone())
            .description(Some("Wallet deposit".to_string()));

        let _guard = self.locks.lock(&user_id).await;
        let recorded = self.credit_settled(&transaction).await;
        match recorded {
            Ok(balance) => {
                info!(%user_id, reference = %transaction.reference, balance, "external charge credited");
                let alert = transaction.clone();
                self.notify(&user_id, move |user| Notification::TransactionAlert {
                    user,
                    transaction: alert,
                })
                .await;
                Ok(WebhookOutcome::Recorded(transaction))
            }
            Err(EngineError::DuplicateReference(reference)) => {
                debug!(%reference, "external charge already recorded");
                Ok(WebhookOutcome::Finalized(Finalization {
                    transaction: find_by_reference(&self.database, &reference).await?,
                    changed: false,
                    compensated: false,
                }))
            }
            Err(err) => Err(err),
        }
    }

    async fn credit_settled(&self, transaction: &Transaction) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            let balance = adjust_balance(&db_tx, &transaction.user_id, transaction.amount_minor).await?;
            insert_transaction(&db_tx, transaction).await?;
            Ok(balance)
        })
    }
}
