//! Gateway payouts: bill transfer-pay and withdrawals.
//!
//! The payout is requested from the gateway before any money leaves the
//! wallet. A pending ledger entry is written first so the gateway reference
//! always exists locally; if the gateway call fails or times out that entry
//! is marked failed and nothing is debited.

use chrono::Utc;
use sea_orm::{QueryFilter, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{error, info, warn};

use crate::{
    EngineError, Money, Notification, PayoutAccount, ResultEngine, Transaction, TransactionKind,
    TransactionStatus, TransferRequest, WithdrawCmd,
    gateway::{GatewayError, bounded},
    new_reference, transactions, wallets,
};

use super::{
    Engine, LedgerReceipt,
    bills::mark_bill_paid,
    ledger::insert_transaction,
    reconcile::Outcome,
    require_positive,
    wallets::{adjust_balance, load_wallet},
    with_tx,
};

/// A payout that already passed authorization.
pub(super) struct Payout {
    pub user_id: String,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub category_id: Option<String>,
    pub bill_id: Option<String>,
    pub description: String,
    pub recipient_ref: String,
}

impl Engine {
    /// Resolves the account holder and registers the account as a payout
    /// recipient. Returns `(account_name, recipient_ref)`.
    pub(super) async fn create_recipient(
        &self,
        account: &PayoutAccount,
    ) -> ResultEngine<(String, String)> {
        let resolved = bounded(
            self.gateway_timeout,
            "resolve_account_name",
            self.gateway
                .resolve_account_name(&account.account_number, &account.bank_code),
        )
        .await;
        let name = match resolved {
            Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
            Ok(_) => {
                return Err(EngineError::RecipientResolutionFailed(format!(
                    "no holder name for account {}",
                    account.account_number
                )));
            }
            Err(GatewayError::Rejected(msg) | GatewayError::Resolution(msg)) => {
                return Err(EngineError::RecipientResolutionFailed(msg));
            }
            Err(err) => return Err(err.into()),
        };
        let recipient_ref = self
            .gateway_call(
                "create_payout_recipient",
                self.gateway.create_payout_recipient(account, &name),
            )
            .await?;
        Ok((name, recipient_ref))
    }

    /// Runs a payout. The caller holds the user's lock.
    pub(super) async fn execute_payout(&self, payout: Payout) -> ResultEngine<LedgerReceipt> {
        let prefix = match payout.kind {
            TransactionKind::Withdrawal => "wd",
            _ => "trf",
        };
        let transaction = Transaction::new(
            &payout.user_id,
            new_reference(prefix),
            payout.kind,
            payout.amount_minor,
            Utc::now(),
        )?
        .category(payout.category_id.clone())
        .description(Some(payout.description.clone()))
        .bill(payout.bill_id.clone());
        insert_transaction(&self.database, &transaction).await?;

        let request = TransferRequest {
            amount_minor: payout.amount_minor,
            recipient_ref: payout.recipient_ref.clone(),
            reference: transaction.reference.clone(),
            reason: payout.description.clone(),
        };
        let receipt = match self
            .gateway_call("initiate_transfer", self.gateway.initiate_transfer(request))
            .await
        {
            Ok(receipt) => receipt,
            Err(err) => {
                warn!(
                    reference = %transaction.reference,
                    error = %err,
                    "transfer not initiated, nothing debited"
                );
                if let Err(mark_err) = self
                    .finalize_locked(&transaction.reference, Outcome::Failed)
                    .await
                {
                    error!(
                        reference = %transaction.reference,
                        error = %mark_err,
                        "could not mark transfer as failed"
                    );
                }
                return Err(err);
            }
        };

        let committed = self
            .commit_payout(&payout, &transaction, &receipt.transfer_ref)
            .await;
        let balance = match committed {
            Ok(balance) => balance,
            Err(err) => {
                error!(
                    reference = %transaction.reference,
                    transfer_ref = %receipt.transfer_ref,
                    error = %err,
                    "transfer initiated at the gateway but the local debit failed"
                );
                return Err(err);
            }
        };

        info!(
            user_id = %payout.user_id,
            reference = %transaction.reference,
            transfer_ref = %receipt.transfer_ref,
            amount = %Money::new(payout.amount_minor),
            "payout initiated and debited"
        );
        let transaction = Transaction {
            wallet_applied: true,
            transfer_ref: Some(receipt.transfer_ref),
            ..transaction
        };
        let alert = transaction.clone();
        self.notify(&payout.user_id, move |user| Notification::TransactionAlert {
            user,
            transaction: alert,
        })
        .await;
        Ok(LedgerReceipt {
            transaction,
            balance,
        })
    }

    async fn commit_payout(
        &self,
        payout: &Payout,
        transaction: &Transaction,
        transfer_ref: &str,
    ) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            let balance = adjust_balance(&db_tx, &payout.user_id, -payout.amount_minor).await?;
            if let (Some(_), Some(category_id)) = (&payout.bill_id, &payout.category_id) {
                crate::expenses::new_active(
                    &payout.user_id,
                    category_id,
                    payout.amount_minor,
                    transaction.description.clone(),
                    &transaction.reference,
                    transaction.occurred_at,
                )
                .insert(&db_tx)
                .await?;
            }
            let applied = transactions::Entity::update_many()
                .col_expr(transactions::Column::WalletApplied, Expr::value(true))
                .col_expr(
                    transactions::Column::TransferRef,
                    Expr::value(Some(transfer_ref.to_string())),
                )
                .filter(transactions::Column::Reference.eq(transaction.reference.as_str()))
                .filter(transactions::Column::Status.eq(TransactionStatus::Pending.as_str()))
                .filter(transactions::Column::WalletApplied.eq(false))
                .exec(&db_tx)
                .await?;
            if applied.rows_affected == 0 {
                return Err(EngineError::InvalidState(format!(
                    "transaction {} was finalized concurrently",
                    transaction.reference
                )));
            }
            if let Some(bill_id) = &payout.bill_id {
                mark_bill_paid(&db_tx, bill_id, transaction.occurred_at).await?;
            }
            Ok(balance)
        })
    }

    /// Sends money from the wallet to the user's bank account.
    pub async fn withdraw(&self, cmd: WithdrawCmd) -> ResultEngine<LedgerReceipt> {
        let WithdrawCmd {
            user_id,
            amount_minor,
            payout_account,
        } = cmd;
        require_positive(amount_minor)?;

        let _guard = self.locks.lock(&user_id).await;
        let wallet = load_wallet(&self.database, &user_id).await?;
        if wallet.balance < amount_minor {
            return Err(EngineError::InsufficientFunds(format!(
                "balance {} is below {}",
                Money::new(wallet.balance),
                Money::new(amount_minor)
            )));
        }

        let recipient_ref = match (payout_account, wallet.external_recipient_ref) {
            (Some(account), _) => {
                let (_, recipient_ref) = self.create_recipient(&account).await?;
                wallets::Entity::update_many()
                    .col_expr(
                        wallets::Column::ExternalRecipientRef,
                        Expr::value(Some(recipient_ref.clone())),
                    )
                    .filter(wallets::Column::UserId.eq(user_id.as_str()))
                    .exec(&self.database)
                    .await?;
                recipient_ref
            }
            (None, Some(recipient_ref)) => recipient_ref,
            (None, None) => {
                return Err(EngineError::InvalidInput(
                    "no payout account on file, provide account details".to_string(),
                ));
            }
        };

        self.execute_payout(Payout {
            user_id,
            kind: TransactionKind::Withdrawal,
            amount_minor,
            category_id: None,
            bill_id: None,
            description: "Wallet withdrawal".to_string(),
            recipient_ref,
        })
        .await
    }
}
