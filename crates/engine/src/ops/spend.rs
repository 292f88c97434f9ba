//! The spend authorization pipeline.
//!
//! Every debit that consumes a category budget goes through [`authorize`]
//! and [`commit_debit`] inside one DB transaction, with the user's lock held.
//! Budget room is checked before the wallet balance.

use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::info;

use crate::{
    Budget, EngineError, Money, Notification, ResultEngine, SpendCmd, Transaction,
    TransactionKind, expenses, new_reference,
};

use super::{
    Engine,
    budgets::{active_window, spent_in},
    ledger::insert_transaction,
    normalize_optional_text, require_positive,
    wallets::{adjust_balance, wallet_balance},
    with_tx,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpendReceipt {
    pub transaction: Transaction,
    pub balance: i64,
    /// What is left of the category budget after this spend.
    pub budget_remaining: i64,
}

/// Checks that `amount_minor` fits the active budget window and the wallet.
/// Returns the window and what had been spent in it before this request.
pub(super) async fn authorize<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    category_id: &str,
    amount_minor: i64,
    at: DateTime<Utc>,
) -> ResultEngine<(Budget, i64)> {
    let window = active_window(conn, user_id, category_id, at).await?;
    let spent = spent_in(conn, &window).await?;
    if spent + amount_minor > window.amount_minor {
        return Err(EngineError::BudgetExceeded(format!(
            "{} of {} already spent in category {category_id}, {} requested",
            Money::new(spent),
            Money::new(window.amount_minor),
            Money::new(amount_minor)
        )));
    }
    let balance = wallet_balance(conn, user_id).await?;
    if balance < amount_minor {
        return Err(EngineError::InsufficientFunds(format!(
            "balance {} is below {}",
            Money::new(balance),
            Money::new(amount_minor)
        )));
    }
    Ok((window, spent))
}

/// Debits the wallet, records the expense and writes the ledger entry.
/// Must run inside the caller's DB transaction.
pub(super) async fn commit_debit<C: ConnectionTrait>(
    conn: &C,
    transaction: &Transaction,
    category_id: &str,
) -> ResultEngine<i64> {
    let balance = adjust_balance(conn, &transaction.user_id, -transaction.amount_minor).await?;
    expenses::new_active(
        &transaction.user_id,
        category_id,
        transaction.amount_minor,
        transaction.description.clone(),
        &transaction.reference,
        transaction.occurred_at,
    )
    .insert(conn)
    .await?;
    insert_transaction(conn, transaction).await?;
    Ok(balance)
}

impl Engine {
    /// Wallet "pay": spend from the wallet against a category budget.
    pub async fn pay(&self, cmd: SpendCmd) -> ResultEngine<SpendReceipt> {
        self.spend(cmd, Utc::now()).await
    }

    /// Records an expense, debiting the wallet. The budget is the one active
    /// now, and `occurred_at` must fall inside it.
    pub async fn create_expense(&self, cmd: SpendCmd) -> ResultEngine<SpendReceipt> {
        self.spend(cmd, Utc::now()).await
    }

    /// Spends against the budget window active at `window_at`. Only scheduled
    /// occurrences pick a window other than the current one.
    pub(super) async fn spend(
        &self,
        cmd: SpendCmd,
        window_at: DateTime<Utc>,
    ) -> ResultEngine<SpendReceipt> {
        let SpendCmd {
            user_id,
            category_id,
            amount_minor,
            description,
            reference,
            occurred_at,
        } = cmd;
        require_positive(amount_minor)?;
        let transaction = Transaction::new(
            &user_id,
            reference.unwrap_or_else(|| new_reference("exp")),
            TransactionKind::Expense,
            amount_minor,
            occurred_at,
        )?
        .settled()
        .category(Some(category_id.clone()))
        .description(normalize_optional_text(description.as_deref()));

        let _guard = self.locks.lock(&user_id).await;
        let (balance, budget_remaining) = with_tx!(self, |db_tx| {
            let (window, spent) =
                authorize(&db_tx, &user_id, &category_id, amount_minor, window_at).await?;
            if !window.contains(occurred_at) {
                return Err(EngineError::InvalidInput(format!(
                    "occurred_at {occurred_at} is outside the active budget window ({} to {})",
                    window.start_date, window.end_date
                )));
            }
            let balance = commit_debit(&db_tx, &transaction, &category_id).await?;
            Ok((balance, window.amount_minor - spent - amount_minor))
        })?;

        info!(
            %user_id,
            %category_id,
            reference = %transaction.reference,
            amount_minor,
            "spend committed"
        );
        let alert = transaction.clone();
        self.notify(&user_id, move |user| Notification::TransactionAlert {
            user,
            transaction: alert,
        })
        .await;
        Ok(SpendReceipt {
            transaction,
            balance,
            budget_remaining,
        })
    }
}
