use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::info;

use crate::{
    EngineError, Notification, ResultEngine, Transaction, TransactionKind, Wallet,
    new_reference, users, wallets,
};

use super::{Engine, LedgerReceipt, ledger::insert_transaction, require_positive, with_tx};

/// Applies `delta` to the user's balance in one conditional statement.
///
/// Debits only match rows with enough balance, so the check and the write
/// cannot be separated by a concurrent debit. This is the only code path
/// that writes `wallets.balance`.
pub(super) async fn adjust_balance<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    delta: i64,
) -> ResultEngine<i64> {
    let mut update = wallets::Entity::update_many()
        .col_expr(
            wallets::Column::Balance,
            Expr::col(wallets::Column::Balance).add(delta),
        )
        .col_expr(wallets::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(wallets::Column::UserId.eq(user_id));
    if delta < 0 {
        update = update.filter(wallets::Column::Balance.gte(-delta));
    }
    let result = update.exec(conn).await?;

    if result.rows_affected == 0 {
        return match wallets::Entity::find_by_id(user_id.to_string())
            .one(conn)
            .await?
        {
            None => Err(EngineError::WalletNotFound(user_id.to_string())),
            Some(wallet) => Err(EngineError::InsufficientFunds(format!(
                "balance {} is below {}",
                crate::Money::new(wallet.balance),
                crate::Money::new(-delta)
            ))),
        };
    }
    wallet_balance(conn, user_id).await
}

pub(super) async fn wallet_balance<C: ConnectionTrait>(conn: &C, user_id: &str) -> ResultEngine<i64> {
    Ok(load_wallet(conn, user_id).await?.balance)
}

pub(super) async fn load_wallet<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> ResultEngine<wallets::Model> {
    wallets::Entity::find_by_id(user_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::WalletNotFound(user_id.to_string()))
}

/// Returns the user's wallet, creating an empty one if the user has none.
async fn ensure_wallet<C: ConnectionTrait>(conn: &C, user_id: &str) -> ResultEngine<wallets::Model> {
    if let Some(wallet) = wallets::Entity::find_by_id(user_id.to_string())
        .one(conn)
        .await?
    {
        return Ok(wallet);
    }
    users::Entity::find_by_id(user_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("user {user_id}")))?;
    let wallet = Wallet::new(user_id, None);
    let model: wallets::ActiveModel = (&wallet).into();
    Ok(model.insert(conn).await?)
}

impl Engine {
    /// Creates a user together with their empty wallet.
    pub async fn register_user(
        &self,
        user_id: &str,
        email: &str,
        name: Option<&str>,
        external_account_ref: Option<String>,
    ) -> ResultEngine<Wallet> {
        let user_id = user_id.trim();
        let email = email.trim();
        if user_id.is_empty() {
            return Err(EngineError::InvalidInput("user id must not be empty".into()));
        }
        if !email.contains('@') {
            return Err(EngineError::InvalidInput(format!("invalid email: {email}")));
        }

        let wallet = with_tx!(self, |db_tx| {
            if users::Entity::find_by_id(user_id.to_string())
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(format!("user {user_id}")));
            }
            let user = users::ActiveModel {
                id: ActiveValue::Set(user_id.to_string()),
                email: ActiveValue::Set(email.to_string()),
                name: ActiveValue::Set(super::normalize_optional_text(name)),
                created_at: ActiveValue::Set(Utc::now()),
            };
            user.insert(&db_tx).await?;

            let wallet = Wallet::new(user_id, external_account_ref);
            let model: wallets::ActiveModel = (&wallet).into();
            model.insert(&db_tx).await?;
            Ok(wallet)
        })?;

        info!(user_id, "user registered");
        Ok(wallet)
    }

    pub async fn wallet(&self, user_id: &str) -> ResultEngine<Wallet> {
        Ok(load_wallet(&self.database, user_id).await?.into())
    }

    pub async fn balance(&self, user_id: &str) -> ResultEngine<i64> {
        wallet_balance(&self.database, user_id).await
    }

    /// Credits income straight into the wallet.
    pub async fn record_income(
        &self,
        user_id: &str,
        amount_minor: i64,
        description: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<LedgerReceipt> {
        require_positive(amount_minor)?;
        let transaction = Transaction::new(
            user_id,
            new_reference("inc"),
            TransactionKind::Income,
            amount_minor,
            occurred_at,
        )?
        .settled()
        .description(super::normalize_optional_text(description));

        let _guard = self.locks.lock(user_id).await;
        let balance = with_tx!(self, |db_tx| {
            ensure_wallet(&db_tx, user_id).await?;
            let balance = adjust_balance(&db_tx, user_id, amount_minor).await?;
            insert_transaction(&db_tx, &transaction).await?;
            Ok(balance)
        })?;

        info!(user_id, reference = %transaction.reference, amount_minor, "income recorded");
        let alert = transaction.clone();
        self.notify(user_id, move |user| Notification::TransactionAlert {
            user,
            transaction: alert,
        })
        .await;
        Ok(LedgerReceipt {
            transaction,
            balance,
        })
    }
}
