use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, prelude::*};
use serde::Serialize;

use crate::{
    EngineError, Expense, ResultEngine, Transaction, TransactionKind, TransactionStatus, expenses,
    transactions,
};

use super::{Engine, budgets::BudgetUsage};

/// Filters for listing transactions.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub min_amount_minor: Option<i64>,
    pub max_amount_minor: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategorySpend {
    pub category_id: String,
    pub spent_minor: i64,
}

/// Totals over the user's whole ledger plus the budgets active now.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    /// Settled money in: income and deposits.
    pub income_minor: i64,
    /// Money out that touched the wallet: expenses, transfers, withdrawals.
    pub expenses_minor: i64,
    pub balance: i64,
    pub expenses_by_category: Vec<CategorySpend>,
    pub budgets: Vec<BudgetUsage>,
}

fn validate_list_filter(filter: &TransactionListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::InvalidInput(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if let (Some(min), Some(max)) = (filter.min_amount_minor, filter.max_amount_minor)
        && min > max
    {
        return Err(EngineError::InvalidInput(
            "invalid amount range: min must be <= max".to_string(),
        ));
    }
    Ok(())
}

/// Inserts a ledger entry. A reference that already exists is reported as
/// [`EngineError::DuplicateReference`].
pub(super) async fn insert_transaction<C: ConnectionTrait>(
    conn: &C,
    transaction: &Transaction,
) -> ResultEngine<()> {
    let model: transactions::ActiveModel = transaction.into();
    transactions::Entity::insert(model)
        .exec(conn)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                EngineError::DuplicateReference(transaction.reference.clone())
            }
            _ => EngineError::Database(err),
        })?;
    Ok(())
}

pub(super) async fn find_by_reference<C: ConnectionTrait>(
    conn: &C,
    reference: &str,
) -> ResultEngine<Transaction> {
    transactions::Entity::find()
        .filter(transactions::Column::Reference.eq(reference))
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::TransactionNotFound(reference.to_string()))?
        .try_into()
}

impl Engine {
    /// Lists the user's ledger entries, newest first.
    pub async fn transactions(
        &self,
        user_id: &str,
        filter: &TransactionListFilter,
    ) -> ResultEngine<Vec<Transaction>> {
        validate_list_filter(filter)?;
        let mut query = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id));
        if let Some(kind) = filter.kind {
            query = query.filter(transactions::Column::Kind.eq(kind.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(transactions::Column::Status.eq(status.as_str()));
        }
        if let Some(min) = filter.min_amount_minor {
            query = query.filter(transactions::Column::AmountMinor.gte(min));
        }
        if let Some(max) = filter.max_amount_minor {
            query = query.filter(transactions::Column::AmountMinor.lte(max));
        }
        if let Some(from) = filter.from {
            query = query.filter(transactions::Column::OccurredAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(transactions::Column::OccurredAt.lt(to));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        query
            .order_by_desc(transactions::Column::OccurredAt)
            .order_by_desc(transactions::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    /// A single ledger entry owned by `user_id`.
    pub async fn transaction(&self, user_id: &str, reference: &str) -> ResultEngine<Transaction> {
        let transaction = find_by_reference(&self.database, reference).await?;
        if transaction.user_id != user_id {
            return Err(EngineError::TransactionNotFound(reference.to_string()));
        }
        Ok(transaction)
    }

    /// Realized spends, newest first, optionally for one category.
    pub async fn expenses(
        &self,
        user_id: &str,
        category_id: Option<&str>,
    ) -> ResultEngine<Vec<Expense>> {
        let mut query = expenses::Entity::find().filter(expenses::Column::UserId.eq(user_id));
        if let Some(category_id) = category_id {
            query = query.filter(expenses::Column::CategoryId.eq(category_id));
        }
        Ok(query
            .order_by_desc(expenses::Column::OccurredAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Expense::from)
            .collect())
    }

    /// Income and spending totals, spending per category, and how far each
    /// active budget is used.
    pub async fn summary(&self, user_id: &str, now: DateTime<Utc>) -> ResultEngine<UserSummary> {
        let balance = self.balance(user_id).await?;

        let mut income_minor = 0;
        let mut expenses_minor = 0;
        for model in transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::WalletApplied.eq(true))
            .all(&self.database)
            .await?
        {
            let transaction = Transaction::try_from(model)?;
            if transaction.kind.is_credit() {
                income_minor += transaction.amount_minor;
            } else {
                expenses_minor += transaction.amount_minor;
            }
        }

        let mut by_category = BTreeMap::<String, i64>::new();
        for expense in expenses::Entity::find()
            .filter(expenses::Column::UserId.eq(user_id))
            .all(&self.database)
            .await?
        {
            *by_category.entry(expense.category_id).or_default() += expense.amount_minor;
        }

        Ok(UserSummary {
            income_minor,
            expenses_minor,
            balance,
            expenses_by_category: by_category
                .into_iter()
                .map(|(category_id, spent_minor)| CategorySpend {
                    category_id,
                    spent_minor,
                })
                .collect(),
            budgets: self.budget_summary(user_id, None, now).await?,
        })
    }
}
