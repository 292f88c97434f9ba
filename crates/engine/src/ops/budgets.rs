use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{info, warn};

use crate::{Budget, EngineError, ResultEngine, budgets, expenses};

use super::{Engine, with_tx};

/// How much of a budget has been consumed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BudgetUsage {
    pub budget: Budget,
    pub spent_minor: i64,
    pub remaining_minor: i64,
    pub percent_used: u32,
}

impl BudgetUsage {
    pub(super) fn new(budget: Budget, spent_minor: i64) -> Self {
        let remaining_minor = budget.amount_minor - spent_minor;
        let percent = spent_minor.saturating_mul(100) / budget.amount_minor.max(1);
        Self {
            budget,
            spent_minor,
            remaining_minor,
            percent_used: u32::try_from(percent.max(0)).unwrap_or(u32::MAX),
        }
    }
}

/// The budget of (user, category) whose window contains `at`.
pub(super) async fn active_window<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    category_id: &str,
    at: DateTime<Utc>,
) -> ResultEngine<Budget> {
    budgets::Entity::find()
        .filter(budgets::Column::UserId.eq(user_id))
        .filter(budgets::Column::CategoryId.eq(category_id))
        .filter(budgets::Column::StartDate.lte(at))
        .filter(budgets::Column::EndDate.gte(at))
        .order_by_desc(budgets::Column::StartDate)
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::NoActiveBudget(format!("category {category_id}")))?
        .try_into()
}

/// Sum of the expenses recorded inside the window, read fresh every time.
pub(super) async fn spent_in<C: ConnectionTrait>(conn: &C, window: &Budget) -> ResultEngine<i64> {
    let rows = expenses::Entity::find()
        .filter(expenses::Column::UserId.eq(window.user_id.as_str()))
        .filter(expenses::Column::CategoryId.eq(window.category_id.as_str()))
        .filter(expenses::Column::OccurredAt.gte(window.start_date))
        .filter(expenses::Column::OccurredAt.lte(window.end_date))
        .all(conn)
        .await?;
    Ok(rows.iter().map(|e| e.amount_minor).sum())
}

async fn ensure_no_overlap<C: ConnectionTrait>(conn: &C, budget: &Budget) -> ResultEngine<()> {
    let clash = budgets::Entity::find()
        .filter(budgets::Column::UserId.eq(budget.user_id.as_str()))
        .filter(budgets::Column::CategoryId.eq(budget.category_id.as_str()))
        .filter(budgets::Column::StartDate.lte(budget.end_date))
        .filter(budgets::Column::EndDate.gte(budget.start_date))
        .filter(budgets::Column::Id.ne(budget.id.as_str()))
        .one(conn)
        .await?;
    match clash {
        Some(existing) => Err(EngineError::ExistingKey(format!(
            "budget {} already covers category {} in this period",
            existing.id, budget.category_id
        ))),
        None => Ok(()),
    }
}

impl Engine {
    pub async fn find_active_window(
        &self,
        user_id: &str,
        category_id: &str,
        as_of: DateTime<Utc>,
    ) -> ResultEngine<Budget> {
        active_window(&self.database, user_id, category_id, as_of).await
    }

    pub async fn spent_in_window(&self, window: &Budget) -> ResultEngine<i64> {
        spent_in(&self.database, window).await
    }

    /// Stores a budget. Budgets of the same (user, category) never overlap,
    /// so at most one is active at any instant.
    pub async fn create_budget(&self, budget: Budget) -> ResultEngine<Budget> {
        let _guard = self.locks.lock(&budget.user_id).await;
        with_tx!(self, |db_tx| {
            ensure_no_overlap(&db_tx, &budget).await?;
            let model: budgets::ActiveModel = (&budget).into();
            model.insert(&db_tx).await?;
            Ok(())
        })?;
        info!(user_id = %budget.user_id, category_id = %budget.category_id, "budget created");
        Ok(budget)
    }

    pub async fn budgets(&self, user_id: &str) -> ResultEngine<Vec<Budget>> {
        budgets::Entity::find()
            .filter(budgets::Column::UserId.eq(user_id))
            .order_by_desc(budgets::Column::StartDate)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Budget::try_from)
            .collect()
    }

    /// Usage of every budget active at `now`, optionally for one category.
    pub async fn budget_summary(
        &self,
        user_id: &str,
        category_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<BudgetUsage>> {
        let mut query = budgets::Entity::find()
            .filter(budgets::Column::UserId.eq(user_id))
            .filter(budgets::Column::StartDate.lte(now))
            .filter(budgets::Column::EndDate.gte(now));
        if let Some(category_id) = category_id {
            query = query.filter(budgets::Column::CategoryId.eq(category_id));
        }
        let mut usage = Vec::new();
        for model in query
            .order_by_asc(budgets::Column::CategoryId)
            .all(&self.database)
            .await?
        {
            let budget = Budget::try_from(model)?;
            let spent = spent_in(&self.database, &budget).await?;
            usage.push(BudgetUsage::new(budget, spent));
        }
        Ok(usage)
    }

    /// Clones every expired recurring budget into its next period, once.
    pub async fn renew_recurring_budgets(&self, now: DateTime<Utc>) -> ResultEngine<Vec<Budget>> {
        let expired = budgets::Entity::find()
            .filter(budgets::Column::Recurring.eq(true))
            .filter(budgets::Column::Renewed.eq(false))
            .filter(budgets::Column::EndDate.lt(now))
            .all(&self.database)
            .await?;

        let mut renewed = Vec::new();
        for model in expired {
            let budget = Budget::try_from(model)?;
            match self.renew_budget(&budget).await {
                Ok(Some(next)) => {
                    info!(from = %budget.id, to = %next.id, "recurring budget renewed");
                    renewed.push(next);
                }
                Ok(None) => {}
                Err(err) => warn!(budget_id = %budget.id, error = %err, "budget renewal failed"),
            }
        }
        Ok(renewed)
    }

    async fn renew_budget(&self, budget: &Budget) -> ResultEngine<Option<Budget>> {
        let next = budget.next_period()?;
        let _guard = self.locks.lock(&budget.user_id).await;
        with_tx!(self, |db_tx| {
            let claimed = budgets::Entity::update_many()
                .col_expr(budgets::Column::Renewed, Expr::value(true))
                .filter(budgets::Column::Id.eq(budget.id.as_str()))
                .filter(budgets::Column::Renewed.eq(false))
                .exec(&db_tx)
                .await?;
            if claimed.rows_affected == 0 {
                Ok(None)
            } else {
                // A budget the user already created for the next period wins.
                match ensure_no_overlap(&db_tx, &next).await {
                    Ok(()) => {
                        let active: budgets::ActiveModel = (&next).into();
                        active.insert(&db_tx).await?;
                        Ok(Some(next))
                    }
                    Err(EngineError::ExistingKey(_)) => Ok(None),
                    Err(err) => Err(err),
                }
            }
        })
    }
}
