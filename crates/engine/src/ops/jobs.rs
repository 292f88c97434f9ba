//! Scheduled settlement passes, driven by an external clock.
//!
//! Each pass handles its items one by one. A failing item is logged, the
//! owner is notified, and the pass moves on.

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, SqlErr, prelude::*};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    Bill, BillStatus, Budget, EngineError, Money, Notification, RecurringExpense, ResultEngine,
    SpendCmd, TransferPayCmd, bill_reminders, bills, budget_alerts, budgets, recurring_expenses,
};

use super::{Engine, budgets::{BudgetUsage, spent_in}};

/// Usage percentages that trigger an alert, each at most once per budget per day.
const ALERT_THRESHOLDS: [u32; 3] = [75, 90, 100];

/// One item a pass could not handle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub id: String,
    pub kind: String,
    pub message: String,
}

impl JobFailure {
    fn new(id: &str, err: &EngineError) -> Self {
        Self {
            id: id.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AutoPayReport {
    pub paid: Vec<String>,
    pub failed: Vec<JobFailure>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RecurringReport {
    pub processed: Vec<String>,
    pub failed: Vec<JobFailure>,
    pub deactivated: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SettlementSummary {
    pub renewed_budgets: usize,
    pub reminders_sent: usize,
    pub auto_pay: AutoPayReport,
    pub recurring: RecurringReport,
    pub budget_alerts: usize,
}

/// `[00:00, next 00:00)` of the UTC day containing `now`.
fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + TimeDelta::days(1))
}

async fn bills_due_on(
    engine: &Engine,
    now: DateTime<Utc>,
    auto_pay_only: bool,
) -> ResultEngine<Vec<Bill>> {
    let (start, end) = day_bounds(now);
    let mut query = bills::Entity::find()
        .filter(bills::Column::Status.eq(BillStatus::Pending.as_str()))
        .filter(bills::Column::DueDate.gte(start))
        .filter(bills::Column::DueDate.lt(end));
    if auto_pay_only {
        query = query.filter(bills::Column::AutoPay.eq(true));
    }
    query
        .order_by_asc(bills::Column::DueDate)
        .all(&engine.database)
        .await?
        .into_iter()
        .map(Bill::try_from)
        .collect()
}

impl Engine {
    /// Emails a reminder for every pending bill due today, at most once per
    /// bill per day. Bills themselves are not touched.
    pub async fn due_bill_reminders(&self, now: DateTime<Utc>) -> ResultEngine<usize> {
        let due = bills_due_on(self, now, false).await?;
        let mut sent = 0;
        for bill in &due {
            if !self.claim_reminder(bill, now).await? {
                continue;
            }
            let amount = Money::new(bill.amount_minor);
            let description = bill.description.clone();
            let due_date = bill.due_date.format("%Y-%m-%d").to_string();
            self.notify(&bill.user_id, move |user| {
                Notification::email(
                    user.email,
                    format!("Bill due today: {description}"),
                    format!(
                        "<p>Hi {},</p><p>Your bill <b>{description}</b> of {amount} is due on {due_date}.</p>",
                        user.name
                    ),
                )
            })
            .await;
            sent += 1;
        }
        if sent > 0 {
            info!(sent, due = due.len(), "due bill reminders sent");
        }
        Ok(sent)
    }

    /// Records today's reminder for `bill`. False when one was already sent.
    async fn claim_reminder(&self, bill: &Bill, now: DateTime<Utc>) -> ResultEngine<bool> {
        let model = bill_reminders::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            bill_id: ActiveValue::Set(bill.id.clone()),
            user_id: ActiveValue::Set(bill.user_id.clone()),
            reminded_on: ActiveValue::Set(now.date_naive()),
            created_at: ActiveValue::Set(now),
        };
        match bill_reminders::Entity::insert(model).exec(&self.database).await {
            Ok(_) => Ok(true),
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Ok(false),
                _ => Err(err.into()),
            },
        }
    }

    /// Pays every auto-pay bill due today, each on its own.
    pub async fn auto_pay_due_bills(&self, now: DateTime<Utc>) -> ResultEngine<AutoPayReport> {
        let mut report = AutoPayReport::default();
        for bill in bills_due_on(self, now, true).await? {
            let result = if bill.pays_by_transfer() {
                self.pay_bill_with_transfer(TransferPayCmd::new(&bill.user_id, &bill.id))
                    .await
                    .map(|receipt| receipt.transaction.reference)
            } else {
                self.pay_bill(&bill.user_id, &bill.id, now)
                    .await
                    .map(|receipt| receipt.transaction.reference)
            };
            match result {
                Ok(reference) => {
                    info!(bill_id = %bill.id, %reference, "bill auto-paid");
                    report.paid.push(bill.id);
                }
                Err(err) => {
                    warn!(bill_id = %bill.id, error = %err, "auto-pay failed");
                    report.failed.push(JobFailure::new(&bill.id, &err));
                    let description = bill.description.clone();
                    let reason = err.to_string();
                    self.notify(&bill.user_id, move |user| {
                        Notification::email(
                            user.email,
                            format!("Auto-pay failed: {description}"),
                            format!(
                                "<p>Hi {},</p><p>We could not pay <b>{description}</b> automatically: {reason}.</p>",
                                user.name
                            ),
                        )
                    })
                    .await;
                }
            }
        }
        Ok(report)
    }

    /// Spends every recurring expense that is due, then moves it to its next
    /// due date. Items past their end date are deactivated.
    pub async fn process_recurring_expenses(
        &self,
        now: DateTime<Utc>,
    ) -> ResultEngine<RecurringReport> {
        let due = recurring_expenses::Entity::find()
            .filter(recurring_expenses::Column::Active.eq(true))
            .filter(recurring_expenses::Column::NextDueDate.lte(now))
            .order_by_asc(recurring_expenses::Column::NextDueDate)
            .all(&self.database)
            .await?;

        let mut report = RecurringReport::default();
        for model in due {
            let id = model.id.clone();
            let item = match RecurringExpense::try_from(model) {
                Ok(item) => item,
                Err(err) => {
                    error!(recurring_id = %id, error = %err, "unreadable recurring expense");
                    report.failed.push(JobFailure::new(&id, &err));
                    continue;
                }
            };
            if let Err(err) = self.process_recurring(&item, &mut report).await {
                warn!(recurring_id = %item.id, error = %err, "recurring expense not advanced");
                report.failed.push(JobFailure::new(&item.id, &err));
            }
        }
        Ok(report)
    }

    async fn process_recurring(
        &self,
        item: &RecurringExpense,
        report: &mut RecurringReport,
    ) -> ResultEngine<()> {
        if item.is_expired(item.next_due_date) {
            self.store_recurring_schedule(item, item.next_due_date, false)
                .await?;
            report.deactivated.push(item.id.clone());
            return Ok(());
        }

        // One reference per occurrence, so a rerun after a crash cannot
        // spend the same occurrence twice.
        let reference = format!(
            "rec_{}_{}",
            item.id.replace('-', ""),
            item.next_due_date.format("%Y%m%d")
        );
        let cmd = SpendCmd::new(
            &item.user_id,
            &item.category_id,
            item.amount_minor,
            item.next_due_date,
        )
        .description(item.description.clone())
        .reference(reference);
        match self.spend(cmd, item.next_due_date).await {
            Ok(_) | Err(EngineError::DuplicateReference(_)) => {
                report.processed.push(item.id.clone());
            }
            Err(err) => {
                warn!(recurring_id = %item.id, error = %err, "recurring expense failed");
                report.failed.push(JobFailure::new(&item.id, &err));
                let description = item.description.clone();
                let reason = err.to_string();
                self.notify(&item.user_id, move |user| {
                    Notification::email(
                        user.email,
                        format!("Recurring expense failed: {description}"),
                        format!(
                            "<p>Hi {},</p><p>Your recurring expense <b>{description}</b> could not be recorded: {reason}.</p>",
                            user.name
                        ),
                    )
                })
                .await;
            }
        }

        let next_due = item.frequency.advance(item.next_due_date)?;
        let active = !item.is_expired(next_due);
        self.store_recurring_schedule(item, next_due, active).await?;
        if !active {
            report.deactivated.push(item.id.clone());
        }
        Ok(())
    }

    async fn store_recurring_schedule(
        &self,
        item: &RecurringExpense,
        next_due_date: DateTime<Utc>,
        active: bool,
    ) -> ResultEngine<()> {
        recurring_expenses::ActiveModel {
            id: ActiveValue::Unchanged(item.id.clone()),
            next_due_date: ActiveValue::Set(next_due_date),
            active: ActiveValue::Set(active),
            ..Default::default()
        }
        .update(&self.database)
        .await?;
        Ok(())
    }

    /// Sends a threshold alert for every active budget whose usage crossed
    /// 75%, 90% or 100%, at most once per threshold per day.
    pub async fn check_budget_usage(&self, now: DateTime<Utc>) -> ResultEngine<usize> {
        let (day_start, day_end) = day_bounds(now);
        let active = budgets::Entity::find()
            .filter(budgets::Column::StartDate.lte(now))
            .filter(budgets::Column::EndDate.gte(now))
            .all(&self.database)
            .await?;

        let mut sent = 0;
        for model in active {
            let budget = Budget::try_from(model)?;
            let usage = BudgetUsage::new(budget.clone(), spent_in(&self.database, &budget).await?);
            for threshold in ALERT_THRESHOLDS {
                if usage.percent_used < threshold {
                    continue;
                }
                let already_sent = budget_alerts::Entity::find()
                    .filter(budget_alerts::Column::BudgetId.eq(budget.id.as_str()))
                    .filter(budget_alerts::Column::Threshold.eq(threshold as i32))
                    .filter(budget_alerts::Column::CreatedAt.gte(day_start))
                    .filter(budget_alerts::Column::CreatedAt.lt(day_end))
                    .one(&self.database)
                    .await?
                    .is_some();
                if already_sent {
                    continue;
                }
                budget_alerts::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4().to_string()),
                    budget_id: ActiveValue::Set(budget.id.clone()),
                    user_id: ActiveValue::Set(budget.user_id.clone()),
                    threshold: ActiveValue::Set(threshold as i32),
                    percent_used: ActiveValue::Set(i32::try_from(usage.percent_used).unwrap_or(i32::MAX)),
                    created_at: ActiveValue::Set(now),
                }
                .insert(&self.database)
                .await?;

                let alerted = budget.clone();
                let percent_used = usage.percent_used;
                self.notify(&budget.user_id, move |user| Notification::BudgetThreshold {
                    user,
                    budget: alerted,
                    percent_used,
                })
                .await;
                sent += 1;
            }
        }
        if sent > 0 {
            info!(sent, "budget threshold alerts sent");
        }
        Ok(sent)
    }

    /// Runs every settlement pass in order. A pass that cannot run at all is
    /// logged and the remaining passes still run.
    pub async fn run_settlement_jobs(&self, now: DateTime<Utc>) -> SettlementSummary {
        let mut summary = SettlementSummary::default();
        match self.renew_recurring_budgets(now).await {
            Ok(renewed) => summary.renewed_budgets = renewed.len(),
            Err(err) => error!(error = %err, "budget renewal pass failed"),
        }
        match self.due_bill_reminders(now).await {
            Ok(count) => summary.reminders_sent = count,
            Err(err) => error!(error = %err, "bill reminder pass failed"),
        }
        match self.auto_pay_due_bills(now).await {
            Ok(report) => summary.auto_pay = report,
            Err(err) => error!(error = %err, "auto-pay pass failed"),
        }
        match self.process_recurring_expenses(now).await {
            Ok(report) => summary.recurring = report,
            Err(err) => error!(error = %err, "recurring expense pass failed"),
        }
        match self.check_budget_usage(now).await {
            Ok(count) => summary.budget_alerts = count,
            Err(err) => error!(error = %err, "budget usage pass failed"),
        }
        summary
    }
}
