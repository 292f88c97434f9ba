mod common;

use chrono::{TimeDelta, TimeZone, Utc};

use common::{account, day_start, harness};
use engine::{
    BillCmd, BillStatus, Budget, Frequency, RecurringExpense, SpendCmd,
};

#[tokio::test]
async fn overlapping_budgets_conflict() {
    let h = harness().await;
    h.user_with_balance("alice", 0).await;
    let first = h.budget("alice", "food", 1000).await;

    let now = Utc::now();
    let clash = Budget::new("alice", "food", 500, now, now + TimeDelta::days(90)).unwrap();
    let err = h.engine.create_budget(clash).await.unwrap_err();
    assert_eq!(err.kind(), "conflict");

    // Another category is independent.
    let other = Budget::new("alice", "fuel", 500, now, now + TimeDelta::days(90)).unwrap();
    h.engine.create_budget(other).await.unwrap();
    let window = h.engine.find_active_window("alice", "food", now).await.unwrap();
    assert_eq!(window.id, first.id);
    assert_eq!(h.engine.budgets("alice").await.unwrap().len(), 2);
}

#[tokio::test]
async fn recurring_budget_renews_once_into_the_next_period() {
    let h = harness().await;
    h.user_with_balance("alice", 0).await;
    let january = Budget::new(
        "alice",
        "food",
        20000,
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap(),
    )
    .unwrap()
    .recurring(Frequency::Monthly);
    h.engine.create_budget(january).await.unwrap();

    let now = Utc.with_ymd_and_hms(2025, 2, 5, 8, 0, 0).unwrap();
    let renewed = h.engine.renew_recurring_budgets(now).await.unwrap();
    assert_eq!(renewed.len(), 1);
    let february = &renewed[0];
    assert_eq!(february.start_date, Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
    assert_eq!(february.end_date, Utc.with_ymd_and_hms(2025, 2, 28, 23, 59, 59).unwrap());
    assert_eq!(february.amount_minor, 20000);
    assert!(february.recurring);

    assert!(h.engine.renew_recurring_budgets(now).await.unwrap().is_empty());
    let window = h.engine.find_active_window("alice", "food", now).await.unwrap();
    assert_eq!(window.id, february.id);
}

#[tokio::test]
async fn renewal_defers_to_a_budget_the_user_already_created() {
    let h = harness().await;
    h.user_with_balance("alice", 0).await;
    let january = Budget::new(
        "alice",
        "rent",
        50000,
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap(),
    )
    .unwrap()
    .recurring(Frequency::Monthly);
    h.engine.create_budget(january).await.unwrap();
    let manual = Budget::new(
        "alice",
        "rent",
        60000,
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 2, 28, 23, 59, 59).unwrap(),
    )
    .unwrap();
    h.engine.create_budget(manual.clone()).await.unwrap();

    let now = Utc.with_ymd_and_hms(2025, 2, 2, 0, 0, 0).unwrap();
    assert!(h.engine.renew_recurring_budgets(now).await.unwrap().is_empty());
    let window = h.engine.find_active_window("alice", "rent", now).await.unwrap();
    assert_eq!(window.id, manual.id);
}

#[tokio::test]
async fn budget_summary_reports_usage() {
    let h = harness().await;
    h.user_with_balance("alice", 10000).await;
    h.budget("alice", "food", 4000).await;
    h.budget("alice", "fuel", 1000).await;
    h.engine
        .pay(SpendCmd::new("alice", "food", 1000, Utc::now()))
        .await
        .unwrap();

    let summary = h.engine.budget_summary("alice", None, Utc::now()).await.unwrap();
    assert_eq!(summary.len(), 2);
    let food = summary.iter().find(|u| u.budget.category_id == "food").unwrap();
    assert_eq!(food.spent_minor, 1000);
    assert_eq!(food.remaining_minor, 3000);
    assert_eq!(food.percent_used, 25);

    let fuel_only = h
        .engine
        .budget_summary("alice", Some("fuel"), Utc::now())
        .await
        .unwrap();
    assert_eq!(fuel_only.len(), 1);
    assert_eq!(fuel_only[0].percent_used, 0);
}

#[tokio::test]
async fn auto_pay_handles_each_bill_on_its_own() {
    let h = harness().await;
    let now = Utc::now();
    let today = day_start(now);
    h.user_with_balance("alice", 3000).await;
    h.budget("alice", "utilities", 10000).await;

    let affordable = h
        .engine
        .create_bill(BillCmd::new("alice", "utilities", 2000, "Water", today).auto_pay(true))
        .await
        .unwrap();
    let too_big = h
        .engine
        .create_bill(
            BillCmd::new("alice", "utilities", 5000, "Internet", today + TimeDelta::minutes(1))
                .auto_pay(true),
        )
        .await
        .unwrap();
    let manual = h
        .engine
        .create_bill(BillCmd::new("alice", "utilities", 100, "Gas", today))
        .await
        .unwrap();

    assert_eq!(h.engine.due_bill_reminders(now).await.unwrap(), 3);

    let report = h.engine.auto_pay_due_bills(now).await.unwrap();
    assert_eq!(report.paid, vec![affordable.id.clone()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, too_big.id);
    assert_eq!(report.failed[0].kind, "insufficient_funds");

    assert_eq!(h.engine.bill("alice", &affordable.id).await.unwrap().status, BillStatus::Paid);
    assert_eq!(h.engine.bill("alice", &too_big.id).await.unwrap().status, BillStatus::Pending);
    assert_eq!(h.engine.bill("alice", &manual.id).await.unwrap().status, BillStatus::Pending);
    assert_eq!(h.engine.balance("alice").await.unwrap(), 1000);
    assert!(h.notifier.wait_for("Auto-pay failed: Internet").await);
    assert!(h.notifier.wait_for("Bill due today: Gas").await);
    h.assert_balance_consistent("alice").await;
}

#[tokio::test]
async fn auto_pay_uses_a_transfer_when_the_bill_has_a_recipient() {
    let h = harness().await;
    let now = Utc::now();
    h.user_with_balance("alice", 5000).await;
    h.budget("alice", "rent", 5000).await;
    let bill = h
        .engine
        .create_bill(
            BillCmd::new("alice", "rent", 4000, "Rent", day_start(now))
                .auto_pay(true)
                .recipient(account("0123456789")),
        )
        .await
        .unwrap();

    let report = h.engine.auto_pay_due_bills(now).await.unwrap();
    assert_eq!(report.paid, vec![bill.id.clone()]);
    assert_eq!(h.gateway.transfer_count(), 1);
    assert_eq!(h.engine.balance("alice").await.unwrap(), 1000);

    // The resolved recipient is kept on the bill.
    let stored = h.engine.bill("alice", &bill.id).await.unwrap();
    assert_eq!(stored.recipient_ref.as_deref(), Some("RCP_0123456789"));
    assert_eq!(stored.recipient_account_name.as_deref(), Some("ADA OBI"));
}

#[tokio::test]
async fn bills_due_another_day_are_left_alone() {
    let h = harness().await;
    let now = Utc::now();
    h.user_with_balance("alice", 5000).await;
    h.budget("alice", "rent", 5000).await;
    h.engine
        .create_bill(
            BillCmd::new("alice", "rent", 100, "Tomorrow", day_start(now) + TimeDelta::days(1))
                .auto_pay(true),
        )
        .await
        .unwrap();

    assert_eq!(h.engine.due_bill_reminders(now).await.unwrap(), 0);
    let report = h.engine.auto_pay_due_bills(now).await.unwrap();
    assert!(report.paid.is_empty() && report.failed.is_empty());
}

#[tokio::test]
async fn recurring_expenses_advance_and_expire() {
    let h = harness().await;
    let now = Utc::now();
    h.user_with_balance("alice", 10000).await;
    h.budget("alice", "subscriptions", 10000).await;

    let weekly = RecurringExpense::new(
        "alice",
        "subscriptions",
        1200,
        "Streaming",
        Frequency::Weekly,
        now - TimeDelta::hours(2),
    )
    .unwrap();
    let weekly = h.engine.create_recurring_expense(weekly).await.unwrap();
    let last_day = RecurringExpense::new(
        "alice",
        "subscriptions",
        300,
        "Trial",
        Frequency::Daily,
        now - TimeDelta::hours(2),
    )
    .unwrap()
    .until(Some(now - TimeDelta::hours(1)));
    let last_day = h.engine.create_recurring_expense(last_day).await.unwrap();

    let report = h.engine.process_recurring_expenses(now).await.unwrap();
    assert_eq!(report.processed.len(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(report.deactivated, vec![last_day.id.clone()]);
    assert_eq!(h.engine.balance("alice").await.unwrap(), 8500);

    let items = h.engine.recurring_expenses("alice").await.unwrap();
    let advanced = items.iter().find(|i| i.id == weekly.id).unwrap();
    assert_eq!(advanced.next_due_date, weekly.next_due_date + TimeDelta::days(7));
    assert!(advanced.active);
    assert!(!items.iter().find(|i| i.id == last_day.id).unwrap().active);

    let rerun = h.engine.process_recurring_expenses(now).await.unwrap();
    assert!(rerun.processed.is_empty());
    assert_eq!(h.engine.expenses("alice", None).await.unwrap().len(), 2);
    h.assert_balance_consistent("alice").await;
}

#[tokio::test]
async fn failing_recurring_expense_still_advances() {
    let h = harness().await;
    let now = Utc::now();
    h.user_with_balance("alice", 10000).await;
    let gym = RecurringExpense::new(
        "alice",
        "gym",
        2500,
        "Gym",
        Frequency::Monthly,
        now - TimeDelta::hours(1),
    )
    .unwrap();
    let gym = h.engine.create_recurring_expense(gym).await.unwrap();

    let report = h.engine.process_recurring_expenses(now).await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].kind, "no_active_budget");
    let items = h.engine.recurring_expenses("alice").await.unwrap();
    assert!(items[0].next_due_date > now);
    assert_eq!(items[0].id, gym.id);
    assert_eq!(h.engine.balance("alice").await.unwrap(), 10000);
    assert!(h.notifier.wait_for("Recurring expense failed: Gym").await);
}

#[tokio::test]
async fn recurring_expense_rejects_end_before_start() {
    let h = harness().await;
    h.user_with_balance("alice", 0).await;
    let now = Utc::now();
    let item = RecurringExpense::new("alice", "gym", 100, "Gym", Frequency::Daily, now)
        .unwrap()
        .until(Some(now - TimeDelta::days(1)));
    let err = h.engine.create_recurring_expense(item).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_input");
}

#[tokio::test]
async fn threshold_alerts_fire_once_per_day() {
    let h = harness().await;
    let now = Utc::now();
    h.user_with_balance("alice", 10000).await;
    let budget = h.budget("alice", "food", 1000).await;

    h.engine
        .pay(SpendCmd::new("alice", "food", 800, now))
        .await
        .unwrap();
    assert_eq!(h.engine.check_budget_usage(now).await.unwrap(), 1);
    assert_eq!(h.engine.check_budget_usage(now).await.unwrap(), 0);

    h.engine
        .pay(SpendCmd::new("alice", "food", 200, now))
        .await
        .unwrap();
    assert_eq!(h.engine.check_budget_usage(now).await.unwrap(), 2);
    assert_eq!(h.engine.check_budget_usage(now).await.unwrap(), 0);
    assert!(h.notifier.wait_for(&format!("budget:alice:{}:100", budget.id)).await);

    // A new day re-arms every threshold.
    let tomorrow = now + TimeDelta::days(1);
    assert_eq!(h.engine.check_budget_usage(tomorrow).await.unwrap(), 3);
}

#[tokio::test]
async fn settlement_run_covers_every_pass() {
    let h = harness().await;
    let now = Utc::now();
    h.user_with_balance("alice", 10000).await;
    h.budget("alice", "bills", 10000).await;
    h.engine
        .create_bill(
            BillCmd::new("alice", "bills", 8000, "Tuition", day_start(now)).auto_pay(true),
        )
        .await
        .unwrap();
    let tv = RecurringExpense::new(
        "alice",
        "bills",
        500,
        "TV",
        Frequency::Monthly,
        now - TimeDelta::minutes(5),
    )
    .unwrap();
    h.engine.create_recurring_expense(tv).await.unwrap();

    let summary = h.engine.run_settlement_jobs(now).await;
    assert_eq!(summary.renewed_budgets, 0);
    assert_eq!(summary.reminders_sent, 1);
    assert_eq!(summary.auto_pay.paid.len(), 1);
    assert_eq!(summary.recurring.processed.len(), 1);
    // 8500 of 10000 spent: the 75% threshold.
    assert_eq!(summary.budget_alerts, 1);
    assert_eq!(h.engine.balance("alice").await.unwrap(), 1500);
}

#[tokio::test]
async fn bill_reminder_goes_out_once_a_day() {
    let h = harness().await;
    let now = Utc::now();
    h.user_with_balance("alice", 1000).await;
    h.budget("alice", "bills", 10000).await;
    h.engine
        .create_bill(BillCmd::new("alice", "bills", 5000, "Electricity", day_start(now)))
        .await
        .unwrap();

    let first = h.engine.run_settlement_jobs(now).await;
    assert_eq!(first.reminders_sent, 1);
    let later = h.engine.run_settlement_jobs(now + TimeDelta::minutes(1)).await;
    assert_eq!(later.reminders_sent, 0);
    assert_eq!(h.engine.due_bill_reminders(now).await.unwrap(), 0);

    assert!(h.notifier.wait_for("Bill due today: Electricity").await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let reminders = h
        .notifier
        .lines()
        .iter()
        .filter(|line| line.contains("Bill due today: Electricity"))
        .count();
    assert_eq!(reminders, 1);
}
