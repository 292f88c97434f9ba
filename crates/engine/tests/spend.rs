mod common;

use chrono::{TimeDelta, Utc};
use tokio::task::JoinSet;

use common::harness;
use engine::{Budget, EngineError, SpendCmd, TransactionKind, TransactionListFilter};

#[tokio::test]
async fn insufficient_funds_then_spend_within_balance() {
    let h = harness().await;
    h.user_with_balance("alice", 5000).await;
    let budget = h.budget("alice", "food", 10000).await;

    let err = h
        .engine
        .pay(SpendCmd::new("alice", "food", 6000, Utc::now()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "insufficient_funds");
    assert_eq!(h.engine.balance("alice").await.unwrap(), 5000);
    assert_eq!(h.engine.spent_in_window(&budget).await.unwrap(), 0);

    let receipt = h
        .engine
        .pay(SpendCmd::new("alice", "food", 4000, Utc::now()).description("groceries"))
        .await
        .unwrap();
    assert_eq!(receipt.balance, 1000);
    assert_eq!(receipt.budget_remaining, 6000);
    assert_eq!(receipt.transaction.kind, TransactionKind::Expense);
    assert_eq!(h.engine.balance("alice").await.unwrap(), 1000);
    assert_eq!(h.engine.spent_in_window(&budget).await.unwrap(), 4000);

    let expenses = h.engine.expenses("alice", Some("food")).await.unwrap();
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].reference, receipt.transaction.reference);
    h.assert_balance_consistent("alice").await;
}

#[tokio::test]
async fn budget_is_checked_before_balance() {
    let h = harness().await;
    h.user_with_balance("alice", 0).await;
    h.budget("alice", "fun", 1000).await;

    let err = h
        .engine
        .create_expense(SpendCmd::new("alice", "fun", 2000, Utc::now()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "budget_exceeded");
}

#[tokio::test]
async fn spend_over_remaining_budget_is_rejected() {
    let h = harness().await;
    h.user_with_balance("alice", 10000).await;
    h.budget("alice", "food", 5000).await;

    h.engine
        .pay(SpendCmd::new("alice", "food", 3000, Utc::now()))
        .await
        .unwrap();
    let err = h
        .engine
        .pay(SpendCmd::new("alice", "food", 2500, Utc::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BudgetExceeded(_)));
    assert_eq!(h.engine.balance("alice").await.unwrap(), 7000);

    // Exactly filling the budget is allowed.
    h.engine
        .pay(SpendCmd::new("alice", "food", 2000, Utc::now()))
        .await
        .unwrap();
    assert_eq!(h.engine.balance("alice").await.unwrap(), 5000);
}

#[tokio::test]
async fn spend_without_budget_fails() {
    let h = harness().await;
    h.user_with_balance("alice", 10000).await;

    let err = h
        .engine
        .pay(SpendCmd::new("alice", "travel", 100, Utc::now()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "no_active_budget");

    // A budget that ended before the spend does not count either.
    let now = Utc::now();
    let past = Budget::new(
        "alice",
        "travel",
        5000,
        now - TimeDelta::days(60),
        now - TimeDelta::days(31),
    )
    .unwrap();
    h.engine.create_budget(past).await.unwrap();
    let err = h
        .engine
        .find_active_window("alice", "travel", now)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "no_active_budget");
}

#[tokio::test]
async fn expense_dates_cannot_reach_other_budget_windows() {
    let h = harness().await;
    h.user_with_balance("alice", 100000).await;
    let current = h.budget("alice", "food", 1000).await;
    let now = Utc::now();
    let expired = Budget::new(
        "alice",
        "food",
        100000,
        now - TimeDelta::days(90),
        now - TimeDelta::days(31),
    )
    .unwrap();
    h.engine.create_budget(expired).await.unwrap();
    let upcoming = Budget::new(
        "alice",
        "food",
        100000,
        now + TimeDelta::days(31),
        now + TimeDelta::days(90),
    )
    .unwrap();
    h.engine.create_budget(upcoming).await.unwrap();

    let err = h
        .engine
        .create_expense(SpendCmd::new("alice", "food", 50000, now))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "budget_exceeded");

    // The current window is checked whatever date the expense carries.
    let err = h
        .engine
        .create_expense(SpendCmd::new("alice", "food", 50000, now - TimeDelta::days(60)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "budget_exceeded");
    let err = h
        .engine
        .create_expense(SpendCmd::new("alice", "food", 500, now - TimeDelta::days(60)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");
    let err = h
        .engine
        .create_expense(SpendCmd::new("alice", "food", 500, now + TimeDelta::days(60)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");
    assert_eq!(h.engine.balance("alice").await.unwrap(), 100000);

    // Backdating inside the current window is fine and counts against it.
    h.engine
        .create_expense(SpendCmd::new("alice", "food", 400, now - TimeDelta::days(2)))
        .await
        .unwrap();
    assert_eq!(h.engine.spent_in_window(&current).await.unwrap(), 400);
    assert_eq!(h.engine.balance("alice").await.unwrap(), 99600);
    h.assert_balance_consistent("alice").await;
}

#[tokio::test]
async fn spend_rejects_non_positive_amounts() {
    let h = harness().await;
    h.user_with_balance("alice", 1000).await;
    h.budget("alice", "food", 1000).await;

    let err = h
        .engine
        .pay(SpendCmd::new("alice", "food", 0, Utc::now()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_amount");
}

#[tokio::test]
async fn duplicate_reference_rolls_back_the_whole_spend() {
    let h = harness().await;
    h.user_with_balance("alice", 10000).await;
    let budget = h.budget("alice", "food", 10000).await;

    h.engine
        .pay(SpendCmd::new("alice", "food", 1000, Utc::now()).reference("order-42"))
        .await
        .unwrap();
    // The debit and the expense row are written before the ledger entry,
    // so this failure exercises the rollback of both.
    let err = h
        .engine
        .pay(SpendCmd::new("alice", "food", 1000, Utc::now()).reference("order-42"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::DuplicateReference("order-42".to_string()));

    assert_eq!(h.engine.balance("alice").await.unwrap(), 9000);
    assert_eq!(h.engine.spent_in_window(&budget).await.unwrap(), 1000);
    assert_eq!(h.engine.expenses("alice", None).await.unwrap().len(), 1);
    h.assert_balance_consistent("alice").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_spends_never_overdraw() {
    let h = harness().await;
    h.user_with_balance("alice", 5000).await;
    h.budget("alice", "food", 100_000).await;

    let mut set = JoinSet::new();
    for _ in 0..10 {
        let engine = h.engine.clone();
        set.spawn(async move {
            engine
                .pay(SpendCmd::new("alice", "food", 1000, Utc::now()))
                .await
        });
    }
    let mut ok = 0;
    let mut insufficient = 0;
    while let Some(joined) = set.join_next().await {
        match joined.unwrap() {
            Ok(_) => ok += 1,
            Err(EngineError::InsufficientFunds(_)) => insufficient += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(ok, 5);
    assert_eq!(insufficient, 5);
    assert_eq!(h.engine.balance("alice").await.unwrap(), 0);
    h.assert_balance_consistent("alice").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_spends_respect_the_budget() {
    let h = harness().await;
    h.user_with_balance("alice", 100_000).await;
    let budget = h.budget("alice", "food", 3000).await;

    let mut set = JoinSet::new();
    for _ in 0..6 {
        let engine = h.engine.clone();
        set.spawn(async move {
            engine
                .pay(SpendCmd::new("alice", "food", 1000, Utc::now()))
                .await
        });
    }
    let mut ok = 0;
    while let Some(joined) = set.join_next().await {
        if joined.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 3);
    assert_eq!(h.engine.spent_in_window(&budget).await.unwrap(), 3000);
}

#[tokio::test]
async fn income_credits_and_lists_newest_first() {
    let h = harness().await;
    h.user_with_balance("alice", 0).await;
    let earlier = Utc::now() - TimeDelta::hours(2);

    h.engine
        .record_income("alice", 1500, Some("freelance"), earlier)
        .await
        .unwrap();
    let receipt = h
        .engine
        .record_income("alice", 2500, None, Utc::now())
        .await
        .unwrap();
    assert_eq!(receipt.balance, 4000);

    let entries = h
        .engine
        .transactions("alice", &TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].amount_minor, 2500);

    let filtered = h
        .engine
        .transactions(
            "alice",
            &TransactionListFilter {
                min_amount_minor: Some(2000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);

    let err = h
        .engine
        .transactions(
            "alice",
            &TransactionListFilter {
                from: Some(Utc::now()),
                to: Some(earlier),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");

    assert!(h.notifier.wait_for(&receipt.transaction.reference).await);
}

#[tokio::test]
async fn transactions_are_private_to_their_owner() {
    let h = harness().await;
    h.user_with_balance("alice", 1000).await;
    h.user_with_balance("bob", 0).await;
    let entries = h
        .engine
        .transactions("alice", &TransactionListFilter::default())
        .await
        .unwrap();
    let reference = &entries[0].reference;

    assert!(h.engine.transaction("alice", reference).await.is_ok());
    let err = h.engine.transaction("bob", reference).await.unwrap_err();
    assert_eq!(err.kind(), "transaction_not_found");
}

#[tokio::test]
async fn registering_twice_conflicts() {
    let h = harness().await;
    h.user_with_balance("alice", 0).await;
    let err = h
        .engine
        .register_user("alice", "alice@example.com", None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "conflict");

    let err = h
        .engine
        .register_user("carol", "not-an-email", None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");

    let err = h.engine.balance("nobody").await.unwrap_err();
    assert_eq!(err.kind(), "wallet_not_found");
}

#[tokio::test]
async fn summary_totals_settled_money_only() {
    let h = harness().await;
    h.user_with_balance("alice", 10000).await;
    h.budget("alice", "food", 5000).await;
    h.budget("alice", "fuel", 2000).await;
    for (category, amount) in [("food", 1000), ("food", 500), ("fuel", 300)] {
        h.engine
            .pay(SpendCmd::new("alice", category, amount, Utc::now()))
            .await
            .unwrap();
    }
    // Not settled yet, so it counts nowhere.
    h.engine.initiate_deposit("alice", 2000).await.unwrap();

    let summary = h.engine.summary("alice", Utc::now()).await.unwrap();
    assert_eq!(summary.income_minor, 10000);
    assert_eq!(summary.expenses_minor, 1800);
    assert_eq!(summary.balance, 8200);
    assert_eq!(summary.income_minor - summary.expenses_minor, summary.balance);
    let by_category: Vec<_> = summary
        .expenses_by_category
        .iter()
        .map(|c| (c.category_id.as_str(), c.spent_minor))
        .collect();
    assert_eq!(by_category, vec![("food", 1500), ("fuel", 300)]);
    assert_eq!(summary.budgets.len(), 2);
    assert_eq!(summary.budgets[0].budget.category_id, "food");
    assert_eq!(summary.budgets[0].percent_used, 30);

    let err = h.engine.summary("nobody", Utc::now()).await.unwrap_err();
    assert_eq!(err.kind(), "wallet_not_found");
}
