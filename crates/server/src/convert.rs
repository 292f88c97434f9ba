//! Engine values to API bodies, and back.

use api_types::{
    Frequency as ApiFrequency, PayoutAccount as ApiAccount,
    beneficiary::BeneficiaryView,
    bill::{BillStatus as ApiBillStatus, BillView},
    budget::{BudgetUsageView, BudgetView},
    recurring::RecurringExpenseView,
    summary::{CategorySpendView, SummaryView},
    transaction::{
        ExpenseView, TransactionKind as ApiKind, TransactionStatus as ApiStatus, TransactionView,
    },
};
use chrono::{DateTime, FixedOffset, Utc};
use engine::{
    Beneficiary, Bill, BillStatus, Budget, BudgetUsage, Expense, Frequency, PayoutAccount,
    RecurringExpense, Transaction, TransactionKind, TransactionStatus, UserSummary,
};

use crate::{ServerError, format_amount};

pub fn utc(at: DateTime<FixedOffset>) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

pub fn kind_from_api(kind: ApiKind) -> TransactionKind {
    match kind {
        ApiKind::Income => TransactionKind::Income,
        ApiKind::Expense => TransactionKind::Expense,
        ApiKind::Deposit => TransactionKind::Deposit,
        ApiKind::Withdrawal => TransactionKind::Withdrawal,
        ApiKind::Transfer => TransactionKind::Transfer,
    }
}

fn kind_to_api(kind: TransactionKind) -> ApiKind {
    match kind {
        TransactionKind::Income => ApiKind::Income,
        TransactionKind::Expense => ApiKind::Expense,
        TransactionKind::Deposit => ApiKind::Deposit,
        TransactionKind::Withdrawal => ApiKind::Withdrawal,
        TransactionKind::Transfer => ApiKind::Transfer,
    }
}

pub fn status_from_api(status: ApiStatus) -> TransactionStatus {
    match status {
        ApiStatus::Pending => TransactionStatus::Pending,
        ApiStatus::Success => TransactionStatus::Success,
        ApiStatus::Failed => TransactionStatus::Failed,
    }
}

fn status_to_api(status: TransactionStatus) -> ApiStatus {
    match status {
        TransactionStatus::Pending => ApiStatus::Pending,
        TransactionStatus::Success => ApiStatus::Success,
        TransactionStatus::Failed => ApiStatus::Failed,
    }
}

pub fn frequency_from_api(frequency: ApiFrequency) -> Frequency {
    match frequency {
        ApiFrequency::Daily => Frequency::Daily,
        ApiFrequency::Weekly => Frequency::Weekly,
        ApiFrequency::Monthly => Frequency::Monthly,
        ApiFrequency::Yearly => Frequency::Yearly,
    }
}

fn frequency_to_api(frequency: Frequency) -> ApiFrequency {
    match frequency {
        Frequency::Daily => ApiFrequency::Daily,
        Frequency::Weekly => ApiFrequency::Weekly,
        Frequency::Monthly => ApiFrequency::Monthly,
        Frequency::Yearly => ApiFrequency::Yearly,
    }
}

pub fn account_from_api(account: ApiAccount) -> Result<PayoutAccount, ServerError> {
    Ok(PayoutAccount::new(
        account.account_number,
        account.bank_code,
        account.bank_name,
    )?)
}

fn account_to_api(account: PayoutAccount) -> ApiAccount {
    ApiAccount {
        account_number: account.account_number,
        bank_code: account.bank_code,
        bank_name: account.bank_name,
    }
}

pub fn transaction_view(tx: Transaction) -> TransactionView {
    TransactionView {
        reference: tx.reference,
        kind: kind_to_api(tx.kind),
        status: status_to_api(tx.status),
        amount: format_amount(tx.amount_minor),
        category_id: tx.category_id,
        description: tx.description,
        bill_id: tx.bill_id,
        transfer_ref: tx.transfer_ref,
        occurred_at: tx.occurred_at,
        finalized_at: tx.finalized_at,
    }
}

pub fn expense_view(expense: Expense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        category_id: expense.category_id,
        amount: format_amount(expense.amount_minor),
        description: expense.description,
        reference: expense.reference,
        occurred_at: expense.occurred_at,
    }
}

pub fn budget_view(budget: Budget) -> BudgetView {
    BudgetView {
        id: budget.id,
        category_id: budget.category_id,
        amount: format_amount(budget.amount_minor),
        start_date: budget.start_date,
        end_date: budget.end_date,
        recurring: budget.recurring,
        frequency: budget.frequency.map(frequency_to_api),
    }
}

pub fn usage_view(usage: BudgetUsage) -> BudgetUsageView {
    BudgetUsageView {
        spent: format_amount(usage.spent_minor),
        remaining: format_amount(usage.remaining_minor),
        percent_used: usage.percent_used,
        budget: budget_view(usage.budget),
    }
}

pub fn summary_view(summary: UserSummary) -> SummaryView {
    SummaryView {
        income: format_amount(summary.income_minor),
        expenses: format_amount(summary.expenses_minor),
        balance: format_amount(summary.balance),
        expenses_by_category: summary
            .expenses_by_category
            .into_iter()
            .map(|c| CategorySpendView {
                category_id: c.category_id,
                spent: format_amount(c.spent_minor),
            })
            .collect(),
        budgets: summary.budgets.into_iter().map(usage_view).collect(),
    }
}

pub fn bill_view(bill: Bill, now: DateTime<Utc>) -> BillView {
    BillView {
        overdue: bill.is_overdue(now),
        id: bill.id,
        category_id: bill.category_id,
        amount: format_amount(bill.amount_minor),
        description: bill.description,
        due_date: bill.due_date,
        status: match bill.status {
            BillStatus::Pending => ApiBillStatus::Pending,
            BillStatus::Paid => ApiBillStatus::Paid,
        },
        auto_pay: bill.auto_pay,
        paid_at: bill.paid_at,
        beneficiary_id: bill.beneficiary_id,
        recipient: bill.recipient.map(account_to_api),
        recipient_account_name: bill.recipient_account_name,
    }
}

pub fn beneficiary_view(beneficiary: Beneficiary) -> BeneficiaryView {
    BeneficiaryView {
        id: beneficiary.id,
        name: beneficiary.name,
        account: account_to_api(beneficiary.account),
        account_name: beneficiary.account_name,
        created_at: beneficiary.created_at,
    }
}

pub fn recurring_view(item: RecurringExpense) -> RecurringExpenseView {
    RecurringExpenseView {
        id: item.id,
        category_id: item.category_id,
        amount: format_amount(item.amount_minor),
        description: item.description,
        frequency: frequency_to_api(item.frequency),
        next_due_date: item.next_due_date,
        end_date: item.end_date,
        active: item.active,
    }
}
