//! Initial schema migration - creates all tables from scratch.
//!
//! - `users`: account holders (identity is issued upstream)
//! - `wallets`: one balance per user, in minor units
//! - `budgets`: spending limits per (user, category) over a date window
//! - `transactions`: ledger entries, unique per gateway reference
//! - `expenses`: realized spends, tied to the ledger entry that paid them
//! - `beneficiaries`: saved payout recipients
//! - `bills`: amounts owed by a due date
//! - `recurring_expenses`: scheduled repeating spends
//! - `budget_alerts`: threshold alerts already sent
//! - `bill_reminders`: due-bill reminders already sent

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Email,
    Name,
    CreatedAt,
}

#[derive(Iden)]
enum Wallets {
    Table,
    UserId,
    Balance,
    ExternalAccountRef,
    ExternalRecipientRef,
    UpdatedAt,
}

#[derive(Iden)]
enum Budgets {
    Table,
    Id,
    UserId,
    CategoryId,
    AmountMinor,
    StartDate,
    EndDate,
    Recurring,
    Frequency,
    Renewed,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    UserId,
    Reference,
    Kind,
    Status,
    AmountMinor,
    CategoryId,
    Description,
    WalletApplied,
    TransferRef,
    BillId,
    OccurredAt,
    FinalizedAt,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    UserId,
    CategoryId,
    AmountMinor,
    Description,
    Reference,
    OccurredAt,
}

#[derive(Iden)]
enum Beneficiaries {
    Table,
    Id,
    UserId,
    Name,
    AccountNumber,
    AccountName,
    BankCode,
    BankName,
    RecipientRef,
    CreatedAt,
}

#[derive(Iden)]
enum Bills {
    Table,
    Id,
    UserId,
    CategoryId,
    AmountMinor,
    Description,
    DueDate,
    Status,
    AutoPay,
    Reference,
    PaidAt,
    BeneficiaryId,
    RecipientAccountNumber,
    RecipientAccountName,
    RecipientBankCode,
    RecipientBankName,
    RecipientRef,
}

#[derive(Iden)]
enum RecurringExpenses {
    Table,
    Id,
    UserId,
    CategoryId,
    AmountMinor,
    Description,
    Frequency,
    NextDueDate,
    EndDate,
    Active,
}

#[derive(Iden)]
enum BudgetAlerts {
    Table,
    Id,
    BudgetId,
    UserId,
    Threshold,
    PercentUsed,
    CreatedAt,
}

#[derive(Iden)]
enum BillReminders {
    Table,
    Id,
    BillId,
    UserId,
    RemindedOn,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::Name).string())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Wallets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallets::UserId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Wallets::Balance)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Wallets::Balance).gte(0)),
                    )
                    .col(ColumnDef::new(Wallets::ExternalAccountRef).string())
                    .col(ColumnDef::new(Wallets::ExternalRecipientRef).string())
                    .col(
                        ColumnDef::new(Wallets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-wallets-user_id")
                            .from(Wallets::Table, Wallets::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Budgets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Budgets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Budgets::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Budgets::UserId).string().not_null())
                    .col(ColumnDef::new(Budgets::CategoryId).string().not_null())
                    .col(ColumnDef::new(Budgets::AmountMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Budgets::StartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Budgets::EndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Budgets::Recurring)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Budgets::Frequency).string())
                    .col(
                        ColumnDef::new(Budgets::Renewed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budgets-user_id")
                            .from(Budgets::Table, Budgets::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budgets-user_id-category_id-start_date")
                    .table(Budgets::Table)
                    .col(Budgets::UserId)
                    .col(Budgets::CategoryId)
                    .col(Budgets::StartDate)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::UserId).string().not_null())
                    .col(ColumnDef::new(Transactions::Reference).string().not_null())
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(ColumnDef::new(Transactions::Status).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::CategoryId).string())
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(
                        ColumnDef::new(Transactions::WalletApplied)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Transactions::TransferRef).string())
                    .col(ColumnDef::new(Transactions::BillId).string())
                    .col(
                        ColumnDef::new(Transactions::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::FinalizedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-user_id")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-reference-unique")
                    .table(Transactions::Table)
                    .col(Transactions::Reference)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user_id-occurred_at")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::OccurredAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Expenses::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Expenses::UserId).string().not_null())
                    .col(ColumnDef::new(Expenses::CategoryId).string().not_null())
                    .col(ColumnDef::new(Expenses::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Expenses::Description).string())
                    .col(ColumnDef::new(Expenses::Reference).string().not_null())
                    .col(
                        ColumnDef::new(Expenses::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-user_id")
                            .from(Expenses::Table, Expenses::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-user_id-category_id-occurred_at")
                    .table(Expenses::Table)
                    .col(Expenses::UserId)
                    .col(Expenses::CategoryId)
                    .col(Expenses::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-reference")
                    .table(Expenses::Table)
                    .col(Expenses::Reference)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Beneficiaries
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Beneficiaries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Beneficiaries::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Beneficiaries::UserId).string().not_null())
                    .col(ColumnDef::new(Beneficiaries::Name).string().not_null())
                    .col(ColumnDef::new(Beneficiaries::AccountNumber).string().not_null())
                    .col(ColumnDef::new(Beneficiaries::AccountName).string().not_null())
                    .col(ColumnDef::new(Beneficiaries::BankCode).string().not_null())
                    .col(ColumnDef::new(Beneficiaries::BankName).string())
                    .col(ColumnDef::new(Beneficiaries::RecipientRef).string().not_null())
                    .col(
                        ColumnDef::new(Beneficiaries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-beneficiaries-user_id")
                            .from(Beneficiaries::Table, Beneficiaries::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-beneficiaries-user_id-account-unique")
                    .table(Beneficiaries::Table)
                    .col(Beneficiaries::UserId)
                    .col(Beneficiaries::AccountNumber)
                    .col(Beneficiaries::BankCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Bills
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Bills::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bills::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Bills::UserId).string().not_null())
                    .col(ColumnDef::new(Bills::CategoryId).string().not_null())
                    .col(ColumnDef::new(Bills::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Bills::Description).string().not_null())
                    .col(
                        ColumnDef::new(Bills::DueDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bills::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Bills::AutoPay)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Bills::Reference).string().not_null())
                    .col(ColumnDef::new(Bills::PaidAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Bills::BeneficiaryId).string())
                    .col(ColumnDef::new(Bills::RecipientAccountNumber).string())
                    .col(ColumnDef::new(Bills::RecipientAccountName).string())
                    .col(ColumnDef::new(Bills::RecipientBankCode).string())
                    .col(ColumnDef::new(Bills::RecipientBankName).string())
                    .col(ColumnDef::new(Bills::RecipientRef).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bills-user_id")
                            .from(Bills::Table, Bills::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bills-beneficiary_id")
                            .from(Bills::Table, Bills::BeneficiaryId)
                            .to(Beneficiaries::Table, Beneficiaries::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bills-reference-unique")
                    .table(Bills::Table)
                    .col(Bills::Reference)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bills-status-due_date")
                    .table(Bills::Table)
                    .col(Bills::Status)
                    .col(Bills::DueDate)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Recurring expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(RecurringExpenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecurringExpenses::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RecurringExpenses::UserId).string().not_null())
                    .col(
                        ColumnDef::new(RecurringExpenses::CategoryId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecurringExpenses::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecurringExpenses::Description)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecurringExpenses::Frequency).string().not_null())
                    .col(
                        ColumnDef::new(RecurringExpenses::NextDueDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecurringExpenses::EndDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(RecurringExpenses::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-recurring_expenses-user_id")
                            .from(RecurringExpenses::Table, RecurringExpenses::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 9. Budget alerts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BudgetAlerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BudgetAlerts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BudgetAlerts::BudgetId).string().not_null())
                    .col(ColumnDef::new(BudgetAlerts::UserId).string().not_null())
                    .col(ColumnDef::new(BudgetAlerts::Threshold).integer().not_null())
                    .col(ColumnDef::new(BudgetAlerts::PercentUsed).integer().not_null())
                    .col(
                        ColumnDef::new(BudgetAlerts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-budget_alerts-budget_id")
                            .from(BudgetAlerts::Table, BudgetAlerts::BudgetId)
                            .to(Budgets::Table, Budgets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-budget_alerts-budget_id-threshold-created_at")
                    .table(BudgetAlerts::Table)
                    .col(BudgetAlerts::BudgetId)
                    .col(BudgetAlerts::Threshold)
                    .col(BudgetAlerts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 10. Bill reminders
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BillReminders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BillReminders::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BillReminders::BillId).string().not_null())
                    .col(ColumnDef::new(BillReminders::UserId).string().not_null())
                    .col(ColumnDef::new(BillReminders::RemindedOn).date().not_null())
                    .col(
                        ColumnDef::new(BillReminders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bill_reminders-bill_id")
                            .from(BillReminders::Table, BillReminders::BillId)
                            .to(Bills::Table, Bills::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bill_reminders-bill_id-reminded_on")
                    .table(BillReminders::Table)
                    .col(BillReminders::BillId)
                    .col(BillReminders::RemindedOn)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(BillReminders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BudgetAlerts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecurringExpenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bills::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Beneficiaries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Budgets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
