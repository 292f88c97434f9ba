use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::info;

use crate::{
    Bill, BillCmd, BillFilter, BillStatus, EngineError, Money, Notification, ResultEngine,
    Transaction, TransactionKind, TransferPayCmd, bills, new_reference,
};

use super::{
    Engine, LedgerReceipt,
    beneficiaries::load_beneficiary,
    budgets::{active_window, spent_in},
    require_positive,
    spend::{SpendReceipt, authorize, commit_debit},
    transfers::Payout,
    with_tx,
};

pub(super) async fn load_bill<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    bill_id: &str,
) -> ResultEngine<Bill> {
    bills::Entity::find_by_id(bill_id.to_string())
        .filter(bills::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("bill {bill_id}")))?
        .try_into()
}

fn ensure_pending(bill: &Bill) -> ResultEngine<()> {
    if bill.status != BillStatus::Pending {
        return Err(EngineError::InvalidState(format!(
            "bill {} is already paid",
            bill.id
        )));
    }
    Ok(())
}

/// `PENDING -> PAID`, only if the bill is still pending.
pub(super) async fn mark_bill_paid<C: ConnectionTrait>(
    conn: &C,
    bill_id: &str,
    at: DateTime<Utc>,
) -> ResultEngine<()> {
    let result = bills::Entity::update_many()
        .col_expr(bills::Column::Status, Expr::value(BillStatus::Paid.as_str()))
        .col_expr(bills::Column::PaidAt, Expr::value(Some(at)))
        .filter(bills::Column::Id.eq(bill_id))
        .filter(bills::Column::Status.eq(BillStatus::Pending.as_str()))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::InvalidState(format!(
            "bill {bill_id} is already paid"
        )));
    }
    Ok(())
}

/// Puts a bill back to `PENDING` after its payout was reversed.
pub(super) async fn reopen_bill<C: ConnectionTrait>(conn: &C, bill_id: &str) -> ResultEngine<()> {
    bills::Entity::update_many()
        .col_expr(bills::Column::Status, Expr::value(BillStatus::Pending.as_str()))
        .col_expr(bills::Column::PaidAt, Expr::value(Option::<DateTime<Utc>>::None))
        .filter(bills::Column::Id.eq(bill_id))
        .exec(conn)
        .await?;
    Ok(())
}

impl Engine {
    /// Creates a pending bill. The category needs an active budget with room
    /// for the bill's amount.
    pub async fn create_bill(&self, cmd: BillCmd) -> ResultEngine<Bill> {
        require_positive(cmd.amount_minor)?;
        let description = cmd.description.trim().to_string();
        if description.is_empty() {
            return Err(EngineError::InvalidInput(
                "bill description must not be empty".to_string(),
            ));
        }
        if let Some(beneficiary_id) = cmd.beneficiary_id.as_deref() {
            load_beneficiary(&self.database, &cmd.user_id, beneficiary_id).await?;
        }

        let now = Utc::now();
        let mut bill = bills::new_bill(
            &cmd.user_id,
            &cmd.category_id,
            cmd.amount_minor,
            description,
            cmd.due_date,
        );
        bill.auto_pay = cmd.auto_pay;
        bill.beneficiary_id = cmd.beneficiary_id;
        bill.recipient = cmd.recipient;

        let _guard = self.locks.lock(&cmd.user_id).await;
        with_tx!(self, |db_tx| {
            let window = active_window(&db_tx, &bill.user_id, &bill.category_id, now).await?;
            let spent = spent_in(&db_tx, &window).await?;
            if spent + bill.amount_minor > window.amount_minor {
                return Err(EngineError::BudgetExceeded(format!(
                    "bill of {} does not fit the remaining {}",
                    Money::new(bill.amount_minor),
                    Money::new(window.amount_minor - spent)
                )));
            }
            let model: bills::ActiveModel = (&bill).into();
            model.insert(&db_tx).await?;
            Ok(())
        })?;

        info!(user_id = %bill.user_id, bill_id = %bill.id, "bill created");
        Ok(bill)
    }

    pub async fn bills(
        &self,
        user_id: &str,
        filter: Option<BillFilter>,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<Bill>> {
        let mut query = bills::Entity::find().filter(bills::Column::UserId.eq(user_id));
        query = match filter {
            Some(BillFilter::Pending) => {
                query.filter(bills::Column::Status.eq(BillStatus::Pending.as_str()))
            }
            Some(BillFilter::Overdue) => query
                .filter(bills::Column::Status.eq(BillStatus::Pending.as_str()))
                .filter(bills::Column::DueDate.lt(now)),
            Some(BillFilter::Paid) => {
                query.filter(bills::Column::Status.eq(BillStatus::Paid.as_str()))
            }
            None => query,
        };
        query
            .order_by_asc(bills::Column::DueDate)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Bill::try_from)
            .collect()
    }

    pub async fn bill(&self, user_id: &str, bill_id: &str) -> ResultEngine<Bill> {
        load_bill(&self.database, user_id, bill_id).await
    }

    /// Pays a bill straight from the wallet.
    pub async fn pay_bill(
        &self,
        user_id: &str,
        bill_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<SpendReceipt> {
        let _guard = self.locks.lock(user_id).await;
        let receipt = with_tx!(self, |db_tx| {
            let bill = load_bill(&db_tx, user_id, bill_id).await?;
            ensure_pending(&bill)?;
            let (window, spent) =
                authorize(&db_tx, user_id, &bill.category_id, bill.amount_minor, now).await?;
            let transaction = Transaction::new(
                user_id,
                new_reference("bill"),
                TransactionKind::Expense,
                bill.amount_minor,
                now,
            )?
            .settled()
            .category(Some(bill.category_id.clone()))
            .description(Some(format!("Bill payment: {}", bill.description)))
            .bill(Some(bill.id.clone()));
            let balance = commit_debit(&db_tx, &transaction, &bill.category_id).await?;
            mark_bill_paid(&db_tx, &bill.id, now).await?;
            Ok(SpendReceipt {
                transaction,
                balance,
                budget_remaining: window.amount_minor - spent - bill.amount_minor,
            })
        })?;

        info!(user_id, bill_id, reference = %receipt.transaction.reference, "bill paid from wallet");
        let alert = receipt.transaction.clone();
        self.notify(user_id, move |user| Notification::TransactionAlert {
            user,
            transaction: alert,
        })
        .await;
        Ok(receipt)
    }

    /// Pays a bill through a gateway payout. Nothing is debited unless the
    /// gateway accepted the transfer.
    pub async fn pay_bill_with_transfer(&self, cmd: TransferPayCmd) -> ResultEngine<LedgerReceipt> {
        let _guard = self.locks.lock(&cmd.user_id).await;
        let bill = load_bill(&self.database, &cmd.user_id, &cmd.bill_id).await?;
        ensure_pending(&bill)?;
        authorize(
            &self.database,
            &cmd.user_id,
            &bill.category_id,
            bill.amount_minor,
            Utc::now(),
        )
        .await?;

        let recipient_ref = self.bill_recipient(&cmd, &bill).await?;
        self.execute_payout(Payout {
            user_id: cmd.user_id,
            kind: TransactionKind::Transfer,
            amount_minor: bill.amount_minor,
            category_id: Some(bill.category_id),
            bill_id: Some(bill.id),
            description: format!("Bill payment: {}", bill.description),
            recipient_ref,
        })
        .await
    }

    async fn bill_recipient(&self, cmd: &TransferPayCmd, bill: &Bill) -> ResultEngine<String> {
        if let Some(beneficiary_id) = cmd.beneficiary_id.as_deref() {
            return Ok(load_beneficiary(&self.database, &cmd.user_id, beneficiary_id)
                .await?
                .recipient_ref);
        }
        if let Some(account) = &cmd.recipient {
            let (_, recipient_ref) = self.create_recipient(account).await?;
            return Ok(recipient_ref);
        }
        if let Some(beneficiary_id) = bill.beneficiary_id.as_deref() {
            return Ok(load_beneficiary(&self.database, &cmd.user_id, beneficiary_id)
                .await?
                .recipient_ref);
        }
        if let Some(recipient_ref) = &bill.recipient_ref {
            return Ok(recipient_ref.clone());
        }
        if let Some(account) = &bill.recipient {
            let (account_name, recipient_ref) = self.create_recipient(account).await?;
            bills::Entity::update_many()
                .col_expr(
                    bills::Column::RecipientRef,
                    Expr::value(Some(recipient_ref.clone())),
                )
                .col_expr(
                    bills::Column::RecipientAccountName,
                    Expr::value(Some(account_name)),
                )
                .filter(bills::Column::Id.eq(bill.id.as_str()))
                .exec(&self.database)
                .await?;
            return Ok(recipient_ref);
        }
        Err(EngineError::InvalidInput(format!(
            "bill {} has no payout destination, provide a beneficiary or account details",
            bill.id
        )))
    }
}
