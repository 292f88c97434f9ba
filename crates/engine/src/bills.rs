//! Bills: amounts owed by a due date, paid from the wallet directly or
//! through a gateway payout.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Pending,
    Paid,
}

impl BillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

impl TryFrom<&str> for BillStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            other => Err(EngineError::InvalidInput(format!(
                "invalid bill status: {other}"
            ))),
        }
    }
}

/// Listing filter. `Overdue` is a pending bill whose due date has passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillFilter {
    Pending,
    Overdue,
    Paid,
}

/// Bank account details for a payout destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutAccount {
    pub account_number: String,
    pub bank_code: String,
    pub bank_name: Option<String>,
}

impl PayoutAccount {
    pub fn new(
        account_number: impl Into<String>,
        bank_code: impl Into<String>,
        bank_name: Option<String>,
    ) -> ResultEngine<Self> {
        let account_number = account_number.into().trim().to_string();
        let bank_code = bank_code.into().trim().to_string();
        if account_number.is_empty() || !account_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(EngineError::InvalidInput(
                "account_number must be digits".to_string(),
            ));
        }
        if bank_code.is_empty() {
            return Err(EngineError::InvalidInput(
                "bank_code must not be empty".to_string(),
            ));
        }
        Ok(Self {
            account_number,
            bank_code,
            bank_name,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub status: BillStatus,
    pub auto_pay: bool,
    pub reference: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub beneficiary_id: Option<String>,
    pub recipient: Option<PayoutAccount>,
    pub recipient_account_name: Option<String>,
    pub recipient_ref: Option<String>,
}

impl Bill {
    /// Auto-pay uses a payout when the bill knows where the money goes.
    pub fn pays_by_transfer(&self) -> bool {
        self.beneficiary_id.is_some() || self.recipient.is_some()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == BillStatus::Pending && self.due_date < now
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bills")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub description: String,
    pub due_date: DateTimeUtc,
    pub status: String,
    pub auto_pay: bool,
    #[sea_orm(unique)]
    pub reference: String,
    pub paid_at: Option<DateTimeUtc>,
    pub beneficiary_id: Option<String>,
    pub recipient_account_number: Option<String>,
    pub recipient_account_name: Option<String>,
    pub recipient_bank_code: Option<String>,
    pub recipient_bank_name: Option<String>,
    pub recipient_ref: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Bill> for ActiveModel {
    fn from(bill: &Bill) -> Self {
        let recipient = bill.recipient.as_ref();
        Self {
            id: ActiveValue::Set(bill.id.clone()),
            user_id: ActiveValue::Set(bill.user_id.clone()),
            category_id: ActiveValue::Set(bill.category_id.clone()),
            amount_minor: ActiveValue::Set(bill.amount_minor),
            description: ActiveValue::Set(bill.description.clone()),
            due_date: ActiveValue::Set(bill.due_date),
            status: ActiveValue::Set(bill.status.as_str().to_string()),
            auto_pay: ActiveValue::Set(bill.auto_pay),
            reference: ActiveValue::Set(bill.reference.clone()),
            paid_at: ActiveValue::Set(bill.paid_at),
            beneficiary_id: ActiveValue::Set(bill.beneficiary_id.clone()),
            recipient_account_number: ActiveValue::Set(
                recipient.map(|r| r.account_number.clone()),
            ),
            recipient_account_name: ActiveValue::Set(bill.recipient_account_name.clone()),
            recipient_bank_code: ActiveValue::Set(recipient.map(|r| r.bank_code.clone())),
            recipient_bank_name: ActiveValue::Set(recipient.and_then(|r| r.bank_name.clone())),
            recipient_ref: ActiveValue::Set(bill.recipient_ref.clone()),
        }
    }
}

impl TryFrom<Model> for Bill {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let recipient = match (model.recipient_account_number, model.recipient_bank_code) {
            (Some(account_number), Some(bank_code)) => Some(PayoutAccount {
                account_number,
                bank_code,
                bank_name: model.recipient_bank_name,
            }),
            _ => None,
        };
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            category_id: model.category_id,
            amount_minor: model.amount_minor,
            description: model.description,
            due_date: model.due_date,
            status: BillStatus::try_from(model.status.as_str())?,
            auto_pay: model.auto_pay,
            reference: model.reference,
            paid_at: model.paid_at,
            beneficiary_id: model.beneficiary_id,
            recipient,
            recipient_account_name: model.recipient_account_name,
            recipient_ref: model.recipient_ref,
        })
    }
}

pub(crate) fn new_bill(
    user_id: &str,
    category_id: &str,
    amount_minor: i64,
    description: String,
    due_date: DateTime<Utc>,
) -> Bill {
    Bill {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        category_id: category_id.to_string(),
        amount_minor,
        description,
        due_date,
        status: BillStatus::Pending,
        auto_pay: false,
        reference: Uuid::new_v4().to_string(),
        paid_at: None,
        beneficiary_id: None,
        recipient: None,
        recipient_account_name: None,
        recipient_ref: None,
    }
}
