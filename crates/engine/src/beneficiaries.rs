//! Saved payout recipients.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::PayoutAccount;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub account: PayoutAccount,
    /// Holder name as reported by the bank.
    pub account_name: String,
    /// Gateway payout handle created when the beneficiary was saved.
    pub recipient_ref: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "beneficiaries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub account_number: String,
    pub account_name: String,
    pub bank_code: String,
    pub bank_name: Option<String>,
    pub recipient_ref: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Beneficiary> for ActiveModel {
    fn from(value: &Beneficiary) -> Self {
        Self {
            id: ActiveValue::Set(value.id.clone()),
            user_id: ActiveValue::Set(value.user_id.clone()),
            name: ActiveValue::Set(value.name.clone()),
            account_number: ActiveValue::Set(value.account.account_number.clone()),
            account_name: ActiveValue::Set(value.account_name.clone()),
            bank_code: ActiveValue::Set(value.account.bank_code.clone()),
            bank_name: ActiveValue::Set(value.account.bank_name.clone()),
            recipient_ref: ActiveValue::Set(value.recipient_ref.clone()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl From<Model> for Beneficiary {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            account: PayoutAccount {
                account_number: model.account_number,
                bank_code: model.bank_code,
                bank_name: model.bank_name,
            },
            account_name: model.account_name,
            recipient_ref: model.recipient_ref,
            created_at: model.created_at,
        }
    }
}
