//! Realized spends. An expense row only exists together with the wallet
//! debit and the ledger entry it was committed with.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub description: Option<String>,
    /// Reference of the ledger entry recorded alongside this expense.
    pub reference: String,
    pub occurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub(crate) fn new_active(
    user_id: &str,
    category_id: &str,
    amount_minor: i64,
    description: Option<String>,
    reference: &str,
    occurred_at: DateTime<Utc>,
) -> ActiveModel {
    ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4().to_string()),
        user_id: ActiveValue::Set(user_id.to_string()),
        category_id: ActiveValue::Set(category_id.to_string()),
        amount_minor: ActiveValue::Set(amount_minor),
        description: ActiveValue::Set(description),
        reference: ActiveValue::Set(reference.to_string()),
        occurred_at: ActiveValue::Set(occurred_at),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

impl From<Model> for Expense {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            category_id: model.category_id,
            amount_minor: model.amount_minor,
            description: model.description,
            reference: model.reference,
            occurred_at: model.occurred_at,
        }
    }
}
