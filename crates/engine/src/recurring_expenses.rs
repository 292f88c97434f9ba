//! Expenses that repeat on a fixed frequency until an optional end date.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Frequency, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringExpense {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub description: String,
    pub frequency: Frequency,
    pub next_due_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
}

impl RecurringExpense {
    pub fn new(
        user_id: impl Into<String>,
        category_id: impl Into<String>,
        amount_minor: i64,
        description: impl Into<String>,
        frequency: Frequency,
        start_date: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            category_id: category_id.into(),
            amount_minor,
            description: description.into(),
            frequency,
            next_due_date: start_date,
            end_date: None,
            active: true,
        })
    }

    #[must_use]
    pub fn until(mut self, end_date: Option<DateTime<Utc>>) -> Self {
        self.end_date = end_date;
        self
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_due_date <= now
    }

    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| at > end)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "recurring_expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub description: String,
    pub frequency: String,
    pub next_due_date: DateTimeUtc,
    pub end_date: Option<DateTimeUtc>,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&RecurringExpense> for ActiveModel {
    fn from(value: &RecurringExpense) -> Self {
        Self {
            id: ActiveValue::Set(value.id.clone()),
            user_id: ActiveValue::Set(value.user_id.clone()),
            category_id: ActiveValue::Set(value.category_id.clone()),
            amount_minor: ActiveValue::Set(value.amount_minor),
            description: ActiveValue::Set(value.description.clone()),
            frequency: ActiveValue::Set(value.frequency.as_str().to_string()),
            next_due_date: ActiveValue::Set(value.next_due_date),
            end_date: ActiveValue::Set(value.end_date),
            active: ActiveValue::Set(value.active),
        }
    }
}

impl TryFrom<Model> for RecurringExpense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            category_id: model.category_id,
            amount_minor: model.amount_minor,
            description: model.description,
            frequency: Frequency::try_from(model.frequency.as_str())?,
            next_due_date: model.next_due_date,
            end_date: model.end_date,
            active: model.active,
        })
    }
}
