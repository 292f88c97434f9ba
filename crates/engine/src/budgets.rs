//! Spending limits per (user, category) over a date window.

use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Frequency, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub recurring: bool,
    pub frequency: Option<Frequency>,
    /// Set once a recurring budget has been cloned into its next period.
    pub renewed: bool,
}

impl Budget {
    pub fn new(
        user_id: impl Into<String>,
        category_id: impl Into<String>,
        amount_minor: i64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "budget amount must be > 0".to_string(),
            ));
        }
        if end_date < start_date {
            return Err(EngineError::InvalidInput(
                "budget end_date must not precede start_date".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            category_id: category_id.into(),
            amount_minor,
            start_date,
            end_date,
            recurring: false,
            frequency: None,
            renewed: false,
        })
    }

    #[must_use]
    pub fn recurring(mut self, frequency: Frequency) -> Self {
        self.recurring = true;
        self.frequency = Some(frequency);
        self
    }

    /// Inclusive on both ends.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_date <= at && at <= self.end_date
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_date <= end && start <= self.end_date
    }

    /// The budget covering the period right after this one. The new window
    /// starts one second after this one ends, so the two never overlap;
    /// budgets without an explicit frequency renew monthly.
    pub fn next_period(&self) -> ResultEngine<Self> {
        let frequency = self.frequency.unwrap_or(Frequency::Monthly);
        let start = self.end_date + TimeDelta::seconds(1);
        let end = frequency.advance(self.end_date)?;
        let next = Budget::new(
            self.user_id.clone(),
            self.category_id.clone(),
            self.amount_minor,
            start,
            end,
        )?;
        Ok(next.recurring(frequency))
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub amount_minor: i64,
    pub start_date: DateTimeUtc,
    pub end_date: DateTimeUtc,
    pub recurring: bool,
    pub frequency: Option<String>,
    pub renewed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Budget> for ActiveModel {
    fn from(budget: &Budget) -> Self {
        Self {
            id: ActiveValue::Set(budget.id.clone()),
            user_id: ActiveValue::Set(budget.user_id.clone()),
            category_id: ActiveValue::Set(budget.category_id.clone()),
            amount_minor: ActiveValue::Set(budget.amount_minor),
            start_date: ActiveValue::Set(budget.start_date),
            end_date: ActiveValue::Set(budget.end_date),
            recurring: ActiveValue::Set(budget.recurring),
            frequency: ActiveValue::Set(budget.frequency.map(|f| f.as_str().to_string())),
            renewed: ActiveValue::Set(budget.renewed),
        }
    }
}

impl TryFrom<Model> for Budget {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            category_id: model.category_id,
            amount_minor: model.amount_minor,
            start_date: model.start_date,
            end_date: model.end_date,
            recurring: model.recurring,
            frequency: model
                .frequency
                .as_deref()
                .map(Frequency::try_from)
                .transpose()?,
            renewed: model.renewed,
        })
    }
}
