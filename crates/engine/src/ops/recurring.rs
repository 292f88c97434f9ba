use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use tracing::info;

use crate::{EngineError, RecurringExpense, ResultEngine, recurring_expenses};

use super::Engine;

impl Engine {
    pub async fn create_recurring_expense(
        &self,
        item: RecurringExpense,
    ) -> ResultEngine<RecurringExpense> {
        if item.description.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }
        if item.is_expired(item.next_due_date) {
            return Err(EngineError::InvalidInput(
                "end_date must not precede the first due date".to_string(),
            ));
        }
        let model: recurring_expenses::ActiveModel = (&item).into();
        model.insert(&self.database).await?;
        info!(user_id = %item.user_id, recurring_id = %item.id, "recurring expense created");
        Ok(item)
    }

    pub async fn recurring_expenses(&self, user_id: &str) -> ResultEngine<Vec<RecurringExpense>> {
        recurring_expenses::Entity::find()
            .filter(recurring_expenses::Column::UserId.eq(user_id))
            .order_by_asc(recurring_expenses::Column::NextDueDate)
            .all(&self.database)
            .await?
            .into_iter()
            .map(RecurringExpense::try_from)
            .collect()
    }
}
