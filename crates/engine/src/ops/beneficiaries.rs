use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, prelude::*};
use tracing::info;
use uuid::Uuid;

use crate::{Beneficiary, EngineError, PayoutAccount, ResultEngine, beneficiaries};

use super::Engine;

pub(super) async fn load_beneficiary<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    beneficiary_id: &str,
) -> ResultEngine<Beneficiary> {
    Ok(beneficiaries::Entity::find_by_id(beneficiary_id.to_string())
        .filter(beneficiaries::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("beneficiary {beneficiary_id}")))?
        .into())
}

impl Engine {
    /// Saves a payout recipient after resolving the account holder at the
    /// gateway. The same account can only be saved once per user.
    pub async fn create_beneficiary(
        &self,
        user_id: &str,
        name: &str,
        account: PayoutAccount,
    ) -> ResultEngine<Beneficiary> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidInput(
                "beneficiary name must not be empty".to_string(),
            ));
        }
        let existing = beneficiaries::Entity::find()
            .filter(beneficiaries::Column::UserId.eq(user_id))
            .filter(beneficiaries::Column::AccountNumber.eq(account.account_number.as_str()))
            .filter(beneficiaries::Column::BankCode.eq(account.bank_code.as_str()))
            .one(&self.database)
            .await?;
        if existing.is_some() {
            return Err(EngineError::ExistingKey(format!(
                "beneficiary for account {}",
                account.account_number
            )));
        }

        let (account_name, recipient_ref) = self.create_recipient(&account).await?;
        let beneficiary = Beneficiary {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            account,
            account_name,
            recipient_ref,
            created_at: Utc::now(),
        };
        let model: beneficiaries::ActiveModel = (&beneficiary).into();
        model.insert(&self.database).await?;
        info!(user_id, beneficiary_id = %beneficiary.id, "beneficiary saved");
        Ok(beneficiary)
    }

    pub async fn beneficiaries(&self, user_id: &str) -> ResultEngine<Vec<Beneficiary>> {
        Ok(beneficiaries::Entity::find()
            .filter(beneficiaries::Column::UserId.eq(user_id))
            .order_by_asc(beneficiaries::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Beneficiary::from)
            .collect())
    }

    pub async fn beneficiary(&self, user_id: &str, beneficiary_id: &str) -> ResultEngine<Beneficiary> {
        load_beneficiary(&self.database, user_id, beneficiary_id).await
    }

    pub async fn remove_beneficiary(&self, user_id: &str, beneficiary_id: &str) -> ResultEngine<()> {
        let result = beneficiaries::Entity::delete_many()
            .filter(beneficiaries::Column::Id.eq(beneficiary_id))
            .filter(beneficiaries::Column::UserId.eq(user_id))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound(format!(
                "beneficiary {beneficiary_id}"
            )));
        }
        Ok(())
    }
}
