//! The module contains `Wallet` struct and its persistence model.

use chrono::Utc;
use sea_orm::entity::{ActiveValue, prelude::*};

/// A user's spendable balance.
///
/// There is exactly one wallet per user. `balance` is only ever changed by
/// the wallet store's guarded adjust, which never lets it go below zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wallet {
    pub user_id: String,
    pub balance: i64,
    /// Opaque gateway account handle (subaccount) used when collecting charges.
    pub external_account_ref: Option<String>,
    /// Opaque gateway payout handle, created on the first withdrawal.
    pub external_recipient_ref: Option<String>,
}

impl Wallet {
    pub fn new(user_id: impl Into<String>, external_account_ref: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            balance: 0,
            external_account_ref,
            external_recipient_ref: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub balance: i64,
    pub external_account_ref: Option<String>,
    pub external_recipient_ref: Option<String>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Wallet> for ActiveModel {
    fn from(value: &Wallet) -> Self {
        Self {
            user_id: ActiveValue::Set(value.user_id.clone()),
            balance: ActiveValue::Set(value.balance),
            external_account_ref: ActiveValue::Set(value.external_account_ref.clone()),
            external_recipient_ref: ActiveValue::Set(value.external_recipient_ref.clone()),
            updated_at: ActiveValue::Set(Utc::now()),
        }
    }
}

impl From<Model> for Wallet {
    fn from(model: Model) -> Self {
        Self {
            user_id: model.user_id,
            balance: model.balance,
            external_account_ref: model.external_account_ref,
            external_recipient_ref: model.external_recipient_ref,
        }
    }
}
