//! Account holders. Authentication happens upstream; the engine only needs
//! the contact details used for notifications.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::wallets::Entity")]
    Wallet,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Name used in greetings, falling back to the email address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.email.as_str())
    }
}

/// Contact details handed to the notifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContact {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

impl From<&Model> for UserContact {
    fn from(model: &Model) -> Self {
        Self {
            user_id: model.id.clone(),
            email: model.email.clone(),
            name: model.display_name().to_string(),
        }
    }
}
