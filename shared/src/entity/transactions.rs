//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use rust_decimal::Decimal;

use crate::models::{Transaction, TransactionKind};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: i64,
    pub kind: String, // "deposit", "withdrawal", "stake", "contract"
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub amount: Decimal, // signed balance delta
    pub trade_id: Option<Uuid>,
    pub details: Json, // serialized TransactionKind
    pub created_at: DateTimeUtc,
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
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Transaction {
    type Error = anyhow::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind: TransactionKind = serde_json::from_value(model.details)?;
        Ok(Transaction {
            id: model.id,
            user_id: model.user_id,
            created_at: model.created_at,
            kind,
        })
    }
}

impl TryFrom<&Transaction> for ActiveModel {
    type Error = anyhow::Error;

    fn try_from(tx: &Transaction) -> Result<Self, Self::Error> {
        Ok(ActiveModel {
            id: sea_orm::ActiveValue::Set(tx.id),
            user_id: sea_orm::ActiveValue::Set(tx.user_id),
            kind: sea_orm::ActiveValue::Set(tx.kind.label().to_string()),
            amount: sea_orm::ActiveValue::Set(tx.kind.balance_delta()),
            trade_id: sea_orm::ActiveValue::Set(tx.kind.trade_id()),
            details: sea_orm::ActiveValue::Set(serde_json::to_value(&tx.kind)?),
            created_at: sea_orm::ActiveValue::Set(tx.created_at),
        })
    }
}
