//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub username: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub balance: Decimal, // USDT available to stake
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::binary_trades::Entity")]
    BinaryTrades,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::binary_trades::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BinaryTrades.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
