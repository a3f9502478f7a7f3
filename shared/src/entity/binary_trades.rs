//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use rust_decimal::Decimal;

use crate::models::{Settlement, Trade};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "binary_trades")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: i64,
    pub symbol: String,
    pub direction: String, // "buy" or "sell"
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub stake: Decimal,
    pub duration: i32, // seconds
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub entry_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))")]
    pub profit_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))")]
    pub commission_rate: Decimal,
    pub start_time: DateTimeUtc,
    pub settlement_time: DateTimeUtc, // scheduled expiry
    pub status: String, // "active", "settled"
    pub outcome: Option<String>, // "win", "lose"
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub final_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub commission: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub payout: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub net_profit: Option<Decimal>,
    pub settled_at: Option<DateTimeUtc>, // actual settlement instant
    pub result_seen: bool,
    pub created_at: Option<DateTimeUtc>,
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

impl TryFrom<Model> for Trade {
    type Error = anyhow::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let settlement = match model.status.as_str() {
            "active" => None,
            "settled" => {
                let missing = |field: &str| {
                    anyhow::anyhow!("settled trade {} is missing {}", model.id, field)
                };
                Some(Settlement {
                    outcome: model.outcome.as_deref().ok_or_else(|| missing("outcome"))?.parse()?,
                    exit_price: model.final_price.ok_or_else(|| missing("final_price"))?,
                    commission: model.commission.ok_or_else(|| missing("commission"))?,
                    payout: model.payout.ok_or_else(|| missing("payout"))?,
                    net_profit: model.net_profit.ok_or_else(|| missing("net_profit"))?,
                    settled_at: model.settled_at.ok_or_else(|| missing("settled_at"))?,
                })
            }
            other => anyhow::bail!("trade {} has unknown status {}", model.id, other),
        };

        Ok(Trade {
            id: model.id,
            user_id: model.user_id,
            symbol: model.symbol,
            direction: model.direction.parse()?,
            stake: model.stake,
            duration_secs: u32::try_from(model.duration)?,
            entry_price: model.entry_price,
            profit_rate: model.profit_rate,
            commission_rate: model.commission_rate,
            start_time: model.start_time,
            settlement_time: model.settlement_time,
            settlement,
            result_seen: model.result_seen,
        })
    }
}
