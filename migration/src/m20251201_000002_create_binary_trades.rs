use sea_orm_migration::prelude::*;

use super::m20251201_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per binary contract; settlement columns stay NULL while active
        manager
            .create_table(
                Table::create()
                    .table(BinaryTrades::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BinaryTrades::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(BinaryTrades::UserId).big_integer().not_null())
                    .col(ColumnDef::new(BinaryTrades::Symbol).string_len(16).not_null())
                    .col(ColumnDef::new(BinaryTrades::Direction).string_len(8).not_null()) // "buy" or "sell"
                    .col(ColumnDef::new(BinaryTrades::Stake).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(BinaryTrades::Duration).integer().not_null()) // seconds
                    .col(ColumnDef::new(BinaryTrades::EntryPrice).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(BinaryTrades::ProfitRate).decimal_len(10, 4).not_null())
                    .col(ColumnDef::new(BinaryTrades::CommissionRate).decimal_len(10, 4).not_null())
                    .col(ColumnDef::new(BinaryTrades::StartTime).timestamp().not_null())
                    .col(ColumnDef::new(BinaryTrades::SettlementTime).timestamp().not_null()) // scheduled expiry
                    .col(ColumnDef::new(BinaryTrades::Status).string_len(16).not_null().default("active")) // "active", "settled"
                    .col(ColumnDef::new(BinaryTrades::Outcome).string_len(8).null()) // "win", "lose"
                    .col(ColumnDef::new(BinaryTrades::FinalPrice).decimal_len(20, 8).null())
                    .col(ColumnDef::new(BinaryTrades::Commission).decimal_len(20, 8).null())
                    .col(ColumnDef::new(BinaryTrades::Payout).decimal_len(20, 8).null())
                    .col(ColumnDef::new(BinaryTrades::NetProfit).decimal_len(20, 8).null())
                    .col(ColumnDef::new(BinaryTrades::SettledAt).timestamp().null()) // actual settlement instant
                    .col(ColumnDef::new(BinaryTrades::ResultSeen).boolean().not_null().default(false))
                    .col(ColumnDef::new(BinaryTrades::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_binary_trades_user_status")
                            .table(BinaryTrades::Table)
                            .col(BinaryTrades::UserId)
                            .col(BinaryTrades::Status)
                    )
                    .index(
                        Index::create()
                            .name("idx_binary_trades_status_settlement_time")
                            .table(BinaryTrades::Table)
                            .col(BinaryTrades::Status)
                            .col(BinaryTrades::SettlementTime)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_binary_trades_user")
                            .from(BinaryTrades::Table, BinaryTrades::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BinaryTrades::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BinaryTrades {
    Table,
    Id,
    UserId,
    Symbol,
    Direction,
    Stake,
    Duration,
    EntryPrice,
    ProfitRate,
    CommissionRate,
    StartTime,
    SettlementTime,
    Status,
    Outcome,
    FinalPrice,
    Commission,
    Payout,
    NetProfit,
    SettledAt,
    ResultSeen,
    CreatedAt,
}
