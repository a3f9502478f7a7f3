use sea_orm_migration::prelude::*;

use super::m20251201_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transactions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Transactions::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::Kind).string_len(16).not_null()) // "deposit", "withdrawal", "stake", "contract"
                    .col(ColumnDef::new(Transactions::Amount).decimal_len(20, 8).not_null()) // signed balance delta
                    .col(ColumnDef::new(Transactions::TradeId).uuid().null())
                    .col(ColumnDef::new(Transactions::Details).json().not_null())
                    .col(ColumnDef::new(Transactions::CreatedAt).timestamp().not_null())
                    .index(
                        Index::create()
                            .name("idx_transactions_user_created")
                            .table(Transactions::Table)
                            .col(Transactions::UserId)
                            .col(Transactions::CreatedAt)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_user")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    UserId,
    Kind,
    Amount,
    TradeId,
    Details,
    CreatedAt,
}
