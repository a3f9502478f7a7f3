pub use sea_orm_migration::prelude::*;

mod m20251201_000001_create_users;
mod m20251201_000002_create_binary_trades;
mod m20251201_000003_create_transactions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251201_000001_create_users::Migration),
            Box::new(m20251201_000002_create_binary_trades::Migration),
            Box::new(m20251201_000003_create_transactions::Migration),
        ]
    }
}
