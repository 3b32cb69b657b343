use sea_orm_migration::prelude::*;

mod m20260801_000001_create_users;
mod m20260801_000002_create_mfa_methods;
mod m20260801_000003_create_mfa_settings;
mod m20260801_000004_create_mfa_challenges;
mod m20260801_000005_create_outbox_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260801_000001_create_users::Migration),
            Box::new(m20260801_000002_create_mfa_methods::Migration),
            Box::new(m20260801_000003_create_mfa_settings::Migration),
            Box::new(m20260801_000004_create_mfa_challenges::Migration),
            Box::new(m20260801_000005_create_outbox_events::Migration),
        ]
    }
}

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
