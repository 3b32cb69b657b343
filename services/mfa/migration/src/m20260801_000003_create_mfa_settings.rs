use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MfaSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MfaSettings::UserId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MfaSettings::TotpSecret).string())
                    .col(
                        ColumnDef::new(MfaSettings::TotpEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MfaSettings::SmsEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(MfaSettings::SmsPhone).string())
                    .col(
                        ColumnDef::new(MfaSettings::EmailEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MfaSettings::MfaEnforced)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MfaSettings::BackupCodes)
                            .array(ColumnType::Text)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MfaSettings::BackupCodesUsed)
                            .array(ColumnType::Text)
                            .not_null(),
                    )
                    .col(ColumnDef::new(MfaSettings::LastUsedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(MfaSettings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MfaSettings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(MfaSettings::Table, MfaSettings::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MfaSettings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MfaSettings {
    Table,
    UserId,
    TotpSecret,
    TotpEnabled,
    SmsEnabled,
    SmsPhone,
    EmailEnabled,
    MfaEnforced,
    BackupCodes,
    BackupCodesUsed,
    LastUsedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
