use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MfaMethods::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MfaMethods::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MfaMethods::UserId).uuid().not_null())
                    .col(ColumnDef::new(MfaMethods::Kind).string().not_null())
                    .col(ColumnDef::new(MfaMethods::Secret).string())
                    .col(ColumnDef::new(MfaMethods::PhoneNumber).string())
                    .col(
                        ColumnDef::new(MfaMethods::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MfaMethods::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MfaMethods::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MfaMethods::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .from(MfaMethods::Table, MfaMethods::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(MfaMethods::Table)
                    .col(MfaMethods::UserId)
                    .name("idx_mfa_methods_user_id")
                    .to_owned(),
            )
            .await?;

        // Partial unique index: one live enrollment per (user, kind).
        // Soft-deleted rows don't block re-enrollment; concurrent creates
        // surface a duplicate-key failure the service maps to DuplicateMethod.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX idx_mfa_methods_user_kind_live \
                 ON mfa_methods (user_id, kind) WHERE deleted_at IS NULL",
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MfaMethods::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MfaMethods {
    Table,
    Id,
    UserId,
    Kind,
    Secret,
    PhoneNumber,
    IsActive,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
