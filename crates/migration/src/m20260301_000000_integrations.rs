//! Provider accounts (M-Pesa, Paystack, bank) configured per chama.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Integrations {
    Table,
    Id,
    TenantId,
    Provider,
    Name,
    Config,
    IsEnabled,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Chamas {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Integrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Integrations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Integrations::TenantId).string().not_null())
                    .col(ColumnDef::new(Integrations::Provider).string().not_null())
                    .col(ColumnDef::new(Integrations::Name).string().not_null())
                    .col(
                        ColumnDef::new(Integrations::Config)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Integrations::IsEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Integrations::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Integrations::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-integrations-tenant_id")
                            .from(Integrations::Table, Integrations::TenantId)
                            .to(Chamas::Table, Chamas::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-integrations-tenant_id-name-unique")
                    .table(Integrations::Table)
                    .col(Integrations::TenantId)
                    .col(Integrations::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Integrations::Table).to_owned())
            .await?;
        Ok(())
    }
}
