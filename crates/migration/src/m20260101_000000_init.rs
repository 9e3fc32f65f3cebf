//! Initial ChamaSmart schema.
//!
//! - `chamas`: tenants
//! - `members`: accounts, optionally attached to one chama
//! - `ledger_entries`: append-only money movements per member
//! - `loans` / `loan_guarantors`: loan book
//! - `payment_alerts`: inbound provider notifications
//! - `assets`: chama investments
//! - `loan_audit`: snapshots of deleted loans

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Chamas {
    Table,
    Id,
    Name,
    ContactEmail,
    ContactPhone,
    LogoUrl,
    CreatedAt,
}

#[derive(Iden)]
enum Members {
    Table,
    Id,
    TenantId,
    Email,
    CredentialHash,
    Name,
    Phone,
    Role,
    AvatarUrl,
    CreatedAt,
}

#[derive(Iden)]
enum LedgerEntries {
    Table,
    Id,
    MemberId,
    Kind,
    AmountMinor,
    DeltaMinor,
    Description,
    ReferenceCode,
    LoanId,
    RecordedBy,
    OccurredAt,
}

#[derive(Iden)]
enum Loans {
    Table,
    Id,
    BorrowerId,
    PrincipalMinor,
    InterestBps,
    DurationMonths,
    TotalRepayableMinor,
    BalanceMinor,
    Status,
    DueDate,
    DisbursedAt,
    CreatedAt,
}

#[derive(Iden)]
enum LoanGuarantors {
    Table,
    Id,
    LoanId,
    GuarantorId,
    AmountMinor,
    Accepted,
    CreatedAt,
}

#[derive(Iden)]
enum PaymentAlerts {
    Table,
    Id,
    Provider,
    ExternalId,
    AmountMinor,
    Payload,
    Status,
    TenantId,
    MatchedMemberId,
    LedgerEntryId,
    CreatedAt,
    ProcessedAt,
}

#[derive(Iden)]
enum Assets {
    Table,
    Id,
    TenantId,
    Name,
    Description,
    Category,
    PurchaseDate,
    PurchasePriceMinor,
    CurrentValueMinor,
    Documents,
    CreatedAt,
}

#[derive(Iden)]
enum LoanAudit {
    Table,
    Id,
    LoanId,
    TenantId,
    ActorId,
    Action,
    Snapshot,
    RecordedAt,
}

fn id_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).string().not_null().primary_key().to_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Chamas
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Chamas::Table)
                    .if_not_exists()
                    .col(id_col(Chamas::Id))
                    .col(ColumnDef::new(Chamas::Name).string().not_null())
                    .col(ColumnDef::new(Chamas::ContactEmail).string())
                    .col(ColumnDef::new(Chamas::ContactPhone).string())
                    .col(ColumnDef::new(Chamas::LogoUrl).string())
                    .col(ColumnDef::new(Chamas::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Members
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Members::Table)
                    .if_not_exists()
                    .col(id_col(Members::Id))
                    .col(ColumnDef::new(Members::TenantId).string())
                    .col(
                        ColumnDef::new(Members::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Members::CredentialHash).string().not_null())
                    .col(ColumnDef::new(Members::Name).string().not_null())
                    .col(ColumnDef::new(Members::Phone).string())
                    .col(
                        ColumnDef::new(Members::Role)
                            .string()
                            .not_null()
                            .default("member"),
                    )
                    .col(ColumnDef::new(Members::AvatarUrl).string())
                    .col(ColumnDef::new(Members::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-members-tenant_id")
                            .from(Members::Table, Members::TenantId)
                            .to(Chamas::Table, Chamas::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-members-tenant_id-phone")
                    .table(Members::Table)
                    .col(Members::TenantId)
                    .col(Members::Phone)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Ledger entries
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(id_col(LedgerEntries::Id))
                    .col(ColumnDef::new(LedgerEntries::MemberId).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::Kind).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::DeltaMinor).big_integer())
                    .col(ColumnDef::new(LedgerEntries::Description).string())
                    .col(ColumnDef::new(LedgerEntries::ReferenceCode).string())
                    .col(ColumnDef::new(LedgerEntries::LoanId).string())
                    .col(ColumnDef::new(LedgerEntries::RecordedBy).string())
                    .col(
                        ColumnDef::new(LedgerEntries::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ledger_entries-member_id")
                            .from(LedgerEntries::Table, LedgerEntries::MemberId)
                            .to(Members::Table, Members::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-member_id-occurred_at")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::MemberId)
                    .col(LedgerEntries::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-loan_id")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::LoanId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Loans
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Loans::Table)
                    .if_not_exists()
                    .col(id_col(Loans::Id))
                    .col(ColumnDef::new(Loans::BorrowerId).string().not_null())
                    .col(
                        ColumnDef::new(Loans::PrincipalMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Loans::InterestBps).big_integer().not_null())
                    .col(ColumnDef::new(Loans::DurationMonths).integer().not_null())
                    .col(
                        ColumnDef::new(Loans::TotalRepayableMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Loans::BalanceMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Loans::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Loans::DueDate).timestamp().not_null())
                    .col(ColumnDef::new(Loans::DisbursedAt).timestamp())
                    .col(ColumnDef::new(Loans::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-loans-borrower_id")
                            .from(Loans::Table, Loans::BorrowerId)
                            .to(Members::Table, Members::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-loans-borrower_id-status")
                    .table(Loans::Table)
                    .col(Loans::BorrowerId)
                    .col(Loans::Status)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Loan guarantors
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(LoanGuarantors::Table)
                    .if_not_exists()
                    .col(id_col(LoanGuarantors::Id))
                    .col(ColumnDef::new(LoanGuarantors::LoanId).string().not_null())
                    .col(
                        ColumnDef::new(LoanGuarantors::GuarantorId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LoanGuarantors::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LoanGuarantors::Accepted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(LoanGuarantors::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-loan_guarantors-loan_id")
                            .from(LoanGuarantors::Table, LoanGuarantors::LoanId)
                            .to(Loans::Table, Loans::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-loan_guarantors-guarantor_id")
                            .from(LoanGuarantors::Table, LoanGuarantors::GuarantorId)
                            .to(Members::Table, Members::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-loan_guarantors-loan_id-guarantor_id-unique")
                    .table(LoanGuarantors::Table)
                    .col(LoanGuarantors::LoanId)
                    .col(LoanGuarantors::GuarantorId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Payment alerts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(PaymentAlerts::Table)
                    .if_not_exists()
                    .col(id_col(PaymentAlerts::Id))
                    .col(ColumnDef::new(PaymentAlerts::Provider).string().not_null())
                    .col(
                        ColumnDef::new(PaymentAlerts::ExternalId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentAlerts::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentAlerts::Payload).text().not_null())
                    .col(
                        ColumnDef::new(PaymentAlerts::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(PaymentAlerts::TenantId).string())
                    .col(ColumnDef::new(PaymentAlerts::MatchedMemberId).string())
                    .col(ColumnDef::new(PaymentAlerts::LedgerEntryId).string())
                    .col(
                        ColumnDef::new(PaymentAlerts::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentAlerts::ProcessedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payment_alerts-provider-external_id-unique")
                    .table(PaymentAlerts::Table)
                    .col(PaymentAlerts::Provider)
                    .col(PaymentAlerts::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payment_alerts-status-tenant_id")
                    .table(PaymentAlerts::Table)
                    .col(PaymentAlerts::Status)
                    .col(PaymentAlerts::TenantId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Assets
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Assets::Table)
                    .if_not_exists()
                    .col(id_col(Assets::Id))
                    .col(ColumnDef::new(Assets::TenantId).string().not_null())
                    .col(ColumnDef::new(Assets::Name).string().not_null())
                    .col(ColumnDef::new(Assets::Description).string())
                    .col(ColumnDef::new(Assets::Category).string().not_null())
                    .col(ColumnDef::new(Assets::PurchaseDate).date().not_null())
                    .col(
                        ColumnDef::new(Assets::PurchasePriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Assets::CurrentValueMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Assets::Documents)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(Assets::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-assets-tenant_id")
                            .from(Assets::Table, Assets::TenantId)
                            .to(Chamas::Table, Chamas::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Loan audit
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(LoanAudit::Table)
                    .if_not_exists()
                    .col(id_col(LoanAudit::Id))
                    .col(ColumnDef::new(LoanAudit::LoanId).string().not_null())
                    .col(ColumnDef::new(LoanAudit::TenantId).string().not_null())
                    .col(ColumnDef::new(LoanAudit::ActorId).string().not_null())
                    .col(ColumnDef::new(LoanAudit::Action).string().not_null())
                    .col(ColumnDef::new(LoanAudit::Snapshot).text().not_null())
                    .col(
                        ColumnDef::new(LoanAudit::RecordedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-loan_audit-tenant_id-recorded_at")
                    .table(LoanAudit::Table)
                    .col(LoanAudit::TenantId)
                    .col(LoanAudit::RecordedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Reverse order of creation (FK dependencies)
        manager
            .drop_table(Table::drop().table(LoanAudit::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Assets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PaymentAlerts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LoanGuarantors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Loans::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Members::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Chamas::Table).to_owned())
            .await?;
        Ok(())
    }
}
