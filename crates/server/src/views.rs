//! Mapping between engine types and the wire DTOs of `api_types`.

use api_types::{
    alert::{AlertView, Provider as ApiProvider},
    asset::AssetView,
    integration::IntegrationView,
    ledger::{EntryKind as ApiKind, EntryView},
    loan::{GuarantorView, LoanAuditView, LoanDetailView, LoanStatus as ApiStatus, LoanView},
    member::{MemberSummaryView, MemberView, Role as ApiRole},
    stats,
    tenant::TenantView,
};
use engine::{
    Asset, DashboardStats, EntryKind, Guarantor, Integration, LedgerEntry, Loan,
    LoanAuditRecord, LoanDetails, LoanStats, LoanStatus, Member, MemberSummary, PaymentAlert,
    Provider, Role, Tenant, TransactionStats,
};

pub fn role_to_api(role: Role) -> ApiRole {
    match role {
        Role::Admin => ApiRole::Admin,
        Role::Treasurer => ApiRole::Treasurer,
        Role::Member => ApiRole::Member,
    }
}

pub fn role_from_api(role: ApiRole) -> Role {
    match role {
        ApiRole::Admin => Role::Admin,
        ApiRole::Treasurer => Role::Treasurer,
        ApiRole::Member => Role::Member,
    }
}

pub fn kind_to_api(kind: EntryKind) -> ApiKind {
    match kind {
        EntryKind::Deposit => ApiKind::Deposit,
        EntryKind::Withdrawal => ApiKind::Withdrawal,
        EntryKind::Expense => ApiKind::Expense,
        EntryKind::Fine => ApiKind::Fine,
        EntryKind::LoanDisbursement => ApiKind::LoanDisbursement,
        EntryKind::LoanRepayment => ApiKind::LoanRepayment,
        EntryKind::Adjustment => ApiKind::Adjustment,
    }
}

pub fn kind_from_api(kind: ApiKind) -> EntryKind {
    match kind {
        ApiKind::Deposit => EntryKind::Deposit,
        ApiKind::Withdrawal => EntryKind::Withdrawal,
        ApiKind::Expense => EntryKind::Expense,
        ApiKind::Fine => EntryKind::Fine,
        ApiKind::LoanDisbursement => EntryKind::LoanDisbursement,
        ApiKind::LoanRepayment => EntryKind::LoanRepayment,
        ApiKind::Adjustment => EntryKind::Adjustment,
    }
}

pub fn status_to_api(status: LoanStatus) -> ApiStatus {
    match status {
        LoanStatus::Pending => ApiStatus::Pending,
        LoanStatus::Approved => ApiStatus::Approved,
        LoanStatus::Active => ApiStatus::Active,
        LoanStatus::Paid => ApiStatus::Paid,
        LoanStatus::Rejected => ApiStatus::Rejected,
        LoanStatus::Defaulted => ApiStatus::Defaulted,
    }
}

pub fn status_from_api(status: ApiStatus) -> LoanStatus {
    match status {
        ApiStatus::Pending => LoanStatus::Pending,
        ApiStatus::Approved => LoanStatus::Approved,
        ApiStatus::Active => LoanStatus::Active,
        ApiStatus::Paid => LoanStatus::Paid,
        ApiStatus::Rejected => LoanStatus::Rejected,
        ApiStatus::Defaulted => LoanStatus::Defaulted,
    }
}

fn provider_to_api(provider: Provider) -> ApiProvider {
    match provider {
        Provider::Mpesa => ApiProvider::Mpesa,
        Provider::Paystack => ApiProvider::Paystack,
        Provider::Bank => ApiProvider::Bank,
    }
}

pub fn provider_from_api(provider: ApiProvider) -> Provider {
    match provider {
        ApiProvider::Mpesa => Provider::Mpesa,
        ApiProvider::Paystack => Provider::Paystack,
        ApiProvider::Bank => Provider::Bank,
    }
}

pub fn member_view(member: Member) -> MemberView {
    MemberView {
        id: member.id,
        email: member.email,
        name: member.name,
        phone: member.phone,
        role: role_to_api(member.role),
        avatar_url: member.avatar_url,
        created_at: member.created_at,
    }
}

pub fn member_summary_view(summary: MemberSummary) -> MemberSummaryView {
    MemberSummaryView {
        member: member_view(summary.member),
        ledger_entries: summary.ledger_entries,
        loans: summary.loans,
    }
}

pub fn tenant_view(tenant: Tenant) -> TenantView {
    TenantView {
        id: tenant.id,
        name: tenant.name,
        contact_email: tenant.contact_email,
        contact_phone: tenant.contact_phone,
        logo_url: tenant.logo_url,
        created_at: tenant.created_at,
    }
}

pub fn entry_view(entry: LedgerEntry) -> EntryView {
    EntryView {
        id: entry.id,
        member_id: entry.member_id,
        kind: kind_to_api(entry.kind),
        amount_minor: entry.amount.cents(),
        delta_minor: entry.delta.map(|d| d.cents()),
        description: entry.description,
        reference_code: entry.reference_code,
        loan_id: entry.loan_id,
        recorded_by: entry.recorded_by,
        occurred_at: entry.occurred_at,
    }
}

pub fn loan_view(loan: Loan) -> LoanView {
    LoanView {
        id: loan.id,
        borrower_id: loan.borrower_id,
        principal_minor: loan.principal.cents(),
        interest_bps: loan.interest_rate.basis_points(),
        duration_months: loan.duration_months,
        total_repayable_minor: loan.total_repayable.cents(),
        balance_minor: loan.balance.cents(),
        status: status_to_api(loan.status),
        due_date: loan.due_date,
        disbursed_at: loan.disbursed_at,
        created_at: loan.created_at,
    }
}

pub fn guarantor_view(row: Guarantor) -> GuarantorView {
    GuarantorView {
        id: row.id,
        loan_id: row.loan_id,
        guarantor_id: row.guarantor_id,
        amount_minor: row.amount.cents(),
        accepted: row.accepted,
        created_at: row.created_at,
    }
}

pub fn loan_detail_view(details: LoanDetails) -> LoanDetailView {
    LoanDetailView {
        loan: loan_view(details.loan),
        guarantors: details.guarantors.into_iter().map(guarantor_view).collect(),
    }
}

pub fn loan_audit_view(record: LoanAuditRecord) -> LoanAuditView {
    LoanAuditView {
        id: record.id,
        loan_id: record.loan_id,
        actor_id: record.actor_id,
        action: record.action,
        snapshot: loan_detail_view(record.snapshot),
        recorded_at: record.recorded_at,
    }
}

pub fn alert_view(alert: PaymentAlert) -> AlertView {
    AlertView {
        id: alert.id,
        provider: provider_to_api(alert.provider),
        external_id: alert.external_id,
        amount_minor: alert.amount.cents(),
        tenant_id: alert.tenant_id,
        created_at: alert.created_at,
    }
}

pub fn integration_view(integration: Integration) -> IntegrationView {
    IntegrationView {
        config: integration.redacted_config(),
        id: integration.id,
        provider: provider_to_api(integration.provider),
        name: integration.name,
        is_enabled: integration.is_enabled,
        created_at: integration.created_at,
        updated_at: integration.updated_at,
    }
}

pub fn asset_view(asset: Asset) -> AssetView {
    AssetView {
        id: asset.id,
        name: asset.name,
        description: asset.description,
        category: asset.category,
        purchase_date: asset.purchase_date,
        purchase_price_minor: asset.purchase_price.cents(),
        current_value_minor: asset.current_value.cents(),
        documents: asset.documents,
        created_at: asset.created_at,
    }
}

pub fn transaction_stats_view(s: TransactionStats) -> stats::TransactionStats {
    stats::TransactionStats {
        total_deposits_minor: s.total_deposits.cents(),
        total_withdrawals_minor: s.total_withdrawals.cents(),
        total_expenses_minor: s.total_expenses.cents(),
        total_fines_minor: s.total_fines.cents(),
        total_disbursed_minor: s.total_disbursed.cents(),
        total_repaid_minor: s.total_repaid.cents(),
        cash_at_hand_minor: s.cash_at_hand.cents(),
        recent_entries: s.recent_entries,
    }
}

pub fn loan_stats_view(s: LoanStats) -> stats::LoanStats {
    stats::LoanStats {
        active_loans: s.active_loans,
        overdue_loans: s.overdue_loans,
        pending_loans: s.pending_loans,
        principal_disbursed_minor: s.principal_disbursed.cents(),
        total_repaid_minor: s.total_repaid.cents(),
        outstanding_balance_minor: s.outstanding_balance.cents(),
    }
}

pub fn dashboard_view(s: DashboardStats) -> stats::Dashboard {
    stats::Dashboard {
        cash_at_hand_minor: s.cash_at_hand.cents(),
        active_loans: s.active_loans,
        overdue_loans: s.overdue_loans,
        total_members: s.total_members,
        total_assets_minor: s.total_assets.cents(),
    }
}
