use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Envelope returned by every authenticated action.
///
/// `data` is present on success, `error` on failure; the other one is
/// omitted from the JSON.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

pub mod member {
    use super::*;

    /// Role of a member inside their chama.
    ///
    /// - `admin`: full control, including roles and chama settings.
    /// - `treasurer`: money and loan operations, invites plain members.
    /// - `member`: own records only.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Role {
        Admin,
        Treasurer,
        Member,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberInvite {
        pub email: String,
        /// Opaque credential produced by the session provider.
        pub credential_hash: String,
        pub name: String,
        pub phone: Option<String>,
        pub role: Role,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub id: String,
        pub email: String,
        pub name: String,
        /// E.164 (`+254…`).
        pub phone: Option<String>,
        pub role: Role,
        pub avatar_url: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberSummaryView {
        pub member: MemberView,
        pub ledger_entries: u64,
        pub loans: u64,
    }

    /// `None` keeps the current value; an empty `phone`/`avatar_url` clears it.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberProfileUpdate {
        pub name: Option<String>,
        pub phone: Option<String>,
        pub avatar_url: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberRoleUpdate {
        pub role: Role,
    }
}

pub mod tenant {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TenantView {
        pub id: String,
        pub name: String,
        pub contact_email: Option<String>,
        pub contact_phone: Option<String>,
        pub logo_url: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TenantUpdate {
        pub name: Option<String>,
        pub contact_email: Option<String>,
        pub contact_phone: Option<String>,
        pub logo_url: Option<String>,
    }
}

pub mod ledger {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum EntryKind {
        Deposit,
        Withdrawal,
        Expense,
        Fine,
        LoanDisbursement,
        LoanRepayment,
        Adjustment,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryNew {
        pub member_id: String,
        /// One of `DEPOSIT`, `WITHDRAWAL`, `EXPENSE`, `FINE`.
        pub kind: EntryKind,
        pub amount_minor: i64,
        pub description: Option<String>,
        pub reference_code: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct EntryList {
        pub member_id: Option<String>,
        pub kinds: Option<Vec<EntryKind>>,
        /// Inclusive lower bound.
        pub from: Option<DateTime<Utc>>,
        /// Exclusive upper bound.
        pub to: Option<DateTime<Utc>>,
        pub limit: Option<u64>,
        /// Opaque pagination cursor (base64), from `next_cursor`.
        ///
        /// Newest → older pagination.
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryView {
        pub id: String,
        pub member_id: String,
        pub kind: EntryKind,
        /// Always positive; the kind gives the direction.
        pub amount_minor: i64,
        /// Signed balance change, `ADJUSTMENT` only.
        pub delta_minor: Option<i64>,
        pub description: Option<String>,
        pub reference_code: Option<String>,
        pub loan_id: Option<String>,
        pub recorded_by: Option<String>,
        pub occurred_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryListResponse {
        pub entries: Vec<EntryView>,
        /// Opaque cursor for fetching the next page (older items).
        pub next_cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SavingsView {
        pub member_id: String,
        pub savings_minor: i64,
    }
}

pub mod loan {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum LoanStatus {
        Pending,
        Approved,
        Active,
        Paid,
        Rejected,
        Defaulted,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GuarantorNew {
        pub guarantor_id: String,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanNew {
        pub borrower_id: String,
        pub principal_minor: i64,
        /// Flat rate in basis points (`1000` = 10%).
        pub interest_bps: i64,
        pub duration_months: u32,
        #[serde(default)]
        pub guarantors: Vec<GuarantorNew>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct LoanList {
        pub status: Option<LoanStatus>,
        pub borrower_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanView {
        pub id: String,
        pub borrower_id: String,
        pub principal_minor: i64,
        pub interest_bps: i64,
        pub duration_months: u32,
        pub total_repayable_minor: i64,
        /// Negative when overpaid.
        pub balance_minor: i64,
        pub status: LoanStatus,
        pub due_date: DateTime<Utc>,
        pub disbursed_at: Option<DateTime<Utc>>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GuarantorView {
        pub id: String,
        pub loan_id: String,
        pub guarantor_id: String,
        pub amount_minor: i64,
        pub accepted: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanDetailView {
        pub loan: LoanView,
        pub guarantors: Vec<GuarantorView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GuaranteeView {
        pub guarantee: GuarantorView,
        pub loan: LoanView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanStatusUpdate {
        pub status: LoanStatus,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RepaymentNew {
        pub amount_minor: i64,
        pub reference_code: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceAdjustment {
        pub new_balance_minor: i64,
        /// Required reason, stored on the `ADJUSTMENT` entry.
        pub note: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct LoanTermsUpdate {
        pub principal_minor: Option<i64>,
        pub interest_bps: Option<i64>,
        pub duration_months: Option<u32>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanTermsUpdated {
        pub loan: LoanView,
        /// The terms now imply a different total than the stored one.
        pub terms_diverged: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DefaultSweep {
        /// Evaluation instant; defaults to now.
        pub now: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DefaultSweepResult {
        pub defaulted: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanAuditView {
        pub id: String,
        pub loan_id: String,
        pub actor_id: String,
        pub action: String,
        pub snapshot: LoanDetailView,
        pub recorded_at: DateTime<Utc>,
    }
}

pub mod alert {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum Provider {
        Mpesa,
        Paystack,
        Bank,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AlertView {
        pub id: String,
        pub provider: Provider,
        pub external_id: String,
        pub amount_minor: i64,
        pub tenant_id: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AlertAssign {
        pub member_id: String,
    }

    /// Acknowledgement body expected by the M-Pesa callback API.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MpesaAck {
        #[serde(rename = "ResultCode")]
        pub result_code: i64,
        #[serde(rename = "ResultDesc")]
        pub result_desc: String,
    }

    impl MpesaAck {
        pub fn success() -> Self {
            Self {
                result_code: 0,
                result_desc: "Success".to_string(),
            }
        }
    }
}

pub mod integration {
    use super::*;
    use crate::alert::Provider;
    use serde_json::{Map, Value};

    fn enabled_by_default() -> bool {
        true
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct IntegrationNew {
        pub provider: Provider,
        pub name: String,
        #[serde(default)]
        pub config: Value,
        #[serde(default = "enabled_by_default")]
        pub is_enabled: bool,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct IntegrationUpdate {
        pub name: Option<String>,
        pub config: Option<Value>,
        pub is_enabled: Option<bool>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct IntegrationView {
        pub id: String,
        pub provider: Provider,
        pub name: String,
        /// Credential settings are masked.
        pub config: Map<String, Value>,
        pub is_enabled: bool,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }
}

pub mod asset {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AssetNew {
        pub name: String,
        pub description: Option<String>,
        pub category: String,
        pub purchase_date: NaiveDate,
        pub purchase_price_minor: i64,
        pub current_value_minor: i64,
        #[serde(default)]
        pub documents: Vec<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AssetView {
        pub id: String,
        pub name: String,
        pub description: Option<String>,
        pub category: String,
        pub purchase_date: NaiveDate,
        pub purchase_price_minor: i64,
        pub current_value_minor: i64,
        pub documents: Vec<String>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AssetValueUpdate {
        pub current_value_minor: i64,
    }
}

pub mod stats {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionStats {
        pub total_deposits_minor: i64,
        pub total_withdrawals_minor: i64,
        pub total_expenses_minor: i64,
        pub total_fines_minor: i64,
        pub total_disbursed_minor: i64,
        pub total_repaid_minor: i64,
        pub cash_at_hand_minor: i64,
        pub recent_entries: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanStats {
        pub active_loans: u64,
        pub overdue_loans: u64,
        pub pending_loans: u64,
        pub principal_disbursed_minor: i64,
        pub total_repaid_minor: i64,
        pub outstanding_balance_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Dashboard {
        pub cash_at_hand_minor: i64,
        pub active_loans: u64,
        pub overdue_loans: u64,
        pub total_members: u64,
        pub total_assets_minor: i64,
    }
}
