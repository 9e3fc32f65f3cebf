//! ChamaSmart core: tenancy, ledger, loan lifecycle, payment alert
//! reconciliation and reporting for Kenyan investment groups.
//!
//! Everything goes through [`Engine`]. Tenant-scoped operations take a
//! [`TenantContext`] obtained from [`Engine::resolve_context`]; every
//! mutation runs inside a single database transaction.

pub use alerts::{
    AlertStatus, CallbackItem, CallbackMetadata, MpesaBody, MpesaCallback, NewAlert,
    PaymentAlert, PaymentPayload, PaystackCharge, PaystackCustomer, PaystackEnvelope,
    PaystackEvent, Provider, StkCallback,
};
pub use assets::{Asset, NewAsset};
pub use context::{Role, TenantContext};
pub use error::EngineError;
pub use guarantors::Guarantor;
pub use integrations::{
    Integration, IntegrationConfig, IntegrationUpdate, NewIntegration, SECRET_SETTINGS,
    required_settings,
};
pub use ledger::{EntryKind, LedgerEntry, NewEntry};
pub use loan_audit::LoanAuditRecord;
pub use loans::{
    GuarantorInput, Loan, LoanDetails, LoanFilter, LoanStatus, LoanTermsUpdate, NewLoan,
    UpdatedLoan,
};
pub use members::{Member, MemberSummary, MemberUpdate, NewMember};
pub use money::{InterestRate, Money};
pub use ops::{
    AlertOutcome, DashboardStats, Engine, EngineBuilder, EntryFilter, LoanStats, TransactionStats,
};
pub use phone::normalize_kenyan_phone;
pub use tenants::{NewTenant, Tenant, TenantUpdate};

mod alerts;
mod assets;
mod context;
mod error;
mod guarantors;
mod integrations;
mod ledger;
mod loan_audit;
mod loans;
mod members;
mod money;
mod ops;
mod phone;
mod tenants;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
