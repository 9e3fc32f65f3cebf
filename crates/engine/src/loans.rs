//! Loans and their status machine.
//!
//! ```text
//! PENDING ──► APPROVED ──► ACTIVE ──► PAID
//!    │  └─────────────────────▲ │
//!    ▼                          ▼
//! REJECTED                  DEFAULTED
//! ```
//!
//! `PAID` is only reached through repayment or balance adjustment, never via
//! [`Engine::update_status`](crate::Engine::update_status).

use chrono::{DateTime, Months, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, InterestRate, Money, ResultEngine, guarantors::Guarantor, util::new_id};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Pending,
    Approved,
    Active,
    Paid,
    Rejected,
    Defaulted,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 6] = [
        Self::Pending,
        Self::Approved,
        Self::Active,
        Self::Paid,
        Self::Rejected,
        Self::Defaulted,
    ];

    /// Statuses whose guarantor commitments still lock savings.
    pub const OPEN: [LoanStatus; 4] = [
        Self::Pending,
        Self::Approved,
        Self::Active,
        Self::Defaulted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Active => "active",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
            Self::Defaulted => "defaulted",
        }
    }

    /// Whether an operator may move a loan from `self` to `next`.
    pub fn can_transition_to(self, next: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, next),
            (Pending, Approved | Active | Rejected)
                | (Approved, Active)
                | (Active, Defaulted)
                | (Defaulted, Active)
        )
    }

    /// Entering one of these releases the principal to the borrower.
    pub fn disburses(self) -> bool {
        matches!(self, Self::Approved | Self::Active)
    }

    pub fn is_open(self) -> bool {
        Self::OPEN.contains(&self)
    }
}

impl TryFrom<&str> for LoanStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| EngineError::InvalidInput(format!("invalid loan status: {value}")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub borrower_id: String,
    pub principal: Money,
    pub interest_rate: InterestRate,
    pub duration_months: u32,
    pub total_repayable: Money,
    /// Outstanding amount; negative means overpaid.
    pub balance: Money,
    pub status: LoanStatus,
    pub due_date: DateTime<Utc>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    pub(crate) fn new(
        borrower_id: &str,
        principal: Money,
        interest_rate: InterestRate,
        duration_months: u32,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !principal.is_positive() {
            return Err(EngineError::InvalidAmount(
                "loan amount must be > 0".to_string(),
            ));
        }
        let total_repayable = principal.with_interest(interest_rate)?;
        Ok(Self {
            id: new_id(),
            borrower_id: borrower_id.to_string(),
            principal,
            interest_rate,
            duration_months,
            total_repayable,
            balance: total_repayable,
            status: LoanStatus::Pending,
            due_date: due_date(created_at, duration_months)?,
            disbursed_at: None,
            created_at,
        })
    }

    /// Total implied by the current terms. Differs from `total_repayable`
    /// after a term edit, which never recomputes stored amounts.
    pub fn implied_total(&self) -> ResultEngine<Money> {
        self.principal.with_interest(self.interest_rate)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, LoanStatus::Active | LoanStatus::Defaulted)
            && self.due_date < now
            && self.balance.is_positive()
    }
}

pub(crate) fn due_date(from: DateTime<Utc>, duration_months: u32) -> ResultEngine<DateTime<Utc>> {
    if duration_months == 0 {
        return Err(EngineError::InvalidInput(
            "duration must be at least 1 month".to_string(),
        ));
    }
    from.checked_add_months(Months::new(duration_months))
        .ok_or_else(|| EngineError::InvalidInput("duration too long".to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuarantorInput {
    pub guarantor_id: String,
    pub amount: Money,
}

/// Input for [`Engine::create_loan`](crate::Engine::create_loan).
#[derive(Clone, Debug)]
pub struct NewLoan {
    pub borrower_id: String,
    pub principal: Money,
    pub interest_rate: InterestRate,
    pub duration_months: u32,
    pub guarantors: Vec<GuarantorInput>,
}

/// Loan with its guarantor rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDetails {
    pub loan: Loan,
    pub guarantors: Vec<Guarantor>,
}

/// Static term edits. Stored totals are left untouched.
#[derive(Clone, Debug, Default)]
pub struct LoanTermsUpdate {
    pub principal: Option<Money>,
    pub interest_rate: Option<InterestRate>,
    pub duration_months: Option<u32>,
}

/// Result of a term edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedLoan {
    pub loan: Loan,
    /// True when the terms now imply a total different from the stored
    /// `total_repayable`. Operators must reconcile with an adjustment.
    pub terms_diverged: bool,
}

#[derive(Clone, Debug, Default)]
pub struct LoanFilter {
    pub status: Option<LoanStatus>,
    pub borrower_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub borrower_id: String,
    pub principal_minor: i64,
    pub interest_bps: i64,
    pub duration_months: i32,
    pub total_repayable_minor: i64,
    pub balance_minor: i64,
    pub status: String,
    pub due_date: DateTimeUtc,
    pub disbursed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::members::Entity",
        from = "Column::BorrowerId",
        to = "super::members::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Borrower,
    #[sea_orm(has_many = "super::guarantors::Entity")]
    Guarantors,
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Borrower.def()
    }
}

impl Related<super::guarantors::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Guarantors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&Loan> for ActiveModel {
    type Error = EngineError;

    fn try_from(loan: &Loan) -> Result<Self, Self::Error> {
        let duration_months = i32::try_from(loan.duration_months)
            .map_err(|_| EngineError::InvalidInput("duration too long".to_string()))?;
        Ok(Self {
            id: ActiveValue::Set(loan.id.clone()),
            borrower_id: ActiveValue::Set(loan.borrower_id.clone()),
            principal_minor: ActiveValue::Set(loan.principal.cents()),
            interest_bps: ActiveValue::Set(loan.interest_rate.basis_points()),
            duration_months: ActiveValue::Set(duration_months),
            total_repayable_minor: ActiveValue::Set(loan.total_repayable.cents()),
            balance_minor: ActiveValue::Set(loan.balance.cents()),
            status: ActiveValue::Set(loan.status.as_str().to_string()),
            due_date: ActiveValue::Set(loan.due_date),
            disbursed_at: ActiveValue::Set(loan.disbursed_at),
            created_at: ActiveValue::Set(loan.created_at),
        })
    }
}

impl TryFrom<Model> for Loan {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            status: LoanStatus::try_from(model.status.as_str())?,
            interest_rate: InterestRate::from_basis_points(model.interest_bps)?,
            duration_months: u32::try_from(model.duration_months)
                .map_err(|_| EngineError::InvalidInput("invalid loan duration".to_string()))?,
            id: model.id,
            borrower_id: model.borrower_id,
            principal: Money::new(model.principal_minor),
            total_repayable: Money::new(model.total_repayable_minor),
            balance: Money::new(model.balance_minor),
            due_date: model.due_date,
            disbursed_at: model.disbursed_at,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn operator_transitions_follow_the_state_machine() {
        use LoanStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Active));
        assert!(Active.can_transition_to(Defaulted));
        assert!(Defaulted.can_transition_to(Active));

        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Active.can_transition_to(Paid));
        assert!(!Rejected.can_transition_to(Active));
        assert!(!Paid.can_transition_to(Active));
        assert!(!Defaulted.can_transition_to(Rejected));
    }

    #[test]
    fn new_loan_starts_pending_with_full_balance() {
        let now = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap();
        let loan = Loan::new(
            "borrower",
            Money::from_major(50_000),
            InterestRate::from_percent(10).unwrap(),
            6,
            now,
        )
        .unwrap();
        assert_eq!(loan.status, LoanStatus::Pending);
        assert_eq!(loan.total_repayable, Money::from_major(55_000));
        assert_eq!(loan.balance, loan.total_repayable);
        assert_eq!(
            loan.due_date,
            Utc.with_ymd_and_hms(2025, 7, 31, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn month_end_due_dates_are_clamped() {
        let now = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(
            due_date(now, 1).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn invalid_terms_are_rejected() {
        let now = Utc::now();
        let rate = InterestRate::ZERO;
        assert!(matches!(
            Loan::new("b", Money::ZERO, rate, 6, now),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(
            Loan::new("b", Money::from_major(10), rate, 0, now),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn overdue_requires_an_open_positive_balance() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut loan = Loan::new(
            "b",
            Money::from_major(100),
            InterestRate::ZERO,
            1,
            created,
        )
        .unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(!loan.is_overdue(later));
        loan.status = LoanStatus::Active;
        assert!(loan.is_overdue(later));
        loan.balance = Money::ZERO;
        assert!(!loan.is_overdue(later));
    }
}
