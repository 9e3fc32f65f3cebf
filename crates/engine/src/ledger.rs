//! Ledger entries ("transactions").
//!
//! The ledger is append-only: entries are never updated or deleted.
//! Amounts are stored positive; the direction is implied by [`EntryKind`].
//! A ledger row has no tenant column, its tenant is always derived through
//! the owning member.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, Money, ResultEngine, util::new_id};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    Expense,
    Fine,
    LoanDisbursement,
    LoanRepayment,
    /// Manual correction of a loan balance. Not a cash movement.
    Adjustment,
}

impl EntryKind {
    pub const ALL: [EntryKind; 7] = [
        Self::Deposit,
        Self::Withdrawal,
        Self::Expense,
        Self::Fine,
        Self::LoanDisbursement,
        Self::LoanRepayment,
        Self::Adjustment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Expense => "expense",
            Self::Fine => "fine",
            Self::LoanDisbursement => "loan_disbursement",
            Self::LoanRepayment => "loan_repayment",
            Self::Adjustment => "adjustment",
        }
    }

    /// Kinds callers may record directly. Loan kinds and adjustments are
    /// only written by the loan engine.
    pub fn is_manual(self) -> bool {
        matches!(
            self,
            Self::Deposit | Self::Withdrawal | Self::Expense | Self::Fine
        )
    }

    /// Sign of the entry's effect on the tenant's cash at hand.
    pub fn cash_sign(self) -> i64 {
        match self {
            Self::Deposit | Self::LoanRepayment | Self::Fine => 1,
            Self::Withdrawal | Self::LoanDisbursement | Self::Expense => -1,
            Self::Adjustment => 0,
        }
    }
}

impl TryFrom<&str> for EntryKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| EngineError::InvalidInput(format!("invalid entry kind: {value}")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub member_id: String,
    pub kind: EntryKind,
    pub amount: Money,
    /// Signed balance delta, only set on [`EntryKind::Adjustment`].
    pub delta: Option<Money>,
    pub description: Option<String>,
    pub reference_code: Option<String>,
    pub loan_id: Option<String>,
    pub recorded_by: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub(crate) fn new(
        member_id: &str,
        kind: EntryKind,
        amount: Money,
        description: Option<String>,
        reference_code: Option<String>,
        recorded_by: Option<&str>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount("amount must be > 0".to_string()));
        }
        Ok(Self {
            id: new_id(),
            member_id: member_id.to_string(),
            kind,
            amount,
            delta: None,
            description,
            reference_code,
            loan_id: None,
            recorded_by: recorded_by.map(ToString::to_string),
            occurred_at: Utc::now(),
        })
    }

    pub(crate) fn for_loan(mut self, loan_id: &str) -> Self {
        self.loan_id = Some(loan_id.to_string());
        self
    }
}

/// Input for [`Engine::record_entry`](crate::Engine::record_entry).
#[derive(Clone, Debug)]
pub struct NewEntry {
    pub member_id: String,
    pub kind: EntryKind,
    pub amount: Money,
    pub description: Option<String>,
    pub reference_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub member_id: String,
    pub kind: String,
    pub amount_minor: i64,
    pub delta_minor: Option<i64>,
    pub description: Option<String>,
    pub reference_code: Option<String>,
    pub loan_id: Option<String>,
    pub recorded_by: Option<String>,
    pub occurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::members::Entity",
        from = "Column::MemberId",
        to = "super::members::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Member,
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&LedgerEntry> for ActiveModel {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.clone()),
            member_id: ActiveValue::Set(entry.member_id.clone()),
            kind: ActiveValue::Set(entry.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(entry.amount.cents()),
            delta_minor: ActiveValue::Set(entry.delta.map(Money::cents)),
            description: ActiveValue::Set(entry.description.clone()),
            reference_code: ActiveValue::Set(entry.reference_code.clone()),
            loan_id: ActiveValue::Set(entry.loan_id.clone()),
            recorded_by: ActiveValue::Set(entry.recorded_by.clone()),
            occurred_at: ActiveValue::Set(entry.occurred_at),
        }
    }
}

impl TryFrom<Model> for LedgerEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: EntryKind::try_from(model.kind.as_str())?,
            id: model.id,
            member_id: model.member_id,
            amount: Money::new(model.amount_minor),
            delta: model.delta_minor.map(Money::new),
            description: model.description,
            reference_code: model.reference_code,
            loan_id: model.loan_id,
            recorded_by: model.recorded_by,
            occurred_at: model.occurred_at,
        })
    }
}
