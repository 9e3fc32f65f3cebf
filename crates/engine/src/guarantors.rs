//! Guarantor commitments on a loan.
//!
//! Rows are created together with their loan and afterwards only the
//! `accepted` flag changes.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{Money, util::new_id};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guarantor {
    pub id: String,
    pub loan_id: String,
    pub guarantor_id: String,
    pub amount: Money,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
}

impl Guarantor {
    pub(crate) fn new(
        loan_id: &str,
        guarantor_id: &str,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            loan_id: loan_id.to_string(),
            guarantor_id: guarantor_id.to_string(),
            amount,
            accepted: false,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "loan_guarantors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub loan_id: String,
    pub guarantor_id: String,
    pub amount_minor: i64,
    pub accepted: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::loans::Entity",
        from = "Column::LoanId",
        to = "super::loans::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Loan,
    #[sea_orm(
        belongs_to = "super::members::Entity",
        from = "Column::GuarantorId",
        to = "super::members::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Guarantor,
}

impl Related<super::loans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Guarantor> for ActiveModel {
    fn from(row: &Guarantor) -> Self {
        Self {
            id: ActiveValue::Set(row.id.clone()),
            loan_id: ActiveValue::Set(row.loan_id.clone()),
            guarantor_id: ActiveValue::Set(row.guarantor_id.clone()),
            amount_minor: ActiveValue::Set(row.amount.cents()),
            accepted: ActiveValue::Set(row.accepted),
            created_at: ActiveValue::Set(row.created_at),
        }
    }
}

impl From<Model> for Guarantor {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            loan_id: model.loan_id,
            guarantor_id: model.guarantor_id,
            amount: Money::new(model.amount_minor),
            accepted: model.accepted,
            created_at: model.created_at,
        }
    }
}
