//! Append-only record of deleted loans.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, LoanDetails};

/// What a deleted loan looked like, and who deleted it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanAuditRecord {
    pub id: String,
    pub loan_id: String,
    pub tenant_id: String,
    pub actor_id: String,
    pub action: String,
    pub snapshot: LoanDetails,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "loan_audit")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub loan_id: String,
    pub tenant_id: String,
    pub actor_id: String,
    pub action: String,
    #[sea_orm(column_type = "Text")]
    pub snapshot: String,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for LoanAuditRecord {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let snapshot = serde_json::from_str(&model.snapshot).map_err(|_| {
            EngineError::InvalidInput("invalid loan audit snapshot".to_string())
        })?;
        Ok(Self {
            id: model.id,
            loan_id: model.loan_id,
            tenant_id: model.tenant_id,
            actor_id: model.actor_id,
            action: model.action,
            snapshot,
            recorded_at: model.recorded_at,
        })
    }
}
