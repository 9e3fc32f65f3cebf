//! Members ("users") of a tenant.
//!
//! `tenant_id` is only `None` between sign-up and tenant registration; such a
//! member cannot resolve a [`TenantContext`](crate::TenantContext).

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Role};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub tenant_id: Option<String>,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Roster row with activity counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub member: Member,
    pub ledger_entries: u64,
    pub loans: u64,
}

/// Input for creating a member. The credential hash is produced by the
/// credential provider; the engine stores it opaquely.
#[derive(Clone, Debug)]
pub struct NewMember {
    pub email: String,
    pub credential_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
}

/// Profile fields a member (or a privileged caller) may change.
#[derive(Clone, Debug, Default)]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tenant_id: Option<String>,
    #[sea_orm(unique)]
    pub email: String,
    pub credential_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenants::Entity",
        from = "Column::TenantId",
        to = "super::tenants::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Tenant,
    #[sea_orm(has_many = "super::ledger::Entity")]
    LedgerEntries,
    #[sea_orm(has_many = "super::loans::Entity")]
    Loans,
}

impl Related<super::tenants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

impl Related<super::loans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loans.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Member {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            role: Role::try_from(model.role.as_str())?,
            id: model.id,
            tenant_id: model.tenant_id,
            email: model.email,
            name: model.name,
            phone: model.phone,
            avatar_url: model.avatar_url,
            created_at: model.created_at,
        })
    }
}
