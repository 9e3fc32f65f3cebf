use sea_orm::{DatabaseTransaction, QueryFilter, QuerySelect, TransactionTrait, prelude::*};

use crate::{EngineError, ResultEngine, Role, TenantContext, loans, members, util::parse_id};

use super::{Engine, with_tx};

impl Engine {
    /// Resolve the authenticated member to its `{tenant, member, role}`.
    ///
    /// Unknown members and members without a tenant are `Unauthorized`.
    pub async fn resolve_context(&self, member_id: &str) -> ResultEngine<TenantContext> {
        let unauthorized = || EngineError::Unauthorized("no tenant context".to_string());
        let member_id = parse_id(member_id, "member").map_err(|_| unauthorized())?;
        with_tx!(self, |db_tx| {
            let model = members::Entity::find_by_id(member_id.clone())
                .one(&db_tx)
                .await?
                .ok_or_else(unauthorized)?;
            let tenant_id = model.tenant_id.ok_or_else(unauthorized)?;
            Ok(TenantContext {
                tenant_id,
                member_id: model.id,
                role: Role::try_from(model.role.as_str())?,
            })
        })
    }

    /// Member `member_id` in `tenant_id`. Members of other tenants are
    /// reported as missing.
    pub(super) async fn require_member_in_tenant(
        &self,
        db: &DatabaseTransaction,
        tenant_id: &str,
        member_id: &str,
    ) -> ResultEngine<members::Model> {
        let member_id = parse_id(member_id, "member")?;
        members::Entity::find_by_id(member_id)
            .filter(members::Column::TenantId.eq(tenant_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))
    }

    /// Loan `loan_id` whose borrower belongs to `tenant_id`.
    pub(super) async fn require_loan_in_tenant(
        &self,
        db: &DatabaseTransaction,
        tenant_id: &str,
        loan_id: &str,
    ) -> ResultEngine<loans::Model> {
        let loan_id = parse_id(loan_id, "loan")?;
        loans::Entity::find_by_id(loan_id)
            .inner_join(members::Entity)
            .filter(members::Column::TenantId.eq(tenant_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("loan not exists".to_string()))
    }
}
