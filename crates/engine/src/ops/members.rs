use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, Statement, TransactionTrait,
    prelude::*,
};

use crate::{
    EngineError, Member, MemberSummary, MemberUpdate, NewMember, ResultEngine, Role,
    TenantContext, guarantors, ledger, loans, members,
    phone::normalize_optional_phone,
    util::{
        new_id, normalize_email, normalize_optional_text, normalize_person_name,
        normalize_required_text,
    },
};

use super::{Engine, with_tx};

impl Engine {
    /// Validates and inserts a member. Email is globally unique.
    pub(super) async fn insert_member(
        &self,
        db: &DatabaseTransaction,
        tenant_id: Option<&str>,
        input: &NewMember,
        role: Role,
    ) -> ResultEngine<Member> {
        let email = normalize_email(&input.email)?;
        let name = normalize_person_name(&input.name)?;
        let phone = normalize_optional_phone(input.phone.as_deref())?;
        let credential_hash = normalize_required_text(&input.credential_hash, "credential")?;

        let taken = members::Entity::find()
            .filter(members::Column::Email.eq(email.clone()))
            .one(db)
            .await?
            .is_some();
        if taken {
            return Err(EngineError::ExistingKey(email));
        }

        let model = members::ActiveModel {
            id: ActiveValue::Set(new_id()),
            tenant_id: ActiveValue::Set(tenant_id.map(ToString::to_string)),
            email: ActiveValue::Set(email),
            credential_hash: ActiveValue::Set(credential_hash),
            name: ActiveValue::Set(name),
            phone: ActiveValue::Set(phone),
            role: ActiveValue::Set(role.as_str().to_string()),
            avatar_url: ActiveValue::Set(None),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(db)
        .await?;
        Member::try_from(model)
    }

    /// Adds a member to the caller's tenant.
    ///
    /// Authorization: admins and treasurers; only admins may create admins.
    pub async fn invite_member(
        &self,
        ctx: &TenantContext,
        input: NewMember,
    ) -> ResultEngine<Member> {
        ctx.require_privileged("invite members")?;
        if input.role == Role::Admin {
            ctx.require_admin("create admins")?;
        }
        with_tx!(self, |db_tx| {
            let member = self
                .insert_member(&db_tx, Some(&ctx.tenant_id), &input, input.role)
                .await?;
            tracing::info!(
                tenant_id = %ctx.tenant_id,
                member_id = %member.id,
                role = member.role.as_str(),
                "member invited"
            );
            Ok(member)
        })
    }

    /// Tenant roster with per-member activity counters, sorted by name.
    pub async fn list_members(&self, ctx: &TenantContext) -> ResultEngine<Vec<MemberSummary>> {
        with_tx!(self, |db_tx| {
            let models: Vec<members::Model> = members::Entity::find()
                .filter(members::Column::TenantId.eq(ctx.tenant_id.clone()))
                .order_by_asc(members::Column::Name)
                .order_by_asc(members::Column::Id)
                .all(&db_tx)
                .await?;

            let stmt = Statement::from_sql_and_values(
                db_tx.get_database_backend(),
                "SELECT m.id AS id, \
                        (SELECT COUNT(*) FROM ledger_entries e WHERE e.member_id = m.id) AS entries, \
                        (SELECT COUNT(*) FROM loans l WHERE l.borrower_id = m.id) AS loans \
                 FROM members m \
                 WHERE m.tenant_id = ?",
                vec![ctx.tenant_id.clone().into()],
            );
            let rows = db_tx.query_all(stmt).await?;
            let mut counts = HashMap::new();
            for row in rows {
                let id: String = row.try_get("", "id")?;
                let entries: i64 = row.try_get("", "entries")?;
                let loans: i64 = row.try_get("", "loans")?;
                counts.insert(id, (entries, loans));
            }

            let mut out = Vec::with_capacity(models.len());
            for model in models {
                let (entries, loans) = counts.get(&model.id).copied().unwrap_or((0, 0));
                out.push(MemberSummary {
                    member: Member::try_from(model)?,
                    ledger_entries: entries.unsigned_abs(),
                    loans: loans.unsigned_abs(),
                });
            }
            Ok(out)
        })
    }

    pub async fn member(&self, ctx: &TenantContext, member_id: &str) -> ResultEngine<Member> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_member_in_tenant(&db_tx, &ctx.tenant_id, member_id)
                .await?;
            Member::try_from(model)
        })
    }

    /// Updates name, phone or avatar. Members may edit themselves;
    /// admins and treasurers may edit anyone in the tenant.
    pub async fn update_member_profile(
        &self,
        ctx: &TenantContext,
        member_id: &str,
        update: MemberUpdate,
    ) -> ResultEngine<Member> {
        let name = update.name.as_deref().map(normalize_person_name).transpose()?;
        let phone = match update.phone.as_deref() {
            Some(raw) => Some(normalize_optional_phone(Some(raw))?),
            None => None,
        };
        let avatar_url = update
            .avatar_url
            .as_deref()
            .map(|raw| normalize_optional_text(Some(raw)));

        with_tx!(self, |db_tx| {
            let model = self
                .require_member_in_tenant(&db_tx, &ctx.tenant_id, member_id)
                .await?;
            ctx.require_self_or_privileged(&model.id, "edit profiles")?;

            let mut active: members::ActiveModel = model.into();
            if let Some(name) = name {
                active.name = ActiveValue::Set(name);
            }
            if let Some(phone) = phone {
                active.phone = ActiveValue::Set(phone);
            }
            if let Some(avatar_url) = avatar_url {
                active.avatar_url = ActiveValue::Set(avatar_url);
            }
            let model = active.update(&db_tx).await?;
            Member::try_from(model)
        })
    }

    /// Changes a member's role. The tenant always keeps at least one admin.
    pub async fn update_member_role(
        &self,
        ctx: &TenantContext,
        member_id: &str,
        role: Role,
    ) -> ResultEngine<Member> {
        ctx.require_admin("change roles")?;
        with_tx!(self, |db_tx| {
            let model = self
                .require_member_in_tenant(&db_tx, &ctx.tenant_id, member_id)
                .await?;
            let current = Role::try_from(model.role.as_str())?;
            if current == role {
                return Member::try_from(model);
            }
            if current == Role::Admin {
                let admins = members::Entity::find()
                    .filter(members::Column::TenantId.eq(ctx.tenant_id.clone()))
                    .filter(members::Column::Role.eq(Role::Admin.as_str()))
                    .count(&db_tx)
                    .await?;
                if admins <= 1 {
                    return Err(EngineError::InvalidTransition(
                        "a chama must keep at least one admin".to_string(),
                    ));
                }
            }

            let mut active: members::ActiveModel = model.into();
            active.role = ActiveValue::Set(role.as_str().to_string());
            let model = active.update(&db_tx).await?;
            tracing::info!(
                tenant_id = %ctx.tenant_id,
                member_id = %model.id,
                from = current.as_str(),
                to = role.as_str(),
                "member role changed"
            );
            Member::try_from(model)
        })
    }

    /// Removes a member that has no financial history.
    pub async fn remove_member(&self, ctx: &TenantContext, member_id: &str) -> ResultEngine<()> {
        ctx.require_admin("remove members")?;
        with_tx!(self, |db_tx| {
            let model = self
                .require_member_in_tenant(&db_tx, &ctx.tenant_id, member_id)
                .await?;
            if model.id == ctx.member_id {
                return Err(EngineError::InvalidTransition(
                    "admins cannot remove themselves".to_string(),
                ));
            }

            let entries = ledger::Entity::find()
                .filter(ledger::Column::MemberId.eq(model.id.clone()))
                .count(&db_tx)
                .await?;
            let borrowed = loans::Entity::find()
                .filter(loans::Column::BorrowerId.eq(model.id.clone()))
                .count(&db_tx)
                .await?;
            let guaranteed = guarantors::Entity::find()
                .filter(guarantors::Column::GuarantorId.eq(model.id.clone()))
                .count(&db_tx)
                .await?;
            if entries + borrowed + guaranteed > 0 {
                return Err(EngineError::InvalidTransition(
                    "member has ledger or loan history".to_string(),
                ));
            }

            members::Entity::delete_by_id(model.id.clone())
                .exec(&db_tx)
                .await?;
            tracing::info!(tenant_id = %ctx.tenant_id, member_id = %model.id, "member removed");
            Ok(())
        })
    }
}
