use chrono::Utc;
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};

use crate::{
    EngineError, Member, NewMember, NewTenant, ResultEngine, Role, Tenant, TenantContext,
    TenantUpdate, members,
    phone::normalize_optional_phone,
    tenants,
    util::{new_id, normalize_email, normalize_optional_text, normalize_required_text, parse_id},
};

use super::{Engine, with_tx};

impl Engine {
    /// Creates a member that does not belong to any chama yet.
    ///
    /// The member cannot resolve a context until
    /// [`register_tenant`](Self::register_tenant) attaches it.
    pub async fn sign_up(&self, input: NewMember) -> ResultEngine<Member> {
        with_tx!(self, |db_tx| {
            let member = self
                .insert_member(&db_tx, None, &input, Role::Member)
                .await?;
            tracing::info!(member_id = %member.id, "member signed up");
            Ok(member)
        })
    }

    /// Registers a chama and makes `member_id` its first admin.
    pub async fn register_tenant(&self, member_id: &str, input: NewTenant) -> ResultEngine<Tenant> {
        let member_id = parse_id(member_id, "member")?;
        let name = normalize_required_text(&input.name, "chama name")?;
        let contact_email = input
            .contact_email
            .as_deref()
            .map(normalize_email)
            .transpose()?;
        let contact_phone = normalize_optional_phone(input.contact_phone.as_deref())?;
        let logo_url = normalize_optional_text(input.logo_url.as_deref());

        with_tx!(self, |db_tx| {
            let member = members::Entity::find_by_id(member_id.clone())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))?;
            if member.tenant_id.is_some() {
                return Err(EngineError::InvalidTransition(
                    "member already belongs to a chama".to_string(),
                ));
            }

            let tenant = tenants::ActiveModel {
                id: ActiveValue::Set(new_id()),
                name: ActiveValue::Set(name),
                contact_email: ActiveValue::Set(contact_email),
                contact_phone: ActiveValue::Set(contact_phone),
                logo_url: ActiveValue::Set(logo_url),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;

            let mut active: members::ActiveModel = member.into();
            active.tenant_id = ActiveValue::Set(Some(tenant.id.clone()));
            active.role = ActiveValue::Set(Role::Admin.as_str().to_string());
            active.update(&db_tx).await?;

            tracing::info!(tenant_id = %tenant.id, admin_id = %member_id, "chama registered");
            Ok(Tenant::from(tenant))
        })
    }

    pub async fn tenant(&self, ctx: &TenantContext) -> ResultEngine<Tenant> {
        with_tx!(self, |db_tx| {
            let model = tenants::Entity::find_by_id(ctx.tenant_id.clone())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("chama not exists".to_string()))?;
            Ok(Tenant::from(model))
        })
    }

    /// Updates chama name, contact details or logo. Admin only.
    pub async fn update_tenant(
        &self,
        ctx: &TenantContext,
        update: TenantUpdate,
    ) -> ResultEngine<Tenant> {
        ctx.require_admin("edit chama settings")?;
        let name = update
            .name
            .as_deref()
            .map(|name| normalize_required_text(name, "chama name"))
            .transpose()?;
        let contact_email = update
            .contact_email
            .as_deref()
            .map(normalize_email)
            .transpose()?;
        let contact_phone = match update.contact_phone.as_deref() {
            Some(raw) => Some(normalize_optional_phone(Some(raw))?),
            None => None,
        };
        let logo_url = update
            .logo_url
            .as_deref()
            .map(|raw| normalize_optional_text(Some(raw)));

        with_tx!(self, |db_tx| {
            let model = tenants::Entity::find_by_id(ctx.tenant_id.clone())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("chama not exists".to_string()))?;
            let mut active: tenants::ActiveModel = model.into();
            if let Some(name) = name {
                active.name = ActiveValue::Set(name);
            }
            if let Some(email) = contact_email {
                active.contact_email = ActiveValue::Set(Some(email));
            }
            if let Some(phone) = contact_phone {
                active.contact_phone = ActiveValue::Set(phone);
            }
            if let Some(logo_url) = logo_url {
                active.logo_url = ActiveValue::Set(logo_url);
            }
            let model = active.update(&db_tx).await?;
            Ok(Tenant::from(model))
        })
    }
}
