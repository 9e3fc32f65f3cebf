use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};

use crate::{
    EngineError, Integration, IntegrationUpdate, NewIntegration, Provider, ResultEngine,
    TenantContext,
    integrations::{self, validate_config},
    util::{normalize_required_text, parse_id},
};

use super::{Engine, with_tx};

impl Engine {
    async fn require_integration(
        &self,
        db: &DatabaseTransaction,
        tenant_id: &str,
        integration_id: &str,
    ) -> ResultEngine<integrations::Model> {
        let integration_id = parse_id(integration_id, "integration")?;
        integrations::Entity::find_by_id(integration_id)
            .filter(integrations::Column::TenantId.eq(tenant_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("integration not exists".to_string()))
    }

    async fn ensure_integration_name_free(
        &self,
        db: &DatabaseTransaction,
        tenant_id: &str,
        name: &str,
        except_id: Option<&str>,
    ) -> ResultEngine<()> {
        let mut query = integrations::Entity::find()
            .filter(integrations::Column::TenantId.eq(tenant_id.to_string()))
            .filter(integrations::Column::Name.eq(name.to_string()));
        if let Some(id) = except_id {
            query = query.filter(integrations::Column::Id.ne(id.to_string()));
        }
        if query.one(db).await?.is_some() {
            return Err(EngineError::ExistingKey(format!(
                "integration {name} already exists"
            )));
        }
        Ok(())
    }

    /// Provider accounts of the caller's chama. Admin only.
    pub async fn list_integrations(&self, ctx: &TenantContext) -> ResultEngine<Vec<Integration>> {
        ctx.require_admin("manage integrations")?;
        with_tx!(self, |db_tx| {
            let models: Vec<integrations::Model> = integrations::Entity::find()
                .filter(integrations::Column::TenantId.eq(ctx.tenant_id.clone()))
                .order_by_asc(integrations::Column::CreatedAt)
                .order_by_asc(integrations::Column::Name)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(Integration::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Adds a provider account to the caller's chama. Admin only.
    ///
    /// Names are unique within a chama.
    pub async fn create_integration(
        &self,
        ctx: &TenantContext,
        input: NewIntegration,
    ) -> ResultEngine<Integration> {
        ctx.require_admin("manage integrations")?;
        let name = normalize_required_text(&input.name, "integration name")?;
        let config = validate_config(input.provider, input.config)?;

        with_tx!(self, |db_tx| {
            self.ensure_integration_name_free(&db_tx, &ctx.tenant_id, &name, None)
                .await?;
            let integration = Integration::new(
                &ctx.tenant_id,
                input.provider,
                name,
                config,
                input.is_enabled,
                Utc::now(),
            );
            integrations::ActiveModel::try_from(&integration)?
                .insert(&db_tx)
                .await?;
            tracing::info!(
                tenant_id = %ctx.tenant_id,
                integration_id = %integration.id,
                provider = integration.provider.as_str(),
                "integration created"
            );
            Ok(integration)
        })
    }

    /// Renames, reconfigures, enables or disables a provider account.
    /// Admin only; a new config is checked against the stored provider.
    pub async fn update_integration(
        &self,
        ctx: &TenantContext,
        integration_id: &str,
        update: IntegrationUpdate,
    ) -> ResultEngine<Integration> {
        ctx.require_admin("manage integrations")?;
        let name = update
            .name
            .as_deref()
            .map(|name| normalize_required_text(name, "integration name"))
            .transpose()?;

        with_tx!(self, |db_tx| {
            let model = self
                .require_integration(&db_tx, &ctx.tenant_id, integration_id)
                .await?;
            let provider = Provider::try_from(model.provider.as_str())?;
            let config = update
                .config
                .map(|config| validate_config(provider, config))
                .transpose()?;
            if let Some(name) = &name {
                self.ensure_integration_name_free(&db_tx, &ctx.tenant_id, name, Some(&model.id))
                    .await?;
            }

            let mut active: integrations::ActiveModel = model.into();
            if let Some(name) = name {
                active.name = ActiveValue::Set(name);
            }
            if let Some(config) = &config {
                active.set_config(config)?;
            }
            if let Some(is_enabled) = update.is_enabled {
                active.is_enabled = ActiveValue::Set(is_enabled);
            }
            active.updated_at = ActiveValue::Set(Utc::now());
            let model = active.update(&db_tx).await?;
            tracing::info!(
                tenant_id = %ctx.tenant_id,
                integration_id = %model.id,
                is_enabled = model.is_enabled,
                "integration updated"
            );
            Integration::try_from(model)
        })
    }
}
