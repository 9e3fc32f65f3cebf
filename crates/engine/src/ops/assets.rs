use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};

use crate::{
    Asset, EngineError, Money, NewAsset, ResultEngine, TenantContext, assets,
    util::{normalize_optional_text, normalize_required_text, parse_id},
};

use super::{Engine, with_tx};

fn ensure_current_value(value: Money) -> ResultEngine<()> {
    if value.is_negative() {
        return Err(EngineError::InvalidAmount(
            "current value must be >= 0".to_string(),
        ));
    }
    Ok(())
}

impl Engine {
    async fn require_asset(
        &self,
        db: &DatabaseTransaction,
        tenant_id: &str,
        asset_id: &str,
    ) -> ResultEngine<assets::Model> {
        let asset_id = parse_id(asset_id, "asset")?;
        assets::Entity::find_by_id(asset_id)
            .filter(assets::Column::TenantId.eq(tenant_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("asset not exists".to_string()))
    }

    /// Records an investment of the caller's chama. Admin/treasurer only.
    pub async fn create_asset(&self, ctx: &TenantContext, input: NewAsset) -> ResultEngine<Asset> {
        ctx.require_privileged("manage assets")?;
        if !input.purchase_price.is_positive() {
            return Err(EngineError::InvalidAmount(
                "purchase price must be > 0".to_string(),
            ));
        }
        ensure_current_value(input.current_value)?;
        let input = NewAsset {
            name: normalize_required_text(&input.name, "asset name")?,
            category: normalize_required_text(&input.category, "asset category")?,
            description: normalize_optional_text(input.description.as_deref()),
            documents: input
                .documents
                .iter()
                .filter_map(|url| normalize_optional_text(Some(url)))
                .collect(),
            ..input
        };

        with_tx!(self, |db_tx| {
            let asset = Asset::new(&ctx.tenant_id, input, Utc::now());
            let model = assets::ActiveModel::try_from(&asset)?;
            model.insert(&db_tx).await?;
            tracing::info!(
                tenant_id = %ctx.tenant_id,
                asset_id = %asset.id,
                value_minor = asset.current_value.cents(),
                "asset created"
            );
            Ok(asset)
        })
    }

    /// Assets of the caller's chama, most recent purchase first.
    pub async fn list_assets(&self, ctx: &TenantContext) -> ResultEngine<Vec<Asset>> {
        with_tx!(self, |db_tx| {
            let models: Vec<assets::Model> = assets::Entity::find()
                .filter(assets::Column::TenantId.eq(ctx.tenant_id.clone()))
                .order_by_desc(assets::Column::PurchaseDate)
                .order_by_asc(assets::Column::Name)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(Asset::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Revalues an asset. Admin/treasurer only.
    pub async fn update_asset_value(
        &self,
        ctx: &TenantContext,
        asset_id: &str,
        current_value: Money,
    ) -> ResultEngine<Asset> {
        ctx.require_privileged("manage assets")?;
        ensure_current_value(current_value)?;
        with_tx!(self, |db_tx| {
            let model = self.require_asset(&db_tx, &ctx.tenant_id, asset_id).await?;
            let mut active: assets::ActiveModel = model.into();
            active.current_value_minor = ActiveValue::Set(current_value.cents());
            let model = active.update(&db_tx).await?;
            Asset::try_from(model)
        })
    }

    pub async fn delete_asset(&self, ctx: &TenantContext, asset_id: &str) -> ResultEngine<()> {
        ctx.require_privileged("manage assets")?;
        with_tx!(self, |db_tx| {
            let model = self.require_asset(&db_tx, &ctx.tenant_id, asset_id).await?;
            assets::Entity::delete_by_id(model.id.clone())
                .exec(&db_tx)
                .await?;
            tracing::info!(tenant_id = %ctx.tenant_id, asset_id = %model.id, "asset deleted");
            Ok(())
        })
    }
}
