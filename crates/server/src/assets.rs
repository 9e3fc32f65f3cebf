//! Asset register endpoints.

use api_types::asset::{AssetNew, AssetValueUpdate, AssetView};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use engine::{Money, NewAsset, TenantContext};

use crate::{
    Action, Created, ServerError, created, done, server::ServerState, views::asset_view,
};

pub async fn create(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<AssetNew>, ServerError>,
) -> Created<AssetView> {
    let input = NewAsset {
        name: payload.name,
        description: payload.description,
        category: payload.category,
        purchase_date: payload.purchase_date,
        purchase_price: Money::new(payload.purchase_price_minor),
        current_value: Money::new(payload.current_value_minor),
        documents: payload.documents,
    };
    let asset = state.engine.create_asset(&ctx, input).await?;
    created(asset_view(asset))
}

pub async fn list(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
) -> Action<Vec<AssetView>> {
    let assets = state.engine.list_assets(&ctx).await?;
    done(assets.into_iter().map(asset_view).collect())
}

pub async fn update_value(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(asset_id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<AssetValueUpdate>, ServerError>,
) -> Action<AssetView> {
    let asset = state
        .engine
        .update_asset_value(&ctx, &asset_id, Money::new(payload.current_value_minor))
        .await?;
    done(asset_view(asset))
}

pub async fn delete(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(asset_id): Path<String>,
) -> Action<()> {
    state.engine.delete_asset(&ctx, &asset_id).await?;
    done(())
}
