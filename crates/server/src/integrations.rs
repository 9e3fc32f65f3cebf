//! Provider account settings of a chama.

use api_types::integration::{IntegrationNew, IntegrationUpdate, IntegrationView};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use engine::{NewIntegration, TenantContext};

use crate::{
    Action, Created, ServerError, created, done,
    server::ServerState,
    views::{integration_view, provider_from_api},
};

pub async fn list(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
) -> Action<Vec<IntegrationView>> {
    let integrations = state.engine.list_integrations(&ctx).await?;
    done(integrations.into_iter().map(integration_view).collect())
}

pub async fn create(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<IntegrationNew>, ServerError>,
) -> Created<IntegrationView> {
    let input = NewIntegration {
        provider: provider_from_api(payload.provider),
        name: payload.name,
        config: payload.config,
        is_enabled: payload.is_enabled,
    };
    let integration = state.engine.create_integration(&ctx, input).await?;
    created(integration_view(integration))
}

pub async fn update(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(integration_id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<IntegrationUpdate>, ServerError>,
) -> Action<IntegrationView> {
    let update = engine::IntegrationUpdate {
        name: payload.name,
        config: payload.config,
        is_enabled: payload.is_enabled,
    };
    let integration = state
        .engine
        .update_integration(&ctx, &integration_id, update)
        .await?;
    done(integration_view(integration))
}
