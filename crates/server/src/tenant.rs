//! Chama settings endpoints.

use api_types::tenant::{TenantUpdate, TenantView};
use axum::{Extension, Json, extract::State};
use axum_extra::extract::WithRejection;
use engine::TenantContext;

use crate::{Action, ServerError, done, server::ServerState, views::tenant_view};

pub async fn get(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
) -> Action<TenantView> {
    let tenant = state.engine.tenant(&ctx).await?;
    done(tenant_view(tenant))
}

pub async fn update(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<TenantUpdate>, ServerError>,
) -> Action<TenantView> {
    let update = engine::TenantUpdate {
        name: payload.name,
        contact_email: payload.contact_email,
        contact_phone: payload.contact_phone,
        logo_url: payload.logo_url,
    };
    let tenant = state.engine.update_tenant(&ctx, update).await?;
    done(tenant_view(tenant))
}
