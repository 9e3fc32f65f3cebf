//! Manual payment alert reconciliation.

use api_types::{
    alert::{AlertAssign, AlertView},
    ledger::EntryView,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use engine::TenantContext;

use crate::{
    Action, ServerError, done,
    server::ServerState,
    views::{alert_view, entry_view},
};

pub async fn pending(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
) -> Action<Vec<AlertView>> {
    let alerts = state.engine.list_pending_alerts(&ctx).await?;
    done(alerts.into_iter().map(alert_view).collect())
}

pub async fn assign(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(alert_id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<AlertAssign>, ServerError>,
) -> Action<EntryView> {
    let entry = state
        .engine
        .assign_alert(&ctx, &alert_id, &payload.member_id)
        .await?;
    done(entry_view(entry))
}
