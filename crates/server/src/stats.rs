//! Reporting endpoints.

use api_types::stats::{Dashboard, LoanStats, TransactionStats};
use axum::{Extension, extract::State};
use chrono::Utc;
use engine::TenantContext;

use crate::{
    Action, done,
    server::ServerState,
    views::{dashboard_view, loan_stats_view, transaction_stats_view},
};

pub async fn transactions(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
) -> Action<TransactionStats> {
    let stats = state.engine.transaction_stats(&ctx).await?;
    done(transaction_stats_view(stats))
}

pub async fn loans(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
) -> Action<LoanStats> {
    let stats = state.engine.loan_stats(&ctx, Utc::now()).await?;
    done(loan_stats_view(stats))
}

pub async fn dashboard(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
) -> Action<Dashboard> {
    let stats = state.engine.dashboard_stats(&ctx, Utc::now()).await?;
    done(dashboard_view(stats))
}
