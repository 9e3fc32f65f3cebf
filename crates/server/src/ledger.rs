//! Ledger endpoints.

use api_types::ledger::{EntryList, EntryListResponse, EntryNew, EntryView, SavingsView};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use engine::{EntryFilter, Money, NewEntry, TenantContext};

use crate::{
    Action, Created, ServerError, created, done,
    server::ServerState,
    views::{entry_view, kind_from_api},
};

const DEFAULT_PAGE: u64 = 50;
const MAX_PAGE: u64 = 200;

pub async fn record(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<EntryNew>, ServerError>,
) -> Created<EntryView> {
    let entry = state
        .engine
        .record_entry(
            &ctx,
            NewEntry {
                member_id: payload.member_id,
                kind: kind_from_api(payload.kind),
                amount: Money::new(payload.amount_minor),
                description: payload.description,
                reference_code: payload.reference_code,
            },
        )
        .await?;
    created(entry_view(entry))
}

pub async fn list(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<EntryList>, ServerError>,
) -> Action<EntryListResponse> {
    let filter = EntryFilter {
        member_id: payload.member_id,
        kinds: payload
            .kinds
            .map(|kinds| kinds.into_iter().map(kind_from_api).collect()),
        from: payload.from,
        to: payload.to,
    };
    let limit = payload.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);

    let (entries, next_cursor) = state
        .engine
        .list_entries(&ctx, &filter, limit, payload.cursor.as_deref())
        .await?;

    done(EntryListResponse {
        entries: entries.into_iter().map(entry_view).collect(),
        next_cursor,
    })
}

pub async fn savings(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(member_id): Path<String>,
) -> Action<SavingsView> {
    let savings = state.engine.member_savings(&ctx, &member_id).await?;
    done(SavingsView {
        member_id,
        savings_minor: savings.cents(),
    })
}
