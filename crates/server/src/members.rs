//! Member roster endpoints.

use api_types::member::{
    MemberInvite, MemberProfileUpdate, MemberRoleUpdate, MemberSummaryView, MemberView,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use engine::{MemberUpdate, NewMember, TenantContext};

use crate::{
    Action, Created, ServerError, created, done,
    server::ServerState,
    views::{member_summary_view, member_view, role_from_api},
};

pub async fn invite(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<MemberInvite>, ServerError>,
) -> Created<MemberView> {
    let member = state
        .engine
        .invite_member(
            &ctx,
            NewMember {
                email: payload.email,
                credential_hash: payload.credential_hash,
                name: payload.name,
                phone: payload.phone,
                role: role_from_api(payload.role),
            },
        )
        .await?;
    created(member_view(member))
}

pub async fn list(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
) -> Action<Vec<MemberSummaryView>> {
    let roster = state.engine.list_members(&ctx).await?;
    done(roster.into_iter().map(member_summary_view).collect())
}

pub async fn get(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(member_id): Path<String>,
) -> Action<MemberView> {
    let member = state.engine.member(&ctx, &member_id).await?;
    done(member_view(member))
}

pub async fn update_profile(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(member_id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<MemberProfileUpdate>, ServerError>,
) -> Action<MemberView> {
    let update = MemberUpdate {
        name: payload.name,
        phone: payload.phone,
        avatar_url: payload.avatar_url,
    };
    let member = state
        .engine
        .update_member_profile(&ctx, &member_id, update)
        .await?;
    done(member_view(member))
}

pub async fn update_role(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(member_id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<MemberRoleUpdate>, ServerError>,
) -> Action<MemberView> {
    let member = state
        .engine
        .update_member_role(&ctx, &member_id, role_from_api(payload.role))
        .await?;
    done(member_view(member))
}

pub async fn remove(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(member_id): Path<String>,
) -> Action<()> {
    state.engine.remove_member(&ctx, &member_id).await?;
    done(())
}
