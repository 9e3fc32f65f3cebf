//! Loan lifecycle endpoints.

use api_types::loan::{
    BalanceAdjustment, DefaultSweep, DefaultSweepResult, GuaranteeView, GuarantorView,
    LoanAuditView, LoanDetailView, LoanList, LoanNew, LoanStatusUpdate, LoanTermsUpdate,
    LoanTermsUpdated, LoanView, RepaymentNew,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use engine::{GuarantorInput, InterestRate, LoanFilter, Money, NewLoan, TenantContext};

use crate::{
    Action, Created, ServerError, created, done,
    server::ServerState,
    views::{
        guarantor_view, loan_audit_view, loan_detail_view, loan_view, status_from_api,
    },
};

pub async fn create(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<LoanNew>, ServerError>,
) -> Created<LoanDetailView> {
    let input = NewLoan {
        borrower_id: payload.borrower_id,
        principal: Money::new(payload.principal_minor),
        interest_rate: InterestRate::from_basis_points(payload.interest_bps)?,
        duration_months: payload.duration_months,
        guarantors: payload
            .guarantors
            .into_iter()
            .map(|g| GuarantorInput {
                guarantor_id: g.guarantor_id,
                amount: Money::new(g.amount_minor),
            })
            .collect(),
    };
    let details = state.engine.create_loan(&ctx, input).await?;
    created(loan_detail_view(details))
}

pub async fn list(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    WithRejection(Query(query), _): WithRejection<Query<LoanList>, ServerError>,
) -> Action<Vec<LoanView>> {
    let filter = LoanFilter {
        status: query.status.map(status_from_api),
        borrower_id: query.borrower_id,
    };
    let loans = state.engine.list_loans(&ctx, &filter).await?;
    done(loans.into_iter().map(loan_view).collect())
}

pub async fn get(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(loan_id): Path<String>,
) -> Action<LoanDetailView> {
    let details = state.engine.loan(&ctx, &loan_id).await?;
    done(loan_detail_view(details))
}

pub async fn update_status(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(loan_id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<LoanStatusUpdate>, ServerError>,
) -> Action<LoanView> {
    let loan = state
        .engine
        .update_status(&ctx, &loan_id, status_from_api(payload.status))
        .await?;
    done(loan_view(loan))
}

pub async fn repay(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(loan_id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<RepaymentNew>, ServerError>,
) -> Action<LoanView> {
    let loan = state
        .engine
        .record_repayment(
            &ctx,
            &loan_id,
            Money::new(payload.amount_minor),
            payload.reference_code.as_deref(),
        )
        .await?;
    done(loan_view(loan))
}

pub async fn adjust(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(loan_id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<BalanceAdjustment>, ServerError>,
) -> Action<LoanView> {
    let loan = state
        .engine
        .adjust_balance(
            &ctx,
            &loan_id,
            Money::new(payload.new_balance_minor),
            &payload.note,
        )
        .await?;
    done(loan_view(loan))
}

pub async fn update_details(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(loan_id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<LoanTermsUpdate>, ServerError>,
) -> Action<LoanTermsUpdated> {
    let update = engine::LoanTermsUpdate {
        principal: payload.principal_minor.map(Money::new),
        interest_rate: payload
            .interest_bps
            .map(InterestRate::from_basis_points)
            .transpose()?,
        duration_months: payload.duration_months,
    };
    let updated = state.engine.update_details(&ctx, &loan_id, update).await?;
    done(LoanTermsUpdated {
        loan: loan_view(updated.loan),
        terms_diverged: updated.terms_diverged,
    })
}

pub async fn delete(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(loan_id): Path<String>,
) -> Action<()> {
    state.engine.delete_loan(&ctx, &loan_id).await?;
    done(())
}

pub async fn default_sweep(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<DefaultSweep>, ServerError>,
) -> Action<DefaultSweepResult> {
    let now = payload.now.unwrap_or_else(Utc::now);
    let defaulted = state.engine.mark_overdue_defaulted(&ctx, now).await?;
    done(DefaultSweepResult { defaulted })
}

pub async fn audit_log(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
) -> Action<Vec<LoanAuditView>> {
    let records = state.engine.loan_audit_log(&ctx).await?;
    done(records.into_iter().map(loan_audit_view).collect())
}

/// Commitments where the caller is the guarantor.
pub async fn guarantees(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
) -> Action<Vec<GuaranteeView>> {
    let rows = state.engine.list_guarantees(&ctx).await?;
    done(
        rows.into_iter()
            .map(|(guarantee, loan)| GuaranteeView {
                guarantee: guarantor_view(guarantee),
                loan: loan_view(loan),
            })
            .collect(),
    )
}

pub async fn approve(
    Extension(ctx): Extension<TenantContext>,
    State(state): State<ServerState>,
    Path(guarantee_id): Path<String>,
) -> Action<GuarantorView> {
    let row = state
        .engine
        .approve_guarantorship(&ctx, &guarantee_id)
        .await?;
    done(guarantor_view(row))
}
