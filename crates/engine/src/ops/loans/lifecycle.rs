use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*,
    sea_query::{Expr, Query},
};

use crate::{
    EngineError, EntryKind, Guarantor, LedgerEntry, Loan, LoanStatus, LoanTermsUpdate,
    ResultEngine, TenantContext, UpdatedLoan, guarantors, loan_audit, loans, members,
    util::{new_id, parse_id},
};

use super::super::{Engine, with_tx};

impl Engine {
    /// Sets `disbursed_at` once and writes the matching `LOAN_DISBURSEMENT`.
    ///
    /// Returns whether this call performed the disbursement.
    async fn disburse_once(
        &self,
        db: &DatabaseTransaction,
        loan: &Loan,
        recorded_by: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<bool> {
        let res = loans::Entity::update_many()
            .col_expr(loans::Column::DisbursedAt, Expr::value(now))
            .filter(loans::Column::Id.eq(loan.id.clone()))
            .filter(loans::Column::DisbursedAt.is_null())
            .exec(db)
            .await?;
        if res.rows_affected == 0 {
            return Ok(false);
        }

        let entry = LedgerEntry::new(
            &loan.borrower_id,
            EntryKind::LoanDisbursement,
            loan.principal,
            Some(format!("Loan disbursement ({})", loan.id)),
            None,
            Some(recorded_by),
        )?
        .for_loan(&loan.id);
        self.insert_entry(db, &entry).await?;
        tracing::info!(
            loan_id = %loan.id,
            borrower_id = %loan.borrower_id,
            amount_minor = loan.principal.cents(),
            "loan disbursed"
        );
        Ok(true)
    }

    /// Moves a loan through the operator-driven part of its state machine.
    ///
    /// The first transition into `APPROVED` or `ACTIVE` disburses the
    /// principal; later ones never disburse again. Setting the current status
    /// again is a no-op. Admin/treasurer only.
    pub async fn update_status(
        &self,
        ctx: &TenantContext,
        loan_id: &str,
        status: LoanStatus,
    ) -> ResultEngine<Loan> {
        ctx.require_privileged("change loan status")?;
        let now = Utc::now();
        with_tx!(self, |db_tx| {
            let model = self
                .require_loan_in_tenant(&db_tx, &ctx.tenant_id, loan_id)
                .await?;
            let loan = Loan::try_from(model)?;
            if loan.status == status {
                return Ok(loan);
            }
            if !loan.status.can_transition_to(status) {
                return Err(EngineError::InvalidTransition(format!(
                    "cannot move loan from {} to {}",
                    loan.status.as_str(),
                    status.as_str()
                )));
            }

            let res = loans::Entity::update_many()
                .col_expr(loans::Column::Status, Expr::value(status.as_str()))
                .filter(loans::Column::Id.eq(loan.id.clone()))
                .filter(loans::Column::Status.eq(loan.status.as_str()))
                .exec(&db_tx)
                .await?;
            if res.rows_affected == 0 {
                return Err(EngineError::InvalidTransition(
                    "loan changed concurrently".to_string(),
                ));
            }
            tracing::info!(
                tenant_id = %ctx.tenant_id,
                loan_id = %loan.id,
                from = loan.status.as_str(),
                to = status.as_str(),
                "loan status changed"
            );

            if status.disburses() {
                self.disburse_once(&db_tx, &loan, &ctx.member_id, now)
                    .await?;
            }

            self.reload_loan(&db_tx, &loan.id).await
        })
    }

    /// Marks a guarantor commitment as accepted. Approving twice is a no-op.
    ///
    /// Allowed for the guarantor and for admins/treasurers.
    pub async fn approve_guarantorship(
        &self,
        ctx: &TenantContext,
        guarantor_entry_id: &str,
    ) -> ResultEngine<Guarantor> {
        let guarantor_entry_id = parse_id(guarantor_entry_id, "guarantor")?;
        with_tx!(self, |db_tx| {
            let row = guarantors::Entity::find_by_id(guarantor_entry_id.clone())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("guarantor not exists".to_string()))?;
            let loan_model = self
                .require_loan_in_tenant(&db_tx, &ctx.tenant_id, &row.loan_id)
                .await?;
            ctx.require_self_or_privileged(&row.guarantor_id, "approve guarantees")?;

            if row.accepted {
                return Ok(Guarantor::from(row));
            }
            let status = LoanStatus::try_from(loan_model.status.as_str())?;
            if !status.is_open() {
                return Err(EngineError::InvalidTransition(format!(
                    "cannot approve a guarantee on a {} loan",
                    status.as_str()
                )));
            }

            guarantors::Entity::update_many()
                .col_expr(guarantors::Column::Accepted, Expr::value(true))
                .filter(guarantors::Column::Id.eq(row.id.clone()))
                .exec(&db_tx)
                .await?;
            tracing::info!(
                loan_id = %row.loan_id,
                guarantor_id = %row.guarantor_id,
                "guarantorship approved"
            );

            let mut out = Guarantor::from(row);
            out.accepted = true;
            Ok(out)
        })
    }

    /// Edits principal, rate or duration without touching the stored total
    /// or balance.
    ///
    /// The due date follows the new duration. `terms_diverged` tells the
    /// caller that the stored total no longer matches the terms; reconcile
    /// with [`adjust_balance`](Self::adjust_balance).
    pub async fn update_details(
        &self,
        ctx: &TenantContext,
        loan_id: &str,
        update: LoanTermsUpdate,
    ) -> ResultEngine<UpdatedLoan> {
        ctx.require_privileged("edit loan terms")?;
        if update.principal.is_some_and(|p| !p.is_positive()) {
            return Err(EngineError::InvalidAmount(
                "loan amount must be > 0".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let model = self
                .require_loan_in_tenant(&db_tx, &ctx.tenant_id, loan_id)
                .await?;
            let mut loan = Loan::try_from(model.clone())?;
            if let Some(principal) = update.principal {
                loan.principal = principal;
            }
            if let Some(rate) = update.interest_rate {
                loan.interest_rate = rate;
            }
            if let Some(months) = update.duration_months {
                loan.due_date = loans::due_date(loan.created_at, months)?;
                loan.duration_months = months;
            }
            let terms_diverged = loan.implied_total()? != loan.total_repayable;

            let duration_months = i32::try_from(loan.duration_months)
                .map_err(|_| EngineError::InvalidInput("duration too long".to_string()))?;
            let mut active: loans::ActiveModel = model.into();
            active.principal_minor = ActiveValue::Set(loan.principal.cents());
            active.interest_bps = ActiveValue::Set(loan.interest_rate.basis_points());
            active.duration_months = ActiveValue::Set(duration_months);
            active.due_date = ActiveValue::Set(loan.due_date);
            active.update(&db_tx).await?;

            if terms_diverged {
                tracing::warn!(
                    tenant_id = %ctx.tenant_id,
                    loan_id = %loan.id,
                    total_repayable_minor = loan.total_repayable.cents(),
                    "loan terms no longer match the stored total"
                );
            }
            Ok(UpdatedLoan {
                loan,
                terms_diverged,
            })
        })
    }

    /// Deletes a loan and its guarantor rows.
    ///
    /// A snapshot of both is appended to the loan audit log in the same
    /// transaction. Ledger entries referencing the loan are kept.
    pub async fn delete_loan(&self, ctx: &TenantContext, loan_id: &str) -> ResultEngine<()> {
        ctx.require_privileged("delete loans")?;
        let now = Utc::now();
        with_tx!(self, |db_tx| {
            let model = self
                .require_loan_in_tenant(&db_tx, &ctx.tenant_id, loan_id)
                .await?;
            let details = self.load_loan_details(&db_tx, model).await?;
            let snapshot = serde_json::to_string(&details)
                .map_err(|_| EngineError::InvalidInput("invalid loan snapshot".to_string()))?;

            loan_audit::ActiveModel {
                id: ActiveValue::Set(new_id()),
                loan_id: ActiveValue::Set(details.loan.id.clone()),
                tenant_id: ActiveValue::Set(ctx.tenant_id.clone()),
                actor_id: ActiveValue::Set(ctx.member_id.clone()),
                action: ActiveValue::Set("delete".to_string()),
                snapshot: ActiveValue::Set(snapshot),
                recorded_at: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;

            guarantors::Entity::delete_many()
                .filter(guarantors::Column::LoanId.eq(details.loan.id.clone()))
                .exec(&db_tx)
                .await?;
            loans::Entity::delete_by_id(details.loan.id.clone())
                .exec(&db_tx)
                .await?;

            tracing::warn!(
                tenant_id = %ctx.tenant_id,
                loan_id = %details.loan.id,
                actor_id = %ctx.member_id,
                balance_minor = details.loan.balance.cents(),
                "loan deleted"
            );
            Ok(())
        })
    }

    /// Moves `ACTIVE` loans past their due date with a positive balance to
    /// `DEFAULTED`. Returns the number of loans changed.
    pub async fn mark_overdue_defaulted(
        &self,
        ctx: &TenantContext,
        now: DateTime<Utc>,
    ) -> ResultEngine<u64> {
        ctx.require_privileged("run the default sweep")?;
        with_tx!(self, |db_tx| {
            let affected = self
                .default_overdue(&db_tx, Some(&ctx.tenant_id), now)
                .await?;
            tracing::info!(tenant_id = %ctx.tenant_id, affected, "default sweep");
            Ok(affected)
        })
    }

    /// Default sweep across every chama, for operators.
    pub async fn mark_overdue_defaulted_all(&self, now: DateTime<Utc>) -> ResultEngine<u64> {
        with_tx!(self, |db_tx| {
            let affected = self.default_overdue(&db_tx, None, now).await?;
            tracing::info!(affected, "default sweep across all chamas");
            Ok(affected)
        })
    }

    async fn default_overdue(
        &self,
        db: &DatabaseTransaction,
        tenant_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> ResultEngine<u64> {
        let mut update = loans::Entity::update_many()
            .col_expr(
                loans::Column::Status,
                Expr::value(LoanStatus::Defaulted.as_str()),
            )
            .filter(loans::Column::Status.eq(LoanStatus::Active.as_str()))
            .filter(loans::Column::DueDate.lt(now))
            .filter(loans::Column::BalanceMinor.gt(0));
        if let Some(tenant_id) = tenant_id {
            update = update.filter(
                loans::Column::BorrowerId.in_subquery(
                    Query::select()
                        .column(members::Column::Id)
                        .from(members::Entity)
                        .and_where(members::Column::TenantId.eq(tenant_id.to_string()))
                        .to_owned(),
                ),
            );
        }
        let res = update.exec(db).await?;
        Ok(res.rows_affected)
    }
}
