use sea_orm::{QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};

use crate::{
    EngineError, Guarantor, Loan, LoanAuditRecord, LoanDetails, LoanFilter, ResultEngine,
    TenantContext, guarantors, loan_audit, loans, members,
};

use super::super::{Engine, with_tx};

impl Engine {
    /// A loan with its guarantors.
    ///
    /// Members can read loans they borrowed or guarantee.
    pub async fn loan(&self, ctx: &TenantContext, loan_id: &str) -> ResultEngine<LoanDetails> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_loan_in_tenant(&db_tx, &ctx.tenant_id, loan_id)
                .await?;
            let details = self.load_loan_details(&db_tx, model).await?;
            let involved = details.loan.borrower_id == ctx.member_id
                || details
                    .guarantors
                    .iter()
                    .any(|g| g.guarantor_id == ctx.member_id);
            if !ctx.is_privileged() && !involved {
                return Err(EngineError::KeyNotFound("loan not exists".to_string()));
            }
            Ok(details)
        })
    }

    /// Loans of the caller's tenant, newest first. Members only see their
    /// own loans.
    pub async fn list_loans(
        &self,
        ctx: &TenantContext,
        filter: &LoanFilter,
    ) -> ResultEngine<Vec<Loan>> {
        let borrower_scope = if ctx.is_privileged() {
            filter.borrower_id.clone()
        } else {
            if filter
                .borrower_id
                .as_deref()
                .is_some_and(|id| id != ctx.member_id)
            {
                return Err(EngineError::Unauthorized(
                    "members can only list their own loans".to_string(),
                ));
            }
            Some(ctx.member_id.clone())
        };

        with_tx!(self, |db_tx| {
            let mut query = loans::Entity::find()
                .inner_join(members::Entity)
                .filter(members::Column::TenantId.eq(ctx.tenant_id.clone()))
                .order_by_desc(loans::Column::CreatedAt)
                .order_by_desc(loans::Column::Id);
            if let Some(borrower_id) = &borrower_scope {
                query = query.filter(loans::Column::BorrowerId.eq(borrower_id.clone()));
            }
            if let Some(status) = filter.status {
                query = query.filter(loans::Column::Status.eq(status.as_str()));
            }

            let models: Vec<loans::Model> = query.all(&db_tx).await?;
            models
                .into_iter()
                .map(Loan::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Guarantees the caller has committed, with the guaranteed loan.
    pub async fn list_guarantees(
        &self,
        ctx: &TenantContext,
    ) -> ResultEngine<Vec<(Guarantor, Loan)>> {
        with_tx!(self, |db_tx| {
            let rows: Vec<(guarantors::Model, Option<loans::Model>)> = guarantors::Entity::find()
                .filter(guarantors::Column::GuarantorId.eq(ctx.member_id.clone()))
                .find_also_related(loans::Entity)
                .order_by_desc(guarantors::Column::CreatedAt)
                .all(&db_tx)
                .await?;

            let mut out = Vec::with_capacity(rows.len());
            for (row, loan) in rows {
                let Some(loan) = loan else {
                    continue;
                };
                out.push((Guarantor::from(row), Loan::try_from(loan)?));
            }
            Ok(out)
        })
    }

    /// Deleted-loan snapshots of the caller's tenant, newest first.
    pub async fn loan_audit_log(&self, ctx: &TenantContext) -> ResultEngine<Vec<LoanAuditRecord>> {
        ctx.require_privileged("read the loan audit log")?;
        with_tx!(self, |db_tx| {
            let models: Vec<loan_audit::Model> = loan_audit::Entity::find()
                .filter(loan_audit::Column::TenantId.eq(ctx.tenant_id.clone()))
                .order_by_desc(loan_audit::Column::RecordedAt)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(LoanAuditRecord::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}
