use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{DatabaseTransaction, TransactionTrait, prelude::*};

use crate::{
    EngineError, Guarantor, GuarantorInput, Loan, LoanDetails, Money, NewLoan, ResultEngine,
    TenantContext, guarantors, loans, util::parse_id,
};

use super::super::{Engine, with_tx};
use super::MAX_GUARANTORS;

impl Engine {
    /// Checks guarantor rows against the borrower and the loan principal.
    async fn validate_guarantors(
        &self,
        db: &DatabaseTransaction,
        ctx: &TenantContext,
        borrower_id: &str,
        principal: Money,
        inputs: &[GuarantorInput],
    ) -> ResultEngine<Vec<GuarantorInput>> {
        if inputs.len() > MAX_GUARANTORS {
            return Err(EngineError::InvalidInput(format!(
                "a loan can have at most {MAX_GUARANTORS} guarantors"
            )));
        }

        let mut seen = HashSet::new();
        let mut total = Money::ZERO;
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            let guarantor_id = parse_id(&input.guarantor_id, "guarantor")?;
            if !input.amount.is_positive() {
                return Err(EngineError::InvalidAmount(
                    "guarantee amount must be > 0".to_string(),
                ));
            }
            if guarantor_id == borrower_id {
                return Err(EngineError::InvalidInput(
                    "borrowers cannot guarantee their own loan".to_string(),
                ));
            }
            if !seen.insert(guarantor_id.clone()) {
                return Err(EngineError::InvalidInput(
                    "duplicate guarantor".to_string(),
                ));
            }
            self.require_member_in_tenant(db, &ctx.tenant_id, &guarantor_id)
                .await?;

            let available = self.available_savings(db, &guarantor_id).await?;
            if input.amount > available {
                return Err(EngineError::InvalidAmount(format!(
                    "guarantee of {} exceeds available savings of {}",
                    input.amount, available
                )));
            }

            total = total
                .checked_add(input.amount)
                .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))?;
            out.push(GuarantorInput {
                guarantor_id,
                amount: input.amount,
            });
        }

        if total > principal {
            return Err(EngineError::InvalidAmount(
                "guarantees exceed the loan amount".to_string(),
            ));
        }
        Ok(out)
    }

    /// Requests a loan.
    ///
    /// - `total_repayable = principal × (1 + rate)`, `balance = total_repayable`
    /// - status starts at `PENDING`, due date is creation + duration
    /// - zero, one or two guarantors, partial guarantees allowed
    ///
    /// The loan and its guarantor rows are written in one transaction.
    /// Members may only request loans for themselves.
    pub async fn create_loan(&self, ctx: &TenantContext, input: NewLoan) -> ResultEngine<LoanDetails> {
        let now = Utc::now();
        with_tx!(self, |db_tx| {
            let borrower = self
                .require_member_in_tenant(&db_tx, &ctx.tenant_id, &input.borrower_id)
                .await?;
            ctx.require_self_or_privileged(&borrower.id, "request loans")?;

            let loan = Loan::new(
                &borrower.id,
                input.principal,
                input.interest_rate,
                input.duration_months,
                now,
            )?;
            let commitments = self
                .validate_guarantors(&db_tx, ctx, &borrower.id, loan.principal, &input.guarantors)
                .await?;

            let loan_model = loans::ActiveModel::try_from(&loan)?;
            loan_model.insert(&db_tx).await?;

            let mut rows = Vec::with_capacity(commitments.len());
            for commitment in commitments {
                let row = Guarantor::new(&loan.id, &commitment.guarantor_id, commitment.amount, now);
                let model: guarantors::ActiveModel = (&row).into();
                model.insert(&db_tx).await?;
                rows.push(row);
            }

            tracing::info!(
                tenant_id = %ctx.tenant_id,
                loan_id = %loan.id,
                borrower_id = %loan.borrower_id,
                principal_minor = loan.principal.cents(),
                total_repayable_minor = loan.total_repayable.cents(),
                guarantors = rows.len(),
                "loan created"
            );
            Ok(LoanDetails {
                loan,
                guarantors: rows,
            })
        })
    }
}
