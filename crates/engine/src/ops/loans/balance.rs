use sea_orm::{QueryFilter, TransactionTrait, prelude::*, sea_query::Expr};

use crate::{
    EngineError, EntryKind, LedgerEntry, Loan, LoanStatus, Money, ResultEngine, TenantContext,
    loans,
    util::{normalize_optional_text, normalize_required_text},
};

use super::super::{Engine, with_tx};

impl Engine {
    /// Applies a repayment to a loan.
    ///
    /// The balance is decremented in SQL (`balance = balance - amount`) so
    /// concurrent repayments never lose an update. A balance at or below zero
    /// closes the loan as `PAID`; rejected loans accept no repayments. The
    /// balance change and the `LOAN_REPAYMENT` entry commit together.
    ///
    /// Allowed for admins/treasurers and for the borrower.
    pub async fn record_repayment(
        &self,
        ctx: &TenantContext,
        loan_id: &str,
        amount: Money,
        reference_code: Option<&str>,
    ) -> ResultEngine<Loan> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "repayment amount must be > 0".to_string(),
            ));
        }
        let reference_code = normalize_optional_text(reference_code);

        with_tx!(self, |db_tx| {
            let model = self
                .require_loan_in_tenant(&db_tx, &ctx.tenant_id, loan_id)
                .await?;
            ctx.require_self_or_privileged(&model.borrower_id, "repay loans")?;

            let res = loans::Entity::update_many()
                .col_expr(
                    loans::Column::BalanceMinor,
                    Expr::col(loans::Column::BalanceMinor).sub(amount.cents()),
                )
                .filter(loans::Column::Id.eq(model.id.clone()))
                .filter(loans::Column::Status.ne(LoanStatus::Rejected.as_str()))
                .exec(&db_tx)
                .await?;
            if res.rows_affected == 0 {
                return Err(EngineError::InvalidTransition(
                    "rejected loans cannot receive repayments".to_string(),
                ));
            }

            loans::Entity::update_many()
                .col_expr(loans::Column::Status, Expr::value(LoanStatus::Paid.as_str()))
                .filter(loans::Column::Id.eq(model.id.clone()))
                .filter(loans::Column::BalanceMinor.lte(0))
                .filter(loans::Column::Status.ne(LoanStatus::Paid.as_str()))
                .exec(&db_tx)
                .await?;

            let entry = LedgerEntry::new(
                &model.borrower_id,
                EntryKind::LoanRepayment,
                amount,
                Some(format!("Loan repayment ({})", model.id)),
                reference_code,
                Some(&ctx.member_id),
            )?
            .for_loan(&model.id);
            self.insert_entry(&db_tx, &entry).await?;

            let loan = self.reload_loan(&db_tx, &model.id).await?;
            tracing::info!(
                tenant_id = %ctx.tenant_id,
                loan_id = %loan.id,
                amount_minor = amount.cents(),
                balance_minor = loan.balance.cents(),
                status = loan.status.as_str(),
                "loan repayment recorded"
            );
            Ok(loan)
        })
    }

    /// Overwrites a loan balance to correct data-entry errors.
    ///
    /// Writes an `ADJUSTMENT` entry carrying the signed delta and the note.
    /// A balance at or below zero marks the loan `PAID`; a `PAID` loan whose
    /// balance becomes positive again is reactivated. The update only
    /// applies if the balance did not change since it was read.
    /// Admin/treasurer only.
    pub async fn adjust_balance(
        &self,
        ctx: &TenantContext,
        loan_id: &str,
        new_balance: Money,
        note: &str,
    ) -> ResultEngine<Loan> {
        ctx.require_privileged("adjust loan balances")?;
        let note = normalize_required_text(note, "adjustment note")?;

        with_tx!(self, |db_tx| {
            let model = self
                .require_loan_in_tenant(&db_tx, &ctx.tenant_id, loan_id)
                .await?;
            let loan = Loan::try_from(model)?;
            if loan.status == LoanStatus::Rejected {
                return Err(EngineError::InvalidTransition(
                    "rejected loans cannot be adjusted".to_string(),
                ));
            }
            let delta = new_balance
                .checked_sub(loan.balance)
                .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))?;
            if delta.is_zero() {
                return Err(EngineError::InvalidAmount(
                    "new balance equals the current balance".to_string(),
                ));
            }

            let next_status = if !new_balance.is_positive() {
                LoanStatus::Paid
            } else if loan.status == LoanStatus::Paid {
                LoanStatus::Active
            } else {
                loan.status
            };

            let res = loans::Entity::update_many()
                .col_expr(loans::Column::BalanceMinor, Expr::value(new_balance.cents()))
                .col_expr(loans::Column::Status, Expr::value(next_status.as_str()))
                .filter(loans::Column::Id.eq(loan.id.clone()))
                .filter(loans::Column::BalanceMinor.eq(loan.balance.cents()))
                .filter(loans::Column::Status.eq(loan.status.as_str()))
                .exec(&db_tx)
                .await?;
            if res.rows_affected == 0 {
                return Err(EngineError::InvalidTransition(
                    "loan changed concurrently".to_string(),
                ));
            }

            let mut entry = LedgerEntry::new(
                &loan.borrower_id,
                EntryKind::Adjustment,
                delta.abs(),
                Some(format!(
                    "Balance adjustment {} -> {}: {note}",
                    loan.balance, new_balance
                )),
                None,
                Some(&ctx.member_id),
            )?
            .for_loan(&loan.id);
            entry.delta = Some(delta);
            self.insert_entry(&db_tx, &entry).await?;

            tracing::warn!(
                tenant_id = %ctx.tenant_id,
                loan_id = %loan.id,
                actor_id = %ctx.member_id,
                delta_minor = delta.cents(),
                from = loan.status.as_str(),
                to = next_status.as_str(),
                note = %note,
                "loan balance adjusted"
            );
            self.reload_loan(&db_tx, &loan.id).await
        })
    }
}
