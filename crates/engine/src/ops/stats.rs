use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use sea_orm::{
    DatabaseTransaction, QueryFilter, QuerySelect, Statement, TransactionTrait, prelude::*,
};

use crate::{
    EngineError, EntryKind, Loan, LoanStatus, Money, ResultEngine, TenantContext, loans, members,
};

use super::{Engine, with_tx};

/// Ledger totals of a chama. Every amount is a positive sum per kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStats {
    pub total_deposits: Money,
    pub total_withdrawals: Money,
    pub total_expenses: Money,
    pub total_fines: Money,
    pub total_disbursed: Money,
    pub total_repaid: Money,
    /// Deposits, repayments and fines minus withdrawals, disbursements and
    /// expenses. Adjustments are not cash.
    pub cash_at_hand: Money,
    /// Entries in the last 30 days.
    pub recent_entries: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanStats {
    pub active_loans: u64,
    pub overdue_loans: u64,
    pub pending_loans: u64,
    pub principal_disbursed: Money,
    pub total_repaid: Money,
    pub outstanding_balance: Money,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub cash_at_hand: Money,
    pub active_loans: u64,
    pub overdue_loans: u64,
    pub total_members: u64,
    pub total_assets: Money,
}

const RECENT_DAYS: i64 = 30;

impl Engine {
    async fn ledger_totals(
        &self,
        db: &DatabaseTransaction,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<TransactionStats> {
        let stmt = Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT e.kind AS kind, COALESCE(SUM(e.amount_minor), 0) AS sum \
             FROM ledger_entries e \
             JOIN members m ON m.id = e.member_id \
             WHERE m.tenant_id = ? \
             GROUP BY e.kind",
            vec![tenant_id.into()],
        );
        let mut stats = TransactionStats::default();
        for row in db.query_all(stmt).await? {
            let kind: String = row.try_get("", "kind")?;
            let sum: i64 = row.try_get("", "sum")?;
            let kind = EntryKind::try_from(kind.as_str())?;
            let amount = Money::new(sum);
            match kind {
                EntryKind::Deposit => stats.total_deposits = amount,
                EntryKind::Withdrawal => stats.total_withdrawals = amount,
                EntryKind::Expense => stats.total_expenses = amount,
                EntryKind::Fine => stats.total_fines = amount,
                EntryKind::LoanDisbursement => stats.total_disbursed = amount,
                EntryKind::LoanRepayment => stats.total_repaid = amount,
                EntryKind::Adjustment => {}
            }
            let signed = amount
                .cents()
                .checked_mul(kind.cash_sign())
                .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))?;
            stats.cash_at_hand += Money::new(signed);
        }

        let since = now - Duration::days(RECENT_DAYS);
        let stmt = Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT COUNT(*) AS count \
             FROM ledger_entries e \
             JOIN members m ON m.id = e.member_id \
             WHERE m.tenant_id = ? AND e.occurred_at >= ?",
            vec![tenant_id.into(), since.into()],
        );
        let row = db.query_one(stmt).await?;
        let count: i64 = row
            .map(|r| r.try_get::<i64>("", "count"))
            .transpose()?
            .unwrap_or(0);
        stats.recent_entries = count.unsigned_abs();
        Ok(stats)
    }

    async fn tenant_loans(
        &self,
        db: &DatabaseTransaction,
        tenant_id: &str,
    ) -> ResultEngine<Vec<Loan>> {
        let models: Vec<loans::Model> = loans::Entity::find()
            .inner_join(members::Entity)
            .filter(members::Column::TenantId.eq(tenant_id.to_string()))
            .all(db)
            .await?;
        models.into_iter().map(Loan::try_from).collect()
    }

    async fn loan_totals(
        &self,
        db: &DatabaseTransaction,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<LoanStats> {
        let mut stats = LoanStats::default();
        for loan in self.tenant_loans(db, tenant_id).await? {
            match loan.status {
                LoanStatus::Active => stats.active_loans += 1,
                LoanStatus::Pending => stats.pending_loans += 1,
                _ => {}
            }
            if loan.is_overdue(now) {
                stats.overdue_loans += 1;
            }
            if loan.disbursed_at.is_some() {
                stats.principal_disbursed += loan.principal;
            }
            if loan.status.is_open() && loan.balance.is_positive() {
                stats.outstanding_balance += loan.balance;
            }
        }
        Ok(stats)
    }

    /// Ledger totals and cash at hand for the caller's chama.
    pub async fn transaction_stats(&self, ctx: &TenantContext) -> ResultEngine<TransactionStats> {
        let now = Utc::now();
        with_tx!(self, |db_tx| {
            self.ledger_totals(&db_tx, &ctx.tenant_id, now).await
        })
    }

    /// Loan book figures for the caller's chama as of `now`.
    pub async fn loan_stats(
        &self,
        ctx: &TenantContext,
        now: DateTime<Utc>,
    ) -> ResultEngine<LoanStats> {
        with_tx!(self, |db_tx| {
            let mut stats = self.loan_totals(&db_tx, &ctx.tenant_id, now).await?;
            stats.total_repaid = self
                .ledger_totals(&db_tx, &ctx.tenant_id, now)
                .await?
                .total_repaid;
            Ok(stats)
        })
    }

    pub async fn dashboard_stats(
        &self,
        ctx: &TenantContext,
        now: DateTime<Utc>,
    ) -> ResultEngine<DashboardStats> {
        with_tx!(self, |db_tx| {
            let ledger = self.ledger_totals(&db_tx, &ctx.tenant_id, now).await?;
            let loan_book = self.loan_totals(&db_tx, &ctx.tenant_id, now).await?;
            let total_members = members::Entity::find()
                .filter(members::Column::TenantId.eq(ctx.tenant_id.clone()))
                .count(&db_tx)
                .await?;

            let stmt = Statement::from_sql_and_values(
                db_tx.get_database_backend(),
                "SELECT COALESCE(SUM(current_value_minor), 0) AS sum \
                 FROM assets WHERE tenant_id = ?",
                vec![ctx.tenant_id.clone().into()],
            );
            let row = db_tx.query_one(stmt).await?;
            let total_assets: i64 = row
                .map(|r| r.try_get::<i64>("", "sum"))
                .transpose()?
                .unwrap_or(0);

            Ok(DashboardStats {
                cash_at_hand: ledger.cash_at_hand,
                active_loans: loan_book.active_loans,
                overdue_loans: loan_book.overdue_loans,
                total_members,
                total_assets: Money::new(total_assets),
            })
        })
    }
}
