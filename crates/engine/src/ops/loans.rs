use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, Statement, prelude::*};

use crate::{
    EngineError, Guarantor, Loan, LoanDetails, LoanStatus, Money, ResultEngine, guarantors,
    loans,
};

use super::Engine;

mod balance;
mod create;
mod lifecycle;
mod read;

/// Max guarantor rows per loan.
const MAX_GUARANTORS: usize = 2;

impl Engine {
    pub(super) async fn load_loan_details(
        &self,
        db: &DatabaseTransaction,
        model: loans::Model,
    ) -> ResultEngine<LoanDetails> {
        let guarantor_models: Vec<guarantors::Model> = guarantors::Entity::find()
            .filter(guarantors::Column::LoanId.eq(model.id.clone()))
            .order_by_asc(guarantors::Column::CreatedAt)
            .order_by_asc(guarantors::Column::Id)
            .all(db)
            .await?;
        Ok(LoanDetails {
            loan: Loan::try_from(model)?,
            guarantors: guarantor_models.into_iter().map(Guarantor::from).collect(),
        })
    }

    pub(super) async fn reload_loan(
        &self,
        db: &DatabaseTransaction,
        loan_id: &str,
    ) -> ResultEngine<Loan> {
        let model = loans::Entity::find_by_id(loan_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("loan not exists".to_string()))?;
        Loan::try_from(model)
    }

    /// Guarantee amounts a member has committed on loans that are still open.
    pub(super) async fn committed_guarantees(
        &self,
        db: &DatabaseTransaction,
        member_id: &str,
    ) -> ResultEngine<Money> {
        let [s1, s2, s3, s4] = LoanStatus::OPEN;
        let stmt = Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT COALESCE(SUM(g.amount_minor), 0) AS sum \
             FROM loan_guarantors g \
             JOIN loans l ON l.id = g.loan_id \
             WHERE g.guarantor_id = ? \
               AND l.status IN (?, ?, ?, ?)",
            vec![
                member_id.into(),
                s1.as_str().into(),
                s2.as_str().into(),
                s3.as_str().into(),
                s4.as_str().into(),
            ],
        );
        let row = db.query_one(stmt).await?;
        let sum: i64 = row
            .map(|r| r.try_get::<i64>("", "sum"))
            .transpose()?
            .unwrap_or(0);
        Ok(Money::new(sum))
    }

    /// Savings not already locked by other guarantees.
    pub(super) async fn available_savings(
        &self,
        db: &DatabaseTransaction,
        member_id: &str,
    ) -> ResultEngine<Money> {
        let savings = self.savings_of(db, member_id).await?;
        let committed = self.committed_guarantees(db, member_id).await?;
        Ok(savings - committed)
    }
}
