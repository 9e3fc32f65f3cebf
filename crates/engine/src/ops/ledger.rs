use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, Statement,
    TransactionTrait, prelude::*,
};

use crate::{
    EngineError, EntryKind, LedgerEntry, Money, NewEntry, ResultEngine, TenantContext, ledger,
    members, util::normalize_optional_text,
};

use super::{Engine, with_tx};

/// Filters for listing ledger entries.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct EntryFilter {
    pub member_id: Option<String>,
    /// If present, acts as an allow-list of kinds to return.
    pub kinds: Option<Vec<EntryKind>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

fn validate_entry_filter(filter: &EntryFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::InvalidInput(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if filter.kinds.as_ref().is_some_and(|k| k.is_empty()) {
        return Err(EngineError::InvalidInput(
            "kinds must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct EntriesCursor {
    occurred_at: DateTime<Utc>,
    entry_id: String,
}

impl EntriesCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid ledger cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid ledger cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid ledger cursor".to_string()))
    }
}

impl Engine {
    pub(super) async fn insert_entry(
        &self,
        db: &DatabaseTransaction,
        entry: &LedgerEntry,
    ) -> ResultEngine<()> {
        let model: ledger::ActiveModel = entry.into();
        model.insert(db).await?;
        Ok(())
    }

    /// Deposits minus withdrawals of one member.
    pub(super) async fn savings_of(
        &self,
        db: &DatabaseTransaction,
        member_id: &str,
    ) -> ResultEngine<Money> {
        let stmt = Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT COALESCE(SUM(CASE \
                        WHEN kind = ? THEN amount_minor \
                        WHEN kind = ? THEN -amount_minor \
                        ELSE 0 END), 0) AS sum \
             FROM ledger_entries \
             WHERE member_id = ?",
            vec![
                EntryKind::Deposit.as_str().into(),
                EntryKind::Withdrawal.as_str().into(),
                member_id.into(),
            ],
        );
        let row = db.query_one(stmt).await?;
        let sum: i64 = row
            .map(|r| r.try_get::<i64>("", "sum"))
            .transpose()?
            .unwrap_or(0);
        Ok(Money::new(sum))
    }

    /// Records a plain cash movement (deposit, withdrawal, expense, fine).
    ///
    /// Loan kinds and adjustments are written by the loan engine only.
    /// Members may only record entries for themselves.
    pub async fn record_entry(
        &self,
        ctx: &TenantContext,
        input: NewEntry,
    ) -> ResultEngine<LedgerEntry> {
        if !input.kind.is_manual() {
            return Err(EngineError::InvalidInput(format!(
                "{} entries are managed by the loan engine",
                input.kind.as_str()
            )));
        }
        let description = normalize_optional_text(input.description.as_deref());
        let reference_code = normalize_optional_text(input.reference_code.as_deref());

        with_tx!(self, |db_tx| {
            let member = self
                .require_member_in_tenant(&db_tx, &ctx.tenant_id, &input.member_id)
                .await?;
            ctx.require_self_or_privileged(&member.id, "record transactions")?;

            let entry = LedgerEntry::new(
                &member.id,
                input.kind,
                input.amount,
                description,
                reference_code,
                Some(&ctx.member_id),
            )?;
            self.insert_entry(&db_tx, &entry).await?;
            tracing::info!(
                tenant_id = %ctx.tenant_id,
                member_id = %entry.member_id,
                kind = entry.kind.as_str(),
                amount_minor = entry.amount.cents(),
                "ledger entry recorded"
            );
            Ok(entry)
        })
    }

    /// Lists ledger entries of the caller's tenant, newest first.
    ///
    /// Members only see their own entries. Pagination is newest → older by
    /// `(occurred_at DESC, id DESC)`.
    pub async fn list_entries(
        &self,
        ctx: &TenantContext,
        filter: &EntryFilter,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<LedgerEntry>, Option<String>)> {
        validate_entry_filter(filter)?;
        let member_scope = if ctx.is_privileged() {
            filter.member_id.clone()
        } else {
            if filter
                .member_id
                .as_deref()
                .is_some_and(|id| id != ctx.member_id)
            {
                return Err(EngineError::Unauthorized(
                    "members can only list their own transactions".to_string(),
                ));
            }
            Some(ctx.member_id.clone())
        };

        with_tx!(self, |db_tx| {
            let limit_plus_one = limit.saturating_add(1);
            let mut query = ledger::Entity::find()
                .inner_join(members::Entity)
                .filter(members::Column::TenantId.eq(ctx.tenant_id.clone()))
                .order_by_desc(ledger::Column::OccurredAt)
                .order_by_desc(ledger::Column::Id)
                .limit(limit_plus_one);

            if let Some(member_id) = &member_scope {
                query = query.filter(ledger::Column::MemberId.eq(member_id.clone()));
            }
            if let Some(kinds) = &filter.kinds {
                let kinds: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
                query = query.filter(ledger::Column::Kind.is_in(kinds));
            }
            if let Some(from) = filter.from {
                query = query.filter(ledger::Column::OccurredAt.gte(from));
            }
            if let Some(to) = filter.to {
                query = query.filter(ledger::Column::OccurredAt.lt(to));
            }
            if let Some(cursor) = cursor {
                let cursor = EntriesCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(ledger::Column::OccurredAt.lt(cursor.occurred_at))
                        .add(
                            Condition::all()
                                .add(ledger::Column::OccurredAt.eq(cursor.occurred_at))
                                .add(ledger::Column::Id.lt(cursor.entry_id)),
                        ),
                );
            }

            let models: Vec<ledger::Model> = query.all(&db_tx).await?;
            let has_more = models.len() > limit as usize;

            let mut out = Vec::with_capacity(models.len().min(limit as usize));
            for model in models.into_iter().take(limit as usize) {
                out.push(LedgerEntry::try_from(model)?);
            }

            let next_cursor = if has_more {
                out.last()
                    .map(|entry| EntriesCursor {
                        occurred_at: entry.occurred_at,
                        entry_id: entry.id.clone(),
                    })
                    .map(|c| c.encode())
                    .transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }

    /// Deposits minus withdrawals for a member of the caller's tenant.
    pub async fn member_savings(&self, ctx: &TenantContext, member_id: &str) -> ResultEngine<Money> {
        with_tx!(self, |db_tx| {
            let member = self
                .require_member_in_tenant(&db_tx, &ctx.tenant_id, member_id)
                .await?;
            ctx.require_self_or_privileged(&member.id, "view savings")?;
            self.savings_of(&db_tx, &member.id).await
        })
    }
}
