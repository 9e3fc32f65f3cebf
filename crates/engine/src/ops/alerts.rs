use chrono::Utc;
use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};

use crate::{
    AlertStatus, EngineError, EntryKind, LedgerEntry, NewAlert, PaymentAlert, PaymentPayload,
    ResultEngine, TenantContext, alerts, members, tenants,
    util::{normalize_required_text, parse_id},
};

use super::{Engine, with_tx};

/// Result of [`Engine::process_alert`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AlertOutcome {
    /// A `DEPOSIT` was recorded for the member and the alert is processed.
    Matched {
        member_id: String,
        ledger_entry_id: String,
    },
    /// No single member matched; the alert stays pending.
    Unmatched,
    /// The alert was already processed; nothing was written.
    AlreadyProcessed,
}

impl Engine {
    async fn require_alert(
        &self,
        db: &DatabaseTransaction,
        alert_id: &str,
    ) -> ResultEngine<alerts::Model> {
        let alert_id = parse_id(alert_id, "alert")?;
        alerts::Entity::find_by_id(alert_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("alert not exists".to_string()))
    }

    /// Claims a pending alert for `member` and writes the `DEPOSIT`.
    ///
    /// Returns `None` when the alert was no longer pending.
    async fn settle_alert(
        &self,
        db: &DatabaseTransaction,
        alert: &PaymentAlert,
        member: &members::Model,
        recorded_by: Option<&str>,
    ) -> ResultEngine<Option<LedgerEntry>> {
        let entry = LedgerEntry::new(
            &member.id,
            EntryKind::Deposit,
            alert.amount,
            Some(format!(
                "Automated {} deposit - Ref: {}",
                alert.provider.as_str().to_uppercase(),
                alert.external_id
            )),
            Some(alert.external_id.clone()),
            recorded_by,
        )?;

        let res = alerts::Entity::update_many()
            .col_expr(
                alerts::Column::Status,
                Expr::value(AlertStatus::Processed.as_str()),
            )
            .col_expr(alerts::Column::MatchedMemberId, Expr::value(member.id.clone()))
            .col_expr(alerts::Column::TenantId, Expr::value(member.tenant_id.clone()))
            .col_expr(alerts::Column::LedgerEntryId, Expr::value(entry.id.clone()))
            .col_expr(alerts::Column::ProcessedAt, Expr::value(Utc::now()))
            .filter(alerts::Column::Id.eq(alert.id.clone()))
            .filter(alerts::Column::Status.eq(AlertStatus::Pending.as_str()))
            .exec(db)
            .await?;
        if res.rows_affected == 0 {
            return Ok(None);
        }

        self.insert_entry(db, &entry).await?;
        tracing::info!(
            alert_id = %alert.id,
            provider = alert.provider.as_str(),
            member_id = %member.id,
            amount_minor = alert.amount.cents(),
            "payment alert matched"
        );
        Ok(Some(entry))
    }

    /// Stores a pending alert and returns its id.
    ///
    /// `(provider, external_id)` is unique: a repeated delivery returns the
    /// id of the alert already stored. A chama id that is malformed or no
    /// longer exists is dropped and the alert is stored unscoped.
    pub async fn ingest_alert(&self, input: NewAlert) -> ResultEngine<String> {
        let external_id = normalize_required_text(&input.external_id, "external id")?;
        if !input.amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "alert amount must be > 0".to_string(),
            ));
        }
        let tenant_id = match input.tenant_id.as_deref().map(|id| parse_id(id, "chama")) {
            Some(Ok(id)) => Some(id),
            Some(Err(err)) => {
                tracing::warn!(%external_id, "storing alert without chama: {err}");
                None
            }
            None => None,
        };
        let mut input = NewAlert {
            external_id,
            tenant_id,
            ..input
        };

        with_tx!(self, |db_tx| {
            if let Some(tenant_id) = &input.tenant_id {
                let exists = tenants::Entity::find_by_id(tenant_id.clone())
                    .one(&db_tx)
                    .await?
                    .is_some();
                if !exists {
                    tracing::warn!(
                        %tenant_id,
                        external_id = %input.external_id,
                        "storing alert without chama: chama not exists"
                    );
                    input.tenant_id = None;
                }
            }

            let existing = alerts::Entity::find()
                .filter(alerts::Column::Provider.eq(input.provider.as_str()))
                .filter(alerts::Column::ExternalId.eq(input.external_id.clone()))
                .one(&db_tx)
                .await?;
            if let Some(existing) = existing {
                tracing::info!(
                    alert_id = %existing.id,
                    provider = input.provider.as_str(),
                    external_id = %input.external_id,
                    "duplicate payment alert delivery"
                );
                return Ok(existing.id);
            }

            let model = alerts::ActiveModel::pending(&input, Utc::now())
                .insert(&db_tx)
                .await?;
            tracing::info!(
                alert_id = %model.id,
                provider = input.provider.as_str(),
                amount_minor = input.amount.cents(),
                "payment alert ingested"
            );
            Ok(model.id)
        })
    }

    /// Tries to turn a pending alert into a `DEPOSIT`.
    ///
    /// The payer phone is compared with member phones in E.164 form, within
    /// the alert's chama when it has one. Anything but exactly one candidate
    /// leaves the alert pending for manual reconciliation.
    pub async fn process_alert(&self, alert_id: &str) -> ResultEngine<AlertOutcome> {
        with_tx!(self, |db_tx| {
            let alert = PaymentAlert::try_from(self.require_alert(&db_tx, alert_id).await?)?;
            if alert.status == AlertStatus::Processed {
                return Ok(AlertOutcome::AlreadyProcessed);
            }

            let payload = PaymentPayload::parse(alert.provider, &alert.payload)?;
            let Some(phone) = payload.as_ref().and_then(PaymentPayload::phone) else {
                tracing::info!(alert_id = %alert.id, "payment alert has no usable phone");
                return Ok(AlertOutcome::Unmatched);
            };

            let mut query = members::Entity::find()
                .filter(members::Column::Phone.eq(phone.clone()))
                .filter(members::Column::TenantId.is_not_null());
            if let Some(tenant_id) = &alert.tenant_id {
                query = query.filter(members::Column::TenantId.eq(tenant_id.clone()));
            }
            let mut candidates: Vec<members::Model> = query.all(&db_tx).await?;
            if candidates.len() != 1 {
                tracing::warn!(
                    alert_id = %alert.id,
                    candidates = candidates.len(),
                    "could not auto-match payment alert"
                );
                return Ok(AlertOutcome::Unmatched);
            }
            let member = candidates.remove(0);

            match self.settle_alert(&db_tx, &alert, &member, None).await? {
                Some(entry) => Ok(AlertOutcome::Matched {
                    member_id: member.id,
                    ledger_entry_id: entry.id,
                }),
                None => Ok(AlertOutcome::AlreadyProcessed),
            }
        })
    }

    /// Pending alerts addressed to the caller's chama, oldest first.
    pub async fn list_pending_alerts(&self, ctx: &TenantContext) -> ResultEngine<Vec<PaymentAlert>> {
        ctx.require_privileged("review payment alerts")?;
        with_tx!(self, |db_tx| {
            self.pending_alerts(&db_tx, Some(&ctx.tenant_id)).await
        })
    }

    /// Pending alerts not addressed to any chama, for operators.
    pub async fn list_unscoped_pending_alerts(&self) -> ResultEngine<Vec<PaymentAlert>> {
        with_tx!(self, |db_tx| { self.pending_alerts(&db_tx, None).await })
    }

    async fn pending_alerts(
        &self,
        db: &DatabaseTransaction,
        tenant_id: Option<&str>,
    ) -> ResultEngine<Vec<PaymentAlert>> {
        let mut query = alerts::Entity::find()
            .filter(alerts::Column::Status.eq(AlertStatus::Pending.as_str()))
            .order_by_asc(alerts::Column::CreatedAt)
            .order_by_asc(alerts::Column::Id);
        query = match tenant_id {
            Some(tenant_id) => query.filter(alerts::Column::TenantId.eq(tenant_id.to_string())),
            None => query.filter(alerts::Column::TenantId.is_null()),
        };
        let models: Vec<alerts::Model> = query.all(db).await?;
        models.into_iter().map(PaymentAlert::try_from).collect()
    }

    /// Manually reconciles a pending alert of the caller's chama to a member.
    pub async fn assign_alert(
        &self,
        ctx: &TenantContext,
        alert_id: &str,
        member_id: &str,
    ) -> ResultEngine<LedgerEntry> {
        ctx.require_privileged("reconcile payment alerts")?;
        with_tx!(self, |db_tx| {
            let alert = PaymentAlert::try_from(self.require_alert(&db_tx, alert_id).await?)?;
            if alert.tenant_id.as_deref() != Some(ctx.tenant_id.as_str()) {
                return Err(EngineError::KeyNotFound("alert not exists".to_string()));
            }
            let member = self
                .require_member_in_tenant(&db_tx, &ctx.tenant_id, member_id)
                .await?;
            self.settle_manually(&db_tx, &alert, &member, Some(&ctx.member_id))
                .await
        })
    }

    /// Operator variant of [`assign_alert`](Self::assign_alert) for alerts
    /// that arrived without a chama.
    pub async fn assign_unscoped_alert(
        &self,
        alert_id: &str,
        member_id: &str,
    ) -> ResultEngine<LedgerEntry> {
        let member_id = parse_id(member_id, "member")?;
        with_tx!(self, |db_tx| {
            let alert = PaymentAlert::try_from(self.require_alert(&db_tx, alert_id).await?)?;
            if alert.tenant_id.is_some() {
                return Err(EngineError::InvalidInput(
                    "alert belongs to a chama; reconcile it there".to_string(),
                ));
            }
            let member = members::Entity::find_by_id(member_id.clone())
                .filter(members::Column::TenantId.is_not_null())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))?;
            self.settle_manually(&db_tx, &alert, &member, None).await
        })
    }

    async fn settle_manually(
        &self,
        db: &DatabaseTransaction,
        alert: &PaymentAlert,
        member: &members::Model,
        recorded_by: Option<&str>,
    ) -> ResultEngine<LedgerEntry> {
        if alert.status != AlertStatus::Pending {
            return Err(EngineError::InvalidTransition(
                "alert already processed".to_string(),
            ));
        }
        self.settle_alert(db, alert, member, recorded_by)
            .await?
            .ok_or_else(|| EngineError::InvalidTransition("alert already processed".to_string()))
    }
}
