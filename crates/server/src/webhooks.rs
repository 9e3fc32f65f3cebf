//! Payment provider webhooks.
//!
//! Both providers get a 200 acknowledgement whether or not the payment could
//! be matched to a member; unmatched alerts wait for manual reconciliation.
//! Callbacks that parse but cannot become an alert are logged and
//! acknowledged too, so the provider stops retrying them. Only unreadable
//! bodies and storage failures are answered with an error.

use api_types::alert::MpesaAck;
use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use engine::{AlertOutcome, EngineError, MpesaCallback, NewAlert, PaystackEnvelope};
use serde::de::DeserializeOwned;

use crate::{ServerError, server::ServerState};

const PAYSTACK_SIGNATURE: &str = "x-paystack-signature";

fn parse_payload<T: DeserializeOwned>(raw: &str, provider: &str) -> Result<T, ServerError> {
    serde_json::from_str(raw).map_err(|err| {
        tracing::warn!("malformed {provider} webhook: {err}");
        ServerError::Generic(format!("malformed {provider} payload"))
    })
}

/// Errors about the payment itself, as opposed to the server failing.
fn is_rejected_payment(err: &EngineError) -> bool {
    matches!(
        err,
        EngineError::InvalidAmount(_) | EngineError::InvalidInput(_) | EngineError::InvalidId(_)
    )
}

/// Stores the alert and tries to match it right away.
async fn ingest(state: &ServerState, alert: NewAlert) -> Result<(), ServerError> {
    let provider = alert.provider.as_str();
    let external_id = alert.external_id.clone();
    let alert_id = match state.engine.ingest_alert(alert).await {
        Ok(alert_id) => alert_id,
        Err(err) if is_rejected_payment(&err) => {
            tracing::error!(provider, %external_id, "payment alert rejected: {err}");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    match state.engine.process_alert(&alert_id).await? {
        AlertOutcome::Matched { ledger_entry_id, .. } => {
            tracing::debug!(provider, %external_id, %ledger_entry_id, "webhook settled");
        }
        AlertOutcome::Unmatched => {
            tracing::info!(provider, %external_id, "payment alert left pending");
        }
        AlertOutcome::AlreadyProcessed => {
            tracing::debug!(provider, %external_id, "payment alert already processed");
        }
    }
    Ok(())
}

async fn handle_mpesa(
    state: ServerState,
    chama_id: Option<String>,
    raw: String,
) -> Result<Json<MpesaAck>, ServerError> {
    let callback: MpesaCallback = parse_payload(&raw, "mpesa")?;
    match NewAlert::from_mpesa(&callback, &raw, chama_id) {
        Ok(Some(alert)) => ingest(&state, alert).await?,
        Ok(None) => tracing::debug!(
            result_code = callback.body.stk_callback.result_code,
            "mpesa callback without a completed payment"
        ),
        Err(err) => {
            let receipt = callback.receipt().unwrap_or_default();
            tracing::error!(%receipt, "mpesa callback rejected: {err}");
        }
    }
    Ok(Json(MpesaAck::success()))
}

async fn handle_paystack(
    state: ServerState,
    chama_id: Option<String>,
    headers: HeaderMap,
    raw: String,
) -> Result<&'static str, ServerError> {
    // Verification happens upstream; an unsigned request never got there.
    if !headers.contains_key(PAYSTACK_SIGNATURE) {
        tracing::warn!("paystack webhook without signature");
        return Err(ServerError::Unauthenticated);
    }

    let envelope: PaystackEnvelope = parse_payload(&raw, "paystack")?;
    let kind = envelope.event.clone();
    let event = envelope.into_charge_event().map_err(|err| {
        tracing::warn!("malformed paystack charge: {err}");
        ServerError::Generic("malformed paystack payload".to_string())
    })?;
    match event.and_then(|event| NewAlert::from_paystack(&event, &raw, chama_id)) {
        Some(alert) => ingest(&state, alert).await?,
        None => tracing::debug!(event = %kind, "ignoring paystack event"),
    }
    Ok("OK")
}

pub async fn mpesa(
    State(state): State<ServerState>,
    body: String,
) -> Result<Json<MpesaAck>, ServerError> {
    handle_mpesa(state, None, body).await
}

pub async fn mpesa_for_chama(
    State(state): State<ServerState>,
    Path(chama_id): Path<String>,
    body: String,
) -> Result<Json<MpesaAck>, ServerError> {
    handle_mpesa(state, Some(chama_id), body).await
}

pub async fn paystack(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: String,
) -> Result<&'static str, ServerError> {
    handle_paystack(state, None, headers, body).await
}

pub async fn paystack_for_chama(
    State(state): State<ServerState>,
    Path(chama_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<&'static str, ServerError> {
    handle_paystack(state, Some(chama_id), headers, body).await
}
