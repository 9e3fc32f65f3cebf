use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post, put},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as AxumError, Header},
};

use std::{net::SocketAddr, sync::Arc};

use crate::{
    ServerError, alerts, assets, integrations, ledger, loans, members, stats, tenant, webhooks,
};
use engine::{Engine, EngineError};

static MEMBER_HEADER: axum::http::HeaderName =
    axum::http::HeaderName::from_static("x-chama-member-id");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// `TypedHeader` for the authenticated member.
///
/// The session layer in front of the server sets "x-chama-member-id" after
/// verifying the caller's credentials.
#[derive(Debug)]
struct MemberHeader(String);

impl Header for MemberHeader {
    fn name() -> &'static axum::http::HeaderName {
        &MEMBER_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(AxumError::invalid());
        }

        Ok(MemberHeader(value.to_string()))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        match axum::http::HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-chama-member-id header"),
        }
    }
}

/// Resolves the member header to a `TenantContext` request extension.
async fn auth(
    member_header: Option<TypedHeader<MemberHeader>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(TypedHeader(MemberHeader(member_id))) = member_header else {
        return Err(ServerError::Unauthenticated);
    };

    let ctx = match state.engine.resolve_context(&member_id).await {
        Ok(ctx) => ctx,
        Err(EngineError::Unauthorized(_)) => return Err(ServerError::Unauthenticated),
        Err(err) => return Err(err.into()),
    };

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Full HTTP surface: authenticated actions plus provider webhooks.
pub fn router(state: ServerState) -> Router {
    let actions = Router::new()
        .route("/chama", get(tenant::get).patch(tenant::update))
        .route("/members", get(members::list).post(members::invite))
        .route(
            "/members/{member_id}",
            get(members::get)
                .patch(members::update_profile)
                .delete(members::remove),
        )
        .route("/members/{member_id}/role", put(members::update_role))
        .route("/members/{member_id}/savings", get(ledger::savings))
        .route("/ledger", post(ledger::record))
        .route("/ledger/list", post(ledger::list))
        .route("/loans", get(loans::list).post(loans::create))
        .route("/loans/audit", get(loans::audit_log))
        .route("/loans/default-sweep", post(loans::default_sweep))
        .route("/loans/{loan_id}", get(loans::get).delete(loans::delete))
        .route("/loans/{loan_id}/status", put(loans::update_status))
        .route("/loans/{loan_id}/details", patch(loans::update_details))
        .route("/loans/{loan_id}/repayments", post(loans::repay))
        .route("/loans/{loan_id}/adjustment", post(loans::adjust))
        .route("/guarantees", get(loans::guarantees))
        .route("/guarantees/{guarantee_id}/approve", post(loans::approve))
        .route("/alerts/pending", get(alerts::pending))
        .route("/alerts/{alert_id}/assign", post(alerts::assign))
        .route("/assets", get(assets::list).post(assets::create))
        .route(
            "/assets/{asset_id}",
            patch(assets::update_value).delete(assets::delete),
        )
        .route("/integrations", get(integrations::list).post(integrations::create))
        .route("/integrations/{integration_id}", patch(integrations::update))
        .route("/stats/transactions", get(stats::transactions))
        .route("/stats/loans", get(stats::loans))
        .route("/stats/dashboard", get(stats::dashboard))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth));

    let hooks = Router::new()
        .route("/webhooks/mpesa", post(webhooks::mpesa))
        .route("/webhooks/mpesa/{chama_id}", post(webhooks::mpesa_for_chama))
        .route("/webhooks/paystack", post(webhooks::paystack))
        .route(
            "/webhooks/paystack/{chama_id}",
            post(webhooks::paystack_for_chama),
        );

    actions.merge(hooks).with_state(state)
}

pub async fn run(engine: Engine, addr: SocketAddr) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {addr}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
